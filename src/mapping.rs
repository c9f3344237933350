use crate::core::OpCode;

/// Transport protocol a port mapping applies to
///
/// The discriminant doubles as the mapping opcode on the wire.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MapProtocol {
    Udp = 1,
    Tcp = 2,
}

impl MapProtocol {
    /// The mapping operation for this protocol
    pub const fn opcode(self) -> OpCode {
        match self {
            Self::Udp => OpCode::MapUdp,
            Self::Tcp => OpCode::MapTcp,
        }
    }
}

/// A mapping between a port on this host and a port on the WAN facing side
/// of the gateway
///
/// Inbound traffic arriving at the gateway on `public_port` is forwarded to
/// this host's `private_port` for as long as the mapping lasts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PortMapping {
    /// Transport protocol the mapping applies to
    pub protocol: MapProtocol,
    /// The port on which this host will be listening for connections
    pub private_port: u16,
    /// The port on which the gateway's WAN facing side will be listening
    /// for connections
    ///
    /// This is a suggestion and gateways are free to ignore it and map
    /// `private_port` to something else. Zero asks the gateway to choose.
    pub public_port: u16,
    /// The total lifetime of the mapping, in seconds
    ///
    /// It is advised to renew the mapping at an interval half of this
    /// value. Zero lets the gateway choose a suitable value.
    pub duration: u32,
}

impl PortMapping {
    /// Creates a new port mapping request
    pub const fn new(protocol: MapProtocol, private_port: u16, public_port: u16, duration: u32) -> Self {
        Self {
            protocol,
            private_port,
            public_port,
            duration,
        }
    }

    /// The removal request for this mapping
    ///
    /// A removal is encoded as a mapping request with both the public port
    /// and the duration set to zero, so the caller need not zero them.
    pub const fn removal(&self) -> Self {
        Self {
            protocol: self.protocol,
            private_port: self.private_port,
            public_port: 0,
            duration: 0,
        }
    }

    /// Whether this request removes a mapping instead of creating one
    pub const fn is_removal(&self) -> bool {
        self.public_port == 0 && self.duration == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removal() {
        let mapping = PortMapping::new(MapProtocol::Tcp, 6000, 6001, 3600);
        assert!(!mapping.is_removal());

        let removal = mapping.removal();
        assert!(removal.is_removal());
        assert_eq!(removal.protocol, MapProtocol::Tcp);
        assert_eq!(removal.private_port, 6000);
        assert_eq!(removal.public_port, 0);
        assert_eq!(removal.duration, 0);
    }
}
