use super::{OpCode, VERSION};
use crate::mapping::PortMapping;

/// A NAT-PMP request
///
/// # Format
///
/// A public address request is nothing but the two header bytes:
///
/// ```plain
///  0                   1
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Version = 0  |  Opcode = 0   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A mapping request:
///
/// ```plain
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Version = 0  | Opcode = 1|2  |           Reserved            |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |         Private Port          |          Public Port          |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               Mapping Duration (in seconds)                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// Note that a mapping request with both the public port and the duration
/// set to zero removes the mapping instead of creating one; this is the one
/// overloaded encoding in the protocol, see [`PortMapping::is_removal`].
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Request {
    /// Query the address of the gateway's WAN facing side
    PublicAddress,
    /// Create or remove a port mapping
    Mapping(PortMapping),
}

impl Request {
    /// Size of an encoded public address request in bytes
    pub const ADDRESS_SIZE: usize = 2;

    /// Size of an encoded mapping request in bytes
    pub const MAPPING_SIZE: usize = 12;

    /// The operation this request performs
    pub const fn opcode(&self) -> OpCode {
        match self {
            Self::PublicAddress => OpCode::PublicAddress,
            Self::Mapping(mapping) => mapping.protocol.opcode(),
        }
    }

    /// Returns the size in bytes of the encoded request
    pub const fn size(&self) -> usize {
        match self {
            Self::PublicAddress => Self::ADDRESS_SIZE,
            Self::Mapping(_) => Self::MAPPING_SIZE,
        }
    }

    /// Fills `buf` with the encoded request and returns the encoded length
    ///
    /// # Panics
    ///
    /// Panics if `buf` is shorter than [`size()`](Self::size)
    pub fn copy_to(&self, buf: &mut [u8]) -> usize {
        buf[0] = VERSION;
        buf[1] = self.opcode() as u8;
        if let Self::Mapping(mapping) = self {
            buf[2..4].fill(0); // reserved
            buf[4..6].copy_from_slice(&mapping.private_port.to_be_bytes());
            buf[6..8].copy_from_slice(&mapping.public_port.to_be_bytes());
            buf[8..12].copy_from_slice(&mapping.duration.to_be_bytes());
        }
        self.size()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mapping::MapProtocol;

    #[test]
    fn address_request() {
        let mut buf = [0xff; Request::MAPPING_SIZE];
        let len = Request::PublicAddress.copy_to(&mut buf);
        assert_eq!(len, 2);
        assert_eq!(buf[..len], [0, 0]);
    }

    #[test]
    fn mapping_request() {
        let mapping = PortMapping::new(MapProtocol::Tcp, 55555, 55556, 7200);
        let mut buf = [0xff; Request::MAPPING_SIZE];
        let len = Request::Mapping(mapping).copy_to(&mut buf);
        assert_eq!(len, 12);
        assert_eq!(
            buf,
            [0, 2, 0, 0, 0xd9, 0x03, 0xd9, 0x04, 0x00, 0x00, 0x1c, 0x20]
        );
    }

    #[test]
    fn removal_request() {
        // A removal is indistinguishable from a creation with a zero public
        // port and a zero duration
        let mapping = PortMapping::new(MapProtocol::Udp, 4000, 8000, 3600);
        let mut buf = [0xff; Request::MAPPING_SIZE];
        Request::Mapping(mapping.removal()).copy_to(&mut buf);
        assert_eq!(buf, [0, 1, 0, 0, 0x0f, 0xa0, 0, 0, 0, 0, 0, 0]);
    }
}
