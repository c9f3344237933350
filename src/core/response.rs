use std::net::Ipv4Addr;

use super::{Error, OpCode, ResultCode, VERSION};

/// A NAT-PMP response
///
/// # Format
///
/// ```plain
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |  Version = 0  | 128 + Opcode  |        Status (16 bits)       |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// |               Seconds Since Epoch (32 bits)                   |
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// :          Opcode-specific fields (4 or 8 bytes)                :
/// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
/// ```
///
/// A public address response carries the gateway's WAN address in the
/// opcode-specific part; a mapping response carries the private port, the
/// assigned public port and the assigned duration.
#[derive(PartialEq, Eq, Debug, Clone, Copy)]
pub enum Response {
    /// Response to an [`OpCode::PublicAddress`] request
    PublicAddress {
        /// Seconds since the gateway's mapping table was last reset
        epoch: u32,
        /// Address of the gateway's WAN facing side
        address: Ipv4Addr,
    },
    /// Response to an [`OpCode::MapUdp`] or [`OpCode::MapTcp`] request
    Mapping {
        /// Seconds since the gateway's mapping table was last reset
        epoch: u32,
        /// The port on this host, copied from the request
        private_port: u16,
        /// The public port the gateway assigned, which may differ from the
        /// requested one
        public_port: u16,
        /// The duration the gateway assigned to the mapping, in seconds
        duration: u32,
    },
}

impl Response {
    /// Minimum length of a public address response
    pub const ADDRESS_SIZE: usize = 12;

    /// Minimum length of a mapping response
    pub const MAPPING_SIZE: usize = 16;

    const fn min_size(expected: OpCode) -> usize {
        match expected {
            OpCode::PublicAddress => Self::ADDRESS_SIZE,
            OpCode::MapUdp | OpCode::MapTcp => Self::MAPPING_SIZE,
        }
    }

    /// Decodes a datagram as the answer to a request with the given opcode
    ///
    /// The length is validated before any field is read, then the version,
    /// then the status field. A nonzero status is returned as
    /// [`Error::Refused`] without looking at the opcode echo: the gateway's
    /// verdict wins over a mismatched opcode.
    pub fn decode(buf: &[u8], expected: OpCode) -> Result<Self, Error> {
        if buf.len() < Self::min_size(expected) {
            return Err(Error::TooShort(buf.len()));
        }
        if buf[0] != VERSION {
            return Err(Error::InvalidVersion(buf[0]));
        }
        let status = u16::from_be_bytes([buf[2], buf[3]]);
        if let Some(code) = ResultCode::from_status(status) {
            return Err(Error::Refused(code));
        }
        if buf[1] != expected.response() {
            return Err(Error::InvalidOpCode(buf[1]));
        }
        let epoch = u32::from_be_bytes(buf[4..8].try_into().unwrap());
        Ok(match expected {
            OpCode::PublicAddress => {
                let octets: [u8; 4] = buf[8..12].try_into().unwrap();
                Self::PublicAddress {
                    epoch,
                    address: octets.into(),
                }
            }
            OpCode::MapUdp | OpCode::MapTcp => Self::Mapping {
                epoch,
                private_port: u16::from_be_bytes(buf[8..10].try_into().unwrap()),
                public_port: u16::from_be_bytes(buf[10..12].try_into().unwrap()),
                duration: u32::from_be_bytes(buf[12..16].try_into().unwrap()),
            },
        })
    }
}
