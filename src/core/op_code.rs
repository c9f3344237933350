use super::Error;

/// The NAT-PMP operation
///
/// This enum represents the possible values of the `Opcode` field in
/// NAT-PMP request and response headers.
///
/// In requests this field indicates the operation to perform. Responses
/// echo the opcode of the request they answer with [`OpCode::RESPONSE_BIT`]
/// set on top of it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OpCode {
    /// Query the address of the gateway's WAN facing side
    PublicAddress = 0,
    /// Create or remove a UDP port mapping
    MapUdp = 1,
    /// Create or remove a TCP port mapping
    MapTcp = 2,
}

impl OpCode {
    /// Bit set in the opcode field of every response
    pub const RESPONSE_BIT: u8 = 128;

    /// The value the opcode field of a response to this operation carries
    pub const fn response(self) -> u8 {
        self as u8 | Self::RESPONSE_BIT
    }
}

impl TryFrom<u8> for OpCode {
    type Error = Error;

    fn try_from(byte: u8) -> Result<Self, Error> {
        match byte {
            0 => Ok(OpCode::PublicAddress),
            1 => Ok(OpCode::MapUdp),
            2 => Ok(OpCode::MapTcp),
            n => Err(Error::InvalidOpCode(n)),
        }
    }
}
