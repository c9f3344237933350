use std::fmt;

use super::ResultCode;

/// Errors returned by the response decoding functions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The datagram is shorter than the format requires
    ///
    /// The [`usize`] value is the received length
    TooShort(usize),
    /// The version field of the response is not the NAT-PMP version (0)
    InvalidVersion(u8),
    /// The opcode field of the response does not answer the operation
    /// that was requested
    InvalidOpCode(u8),
    /// The gateway refused the request
    ///
    /// The status field takes priority over the opcode: once a nonzero
    /// status is read, decoding stops and the refusal is reported even if
    /// the opcode echo does not match the request.
    Refused(ResultCode),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use Error::*;
        match self {
            TooShort(l) => write!(f, "The response of {l} bytes is too short"),
            InvalidVersion(v) => write!(f, "The value {v} is not a valid version"),
            InvalidOpCode(c) => write!(f, "The value {c} is not a valid response opcode"),
            Refused(code) => write!(f, "{code}"),
        }
    }
}

impl std::error::Error for Error {}
