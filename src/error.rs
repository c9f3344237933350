use std::io;

use crate::core::{self, ResultCode};

/// The error type for every fallible operation of this crate
///
/// Transport failures, locally detected malformed responses and the
/// gateway's own refusals are all reported through this one channel,
/// distinguishable by variant.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The underlying socket send or receive failed
    #[error("socket error: {0}")]
    Socket(#[from] io::Error),
    /// The response was too short or failed local header validation
    #[error("malformed response: {0}")]
    Malformed(core::Error),
    /// The gateway refused the request
    ///
    /// The verdict is authoritative and the request is never retried
    /// automatically.
    #[error("the gateway refused the request: {0}")]
    Gateway(ResultCode),
    /// An immediate operation was attempted while the request queue was
    /// not empty, try again later
    #[error("the request queue is not empty")]
    Busy,
    /// The service this handle points to is no longer running
    #[error("the service was shut down")]
    Closed,
}

impl From<core::Error> for Error {
    fn from(error: core::Error) -> Self {
        match error {
            core::Error::Refused(code) => Self::Gateway(code),
            error => Self::Malformed(error),
        }
    }
}
