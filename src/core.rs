//! This module defines the types representing NAT-PMP request and response
//! messages and the functions that put them on and off the wire.
//!
//! # Sending
//!
//! [`Request`] values are encoded with [`Request::copy_to`], which fills a
//! caller supplied buffer and returns the number of bytes written. Requests
//! have a fixed layout, so the required length is known up front through
//! [`Request::size`].
//!
//! # Receiving
//!
//! A received datagram is decoded with [`Response::decode`], which validates
//! it against the operation the request asked for. The protocol carries no
//! transaction identifier: which request a datagram answers is decided by
//! the caller, decoding only checks that the datagram is a plausible answer
//! and extracts the fields.

mod error;
pub use error::Error;

mod op_code;
pub use op_code::OpCode;

mod result_code;
pub use result_code::ResultCode;

mod request;
pub use request::Request;

mod response;
pub use response::Response;

/// The NAT-PMP protocol version
///
/// Version numbers above 0 belong to the successor protocol (PCP)
pub const VERSION: u8 = 0;

/// IANA assigned UDP port number for NAT-PMP gateways
///
/// Gateways listen on this port for client requests
pub const SERVER_PORT: u16 = 5351;

/// IANA assigned UDP port number for NAT-PMP clients
///
/// Gateways send multicast address-change announcements to this port
///
/// **Note** that on transmission the clients can use any UDP port
pub const CLIENT_PORT: u16 = 5350;

/// Size of the largest datagram a gateway sends (a mapping response)
pub const MAX_RESPONSE_SIZE: usize = 16;
