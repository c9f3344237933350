//! This crate is a client implementation of the NAT Port Mapping Protocol
//! (RFC 6886).
//!
//! It is used to ask the default gateway of the host for the address of its
//! WAN facing side and to instruct it to create and remove inbound port
//! mappings.
//!
//! A host has a single default gateway and the protocol has no multiplexing
//! of its own, so a single [`Service`] owns the whole conversation with it:
//! every operation, no matter where it comes from, goes through one queue
//! and one request/response exchange at a time. Any number of [`Client`]s
//! share that service, each keeping track of its own mappings.
//!
//! ```no_run
//! use natpmp::{Client, MapProtocol, PortMapping, Service};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let service = Service::start_default().await?;
//! let mut client = Client::new(service);
//!
//! let address = client.public_address().await?;
//! let mapping = client
//!     .request_mapping(PortMapping::new(MapProtocol::Tcp, 6000, 6000, 7200))
//!     .await?;
//! println!(
//!     "{address}:{} now forwards to local port {}",
//!     mapping.public_port, mapping.private_port
//! );
//! # Ok(())
//! # }
//! ```

mod client;
pub mod core;
mod error;
mod gateway;
mod mapping;
mod op;
mod service;

pub use client::Client;
pub use crate::core::{OpCode, ResultCode};
pub use error::Error;
pub use gateway::default_gateway;
pub use mapping::{MapProtocol, PortMapping};
pub use service::{Handle, Service};
