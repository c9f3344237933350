use std::net::Ipv4Addr;

use tokio::sync::oneshot;

use crate::mapping::PortMapping;
use crate::Error;

/// An operation waiting in the service queue
///
/// Operations are executed strictly in arrival order, one at a time.
/// Completing an operation consumes its channel, so an operation can never
/// be completed twice.
#[derive(Debug)]
pub(crate) enum Op {
    /// Query the address of the gateway's WAN facing side
    PublicAddress {
        /// Drop the cached address and ask the gateway again
        refresh: bool,
        tx: oneshot::Sender<Result<Ipv4Addr, Error>>,
    },
    /// Create or remove a port mapping
    Mapping {
        mapping: PortMapping,
        tx: oneshot::Sender<Result<PortMapping, Error>>,
    },
}
