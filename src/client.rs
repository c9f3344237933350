use std::net::{Ipv4Addr, SocketAddrV4};

use crate::mapping::PortMapping;
use crate::service::Handle;
use crate::Error;

/// A NAT-PMP client.
///
/// Every client talks to the gateway through the shared [`Service`] it was
/// created from, and privately keeps track of the mappings established
/// through it. Clients are cheap: create one per logical user of the
/// gateway and let them all share the one running service.
///
/// [`Service`]: crate::Service
#[derive(Debug)]
pub struct Client {
    service: Handle,
    /// Mappings established through this client
    mappings: Vec<PortMapping>,
}

impl Client {
    /// Creates a new client on the given service
    pub fn new(service: Handle) -> Self {
        Self {
            service,
            mappings: Vec::new(),
        }
    }

    /// Address and port of the gateway the underlying service talks to
    pub fn gateway(&self) -> SocketAddrV4 {
        self.service.gateway()
    }

    /// The mappings established through this client, in creation order
    ///
    /// Note that removing a mapping does not delete it from this list.
    pub fn mappings(&self) -> &[PortMapping] {
        &self.mappings
    }

    /// Asks the gateway for the address of its WAN facing side.
    ///
    /// The first successful query is cached by the service; later calls,
    /// from any client, complete from the cache without a network exchange.
    pub async fn public_address(&self) -> Result<Ipv4Addr, Error> {
        self.service.public_address().await
    }

    /// Same as [`public_address`](Self::public_address), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_public_address(&self) -> Result<Ipv4Addr, Error> {
        self.service.try_public_address().await
    }

    /// Drops the cached public address and asks the gateway again.
    pub async fn refresh_public_address(&self) -> Result<Ipv4Addr, Error> {
        self.service.refresh_public_address().await
    }

    /// Requests a port mapping between this host and the gateway.
    ///
    /// On success the mapping the gateway actually created, which may
    /// differ from the requested one, is recorded and returned.
    pub async fn request_mapping(&mut self, mapping: PortMapping) -> Result<PortMapping, Error> {
        let created = self.service.request_mapping(mapping).await?;
        self.mappings.push(created);
        Ok(created)
    }

    /// Same as [`request_mapping`](Self::request_mapping), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_request_mapping(&mut self, mapping: PortMapping) -> Result<PortMapping, Error> {
        let created = self.service.try_request_mapping(mapping).await?;
        self.mappings.push(created);
        Ok(created)
    }

    /// Requests the removal of a port mapping.
    ///
    /// The public port and duration fields are zeroed before encoding, so
    /// the caller need not do this.
    pub async fn remove_mapping(&mut self, mapping: PortMapping) -> Result<(), Error> {
        self.service.remove_mapping(mapping).await
    }

    /// Same as [`remove_mapping`](Self::remove_mapping), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_remove_mapping(&mut self, mapping: PortMapping) -> Result<(), Error> {
        self.service.try_remove_mapping(mapping).await
    }
}
