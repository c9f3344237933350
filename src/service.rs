//! The `Service` is the heart of the crate: it owns the one UDP
//! conversation a host has with its gateway and it's what implements the
//! actual protocol.
//!
//! # Initialization
//!
//! A `Service` is created by calling [`Service::start`] with the resolved
//! gateway endpoint, or [`Service::start_default`] which discovers it
//! first. Starting binds a reusable ephemeral socket, connects it to the
//! gateway and spawns the service task; what the caller gets back is a
//! cloneable [`Handle`] through which operations are submitted.
//!
//! # Internal workings
//!
//! NAT-PMP has no transaction identifier, so the only way to know which
//! request a datagram answers is to have at most one request outstanding.
//! The service therefore keeps a queue: every operation is appended at the
//! tail and the head operation is the one being exchanged with the gateway.
//! An operation completes exactly once, in queue order, before the next one
//! is even looked at, whether it succeeded or failed; one operation's
//! failure never blocks the ones queued behind it.
//!
//! When a send dies halfway through an exchange, a response datagram may
//! nevertheless arrive for it later. Reading that datagram as the answer to
//! the *next* operation would silently corrupt results, so the service
//! remembers the failure and drains whatever is buffered on the socket
//! before the next request goes out.
//!
//! # The public address cache
//!
//! The first successful address query is cached for the lifetime of the
//! service and later queries are answered without touching the network, on
//! the assumption that the gateway's WAN address does not change while the
//! process runs. When that assumption is too strong, an ISP renewing a
//! lease for instance, [`Handle::refresh_public_address`] asks the gateway
//! again.
//!
//! # Liveness
//!
//! There is no timeout on the wire exchange: a gateway that never answers
//! stalls the queue indefinitely. Callers that need liveness should wrap
//! their operations in their own timeout layer.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::UdpSocket;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::core::{Request, Response, MAX_RESPONSE_SIZE, SERVER_PORT};
use crate::gateway;
use crate::mapping::PortMapping;
use crate::op::Op;
use crate::Error;

/// The engine that talks NAT-PMP with the gateway.
///
/// Since there is only a single default gateway for a host it makes sense
/// to only have one entity communicating with it, regardless of how many
/// times it is used in an application. [`Client`](crate::Client)s act as
/// frontends for this service.
pub struct Service {
    /// Socket connected to the gateway
    socket: UdpSocket,
    /// Operations waiting to be executed, in arrival order
    queue: mpsc::UnboundedReceiver<Op>,
    /// Number of queued and in-flight operations, shared with the handles
    pending: Arc<AtomicUsize>,
    /// Cached result of the first successful address query
    public_address: Option<Ipv4Addr>,
    /// Set when an exchange died with its receive unresolved: whatever
    /// datagram it provokes must not reach the next exchange
    discard_next_recv: bool,
}

/// A cloneable handle to a running [`Service`], used to submit operations.
///
/// All handles of one service feed the same queue; operations complete in
/// the exact order they were submitted, across all handles.
#[derive(Clone, Debug)]
pub struct Handle {
    ops: mpsc::UnboundedSender<Op>,
    pending: Arc<AtomicUsize>,
    gateway: SocketAddrV4,
}

/// Binds an IPv4 UDP socket to an ephemeral port with address reuse
/// enabled, so multiple services (or processes) can coexist on one host
async fn reusable_socket() -> io::Result<UdpSocket> {
    use socket2::{Domain, Protocol, Socket, Type};

    let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, 0)).into())?;
    UdpSocket::from_std(socket.into())
}

impl Service {
    /// Starts a service that talks to the gateway at `gateway` and returns
    /// the [`Handle`] used to submit operations to it.
    ///
    /// The service stops once every handle (and every [`Client`] holding
    /// one) has been dropped and the queued operations have been served.
    ///
    /// [`Client`]: crate::Client
    pub async fn start(gateway: SocketAddrV4) -> io::Result<Handle> {
        let socket = reusable_socket().await?;
        socket.connect(gateway).await?;

        let (ops, queue) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let service = Service {
            socket,
            queue,
            pending: Arc::clone(&pending),
            public_address: None,
            discard_next_recv: false,
        };
        tokio::spawn(service.run());

        Ok(Handle {
            ops,
            pending,
            gateway,
        })
    }

    /// Starts a service that talks to this host's default gateway on the
    /// well-known NAT-PMP port.
    pub async fn start_default() -> io::Result<Handle> {
        let gateway = gateway::default_gateway()?;
        Self::start(SocketAddrV4::new(gateway, SERVER_PORT)).await
    }

    async fn run(mut self) {
        while let Some(op) = self.queue.recv().await {
            self.execute(op).await;
        }
    }

    /// Executes the head-of-queue operation and completes it exactly once.
    ///
    /// The pending count is decremented just before the result is
    /// delivered, so a caller that has observed a completion also observes
    /// the queue slot it occupied as free.
    async fn execute(&mut self, op: Op) {
        match op {
            Op::PublicAddress { refresh, tx } => {
                if refresh {
                    self.public_address = None;
                }
                let result = match self.public_address {
                    Some(address) => Ok(address),
                    None => self.query_public_address().await,
                };
                if let Ok(address) = result {
                    self.public_address = Some(address);
                }
                self.pending.fetch_sub(1, Ordering::AcqRel);
                tx.send(result).ok();
            }
            Op::Mapping { mapping, tx } => {
                let result = self.request_mapping(mapping).await;
                self.pending.fetch_sub(1, Ordering::AcqRel);
                tx.send(result).ok();
            }
        }
    }

    async fn query_public_address(&mut self) -> Result<Ipv4Addr, Error> {
        match self.exchange(Request::PublicAddress).await? {
            Response::PublicAddress { address, .. } => Ok(address),
            Response::Mapping { .. } => unreachable!("decoded against the address opcode"),
        }
    }

    async fn request_mapping(&mut self, mapping: PortMapping) -> Result<PortMapping, Error> {
        match self.exchange(Request::Mapping(mapping)).await? {
            Response::Mapping {
                private_port,
                public_port,
                duration,
                ..
            } => Ok(PortMapping {
                protocol: mapping.protocol,
                private_port,
                public_port,
                duration,
            }),
            Response::PublicAddress { .. } => unreachable!("decoded against a mapping opcode"),
        }
    }

    /// Drives one request/response exchange with the gateway.
    ///
    /// The send and the receive are issued concurrently and correlated
    /// only by queue position. A send failure completes the exchange right
    /// away, without waiting for a receive that may never resolve.
    async fn exchange(&mut self, request: Request) -> Result<Response, Error> {
        let mut buf = [0u8; Request::MAPPING_SIZE];
        let len = request.copy_to(&mut buf);
        self.drain_stale();

        let mut recv_buf = [0u8; MAX_RESPONSE_SIZE];
        let received = {
            let send = self.socket.send(&buf[..len]);
            let recv = self.socket.recv(&mut recv_buf);
            tokio::pin!(send, recv);

            let mut sent = false;
            loop {
                tokio::select! {
                    result = &mut send, if !sent => match result {
                        Ok(n) if n == len => sent = true,
                        Ok(n) => {
                            // A truncated request may still provoke an
                            // answer this exchange will never read
                            self.discard_next_recv = true;
                            warn!(sent = n, expected = len, "short send to the gateway");
                            return Err(Error::Socket(io::Error::new(
                                io::ErrorKind::WriteZero,
                                "the request was only partially sent",
                            )));
                        }
                        Err(error) => {
                            self.discard_next_recv = true;
                            return Err(Error::Socket(error));
                        }
                    },
                    result = &mut recv => match result {
                        Ok(received) => break received,
                        Err(error) => {
                            self.discard_next_recv = true;
                            return Err(Error::Socket(error));
                        }
                    },
                }
            }
        };

        let response = Response::decode(&recv_buf[..received], request.opcode())?;
        debug!(?response, "exchange completed");
        Ok(response)
    }

    /// Discards whatever a previously failed exchange left behind.
    ///
    /// Anything buffered on the socket before the next request goes out
    /// cannot belong to that request and must not be read as its response.
    fn drain_stale(&mut self) {
        if !self.discard_next_recv {
            return;
        }
        let mut buf = [0u8; MAX_RESPONSE_SIZE];
        while let Ok(len) = self.socket.try_recv(&mut buf) {
            warn!(len, "discarding stale datagram from the gateway");
        }
        self.discard_next_recv = false;
    }
}

impl Handle {
    /// Address and port of the gateway the service talks to
    pub fn gateway(&self) -> SocketAddrV4 {
        self.gateway
    }

    /// Appends an operation to the tail of the queue
    fn enqueue(&self, op: Op) -> Result<(), Error> {
        self.pending.fetch_add(1, Ordering::AcqRel);
        if self.ops.send(op).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Closed);
        }
        Ok(())
    }

    /// Enqueues an operation only if the queue is empty, so that it is
    /// served immediately; fails with [`Error::Busy`] otherwise
    fn enqueue_only(&self, op: Op) -> Result<(), Error> {
        if self
            .pending
            .compare_exchange(0, 1, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Err(Error::Busy);
        }
        if self.ops.send(op).is_err() {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            return Err(Error::Closed);
        }
        Ok(())
    }

    async fn address_op(&self, refresh: bool, only: bool) -> Result<Ipv4Addr, Error> {
        let (tx, rx) = oneshot::channel();
        let op = Op::PublicAddress { refresh, tx };
        match only {
            true => self.enqueue_only(op)?,
            false => self.enqueue(op)?,
        }
        rx.await.unwrap_or(Err(Error::Closed))
    }

    async fn mapping_op(&self, mapping: PortMapping, only: bool) -> Result<PortMapping, Error> {
        let (tx, rx) = oneshot::channel();
        let op = Op::Mapping { mapping, tx };
        match only {
            true => self.enqueue_only(op)?,
            false => self.enqueue(op)?,
        }
        rx.await.unwrap_or(Err(Error::Closed))
    }

    /// Asks the gateway for the address of its WAN facing side.
    ///
    /// The first successful query is cached by the service; later calls
    /// complete from the cache without a network exchange.
    pub async fn public_address(&self) -> Result<Ipv4Addr, Error> {
        self.address_op(false, false).await
    }

    /// Same as [`public_address`](Self::public_address), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_public_address(&self) -> Result<Ipv4Addr, Error> {
        self.address_op(false, true).await
    }

    /// Drops the cached public address and asks the gateway again.
    pub async fn refresh_public_address(&self) -> Result<Ipv4Addr, Error> {
        self.address_op(true, false).await
    }

    /// Requests a port mapping between this host and the gateway.
    ///
    /// Returns the mapping the gateway created, which may differ from the
    /// requested one.
    pub async fn request_mapping(&self, mapping: PortMapping) -> Result<PortMapping, Error> {
        self.mapping_op(mapping, false).await
    }

    /// Same as [`request_mapping`](Self::request_mapping), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_request_mapping(&self, mapping: PortMapping) -> Result<PortMapping, Error> {
        self.mapping_op(mapping, true).await
    }

    /// Requests the removal of a port mapping.
    ///
    /// The public port and duration fields are zeroed before encoding, so
    /// the caller need not do this.
    pub async fn remove_mapping(&self, mapping: PortMapping) -> Result<(), Error> {
        self.mapping_op(mapping.removal(), false).await.map(|_| ())
    }

    /// Same as [`remove_mapping`](Self::remove_mapping), but fails with
    /// [`Error::Busy`] instead of queueing behind pending operations.
    pub async fn try_remove_mapping(&self, mapping: PortMapping) -> Result<(), Error> {
        self.mapping_op(mapping.removal(), true).await.map(|_| ())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4};

    use tokio::net::UdpSocket;
    use tokio::task::JoinHandle;

    use crate::core::OpCode;

    /// A scripted stand-in for the gateway: answers each received request
    /// with the next canned reply and returns the requests it saw.
    pub(crate) async fn gateway(replies: Vec<Vec<u8>>) -> (SocketAddrV4, JoinHandle<Vec<Vec<u8>>>) {
        let socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = match socket.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };
        let task = tokio::spawn(async move {
            let mut requests = Vec::new();
            let mut buf = [0u8; 64];
            for reply in replies {
                let (len, from) = socket.recv_from(&mut buf).await.unwrap();
                requests.push(buf[..len].to_vec());
                socket.send_to(&reply, from).await.unwrap();
            }
            requests
        });
        (addr, task)
    }

    pub(crate) fn address_reply(address: Ipv4Addr) -> Vec<u8> {
        let mut buf = vec![0, OpCode::PublicAddress.response(), 0, 0, 0, 0, 0, 1];
        buf.extend_from_slice(&address.octets());
        buf
    }

    pub(crate) fn mapping_reply(
        opcode: OpCode,
        private_port: u16,
        public_port: u16,
        duration: u32,
    ) -> Vec<u8> {
        let mut buf = vec![0, opcode.response(), 0, 0, 0, 0, 0, 1];
        buf.extend_from_slice(&private_port.to_be_bytes());
        buf.extend_from_slice(&public_port.to_be_bytes());
        buf.extend_from_slice(&duration.to_be_bytes());
        buf
    }

    pub(crate) fn refusal_reply(opcode: OpCode, status: u16, len: usize) -> Vec<u8> {
        let mut buf = vec![0, opcode.response()];
        buf.extend_from_slice(&status.to_be_bytes());
        buf.resize(len, 0);
        buf
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::testing::*;
    use super::*;
    use crate::core::{self, OpCode};
    use crate::mapping::MapProtocol;

    #[tokio::test]
    async fn failed_operation_does_not_block_the_queue() {
        let truncated = vec![0, OpCode::PublicAddress.response(), 0, 0];
        let (addr, task) = gateway(vec![
            truncated,
            mapping_reply(OpCode::MapUdp, 4000, 8000, 3600),
        ])
        .await;
        let handle = Service::start(addr).await.unwrap();

        let mapping = PortMapping::new(MapProtocol::Udp, 4000, 8000, 3600);
        let (address, created) = tokio::join!(
            handle.public_address(),
            handle.request_mapping(mapping),
        );

        assert!(matches!(
            address,
            Err(Error::Malformed(core::Error::TooShort(4)))
        ));
        assert_eq!(created.unwrap(), mapping);

        // The address query was dispatched first, its failure notwithstanding
        let requests = task.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0].len(), Request::ADDRESS_SIZE);
        assert_eq!(requests[1].len(), Request::MAPPING_SIZE);
    }

    #[tokio::test]
    async fn public_address_is_cached() {
        let public = Ipv4Addr::new(203, 0, 113, 7);
        let (addr, task) = gateway(vec![address_reply(public)]).await;
        let handle = Service::start(addr).await.unwrap();

        let first = handle.public_address().await.unwrap();
        let second = tokio::time::timeout(Duration::from_secs(1), handle.public_address())
            .await
            .expect("a cached query must not wait on the network")
            .unwrap();

        assert_eq!(first, public);
        assert_eq!(second, public);
        assert_eq!(task.await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn refresh_bypasses_the_cache() {
        let before = Ipv4Addr::new(203, 0, 113, 7);
        let after = Ipv4Addr::new(198, 51, 100, 23);
        let (addr, task) = gateway(vec![address_reply(before), address_reply(after)]).await;
        let handle = Service::start(addr).await.unwrap();

        assert_eq!(handle.public_address().await.unwrap(), before);
        assert_eq!(handle.refresh_public_address().await.unwrap(), after);
        // The refreshed value is the cached one from now on
        assert_eq!(handle.public_address().await.unwrap(), after);
        assert_eq!(task.await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn immediate_calls_fail_while_operations_are_queued() {
        // A gateway that never answers keeps the queue occupied
        let silent = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let addr = match silent.local_addr().unwrap() {
            SocketAddr::V4(addr) => addr,
            SocketAddr::V6(_) => unreachable!(),
        };
        let handle = Service::start(addr).await.unwrap();

        let (tx, _rx) = oneshot::channel();
        handle.enqueue(Op::PublicAddress { refresh: false, tx }).unwrap();

        assert!(matches!(
            handle.try_public_address().await,
            Err(Error::Busy)
        ));
        let mapping = PortMapping::new(MapProtocol::Udp, 4000, 0, 0);
        assert!(matches!(
            handle.try_request_mapping(mapping).await,
            Err(Error::Busy)
        ));
    }

    #[tokio::test]
    async fn immediate_calls_succeed_on_an_idle_queue() {
        let public = Ipv4Addr::new(203, 0, 113, 7);
        let (addr, _task) = gateway(vec![address_reply(public)]).await;
        let handle = Service::start(addr).await.unwrap();

        assert_eq!(handle.try_public_address().await.unwrap(), public);
    }

    #[tokio::test]
    async fn refusal_is_authoritative() {
        // The refusal deliberately echoes the wrong opcode: the status
        // field wins and the query is not retried
        let refusal = refusal_reply(OpCode::MapUdp, 2, Response::ADDRESS_SIZE);
        let (addr, task) = gateway(vec![refusal, address_reply(Ipv4Addr::new(203, 0, 113, 7))]).await;
        let handle = Service::start(addr).await.unwrap();

        assert!(matches!(
            handle.public_address().await,
            Err(Error::Gateway(core::ResultCode::NotAuthorized))
        ));
        // The queue keeps going: the second exchange is the next operation,
        // not a retry of the refused one
        assert!(handle.refresh_public_address().await.is_ok());

        let requests = task.await.unwrap();
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn removal_zeroes_the_overloaded_fields() {
        let (addr, task) = gateway(vec![mapping_reply(OpCode::MapTcp, 7000, 0, 0)]).await;
        let handle = Service::start(addr).await.unwrap();

        let mapping = PortMapping::new(MapProtocol::Tcp, 7000, 7001, 3600);
        handle.remove_mapping(mapping).await.unwrap();

        let requests = task.await.unwrap();
        assert_eq!(
            requests[0],
            [0, 2, 0, 0, 0x1b, 0x58, 0, 0, 0, 0, 0, 0]
        );
    }

    #[tokio::test]
    async fn stale_datagrams_do_not_reach_the_next_exchange() {
        let gateway_socket = UdpSocket::bind((Ipv4Addr::LOCALHOST, 0)).await.unwrap();
        let gateway_addr = gateway_socket.local_addr().unwrap();

        let socket = reusable_socket().await.unwrap();
        socket.connect(gateway_addr).await.unwrap();
        let local_addr = socket.local_addr().unwrap();

        let (_ops, queue) = mpsc::unbounded_channel();
        let mut service = Service {
            socket,
            queue,
            pending: Arc::new(AtomicUsize::new(0)),
            public_address: None,
            // A previous exchange died with its receive unresolved
            discard_next_recv: true,
        };

        // The stale answer to that dead exchange is already on its way
        let stale = address_reply(Ipv4Addr::new(9, 9, 9, 9));
        gateway_socket.send_to(&stale, local_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        let fresh = Ipv4Addr::new(203, 0, 113, 7);
        let responder = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let (_, from) = gateway_socket.recv_from(&mut buf).await.unwrap();
            gateway_socket
                .send_to(&address_reply(fresh), from)
                .await
                .unwrap();
        });

        let response = service.exchange(Request::PublicAddress).await.unwrap();
        assert_eq!(
            response,
            Response::PublicAddress {
                epoch: 1,
                address: fresh,
            }
        );
        responder.await.unwrap();
    }
}
