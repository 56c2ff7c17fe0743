// Packet transports.
//
// `Transport` is the contract the session engine sends and receives packets
// through. It is deliberately small: datagram-style, non-blocking receive,
// and addressing taken from the packet's own address table (an empty table
// means broadcast to every reachable peer). On receipt the transport puts the
// sender's address in slot 0 of the packet's address table, which is how the
// lobby learns where discovery and registration requests came from.
//
// Two implementations:
// - `LoopbackNetwork` / `LoopbackTransport` (this file): an in-process
//   "network" of mpsc channels. Each endpoint gets a synthetic 127.0.0.1
//   address. Endpoints can be cut off to simulate a peer vanishing. Used by
//   the tests and by hot-seat style local play.
// - `UdpTransport` (`udp.rs`): real sockets.
//
// Errors are returned to the caller and also remembered as text for
// `last_error`, mirroring how the UI reports transport trouble after the fact.

use std::collections::{BTreeMap, BTreeSet};
use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use skirmish_protocol::Packet;

use crate::error::TransportError;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransportRole {
    Host,
    Client,
}

/// A datagram transport. `Send` so a session can run on its own thread.
pub trait Transport: Send {
    fn init(&mut self, role: TransportRole) -> Result<(), TransportError>;

    fn deinit(&mut self);

    /// Send to every address in the packet's table, or broadcast when empty.
    fn send(&mut self, packet: &Packet) -> Result<(), TransportError>;

    /// Next queued packet, or `None` when nothing is waiting. Never blocks.
    fn receive(&mut self) -> Result<Option<Packet>, TransportError>;

    /// Text of the most recent failure, if any.
    fn last_error(&self) -> Option<String>;

    fn local_address(&self) -> Option<SocketAddr>;
}

// ---------------------------------------------------------------------------
// Loopback
// ---------------------------------------------------------------------------

type Datagram = (SocketAddr, Vec<u8>);

/// First synthetic port handed out by a `LoopbackNetwork`.
const LOOPBACK_BASE_PORT: u16 = 40_000;

#[derive(Default)]
struct LoopbackInner {
    endpoints: BTreeMap<SocketAddr, Sender<Datagram>>,
    cut_off: BTreeSet<SocketAddr>,
    next_port: u16,
}

/// Shared in-process network. Clones refer to the same network.
#[derive(Clone, Default)]
pub struct LoopbackNetwork {
    inner: Arc<Mutex<LoopbackInner>>,
}

impl LoopbackNetwork {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, LoopbackInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Attach a new endpoint with its own address.
    pub fn endpoint(&self) -> LoopbackTransport {
        let mut inner = self.lock();
        let port = LOOPBACK_BASE_PORT + inner.next_port;
        inner.next_port += 1;
        let address = SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), port);
        let (tx, rx) = mpsc::channel();
        inner.endpoints.insert(address, tx);
        LoopbackTransport {
            network: self.clone(),
            address,
            inbox: rx,
            initialized: false,
            last_error: None,
        }
    }

    /// Silently drop everything sent to or from `address` from now on.
    pub fn cut_off(&self, address: SocketAddr) {
        self.lock().cut_off.insert(address);
    }

    pub fn is_cut_off(&self, address: SocketAddr) -> bool {
        self.lock().cut_off.contains(&address)
    }

    fn deliver(&self, from: SocketAddr, packet: &Packet) {
        let inner = self.lock();
        if inner.cut_off.contains(&from) {
            return;
        }
        let bytes = packet.as_bytes();
        let targets: Vec<SocketAddr> = if packet.address_count() == 0 {
            inner
                .endpoints
                .keys()
                .copied()
                .filter(|addr| *addr != from)
                .collect()
        } else {
            packet.addresses().to_vec()
        };
        for target in targets {
            if inner.cut_off.contains(&target) {
                continue;
            }
            // Unknown or closed endpoints lose the datagram, like UDP.
            if let Some(tx) = inner.endpoints.get(&target) {
                let _ = tx.send((from, bytes.to_vec()));
            }
        }
    }
}

pub struct LoopbackTransport {
    network: LoopbackNetwork,
    address: SocketAddr,
    inbox: Receiver<Datagram>,
    initialized: bool,
    last_error: Option<String>,
}

impl LoopbackTransport {
    pub fn address(&self) -> SocketAddr {
        self.address
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        self.last_error = Some(err.to_string());
        err
    }
}

impl Transport for LoopbackTransport {
    fn init(&mut self, _role: TransportRole) -> Result<(), TransportError> {
        self.initialized = true;
        Ok(())
    }

    fn deinit(&mut self) {
        self.initialized = false;
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        if !self.initialized {
            return Err(self.fail(TransportError::NotInitialized));
        }
        self.network.deliver(self.address, packet);
        Ok(())
    }

    fn receive(&mut self) -> Result<Option<Packet>, TransportError> {
        if !self.initialized {
            return Err(self.fail(TransportError::NotInitialized));
        }
        loop {
            match self.inbox.try_recv() {
                Ok((from, bytes)) => {
                    if self.network.is_cut_off(self.address) {
                        continue;
                    }
                    return Ok(Some(Packet::from_wire(bytes, from)));
                }
                Err(TryRecvError::Empty) => return Ok(None),
                Err(TryRecvError::Disconnected) => {
                    return Err(self.fail(TransportError::Disconnected));
                }
            }
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        Some(self.address)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ready(network: &LoopbackNetwork) -> LoopbackTransport {
        let mut endpoint = network.endpoint();
        endpoint.init(TransportRole::Client).unwrap();
        endpoint
    }

    fn packet(bytes: &[u8]) -> Packet {
        Packet::from_bytes(bytes.to_vec())
    }

    #[test]
    fn unicast_reaches_only_its_destination() {
        let network = LoopbackNetwork::new();
        let mut a = ready(&network);
        let mut b = ready(&network);
        let mut c = ready(&network);

        let mut p = packet(&[18, 0, 0]);
        p.add_address(b.address());
        a.send(&p).unwrap();

        let got = b.receive().unwrap().unwrap();
        assert_eq!(got.as_bytes(), &[18, 0, 0]);
        assert_eq!(got.address(0), Some(a.address()));
        assert!(c.receive().unwrap().is_none());
    }

    #[test]
    fn broadcast_skips_sender() {
        let network = LoopbackNetwork::new();
        let mut a = ready(&network);
        let mut b = ready(&network);
        let mut c = ready(&network);

        a.send(&packet(&[28, 1, 0])).unwrap();
        assert!(a.receive().unwrap().is_none());
        assert!(b.receive().unwrap().is_some());
        assert!(c.receive().unwrap().is_some());
    }

    #[test]
    fn cut_off_endpoint_neither_sends_nor_receives() {
        let network = LoopbackNetwork::new();
        let mut a = ready(&network);
        let mut b = ready(&network);
        network.cut_off(b.address());

        a.send(&packet(&[0, 0, 0])).unwrap();
        b.send(&packet(&[0, 1, 0])).unwrap();
        assert!(a.receive().unwrap().is_none());
        assert!(b.receive().unwrap().is_none());
    }

    #[test]
    fn use_before_init_is_an_error() {
        let network = LoopbackNetwork::new();
        let mut a = network.endpoint();
        assert!(matches!(
            a.send(&packet(&[0, 0, 0])),
            Err(TransportError::NotInitialized)
        ));
        assert!(a.last_error().unwrap().contains("before init"));
    }
}
