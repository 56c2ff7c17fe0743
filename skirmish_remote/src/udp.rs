// UDP transport.
//
// Hosts bind the configured port so broadcast discovery can find them;
// clients bind an ephemeral port and are answered at whatever address their
// discovery packet came from. The socket is non-blocking: `receive` maps
// `WouldBlock` to "nothing queued". Packets with an empty address table are
// sent to the IPv4 limited broadcast address on the configured port.

use std::io;
use std::net::{Ipv4Addr, SocketAddr, SocketAddrV4, UdpSocket};

use skirmish_protocol::Packet;

use crate::config::RemoteConfig;
use crate::error::TransportError;
use crate::transport::{Transport, TransportRole};

/// Largest payload a single UDP datagram can carry.
const MAX_DATAGRAM: usize = 65_507;

pub struct UdpTransport {
    port: u16,
    socket: Option<UdpSocket>,
    buf: Vec<u8>,
    last_error: Option<String>,
}

impl UdpTransport {
    pub fn new(port: u16) -> Self {
        Self {
            port,
            socket: None,
            buf: vec![0; MAX_DATAGRAM],
            last_error: None,
        }
    }

    /// Transport on the port named by `config.udp_port`.
    pub fn from_config(config: &RemoteConfig) -> Self {
        Self::new(config.udp_port)
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    fn fail(&mut self, err: TransportError) -> TransportError {
        self.last_error = Some(err.to_string());
        err
    }

    fn open(role: TransportRole, port: u16) -> io::Result<UdpSocket> {
        let bind_port = match role {
            TransportRole::Host => port,
            TransportRole::Client => 0,
        };
        let socket = UdpSocket::bind(SocketAddrV4::new(Ipv4Addr::UNSPECIFIED, bind_port))?;
        socket.set_nonblocking(true)?;
        socket.set_broadcast(true)?;
        Ok(socket)
    }
}

impl Transport for UdpTransport {
    fn init(&mut self, role: TransportRole) -> Result<(), TransportError> {
        match Self::open(role, self.port) {
            Ok(socket) => {
                self.socket = Some(socket);
                Ok(())
            }
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn deinit(&mut self) {
        self.socket = None;
    }

    fn send(&mut self, packet: &Packet) -> Result<(), TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(self.fail(TransportError::NotInitialized));
        };
        let broadcast = [SocketAddr::V4(SocketAddrV4::new(
            Ipv4Addr::BROADCAST,
            self.port,
        ))];
        let targets = if packet.address_count() == 0 {
            &broadcast[..]
        } else {
            packet.addresses()
        };
        let mut result = Ok(());
        for target in targets {
            if let Err(e) = socket.send_to(packet.as_bytes(), target) {
                result = Err(e);
            }
        }
        result.map_err(|e| self.fail(e.into()))
    }

    fn receive(&mut self) -> Result<Option<Packet>, TransportError> {
        let Some(socket) = self.socket.as_ref() else {
            return Err(self.fail(TransportError::NotInitialized));
        };
        match socket.recv_from(&mut self.buf) {
            Ok((len, from)) => Ok(Some(Packet::from_wire(self.buf[..len].to_vec(), from))),
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(self.fail(e.into())),
        }
    }

    fn last_error(&self) -> Option<String> {
        self.last_error.clone()
    }

    fn local_address(&self) -> Option<SocketAddr> {
        self.socket.as_ref().and_then(|s| s.local_addr().ok())
    }
}
