use std::io;
use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr, SocketAddrV4, UdpSocket};
use std::time::Duration;

use log::{debug, info};

use super::Transport;
use crate::error::TransportError;

/// Where the emulator listens for packets.
pub const EMULATOR_ADDR: SocketAddr = SocketAddr::V4(SocketAddrV4::new(Ipv4Addr::LOCALHOST, 21324));

// A zero read timeout is rejected by the socket API.
const MIN_TIMEOUT: Duration = Duration::from_millis(1);

/// Datagram link to the local emulator, one packet per datagram.
#[derive(Debug)]
pub struct EmulatorTransport {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl EmulatorTransport {
    pub fn connect(addr: SocketAddr) -> Result<Self, TransportError> {
        let local: SocketAddr = if addr.is_ipv4() {
            (Ipv4Addr::LOCALHOST, 0).into()
        } else {
            (Ipv6Addr::LOCALHOST, 0).into()
        };

        let socket = UdpSocket::bind(local)
            .and_then(|socket| socket.connect(addr).map(|_| socket))
            .map_err(|e| TransportError::ConnectFailed {
                attempts: 1,
                reason: format!("emulator at {}: {}", addr, e),
            })?;

        info!("Emulator transport bound to {:?}, peer {}", socket.local_addr().ok(), addr);
        Ok(Self { socket, peer: addr })
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl Transport for EmulatorTransport {
    fn write(&mut self, packet: &[u8], timeout: Duration) -> Result<(), TransportError> {
        self.socket.set_write_timeout(Some(timeout.max(MIN_TIMEOUT)))?;
        let sent = self.socket.send(packet)?;
        if sent != packet.len() {
            return Err(io::Error::new(io::ErrorKind::WriteZero, "short datagram write").into());
        }
        debug!("Emulator write: {}", hex::encode(&packet[..packet.len().min(16)]));
        Ok(())
    }

    fn read_into(&mut self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransportError> {
        self.socket.set_read_timeout(Some(timeout.max(MIN_TIMEOUT)))?;
        match self.socket.recv(buf) {
            Ok(n) => {
                debug!("Emulator read {} bytes: {}", n, hex::encode(&buf[..n.min(16)]));
                Ok(n)
            }
            Err(e) if matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut) => {
                Err(TransportError::Timeout(timeout))
            }
            Err(e) => Err(e.into()),
        }
    }
}
