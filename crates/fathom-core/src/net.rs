//! # Datagram I/O
//!
//! A thin [`DatagramChannel`] trait decouples the sender/receiver state
//! machines from any particular transport, so the exact same loops run
//! over a real [`UdpChannel`] in the binaries and over an in-memory lossy
//! channel in tests.

use std::io;
use std::net::{SocketAddr, ToSocketAddrs, UdpSocket};
use std::time::Duration;

use crate::error::TransferError;

/// A single peer-to-peer datagram transport. `recv` blocks for at most
/// `timeout` before reporting [`TransferError::TransientTimeout`].
pub trait DatagramChannel: Send + Sync {
    fn send(&self, buf: &[u8]) -> Result<(), TransferError>;
    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError>;
}

/// A bound UDP socket with a single fixed peer. Datagrams from any other
/// source address are treated as [`TransferError::UnknownPeer`] and folded
/// into the same retry path as a timeout — they never cross into the
/// protocol state machine.
pub struct UdpChannel {
    socket: UdpSocket,
    peer: SocketAddr,
}

impl UdpChannel {
    pub fn bind<A: ToSocketAddrs>(local: A, peer: SocketAddr) -> io::Result<Self> {
        let socket = UdpSocket::bind(local)?;
        Ok(UdpChannel { socket, peer })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    pub fn peer(&self) -> SocketAddr {
        self.peer
    }
}

impl DatagramChannel for UdpChannel {
    fn send(&self, buf: &[u8]) -> Result<(), TransferError> {
        self.socket.send_to(buf, self.peer)?;
        Ok(())
    }

    fn recv(&self, buf: &mut [u8], timeout: Duration) -> Result<usize, TransferError> {
        self.socket.set_read_timeout(Some(timeout))?;
        match self.socket.recv_from(buf) {
            Ok((n, from)) if from == self.peer => Ok(n),
            Ok((_, from)) => Err(TransferError::UnknownPeer(from)),
            Err(e)
                if e.kind() == io::ErrorKind::WouldBlock
                    || e.kind() == io::ErrorKind::TimedOut =>
            {
                Err(TransferError::TransientTimeout)
            }
            Err(e) => Err(TransferError::Io(e)),
        }
    }
}
