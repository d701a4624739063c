//! Datagram transport abstraction.
//!
//! [`Transport`] is the seam between protocol logic and the network: raw
//! byte datagrams in, raw byte datagrams out, and a receive that may time
//! out.  [`Socket`] is the production implementation over
//! `tokio::net::UdpSocket`; [`crate::simulator::Simulator`] decorates any
//! transport with fault injection.

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::net::UdpSocket;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that can arise from transport operations.
#[derive(Debug, Error)]
pub enum SocketError {
    /// Underlying I/O error from the OS.
    #[error("socket I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// No datagram arrived within the requested timeout.
    #[error("receive timed out")]
    Timeout,
}

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

/// An unreliable, unordered datagram service.
pub trait Transport: Send + Sync {
    /// Send `buf` as a single datagram to `dest`.
    fn send_to(
        &self,
        buf: &[u8],
        dest: SocketAddr,
    ) -> impl Future<Output = Result<(), SocketError>> + Send;

    /// Receive one datagram into `buf`, returning `(len, source)`.
    ///
    /// `None` blocks indefinitely; otherwise [`SocketError::Timeout`] is
    /// returned when nothing arrives in time.  Datagrams longer than `buf`
    /// are truncated.
    fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> impl Future<Output = Result<(usize, SocketAddr), SocketError>> + Send;
}

// ---------------------------------------------------------------------------
// Socket
// ---------------------------------------------------------------------------

/// An async UDP socket.
#[derive(Debug)]
pub struct Socket {
    /// Address this socket is bound to (filled in after OS assigns ephemeral port).
    pub local_addr: SocketAddr,
    inner: UdpSocket,
}

impl Socket {
    /// Bind a new socket to `local_addr`.
    ///
    /// Passing `0.0.0.0:0` lets the OS choose an ephemeral port.
    pub async fn bind(local_addr: SocketAddr) -> Result<Self, SocketError> {
        let inner = UdpSocket::bind(local_addr).await?;
        let local_addr = inner.local_addr()?;
        Ok(Self { local_addr, inner })
    }

    /// Bind an ephemeral port able to reach `peer`.
    pub async fn bind_for(peer: SocketAddr) -> Result<Self, SocketError> {
        let ip = match peer.ip() {
            IpAddr::V4(v4) if v4.is_loopback() => IpAddr::V4(Ipv4Addr::LOCALHOST),
            IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpAddr::V6(v6) if v6.is_loopback() => IpAddr::V6(Ipv6Addr::LOCALHOST),
            IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };
        Self::bind(SocketAddr::new(ip, 0)).await
    }
}

impl Transport for Socket {
    async fn send_to(&self, buf: &[u8], dest: SocketAddr) -> Result<(), SocketError> {
        self.inner.send_to(buf, dest).await?;
        Ok(())
    }

    async fn recv_from(
        &self,
        buf: &mut [u8],
        timeout: Option<Duration>,
    ) -> Result<(usize, SocketAddr), SocketError> {
        let recv = self.inner.recv_from(buf);
        let received = match timeout {
            Some(limit) => tokio::time::timeout(limit, recv)
                .await
                .map_err(|_elapsed| SocketError::Timeout)?,
            None => recv.await,
        };
        Ok(received?)
    }
}
