//! UDP socket ownership for a CRTP link.
//!
//! The socket is shared between API callers (application sends) and the
//! receive task (keep-alives); every write goes through one lock.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::atomic::{AtomicU32, Ordering};

use tokio::net::UdpSocket;
use tokio::sync::Mutex;

use super::error::{TransportError, TransportResult};
use crate::core::KEEP_ALIVE;

/// Bind a local socket of the same family as `peer`, starting at `base` and
/// incrementing the port on every failure.
pub(crate) async fn bind_with_retry(
    peer: IpAddr,
    base: u16,
    max_attempts: u32,
) -> TransportResult<UdpSocket> {
    let local_ip = match peer {
        IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
        IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
    };

    for k in 0..max_attempts {
        let Some(port) = u16::try_from(k).ok().and_then(|k| base.checked_add(k)) else {
            break;
        };
        match UdpSocket::bind(SocketAddr::new(local_ip, port)).await {
            Ok(socket) => {
                tracing::debug!(port, attempts = k + 1, "bound local port");
                return Ok(socket);
            }
            Err(e) => tracing::debug!(port, error = %e, "local port unavailable"),
        }
    }

    Err(TransportError::BindExhausted {
        base,
        attempts: max_attempts,
    })
}

/// A connected UDP socket with serialized writes and the keep-alive counter.
#[derive(Debug)]
pub(crate) struct LinkSocket {
    socket: UdpSocket,
    write_lock: Mutex<()>,
    /// Datagrams received since the last application send.
    keep_alive: AtomicU32,
}

impl LinkSocket {
    pub(crate) fn new(socket: UdpSocket) -> Self {
        Self {
            socket,
            write_lock: Mutex::new(()),
            keep_alive: AtomicU32::new(0),
        }
    }

    /// Point the socket at `peer`.
    pub(crate) async fn connect(&self, peer: SocketAddr) -> io::Result<()> {
        self.socket.connect(peer).await
    }

    /// Write an application frame and reset the keep-alive counter.
    pub(crate) async fn send_frame(&self, frame: &[u8]) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.socket.send(frame).await?;
        self.keep_alive.store(0, Ordering::Release);
        Ok(())
    }

    /// Write the keep-alive datagram. Does not touch the counter.
    pub(crate) async fn send_keep_alive(&self) -> io::Result<()> {
        let _guard = self.write_lock.lock().await;
        self.socket.send(&KEEP_ALIVE).await?;
        tracing::trace!("keep-alive sent");
        Ok(())
    }

    pub(crate) async fn recv(&self, buf: &mut [u8]) -> io::Result<usize> {
        self.socket.recv(buf).await
    }

    /// Count one received datagram, returning the new count.
    pub(crate) fn note_received(&self) -> u32 {
        self.keep_alive.fetch_add(1, Ordering::AcqRel).saturating_add(1)
    }

    pub(crate) fn keep_alive_count(&self) -> u32 {
        self.keep_alive.load(Ordering::Acquire)
    }

    pub(crate) fn local_addr(&self) -> io::Result<SocketAddr> {
        self.socket.local_addr()
    }
}
