//! UDP link driver.
//!
//! One [`UdpDriver`] owns one socket connected to the vehicle and, while
//! connected, one receive task that decodes datagrams into an inbound queue.
//!
//! # Receive task
//!
//! 1. Send a keep-alive so the peer learns our address.
//! 2. Read with [`LinkConfig::read_timeout`]; every expiry is reported to
//!    the error callback and the loop carries on.
//! 3. Each datagram bumps the keep-alive counter, is decoded and queued.
//!    Once the counter exceeds [`LinkConfig::keep_alive_threshold`] every
//!    further datagram triggers a keep-alive, until an application send
//!    resets the counter.
//! 4. On stop, send a last keep-alive and return.
//!
//! `pause` and `close` await the task. Calling them from a callback that
//! runs on the receive task would never complete.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as SyncMutex;
use tokio::sync::{Mutex, mpsc, watch};
use tokio::task::JoinHandle;

use super::config::LinkConfig;
use super::connection::LinkState;
use super::error::{TransportError, TransportResult};
use super::socket::{LinkSocket, bind_with_retry};
use crate::core::{LinkStateError, UDP_DRIVER_NAME};
use crate::crtp::Packet;
use crate::dispatch::PortRouter;

/// Called with a message when the link reports an error (e.g. read timeout).
pub type ErrorCallback = Arc<dyn Fn(&str) + Send + Sync>;

/// Called with a link quality percentage.
pub type QualityCallback = Arc<dyn Fn(f32) + Send + Sync>;

/// Callbacks handed to [`UdpDriver::connect`].
///
/// The UDP link has no signal strength to report, so `on_quality` is kept
/// for interface parity and never invoked.
#[derive(Clone, Default)]
pub struct LinkCallbacks {
    /// Link quality reports.
    pub on_quality: Option<QualityCallback>,
    /// Link error reports.
    pub on_error: Option<ErrorCallback>,
}

impl LinkCallbacks {
    /// Callbacks with only an error handler.
    pub fn on_error(callback: impl Fn(&str) + Send + Sync + 'static) -> Self {
        Self {
            on_quality: None,
            on_error: Some(Arc::new(callback)),
        }
    }
}

/// How long [`UdpDriver::receive`] waits for a packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecvTimeout {
    /// Return immediately.
    NoWait,
    /// Wait until a packet arrives or the link is closed.
    Forever,
    /// Wait at most this long.
    After(Duration),
}

impl RecvTimeout {
    /// `0` never waits, negative waits forever, positive waits that many seconds.
    ///
    /// Durations too large to represent, infinity included, wait forever.
    /// `NaN` does not wait.
    pub fn from_secs_f64(secs: f64) -> Self {
        if secs.is_nan() || secs == 0.0 {
            RecvTimeout::NoWait
        } else if secs < 0.0 {
            RecvTimeout::Forever
        } else {
            Duration::try_from_secs_f64(secs).map_or(RecvTimeout::Forever, RecvTimeout::After)
        }
    }
}

struct ReceiveTask {
    stop: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

impl ReceiveTask {
    async fn stop(self) {
        let _ = self.stop.send(true);
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "receive task ended abnormally");
        }
    }
}

/// Link state shared by every handle on the driver. Never held across an await.
#[derive(Default)]
struct LinkShared {
    state: LinkState,
    socket: Option<Arc<LinkSocket>>,
    peer: Option<SocketAddr>,
    callbacks: LinkCallbacks,
    inbound_tx: Option<mpsc::UnboundedSender<Packet>>,
    receiver: Option<ReceiveTask>,
}

impl LinkShared {
    fn socket(&self) -> TransportResult<Arc<LinkSocket>> {
        self.socket
            .clone()
            .ok_or(TransportError::LinkState(LinkStateError::NotConnected))
    }

    fn spawn_receiver(&mut self, config: &LinkConfig) -> TransportResult<()> {
        let socket = self.socket()?;
        let inbound = self
            .inbound_tx
            .clone()
            .ok_or(TransportError::LinkState(LinkStateError::Closed))?;
        let (stop_tx, stop_rx) = watch::channel(false);

        let receive_loop = ReceiveLoop {
            socket,
            inbound,
            on_error: self.callbacks.on_error.clone(),
            stop: stop_rx,
            read_timeout: config.read_timeout,
            keep_alive_threshold: config.keep_alive_threshold,
            buf: vec![0u8; config.recv_buffer_size],
        };
        let handle = tokio::spawn(receive_loop.run());
        self.receiver = Some(ReceiveTask {
            stop: stop_tx,
            handle,
        });
        Ok(())
    }
}

/// CRTP link over UDP.
///
/// Every operation takes `&self`, so one driver can be shared through an
/// `Arc`: a consumer may block in [`receive`](Self::receive) while other
/// tasks send, pause or close. Lifecycle operations run one at a time.
pub struct UdpDriver {
    config: LinkConfig,
    shared: SyncMutex<LinkShared>,
    lifecycle: Mutex<()>,
    inbound_rx: Mutex<mpsc::UnboundedReceiver<Packet>>,
}

impl UdpDriver {
    /// Create an idle driver.
    pub fn new(config: LinkConfig) -> Self {
        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel();
        Self {
            config,
            shared: SyncMutex::new(LinkShared {
                inbound_tx: Some(inbound_tx),
                ..LinkShared::default()
            }),
            lifecycle: Mutex::new(()),
            inbound_rx: Mutex::new(inbound_rx),
        }
    }

    /// Connect to the vehicle at `address`, an IP literal such as
    /// `"192.168.43.42"`, and start the receive task.
    pub async fn connect(&self, address: &str, callbacks: LinkCallbacks) -> TransportResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        self.shared.lock().state.check_connect()?;

        let ip: IpAddr = address
            .parse()
            .map_err(|_| TransportError::InvalidAddressType(address.to_string()))?;
        let peer = SocketAddr::new(ip, self.config.remote_port);

        let socket =
            bind_with_retry(ip, self.config.local_port_base, self.config.max_bind_attempts).await?;
        socket.connect(peer).await?;
        let socket = Arc::new(LinkSocket::new(socket));
        let local = socket.local_addr().ok();

        {
            let mut shared = self.shared.lock();
            shared.socket = Some(socket);
            shared.peer = Some(peer);
            shared.callbacks = callbacks;
            shared.spawn_receiver(&self.config)?;
            shared.state = LinkState::Connected;
        }

        tracing::info!(peer = %peer, local = ?local, "udp link connected");
        Ok(())
    }

    /// Encode and send `packet`. Resets the keep-alive counter.
    pub async fn send(&self, packet: &Packet) -> TransportResult<()> {
        let socket = {
            let shared = self.shared.lock();
            shared.state.check_open()?;
            shared.socket()?
        };
        let frame = packet.encode()?;
        socket.send_frame(&frame).await?;
        Ok(())
    }

    /// Take the next inbound packet, or `None` if none arrived in time.
    ///
    /// After [`close`](Self::close), queued packets are still returned and
    /// then `None`, without waiting.
    pub async fn receive(&self, timeout: RecvTimeout) -> Option<Packet> {
        let mut inbound = self.inbound_rx.lock().await;
        match timeout {
            RecvTimeout::NoWait => inbound.try_recv().ok(),
            RecvTimeout::Forever => inbound.recv().await,
            RecvTimeout::After(wait) => tokio::time::timeout(wait, inbound.recv())
                .await
                .ok()
                .flatten(),
        }
    }

    /// Receive one packet and hand it to `router`.
    ///
    /// Returns `false` if no packet arrived in time.
    pub async fn dispatch_next(&self, router: &PortRouter, timeout: RecvTimeout) -> bool {
        match self.receive(timeout).await {
            Some(packet) => {
                router.dispatch(&packet);
                true
            }
            None => false,
        }
    }

    /// Stop the receive task, keeping the socket. No-op when already paused.
    pub async fn pause(&self) -> TransportResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let task = {
            let mut shared = self.shared.lock();
            shared.state.check_open()?;
            if !shared.state.is_receiving() {
                return Ok(());
            }
            shared.receiver.take()
        };
        if let Some(task) = task {
            task.stop().await;
        }

        let peer = {
            let mut shared = self.shared.lock();
            shared.state = LinkState::Paused;
            shared.peer
        };
        tracing::info!(peer = ?peer, "udp link paused");
        Ok(())
    }

    /// Restart the receive task after [`pause`](Self::pause). No-op when running.
    pub async fn restart(&self) -> TransportResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let (socket, peer) = {
            let shared = self.shared.lock();
            shared.state.check_open()?;
            if shared.state.is_receiving() {
                return Ok(());
            }
            let peer = shared.peer.ok_or(LinkStateError::NotConnected)?;
            (shared.socket()?, peer)
        };
        socket.connect(peer).await?;

        {
            let mut shared = self.shared.lock();
            shared.spawn_receiver(&self.config)?;
            shared.state = LinkState::Connected;
        }
        tracing::info!(peer = %peer, "udp link restarted");
        Ok(())
    }

    /// Stop the receive task, release the socket and drop the callbacks.
    ///
    /// A consumer blocked in [`receive`](Self::receive) is woken once the
    /// queue drains.
    pub async fn close(&self) -> TransportResult<()> {
        let _lifecycle = self.lifecycle.lock().await;
        let task = {
            let mut shared = self.shared.lock();
            shared.state.check_open()?;
            shared.receiver.take()
        };
        if let Some(task) = task {
            task.stop().await;
        }

        let peer = {
            let mut shared = self.shared.lock();
            shared.socket = None;
            shared.callbacks = LinkCallbacks::default();
            shared.inbound_tx = None;
            shared.state = LinkState::Closed;
            shared.peer
        };
        tracing::info!(peer = ?peer, "udp link closed");
        Ok(())
    }

    /// Current lifecycle state.
    pub fn state(&self) -> LinkState {
        self.shared.lock().state
    }

    /// Local socket address, while a socket is held.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.shared
            .lock()
            .socket
            .as_ref()
            .and_then(|s| s.local_addr().ok())
    }

    /// Peer address, once connected.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.shared.lock().peer
    }

    /// Datagrams received since the last application send.
    pub fn keep_alive_count(&self) -> u32 {
        self.shared
            .lock()
            .socket
            .as_ref()
            .map_or(0, |s| s.keep_alive_count())
    }

    /// Driver name.
    pub fn name(&self) -> &'static str {
        UDP_DRIVER_NAME
    }

    /// UDP has no discovery; the only candidate is the address itself.
    pub fn scan_interface(&self, address: &str) -> Vec<(String, String)> {
        vec![(address.to_string(), String::new())]
    }

    /// The configuration this driver was created with.
    pub fn config(&self) -> &LinkConfig {
        &self.config
    }
}

impl Drop for UdpDriver {
    fn drop(&mut self) {
        // The detached task sends its final keep-alive and exits.
        if let Some(task) = self.shared.get_mut().receiver.take() {
            let _ = task.stop.send(true);
        }
    }
}

impl std::fmt::Debug for UdpDriver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let shared = self.shared.lock();
        f.debug_struct("UdpDriver")
            .field("state", &shared.state)
            .field("peer", &shared.peer)
            .field("local", &shared.socket.as_ref().and_then(|s| s.local_addr().ok()))
            .finish()
    }
}

struct ReceiveLoop {
    socket: Arc<LinkSocket>,
    inbound: mpsc::UnboundedSender<Packet>,
    on_error: Option<ErrorCallback>,
    stop: watch::Receiver<bool>,
    read_timeout: Duration,
    keep_alive_threshold: u32,
    buf: Vec<u8>,
}

impl ReceiveLoop {
    async fn run(mut self) {
        if let Err(e) = self.socket.send_keep_alive().await {
            tracing::debug!(error = %e, "initial keep-alive failed");
        }

        loop {
            if self.stopping() {
                break;
            }

            let read = tokio::select! {
                biased;
                _ = self.stop.changed() => break,
                read = tokio::time::timeout(self.read_timeout, self.socket.recv(&mut self.buf)) => read,
            };

            match read {
                Err(_elapsed) => self.report_timeout(),
                Ok(Ok(len)) => self.on_datagram(len).await,
                Ok(Err(e)) if is_transient(&e) => {
                    tracing::debug!(error = %e, "transient receive error");
                }
                Ok(Err(e)) => {
                    tracing::debug!(error = %e, "receive loop exiting on socket error");
                    break;
                }
            }
        }

        if let Err(e) = self.socket.send_keep_alive().await {
            tracing::debug!(error = %e, "final keep-alive failed");
        }
        tracing::debug!("receive loop stopped");
    }

    fn stopping(&self) -> bool {
        *self.stop.borrow()
    }

    fn report_timeout(&self) {
        let message = TransportError::ConnectionTimeout.to_string();
        tracing::warn!(timeout = ?self.read_timeout, "{message}");
        if let Some(on_error) = &self.on_error {
            on_error(&message);
        }
    }

    /// Empty datagrams count towards the keep-alive like any other.
    async fn on_datagram(&self, len: usize) {
        let count = self.socket.note_received();

        match Packet::decode(&self.buf[..len]) {
            Ok(packet) => {
                tracing::trace!(port = packet.port(), channel = packet.channel(), len, "packet received");
                // The consumer side lives as long as the driver; a closed
                // queue only happens while the driver is being dropped.
                let _ = self.inbound.send(packet);
            }
            Err(e) => tracing::debug!(error = %e, len, "dropping undecodable datagram"),
        }

        if count > self.keep_alive_threshold && !self.stopping() {
            if let Err(e) = self.socket.send_keep_alive().await {
                tracing::debug!(error = %e, "idle keep-alive failed");
            }
        }
    }
}

/// Errors a connected UDP socket reports for ICMP feedback from the peer.
fn is_transient(e: &std::io::Error) -> bool {
    matches!(
        e.kind(),
        std::io::ErrorKind::ConnectionRefused
            | std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::Interrupted
    )
}
