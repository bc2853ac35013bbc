//! Port-based packet dispatch.

use std::fmt;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::crtp::Packet;

/// Handler invoked for every packet on its port.
pub type PacketHandler = Arc<dyn Fn(&Packet) + Send + Sync>;

struct Subscription {
    port: u8,
    channel: Option<u8>,
    handler: PacketHandler,
}

impl Subscription {
    fn matches(&self, packet: &Packet) -> bool {
        self.port == packet.port() && self.channel.is_none_or(|c| c == packet.channel())
    }

    fn is(&self, port: u8, channel: Option<u8>, handler: &PacketHandler) -> bool {
        self.port == port && self.channel == channel && Arc::ptr_eq(&self.handler, handler)
    }
}

/// Routes inbound packets to the handlers registered for their port.
///
/// The router owns no thread: whoever drains the transport queue calls
/// [`PortRouter::dispatch`], and handlers run on that caller's thread.
#[derive(Default)]
pub struct PortRouter {
    subscriptions: Mutex<Vec<Subscription>>,
}

impl PortRouter {
    /// Create an empty router.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `handler` for every packet on `port`.
    ///
    /// Registering the same handler on the same port twice has no effect.
    pub fn register(&self, port: impl Into<u8>, handler: PacketHandler) {
        self.insert(port.into(), None, handler);
    }

    /// Register `handler` for packets on `port` and `channel` only.
    pub fn register_channel(&self, port: impl Into<u8>, channel: u8, handler: PacketHandler) {
        self.insert(port.into(), Some(channel), handler);
    }

    /// Remove a handler added with [`register`](Self::register).
    ///
    /// Unknown handlers are ignored.
    pub fn unregister(&self, port: impl Into<u8>, handler: &PacketHandler) {
        self.remove(port.into(), None, handler);
    }

    /// Remove a handler added with [`register_channel`](Self::register_channel).
    pub fn unregister_channel(&self, port: impl Into<u8>, channel: u8, handler: &PacketHandler) {
        self.remove(port.into(), Some(channel), handler);
    }

    /// Invoke every matching handler, in registration order.
    ///
    /// Returns the number of handlers that ran to completion.
    pub fn dispatch(&self, packet: &Packet) -> usize {
        let handlers: Vec<PacketHandler> = self
            .subscriptions
            .lock()
            .iter()
            .filter(|s| s.matches(packet))
            .map(|s| Arc::clone(&s.handler))
            .collect();

        if handlers.is_empty() {
            tracing::trace!(port = packet.port(), channel = packet.channel(), "no handler for packet");
            return 0;
        }

        let mut completed = 0;
        for handler in handlers {
            match catch_unwind(AssertUnwindSafe(|| handler(packet))) {
                Ok(()) => completed += 1,
                Err(_) => tracing::error!(
                    port = packet.port(),
                    channel = packet.channel(),
                    "packet handler panicked"
                ),
            }
        }
        completed
    }

    /// Number of handlers registered for `port`, channel-filtered ones included.
    pub fn handler_count(&self, port: impl Into<u8>) -> usize {
        let port = port.into();
        self.subscriptions
            .lock()
            .iter()
            .filter(|s| s.port == port)
            .count()
    }

    fn insert(&self, port: u8, channel: Option<u8>, handler: PacketHandler) {
        let mut subscriptions = self.subscriptions.lock();
        if subscriptions.iter().any(|s| s.is(port, channel, &handler)) {
            return;
        }
        subscriptions.push(Subscription {
            port,
            channel,
            handler,
        });
    }

    fn remove(&self, port: u8, channel: Option<u8>, handler: &PacketHandler) {
        self.subscriptions
            .lock()
            .retain(|s| !s.is(port, channel, handler));
    }
}

impl fmt::Debug for PortRouter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PortRouter")
            .field("subscriptions", &self.subscriptions.lock().len())
            .finish()
    }
}
