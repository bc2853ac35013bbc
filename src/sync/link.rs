//! Blocking link open/close.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::oneshot;

use super::{LinkEvents, LinkFailure};
use crate::core::{BridgeError, LinkStateError, Result};
use crate::dispatch::Callback;

type OpenOutcome = std::result::Result<(), String>;
type PendingOpen = Arc<Mutex<Option<oneshot::Sender<OpenOutcome>>>>;

struct Lifecycle {
    connected: Callback<String>,
    failed: Callback<LinkFailure>,
    disconnected: Callback<String>,
}

impl Lifecycle {
    fn remove(self, link: &dyn LinkEvents) {
        link.connected().remove_callback(&self.connected);
        link.connection_failed().remove_callback(&self.failed);
        link.disconnected().remove_callback(&self.disconnected);
    }
}

/// Cleared by whoever unsubscribes first: the bridge or the disconnect event.
type LifecycleSlot = Arc<Mutex<Option<Lifecycle>>>;

/// Opens a link and blocks until the driver reports the outcome.
///
/// A disconnect reported by the driver marks the link closed and removes
/// the bridge's callbacks. Dropping an open `SyncLink` closes the link.
pub struct SyncLink {
    link: Arc<dyn LinkEvents>,
    uri: String,
    is_open: Arc<AtomicBool>,
    pending: PendingOpen,
    lifecycle: LifecycleSlot,
}

impl SyncLink {
    /// Bridge for `uri` on `link`. Nothing happens until [`open`](Self::open).
    pub fn new(link: Arc<dyn LinkEvents>, uri: impl Into<String>) -> Self {
        Self {
            link,
            uri: uri.into(),
            is_open: Arc::new(AtomicBool::new(false)),
            pending: Arc::new(Mutex::new(None)),
            lifecycle: Arc::new(Mutex::new(None)),
        }
    }

    /// Open the link, blocking until it is connected or has failed.
    ///
    /// Fails with [`LinkStateError::AlreadyOpen`] without touching the link
    /// if already open, and with [`BridgeError::LinkOpen`] if the driver
    /// reports a failure. A failed open leaves the bridge ready for another
    /// attempt.
    pub fn open(&mut self) -> Result<()> {
        if self.is_open() {
            return Err(LinkStateError::AlreadyOpen.into());
        }

        let (tx, rx) = oneshot::channel();
        *self.pending.lock() = Some(tx);
        self.subscribe();

        tracing::info!(uri = %self.uri, "opening link");
        self.link.open_link(&self.uri);

        let outcome = rx
            .blocking_recv()
            .unwrap_or_else(|_| Err("link closed while opening".to_string()));

        match outcome {
            Ok(()) => {
                self.is_open.store(true, Ordering::Release);
                tracing::info!(uri = %self.uri, "link open");
                Ok(())
            }
            Err(message) => {
                self.unsubscribe();
                tracing::warn!(uri = %self.uri, %message, "link failed to open");
                Err(BridgeError::LinkOpen {
                    uri: self.uri.clone(),
                    message,
                }
                .into())
            }
        }
    }

    /// Close the link. Safe to call at any time, including before `open`.
    pub fn close(&mut self) {
        self.link.close_link();
        self.unsubscribe();
        self.pending.lock().take();
        if self.is_open.swap(false, Ordering::AcqRel) {
            tracing::info!(uri = %self.uri, "link closed");
        }
    }

    /// Whether the link is open. Cleared when the driver reports a disconnect.
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Acquire)
    }

    /// Link address.
    pub fn uri(&self) -> &str {
        &self.uri
    }

    /// The underlying driver.
    pub fn link(&self) -> &Arc<dyn LinkEvents> {
        &self.link
    }

    fn subscribe(&mut self) {
        self.unsubscribe();

        let pending = Arc::clone(&self.pending);
        let connected: Callback<String> = Arc::new(move |_uri: &String| {
            if let Some(tx) = pending.lock().take() {
                let _ = tx.send(Ok(()));
            }
        });

        let pending = Arc::clone(&self.pending);
        let failed: Callback<LinkFailure> = Arc::new(move |failure: &LinkFailure| {
            if let Some(tx) = pending.lock().take() {
                let _ = tx.send(Err(failure.message.clone()));
            }
        });

        let is_open = Arc::clone(&self.is_open);
        let pending = Arc::clone(&self.pending);
        let slot = Arc::downgrade(&self.lifecycle);
        let link = Arc::downgrade(&self.link);
        let disconnected: Callback<String> = Arc::new(move |uri: &String| {
            if is_open.swap(false, Ordering::AcqRel) {
                tracing::info!(%uri, "link lost");
            }
            if let Some(tx) = pending.lock().take() {
                let _ = tx.send(Err("link disconnected while opening".to_string()));
            }
            let lifecycle = slot.upgrade().and_then(|slot| slot.lock().take());
            if let (Some(lifecycle), Some(link)) = (lifecycle, link.upgrade()) {
                lifecycle.remove(link.as_ref());
            }
        });

        self.link.connected().add_callback(Arc::clone(&connected));
        self.link.connection_failed().add_callback(Arc::clone(&failed));
        self.link.disconnected().add_callback(Arc::clone(&disconnected));
        *self.lifecycle.lock() = Some(Lifecycle {
            connected,
            failed,
            disconnected,
        });
    }

    fn unsubscribe(&mut self) {
        let lifecycle = self.lifecycle.lock().take();
        if let Some(lifecycle) = lifecycle {
            lifecycle.remove(self.link.as_ref());
        }
    }
}

impl Drop for SyncLink {
    fn drop(&mut self) {
        if self.is_open() {
            self.close();
        } else {
            self.unsubscribe();
        }
    }
}

impl std::fmt::Debug for SyncLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLink")
            .field("uri", &self.uri)
            .field("is_open", &self.is_open())
            .finish()
    }
}
