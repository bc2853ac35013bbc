//! Blocking iteration over log samples.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;
use tokio::sync::mpsc;

use super::{LinkEvents, LogBlock, LogEntry, LogService, SyncLink};
use crate::core::{LinkStateError, Result};
use crate::dispatch::Callback;

type EntrySender = Arc<Mutex<Option<mpsc::UnboundedSender<LogEntry>>>>;

struct Subscription {
    data: Callback<LogEntry>,
    disconnected: Callback<String>,
}

/// Streams the samples of one log block as a blocking iterator.
///
/// `next` waits for the next sample and returns `None` once the logger is
/// disconnected, whether by [`disconnect`](Self::disconnect) or because
/// the link went down.
///
/// ```no_run
/// # fn run(link: &crtp_link::sync::SyncLink,
/// #        log: std::sync::Arc<dyn crtp_link::sync::LogService>,
/// #        block: std::sync::Arc<dyn crtp_link::sync::LogBlock>) -> crtp_link::Result<()> {
/// use crtp_link::sync::SyncLogger;
///
/// let mut logger = SyncLogger::from_link(link, log, block);
/// logger.connect()?;
/// for entry in logger.by_ref().take(10) {
///     println!("{} {:?}", entry.timestamp, entry.values);
/// }
/// logger.disconnect();
/// # Ok(())
/// # }
/// ```
pub struct SyncLogger {
    link: Arc<dyn LinkEvents>,
    log: Arc<dyn LogService>,
    config: Arc<dyn LogBlock>,
    is_connected: Arc<AtomicBool>,
    sender: EntrySender,
    entries: Option<mpsc::UnboundedReceiver<LogEntry>>,
    subscription: Option<Subscription>,
}

impl SyncLogger {
    /// Logger for `config` on `link`.
    pub fn new(link: Arc<dyn LinkEvents>, log: Arc<dyn LogService>, config: Arc<dyn LogBlock>) -> Self {
        Self {
            link,
            log,
            config,
            is_connected: Arc::new(AtomicBool::new(false)),
            sender: Arc::new(Mutex::new(None)),
            entries: None,
            subscription: None,
        }
    }

    /// Logger on the driver behind `link`.
    pub fn from_link(link: &SyncLink, log: Arc<dyn LogService>, config: Arc<dyn LogBlock>) -> Self {
        Self::new(Arc::clone(link.link()), log, config)
    }

    /// Register and start the log block.
    pub fn connect(&mut self) -> Result<()> {
        if self.is_connected() {
            return Err(LinkStateError::AlreadyConnected.into());
        }
        // Left over from a link loss.
        self.release();

        self.log.add_config(&self.config)?;

        let (tx, rx) = mpsc::unbounded_channel();
        *self.sender.lock() = Some(tx);
        self.entries = Some(rx);

        let sender = Arc::clone(&self.sender);
        let data: Callback<LogEntry> = Arc::new(move |entry: &LogEntry| {
            if let Some(tx) = sender.lock().as_ref() {
                let _ = tx.send(entry.clone());
            }
        });

        let sender = Arc::clone(&self.sender);
        let is_connected = Arc::clone(&self.is_connected);
        let disconnected: Callback<String> = Arc::new(move |uri: &String| {
            is_connected.store(false, Ordering::Release);
            sender.lock().take();
            tracing::warn!(%uri, "link lost while logging");
        });

        self.config.data_received().add_callback(Arc::clone(&data));
        self.link.disconnected().add_callback(Arc::clone(&disconnected));
        self.subscription = Some(Subscription { data, disconnected });

        self.config.start();
        self.is_connected.store(true, Ordering::Release);
        tracing::info!(config = self.config.name(), "logging started");
        Ok(())
    }

    /// Stop and delete the log block. Idempotent.
    pub fn disconnect(&mut self) {
        if self.is_connected.swap(false, Ordering::AcqRel) {
            self.config.stop();
            self.config.delete();
            tracing::info!(config = self.config.name(), "logging stopped");
        }
        self.release();
    }

    /// Whether the block is streaming.
    pub fn is_connected(&self) -> bool {
        self.is_connected.load(Ordering::Acquire)
    }

    fn release(&mut self) {
        if let Some(subscription) = self.subscription.take() {
            self.config.data_received().remove_callback(&subscription.data);
            self.link.disconnected().remove_callback(&subscription.disconnected);
        }
        self.sender.lock().take();
        self.entries = None;
    }
}

impl Iterator for SyncLogger {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        if !self.is_connected() {
            return None;
        }
        let entry = self.entries.as_mut()?.blocking_recv();
        if entry.is_none() {
            self.is_connected.store(false, Ordering::Release);
        }
        entry
    }
}

impl Drop for SyncLogger {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for SyncLogger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncLogger")
            .field("config", &self.config.name())
            .field("is_connected", &self.is_connected())
            .finish()
    }
}
