//! Blocking bridges over the callback-driven driver API.
//!
//! The higher-level driver reports link lifecycle and log data through
//! [`EventSource`]s and opens links without blocking. [`SyncLink`] and
//! [`SyncLogger`] turn that into a blocking `open` and a blocking iterator
//! for sequential scripts.
//!
//! ```text
//!   caller thread                 driver callbacks
//!   ─────────────                 ────────────────
//!   SyncLink::open ──wait──┐      connected / connection_failed
//!                          └────── oneshot ◄──┘
//!
//!   SyncLogger::next ──wait──┐    data_received ──► mpsc ──┐
//!                            └────────────────────────────┘
//!                                 disconnected  ──► close channel
//! ```
//!
//! Both bridges wait with `blocking_recv` and have no timeout of their own:
//! if the driver never fires a callback, the caller stays blocked. They must
//! not be used from inside an async runtime.

mod link;
mod logger;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::BridgeError;
use crate::dispatch::EventSource;

pub use link::SyncLink;
pub use logger::SyncLogger;

/// Reason a link failed to open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkFailure {
    /// Link address.
    pub uri: String,
    /// Failure message from the driver.
    pub message: String,
}

/// Link lifecycle exposed by the higher-level driver.
///
/// Event arguments carry the link address.
pub trait LinkEvents: Send + Sync {
    /// Fired once the link is up.
    fn connected(&self) -> &EventSource<String>;

    /// Fired when opening the link fails.
    fn connection_failed(&self) -> &EventSource<LinkFailure>;

    /// Fired when the link goes down, requested or not.
    fn disconnected(&self) -> &EventSource<String>;

    /// Start opening `uri`. Returns immediately.
    fn open_link(&self, uri: &str);

    /// Start closing the link. Returns immediately.
    fn close_link(&self);
}

/// One sample delivered by a running log block.
#[derive(Debug, Clone, PartialEq)]
pub struct LogEntry {
    /// Peer timestamp in milliseconds.
    pub timestamp: u64,
    /// Variable name to value.
    pub values: BTreeMap<String, f64>,
    /// Name of the log block that produced the sample.
    pub config_name: String,
}

/// A log configuration owned by the driver's log subsystem.
pub trait LogBlock: Send + Sync {
    /// Block name.
    fn name(&self) -> &str;

    /// Start streaming samples.
    fn start(&self);

    /// Stop streaming samples.
    fn stop(&self);

    /// Remove the block from the peer.
    fn delete(&self);

    /// Samples as they arrive.
    fn data_received(&self) -> &EventSource<LogEntry>;
}

/// The driver's log subsystem.
pub trait LogService: Send + Sync {
    /// Register `config` so it can be started.
    fn add_config(&self, config: &Arc<dyn LogBlock>) -> Result<(), BridgeError>;
}
