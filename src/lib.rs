//! # crtp-link
//!
//! Host-side link layer for small quadcopters speaking **CRTP**, the
//! Communication Real-Time Protocol that multiplexes subsystems ("ports")
//! over a single packet link.
//!
//! - **Codec**: frame, checksum and decode packets ([`crtp`])
//! - **Transport**: UDP driver with a receive task, keep-alive and read
//!   timeout reporting ([`transport`])
//! - **Dispatch**: route inbound packets by port to subsystem handlers
//!   ([`dispatch`])
//! - **Bridges**: blocking `open` and a blocking log iterator over the
//!   callback-driven driver API ([`sync`])
//! - **Subsystems**: localization messages with smallest-three quaternion
//!   compression ([`localization`]) and setpoints ([`commander`])
//!
//! ## Feature Flags
//!
//! - `transport` (default): UDP transport driver
//! - `sync` (default): blocking bridges
//!
//! ## Example Usage
//!
//! ```rust
//! use crtp_link::prelude::*;
//! use std::sync::Arc;
//!
//! let router = PortRouter::new();
//! router.register(
//!     CrtpPort::Console,
//!     Arc::new(|packet: &Packet| {
//!         print!("{}", String::from_utf8_lossy(packet.data()));
//!     }),
//! );
//!
//! let frame = encode(CrtpPort::Console.as_u8(), 0, b"hello\n")?;
//! assert_eq!(frame.len(), 8);
//!
//! let packet = decode(&frame)?;
//! assert_eq!(router.dispatch(&packet), 1);
//! # Ok::<(), crtp_link::CrtpError>(())
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![cfg_attr(docsrs, feature(doc_cfg))]

// Core module (always included)
pub mod core;

// Packet codec
pub mod crtp;

// Port routing and event sources
pub mod dispatch;

// Subsystem encoders
pub mod commander;
pub mod localization;

// Transport layer (feature-gated)
#[cfg(feature = "transport")]
#[cfg_attr(docsrs, doc(cfg(feature = "transport")))]
pub mod transport;

// Blocking bridges (feature-gated)
#[cfg(feature = "sync")]
#[cfg_attr(docsrs, doc(cfg(feature = "sync")))]
pub mod sync;

/// Prelude module for convenient imports.
pub mod prelude {
    pub use crate::core::*;
    pub use crate::crtp::{CrtpPort, Packet, decode, encode};
    pub use crate::dispatch::{Callback, EventSource, PacketHandler, PortRouter};

    #[cfg(feature = "transport")]
    pub use crate::transport::{
        LinkCallbacks, LinkConfig, LinkConfigBuilder, LinkState, RecvTimeout, TransportError,
        TransportResult, UdpDriver,
    };

    #[cfg(feature = "sync")]
    pub use crate::sync::{LinkEvents, LogBlock, LogEntry, LogService, SyncLink, SyncLogger};
}

// Re-export commonly used items at crate root
pub use core::{BridgeError, CrtpError, LinkStateError, ProtocolError, Result};
pub use crtp::{CrtpPort, Packet};
pub use dispatch::PortRouter;

#[cfg(feature = "transport")]
pub use transport::{LinkConfig, UdpDriver};

#[cfg(feature = "sync")]
pub use sync::{SyncLink, SyncLogger};
