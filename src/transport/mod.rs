//! UDP transport for CRTP.
//!
//! Each datagram carries exactly one frame. The driver binds the first free
//! local port from [`LinkConfig::local_port_base`] upwards, talks to the
//! vehicle on [`LinkConfig::remote_port`], and keeps NAT state alive with a
//! fixed 4-byte keep-alive datagram.
//!
//! ```text
//!            send() ──► encode ──► ┐
//!                                  ├─ write lock ─► UdpSocket ─► vehicle
//!   receive task ─── keep-alive ──►┘                    │
//!        ▲                                              │
//!        └──────────── decode ◄───────────── recv ◄─────┘
//!        │
//!        ▼
//!   inbound queue ──► receive() / dispatch_next() ──► PortRouter
//! ```

mod config;
mod connection;
mod driver;
mod error;
mod socket;

pub use config::{LinkConfig, LinkConfigBuilder};
pub use connection::LinkState;
pub use driver::{ErrorCallback, LinkCallbacks, QualityCallback, RecvTimeout, UdpDriver};
pub use error::{TransportError, TransportResult};
