//! Transport layer error types.

use std::io;

use thiserror::Error;

use crate::core::{LinkStateError, ProtocolError};

/// Transport layer errors.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Frame encoding error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// I/O error (socket operations).
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),

    /// The address is not an IP literal. This transport never accepts
    /// symbolic or radio-style addresses.
    #[error("not an IP address: {0}")]
    InvalidAddressType(String),

    /// No free local port found.
    #[error("no free local port in {base}..+{attempts}")]
    BindExhausted {
        /// First port tried.
        base: u16,
        /// Number of ports tried.
        attempts: u32,
    },

    /// Nothing received within the read timeout.
    /// Reported through the error callback; the link stays up.
    #[error("Connection timeout!")]
    ConnectionTimeout,

    /// Operation invalid in the current link state.
    #[error("{0}")]
    LinkState(#[from] LinkStateError),
}

impl TransportError {
    /// Whether this is a read timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::ConnectionTimeout)
    }

    /// Check if this error means the link cannot be used any more.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::BindExhausted { .. }
                | TransportError::InvalidAddressType(_)
                | TransportError::LinkState(LinkStateError::Closed)
        )
    }
}

/// Result type for transport operations.
pub type TransportResult<T> = Result<T, TransportError>;
