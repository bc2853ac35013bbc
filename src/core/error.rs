//! Error types for the CRTP link stack.

use thiserror::Error;

/// Malformed frame, port, channel or payload.
///
/// Codec errors are always returned to the caller that asked for the
/// encode/decode; they are never dropped silently.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ProtocolError {
    /// Port does not fit in 4 bits.
    #[error("invalid port {0} (must be 0..=15)")]
    InvalidPort(u8),

    /// Channel does not fit in 2 bits.
    #[error("invalid channel {0} (must be 0..=3)")]
    InvalidChannel(u8),

    /// Payload exceeds what one frame can carry.
    #[error("payload too large: {len} bytes (max {max})")]
    PayloadTooLarge {
        /// Actual payload length.
        len: usize,
        /// Maximum allowed payload length.
        max: usize,
    },

    /// Frame shorter than header + checksum.
    #[error("frame too short: {len} bytes")]
    FrameTooShort {
        /// Actual frame length.
        len: usize,
    },

    /// A setpoint or message field is outside its encodable range.
    #[error("{field} out of range: {value}")]
    ValueOutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// Offending value.
        value: f64,
    },

    /// Payload content does not match the message layout.
    #[error("malformed payload: {0}")]
    Malformed(String),
}

/// Operation invalid for the current link state.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LinkStateError {
    /// The link has not been connected yet.
    #[error("link not connected")]
    NotConnected,

    /// `connect` called on a link that is already connected.
    #[error("link already connected")]
    AlreadyConnected,

    /// `open` called on a bridge whose link is already open.
    #[error("link already open")]
    AlreadyOpen,

    /// The link has been closed; no transition out of this state.
    #[error("link closed")]
    Closed,
}

/// Asynchronous failure surfaced to a blocking caller.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The underlying driver reported that opening the link failed.
    #[error("failed to open link to {uri}: {message}")]
    LinkOpen {
        /// Address the link was opened to.
        uri: String,
        /// Failure message reported by the driver.
        message: String,
    },

    /// The log subsystem rejected the log configuration.
    #[error("log configuration rejected: {0}")]
    LogConfig(String),
}

/// Top-level error for the crate.
#[derive(Debug, Error)]
pub enum CrtpError {
    /// Codec error.
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// Link state error.
    #[error("link state error: {0}")]
    LinkState(#[from] LinkStateError),

    /// Bridge error.
    #[error("bridge error: {0}")]
    Bridge(#[from] BridgeError),

    /// Transport error.
    #[cfg(feature = "transport")]
    #[error("transport error: {0}")]
    Transport(#[from] crate::transport::TransportError),

    /// I/O error.
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for crate-level operations.
pub type Result<T> = std::result::Result<T, CrtpError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_protocol_error_messages() {
        assert_eq!(
            ProtocolError::InvalidPort(16).to_string(),
            "invalid port 16 (must be 0..=15)"
        );
        assert_eq!(
            ProtocolError::PayloadTooLarge { len: 31, max: 30 }.to_string(),
            "payload too large: 31 bytes (max 30)"
        );
    }

    #[test]
    fn test_value_out_of_range_compares_by_value() {
        let err = ProtocolError::ValueOutOfRange {
            field: "thrust",
            value: 65536.0,
        };
        assert_eq!(err.clone(), err);
        assert_ne!(
            err,
            ProtocolError::ValueOutOfRange {
                field: "thrust",
                value: 70000.0,
            }
        );
        assert_eq!(err.to_string(), "thrust out of range: 65536");
    }

    #[test]
    fn test_conversions_into_top_level() {
        let err: CrtpError = ProtocolError::InvalidChannel(4).into();
        assert!(matches!(err, CrtpError::Protocol(ProtocolError::InvalidChannel(4))));

        let err: CrtpError = LinkStateError::AlreadyOpen.into();
        assert!(matches!(err, CrtpError::LinkState(LinkStateError::AlreadyOpen)));

        let err: CrtpError = BridgeError::LogConfig("full".into()).into();
        assert_eq!(
            err.to_string(),
            "bridge error: log configuration rejected: full"
        );
    }
}
