//! Link connection state machine.
//!
//! ```text
//! Idle --connect--> Connected --pause--> Paused --restart--> Connected
//!                       |                   |
//!                       +------close--------+--> Closed (terminal)
//! ```

use crate::core::LinkStateError;

/// Lifecycle state of a transport link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LinkState {
    /// Created, never connected.
    #[default]
    Idle,
    /// Socket bound and connected, receive task running.
    Connected,
    /// Receive task stopped; socket and peer address retained.
    Paused,
    /// Resources released. No transition out.
    Closed,
}

impl LinkState {
    /// Whether the socket is available for sending.
    pub fn can_send(self) -> bool {
        matches!(self, LinkState::Connected | LinkState::Paused)
    }

    /// Whether the receive task is running.
    pub fn is_receiving(self) -> bool {
        self == LinkState::Connected
    }

    /// Check that `connect` is allowed.
    pub fn check_connect(self) -> Result<(), LinkStateError> {
        match self {
            LinkState::Idle => Ok(()),
            LinkState::Connected | LinkState::Paused => Err(LinkStateError::AlreadyConnected),
            LinkState::Closed => Err(LinkStateError::Closed),
        }
    }

    /// Check that the link holds a socket (send, pause, restart, close).
    pub fn check_open(self) -> Result<(), LinkStateError> {
        match self {
            LinkState::Connected | LinkState::Paused => Ok(()),
            LinkState::Idle => Err(LinkStateError::NotConnected),
            LinkState::Closed => Err(LinkStateError::Closed),
        }
    }
}
