//! Protocol constants for CRTP over UDP.
//!
//! These values are fixed by the wire protocol and the peer firmware.

use std::time::Duration;

// =============================================================================
// FRAME LAYOUT
// =============================================================================

/// Largest CRTP frame carried by one datagram (header + payload + checksum).
pub const CRTP_MTU: usize = 32;

/// Header byte size.
pub const HEADER_SIZE: usize = 1;

/// Trailing checksum byte size.
pub const CHECKSUM_SIZE: usize = 1;

/// Smallest decodable frame (header + checksum, empty payload).
pub const MIN_FRAME_SIZE: usize = HEADER_SIZE + CHECKSUM_SIZE;

/// Largest payload a single packet can carry.
pub const MAX_PAYLOAD: usize = CRTP_MTU - MIN_FRAME_SIZE;

/// Highest valid port number (4 bits).
pub const MAX_PORT: u8 = 0x0F;

/// Highest valid channel number (2 bits).
pub const MAX_CHANNEL: u8 = 0x03;

/// Reserved header bits, always set on outbound frames.
pub const HEADER_RESERVED_BITS: u8 = 0x03 << 2;

// =============================================================================
// UDP LINK
// =============================================================================

/// Fixed UDP port the peer listens on.
pub const DEFAULT_REMOTE_PORT: u16 = 2390;

/// First local port tried when binding.
pub const DEFAULT_LOCAL_PORT_BASE: u16 = 2390;

/// Bind attempts before giving up on finding a free local port.
pub const DEFAULT_MAX_BIND_ATTEMPTS: u32 = 1000;

/// Keep-alive datagram. Registers this host with the peer and signals liveness.
pub const KEEP_ALIVE: [u8; 4] = [0xFF, 0x01, 0x01, 0x01];

/// Inbound packets received without an application send before an idle
/// keep-alive is transmitted.
pub const KEEP_ALIVE_THRESHOLD: u32 = 20;

/// Socket read timeout in the receive loop.
pub const READ_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive buffer size; larger than [`CRTP_MTU`] so oversized datagrams are
/// read whole instead of truncated.
pub const RECV_BUFFER_SIZE: usize = 1024;

/// Name reported by the UDP driver.
pub const UDP_DRIVER_NAME: &str = "udp";
