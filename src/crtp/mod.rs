//! CRTP packet codec.
//!
//! Every datagram on the link carries exactly one frame:
//!
//! ```text
//! +--------+-------------------+----------+
//! | Header | Payload           | Checksum |
//! | 1 byte | 0..=30 bytes      | 1 byte   |
//! +--------+-------------------+----------+
//! ```
//!
//! The header packs the port in its upper nibble and the channel in its two
//! lowest bits. The checksum is the byte sum of header and payload modulo 256.
//!
//! This module performs no I/O.

mod packet;
mod port;

pub use packet::{Packet, checksum, decode, encode};
pub(crate) use packet::put_f32s;
pub use port::CrtpPort;
