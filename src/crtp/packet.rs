//! Packet encoding and decoding.

use crate::core::{
    CHECKSUM_SIZE, HEADER_RESERVED_BITS, HEADER_SIZE, MAX_CHANNEL, MAX_PAYLOAD, MAX_PORT,
    MIN_FRAME_SIZE, ProtocolError,
};

use super::port::CrtpPort;

/// Sum of `bytes` modulo 256.
pub fn checksum(bytes: &[u8]) -> u8 {
    bytes.iter().fold(0u8, |acc, b| acc.wrapping_add(*b))
}

/// Append `values` as little-endian `f32`s, the layout every subsystem
/// payload uses for floats.
pub(crate) fn put_f32s(buf: &mut Vec<u8>, values: &[f32]) {
    for v in values {
        buf.extend_from_slice(&v.to_le_bytes());
    }
}

/// Encode a frame from its parts.
///
/// Returns `header ‖ payload ‖ checksum`.
pub fn encode(port: u8, channel: u8, payload: &[u8]) -> Result<Vec<u8>, ProtocolError> {
    validate(port, channel, payload.len())?;

    let header = header_byte(port, channel);
    let mut frame = Vec::with_capacity(HEADER_SIZE + payload.len() + CHECKSUM_SIZE);
    frame.push(header);
    frame.extend_from_slice(payload);
    frame.push(checksum(&frame));
    Ok(frame)
}

/// Decode a received frame.
///
/// The trailing checksum is stripped but not verified; see
/// [`Packet::is_checksum_valid`] for an explicit check.
pub fn decode(frame: &[u8]) -> Result<Packet, ProtocolError> {
    if frame.len() < MIN_FRAME_SIZE {
        return Err(ProtocolError::FrameTooShort { len: frame.len() });
    }

    let header = frame[0];
    Ok(Packet {
        port: header >> 4,
        channel: header & MAX_CHANNEL,
        data: frame[HEADER_SIZE..frame.len() - CHECKSUM_SIZE].to_vec(),
    })
}

fn validate(port: u8, channel: u8, len: usize) -> Result<(), ProtocolError> {
    if port > MAX_PORT {
        return Err(ProtocolError::InvalidPort(port));
    }
    if channel > MAX_CHANNEL {
        return Err(ProtocolError::InvalidChannel(channel));
    }
    if len > MAX_PAYLOAD {
        return Err(ProtocolError::PayloadTooLarge {
            len,
            max: MAX_PAYLOAD,
        });
    }
    Ok(())
}

fn header_byte(port: u8, channel: u8) -> u8 {
    (port << 4) | HEADER_RESERVED_BITS | (channel & MAX_CHANNEL)
}

/// A CRTP packet: port, channel and payload.
///
/// Immutable once built. Packets built with [`Packet::new`] always fit in a
/// frame; packets produced by [`decode`] keep whatever payload the datagram
/// carried.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Packet {
    port: u8,
    channel: u8,
    data: Vec<u8>,
}

impl Packet {
    /// Create an outbound packet, validating port, channel and payload size.
    pub fn new(port: impl Into<u8>, channel: u8, data: impl Into<Vec<u8>>) -> Result<Self, ProtocolError> {
        let port = port.into();
        let data = data.into();
        validate(port, channel, data.len())?;
        Ok(Self {
            port,
            channel,
            data,
        })
    }

    /// Parse a received frame. Same as [`decode`].
    pub fn decode(frame: &[u8]) -> Result<Self, ProtocolError> {
        decode(frame)
    }

    /// Serialize to a wire frame.
    pub fn encode(&self) -> Result<Vec<u8>, ProtocolError> {
        encode(self.port, self.channel, &self.data)
    }

    /// Port number (0..=15).
    pub fn port(&self) -> u8 {
        self.port
    }

    /// Well-known port, if the port number has one.
    pub fn crtp_port(&self) -> Option<CrtpPort> {
        CrtpPort::from_u8(self.port)
    }

    /// Channel number (0..=3).
    pub fn channel(&self) -> u8 {
        self.channel
    }

    /// Payload bytes.
    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// Consume the packet, returning its payload.
    pub fn into_data(self) -> Vec<u8> {
        self.data
    }

    /// Header byte as sent on the wire.
    pub fn header(&self) -> u8 {
        header_byte(self.port, self.channel)
    }

    /// Checksum byte as sent on the wire.
    pub fn checksum(&self) -> u8 {
        self.header().wrapping_add(checksum(&self.data))
    }

    /// Whether the last byte of `frame` matches the sum of the bytes before it.
    ///
    /// The receive path never calls this; checksums are informational only.
    pub fn is_checksum_valid(frame: &[u8]) -> bool {
        match frame.split_last() {
            Some((last, rest)) if !rest.is_empty() => checksum(rest) == *last,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_put_f32s_little_endian() {
        let mut buf = vec![0xAA];
        put_f32s(&mut buf, &[1.0, -2.0]);
        assert_eq!(buf, hex::decode("aa0000803f000000c0").unwrap());
    }

    #[test]
    fn test_encode_wire_layout() {
        let frame = encode(CrtpPort::Localization.as_u8(), 1, &[0x03]).unwrap();
        // header: 0x60 | 0x0C | 0x01
        assert_eq!(frame, hex::decode("6d0370").unwrap());
    }

    #[test]
    fn test_encode_checksum_wraps() {
        let payload = [0xFF; 30];
        let frame = encode(15, 3, &payload).unwrap();
        assert_eq!(frame.len(), 32);
        let expected = payload.iter().fold(0xFFu32, |acc, b| acc + *b as u32) % 256;
        assert_eq!(frame[31] as u32, expected);
    }

    #[test]
    fn test_roundtrip_all_ports_and_channels() {
        let payload: Vec<u8> = (0..MAX_PAYLOAD as u8).collect();
        for port in 0..=MAX_PORT {
            for channel in 0..=MAX_CHANNEL {
                for len in [0, 1, 17, MAX_PAYLOAD] {
                    let frame = encode(port, channel, &payload[..len]).unwrap();
                    let packet = decode(&frame).unwrap();
                    assert_eq!(packet.port(), port);
                    assert_eq!(packet.channel(), channel);
                    assert_eq!(packet.data(), &payload[..len]);
                    assert_eq!(packet.data().len(), frame.len() - 2);
                }
            }
        }
    }

    #[test]
    fn test_encode_rejects_invalid_port() {
        assert_eq!(encode(16, 0, &[]), Err(ProtocolError::InvalidPort(16)));
    }

    #[test]
    fn test_encode_rejects_invalid_channel() {
        assert_eq!(encode(0, 4, &[]), Err(ProtocolError::InvalidChannel(4)));
    }

    #[test]
    fn test_encode_rejects_oversized_payload() {
        assert_eq!(
            encode(0, 0, &[0u8; 31]),
            Err(ProtocolError::PayloadTooLarge { len: 31, max: 30 })
        );
        assert!(Packet::new(0u8, 0, vec![0u8; 31]).is_err());
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode(&[]), Err(ProtocolError::FrameTooShort { len: 0 }));
        assert_eq!(decode(&[0x3C]), Err(ProtocolError::FrameTooShort { len: 1 }));
    }

    #[test]
    fn test_decode_empty_payload() {
        let packet = decode(&[0xFF, 0x00]).unwrap();
        assert_eq!(packet.port(), 15);
        assert_eq!(packet.channel(), 3);
        assert!(packet.data().is_empty());
    }

    #[test]
    fn test_decode_ignores_bad_checksum() {
        let mut frame = encode(5, 2, &[1, 2, 3]).unwrap();
        *frame.last_mut().unwrap() ^= 0xFF;

        assert!(!Packet::is_checksum_valid(&frame));
        let packet = decode(&frame).unwrap();
        assert_eq!(packet.port(), 5);
        assert_eq!(packet.data(), &[1, 2, 3]);
    }

    #[test]
    fn test_packet_encode_matches_free_function() {
        let packet = Packet::new(CrtpPort::Commander, 0, vec![9, 8, 7]).unwrap();
        let frame = packet.encode().unwrap();
        assert_eq!(frame, encode(3, 0, &[9, 8, 7]).unwrap());
        assert_eq!(frame[0], packet.header());
        assert_eq!(*frame.last().unwrap(), packet.checksum());
        assert!(Packet::is_checksum_valid(&frame));
        assert_eq!(packet.crtp_port(), Some(CrtpPort::Commander));
    }

    #[test]
    fn test_checksum_validity_of_short_frames() {
        assert!(!Packet::is_checksum_valid(&[]));
        assert!(!Packet::is_checksum_valid(&[0x00]));
    }
}
