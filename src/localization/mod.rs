//! Localization channel: external position/pose, LPS and emergency messages.
//!
//! Outbound messages are built as [`Packet`]s for the caller to send.
//! Inbound packets on the localization port are decoded by
//! [`LocalizationPacket::parse`]; a [`LocalizationListener`] does that for
//! every packet the router delivers.

pub mod quaternion;

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::core::ProtocolError;
use crate::crtp::{CrtpPort, Packet, put_f32s};
use crate::dispatch::{EventSource, PacketHandler, PortRouter};

pub use quaternion::{compress, decompress};

/// Channel for plain external position.
pub const POSITION_CH: u8 = 0;
/// Channel for typed localization messages.
pub const GENERIC_CH: u8 = 1;

/// Message type ids on [`GENERIC_CH`].
pub mod msg {
    /// Anchor distance report.
    pub const RANGE_STREAM_REPORT: u8 = 0;
    /// Anchor distance report, half-precision floats.
    pub const RANGE_STREAM_REPORT_FP16: u8 = 1;
    /// Short LPP packet forwarded to an anchor.
    pub const LPS_SHORT_LPP_PACKET: u8 = 2;
    /// Emergency stop.
    pub const EMERGENCY_STOP: u8 = 3;
    /// Emergency stop watchdog.
    pub const EMERGENCY_STOP_WATCHDOG: u8 = 4;
    /// GNSS NMEA sentence.
    pub const COMM_GNSS_NMEA: u8 = 6;
    /// GNSS proprietary data.
    pub const COMM_GNSS_PROPRIETARY: u8 = 7;
    /// External pose (position + quaternion).
    pub const EXT_POSE: u8 = 8;
    /// Packed external poses.
    pub const EXT_POSE_PACKED: u8 = 9;
    /// Emergency reset.
    pub const EMERGENCY_RESET: u8 = 10;
}

/// Size of one anchor record in a range stream report (id + `f32`).
const RANGE_RECORD_SIZE: usize = 5;

fn generic(kind: u8, body: &[u8]) -> Result<Packet, ProtocolError> {
    let mut data = Vec::with_capacity(1 + body.len());
    data.push(kind);
    data.extend_from_slice(body);
    Packet::new(CrtpPort::Localization, GENERIC_CH, data)
}

/// External position `[x, y, z]` in meters, forwarded to the state estimator.
pub fn ext_position(pos: [f32; 3]) -> Result<Packet, ProtocolError> {
    let mut data = Vec::with_capacity(12);
    put_f32s(&mut data, &pos);
    Packet::new(CrtpPort::Localization, POSITION_CH, data)
}

/// External pose: position `[x, y, z]` and attitude `[qx, qy, qz, qw]`.
pub fn ext_pose(pos: [f32; 3], quat: [f32; 4]) -> Result<Packet, ProtocolError> {
    let mut body = Vec::with_capacity(28);
    put_f32s(&mut body, &pos);
    put_f32s(&mut body, &quat);
    generic(msg::EXT_POSE, &body)
}

/// Ultra-wideband LPP packet for anchor `dest_id`.
pub fn short_lpp_packet(dest_id: u8, data: &[u8]) -> Result<Packet, ProtocolError> {
    let mut body = Vec::with_capacity(1 + data.len());
    body.push(dest_id);
    body.extend_from_slice(data);
    generic(msg::LPS_SHORT_LPP_PACKET, &body)
}

/// Emergency stop.
pub fn emergency_stop() -> Result<Packet, ProtocolError> {
    generic(msg::EMERGENCY_STOP, &[])
}

/// Emergency stop watchdog.
pub fn emergency_stop_watchdog() -> Result<Packet, ProtocolError> {
    generic(msg::EMERGENCY_STOP_WATCHDOG, &[])
}

/// Emergency reset.
pub fn emergency_reset() -> Result<Packet, ProtocolError> {
    generic(msg::EMERGENCY_RESET, &[])
}

/// Decoded content of a localization packet.
#[derive(Debug, Clone, PartialEq)]
pub enum LocalizationData {
    /// Distance in meters per anchor id.
    RangeStream(BTreeMap<u8, f32>),
}

/// An inbound localization message.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalizationPacket {
    /// Message type id (see [`msg`]).
    pub kind: u8,
    /// Payload after the type byte.
    pub raw_data: Vec<u8>,
    /// Decoded payload, for message types this crate understands.
    pub data: Option<LocalizationData>,
}

impl LocalizationPacket {
    /// Decode a packet received on the localization port.
    pub fn parse(packet: &Packet) -> Result<Self, ProtocolError> {
        let (&kind, raw) = packet
            .data()
            .split_first()
            .ok_or_else(|| ProtocolError::Malformed("empty localization packet".into()))?;

        let data = match kind {
            msg::RANGE_STREAM_REPORT => Some(LocalizationData::RangeStream(parse_ranges(raw)?)),
            _ => None,
        };

        Ok(Self {
            kind,
            raw_data: raw.to_vec(),
            data,
        })
    }
}

fn parse_ranges(raw: &[u8]) -> Result<BTreeMap<u8, f32>, ProtocolError> {
    if raw.len() % RANGE_RECORD_SIZE != 0 {
        return Err(ProtocolError::Malformed(format!(
            "range stream report length {} is not a multiple of {RANGE_RECORD_SIZE}",
            raw.len()
        )));
    }
    Ok(raw
        .chunks_exact(RANGE_RECORD_SIZE)
        .map(|rec| (rec[0], f32::from_le_bytes([rec[1], rec[2], rec[3], rec[4]])))
        .collect())
}

/// Decodes every packet on the localization port and re-emits it.
pub struct LocalizationListener {
    handler: PacketHandler,
    received: Arc<EventSource<LocalizationPacket>>,
}

impl LocalizationListener {
    /// Register on `router` for the localization port.
    pub fn attach(router: &PortRouter) -> Self {
        let received = Arc::new(EventSource::new());
        let sink = Arc::clone(&received);
        let handler: PacketHandler = Arc::new(move |packet: &Packet| {
            match LocalizationPacket::parse(packet) {
                Ok(decoded) => sink.call(&decoded),
                Err(e) => tracing::warn!(error = %e, "dropping localization packet"),
            }
        });
        router.register(CrtpPort::Localization, Arc::clone(&handler));
        Self { handler, received }
    }

    /// Decoded packets.
    pub fn received(&self) -> &EventSource<LocalizationPacket> {
        &self.received
    }

    /// Unregister from `router`.
    pub fn detach(&self, router: &PortRouter) {
        router.unregister(CrtpPort::Localization, &self.handler);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[test]
    fn test_ext_position_layout() {
        let packet = ext_position([1.0, -2.0, 0.5]).unwrap();
        assert_eq!(packet.port(), CrtpPort::Localization.as_u8());
        assert_eq!(packet.channel(), POSITION_CH);
        assert_eq!(
            packet.data(),
            hex::decode("0000803f000000c00000003f").unwrap()
        );
    }

    #[test]
    fn test_ext_pose_fits_in_frame() {
        let packet = ext_pose([0.0; 3], [0.0, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(packet.channel(), GENERIC_CH);
        assert_eq!(packet.data()[0], msg::EXT_POSE);
        assert_eq!(packet.data().len(), 29);
        assert_eq!(&packet.data()[25..], &1.0f32.to_le_bytes());
    }

    #[test]
    fn test_emergency_messages() {
        assert_eq!(emergency_stop().unwrap().data(), &[msg::EMERGENCY_STOP]);
        assert_eq!(
            emergency_stop_watchdog().unwrap().data(),
            &[msg::EMERGENCY_STOP_WATCHDOG]
        );
        assert_eq!(emergency_reset().unwrap().data(), &[msg::EMERGENCY_RESET]);
    }

    #[test]
    fn test_short_lpp_packet_size_limit() {
        let packet = short_lpp_packet(7, &[1, 2, 3]).unwrap();
        assert_eq!(packet.data(), &[msg::LPS_SHORT_LPP_PACKET, 7, 1, 2, 3]);

        assert!(matches!(
            short_lpp_packet(7, &[0u8; 29]),
            Err(ProtocolError::PayloadTooLarge { len: 31, .. })
        ));
    }

    #[test]
    fn test_parse_range_stream_report() {
        let mut data = vec![msg::RANGE_STREAM_REPORT];
        data.push(1);
        data.extend_from_slice(&2.5f32.to_le_bytes());
        data.push(4);
        data.extend_from_slice(&0.75f32.to_le_bytes());
        let packet = Packet::new(CrtpPort::Localization, GENERIC_CH, data).unwrap();

        let parsed = LocalizationPacket::parse(&packet).unwrap();
        assert_eq!(parsed.kind, msg::RANGE_STREAM_REPORT);
        assert_eq!(parsed.raw_data.len(), 10);
        let Some(LocalizationData::RangeStream(ranges)) = parsed.data else {
            panic!("expected range stream");
        };
        assert_eq!(ranges.get(&1), Some(&2.5));
        assert_eq!(ranges.get(&4), Some(&0.75));
    }

    #[test]
    fn test_parse_rejects_bad_range_length() {
        let packet =
            Packet::new(CrtpPort::Localization, GENERIC_CH, vec![msg::RANGE_STREAM_REPORT, 1, 2]).unwrap();
        assert!(matches!(
            LocalizationPacket::parse(&packet),
            Err(ProtocolError::Malformed(_))
        ));
    }

    #[test]
    fn test_parse_rejects_empty_packet() {
        let packet = Packet::new(CrtpPort::Localization, GENERIC_CH, vec![]).unwrap();
        assert!(LocalizationPacket::parse(&packet).is_err());
    }

    #[test]
    fn test_parse_unknown_kind_keeps_raw_data() {
        let packet =
            Packet::new(CrtpPort::Localization, GENERIC_CH, vec![msg::COMM_GNSS_NMEA, b'$']).unwrap();
        let parsed = LocalizationPacket::parse(&packet).unwrap();
        assert_eq!(parsed.raw_data, vec![b'$']);
        assert!(parsed.data.is_none());
    }

    #[test]
    fn test_listener_reemits_decoded_packets() {
        let router = PortRouter::new();
        let listener = LocalizationListener::attach(&router);
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        listener
            .received()
            .add_callback(Arc::new(move |p: &LocalizationPacket| sink.lock().push(p.kind)));

        router.dispatch(&emergency_stop().unwrap());
        router.dispatch(&Packet::new(CrtpPort::Localization, GENERIC_CH, vec![]).unwrap());
        assert_eq!(*seen.lock(), vec![msg::EMERGENCY_STOP]);

        listener.detach(&router);
        assert_eq!(router.handler_count(CrtpPort::Localization), 0);
        router.dispatch(&emergency_reset().unwrap());
        assert_eq!(seen.lock().len(), 1);
    }
}
