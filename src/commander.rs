//! Setpoint encoders for the commander ports.
//!
//! The legacy roll/pitch/yaw/thrust setpoint goes to [`CrtpPort::Commander`];
//! every typed setpoint goes to [`CrtpPort::CommanderGeneric`] with a leading
//! type byte. Floats are little-endian `f32`.

use crate::core::ProtocolError;
use crate::crtp::{CrtpPort, Packet, put_f32s};
use crate::localization::quaternion;

/// Typed setpoint ids on the generic commander port.
pub mod setpoint_type {
    /// Stop motors.
    pub const STOP: u8 = 0;
    /// Velocity in the world frame.
    pub const VELOCITY_WORLD: u8 = 1;
    /// Absolute height with roll/pitch.
    pub const ZDISTANCE: u8 = 2;
    /// Hover with body velocity.
    pub const HOVER: u8 = 5;
    /// Full state.
    pub const FULL_STATE: u8 = 6;
    /// Absolute position.
    pub const POSITION: u8 = 7;
}

/// Full-state setpoint, SI units.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FullState {
    /// Position in m.
    pub pos: [f32; 3],
    /// Velocity in m/s.
    pub vel: [f32; 3],
    /// Acceleration in m/s^2.
    pub acc: [f32; 3],
    /// Attitude `[qx, qy, qz, qw]`.
    pub quat: [f32; 4],
    /// Roll, pitch and yaw rates in rad/s.
    pub rates: [f32; 3],
}

/// Builds setpoint packets.
#[derive(Debug, Clone, Copy, Default)]
pub struct Commander {
    x_mode: bool,
}

impl Commander {
    /// Commander in "+" mode.
    pub fn new() -> Self {
        Self::default()
    }

    /// Enable or disable client-side X-mode for [`setpoint`](Self::setpoint).
    pub fn set_client_xmode(&mut self, enabled: bool) {
        self.x_mode = enabled;
    }

    /// Whether client-side X-mode is enabled.
    pub fn client_xmode(&self) -> bool {
        self.x_mode
    }

    /// Roll/pitch/yaw in degrees, thrust in `0..=0xFFFF`.
    pub fn setpoint(&self, roll: f32, pitch: f32, yaw: f32, thrust: u32) -> Result<Packet, ProtocolError> {
        let thrust = u16::try_from(thrust).map_err(|_| ProtocolError::ValueOutOfRange {
            field: "thrust",
            value: thrust as f64,
        })?;

        let (roll, pitch) = if self.x_mode {
            (0.707 * (roll - pitch), 0.707 * (roll + pitch))
        } else {
            (roll, pitch)
        };

        let mut data = Vec::with_capacity(14);
        put_f32s(&mut data, &[roll, -pitch, yaw]);
        data.extend_from_slice(&thrust.to_le_bytes());
        Packet::new(CrtpPort::Commander, 0, data)
    }

    /// Stop the motors.
    pub fn stop_setpoint(&self) -> Result<Packet, ProtocolError> {
        generic(setpoint_type::STOP, &[])
    }

    /// Velocity in m/s in the world frame, yaw rate in deg/s.
    pub fn velocity_world_setpoint(&self, vx: f32, vy: f32, vz: f32, yawrate: f32) -> Result<Packet, ProtocolError> {
        generic(setpoint_type::VELOCITY_WORLD, &[vx, vy, vz, yawrate])
    }

    /// Roll and pitch in degrees, yaw rate in deg/s, height above ground in m.
    pub fn zdistance_setpoint(&self, roll: f32, pitch: f32, yawrate: f32, zdistance: f32) -> Result<Packet, ProtocolError> {
        generic(setpoint_type::ZDISTANCE, &[roll, pitch, yawrate, zdistance])
    }

    /// Body velocity in m/s, yaw rate in deg/s, height above ground in m.
    pub fn hover_setpoint(&self, vx: f32, vy: f32, yawrate: f32, zdistance: f32) -> Result<Packet, ProtocolError> {
        generic(setpoint_type::HOVER, &[vx, vy, yawrate, zdistance])
    }

    /// Absolute position in m, yaw in degrees.
    pub fn position_setpoint(&self, x: f32, y: f32, z: f32, yaw: f32) -> Result<Packet, ProtocolError> {
        generic(setpoint_type::POSITION, &[x, y, z, yaw])
    }

    /// Full-state setpoint.
    ///
    /// Position, velocity, acceleration and rates travel as milli-units in
    /// `i16`; the attitude travels as a compressed quaternion.
    pub fn full_state_setpoint(&self, state: &FullState) -> Result<Packet, ProtocolError> {
        let mut data = Vec::with_capacity(29);
        data.push(setpoint_type::FULL_STATE);
        for v in state.pos.iter().chain(&state.vel).chain(&state.acc) {
            data.extend_from_slice(&milli(*v, "full state")?.to_le_bytes());
        }
        data.extend_from_slice(&quaternion::compress(state.quat).to_le_bytes());
        for v in &state.rates {
            data.extend_from_slice(&milli(*v, "rate")?.to_le_bytes());
        }
        Packet::new(CrtpPort::CommanderGeneric, 0, data)
    }
}

fn generic(kind: u8, values: &[f32]) -> Result<Packet, ProtocolError> {
    let mut data = Vec::with_capacity(1 + 4 * values.len());
    data.push(kind);
    put_f32s(&mut data, values);
    Packet::new(CrtpPort::CommanderGeneric, 0, data)
}

fn milli(value: f32, field: &'static str) -> Result<i16, ProtocolError> {
    let scaled = (value * 1000.0).round();
    if !(i16::MIN as f32..=i16::MAX as f32).contains(&scaled) {
        return Err(ProtocolError::ValueOutOfRange {
            field,
            value: value as f64,
        });
    }
    Ok(scaled as i16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rpyt_setpoint_layout() {
        let packet = Commander::new().setpoint(1.0, 2.0, 0.0, 0x1234).unwrap();
        assert_eq!(packet.port(), CrtpPort::Commander.as_u8());
        assert_eq!(packet.data().len(), 14);
        assert_eq!(&packet.data()[0..4], &1.0f32.to_le_bytes());
        // pitch is inverted on the wire
        assert_eq!(&packet.data()[4..8], &(-2.0f32).to_le_bytes());
        assert_eq!(&packet.data()[12..14], &[0x34, 0x12]);
    }

    #[test]
    fn test_rpyt_thrust_out_of_range() {
        assert!(matches!(
            Commander::new().setpoint(0.0, 0.0, 0.0, 0x1_0000),
            Err(ProtocolError::ValueOutOfRange { field: "thrust", .. })
        ));
    }

    #[test]
    fn test_xmode_rotates_roll_pitch() {
        let mut commander = Commander::new();
        commander.set_client_xmode(true);
        assert!(commander.client_xmode());

        let packet = commander.setpoint(1.0, 1.0, 0.0, 0).unwrap();
        let roll = f32::from_le_bytes(packet.data()[0..4].try_into().unwrap());
        let pitch = -f32::from_le_bytes(packet.data()[4..8].try_into().unwrap());
        assert_eq!(roll, 0.0);
        assert!((pitch - 1.414).abs() < 1e-6);
    }

    #[test]
    fn test_generic_setpoints() {
        let commander = Commander::new();
        assert_eq!(commander.stop_setpoint().unwrap().data(), &[setpoint_type::STOP]);

        let hover = commander.hover_setpoint(0.1, 0.2, 0.0, 0.4).unwrap();
        assert_eq!(hover.port(), CrtpPort::CommanderGeneric.as_u8());
        assert_eq!(hover.data()[0], setpoint_type::HOVER);
        assert_eq!(hover.data().len(), 17);

        for (packet, kind) in [
            (commander.velocity_world_setpoint(0.0, 0.0, 0.0, 0.0), setpoint_type::VELOCITY_WORLD),
            (commander.zdistance_setpoint(0.0, 0.0, 0.0, 0.3), setpoint_type::ZDISTANCE),
            (commander.position_setpoint(1.0, 1.0, 1.0, 90.0), setpoint_type::POSITION),
        ] {
            assert_eq!(packet.unwrap().data()[0], kind);
        }
    }

    #[test]
    fn test_full_state_layout() {
        let state = FullState {
            pos: [1.0, -0.5, 0.25],
            quat: [0.0, 0.0, 0.0, 1.0],
            rates: [0.0, 0.0, 0.1],
            ..FullState::default()
        };
        let packet = Commander::new().full_state_setpoint(&state).unwrap();
        let data = packet.data();

        assert_eq!(data.len(), 29);
        assert_eq!(data[0], setpoint_type::FULL_STATE);
        assert_eq!(i16::from_le_bytes([data[1], data[2]]), 1000);
        assert_eq!(i16::from_le_bytes([data[3], data[4]]), -500);
        assert_eq!(i16::from_le_bytes([data[5], data[6]]), 250);

        let comp = u32::from_le_bytes(data[19..23].try_into().unwrap());
        assert_eq!(comp, quaternion::compress([0.0, 0.0, 0.0, 1.0]));
        assert_eq!(i16::from_le_bytes([data[27], data[28]]), 100);
    }

    #[test]
    fn test_full_state_rejects_overflow() {
        let state = FullState {
            pos: [40.0, 0.0, 0.0],
            quat: [0.0, 0.0, 0.0, 1.0],
            ..FullState::default()
        };
        assert!(Commander::new().full_state_setpoint(&state).is_err());
    }
}
