//! Well-known CRTP ports.

/// Logical subsystems addressed by the header port nibble.
///
/// Packets carry the raw `u8` port so traffic on ports not listed here still
/// decodes and dispatches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum CrtpPort {
    /// Text console output from the vehicle.
    Console = 0x00,
    /// Parameter read/write.
    Param = 0x02,
    /// Roll/pitch/yaw/thrust setpoints.
    Commander = 0x03,
    /// Memory access.
    Mem = 0x04,
    /// Log blocks.
    Logging = 0x05,
    /// External position, pose and LPS traffic.
    Localization = 0x06,
    /// Typed setpoints.
    CommanderGeneric = 0x07,
    /// High-level setpoints.
    SetpointHl = 0x08,
    /// Platform services.
    Platform = 0x0D,
    /// Debug driver.
    DebugDriver = 0x0E,
    /// Link control.
    LinkCtrl = 0x0F,
}

impl CrtpPort {
    /// Parse a port number into a well-known port.
    pub fn from_u8(port: u8) -> Option<Self> {
        match port {
            0x00 => Some(Self::Console),
            0x02 => Some(Self::Param),
            0x03 => Some(Self::Commander),
            0x04 => Some(Self::Mem),
            0x05 => Some(Self::Logging),
            0x06 => Some(Self::Localization),
            0x07 => Some(Self::CommanderGeneric),
            0x08 => Some(Self::SetpointHl),
            0x0D => Some(Self::Platform),
            0x0E => Some(Self::DebugDriver),
            0x0F => Some(Self::LinkCtrl),
            _ => None,
        }
    }

    /// Port number as carried in the header.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Ports 13..=15 carry link-management traffic.
    pub fn is_link_management(self) -> bool {
        self.as_u8() >= 0x0D
    }
}

impl From<CrtpPort> for u8 {
    fn from(port: CrtpPort) -> Self {
        port.as_u8()
    }
}
