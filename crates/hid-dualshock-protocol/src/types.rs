//! Canonical, report-id-free gamepad state shared by every consumer path.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Canonical button mask bits.
///
/// The low nibble carries the D-pad, the high nibble of the low byte the face
/// buttons, and the high byte the remaining buttons.
pub mod buttons {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_RIGHT: u16 = 0x0002;
    pub const DPAD_DOWN: u16 = 0x0004;
    pub const DPAD_LEFT: u16 = 0x0008;
    pub const TRIANGLE: u16 = 0x0010;
    pub const CIRCLE: u16 = 0x0020;
    pub const CROSS: u16 = 0x0040;
    pub const SQUARE: u16 = 0x0080;
    pub const SELECT: u16 = 0x0100;
    pub const LEFT_THUMB: u16 = 0x0200;
    pub const RIGHT_THUMB: u16 = 0x0400;
    pub const START: u16 = 0x0800;
    pub const LEFT_TRIGGER: u16 = 0x1000;
    pub const RIGHT_TRIGGER: u16 = 0x2000;
    pub const LEFT_SHOULDER: u16 = 0x4000;
    pub const RIGHT_SHOULDER: u16 = 0x8000;

    /// Mask of the four D-pad direction bits.
    pub const DPAD_MASK: u16 = 0x000F;
}

/// HID hat value reported when no D-pad direction is held.
pub const HAT_RELEASED: u8 = 8;

/// 8-way hat direction derived from the four D-pad bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HatDirection {
    North,
    NorthEast,
    East,
    SouthEast,
    South,
    SouthWest,
    West,
    NorthWest,
    Released,
}

impl HatDirection {
    /// Map a D-pad nibble (up=1, right=2, down=4, left=8) to a hat direction.
    ///
    /// Only the low four bits are considered. Combinations that are neither a
    /// cardinal nor a diagonal direction map to [`HatDirection::Released`].
    pub const fn from_dpad_nibble(nibble: u8) -> Self {
        match nibble & 0x0F {
            0x1 => Self::North,
            0x3 => Self::NorthEast,
            0x2 => Self::East,
            0x6 => Self::SouthEast,
            0x4 => Self::South,
            0xC => Self::SouthWest,
            0x8 => Self::West,
            0x9 => Self::NorthWest,
            _ => Self::Released,
        }
    }

    /// Parse a HID hat value (0..=8).
    pub const fn from_hid_value(value: u8) -> Option<Self> {
        match value {
            0 => Some(Self::North),
            1 => Some(Self::NorthEast),
            2 => Some(Self::East),
            3 => Some(Self::SouthEast),
            4 => Some(Self::South),
            5 => Some(Self::SouthWest),
            6 => Some(Self::West),
            7 => Some(Self::NorthWest),
            8 => Some(Self::Released),
            _ => None,
        }
    }

    /// HID hat value: 0 (north) through 7 (north-west), 8 when released.
    pub const fn hid_value(self) -> u8 {
        match self {
            Self::North => 0,
            Self::NorthEast => 1,
            Self::East => 2,
            Self::SouthEast => 3,
            Self::South => 4,
            Self::SouthWest => 5,
            Self::West => 6,
            Self::NorthWest => 7,
            Self::Released => HAT_RELEASED,
        }
    }

    /// D-pad bits (canonical mask layout) held for this direction.
    pub const fn dpad_bits(self) -> u16 {
        match self {
            Self::North => buttons::DPAD_UP,
            Self::NorthEast => buttons::DPAD_UP | buttons::DPAD_RIGHT,
            Self::East => buttons::DPAD_RIGHT,
            Self::SouthEast => buttons::DPAD_DOWN | buttons::DPAD_RIGHT,
            Self::South => buttons::DPAD_DOWN,
            Self::SouthWest => buttons::DPAD_DOWN | buttons::DPAD_LEFT,
            Self::West => buttons::DPAD_LEFT,
            Self::NorthWest => buttons::DPAD_UP | buttons::DPAD_LEFT,
            Self::Released => 0,
        }
    }
}

/// Per-button analog pressure levels reported by the DualShock 3.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PressureState {
    pub up: u8,
    pub right: u8,
    pub down: u8,
    pub left: u8,
    pub left_shoulder: u8,
    pub right_shoulder: u8,
    pub triangle: u8,
    pub circle: u8,
    pub cross: u8,
    pub square: u8,
}

impl PressureState {
    /// Number of pressure bytes on the wire.
    pub const LEN: usize = 10;

    /// Pressure bytes in wire order.
    pub const fn to_bytes(&self) -> [u8; Self::LEN] {
        [
            self.up,
            self.right,
            self.down,
            self.left,
            self.left_shoulder,
            self.right_shoulder,
            self.triangle,
            self.circle,
            self.cross,
            self.square,
        ]
    }

    pub const fn from_bytes(bytes: &[u8; Self::LEN]) -> Self {
        Self {
            up: bytes[0],
            right: bytes[1],
            down: bytes[2],
            left: bytes[3],
            left_shoulder: bytes[4],
            right_shoulder: bytes[5],
            triangle: bytes[6],
            circle: bytes[7],
            cross: bytes[8],
            square: bytes[9],
        }
    }
}

/// Wire size of [`GamepadState`] in sideband structures (19 bytes + 1 pad).
pub const GAMEPAD_STATE_WIRE_LEN: usize = 20;

/// Canonical decoded input sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GamepadState {
    pub left_thumb_x: u8,
    pub left_thumb_y: u8,
    pub right_thumb_x: u8,
    pub right_thumb_y: u8,
    /// Canonical button mask, see [`buttons`].
    pub buttons: u16,
    pub ps_button: u8,
    pub left_trigger: u8,
    pub right_trigger: u8,
    /// DualShock 3 only; zero for other families.
    pub pressure: PressureState,
}

impl GamepadState {
    /// Sticks centered, nothing pressed.
    pub const fn neutral() -> Self {
        Self {
            left_thumb_x: 0x80,
            left_thumb_y: 0x80,
            right_thumb_x: 0x80,
            right_thumb_y: 0x80,
            buttons: 0,
            ps_button: 0,
            left_trigger: 0,
            right_trigger: 0,
            pressure: PressureState {
                up: 0,
                right: 0,
                down: 0,
                left: 0,
                left_shoulder: 0,
                right_shoulder: 0,
                triangle: 0,
                circle: 0,
                cross: 0,
                square: 0,
            },
        }
    }

    pub const fn is_pressed(&self, mask: u16) -> bool {
        self.buttons & mask == mask
    }

    /// Hat direction of the D-pad bits in [`Self::buttons`].
    pub const fn hat(&self) -> HatDirection {
        HatDirection::from_dpad_nibble((self.buttons & buttons::DPAD_MASK) as u8)
    }

    /// Serialize into the sideband wire image.
    pub fn to_wire(&self) -> [u8; GAMEPAD_STATE_WIRE_LEN] {
        let mut out = [0u8; GAMEPAD_STATE_WIRE_LEN];
        out[0] = self.left_thumb_x;
        out[1] = self.left_thumb_y;
        out[2] = self.right_thumb_x;
        out[3] = self.right_thumb_y;
        out[4..6].copy_from_slice(&self.buttons.to_le_bytes());
        out[6] = self.ps_button;
        out[7] = self.left_trigger;
        out[8] = self.right_trigger;
        out[9..19].copy_from_slice(&self.pressure.to_bytes());
        out
    }

    /// Parse the sideband wire image. The padding byte is ignored.
    pub fn from_wire(bytes: &[u8; GAMEPAD_STATE_WIRE_LEN]) -> Self {
        let mut pressure = [0u8; PressureState::LEN];
        pressure.copy_from_slice(&bytes[9..19]);
        Self {
            left_thumb_x: bytes[0],
            left_thumb_y: bytes[1],
            right_thumb_x: bytes[2],
            right_thumb_y: bytes[3],
            buttons: u16::from_le_bytes([bytes[4], bytes[5]]),
            ps_button: bytes[6],
            left_trigger: bytes[7],
            right_trigger: bytes[8],
            pressure: PressureState::from_bytes(&pressure),
        }
    }
}

/// Length of a Bluetooth device address.
pub const BD_ADDR_LEN: usize = 6;

/// Bluetooth device address, most significant byte first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BdAddr(pub [u8; BD_ADDR_LEN]);

impl BdAddr {
    pub const fn as_bytes(&self) -> &[u8; BD_ADDR_LEN] {
        &self.0
    }
}

impl fmt::Display for BdAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [a, b, c, d, e, g] = self.0;
        write!(f, "{a:02X}:{b:02X}:{c:02X}:{d:02X}:{e:02X}:{g:02X}")
    }
}

/// Number of settings toggles.
pub const SETTINGS_COUNT: usize = 5;

/// Per-device toggles for the synthesized HID and virtual-pad paths.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceSettings {
    /// Master switch for the virtual Xbox 360 pad.
    pub xusb_emulation_enabled: bool,
    /// Forward input to the virtual pad.
    pub xusb_hid_input_enabled: bool,
    /// Accept rumble from the virtual pad.
    pub xusb_hid_output_enabled: bool,
    /// Hand freshly synthesized reports to the HID stack.
    pub fs_hid_input_enabled: bool,
    /// Accept output reports written by the HID stack.
    pub fs_hid_output_enabled: bool,
}

impl Default for DeviceSettings {
    fn default() -> Self {
        Self {
            xusb_emulation_enabled: true,
            xusb_hid_input_enabled: true,
            xusb_hid_output_enabled: true,
            fs_hid_input_enabled: true,
            fs_hid_output_enabled: true,
        }
    }
}

impl DeviceSettings {
    /// Build settings from the low five bits of `bits`, in wire order.
    pub const fn from_bits(bits: u8) -> Self {
        Self {
            xusb_emulation_enabled: bits & 0x01 != 0,
            xusb_hid_input_enabled: bits & 0x02 != 0,
            xusb_hid_output_enabled: bits & 0x04 != 0,
            fs_hid_input_enabled: bits & 0x08 != 0,
            fs_hid_output_enabled: bits & 0x10 != 0,
        }
    }

    pub const fn bits(&self) -> u8 {
        (self.xusb_emulation_enabled as u8)
            | (self.xusb_hid_input_enabled as u8) << 1
            | (self.xusb_hid_output_enabled as u8) << 2
            | (self.fs_hid_input_enabled as u8) << 3
            | (self.fs_hid_output_enabled as u8) << 4
    }

    /// Whether input should reach the virtual pad.
    pub const fn forwards_virtual_input(&self) -> bool {
        self.xusb_emulation_enabled && self.xusb_hid_input_enabled
    }

    /// Whether rumble from the virtual pad should reach the device.
    pub const fn accepts_virtual_output(&self) -> bool {
        self.xusb_emulation_enabled && self.xusb_hid_output_enabled
    }

    /// One byte per toggle, in wire order.
    pub const fn to_wire(&self) -> [u8; SETTINGS_COUNT] {
        [
            self.xusb_emulation_enabled as u8,
            self.xusb_hid_input_enabled as u8,
            self.xusb_hid_output_enabled as u8,
            self.fs_hid_input_enabled as u8,
            self.fs_hid_output_enabled as u8,
        ]
    }

    /// Any nonzero byte reads as `true`.
    pub const fn from_wire(bytes: &[u8; SETTINGS_COUNT]) -> Self {
        Self {
            xusb_emulation_enabled: bytes[0] != 0,
            xusb_hid_input_enabled: bytes[1] != 0,
            xusb_hid_output_enabled: bytes[2] != 0,
            fs_hid_input_enabled: bytes[3] != 0,
            fs_hid_output_enabled: bytes[4] != 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hat_table() {
        let expected = [
            (0x0, 8),
            (0x1, 0),
            (0x2, 2),
            (0x3, 1),
            (0x4, 4),
            (0x5, 8),
            (0x6, 3),
            (0x7, 8),
            (0x8, 6),
            (0x9, 7),
            (0xA, 8),
            (0xB, 8),
            (0xC, 5),
            (0xD, 8),
            (0xE, 8),
            (0xF, 8),
        ];
        for (nibble, hat) in expected {
            assert_eq!(
                HatDirection::from_dpad_nibble(nibble).hid_value(),
                hat,
                "nibble {nibble:#x}"
            );
        }
    }

    #[test]
    fn test_hat_value_round_trips_through_dpad_bits() {
        for value in 0..=8u8 {
            let dir = HatDirection::from_hid_value(value);
            assert!(dir.is_some());
            if let Some(dir) = dir {
                assert_eq!(HatDirection::from_dpad_nibble(dir.dpad_bits() as u8), dir);
            }
        }
        assert_eq!(HatDirection::from_hid_value(9), None);
    }

    #[test]
    fn test_settings_default_all_enabled() {
        let settings = DeviceSettings::default();
        assert_eq!(settings.bits(), 0x1F);
        assert_eq!(settings.to_wire(), [1, 1, 1, 1, 1]);
    }

    #[test]
    fn test_settings_bits_round_trip() {
        for bits in 0..32u8 {
            assert_eq!(DeviceSettings::from_bits(bits).bits(), bits);
        }
    }

    #[test]
    fn test_gamepad_state_wire_layout() {
        let mut state = GamepadState::neutral();
        state.buttons = buttons::CROSS | buttons::START;
        state.left_trigger = 0x7F;
        state.pressure.square = 0x42;
        let wire = state.to_wire();
        assert_eq!(&wire[..4], &[0x80; 4]);
        assert_eq!(wire[4], 0x40);
        assert_eq!(wire[5], 0x08);
        assert_eq!(wire[7], 0x7F);
        assert_eq!(wire[18], 0x42);
        assert_eq!(wire[19], 0);
        assert_eq!(GamepadState::from_wire(&wire), state);
    }
}
