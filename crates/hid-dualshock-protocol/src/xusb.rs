//! Translation to the Xbox 360 (XUSB) report consumed by the virtual pad bus.

use serde::{Deserialize, Serialize};

use crate::output::DS3_LED_1;
use crate::types::{GamepadState, buttons};

/// XUSB button bits.
pub mod xusb_buttons {
    pub const DPAD_UP: u16 = 0x0001;
    pub const DPAD_DOWN: u16 = 0x0002;
    pub const DPAD_LEFT: u16 = 0x0004;
    pub const DPAD_RIGHT: u16 = 0x0008;
    pub const START: u16 = 0x0010;
    pub const BACK: u16 = 0x0020;
    pub const LEFT_THUMB: u16 = 0x0040;
    pub const RIGHT_THUMB: u16 = 0x0080;
    pub const LEFT_SHOULDER: u16 = 0x0100;
    pub const RIGHT_SHOULDER: u16 = 0x0200;
    pub const GUIDE: u16 = 0x0400;
    pub const A: u16 = 0x1000;
    pub const B: u16 = 0x2000;
    pub const X: u16 = 0x4000;
    pub const Y: u16 = 0x8000;
}

/// Canonical bit to XUSB bit. The PS button is carried separately.
const BUTTON_MAP: [(u16, u16); 14] = [
    (buttons::DPAD_UP, xusb_buttons::DPAD_UP),
    (buttons::DPAD_DOWN, xusb_buttons::DPAD_DOWN),
    (buttons::DPAD_LEFT, xusb_buttons::DPAD_LEFT),
    (buttons::DPAD_RIGHT, xusb_buttons::DPAD_RIGHT),
    (buttons::START, xusb_buttons::START),
    (buttons::SELECT, xusb_buttons::BACK),
    (buttons::LEFT_THUMB, xusb_buttons::LEFT_THUMB),
    (buttons::RIGHT_THUMB, xusb_buttons::RIGHT_THUMB),
    (buttons::LEFT_SHOULDER, xusb_buttons::LEFT_SHOULDER),
    (buttons::RIGHT_SHOULDER, xusb_buttons::RIGHT_SHOULDER),
    (buttons::CROSS, xusb_buttons::A),
    (buttons::CIRCLE, xusb_buttons::B),
    (buttons::SQUARE, xusb_buttons::X),
    (buttons::TRIANGLE, xusb_buttons::Y),
];

/// Rescale an 8-bit stick axis (centered at 0x80) to the signed 16-bit range.
///
/// `0x00` is clamped to the same magnitude as `0xFF` so the range stays
/// symmetric; `flip` negates the result for axes whose direction is
/// inverted on the target.
pub const fn scale_axis(value: u8, flip: bool) -> i16 {
    let mut centered = value as i16 - 0x80;
    if centered == -128 {
        centered = -127;
    }
    if flip {
        centered = -centered;
    }
    centered * 258
}

/// Wire size of [`XusbReport`].
pub const XUSB_REPORT_LEN: usize = 12;

/// Xbox 360 gamepad report.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XusbReport {
    pub buttons: u16,
    pub left_trigger: u8,
    pub right_trigger: u8,
    pub thumb_lx: i16,
    pub thumb_ly: i16,
    pub thumb_rx: i16,
    pub thumb_ry: i16,
}

impl XusbReport {
    /// Translate canonical state. Y axes are flipped: the controllers report
    /// down as positive, XUSB reports up as positive.
    pub fn from_gamepad_state(state: &GamepadState) -> Self {
        let mut mask = BUTTON_MAP
            .iter()
            .filter(|(canonical, _)| state.buttons & canonical != 0)
            .fold(0u16, |acc, (_, xusb)| acc | xusb);
        if state.ps_button != 0 {
            mask |= xusb_buttons::GUIDE;
        }

        Self {
            buttons: mask,
            left_trigger: state.left_trigger,
            right_trigger: state.right_trigger,
            thumb_lx: scale_axis(state.left_thumb_x, false),
            thumb_ly: scale_axis(state.left_thumb_y, true),
            thumb_rx: scale_axis(state.right_thumb_x, false),
            thumb_ry: scale_axis(state.right_thumb_y, true),
        }
    }

    /// Little-endian wire image.
    pub fn to_bytes(&self) -> [u8; XUSB_REPORT_LEN] {
        let mut out = [0u8; XUSB_REPORT_LEN];
        out[0..2].copy_from_slice(&self.buttons.to_le_bytes());
        out[2] = self.left_trigger;
        out[3] = self.right_trigger;
        out[4..6].copy_from_slice(&self.thumb_lx.to_le_bytes());
        out[6..8].copy_from_slice(&self.thumb_ly.to_le_bytes());
        out[8..10].copy_from_slice(&self.thumb_rx.to_le_bytes());
        out[10..12].copy_from_slice(&self.thumb_ry.to_le_bytes());
        out
    }
}

/// Rumble/LED notification sent back by the virtual pad bus.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct XusbNotification {
    pub large_motor: u8,
    pub small_motor: u8,
    pub led_number: u8,
}

impl XusbNotification {
    /// DualShock 3 player LED mask for the pad's player slot, if it has one.
    ///
    /// Slots 0-3 light LEDs 1-4; anything else leaves the LEDs alone.
    pub const fn ds3_led_mask(&self) -> Option<u8> {
        match self.led_number {
            0..=3 => Some(DS3_LED_1 << self.led_number),
            _ => None,
        }
    }
}
