//! Output report buffers pushed to the device over the control endpoint.

use crate::error::{DualShockError, DualShockResult};
use crate::input::report_ids;

/// DualShock 3 output report size on the control endpoint (no report id).
pub const DS3_OUTPUT_REPORT_LEN: usize = 48;
/// DualShock 4 USB output report size (report id included).
pub const DS4_OUTPUT_REPORT_LEN: usize = 32;
/// Shortest upstream DualShock 3 write: report id plus ten payload bytes.
pub const DS3_UPSTREAM_OUTPUT_MIN_LEN: usize = 11;

/// DualShock 3 output report byte offsets.
pub mod ds3_offsets {
    pub const SMALL_MOTOR_DURATION: usize = 1;
    /// On/off only.
    pub const SMALL_MOTOR_POWER: usize = 2;
    pub const LARGE_MOTOR_DURATION: usize = 3;
    pub const LARGE_MOTOR_POWER: usize = 4;
    /// Player LEDs 1..=4 in bits 1..=4.
    pub const LED_MASK: usize = 9;
    /// First of four five-byte LED blink parameter blocks.
    pub const LED_PARAMETERS: usize = 10;
}

/// DualShock 4 output report byte offsets.
pub mod ds4_offsets {
    pub const REPORT_ID: usize = 0;
    pub const FLAGS: usize = 1;
    pub const SMALL_MOTOR: usize = 4;
    pub const LARGE_MOTOR: usize = 5;
    pub const LIGHT_BAR_RED: usize = 6;
    pub const LIGHT_BAR_GREEN: usize = 7;
    pub const LIGHT_BAR_BLUE: usize = 8;
}

/// Upstream payload positions copied into the DualShock 3 buffer.
///
/// Each position `i` is read from `upstream[i + 1]`; the upstream write
/// carries a report id the control endpoint does not.
const DS3_UPSTREAM_POSITIONS: [usize; 5] = [
    ds3_offsets::SMALL_MOTOR_DURATION,
    ds3_offsets::SMALL_MOTOR_POWER,
    ds3_offsets::LARGE_MOTOR_DURATION,
    ds3_offsets::LARGE_MOTOR_POWER,
    ds3_offsets::LED_MASK,
];

/// Player LED bit for LED 1.
pub const DS3_LED_1: u8 = 0x02;

#[rustfmt::skip]
const DS3_DEFAULT_OUTPUT: [u8; DS3_OUTPUT_REPORT_LEN] = [
    0x00, 0xFF, 0x00, 0xFF, 0x00, 0x00, 0x00, 0x00, 0x00, DS3_LED_1,
    0xFF, 0x27, 0x10, 0x00, 0x32,
    0xFF, 0x27, 0x10, 0x00, 0x32,
    0xFF, 0x27, 0x10, 0x00, 0x32,
    0xFF, 0x27, 0x10, 0x00, 0x32,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
    0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// DualShock 3 rumble/LED state as sent on the control endpoint.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ds3OutputReport {
    bytes: [u8; DS3_OUTPUT_REPORT_LEN],
}

impl Default for Ds3OutputReport {
    fn default() -> Self {
        Self {
            bytes: DS3_DEFAULT_OUTPUT,
        }
    }
}

impl Ds3OutputReport {
    /// Motors off, LED 1 lit.
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn as_bytes(&self) -> &[u8; DS3_OUTPUT_REPORT_LEN] {
        &self.bytes
    }

    /// Copy rumble and LED fields from an upstream (report-id prefixed) write.
    pub fn apply_upstream(&mut self, upstream: &[u8]) -> DualShockResult<()> {
        if upstream.len() < DS3_UPSTREAM_OUTPUT_MIN_LEN {
            return Err(DualShockError::report_too_short(
                DS3_UPSTREAM_OUTPUT_MIN_LEN,
                upstream.len(),
            ));
        }
        for position in DS3_UPSTREAM_POSITIONS {
            self.bytes[position] = upstream[position + 1];
        }
        Ok(())
    }

    /// Set motor state; the small motor has no speed control.
    pub fn set_rumble(&mut self, small_motor: u8, large_motor: u8) {
        self.bytes[ds3_offsets::SMALL_MOTOR_POWER] = u8::from(small_motor > 0);
        self.bytes[ds3_offsets::LARGE_MOTOR_POWER] = large_motor;
    }

    /// Player LEDs; only bits 1-4 are meaningful.
    pub fn set_led_mask(&mut self, mask: u8) {
        self.bytes[ds3_offsets::LED_MASK] = mask & 0x1E;
    }

    pub const fn led_mask(&self) -> u8 {
        self.bytes[ds3_offsets::LED_MASK]
    }

    /// `(small_motor_on, large_motor_power)`.
    pub const fn rumble(&self) -> (u8, u8) {
        (
            self.bytes[ds3_offsets::SMALL_MOTOR_POWER],
            self.bytes[ds3_offsets::LARGE_MOTOR_POWER],
        )
    }
}

/// DualShock 4 rumble/light-bar state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ds4OutputReport {
    bytes: [u8; DS4_OUTPUT_REPORT_LEN],
}

impl Default for Ds4OutputReport {
    fn default() -> Self {
        let mut bytes = [0u8; DS4_OUTPUT_REPORT_LEN];
        bytes[ds4_offsets::REPORT_ID] = report_ids::DS4_OUTPUT;
        bytes[ds4_offsets::FLAGS] = 0xFF;
        bytes[ds4_offsets::LIGHT_BAR_BLUE] = 0x40;
        Self { bytes }
    }
}

impl Ds4OutputReport {
    /// Motors off, dim blue light bar.
    pub fn new() -> Self {
        Self::default()
    }

    pub const fn as_bytes(&self) -> &[u8; DS4_OUTPUT_REPORT_LEN] {
        &self.bytes
    }

    pub fn set_rumble(&mut self, small_motor: u8, large_motor: u8) {
        self.bytes[ds4_offsets::SMALL_MOTOR] = small_motor;
        self.bytes[ds4_offsets::LARGE_MOTOR] = large_motor;
    }

    pub fn set_light_bar(&mut self, red: u8, green: u8, blue: u8) {
        self.bytes[ds4_offsets::LIGHT_BAR_RED] = red;
        self.bytes[ds4_offsets::LIGHT_BAR_GREEN] = green;
        self.bytes[ds4_offsets::LIGHT_BAR_BLUE] = blue;
    }

    pub const fn rumble(&self) -> (u8, u8) {
        (
            self.bytes[ds4_offsets::SMALL_MOTOR],
            self.bytes[ds4_offsets::LARGE_MOTOR],
        )
    }
}
