//! Input report decoding and HID report synthesis.
//!
//! Pure functions over caller-provided buffers. No I/O, no heap allocation.

use crate::error::{DualShockError, DualShockResult};
use crate::ids::DeviceType;
use crate::types::{GamepadState, HatDirection, PressureState, buttons};

/// Report IDs used on the interrupt endpoints.
pub mod report_ids {
    /// DualShock 3 interrupt-IN input report.
    pub const DS3_INPUT: u8 = 0x01;
    /// DualShock 4 USB input report.
    pub const DS4_INPUT: u8 = 0x01;
    /// DualShock 4 USB output report.
    pub const DS4_OUTPUT: u8 = 0x05;
    /// Report id of the synthesized HID report.
    pub const SYNTHESIZED: u8 = 0x01;
}

/// Shortest DualShock 3 input transfer carrying every decoded field.
pub const DS3_INPUT_MIN_LEN: usize = 27;
/// Full DualShock 3 input report size on the interrupt endpoint.
pub const DS3_INPUT_REPORT_LEN: usize = 49;
/// Shortest DualShock 4 input transfer carrying every decoded field.
pub const DS4_INPUT_MIN_LEN: usize = 10;
/// Full DualShock 4 USB input report size.
pub const DS4_INPUT_REPORT_LEN: usize = 64;
/// Bytes of the synthesized report that carry data (report id included).
pub const SYNTHESIZED_REPORT_MIN_LEN: usize = 20;

/// Raw DualShock 3 input report byte offsets.
pub mod ds3_offsets {
    pub const REPORT_ID: usize = 0;
    /// Select, L3, R3, start in the low nibble; D-pad in the high nibble.
    pub const BUTTONS_1: usize = 2;
    /// L2, R2, L1, R1 in the low nibble; face buttons in the high nibble.
    pub const BUTTONS_2: usize = 3;
    pub const PS_BUTTON: usize = 4;
    pub const LEFT_THUMB_X: usize = 6;
    pub const LEFT_THUMB_Y: usize = 7;
    pub const RIGHT_THUMB_X: usize = 8;
    pub const RIGHT_THUMB_Y: usize = 9;
    /// Up, right, down, left.
    pub const DPAD_PRESSURE: usize = 14;
    pub const LEFT_TRIGGER: usize = 18;
    pub const RIGHT_TRIGGER: usize = 19;
    pub const LEFT_SHOULDER_PRESSURE: usize = 20;
    pub const RIGHT_SHOULDER_PRESSURE: usize = 21;
    /// Triangle, circle, cross, square.
    pub const FACE_PRESSURE: usize = 22;
}

/// Raw DualShock 4 USB input report byte offsets.
pub mod ds4_offsets {
    pub const REPORT_ID: usize = 0;
    pub const LEFT_THUMB_X: usize = 1;
    pub const LEFT_THUMB_Y: usize = 2;
    pub const RIGHT_THUMB_X: usize = 3;
    pub const RIGHT_THUMB_Y: usize = 4;
    /// Hat in the low nibble, face buttons in the high nibble.
    pub const BUTTONS_1: usize = 5;
    pub const BUTTONS_2: usize = 6;
    /// PS in bit 0, touchpad click in bit 1.
    pub const BUTTONS_3: usize = 7;
    pub const LEFT_TRIGGER: usize = 8;
    pub const RIGHT_TRIGGER: usize = 9;
}

/// Synthesized HID report byte offsets.
pub mod synthesized_offsets {
    pub const REPORT_ID: usize = 0;
    pub const THUMBS: usize = 1;
    /// Hat value in the low nibble, face buttons in the high nibble.
    pub const HAT_AND_FACE: usize = 5;
    pub const OTHER_BUTTONS: usize = 6;
    pub const PS_BUTTON: usize = 7;
    pub const LEFT_TRIGGER: usize = 8;
    pub const RIGHT_TRIGGER: usize = 9;
    pub const DPAD_PRESSURE: usize = 10;
    pub const SHOULDER_PRESSURE: usize = 14;
    pub const FACE_PRESSURE: usize = 16;
}

/// Decode a raw DualShock 3 interrupt-IN transfer.
pub fn parse_ds3_input(raw: &[u8]) -> DualShockResult<GamepadState> {
    let Some(raw) = raw.get(..DS3_INPUT_MIN_LEN) else {
        return Err(DualShockError::report_too_short(DS3_INPUT_MIN_LEN, raw.len()));
    };
    if raw[ds3_offsets::REPORT_ID] != report_ids::DS3_INPUT {
        return Err(DualShockError::UnexpectedReportId {
            expected: report_ids::DS3_INPUT,
            actual: raw[ds3_offsets::REPORT_ID],
        });
    }

    let b1 = u16::from(raw[ds3_offsets::BUTTONS_1]);
    let b2 = u16::from(raw[ds3_offsets::BUTTONS_2]);
    let buttons = (b1 >> 4) | (b2 & 0xF0) | ((b1 & 0x0F) << 8) | ((b2 & 0x0F) << 12);

    let dpad = &raw[ds3_offsets::DPAD_PRESSURE..ds3_offsets::DPAD_PRESSURE + 4];
    let face = &raw[ds3_offsets::FACE_PRESSURE..ds3_offsets::FACE_PRESSURE + 4];

    Ok(GamepadState {
        left_thumb_x: raw[ds3_offsets::LEFT_THUMB_X],
        left_thumb_y: raw[ds3_offsets::LEFT_THUMB_Y],
        right_thumb_x: raw[ds3_offsets::RIGHT_THUMB_X],
        right_thumb_y: raw[ds3_offsets::RIGHT_THUMB_Y],
        buttons,
        ps_button: raw[ds3_offsets::PS_BUTTON] & 0x01,
        left_trigger: raw[ds3_offsets::LEFT_TRIGGER],
        right_trigger: raw[ds3_offsets::RIGHT_TRIGGER],
        pressure: PressureState {
            up: dpad[0],
            right: dpad[1],
            down: dpad[2],
            left: dpad[3],
            left_shoulder: raw[ds3_offsets::LEFT_SHOULDER_PRESSURE],
            right_shoulder: raw[ds3_offsets::RIGHT_SHOULDER_PRESSURE],
            triangle: face[0],
            circle: face[1],
            cross: face[2],
            square: face[3],
        },
    })
}

/// Decode a raw DualShock 4 USB input report.
///
/// The DualShock 4 has no pressure sensors; [`GamepadState::pressure`] stays
/// zero.
pub fn parse_ds4_input(raw: &[u8]) -> DualShockResult<GamepadState> {
    let Some(raw) = raw.get(..DS4_INPUT_MIN_LEN) else {
        return Err(DualShockError::report_too_short(DS4_INPUT_MIN_LEN, raw.len()));
    };
    if raw[ds4_offsets::REPORT_ID] != report_ids::DS4_INPUT {
        return Err(DualShockError::UnexpectedReportId {
            expected: report_ids::DS4_INPUT,
            actual: raw[ds4_offsets::REPORT_ID],
        });
    }

    let b1 = raw[ds4_offsets::BUTTONS_1];
    let b2 = raw[ds4_offsets::BUTTONS_2];

    let mut mask = HatDirection::from_hid_value(b1 & 0x0F)
        .map_or(0, HatDirection::dpad_bits);
    for (bit, button) in [
        (0x10, buttons::SQUARE),
        (0x20, buttons::CROSS),
        (0x40, buttons::CIRCLE),
        (0x80, buttons::TRIANGLE),
    ] {
        if b1 & bit != 0 {
            mask |= button;
        }
    }
    for (bit, button) in [
        (0x01, buttons::LEFT_SHOULDER),
        (0x02, buttons::RIGHT_SHOULDER),
        (0x04, buttons::LEFT_TRIGGER),
        (0x08, buttons::RIGHT_TRIGGER),
        (0x10, buttons::SELECT),
        (0x20, buttons::START),
        (0x40, buttons::LEFT_THUMB),
        (0x80, buttons::RIGHT_THUMB),
    ] {
        if b2 & bit != 0 {
            mask |= button;
        }
    }

    Ok(GamepadState {
        left_thumb_x: raw[ds4_offsets::LEFT_THUMB_X],
        left_thumb_y: raw[ds4_offsets::LEFT_THUMB_Y],
        right_thumb_x: raw[ds4_offsets::RIGHT_THUMB_X],
        right_thumb_y: raw[ds4_offsets::RIGHT_THUMB_Y],
        buttons: mask,
        ps_button: raw[ds4_offsets::BUTTONS_3] & 0x01,
        left_trigger: raw[ds4_offsets::LEFT_TRIGGER],
        right_trigger: raw[ds4_offsets::RIGHT_TRIGGER],
        pressure: PressureState::default(),
    })
}

/// Decode a raw input transfer for the given device family.
pub fn parse_input(device_type: DeviceType, raw: &[u8]) -> DualShockResult<GamepadState> {
    match device_type {
        DeviceType::DualShock3 => parse_ds3_input(raw),
        DeviceType::DualShock4 => parse_ds4_input(raw),
        DeviceType::Unknown => Err(DualShockError::NotImplemented(device_type)),
    }
}

/// Write the synthesized HID input report for `state` into `out`.
///
/// The whole of `out` is written; bytes past the data fields are zeroed so
/// the report keeps the length of the transfer it replaces. Returns
/// `out.len()`.
pub fn synthesize_input_report(state: &GamepadState, out: &mut [u8]) -> DualShockResult<usize> {
    if out.len() < SYNTHESIZED_REPORT_MIN_LEN {
        return Err(DualShockError::buffer_too_small(
            SYNTHESIZED_REPORT_MIN_LEN,
            out.len(),
        ));
    }
    out.fill(0);

    let [low, high] = state.buttons.to_le_bytes();
    let p = &state.pressure;

    out[synthesized_offsets::REPORT_ID] = report_ids::SYNTHESIZED;
    out[synthesized_offsets::THUMBS..synthesized_offsets::THUMBS + 4].copy_from_slice(&[
        state.left_thumb_x,
        state.left_thumb_y,
        state.right_thumb_x,
        state.right_thumb_y,
    ]);
    out[synthesized_offsets::HAT_AND_FACE] = state.hat().hid_value() | (low & 0xF0);
    out[synthesized_offsets::OTHER_BUTTONS] = high;
    out[synthesized_offsets::PS_BUTTON] = state.ps_button;
    out[synthesized_offsets::LEFT_TRIGGER] = state.left_trigger;
    out[synthesized_offsets::RIGHT_TRIGGER] = state.right_trigger;
    out[synthesized_offsets::DPAD_PRESSURE..synthesized_offsets::DPAD_PRESSURE + 4]
        .copy_from_slice(&[p.up, p.right, p.down, p.left]);
    out[synthesized_offsets::SHOULDER_PRESSURE] = p.left_shoulder;
    out[synthesized_offsets::SHOULDER_PRESSURE + 1] = p.right_shoulder;
    out[synthesized_offsets::FACE_PRESSURE..synthesized_offsets::FACE_PRESSURE + 4]
        .copy_from_slice(&[p.triangle, p.circle, p.cross, p.square]);

    Ok(out.len())
}

/// Decode a synthesized HID report back into canonical state.
///
/// D-pad combinations that have no hat value (opposing directions) do not
/// survive synthesis and decode as released.
pub fn parse_synthesized_report(report: &[u8]) -> DualShockResult<GamepadState> {
    let Some(report) = report.get(..SYNTHESIZED_REPORT_MIN_LEN) else {
        return Err(DualShockError::report_too_short(
            SYNTHESIZED_REPORT_MIN_LEN,
            report.len(),
        ));
    };
    if report[synthesized_offsets::REPORT_ID] != report_ids::SYNTHESIZED {
        return Err(DualShockError::UnexpectedReportId {
            expected: report_ids::SYNTHESIZED,
            actual: report[synthesized_offsets::REPORT_ID],
        });
    }

    let hat_and_face = report[synthesized_offsets::HAT_AND_FACE];
    let dpad = HatDirection::from_hid_value(hat_and_face & 0x0F).map_or(0, HatDirection::dpad_bits);
    let buttons = dpad
        | u16::from(hat_and_face & 0xF0)
        | (u16::from(report[synthesized_offsets::OTHER_BUTTONS]) << 8);

    let mut pressure = [0u8; PressureState::LEN];
    pressure[..4].copy_from_slice(
        &report[synthesized_offsets::DPAD_PRESSURE..synthesized_offsets::DPAD_PRESSURE + 4],
    );
    pressure[4] = report[synthesized_offsets::SHOULDER_PRESSURE];
    pressure[5] = report[synthesized_offsets::SHOULDER_PRESSURE + 1];
    pressure[6..].copy_from_slice(
        &report[synthesized_offsets::FACE_PRESSURE..synthesized_offsets::FACE_PRESSURE + 4],
    );

    Ok(GamepadState {
        left_thumb_x: report[synthesized_offsets::THUMBS],
        left_thumb_y: report[synthesized_offsets::THUMBS + 1],
        right_thumb_x: report[synthesized_offsets::THUMBS + 2],
        right_thumb_y: report[synthesized_offsets::THUMBS + 3],
        buttons,
        ps_button: report[synthesized_offsets::PS_BUTTON],
        left_trigger: report[synthesized_offsets::LEFT_TRIGGER],
        right_trigger: report[synthesized_offsets::RIGHT_TRIGGER],
        pressure: PressureState::from_bytes(&pressure),
    })
}

/// Build a raw DualShock 3 input report carrying `state`.
///
/// Used to loop canonical state back through [`parse_ds3_input`], e.g. by
/// simulated devices. `out` must hold at least [`DS3_INPUT_MIN_LEN`] bytes.
pub fn encode_ds3_input(state: &GamepadState, out: &mut [u8]) -> DualShockResult<usize> {
    if out.len() < DS3_INPUT_MIN_LEN {
        return Err(DualShockError::buffer_too_small(DS3_INPUT_MIN_LEN, out.len()));
    }
    out.fill(0);

    let [low, high] = state.buttons.to_le_bytes();
    let p = &state.pressure;

    out[ds3_offsets::REPORT_ID] = report_ids::DS3_INPUT;
    out[ds3_offsets::BUTTONS_1] = (low << 4) | (high & 0x0F);
    out[ds3_offsets::BUTTONS_2] = (low & 0xF0) | (high >> 4);
    out[ds3_offsets::PS_BUTTON] = state.ps_button & 0x01;
    out[ds3_offsets::LEFT_THUMB_X] = state.left_thumb_x;
    out[ds3_offsets::LEFT_THUMB_Y] = state.left_thumb_y;
    out[ds3_offsets::RIGHT_THUMB_X] = state.right_thumb_x;
    out[ds3_offsets::RIGHT_THUMB_Y] = state.right_thumb_y;
    out[ds3_offsets::DPAD_PRESSURE..ds3_offsets::DPAD_PRESSURE + 4]
        .copy_from_slice(&[p.up, p.right, p.down, p.left]);
    out[ds3_offsets::LEFT_TRIGGER] = state.left_trigger;
    out[ds3_offsets::RIGHT_TRIGGER] = state.right_trigger;
    out[ds3_offsets::LEFT_SHOULDER_PRESSURE] = p.left_shoulder;
    out[ds3_offsets::RIGHT_SHOULDER_PRESSURE] = p.right_shoulder;
    out[ds3_offsets::FACE_PRESSURE..ds3_offsets::FACE_PRESSURE + 4]
        .copy_from_slice(&[p.triangle, p.circle, p.cross, p.square]);

    Ok(DS3_INPUT_MIN_LEN)
}
