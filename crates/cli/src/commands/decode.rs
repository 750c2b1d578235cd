//! Raw input report decoding

use anyhow::Result;
use fireshock_hid_dualshock_protocol::{
    DeviceType, GamepadState, SYNTHESIZED_REPORT_MIN_LEN, XusbReport, buttons, parse_input,
    synthesize_input_report,
};
use serde::Serialize;

use crate::commands::DeviceArg;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
pub struct DecodeOutput {
    pub device: DeviceType,
    pub state: GamepadState,
    pub hat: String,
    pub pressed: Vec<&'static str>,
    /// Report handed to the HID stack; absent for pass-through devices.
    pub synthesized: Option<String>,
    pub xusb: XusbReport,
}

const BUTTON_NAMES: [(u16, &str); 16] = [
    (buttons::DPAD_UP, "up"),
    (buttons::DPAD_RIGHT, "right"),
    (buttons::DPAD_DOWN, "down"),
    (buttons::DPAD_LEFT, "left"),
    (buttons::TRIANGLE, "triangle"),
    (buttons::CIRCLE, "circle"),
    (buttons::CROSS, "cross"),
    (buttons::SQUARE, "square"),
    (buttons::SELECT, "select"),
    (buttons::LEFT_THUMB, "l3"),
    (buttons::RIGHT_THUMB, "r3"),
    (buttons::START, "start"),
    (buttons::LEFT_TRIGGER, "l2"),
    (buttons::RIGHT_TRIGGER, "r2"),
    (buttons::LEFT_SHOULDER, "l1"),
    (buttons::RIGHT_SHOULDER, "r1"),
];

/// Parse hex text, ignoring whitespace, `:` and `-` separators and an
/// optional `0x` prefix.
pub fn parse_hex(input: &str) -> Result<Vec<u8>, CliError> {
    let trimmed = input.trim();
    let digits: Vec<char> = trimmed
        .strip_prefix("0x")
        .unwrap_or(trimmed)
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ':' && *c != '-')
        .collect();

    if digits.len() % 2 != 0 {
        return Err(CliError::InvalidHex(format!(
            "odd number of digits ({})",
            digits.len()
        )));
    }

    digits
        .chunks(2)
        .map(|pair| {
            let text: String = pair.iter().collect();
            u8::from_str_radix(&text, 16)
                .map_err(|e| CliError::InvalidHex(format!("'{text}': {e}")))
        })
        .collect()
}

pub fn decode(device: DeviceType, raw: &[u8]) -> Result<DecodeOutput, CliError> {
    let state = parse_input(device, raw)?;
    let synthesized = match device {
        DeviceType::DualShock3 => {
            let mut report = vec![0u8; raw.len().max(SYNTHESIZED_REPORT_MIN_LEN)];
            synthesize_input_report(&state, &mut report)?;
            Some(output::hex_string(&report))
        }
        DeviceType::DualShock4 | DeviceType::Unknown => None,
    };
    let pressed = BUTTON_NAMES
        .iter()
        .filter(|(mask, _)| state.is_pressed(*mask))
        .map(|(_, name)| *name)
        .chain((state.ps_button != 0).then_some("ps"))
        .collect();

    Ok(DecodeOutput {
        device,
        hat: format!("{:?}", state.hat()),
        pressed,
        synthesized,
        xusb: XusbReport::from_gamepad_state(&state),
        state,
    })
}

pub fn execute(device: DeviceArg, hex: &str, json: bool) -> Result<()> {
    let raw = parse_hex(hex)?;
    let decoded = decode(device.into(), &raw)?;

    if json {
        return output::print_json(&decoded);
    }

    let state = &decoded.state;
    output::print_heading(&format!("{:?} input report ({} bytes)", decoded.device, raw.len()));
    output::print_field(
        "Left stick",
        format!("{:#04X}, {:#04X}", state.left_thumb_x, state.left_thumb_y),
    );
    output::print_field(
        "Right stick",
        format!("{:#04X}, {:#04X}", state.right_thumb_x, state.right_thumb_y),
    );
    output::print_field("Hat", &decoded.hat);
    output::print_field("Pressed", decoded.pressed.join(" "));
    output::print_field(
        "Triggers",
        format!("L {:#04X}  R {:#04X}", state.left_trigger, state.right_trigger),
    );
    if let Some(report) = &decoded.synthesized {
        output::print_field("Synthesized", report);
    }
    output::print_field("XUSB", output::hex_string(&decoded.xusb.to_bytes()));
    Ok(())
}
