use fireshock_hid_dualshock_protocol::{
    AddressRequest, CONFIGURATION_HEADER_LEN, DS3_CONFIGURATION_DESCRIPTOR,
    DS3_HID_REPORT_DESCRIPTOR, DS3_INPUT_REPORT_LEN, DeviceSettings, DeviceType,
    DeviceTypeRequest, DualShockError, GamepadReportRequest, GamepadState, HAT_RELEASED,
    HatDirection, PressureState, SettingsRequest, SidebandCode, XusbReport, buttons,
    encode_ds3_input, parse_ds3_input, parse_synthesized_report, scale_axis,
    synthesize_configuration, synthesize_input_report, synthesize_report_descriptor, xusb_buttons,
};
use proptest::prelude::*;

prop_compose! {
    fn arb_pressure()(bytes in any::<[u8; 10]>()) -> PressureState {
        PressureState::from_bytes(&bytes)
    }
}

prop_compose! {
    fn arb_state()(
        thumbs in any::<[u8; 4]>(),
        buttons in any::<u16>(),
        ps in 0u8..=1,
        left_trigger in any::<u8>(),
        right_trigger in any::<u8>(),
        pressure in arb_pressure(),
    ) -> GamepadState {
        GamepadState {
            left_thumb_x: thumbs[0],
            left_thumb_y: thumbs[1],
            right_thumb_x: thumbs[2],
            right_thumb_y: thumbs[3],
            buttons,
            ps_button: ps,
            left_trigger,
            right_trigger,
            pressure,
        }
    }
}

const HAT_PATTERNS: [u8; 8] = [0x1, 0x3, 0x2, 0x6, 0x4, 0xC, 0x8, 0x9];

// ── Report codec ────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(500))]

    /// A raw DS3 report built from any state decodes back to that state.
    #[test]
    fn prop_ds3_raw_round_trip(state in arb_state()) {
        let mut raw = [0u8; DS3_INPUT_REPORT_LEN];
        let encoded = encode_ds3_input(&state, &mut raw);
        prop_assert!(encoded.is_ok());
        prop_assert_eq!(parse_ds3_input(&raw), Ok(state));
    }

    /// Synthesized reports preserve every field when the D-pad has a hat value.
    #[test]
    fn prop_synthesized_round_trip(
        state in arb_state(),
        pattern in prop::sample::select(HAT_PATTERNS.to_vec()),
    ) {
        let mut state = state;
        state.buttons = (state.buttons & !buttons::DPAD_MASK) | u16::from(pattern);

        let mut raw = [0u8; DS3_INPUT_REPORT_LEN];
        prop_assert!(encode_ds3_input(&state, &mut raw).is_ok());
        let decoded = parse_ds3_input(&raw);
        prop_assert_eq!(decoded, Ok(state));

        let mut report = [0u8; DS3_INPUT_REPORT_LEN];
        prop_assert_eq!(synthesize_input_report(&state, &mut report), Ok(DS3_INPUT_REPORT_LEN));
        prop_assert_eq!(parse_synthesized_report(&report), Ok(state));
    }

    /// The synthesized report never carries an out-of-range hat value.
    #[test]
    fn prop_synthesized_hat_in_range(state in arb_state()) {
        let mut report = [0u8; DS3_INPUT_REPORT_LEN];
        prop_assert!(synthesize_input_report(&state, &mut report).is_ok());
        prop_assert!(report[5] & 0x0F <= HAT_RELEASED);
        prop_assert_eq!(report[5] & 0xF0, (state.buttons & 0xF0) as u8);
    }

    /// Any nibble outside the eight direction patterns reads as released.
    #[test]
    fn prop_hat_total_over_any_byte(raw in any::<u8>()) {
        let nibble = raw & 0x0F;
        let hat = HatDirection::from_dpad_nibble(raw).hid_value();
        if HAT_PATTERNS.contains(&nibble) {
            prop_assert!(hat < HAT_RELEASED);
        } else {
            prop_assert_eq!(hat, HAT_RELEASED);
        }
    }
}

// ── Axis scaling ────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    #[test]
    fn prop_scale_axis_monotone(a in any::<u8>(), b in any::<u8>()) {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(scale_axis(lo, false) <= scale_axis(hi, false));
    }

    #[test]
    fn prop_scale_axis_flip_negates(x in any::<u8>()) {
        prop_assert_eq!(scale_axis(x, true), -scale_axis(x, false));
    }

    #[test]
    fn prop_xusb_face_buttons(state in arb_state()) {
        let report = XusbReport::from_gamepad_state(&state);
        prop_assert_eq!(report.buttons & xusb_buttons::A != 0, state.is_pressed(buttons::CROSS));
        prop_assert_eq!(report.buttons & xusb_buttons::B != 0, state.is_pressed(buttons::CIRCLE));
        prop_assert_eq!(report.buttons & xusb_buttons::X != 0, state.is_pressed(buttons::SQUARE));
        prop_assert_eq!(report.buttons & xusb_buttons::Y != 0, state.is_pressed(buttons::TRIANGLE));
        prop_assert_eq!(report.buttons & xusb_buttons::GUIDE != 0, state.ps_button != 0);
    }
}

#[test]
fn scale_axis_range_endpoints() {
    assert_eq!(scale_axis(0, false), -32766);
    assert_eq!(scale_axis(128, false), 0);
    assert_eq!(scale_axis(255, false), 32766);
}

#[test]
fn hat_table_is_total_over_nibbles() {
    let released = (0u8..16)
        .filter(|n| HatDirection::from_dpad_nibble(*n) == HatDirection::Released)
        .count();
    assert_eq!(released, 8);
}

// ── Descriptors ─────────────────────────────────────────────────────────────

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(128))]

    #[test]
    fn prop_configuration_truncated_to_buffer(len in CONFIGURATION_HEADER_LEN..=96usize) {
        let mut out = vec![0xEEu8; len];
        let written = synthesize_configuration(DeviceType::DualShock3, &mut out);
        let expected = len.min(DS3_CONFIGURATION_DESCRIPTOR.len());
        prop_assert_eq!(written, Ok(expected));
        prop_assert_eq!(&out[..expected], &DS3_CONFIGURATION_DESCRIPTOR[..expected]);
        prop_assert!(out[expected..].iter().all(|b| *b == 0xEE));
    }

    #[test]
    fn prop_report_descriptor_truncated_to_buffer(len in 1usize..=256) {
        let mut out = vec![0u8; len];
        let written = synthesize_report_descriptor(DeviceType::DualShock3, &mut out);
        let expected = len.min(DS3_HID_REPORT_DESCRIPTOR.len());
        prop_assert_eq!(written, Ok(expected));
        prop_assert_eq!(&out[..expected], &DS3_HID_REPORT_DESCRIPTOR[..expected]);
    }
}

// ── Sideband structures ─────────────────────────────────────────────────────

#[test]
fn settings_round_trip_all_combinations() -> Result<(), Box<dyn std::error::Error>> {
    for bits in 0..32u8 {
        let request = SettingsRequest {
            serial_no: u32::from(bits),
            settings: DeviceSettings::from_bits(bits),
        };
        let parsed = SettingsRequest::parse(&request.to_bytes())?;
        assert_eq!(parsed, request);
    }
    Ok(())
}

proptest! {
    #![proptest_config(proptest::test_runner::Config::with_cases(256))]

    /// Any declared size other than the canonical one is rejected.
    #[test]
    fn prop_declared_size_must_match(
        declared in any::<u32>(),
        code in prop::sample::select(SidebandCode::ALL.to_vec()),
    ) {
        let canonical = code.structure_len();
        prop_assume!(declared as usize != canonical);

        let mut buffer = vec![0u8; canonical];
        buffer[..4].copy_from_slice(&declared.to_le_bytes());
        let result = match code {
            SidebandCode::RequestReport | SidebandCode::SubmitReport => {
                GamepadReportRequest::parse(&buffer).map(|_| ())
            }
            SidebandCode::RequestSettings | SidebandCode::SubmitSettings => {
                SettingsRequest::parse(&buffer).map(|_| ())
            }
            SidebandCode::GetHostAddress
            | SidebandCode::GetDeviceAddress
            | SidebandCode::SetHostAddress => AddressRequest::parse(&buffer).map(|_| ()),
            SidebandCode::GetDeviceType => DeviceTypeRequest::parse(&buffer).map(|_| ()),
        };
        let rejected = matches!(result, Err(DualShockError::InvalidSize { .. }));
        prop_assert!(rejected);
    }

    #[test]
    fn prop_gamepad_request_round_trip(serial in any::<u32>(), state in arb_state()) {
        let request = GamepadReportRequest { serial_no: serial, state };
        prop_assert_eq!(GamepadReportRequest::parse(&request.to_bytes()), Ok(request));
    }
}
