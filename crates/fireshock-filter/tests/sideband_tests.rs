//! Sideband IOCTL handling through the filter.

mod common;

use common::{DS3, DS4, Harness, TestResult, UNKNOWN, ds3_report, read_input};
use fireshock_filter::prelude::*;
use fireshock_filter::protocol::{
    AddressRequest, BdAddr, DeviceTypeRequest, GamepadReportRequest,
    IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR, IOCTL_FIRESHOCK_GET_DEVICE_TYPE,
    IOCTL_FIRESHOCK_GET_HOST_BD_ADDR, IOCTL_FIRESHOCK_REQUEST_REPORT,
    IOCTL_FIRESHOCK_REQUEST_SETTINGS, IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
    IOCTL_FIRESHOCK_SUBMIT_REPORT, IOCTL_FIRESHOCK_SUBMIT_SETTINGS, SettingsRequest, buttons,
};

fn report_request(serial_no: u32) -> Vec<u8> {
    GamepadReportRequest {
        serial_no,
        state: GamepadState::neutral(),
    }
    .to_bytes()
}

fn settings_request(serial_no: u32, settings: DeviceSettings) -> Vec<u8> {
    SettingsRequest {
        serial_no,
        settings,
    }
    .to_bytes()
}

fn address_request(serial_no: u32, address: BdAddr) -> Vec<u8> {
    AddressRequest { serial_no, address }.to_bytes()
}

fn device_type_request(serial_no: u32) -> Vec<u8> {
    DeviceTypeRequest {
        serial_no,
        device_type: DeviceType::Unknown,
    }
    .to_bytes()
}

const HOST: BdAddr = BdAddr([0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]);

#[test]
fn test_empty_registry_reports_no_device() -> TestResult {
    let harness = Harness::new()?;
    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_REPORT, &report_request(0));
    assert_eq!(reply.status, NtStatus::NoSuchDevice);
    assert_eq!(reply.information(), 0);
    Ok(())
}

#[test]
fn test_request_report_returns_cached_state() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    let mut state = GamepadState::neutral();
    state.buttons = buttons::TRIANGLE | buttons::START;
    state.left_thumb_x = 0x20;
    read_input(&harness, &session, &lower, ds3_report(&state)?)?;

    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_REPORT, &report_request(session.serial()));

    assert_eq!(reply.status, NtStatus::Success);
    assert_eq!(reply.information(), GamepadReportRequest::LEN);
    let response = GamepadReportRequest::parse(&reply.output)?;
    assert_eq!(response.serial_no, session.serial());
    assert_eq!(response.state.buttons, state.buttons);
    assert_eq!(response.state.left_thumb_x, 0x20);
    Ok(())
}

#[test]
fn test_request_report_rejects_ds4() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS4);
    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_REPORT, &report_request(session.serial()));
    assert_eq!(reply.status, NtStatus::InvalidParameter);
    Ok(())
}

#[test]
fn test_unknown_serial_is_invalid() -> TestResult {
    let harness = Harness::new()?;
    harness.attach(DS3);
    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_SETTINGS, &settings_request(9, DeviceSettings::default()));
    assert_eq!(reply.status, NtStatus::InvalidParameter);
    Ok(())
}

#[test]
fn test_settings_round_trip() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);
    let settings = DeviceSettings {
        xusb_emulation_enabled: false,
        fs_hid_output_enabled: false,
        ..DeviceSettings::default()
    };

    let submitted = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_SUBMIT_SETTINGS,
        &settings_request(session.serial(), settings),
    );
    assert_eq!(submitted.status, NtStatus::Success);

    let reply = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_REQUEST_SETTINGS,
        &settings_request(session.serial(), DeviceSettings::default()),
    );
    assert_eq!(reply.status, NtStatus::Success);
    assert_eq!(reply.information(), SettingsRequest::LEN);
    assert_eq!(SettingsRequest::parse(&reply.output)?.settings, settings);
    assert_eq!(harness.filter.registry().settings(session.serial())?, settings);
    Ok(())
}

#[test]
fn test_wrong_declared_size_does_not_mutate() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);
    let mut buffer = settings_request(session.serial(), DeviceSettings::from_bits(0));
    if let Some(size) = buffer.first_mut() {
        *size = 15;
    }

    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_SUBMIT_SETTINGS, &buffer);

    assert_eq!(reply.status, NtStatus::InvalidParameter);
    assert_eq!(
        harness.filter.registry().settings(session.serial())?,
        DeviceSettings::default()
    );
    Ok(())
}

#[test]
fn test_transport_length_mismatch_is_invalid() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);
    let mut buffer = settings_request(session.serial(), DeviceSettings::from_bits(0));
    buffer.push(0);

    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_SUBMIT_SETTINGS, &buffer);

    assert_eq!(reply.status, NtStatus::InvalidParameter);
    assert_eq!(
        harness.filter.registry().settings(session.serial())?,
        DeviceSettings::default()
    );
    Ok(())
}

#[test]
fn test_unsupported_codes() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);

    let submit = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_SUBMIT_REPORT, &report_request(session.serial()));
    assert_eq!(submit.status, NtStatus::InvalidParameter);

    let unknown = harness.filter.dispatch_sideband(0x0022_0000, &[]);
    assert_eq!(unknown.status, NtStatus::InvalidParameter);
    Ok(())
}

#[test]
fn test_unclassified_session_has_settings_but_no_report() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(UNKNOWN);

    let settings = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_REQUEST_SETTINGS,
        &settings_request(session.serial(), DeviceSettings::default()),
    );
    assert_eq!(settings.status, NtStatus::Success);

    let report = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_REPORT, &report_request(session.serial()));
    assert_eq!(report.status, NtStatus::InvalidParameter);
    Ok(())
}

#[test]
fn test_report_before_family_context_is_not_ready() -> TestResult {
    let harness = Harness::new()?;
    let session = harness
        .filter
        .registry()
        .register(DeviceSettings::default(), |serial| {
            DeviceSession::new(
                serial,
                DS3,
                std::sync::Arc::new(fireshock_filter::mock::MockLowerTarget::new()),
            )
        });

    let reply = harness
        .filter
        .dispatch_sideband(IOCTL_FIRESHOCK_REQUEST_REPORT, &report_request(session.serial()));
    assert_eq!(reply.status, NtStatus::DeviceNotReady);
    Ok(())
}

#[test]
fn test_get_device_type_for_every_family() -> TestResult {
    let harness = Harness::new()?;
    for (ids, expected) in [
        (DS3, DeviceType::DualShock3),
        (DS4, DeviceType::DualShock4),
        (UNKNOWN, DeviceType::Unknown),
    ] {
        let (session, _lower) = harness.attach(ids);
        let reply = harness.filter.dispatch_sideband(
            IOCTL_FIRESHOCK_GET_DEVICE_TYPE,
            &device_type_request(session.serial()),
        );
        assert_eq!(reply.status, NtStatus::Success);
        assert_eq!(reply.information(), DeviceTypeRequest::LEN);
        let response = DeviceTypeRequest::parse(&reply.output)?;
        assert_eq!(response.serial_no, session.serial());
        assert_eq!(response.device_type, expected);
    }
    Ok(())
}

#[test]
fn test_get_device_address_after_enable() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    let mut feature = vec![0u8; 18];
    if let Some(address) = feature.get_mut(4..10) {
        address.copy_from_slice(&[0x04, 0x76, 0x6E, 0xA1, 0xB2, 0xC3]);
    }
    lower.set_feature_response(0x03F2, feature);
    read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;

    let reply = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR,
        &address_request(session.serial(), BdAddr::default()),
    );

    assert_eq!(reply.status, NtStatus::Success);
    assert_eq!(reply.information(), AddressRequest::LEN);
    assert_eq!(
        AddressRequest::parse(&reply.output)?.address,
        BdAddr([0x04, 0x76, 0x6E, 0xA1, 0xB2, 0xC3])
    );
    Ok(())
}

#[test]
fn test_get_host_address_before_enable_is_zero() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);
    let reply = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
        &address_request(session.serial(), HOST),
    );
    assert_eq!(reply.status, NtStatus::Success);
    assert_eq!(AddressRequest::parse(&reply.output)?.address, BdAddr::default());
    Ok(())
}

#[test]
fn test_set_host_address_sends_feature_report() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);

    let reply = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
        &address_request(session.serial(), HOST),
    );
    assert_eq!(reply.status, NtStatus::Success);

    let transfers = lower.control_transfers();
    let sent = transfers
        .iter()
        .find(|t| t.setup.w_value == 0x03F5 && t.setup.is_set_report())
        .ok_or("no host address transfer")?;
    assert_eq!(sent.setup.w_length, 8);
    assert_eq!(sent.buffer, vec![0x00, 0x00, 0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]);

    let read_back = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
        &address_request(session.serial(), BdAddr::default()),
    );
    assert_eq!(AddressRequest::parse(&read_back.output)?.address, HOST);
    Ok(())
}

#[test]
fn test_failed_set_host_address_keeps_cache() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    lower.set_control_status(NtStatus::Unsuccessful);

    let reply = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
        &address_request(session.serial(), HOST),
    );
    assert_eq!(reply.status, NtStatus::Unsuccessful);

    let read_back = harness.filter.dispatch_sideband(
        IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
        &address_request(session.serial(), BdAddr::default()),
    );
    assert_eq!(read_back.status, NtStatus::Success);
    assert_eq!(AddressRequest::parse(&read_back.output)?.address, BdAddr::default());
    Ok(())
}

#[test]
fn test_address_requests_require_exact_size() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    let mut long = address_request(session.serial(), HOST);
    long.push(0);
    let short = device_type_request(session.serial());

    for (code, buffer) in [
        (IOCTL_FIRESHOCK_SET_HOST_BD_ADDR, &long),
        (IOCTL_FIRESHOCK_GET_HOST_BD_ADDR, &short),
        (IOCTL_FIRESHOCK_GET_DEVICE_TYPE, &long),
    ] {
        let reply = harness.filter.dispatch_sideband(code, buffer);
        assert_eq!(reply.status, NtStatus::InvalidParameter);
    }
    assert!(lower.control_transfers().iter().all(|t| t.setup.w_value != 0x03F5));
    Ok(())
}

#[test]
fn test_address_requests_reject_ds4() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS4);
    for code in [
        IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
        IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR,
        IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
    ] {
        let reply = harness
            .filter
            .dispatch_sideband(code, &address_request(session.serial(), HOST));
        assert_eq!(reply.status, NtStatus::InvalidParameter);
    }
    assert!(lower.control_transfers().is_empty());
    Ok(())
}
