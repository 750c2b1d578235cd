//! Attach/detach, enable handshake, timers and virtual pad lifecycle.

mod common;

use common::{DS3, DS4, Harness, TestResult, UNKNOWN, ds3_report, read_input, request};
use fireshock_filter::prelude::*;
use fireshock_filter::protocol::{DS3_INPUT_REPORT_LEN, XusbNotification};
use fireshock_filter::session::timer_names;

#[test]
fn test_serials_and_control_device() -> TestResult {
    let harness = Harness::new()?;
    let (first, _) = harness.attach(DS3);
    let (second, _) = harness.attach(DS4);
    assert_eq!((first.serial(), second.serial()), (0, 1));
    assert_eq!(harness.control.created(), 1);

    harness.filter.detach(first.serial())?;
    assert!(harness.control.exists());
    harness.filter.detach(second.serial())?;
    assert!(!harness.control.exists());
    assert_eq!((harness.control.created(), harness.control.deleted()), (1, 1));
    assert_eq!(harness.filter.registry().count(), 0);
    Ok(())
}

#[test]
fn test_detach_unknown_serial() -> TestResult {
    let harness = Harness::new()?;
    assert_eq!(
        harness.filter.detach(4),
        Err(FilterError::UnknownSerial(4))
    );
    Ok(())
}

#[test]
fn test_enable_retries_until_success() -> TestResult {
    for failures in 0..5u32 {
        let harness = Harness::new()?;
        let (session, lower) = harness.attach(DS3);
        lower.fail_next_enables(failures);

        read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;
        for _ in 0..failures {
            assert!(!harness.timers.is_running(timer_names::DS3_OUTPUT));
            assert_eq!(harness.timers.fire(timer_names::DS3_ENABLE), 1);
        }

        assert_eq!(lower.enable_attempts(), failures as usize + 1);
        assert!(harness.timers.is_running(timer_names::DS3_OUTPUT));
        assert!(!harness.timers.is_running(timer_names::DS3_ENABLE));
        assert_eq!(harness.timers.fire(timer_names::DS3_ENABLE), 0);
        assert_eq!(harness.timers.starts(timer_names::DS3_OUTPUT), 1);
    }
    Ok(())
}

#[test]
fn test_output_failures_keep_timer_running() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;
    lower.set_control_status(NtStatus::IoTimeout);

    for _ in 0..3 {
        assert_eq!(harness.timers.fire(timer_names::DS3_OUTPUT), 1);
    }

    assert!(harness.timers.is_running(timer_names::DS3_OUTPUT));
    let pushes = lower
        .control_transfers()
        .iter()
        .filter(|transfer| transfer.setup.w_value == 0x0201)
        .count();
    assert_eq!(pushes, 3);
    Ok(())
}

#[test]
fn test_ds4_output_push() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS4);
    let mut raw = vec![0u8; 64];
    if let Some(id) = raw.first_mut() {
        *id = 0x01;
    }
    read_input(&harness, &session, &lower, raw)?;

    harness.timers.fire(timer_names::DS4_OUTPUT);

    let transfers = lower.control_transfers();
    let push = transfers.first().ok_or("no output pushed")?;
    assert_eq!(push.setup.w_value, 0x0205);
    assert_eq!(push.buffer.len(), 32);
    assert_eq!(lower.enable_attempts(), 0);
    Ok(())
}

#[test]
fn test_detach_stops_timers_cancels_io_and_unplugs() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;

    let (pending, slot) = request(Urb::interrupt_in(0x81, DS3_INPUT_REPORT_LEN));
    harness.filter.dispatch_internal_ioctl(&session, pending);
    assert_eq!(lower.pending_count(), 1);

    harness.filter.detach(session.serial())?;

    assert!(!harness.timers.is_running(timer_names::DS3_OUTPUT));
    assert_eq!(harness.timers.stops(timer_names::DS3_OUTPUT), vec![true]);
    assert_eq!(lower.cancel_count(), 1);
    let cancelled = slot.lock().take().ok_or("pending request not completed")?;
    assert_eq!(cancelled.status, NtStatus::Cancelled);
    assert_eq!(harness.bus.unplugged(), vec![1]);
    Ok(())
}

#[test]
fn test_unknown_device_gets_no_virtual_pad() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(UNKNOWN);
    assert!(session.bridge().is_none());
    assert!(session.family().is_none());
    harness.filter.detach(session.serial())?;
    assert!(harness.bus.plugged().is_empty());
    assert!(harness.bus.unplugged().is_empty());
    Ok(())
}

#[test]
fn test_bus_removal_silences_bridge() -> TestResult {
    let harness = Harness::new()?;
    let (session, lower) = harness.attach(DS3);
    read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;
    assert_eq!(harness.bus.reports().len(), 1);

    harness.filter.on_virtual_bus_removed();
    read_input(&harness, &session, &lower, ds3_report(&GamepadState::neutral())?)?;
    assert_eq!(harness.bus.reports().len(), 1);

    harness.filter.detach(session.serial())?;
    assert_eq!(harness.bus.unplugged(), vec![1]);
    Ok(())
}

#[test]
fn test_virtual_rumble_reaches_output_buffer() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS3);
    let pad = session.bridge().ok_or("no bridge")?.pad_serial();

    assert!(harness.bus.notify(
        pad,
        XusbNotification {
            large_motor: 0x80,
            small_motor: 0x01,
            led_number: 0,
        },
    ));

    let ds3 = session.ds3().ok_or("no ds3 context")?;
    assert_eq!(ds3.output_report().rumble(), (0x01, 0x80));
    Ok(())
}

#[test]
fn test_virtual_rumble_respects_settings() -> TestResult {
    let harness = Harness::new()?;
    let (session, _lower) = harness.attach(DS4);
    harness.filter.registry().set_settings(
        session.serial(),
        DeviceSettings {
            xusb_hid_output_enabled: false,
            ..DeviceSettings::default()
        },
    )?;
    let pad = session.bridge().ok_or("no bridge")?.pad_serial();

    harness.bus.notify(
        pad,
        XusbNotification {
            large_motor: 0xFF,
            small_motor: 0xFF,
            led_number: 0,
        },
    );

    let ds4 = session.ds4().ok_or("no ds4 context")?;
    assert_eq!(ds4.output_report().rumble(), (0, 0));
    Ok(())
}

#[test]
fn test_pad_serial_offset_is_configurable() -> TestResult {
    let harness = Harness::with_config(FilterConfig::builder().virtual_pad_serial_offset(10).build()?)?;
    let (session, _lower) = harness.attach(DS3);
    assert_eq!(session.bridge().map(|bridge| bridge.pad_serial()), Some(10));
    assert_eq!(harness.bus.plugged(), vec![10]);
    Ok(())
}

#[test]
fn test_invalid_config_is_rejected() {
    let config = FilterConfig {
        output_interval_ms: 0,
        ..FilterConfig::default()
    };
    assert!(matches!(
        Harness::with_config(config),
        Err(FilterError::InvalidConfiguration(_))
    ));
}
