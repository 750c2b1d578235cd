//! End-to-end filter simulation against in-memory hosts
//!
//! Attaches a DualShock 3 behind a mock lower target, drives interrupt IN
//! transfers through the filter, fires the session timers by hand and then
//! queries the sideband surface the way a configuration tool would. The
//! mock device answers address reads with [`SIMULATED_DEVICE_ADDRESS`].

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use fireshock_filter::mock::{
    ManualTimerHost, MockConnector, MockControlDeviceHost, MockLowerTarget, MockVirtualPadBus,
};
use fireshock_filter::prelude::*;
use fireshock_filter::session::timer_names;
use fireshock_hid_dualshock_protocol::{
    AddressRequest, BdAddr, DS3_DEVICE_ADDRESS_REPORT_LEN, DS3_INPUT_REPORT_LEN,
    DeviceTypeRequest, GamepadReportRequest, IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR,
    IOCTL_FIRESHOCK_GET_DEVICE_TYPE, IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
    IOCTL_FIRESHOCK_REQUEST_REPORT, IOCTL_FIRESHOCK_REQUEST_SETTINGS,
    IOCTL_FIRESHOCK_SET_HOST_BD_ADDR, SONY_VENDOR_ID, SettingsRequest, XusbNotification, buttons,
    ds3_device_address_setup, ds3_output_setup, encode_ds3_input, product_ids,
};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, info};

use crate::error::CliError;
use crate::output;

const INPUT_ENDPOINT: u8 = 0x81;

pub const SIMULATED_DEVICE_ADDRESS: BdAddr = BdAddr([0x00, 0x19, 0xC1, 0x5A, 0x3E, 0x01]);

/// Parameters of one simulation run.
#[derive(Debug, Clone, Default)]
pub struct SimulateOptions {
    pub frames: u32,
    pub fail_enable: u32,
    pub config: Option<PathBuf>,
    /// Rumble sent from the virtual pad after the last frame.
    pub rumble: Option<(u8, u8)>,
    /// Host address written through the sideband after the last frame.
    pub pair_host: Option<BdAddr>,
}

#[derive(Debug, Serialize)]
pub struct SimulationSummary {
    pub serial: u32,
    pub device_type: DeviceType,
    pub device_address: String,
    pub host_address: String,
    pub pad_serial: Option<u32>,
    pub frames: u32,
    pub enable_attempts: usize,
    pub enabled: bool,
    pub output_pushes: usize,
    pub virtual_reports: usize,
    pub rumble: (u8, u8),
    pub state: GamepadState,
    pub settings: DeviceSettings,
}

fn load_config(path: Option<&Path>) -> Result<FilterConfig, CliError> {
    let Some(path) = path else {
        return Ok(FilterConfig::default());
    };
    let text = std::fs::read_to_string(path)?;
    FilterConfig::from_json(&text).map_err(|e| CliError::InvalidConfiguration(e.to_string()))
}

/// Controller state for `frame`: sweeping left stick, cross held on odd
/// frames.
fn frame_state(frame: u32) -> GamepadState {
    let mut state = GamepadState::neutral();
    state.left_thumb_x = u8::try_from(frame.wrapping_mul(16) & 0xFF).unwrap_or(u8::MAX);
    if frame % 2 == 1 {
        state.buttons |= buttons::CROSS;
        state.pressure.cross = 0xFF;
    }
    state
}

fn read_frame(
    filter: &FireShockFilter,
    session: &Arc<DeviceSession>,
    lower: &MockLowerTarget,
    state: &GamepadState,
) -> Result<Completion, CliError> {
    let mut raw = vec![0u8; DS3_INPUT_REPORT_LEN];
    encode_ds3_input(state, &mut raw)?;
    lower.queue_input(raw);

    let slot: Arc<Mutex<Option<Completion>>> = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let request = UrbRequest::submit_urb(
        Urb::interrupt_in(INPUT_ENDPOINT, DS3_INPUT_REPORT_LEN),
        Box::new(move |completion| {
            *sink.lock() = Some(completion);
        }),
    );
    let disposition = filter.dispatch_internal_ioctl(session, request);
    debug!(?disposition, "Input transfer dispatched");

    let completion = slot.lock().take();
    completion.ok_or_else(|| CliError::Simulation("input transfer did not complete".to_string()))
}

fn sideband<T>(
    filter: &FireShockFilter,
    ioctl: u32,
    request: &[u8],
    parse: impl FnOnce(&[u8]) -> Result<T, CliError>,
) -> Result<T, CliError> {
    let reply = filter.dispatch_sideband(ioctl, request);
    if reply.status != NtStatus::Success {
        return Err(CliError::Simulation(format!(
            "sideband request {ioctl:#X} failed with {:?}",
            reply.status
        )));
    }
    parse(&reply.output)
}

fn device_address_report(address: BdAddr) -> Vec<u8> {
    let mut report = vec![0u8; DS3_DEVICE_ADDRESS_REPORT_LEN];
    if let Some(slot) = report.get_mut(4..10) {
        slot.copy_from_slice(address.as_bytes());
    }
    report
}

fn address_query(filter: &FireShockFilter, ioctl: u32, serial: u32) -> Result<BdAddr, CliError> {
    sideband(
        filter,
        ioctl,
        &AddressRequest {
            serial_no: serial,
            address: BdAddr::default(),
        }
        .to_bytes(),
        |bytes| Ok(AddressRequest::parse(bytes)?.address),
    )
}

pub fn run(options: &SimulateOptions) -> Result<SimulationSummary, CliError> {
    let config = load_config(options.config.as_deref())?;
    let timers = Arc::new(ManualTimerHost::new());
    let bus = Arc::new(MockVirtualPadBus::new());
    let filter = FireShockFilter::new(
        config,
        Arc::new(MockControlDeviceHost::new()),
        timers.clone(),
        Arc::new(MockConnector::new(bus.clone())),
    )?;

    let lower = Arc::new(MockLowerTarget::new());
    lower.fail_next_enables(options.fail_enable);
    lower.set_feature_response(
        ds3_device_address_setup().w_value,
        device_address_report(SIMULATED_DEVICE_ADDRESS),
    );
    let session = filter.attach(
        DeviceIds::new(SONY_VENDOR_ID, product_ids::DUALSHOCK3),
        lower.clone(),
    );
    let serial = session.serial();
    info!(serial, frames = options.frames, "Simulation started");

    for frame in 0..options.frames {
        let completion = read_frame(&filter, &session, &lower, &frame_state(frame))?;
        if completion.status != NtStatus::Success {
            return Err(CliError::Simulation(format!(
                "frame {frame} completed with {:?}",
                completion.status
            )));
        }
        timers.fire(timer_names::DS3_ENABLE);
        timers.fire(timer_names::DS3_OUTPUT);
    }

    let pad_serial = session.bridge().map(VirtualPadBridge::pad_serial);
    if let (Some((small, large)), Some(pad)) = (options.rumble, pad_serial) {
        let notification = XusbNotification {
            large_motor: large,
            small_motor: small,
            led_number: 0,
        };
        if !bus.notify(pad, notification) {
            return Err(CliError::Simulation(format!("virtual pad {pad} is not plugged in")));
        }
        timers.fire(timer_names::DS3_OUTPUT);
    }

    if let Some(host) = options.pair_host {
        sideband(
            &filter,
            IOCTL_FIRESHOCK_SET_HOST_BD_ADDR,
            &AddressRequest {
                serial_no: serial,
                address: host,
            }
            .to_bytes(),
            |_| Ok(()),
        )?;
    }

    let device_type = sideband(
        &filter,
        IOCTL_FIRESHOCK_GET_DEVICE_TYPE,
        &DeviceTypeRequest {
            serial_no: serial,
            device_type: DeviceType::Unknown,
        }
        .to_bytes(),
        |bytes| Ok(DeviceTypeRequest::parse(bytes)?.device_type),
    )?;
    let device_address = address_query(&filter, IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR, serial)?;
    let host_address = address_query(&filter, IOCTL_FIRESHOCK_GET_HOST_BD_ADDR, serial)?;

    let state = sideband(
        &filter,
        IOCTL_FIRESHOCK_REQUEST_REPORT,
        &GamepadReportRequest {
            serial_no: serial,
            state: GamepadState::neutral(),
        }
        .to_bytes(),
        |bytes| Ok(GamepadReportRequest::parse(bytes)?.state),
    )?;
    let settings = sideband(
        &filter,
        IOCTL_FIRESHOCK_REQUEST_SETTINGS,
        &SettingsRequest {
            serial_no: serial,
            settings: DeviceSettings::default(),
        }
        .to_bytes(),
        |bytes| Ok(SettingsRequest::parse(bytes)?.settings),
    )?;

    let output_setup = ds3_output_setup();
    let output_pushes = lower
        .control_transfers()
        .iter()
        .filter(|transfer| transfer.setup == output_setup)
        .count();
    let (enabled, rumble) = session.ds3().map_or((false, (0, 0)), |ds3| {
        (ds3.enable_state() == EnableState::Enabled, ds3.output_report().rumble())
    });

    let summary = SimulationSummary {
        serial,
        device_type,
        device_address: device_address.to_string(),
        host_address: host_address.to_string(),
        pad_serial,
        frames: options.frames,
        enable_attempts: lower.enable_attempts(),
        enabled,
        output_pushes,
        virtual_reports: bus.reports().len(),
        rumble,
        state,
        settings,
    };

    filter.detach(serial)?;
    info!(serial, enabled, "Simulation finished");
    Ok(summary)
}

pub fn execute(options: &SimulateOptions, json: bool) -> Result<()> {
    let summary = run(options)?;
    if json {
        return output::print_json(&summary);
    }

    output::print_heading("FireShock simulation");
    output::print_field("Serial", summary.serial);
    output::print_field("Device type", format!("{:?}", summary.device_type));
    output::print_field("Device address", &summary.device_address);
    output::print_field("Host address", &summary.host_address);
    output::print_field(
        "Virtual pad",
        summary
            .pad_serial
            .map_or_else(|| "none".to_string(), |pad| pad.to_string()),
    );
    output::print_field("Frames", summary.frames);
    output::print_field("Enable attempts", summary.enable_attempts);
    output::print_field("Enabled", summary.enabled);
    output::print_field("Output pushes", summary.output_pushes);
    output::print_field("Virtual reports", summary.virtual_reports);
    output::print_field(
        "Rumble",
        format!("small {:#04X}  large {:#04X}", summary.rumble.0, summary.rumble.1),
    );
    output::print_field(
        "Last state",
        format!(
            "lx {:#04X}  buttons {:#06X}",
            summary.state.left_thumb_x, summary.state.buttons
        ),
    );
    output::print_field("Settings", format!("{:#07b}", summary.settings.bits()));
    Ok(())
}
