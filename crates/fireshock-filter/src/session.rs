//! Per-device state: family context, cached input, output buffer and the
//! timers that push it to the device.

use std::sync::atomic::{AtomicU8, AtomicU32, Ordering};
use std::sync::{Arc, OnceLock, Weak};
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError};
use fireshock_hid_dualshock_protocol::{
    BdAddr, ControlSetup, DS3_ENABLE_COMMAND, DS3_INPUT_REPORT_LEN, DeviceSettings, DeviceType,
    Ds3OutputReport, Ds4OutputReport, DualShockResult, GamepadState, XusbNotification, classify,
    ds3_device_address_setup, ds3_enable_setup, ds3_host_address_read_setup,
    ds3_host_address_report, ds3_host_address_setup, ds3_output_setup, ds4_output_setup,
    parse_ds3_device_address, parse_ds3_host_address, parse_ds3_input, parse_ds4_input,
    synthesize_input_report,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::bridge::VirtualPadBridge;
use crate::config::FilterConfig;
use crate::error::{FilterError, FilterResult, NtStatus};
use crate::target::{ControlTransfer, LowerTarget};
use crate::timer::{PeriodicTimer, TimerHost};
use crate::usb::Urb;

/// Timer names, also used as thread names by the thread-backed host.
pub mod timer_names {
    pub const DS3_ENABLE: &str = "ds3-enable";
    pub const DS3_OUTPUT: &str = "ds3-output";
    pub const DS4_OUTPUT: &str = "ds4-output";
}

/// USB identity of an attached device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceIds {
    pub vendor_id: u16,
    pub product_id: u16,
}

impl DeviceIds {
    pub const fn new(vendor_id: u16, product_id: u16) -> Self {
        Self {
            vendor_id,
            product_id,
        }
    }

    pub const fn device_type(&self) -> DeviceType {
        classify(self.vendor_id, self.product_id)
    }
}

/// DualShock 3 enable handshake progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum EnableState {
    /// Nothing sent since attach or the last shutdown.
    Idle = 0,
    /// A command is on the wire.
    InFlight = 1,
    /// The last attempt failed; the retry timer owns the next one.
    Retrying = 2,
    Enabled = 3,
}

impl EnableState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::InFlight,
            2 => Self::Retrying,
            3 => Self::Enabled,
            _ => Self::Idle,
        }
    }
}

struct Ds3InputCache {
    state: GamepadState,
    report: [u8; DS3_INPUT_REPORT_LEN],
}

impl Ds3InputCache {
    fn new() -> Self {
        let state = GamepadState::neutral();
        let mut report = [0u8; DS3_INPUT_REPORT_LEN];
        if let Err(e) = synthesize_input_report(&state, &mut report) {
            debug!(error = %e, "Failed to synthesize neutral report");
        }
        Self { state, report }
    }
}

/// Bluetooth pairing of a DualShock 3, as last read from or written to it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairingAddresses {
    /// The controller's own address.
    pub device: BdAddr,
    /// The host the controller connects to over Bluetooth.
    pub host: BdAddr,
}

#[derive(Debug, Clone, Copy)]
enum PairingSlot {
    Device,
    Host,
}

impl PairingSlot {
    const fn setup(self) -> ControlSetup {
        match self {
            Self::Device => ds3_device_address_setup(),
            Self::Host => ds3_host_address_read_setup(),
        }
    }

    fn parse(self, report: &[u8]) -> DualShockResult<BdAddr> {
        match self {
            Self::Device => parse_ds3_device_address(report),
            Self::Host => parse_ds3_host_address(report),
        }
    }

    fn store(self, addresses: &mut PairingAddresses, address: BdAddr) {
        match self {
            Self::Device => addresses.device = address,
            Self::Host => addresses.host = address,
        }
    }
}

/// DualShock 3 family context.
pub struct Ds3Session {
    serial: u32,
    lower: Arc<dyn LowerTarget>,
    control_timeout: Duration,
    output: Mutex<Ds3OutputReport>,
    input: Mutex<Ds3InputCache>,
    enable_state: AtomicU8,
    enable_attempts: AtomicU32,
    pairing: Mutex<PairingAddresses>,
    enable_timer: Arc<dyn PeriodicTimer>,
    output_timer: Arc<dyn PeriodicTimer>,
}

impl Ds3Session {
    pub fn new(
        serial: u32,
        lower: Arc<dyn LowerTarget>,
        timers: &dyn TimerHost,
        config: &FilterConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let retry = weak.clone();
            let enable_timer = timers.create_timer(
                timer_names::DS3_ENABLE,
                config.enable_retry_interval(),
                Arc::new(move || {
                    if let Some(session) = retry.upgrade() {
                        session.on_enable_timer();
                    }
                }),
            );
            let push = weak.clone();
            let output_timer = timers.create_timer(
                timer_names::DS3_OUTPUT,
                config.output_interval(),
                Arc::new(move || {
                    if let Some(session) = push.upgrade() {
                        session.on_output_timer();
                    }
                }),
            );

            Self {
                serial,
                lower,
                control_timeout: config.control_timeout(),
                output: Mutex::new(Ds3OutputReport::new()),
                input: Mutex::new(Ds3InputCache::new()),
                enable_state: AtomicU8::new(EnableState::Idle as u8),
                enable_attempts: AtomicU32::new(0),
                pairing: Mutex::new(PairingAddresses::default()),
                enable_timer,
                output_timer,
            }
        })
    }

    pub fn enable_state(&self) -> EnableState {
        EnableState::from_u8(self.enable_state.load(Ordering::Acquire))
    }

    /// Number of enable commands sent so far.
    pub fn enable_attempts(&self) -> u32 {
        self.enable_attempts.load(Ordering::Acquire)
    }

    fn transition(&self, from: EnableState, to: EnableState) -> bool {
        self.enable_state
            .compare_exchange(from as u8, to as u8, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Start the enable handshake unless it already ran or is running.
    pub fn trigger_enable(self: &Arc<Self>) {
        if self.transition(EnableState::Idle, EnableState::InFlight) {
            self.send_enable();
        }
    }

    fn on_enable_timer(self: &Arc<Self>) {
        if self.transition(EnableState::Retrying, EnableState::InFlight) {
            self.send_enable();
        }
    }

    fn send_enable(self: &Arc<Self>) {
        let attempt = self
            .enable_attempts
            .fetch_add(1, Ordering::AcqRel)
            .wrapping_add(1);
        debug!(serial = self.serial, attempt, "Sending enable command");

        let transfer =
            ControlTransfer::new(ds3_enable_setup(), &DS3_ENABLE_COMMAND, self.control_timeout);
        let weak = Arc::downgrade(self);
        let submitted = self.lower.submit_control(
            transfer,
            Box::new(move |status, _data| {
                if let Some(session) = weak.upgrade() {
                    session.on_enable_complete(status);
                }
            }),
        );
        if let Err(status) = submitted {
            self.on_enable_complete(status);
        }
    }

    fn on_enable_complete(self: &Arc<Self>, status: NtStatus) {
        if status.is_success() {
            if self.transition(EnableState::InFlight, EnableState::Enabled) {
                info!(
                    serial = self.serial,
                    attempts = self.enable_attempts(),
                    "DualShock 3 enabled"
                );
                self.enable_timer.stop(false);
                self.output_timer.start();
                self.read_pairing(PairingSlot::Device);
                self.read_pairing(PairingSlot::Host);
            }
        } else if self.transition(EnableState::InFlight, EnableState::Retrying) {
            warn!(serial = self.serial, %status, "Enable command failed, retrying");
            self.enable_timer.start();
        }
    }

    fn read_pairing(self: &Arc<Self>, slot: PairingSlot) {
        let transfer = ControlTransfer::read(slot.setup(), self.control_timeout);
        let weak = Arc::downgrade(self);
        let serial = self.serial;
        let submitted = self.lower.submit_control(
            transfer,
            Box::new(move |status, data| {
                let Some(session) = weak.upgrade() else {
                    return;
                };
                if !status.is_success() {
                    warn!(serial, ?slot, %status, "Address read failed");
                    return;
                }
                match slot.parse(data) {
                    Ok(address) => {
                        debug!(serial, ?slot, %address, "Address read");
                        slot.store(&mut session.pairing.lock(), address);
                    }
                    Err(e) => warn!(serial, ?slot, error = %e, "Malformed address report"),
                }
            }),
        );
        if let Err(status) = submitted {
            warn!(serial, ?slot, %status, "Address read rejected");
        }
    }

    pub fn pairing(&self) -> PairingAddresses {
        *self.pairing.lock()
    }

    /// Pair the controller with `host`, blocking until the device answers
    /// or the control timeout elapses. The cached host address only changes
    /// on success.
    pub fn set_host_address(&self, host: BdAddr) -> FilterResult<()> {
        let report = ds3_host_address_report(&host);
        let transfer =
            ControlTransfer::new(ds3_host_address_setup(), &report, self.control_timeout);
        let (done_tx, done_rx) = channel::bounded(1);
        let serial = self.serial;
        self.lower
            .submit_control(
                transfer,
                Box::new(move |status, _data| {
                    if done_tx.send(status).is_err() {
                        debug!(serial, %status, "Host address completion arrived after timeout");
                    }
                }),
            )
            .map_err(FilterError::Lower)?;

        let status = match done_rx.recv_timeout(self.control_timeout) {
            Ok(status) => status,
            Err(RecvTimeoutError::Timeout) => NtStatus::IoTimeout,
            Err(RecvTimeoutError::Disconnected) => NtStatus::Cancelled,
        };
        if !status.is_success() {
            warn!(serial, %status, "Host address transfer failed");
            return Err(FilterError::Lower(status));
        }
        self.pairing.lock().host = host;
        info!(serial, %host, "Host address set");
        Ok(())
    }

    fn on_output_timer(&self) {
        let snapshot = *self.output.lock().as_bytes();
        let transfer = ControlTransfer::new(ds3_output_setup(), &snapshot, self.control_timeout);
        let serial = self.serial;
        let submitted = self.lower.submit_control(
            transfer,
            Box::new(move |status, _data| {
                if !status.is_success() {
                    warn!(serial, %status, "Output report transfer failed");
                }
            }),
        );
        if let Err(status) = submitted {
            warn!(serial, %status, "Output report transfer rejected");
        }
    }

    /// Decode an IN transfer and replace it with the synthesized report, or
    /// with the cached one when HID input is disabled.
    pub fn handle_input(&self, settings: &DeviceSettings, urb: &mut Urb) -> FilterResult<GamepadState> {
        let state = parse_ds3_input(urb.data())?;
        let mut cache = self.input.lock();
        cache.state = state;

        let data = urb.data_mut();
        if settings.fs_hid_input_enabled {
            synthesize_input_report(&state, data)?;
            cache.report.fill(0);
            for (dst, src) in cache.report.iter_mut().zip(data.iter()) {
                *dst = *src;
            }
        } else {
            data.fill(0);
            for (dst, src) in data.iter_mut().zip(cache.report.iter()) {
                *dst = *src;
            }
        }
        Ok(state)
    }

    pub fn cached_state(&self) -> GamepadState {
        self.input.lock().state
    }

    /// Copy of the most recent synthesized report.
    pub fn cached_report(&self) -> [u8; DS3_INPUT_REPORT_LEN] {
        self.input.lock().report
    }

    /// Merge an output report written by the HID stack.
    pub fn apply_upstream_output(&self, data: &[u8]) -> FilterResult<()> {
        self.output.lock().apply_upstream(data)?;
        Ok(())
    }

    /// Apply rumble and, for player slots 1-4, the matching LED.
    pub fn apply_virtual_output(&self, notification: &XusbNotification) {
        let mut output = self.output.lock();
        output.set_rumble(notification.small_motor, notification.large_motor);
        if let Some(mask) = notification.ds3_led_mask() {
            output.set_led_mask(mask);
        }
    }

    pub fn output_report(&self) -> Ds3OutputReport {
        *self.output.lock()
    }

    pub fn output_running(&self) -> bool {
        self.output_timer.is_running()
    }

    /// Stop both timers and forget the handshake.
    pub fn shutdown(&self) {
        self.output_timer.stop(true);
        self.enable_timer.stop(false);
        self.enable_state
            .store(EnableState::Idle as u8, Ordering::Release);
    }
}

/// DualShock 4 family context.
pub struct Ds4Session {
    serial: u32,
    lower: Arc<dyn LowerTarget>,
    control_timeout: Duration,
    output: Mutex<Ds4OutputReport>,
    state: Mutex<GamepadState>,
    output_timer: Arc<dyn PeriodicTimer>,
}

impl Ds4Session {
    pub fn new(
        serial: u32,
        lower: Arc<dyn LowerTarget>,
        timers: &dyn TimerHost,
        config: &FilterConfig,
    ) -> Arc<Self> {
        Arc::new_cyclic(|weak: &Weak<Self>| {
            let push = weak.clone();
            let output_timer = timers.create_timer(
                timer_names::DS4_OUTPUT,
                config.output_interval(),
                Arc::new(move || {
                    if let Some(session) = push.upgrade() {
                        session.on_output_timer();
                    }
                }),
            );
            Self {
                serial,
                lower,
                control_timeout: config.control_timeout(),
                output: Mutex::new(Ds4OutputReport::new()),
                state: Mutex::new(GamepadState::neutral()),
                output_timer,
            }
        })
    }

    pub fn ensure_output_running(&self) {
        self.output_timer.start();
    }

    fn on_output_timer(&self) {
        let snapshot = *self.output.lock().as_bytes();
        let transfer = ControlTransfer::new(ds4_output_setup(), &snapshot, self.control_timeout);
        let serial = self.serial;
        let submitted = self.lower.submit_control(
            transfer,
            Box::new(move |status, _data| {
                if !status.is_success() {
                    warn!(serial, %status, "Output report transfer failed");
                }
            }),
        );
        if let Err(status) = submitted {
            warn!(serial, %status, "Output report transfer rejected");
        }
    }

    /// Decode an IN transfer; the transfer itself is left untouched.
    pub fn handle_input(&self, urb: &Urb) -> FilterResult<GamepadState> {
        let state = parse_ds4_input(urb.data())?;
        *self.state.lock() = state;
        Ok(state)
    }

    pub fn cached_state(&self) -> GamepadState {
        *self.state.lock()
    }

    pub fn apply_virtual_output(&self, notification: &XusbNotification) {
        self.output
            .lock()
            .set_rumble(notification.small_motor, notification.large_motor);
    }

    pub fn output_report(&self) -> Ds4OutputReport {
        *self.output.lock()
    }

    pub fn output_running(&self) -> bool {
        self.output_timer.is_running()
    }

    pub fn shutdown(&self) {
        self.output_timer.stop(true);
    }
}

/// Family-specific state, built once the device type is known.
#[derive(Clone)]
pub enum FamilyContext {
    DualShock3(Arc<Ds3Session>),
    DualShock4(Arc<Ds4Session>),
}

/// One attached device.
pub struct DeviceSession {
    serial: u32,
    ids: DeviceIds,
    device_type: DeviceType,
    lower: Arc<dyn LowerTarget>,
    family: OnceLock<FamilyContext>,
    bridge: OnceLock<VirtualPadBridge>,
}

impl DeviceSession {
    pub fn new(serial: u32, ids: DeviceIds, lower: Arc<dyn LowerTarget>) -> Self {
        Self {
            serial,
            ids,
            device_type: ids.device_type(),
            lower,
            family: OnceLock::new(),
            bridge: OnceLock::new(),
        }
    }

    /// Enumeration index.
    pub fn serial(&self) -> u32 {
        self.serial
    }

    pub fn ids(&self) -> DeviceIds {
        self.ids
    }

    pub fn device_type(&self) -> DeviceType {
        self.device_type
    }

    pub fn lower(&self) -> &Arc<dyn LowerTarget> {
        &self.lower
    }

    /// Build the family context for a known device type. Later calls and
    /// unknown devices leave the session unchanged.
    pub fn init_family(&self, timers: &dyn TimerHost, config: &FilterConfig) {
        let context = match self.device_type {
            DeviceType::DualShock3 => FamilyContext::DualShock3(Ds3Session::new(
                self.serial,
                Arc::clone(&self.lower),
                timers,
                config,
            )),
            DeviceType::DualShock4 => FamilyContext::DualShock4(Ds4Session::new(
                self.serial,
                Arc::clone(&self.lower),
                timers,
                config,
            )),
            DeviceType::Unknown => return,
        };
        if self.family.set(context).is_err() {
            debug!(serial = self.serial, "Family context already set");
        }
    }

    pub fn family(&self) -> Option<&FamilyContext> {
        self.family.get()
    }

    pub fn ds3(&self) -> Option<&Arc<Ds3Session>> {
        match self.family.get() {
            Some(FamilyContext::DualShock3(ds3)) => Some(ds3),
            _ => None,
        }
    }

    pub fn ds4(&self) -> Option<&Arc<Ds4Session>> {
        match self.family.get() {
            Some(FamilyContext::DualShock4(ds4)) => Some(ds4),
            _ => None,
        }
    }

    pub fn set_bridge(&self, bridge: VirtualPadBridge) {
        if self.bridge.set(bridge).is_err() {
            debug!(serial = self.serial, "Virtual pad bridge already set");
        }
    }

    pub fn bridge(&self) -> Option<&VirtualPadBridge> {
        self.bridge.get()
    }

    /// An IN transfer is about to be read from the device.
    pub fn on_input_requested(&self) {
        match self.family.get() {
            Some(FamilyContext::DualShock3(ds3)) => ds3.trigger_enable(),
            Some(FamilyContext::DualShock4(ds4)) => ds4.ensure_output_running(),
            None => {}
        }
    }

    /// Decode a completed IN transfer, rewriting it where the family needs.
    pub fn handle_input(
        &self,
        settings: &DeviceSettings,
        urb: &mut Urb,
    ) -> Option<FilterResult<GamepadState>> {
        match self.family.get()? {
            FamilyContext::DualShock3(ds3) => Some(ds3.handle_input(settings, urb)),
            FamilyContext::DualShock4(ds4) => Some(ds4.handle_input(urb)),
        }
    }

    pub fn apply_virtual_output(&self, notification: &XusbNotification) {
        match self.family.get() {
            Some(FamilyContext::DualShock3(ds3)) => ds3.apply_virtual_output(notification),
            Some(FamilyContext::DualShock4(ds4)) => ds4.apply_virtual_output(notification),
            None => {}
        }
    }

    /// Stop every timer. Safe to call repeatedly.
    pub fn shutdown(&self) {
        match self.family.get() {
            Some(FamilyContext::DualShock3(ds3)) => ds3.shutdown(),
            Some(FamilyContext::DualShock4(ds4)) => ds4.shutdown(),
            None => {}
        }
        debug!(serial = self.serial, "Session timers stopped");
    }
}
