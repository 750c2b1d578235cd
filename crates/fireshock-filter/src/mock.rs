//! In-memory stand-ins for the lower target, timers, virtual bus and
//! control device host. Used by the test suites and the CLI simulator.

use std::collections::{BTreeMap, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use fireshock_hid_dualshock_protocol::{XusbNotification, XusbReport, ds3_enable_setup};
use parking_lot::Mutex;

use crate::bridge::{NotificationFn, VirtualPadBus, VirtualPadConnector};
use crate::error::{FilterError, FilterResult, NtStatus};
use crate::registry::ControlDeviceHost;
use crate::target::{Continuation, ControlCompletion, ControlTransfer, LowerTarget, SendRejected};
use crate::timer::{PeriodicTimer, TimerCallback, TimerHost};
use crate::usb::{Urb, UrbRequest};

/// Lower target completing requests from scripted data.
///
/// Forwarded requests complete immediately with success. Requests sent with
/// a continuation consume one queued IN payload each; without one they stay
/// pending until [`MockLowerTarget::complete_pending`] or
/// [`LowerTarget::stop_and_cancel`].
pub struct MockLowerTarget {
    input_queue: Mutex<VecDeque<Vec<u8>>>,
    input_status: Mutex<NtStatus>,
    pending: Mutex<VecDeque<(UrbRequest, Continuation)>>,
    forwarded: Mutex<Vec<Urb>>,
    reject: Mutex<Option<NtStatus>>,
    enable_failures: AtomicU32,
    control_transfers: Mutex<Vec<ControlTransfer>>,
    control_status: Mutex<NtStatus>,
    feature_responses: Mutex<BTreeMap<u16, Vec<u8>>>,
    cancels: AtomicU32,
}

impl Default for MockLowerTarget {
    fn default() -> Self {
        Self::new()
    }
}

impl MockLowerTarget {
    pub fn new() -> Self {
        Self {
            input_queue: Mutex::new(VecDeque::new()),
            input_status: Mutex::new(NtStatus::Success),
            pending: Mutex::new(VecDeque::new()),
            forwarded: Mutex::new(Vec::new()),
            reject: Mutex::new(None),
            enable_failures: AtomicU32::new(0),
            control_transfers: Mutex::new(Vec::new()),
            control_status: Mutex::new(NtStatus::Success),
            feature_responses: Mutex::new(BTreeMap::new()),
            cancels: AtomicU32::new(0),
        }
    }

    /// Queue the payload of the next IN transfer.
    pub fn queue_input(&self, data: Vec<u8>) {
        self.input_queue.lock().push_back(data);
    }

    /// Status reported to continuations of IN transfers.
    pub fn set_input_status(&self, status: NtStatus) {
        *self.input_status.lock() = status;
    }

    /// Refuse every request with `status`, or accept again with `None`.
    pub fn reject_with(&self, status: Option<NtStatus>) {
        *self.reject.lock() = status;
    }

    /// Fail the next `count` enable commands.
    pub fn fail_next_enables(&self, count: u32) {
        self.enable_failures.store(count, Ordering::SeqCst);
    }

    /// Status of every other control transfer.
    pub fn set_control_status(&self, status: NtStatus) {
        *self.control_status.lock() = status;
    }

    /// Data returned by GET_REPORT transfers with `w_value`. Unscripted
    /// reads return zeros.
    pub fn set_feature_response(&self, w_value: u16, data: Vec<u8>) {
        self.feature_responses.lock().insert(w_value, data);
    }

    pub fn forwarded(&self) -> Vec<Urb> {
        self.forwarded.lock().clone()
    }

    pub fn control_transfers(&self) -> Vec<ControlTransfer> {
        self.control_transfers.lock().clone()
    }

    /// Enable commands sent so far.
    pub fn enable_attempts(&self) -> usize {
        let enable = ds3_enable_setup();
        self.control_transfers
            .lock()
            .iter()
            .filter(|transfer| transfer.setup == enable)
            .count()
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    pub fn cancel_count(&self) -> u32 {
        self.cancels.load(Ordering::SeqCst)
    }

    /// Complete the oldest pending request with `data`. Returns `false` if
    /// nothing was pending.
    pub fn complete_pending(&self, data: &[u8]) -> bool {
        let Some((mut request, continuation)) = self.pending.lock().pop_front() else {
            return false;
        };
        request.urb_mut().fill_from(data);
        let status = *self.input_status.lock();
        continuation(request, status);
        true
    }

    fn rejection(&self) -> Option<NtStatus> {
        *self.reject.lock()
    }
}

impl LowerTarget for MockLowerTarget {
    fn send_and_forget(&self, request: UrbRequest) -> Result<(), SendRejected> {
        if let Some(status) = self.rejection() {
            return Err(SendRejected { request, status });
        }
        self.forwarded.lock().push(request.urb().clone());
        request.complete(NtStatus::Success);
        Ok(())
    }

    fn send_with_continuation(
        &self,
        mut request: UrbRequest,
        continuation: Continuation,
    ) -> Result<(), SendRejected> {
        if let Some(status) = self.rejection() {
            return Err(SendRejected { request, status });
        }
        let queued = self.input_queue.lock().pop_front();
        match queued {
            Some(data) => {
                request.urb_mut().fill_from(&data);
                let status = *self.input_status.lock();
                continuation(request, status);
            }
            None => self.pending.lock().push_back((request, continuation)),
        }
        Ok(())
    }

    fn submit_control(
        &self,
        transfer: ControlTransfer,
        on_complete: ControlCompletion,
    ) -> Result<(), NtStatus> {
        let setup = transfer.setup;
        let is_enable = setup == ds3_enable_setup();
        self.control_transfers.lock().push(transfer);

        let status = if is_enable
            && self
                .enable_failures
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
                .is_ok()
        {
            NtStatus::Unsuccessful
        } else {
            *self.control_status.lock()
        };
        let data = if setup.is_device_to_host() && status.is_success() {
            self.feature_responses
                .lock()
                .get(&setup.w_value)
                .cloned()
                .unwrap_or_else(|| vec![0; usize::from(setup.w_length)])
        } else {
            Vec::new()
        };
        on_complete(status, &data);
        Ok(())
    }

    fn stop_and_cancel(&self) {
        self.cancels.fetch_add(1, Ordering::SeqCst);
        let drained: Vec<_> = self.pending.lock().drain(..).collect();
        for (request, continuation) in drained {
            continuation(request, NtStatus::Cancelled);
        }
    }
}

/// Timer that only fires when told to.
pub struct ManualTimer {
    name: &'static str,
    period: Duration,
    callback: TimerCallback,
    running: AtomicBool,
    starts: AtomicU32,
    stops: Mutex<Vec<bool>>,
}

impl ManualTimer {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Run the callback once if the timer is running.
    pub fn fire(&self) -> bool {
        if !self.running.load(Ordering::SeqCst) {
            return false;
        }
        (self.callback)();
        true
    }
}

impl PeriodicTimer for ManualTimer {
    fn start(&self) {
        if !self.running.swap(true, Ordering::SeqCst) {
            self.starts.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn stop(&self, drain: bool) {
        self.running.store(false, Ordering::SeqCst);
        self.stops.lock().push(drain);
    }

    fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }
}

/// Timer host whose timers are fired by name.
#[derive(Default)]
pub struct ManualTimerHost {
    timers: Mutex<Vec<Arc<ManualTimer>>>,
}

impl ManualTimerHost {
    pub fn new() -> Self {
        Self::default()
    }

    fn named(&self, name: &str) -> Vec<Arc<ManualTimer>> {
        self.timers
            .lock()
            .iter()
            .filter(|timer| timer.name == name)
            .cloned()
            .collect()
    }

    /// Fire every running timer called `name`. Returns how many fired.
    pub fn fire(&self, name: &str) -> usize {
        self.named(name)
            .iter()
            .filter(|timer| timer.fire())
            .count()
    }

    pub fn is_running(&self, name: &str) -> bool {
        self.named(name).iter().any(|timer| timer.is_running())
    }

    /// Number of stopped-to-running transitions of timers called `name`.
    pub fn starts(&self, name: &str) -> u32 {
        self.named(name)
            .iter()
            .map(|timer| timer.starts.load(Ordering::SeqCst))
            .sum()
    }

    /// Drain flag of every stop call on timers called `name`.
    pub fn stops(&self, name: &str) -> Vec<bool> {
        self.named(name)
            .iter()
            .flat_map(|timer| timer.stops.lock().clone())
            .collect()
    }

    pub fn timer_count(&self) -> usize {
        self.timers.lock().len()
    }
}

impl TimerHost for ManualTimerHost {
    fn create_timer(
        &self,
        name: &'static str,
        period: Duration,
        callback: TimerCallback,
    ) -> Arc<dyn PeriodicTimer> {
        let timer = Arc::new(ManualTimer {
            name,
            period,
            callback,
            running: AtomicBool::new(false),
            starts: AtomicU32::new(0),
            stops: Mutex::new(Vec::new()),
        });
        self.timers.lock().push(Arc::clone(&timer));
        timer
    }
}

/// Virtual bus recording everything it is asked to do.
#[derive(Default)]
pub struct MockVirtualPadBus {
    plugged: Mutex<Vec<u32>>,
    reports: Mutex<Vec<(u32, XusbReport)>>,
    unplugged: Mutex<Vec<u32>>,
    notifiers: Mutex<BTreeMap<u32, Arc<dyn Fn(XusbNotification) + Send + Sync>>>,
    fail_plug_in: AtomicBool,
}

impl MockVirtualPadBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_plug_in(&self, fail: bool) {
        self.fail_plug_in.store(fail, Ordering::SeqCst);
    }

    pub fn plugged(&self) -> Vec<u32> {
        self.plugged.lock().clone()
    }

    pub fn reports(&self) -> Vec<(u32, XusbReport)> {
        self.reports.lock().clone()
    }

    pub fn unplugged(&self) -> Vec<u32> {
        self.unplugged.lock().clone()
    }

    /// Deliver a rumble notification to pad `serial`. Returns `false` if no
    /// such pad was plugged in.
    pub fn notify(&self, serial: u32, notification: XusbNotification) -> bool {
        let notifier = self.notifiers.lock().get(&serial).cloned();
        match notifier {
            Some(notifier) => {
                notifier(notification);
                true
            }
            None => false,
        }
    }
}

impl VirtualPadBus for MockVirtualPadBus {
    fn plug_in(&self, serial: u32, on_notification: NotificationFn) -> FilterResult<()> {
        if self.fail_plug_in.load(Ordering::SeqCst) {
            return Err(FilterError::Lower(NtStatus::Unsuccessful));
        }
        self.plugged.lock().push(serial);
        self.notifiers.lock().insert(serial, Arc::from(on_notification));
        Ok(())
    }

    fn submit_report(&self, serial: u32, report: &XusbReport) -> FilterResult<()> {
        self.reports.lock().push((serial, *report));
        Ok(())
    }

    fn unplug(&self, serial: u32) -> FilterResult<()> {
        self.unplugged.lock().push(serial);
        self.notifiers.lock().remove(&serial);
        Ok(())
    }
}

/// Connector handing out a [`MockVirtualPadBus`], or nothing.
pub struct MockConnector {
    bus: Option<Arc<MockVirtualPadBus>>,
}

impl MockConnector {
    pub fn new(bus: Arc<MockVirtualPadBus>) -> Self {
        Self { bus: Some(bus) }
    }

    /// A connector for a system without the virtual bus.
    pub fn absent() -> Self {
        Self { bus: None }
    }
}

impl VirtualPadConnector for MockConnector {
    fn connect(&self) -> Option<Arc<dyn VirtualPadBus>> {
        self.bus
            .as_ref()
            .map(|bus| Arc::clone(bus) as Arc<dyn VirtualPadBus>)
    }
}

/// Control device host counting lifecycle calls.
#[derive(Default)]
pub struct MockControlDeviceHost {
    created: AtomicU32,
    deleted: AtomicU32,
}

impl MockControlDeviceHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn created(&self) -> u32 {
        self.created.load(Ordering::SeqCst)
    }

    pub fn deleted(&self) -> u32 {
        self.deleted.load(Ordering::SeqCst)
    }

    /// Whether the control device currently exists.
    pub fn exists(&self) -> bool {
        self.created() > self.deleted()
    }
}

impl ControlDeviceHost for MockControlDeviceHost {
    fn create_control_device(&self) -> FilterResult<()> {
        self.created.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn delete_control_device(&self) {
        self.deleted.fetch_add(1, Ordering::SeqCst);
    }
}
