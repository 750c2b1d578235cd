//! Shared fixtures for the filter integration tests.

use std::sync::Arc;

use fireshock_filter::mock::{
    ManualTimerHost, MockConnector, MockControlDeviceHost, MockLowerTarget, MockVirtualPadBus,
};
use fireshock_filter::prelude::*;
use fireshock_filter::protocol::{
    DS3_INPUT_REPORT_LEN, SONY_VENDOR_ID, encode_ds3_input, product_ids,
};
use parking_lot::Mutex;

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

pub const DS3: DeviceIds = DeviceIds::new(SONY_VENDOR_ID, product_ids::DUALSHOCK3);
pub const DS4: DeviceIds = DeviceIds::new(SONY_VENDOR_ID, product_ids::DUALSHOCK4_V2);
pub const UNKNOWN: DeviceIds = DeviceIds::new(0x045E, 0x028E);

/// Filter wired to in-memory hosts.
pub struct Harness {
    pub filter: FireShockFilter,
    pub timers: Arc<ManualTimerHost>,
    pub bus: Arc<MockVirtualPadBus>,
    pub control: Arc<MockControlDeviceHost>,
}

impl Harness {
    pub fn new() -> Result<Self, FilterError> {
        Self::with_config(FilterConfig::default())
    }

    pub fn with_config(config: FilterConfig) -> Result<Self, FilterError> {
        let timers = Arc::new(ManualTimerHost::new());
        let bus = Arc::new(MockVirtualPadBus::new());
        let control = Arc::new(MockControlDeviceHost::new());
        let filter = FireShockFilter::new(
            config,
            control.clone(),
            timers.clone(),
            Arc::new(MockConnector::new(bus.clone())),
        )?;
        Ok(Self {
            filter,
            timers,
            bus,
            control,
        })
    }

    /// Attach a device backed by a fresh mock lower target.
    pub fn attach(&self, ids: DeviceIds) -> (Arc<DeviceSession>, Arc<MockLowerTarget>) {
        let lower = Arc::new(MockLowerTarget::new());
        let session = self.filter.attach(ids, lower.clone());
        (session, lower)
    }
}

/// Slot receiving the completion of a request.
pub type CompletionSlot = Arc<Mutex<Option<Completion>>>;

/// Wrap `urb` in a submit-URB request whose completion lands in the slot.
pub fn request(urb: Urb) -> (UrbRequest, CompletionSlot) {
    let slot: CompletionSlot = Arc::new(Mutex::new(None));
    let sink = Arc::clone(&slot);
    let request = UrbRequest::submit_urb(
        urb,
        Box::new(move |completion| {
            *sink.lock() = Some(completion);
        }),
    );
    (request, slot)
}

/// Raw DualShock 3 input report carrying `state`.
pub fn ds3_report(state: &GamepadState) -> Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut raw = vec![0u8; DS3_INPUT_REPORT_LEN];
    encode_ds3_input(state, &mut raw)?;
    Ok(raw)
}

/// Run one interrupt IN transfer carrying `raw` through the filter.
pub fn read_input(
    harness: &Harness,
    session: &Arc<DeviceSession>,
    lower: &MockLowerTarget,
    raw: Vec<u8>,
) -> Result<Completion, Box<dyn std::error::Error>> {
    let len = raw.len();
    lower.queue_input(raw);
    let (request, slot) = request(Urb::interrupt_in(0x81, len));
    let disposition = harness.filter.dispatch_internal_ioctl(session, request);
    if disposition != Disposition::Pending {
        return Err(format!("unexpected disposition {disposition:?}").into());
    }
    let completion = slot.lock().take();
    completion.ok_or_else(|| "input transfer did not complete".into())
}
