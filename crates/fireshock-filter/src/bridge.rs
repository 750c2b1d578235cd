//! Bridge between a session and a virtual Xbox 360 pad on a virtual bus.
//!
//! The bus is optional: when it is missing or goes away, the bridge turns
//! into a no-op and the rest of the filter keeps working.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use fireshock_hid_dualshock_protocol::{GamepadState, XusbNotification, XusbReport};
use parking_lot::Mutex;
use tracing::{debug, info, warn};

use crate::error::FilterResult;

/// Callback receiving rumble/LED notifications for one virtual pad.
pub type NotificationFn = Box<dyn Fn(XusbNotification) + Send + Sync>;

/// A connected virtual gamepad bus.
pub trait VirtualPadBus: Send + Sync {
    /// Plug in a virtual Xbox 360 pad with the given serial.
    fn plug_in(&self, serial: u32, on_notification: NotificationFn) -> FilterResult<()>;

    fn submit_report(&self, serial: u32, report: &XusbReport) -> FilterResult<()>;

    fn unplug(&self, serial: u32) -> FilterResult<()>;
}

/// Opens connections to the virtual bus.
pub trait VirtualPadConnector: Send + Sync {
    /// `None` when no bus is present.
    fn connect(&self) -> Option<Arc<dyn VirtualPadBus>>;
}

/// Per-session handle on a virtual pad.
pub struct VirtualPadBridge {
    pad_serial: u32,
    bus: Option<Arc<dyn VirtualPadBus>>,
    available: Mutex<bool>,
    unplugged: AtomicBool,
}

impl fmt::Debug for VirtualPadBridge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VirtualPadBridge")
            .field("pad_serial", &self.pad_serial)
            .field("has_bus", &self.bus.is_some())
            .field("available", &*self.available.lock())
            .finish_non_exhaustive()
    }
}

impl VirtualPadBridge {
    /// Acquire the bus and plug in a pad. Any failure leaves an inert bridge.
    pub fn connect(
        connector: &dyn VirtualPadConnector,
        pad_serial: u32,
        on_notification: NotificationFn,
    ) -> Self {
        let Some(bus) = connector.connect() else {
            info!(pad_serial, "Virtual pad bus not present, bridging disabled");
            return Self::unavailable(pad_serial);
        };

        match bus.plug_in(pad_serial, on_notification) {
            Ok(()) => {
                info!(pad_serial, "Virtual pad plugged in");
                Self {
                    pad_serial,
                    bus: Some(bus),
                    available: Mutex::new(true),
                    unplugged: AtomicBool::new(false),
                }
            }
            Err(e) => {
                warn!(pad_serial, error = %e, "Failed to plug in virtual pad");
                Self::unavailable(pad_serial)
            }
        }
    }

    /// A bridge that was never connected.
    pub fn unavailable(pad_serial: u32) -> Self {
        Self {
            pad_serial,
            bus: None,
            available: Mutex::new(false),
            unplugged: AtomicBool::new(false),
        }
    }

    pub fn pad_serial(&self) -> u32 {
        self.pad_serial
    }

    pub fn is_available(&self) -> bool {
        *self.available.lock()
    }

    /// The bus went away; later submissions become no-ops.
    pub fn mark_removed(&self) {
        let mut available = self.available.lock();
        if *available {
            warn!(pad_serial = self.pad_serial, "Virtual pad bus removed");
        }
        *available = false;
    }

    /// Translate and submit `state`. Best effort.
    pub fn submit_report(&self, state: &GamepadState) {
        let available = self.available.lock();
        if !*available {
            return;
        }
        let Some(bus) = &self.bus else {
            return;
        };
        let report = XusbReport::from_gamepad_state(state);
        if let Err(e) = bus.submit_report(self.pad_serial, &report) {
            debug!(pad_serial = self.pad_serial, error = %e, "Virtual pad report dropped");
        }
    }

    /// Unplug the pad. Runs at most once, and only for a pad that was
    /// plugged in.
    pub fn unplug(&self) {
        let Some(bus) = &self.bus else {
            return;
        };
        if self.unplugged.swap(true, Ordering::AcqRel) {
            return;
        }
        match bus.unplug(self.pad_serial) {
            Ok(()) => info!(pad_serial = self.pad_serial, "Virtual pad unplugged"),
            Err(e) => debug!(pad_serial = self.pad_serial, error = %e, "Virtual pad unplug failed"),
        }
        *self.available.lock() = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockConnector, MockVirtualPadBus};

    #[test]
    fn test_absent_bus_is_inert() {
        let connector = MockConnector::absent();
        let bridge = VirtualPadBridge::connect(&connector, 1, Box::new(|_| {}));
        assert!(!bridge.is_available());
        bridge.submit_report(&GamepadState::neutral());
        bridge.unplug();
    }

    #[test]
    fn test_submit_until_removed_and_unplug_once() {
        let bus = Arc::new(MockVirtualPadBus::new());
        let connector = MockConnector::new(Arc::clone(&bus));
        let bridge = VirtualPadBridge::connect(&connector, 3, Box::new(|_| {}));
        assert_eq!(bus.plugged(), vec![3]);

        bridge.submit_report(&GamepadState::neutral());
        bridge.mark_removed();
        bridge.submit_report(&GamepadState::neutral());
        assert_eq!(bus.reports().len(), 1);

        bridge.unplug();
        bridge.unplug();
        assert_eq!(bus.unplugged(), vec![3]);
    }

    #[test]
    fn test_failed_plug_in_never_unplugs() {
        let bus = Arc::new(MockVirtualPadBus::new());
        bus.fail_plug_in(true);
        let connector = MockConnector::new(Arc::clone(&bus));
        let bridge = VirtualPadBridge::connect(&connector, 1, Box::new(|_| {}));
        assert!(!bridge.is_available());
        bridge.unplug();
        assert!(bus.unplugged().is_empty());
    }
}
