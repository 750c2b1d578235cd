//! Filter facade tying sessions, interception, timers and the sideband
//! surface together.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::bridge::{NotificationFn, VirtualPadBridge, VirtualPadConnector};
use crate::config::FilterConfig;
use crate::error::{FilterError, FilterResult, NtStatus};
use crate::interceptor::{Disposition, TransferInterceptor};
use crate::registry::{ControlDeviceHost, SessionRegistry};
use crate::session::{DeviceIds, DeviceSession};
use crate::sideband::SidebandControl;
use crate::target::LowerTarget;
use crate::timer::TimerHost;
use crate::usb::UrbRequest;

/// Completion of a sideband request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SidebandReply {
    pub status: NtStatus,
    /// Output buffer contents; its length is the bytes-written count.
    pub output: Vec<u8>,
}

impl SidebandReply {
    pub fn information(&self) -> usize {
        self.output.len()
    }
}

/// The filter instance shared by every attached device.
pub struct FireShockFilter {
    config: FilterConfig,
    registry: Arc<SessionRegistry>,
    timers: Arc<dyn TimerHost>,
    connector: Arc<dyn VirtualPadConnector>,
    interceptor: TransferInterceptor,
    sideband: SidebandControl,
}

impl FireShockFilter {
    /// Create a filter.
    ///
    /// # Errors
    ///
    /// Returns an error if `config` does not validate.
    pub fn new(
        config: FilterConfig,
        control: Arc<dyn ControlDeviceHost>,
        timers: Arc<dyn TimerHost>,
        connector: Arc<dyn VirtualPadConnector>,
    ) -> FilterResult<Self> {
        config.validate()?;
        let registry = Arc::new(SessionRegistry::new(control));
        Ok(Self {
            config,
            interceptor: TransferInterceptor::new(Arc::clone(&registry)),
            sideband: SidebandControl::new(Arc::clone(&registry)),
            registry,
            timers,
            connector,
        })
    }

    pub fn config(&self) -> &FilterConfig {
        &self.config
    }

    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Attach a device: register it, build its family context and plug in
    /// its virtual pad.
    pub fn attach(&self, ids: DeviceIds, lower: Arc<dyn LowerTarget>) -> Arc<DeviceSession> {
        let session = self.registry.register(self.config.default_settings, |serial| {
            DeviceSession::new(serial, ids, lower)
        });
        session.init_family(self.timers.as_ref(), &self.config);
        info!(
            serial = session.serial(),
            device_type = ?session.device_type(),
            vendor_id = ids.vendor_id,
            product_id = ids.product_id,
            "Device attached"
        );

        if session.device_type().is_known() {
            let pad_serial = session
                .serial()
                .wrapping_add(self.config.virtual_pad_serial_offset);
            let bridge = VirtualPadBridge::connect(
                self.connector.as_ref(),
                pad_serial,
                self.notification_handler(&session),
            );
            session.set_bridge(bridge);
        }
        session
    }

    /// Routes rumble from the virtual pad into the session's output buffer.
    fn notification_handler(&self, session: &Arc<DeviceSession>) -> NotificationFn {
        let registry = Arc::downgrade(&self.registry);
        let session = Arc::downgrade(session);
        Box::new(move |notification| {
            let (Some(registry), Some(session)) = (registry.upgrade(), session.upgrade()) else {
                return;
            };
            let accepts = registry
                .settings(session.serial())
                .is_ok_and(|settings| settings.accepts_virtual_output());
            if accepts {
                session.apply_virtual_output(&notification);
            } else {
                debug!(serial = session.serial(), "Virtual pad output ignored");
            }
        })
    }

    /// Handle an internal device control request for `session`.
    pub fn dispatch_internal_ioctl(
        &self,
        session: &Arc<DeviceSession>,
        request: UrbRequest,
    ) -> Disposition {
        self.interceptor.dispatch(session, request)
    }

    /// Handle a request arriving at the sideband control device.
    pub fn dispatch_sideband(&self, ioctl: u32, buffer: &[u8]) -> SidebandReply {
        match self.sideband.handle(ioctl, buffer) {
            Ok(output) => SidebandReply {
                status: NtStatus::Success,
                output,
            },
            Err(e) => {
                debug!(ioctl, error = %e, "Sideband request failed");
                SidebandReply {
                    status: e.status(),
                    output: Vec::new(),
                }
            }
        }
    }

    /// Tear a device down: timers, in-flight I/O, virtual pad, registration.
    ///
    /// # Errors
    ///
    /// Returns [`FilterError::UnknownSerial`] if no session has `serial`.
    pub fn detach(&self, serial: u32) -> FilterResult<()> {
        let session = self
            .registry
            .get(serial)
            .ok_or(FilterError::UnknownSerial(serial))?;

        session.shutdown();
        session.lower().stop_and_cancel();
        if let Some(bridge) = session.bridge() {
            bridge.unplug();
        }
        self.registry.unregister(serial);
        info!(serial, "Device detached");
        Ok(())
    }

    /// The virtual bus went away; every bridge stops submitting.
    pub fn on_virtual_bus_removed(&self) {
        for session in self.registry.sessions() {
            if let Some(bridge) = session.bridge() {
                bridge.mark_removed();
            }
        }
    }
}
