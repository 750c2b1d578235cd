//! Classification and handling of internal device control requests.
//!
//! Each request is either forwarded untouched, answered by the filter, or
//! forwarded with a continuation that rewrites the result on its way up.

use std::sync::Arc;

use fireshock_hid_dualshock_protocol::{
    DeviceType, descriptor_types, synthesize_configuration, synthesize_report_descriptor,
};
use tracing::{debug, warn};

use crate::error::NtStatus;
use crate::registry::SessionRegistry;
use crate::session::DeviceSession;
use crate::target::{Continuation, SendRejected};
use crate::usb::{IOCTL_INTERNAL_USB_SUBMIT_URB, UrbRequest, UsbFunction};

/// What happened to a dispatched request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Passed to the lower target without a continuation.
    Forwarded,
    /// Passed to the lower target; the filter completes it later.
    Pending,
    /// Completed before returning.
    Completed(NtStatus),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DescriptorKind {
    Configuration,
    HidReport,
}

/// Routes upper requests for every session.
pub struct TransferInterceptor {
    registry: Arc<SessionRegistry>,
}

impl TransferInterceptor {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Handle one internal device control request for `session`.
    pub fn dispatch(&self, session: &Arc<DeviceSession>, request: UrbRequest) -> Disposition {
        if request.ioctl() != IOCTL_INTERNAL_USB_SUBMIT_URB
            || !session.device_type().is_known()
            || session.family().is_none()
        {
            return forward(session, request);
        }

        let urb = request.urb();
        let (function, is_in, descriptor_type) = (urb.function, urb.is_in(), urb.descriptor_type);
        debug!(
            serial = session.serial(),
            ?function,
            direction = ?urb.direction,
            "Intercepted URB"
        );

        match function {
            UsbFunction::BulkOrInterruptTransfer if is_in => self.handle_input(session, request),
            UsbFunction::BulkOrInterruptTransfer => self.handle_output(session, request),
            UsbFunction::GetDescriptorFromDevice
                if descriptor_type == descriptor_types::CONFIGURATION =>
            {
                answer_descriptor(session, request, DescriptorKind::Configuration)
            }
            UsbFunction::GetDescriptorFromInterface => {
                answer_descriptor(session, request, DescriptorKind::HidReport)
            }
            UsbFunction::AbortPipe => {
                session.shutdown();
                forward(session, request)
            }
            _ => forward(session, request),
        }
    }

    fn handle_input(&self, session: &Arc<DeviceSession>, request: UrbRequest) -> Disposition {
        session.on_input_requested();

        let registry = Arc::clone(&self.registry);
        let target = Arc::clone(session);
        let continuation: Continuation = Box::new(move |mut request, status| {
            if !status.is_success() {
                debug!(serial = target.serial(), %status, "Input transfer failed");
                request.complete(status);
                return;
            }

            let settings = registry.settings(target.serial()).unwrap_or_default();
            match target.handle_input(&settings, request.urb_mut()) {
                Some(Ok(state)) => {
                    if settings.forwards_virtual_input()
                        && let Some(bridge) = target.bridge()
                    {
                        bridge.submit_report(&state);
                    }
                }
                Some(Err(e)) => {
                    debug!(serial = target.serial(), error = %e, "Input report passed through");
                }
                None => {}
            }
            request.complete(NtStatus::Success);
        });

        match session.lower().send_with_continuation(request, continuation) {
            Ok(()) => Disposition::Pending,
            Err(rejected) => complete_rejected(session, rejected),
        }
    }

    fn handle_output(&self, session: &Arc<DeviceSession>, request: UrbRequest) -> Disposition {
        let Some(ds3) = session.ds3() else {
            return forward(session, request);
        };

        let settings = self.registry.settings(session.serial()).unwrap_or_default();
        if !settings.fs_hid_output_enabled {
            debug!(serial = session.serial(), "HID output disabled, write dropped");
            request.complete(NtStatus::Success);
            return Disposition::Completed(NtStatus::Success);
        }

        match ds3.apply_upstream_output(request.urb().data()) {
            Ok(()) => {
                request.complete(NtStatus::Success);
                Disposition::Completed(NtStatus::Success)
            }
            Err(e) => {
                debug!(serial = session.serial(), error = %e, "Output write not encoded, forwarding");
                forward(session, request)
            }
        }
    }
}

fn answer_descriptor(
    session: &Arc<DeviceSession>,
    mut request: UrbRequest,
    kind: DescriptorKind,
) -> Disposition {
    let device_type = session.device_type();
    if device_type != DeviceType::DualShock3 {
        return forward(session, request);
    }

    let urb = request.urb_mut();
    let written = match kind {
        DescriptorKind::Configuration => synthesize_configuration(device_type, urb.buffer_mut()),
        DescriptorKind::HidReport => synthesize_report_descriptor(device_type, urb.buffer_mut()),
    };
    match written {
        Ok(length) => {
            urb.set_transfer_length(length);
            debug!(serial = session.serial(), ?kind, length, "Descriptor synthesized");
            request.complete(NtStatus::Success);
            Disposition::Completed(NtStatus::Success)
        }
        Err(e) => {
            debug!(serial = session.serial(), ?kind, error = %e, "Descriptor synthesis failed, forwarding");
            forward(session, request)
        }
    }
}

fn forward(session: &DeviceSession, request: UrbRequest) -> Disposition {
    match session.lower().send_and_forget(request) {
        Ok(()) => Disposition::Forwarded,
        Err(rejected) => complete_rejected(session, rejected),
    }
}

fn complete_rejected(session: &DeviceSession, rejected: SendRejected) -> Disposition {
    let status = rejected.complete();
    warn!(serial = session.serial(), %status, "Lower target rejected request");
    Disposition::Completed(status)
}
