//! The lower device the filter sits on top of.
//!
//! Requests handed to a [`LowerTarget`] are owned by it until completed. A
//! target that refuses a request hands it back in [`SendRejected`] so the
//! caller can complete it.

use std::fmt;
use std::time::Duration;

use fireshock_hid_dualshock_protocol::ControlSetup;

use crate::error::NtStatus;
use crate::usb::UrbRequest;

/// Runs after the lower target finished a request, before the request
/// completes upward. It receives the lower status and must complete the
/// request itself.
pub type Continuation = Box<dyn FnOnce(UrbRequest, NtStatus) + Send>;

/// Completion callback of a filter-originated control transfer. Receives
/// the status and, for device-to-host transfers, the data stage.
pub type ControlCompletion = Box<dyn FnOnce(NtStatus, &[u8]) + Send>;

/// A request the lower target refused to accept.
pub struct SendRejected {
    pub request: UrbRequest,
    pub status: NtStatus,
}

impl fmt::Debug for SendRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SendRejected")
            .field("request", &self.request)
            .field("status", &self.status)
            .finish()
    }
}

impl SendRejected {
    /// Complete the returned request with the rejection status.
    pub fn complete(self) -> NtStatus {
        let status = self.status;
        self.request.complete(status);
        status
    }
}

/// Control transfer originated by the filter itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControlTransfer {
    pub setup: ControlSetup,
    pub buffer: Vec<u8>,
    pub timeout: Duration,
}

impl ControlTransfer {
    pub fn new(setup: ControlSetup, buffer: &[u8], timeout: Duration) -> Self {
        Self {
            setup,
            buffer: buffer.to_vec(),
            timeout,
        }
    }

    /// A device-to-host transfer with a zeroed `w_length` receive buffer.
    pub fn read(setup: ControlSetup, timeout: Duration) -> Self {
        Self {
            setup,
            buffer: vec![0; usize::from(setup.w_length)],
            timeout,
        }
    }
}

/// Lower I/O target of one device.
pub trait LowerTarget: Send + Sync {
    /// Pass a request down; its completion goes straight to the requester.
    fn send_and_forget(&self, request: UrbRequest) -> Result<(), SendRejected>;

    /// Pass a request down and run `continuation` when the lower target is
    /// done with it.
    fn send_with_continuation(
        &self,
        request: UrbRequest,
        continuation: Continuation,
    ) -> Result<(), SendRejected>;

    /// Issue a control transfer on the default pipe.
    ///
    /// `on_complete` runs exactly once if the transfer was accepted; it is
    /// dropped without running when this returns an error.
    fn submit_control(
        &self,
        transfer: ControlTransfer,
        on_complete: ControlCompletion,
    ) -> Result<(), NtStatus>;

    /// Stop the target and cancel everything in flight.
    fn stop_and_cancel(&self);
}
