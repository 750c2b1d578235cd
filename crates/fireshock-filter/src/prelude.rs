//! Prelude for fireshock-filter.
//!
//! Re-exports the types needed to host the filter and drive it.

pub use crate::bridge::{NotificationFn, VirtualPadBridge, VirtualPadBus, VirtualPadConnector};
pub use crate::config::{FilterConfig, FilterConfigBuilder};
pub use crate::error::{FilterError, FilterResult, NtStatus};
pub use crate::filter::{FireShockFilter, SidebandReply};
pub use crate::interceptor::Disposition;
pub use crate::registry::{ControlDeviceHost, SessionRegistry};
pub use crate::session::{DeviceIds, DeviceSession, EnableState, FamilyContext, PairingAddresses};
pub use crate::target::{ControlTransfer, LowerTarget, SendRejected};
pub use crate::timer::{PeriodicTimer, ThreadTimerHost, TimerHost};
pub use crate::usb::{Completion, Direction, Urb, UrbRequest, UsbFunction};
pub use fireshock_hid_dualshock_protocol::{DeviceSettings, DeviceType, GamepadState};
