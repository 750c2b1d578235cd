//! # fireshock-filter
//!
//! USB filter logic for DualShock 3 and DualShock 4 controllers.
//!
//! The filter sits between a HID class driver and the USB device. It
//! synthesizes descriptors so a DualShock 3 enumerates as a standard HID
//! gamepad, rewrites input reports on their way up, keeps the device's
//! rumble/LED state pushed on a timer, mirrors input onto a virtual Xbox 360
//! pad and exposes a small sideband surface for user-mode tools.
//!
//! Host integration happens through traits: [`target::LowerTarget`] for the
//! device below, [`timer::TimerHost`] for periodic work,
//! [`bridge::VirtualPadConnector`] for the virtual bus and
//! [`registry::ControlDeviceHost`] for the sideband device. The [`mock`]
//! module implements all of them in memory.
//!
//! ## Modules
//!
//! - [`filter`] - Facade: attach, dispatch, detach
//! - [`interceptor`] - Per-request classification and rewriting
//! - [`session`] - Per-device state and timers
//! - [`registry`] - Attached sessions and settings
//! - [`bridge`] - Virtual pad bridging
//! - [`sideband`] - Sideband IOCTL handling
//!
//! ## Example
//!
//! ```rust
//! use std::sync::Arc;
//! use fireshock_filter::mock::{
//!     ManualTimerHost, MockConnector, MockControlDeviceHost, MockLowerTarget,
//! };
//! use fireshock_filter::prelude::*;
//! use fireshock_filter::protocol::{SONY_VENDOR_ID, product_ids};
//!
//! let filter = FireShockFilter::new(
//!     FilterConfig::default(),
//!     Arc::new(MockControlDeviceHost::new()),
//!     Arc::new(ManualTimerHost::new()),
//!     Arc::new(MockConnector::absent()),
//! )?;
//! let session = filter.attach(
//!     DeviceIds::new(SONY_VENDOR_ID, product_ids::DUALSHOCK3),
//!     Arc::new(MockLowerTarget::new()),
//! );
//! assert_eq!(session.device_type(), DeviceType::DualShock3);
//! filter.detach(session.serial())?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

#![deny(unsafe_op_in_unsafe_fn)]
#![deny(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

pub mod bridge;
pub mod config;
pub mod error;
pub mod filter;
pub mod interceptor;
pub mod mock;
pub mod prelude;
pub mod registry;
pub mod session;
pub mod sideband;
pub mod target;
pub mod timer;
pub mod usb;

pub use fireshock_hid_dualshock_protocol as protocol;

pub use config::{FilterConfig, FilterConfigBuilder};
pub use error::{FilterError, FilterResult, NtStatus};
pub use filter::{FireShockFilter, SidebandReply};
pub use interceptor::Disposition;
pub use session::{DeviceIds, DeviceSession, PairingAddresses};
