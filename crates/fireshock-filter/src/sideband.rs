//! Sideband control surface used by user-mode tools.
//!
//! Requests arrive through the control device as an IOCTL code plus a
//! buffer holding one wire structure. Replies are the same structure,
//! filled in.

use std::sync::Arc;

use fireshock_hid_dualshock_protocol::{
    AddressRequest, DeviceType, DeviceTypeRequest, GamepadReportRequest, SettingsRequest,
    SidebandCode,
};
use tracing::{debug, info};

use crate::error::{FilterError, FilterResult};
use crate::registry::SessionRegistry;
use crate::session::{DeviceSession, Ds3Session};

/// The DualShock 3 context of `session`.
fn ds3_of(session: &DeviceSession) -> FilterResult<&Arc<Ds3Session>> {
    if session.device_type() != DeviceType::DualShock3 {
        return Err(FilterError::invalid_parameter(format!(
            "device {} is not a DualShock 3",
            session.serial()
        )));
    }
    session
        .ds3()
        .ok_or(FilterError::DeviceNotReady(session.serial()))
}

/// Handles sideband IOCTLs against the session registry.
pub struct SidebandControl {
    registry: Arc<SessionRegistry>,
}

impl SidebandControl {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self { registry }
    }

    /// Service one request under the registry lock. Setting the host address
    /// releases the lock before waiting on the device.
    ///
    /// # Errors
    ///
    /// - [`FilterError::NoSuchDevice`] when no session is registered.
    /// - [`FilterError::UnsupportedRequest`] for unknown codes and report
    ///   submission.
    /// - [`FilterError::Protocol`] when the declared or transport size does
    ///   not match the structure.
    /// - [`FilterError::UnknownSerial`] for serials with no session.
    /// - [`FilterError::InvalidParameter`] for report and address requests
    ///   against a device that is not a DualShock 3.
    /// - [`FilterError::DeviceNotReady`] when the session has no family
    ///   context yet.
    /// - [`FilterError::Lower`] when the host address transfer fails.
    pub fn handle(&self, ioctl: u32, buffer: &[u8]) -> FilterResult<Vec<u8>> {
        let mut registry = self.registry.lock();
        if registry.is_empty() {
            return Err(FilterError::NoSuchDevice);
        }

        let code = SidebandCode::from_ioctl(ioctl).ok_or(FilterError::UnsupportedRequest(ioctl))?;
        debug!(?code, len = buffer.len(), "Sideband request");

        match code {
            SidebandCode::RequestReport => {
                let request = GamepadReportRequest::parse(buffer)?;
                let ds3 = ds3_of(registry.session(request.serial_no)?)?;
                Ok(GamepadReportRequest {
                    serial_no: request.serial_no,
                    state: ds3.cached_state(),
                }
                .to_bytes())
            }
            SidebandCode::SubmitReport => Err(FilterError::UnsupportedRequest(ioctl)),
            SidebandCode::RequestSettings => {
                let request = SettingsRequest::parse(buffer)?;
                let settings = registry.settings(request.serial_no)?;
                Ok(SettingsRequest {
                    serial_no: request.serial_no,
                    settings,
                }
                .to_bytes())
            }
            SidebandCode::SubmitSettings => {
                let request = SettingsRequest::parse(buffer)?;
                registry.set_settings(request.serial_no, request.settings)?;
                info!(
                    serial = request.serial_no,
                    settings = ?request.settings,
                    "Settings updated"
                );
                Ok(request.to_bytes())
            }
            SidebandCode::GetHostAddress | SidebandCode::GetDeviceAddress => {
                let request = AddressRequest::parse(buffer)?;
                let pairing = ds3_of(registry.session(request.serial_no)?)?.pairing();
                let address = if code == SidebandCode::GetHostAddress {
                    pairing.host
                } else {
                    pairing.device
                };
                Ok(AddressRequest {
                    serial_no: request.serial_no,
                    address,
                }
                .to_bytes())
            }
            SidebandCode::SetHostAddress => {
                let request = AddressRequest::parse(buffer)?;
                let ds3 = Arc::clone(ds3_of(registry.session(request.serial_no)?)?);
                drop(registry);
                ds3.set_host_address(request.address)?;
                Ok(request.to_bytes())
            }
            SidebandCode::GetDeviceType => {
                let request = DeviceTypeRequest::parse(buffer)?;
                let session = registry.session(request.serial_no)?;
                Ok(DeviceTypeRequest {
                    serial_no: request.serial_no,
                    device_type: session.device_type(),
                }
                .to_bytes())
            }
        }
    }
}
