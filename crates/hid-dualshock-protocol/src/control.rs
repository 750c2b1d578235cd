//! Control-endpoint requests: HID class requests and DualShock 3 feature reports.

use serde::{Deserialize, Serialize};

use crate::error::{DualShockError, DualShockResult};
use crate::output::{DS3_OUTPUT_REPORT_LEN, DS4_OUTPUT_REPORT_LEN};
use crate::types::{BD_ADDR_LEN, BdAddr};

/// HID class request codes (`bRequest`).
pub mod hid_requests {
    pub const GET_REPORT: u8 = 0x01;
    pub const GET_IDLE: u8 = 0x02;
    pub const GET_PROTOCOL: u8 = 0x03;
    pub const SET_REPORT: u8 = 0x09;
    pub const SET_IDLE: u8 = 0x0A;
    pub const SET_PROTOCOL: u8 = 0x0B;
}

/// Standard request codes used with HID descriptors.
pub mod standard_requests {
    pub const GET_DESCRIPTOR: u8 = 0x06;
    pub const SET_DESCRIPTOR: u8 = 0x07;
}

/// `bmRequestType` values.
pub mod request_types {
    /// Host-to-device, class, interface.
    pub const CLASS_INTERFACE_OUT: u8 = 0x21;
    /// Device-to-host, class, interface.
    pub const CLASS_INTERFACE_IN: u8 = 0xA1;
}

/// DualShock 3 feature report ids.
pub mod ds3_features {
    /// Read the controller's Bluetooth address.
    pub const DEVICE_ADDRESS: u8 = 0xF2;
    /// Start streaming interrupt reports.
    pub const START_DEVICE: u8 = 0xF4;
    /// Read or write the paired host's Bluetooth address.
    pub const HOST_ADDRESS: u8 = 0xF5;
}

/// Length of the device address feature report.
pub const DS3_DEVICE_ADDRESS_REPORT_LEN: usize = 18;
/// Length of the host address feature report.
pub const DS3_HOST_ADDRESS_REPORT_LEN: usize = 8;

const DEVICE_ADDRESS_OFFSET: usize = 4;
const HOST_ADDRESS_OFFSET: usize = 2;

/// Command sent with [`ds3_features::START_DEVICE`] to enable input reports.
pub const DS3_ENABLE_COMMAND: [u8; 4] = [0x42, 0x0C, 0x00, 0x00];

/// HID report type, the high byte of `wValue` in GET/SET_REPORT.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum HidReportType {
    Input = 1,
    Output = 2,
    Feature = 3,
}

/// `wValue` for a GET/SET_REPORT request.
pub const fn setup_value(report_type: HidReportType, report_id: u8) -> u16 {
    ((report_type as u16) << 8) | report_id as u16
}

/// USB control transfer setup packet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControlSetup {
    /// Direction, type and recipient.
    pub bm_request_type: u8,
    pub b_request: u8,
    pub w_value: u16,
    /// Interface number for class requests.
    pub w_index: u16,
    pub w_length: u16,
}

impl ControlSetup {
    /// Class SET_REPORT to `interface`.
    pub const fn set_report(
        report_type: HidReportType,
        report_id: u8,
        interface: u16,
        length: u16,
    ) -> Self {
        Self {
            bm_request_type: request_types::CLASS_INTERFACE_OUT,
            b_request: hid_requests::SET_REPORT,
            w_value: setup_value(report_type, report_id),
            w_index: interface,
            w_length: length,
        }
    }

    /// Class GET_REPORT from `interface`.
    pub const fn get_report(
        report_type: HidReportType,
        report_id: u8,
        interface: u16,
        length: u16,
    ) -> Self {
        Self {
            bm_request_type: request_types::CLASS_INTERFACE_IN,
            b_request: hid_requests::GET_REPORT,
            w_value: setup_value(report_type, report_id),
            w_index: interface,
            w_length: length,
        }
    }

    pub const fn is_set_report(&self) -> bool {
        self.b_request == hid_requests::SET_REPORT
    }

    /// Data stage flows from the device to the host.
    pub const fn is_device_to_host(&self) -> bool {
        self.bm_request_type & 0x80 != 0
    }

    /// Report type from the high byte of `wValue`.
    pub const fn report_type(&self) -> u8 {
        (self.w_value >> 8) as u8
    }

    pub const fn report_id(&self) -> u8 {
        (self.w_value & 0xFF) as u8
    }

    /// The eight setup bytes as sent on the wire.
    pub fn to_bytes(&self) -> [u8; 8] {
        let value = self.w_value.to_le_bytes();
        let index = self.w_index.to_le_bytes();
        let length = self.w_length.to_le_bytes();
        [
            self.bm_request_type,
            self.b_request,
            value[0],
            value[1],
            index[0],
            index[1],
            length[0],
            length[1],
        ]
    }
}

/// SET_REPORT carrying [`DS3_ENABLE_COMMAND`].
pub const fn ds3_enable_setup() -> ControlSetup {
    ControlSetup::set_report(
        HidReportType::Feature,
        ds3_features::START_DEVICE,
        0,
        DS3_ENABLE_COMMAND.len() as u16,
    )
}

/// SET_REPORT carrying the DualShock 3 output buffer (output report 1).
pub const fn ds3_output_setup() -> ControlSetup {
    ControlSetup::set_report(HidReportType::Output, 0x01, 0, DS3_OUTPUT_REPORT_LEN as u16)
}

/// SET_REPORT carrying the DualShock 4 output buffer (output report 5).
pub const fn ds4_output_setup() -> ControlSetup {
    ControlSetup::set_report(HidReportType::Output, 0x05, 0, DS4_OUTPUT_REPORT_LEN as u16)
}

/// GET_REPORT reading the DualShock 3 Bluetooth address.
pub const fn ds3_device_address_setup() -> ControlSetup {
    ControlSetup::get_report(
        HidReportType::Feature,
        ds3_features::DEVICE_ADDRESS,
        0,
        DS3_DEVICE_ADDRESS_REPORT_LEN as u16,
    )
}

/// GET_REPORT reading the host the DualShock 3 is paired with.
pub const fn ds3_host_address_read_setup() -> ControlSetup {
    ControlSetup::get_report(
        HidReportType::Feature,
        ds3_features::HOST_ADDRESS,
        0,
        DS3_HOST_ADDRESS_REPORT_LEN as u16,
    )
}

/// SET_REPORT pairing the DualShock 3 with a new host.
pub const fn ds3_host_address_setup() -> ControlSetup {
    ControlSetup::set_report(
        HidReportType::Feature,
        ds3_features::HOST_ADDRESS,
        0,
        DS3_HOST_ADDRESS_REPORT_LEN as u16,
    )
}

/// Payload of [`ds3_host_address_setup`]: two zero bytes, then the address.
pub fn ds3_host_address_report(host: &BdAddr) -> [u8; DS3_HOST_ADDRESS_REPORT_LEN] {
    let mut report = [0u8; DS3_HOST_ADDRESS_REPORT_LEN];
    report[HOST_ADDRESS_OFFSET..HOST_ADDRESS_OFFSET + BD_ADDR_LEN].copy_from_slice(host.as_bytes());
    report
}

fn address_at(report: &[u8], offset: usize) -> DualShockResult<BdAddr> {
    let end = offset + BD_ADDR_LEN;
    let Some(bytes) = report.get(offset..end) else {
        return Err(DualShockError::report_too_short(end, report.len()));
    };
    let mut address = [0u8; BD_ADDR_LEN];
    address.copy_from_slice(bytes);
    Ok(BdAddr(address))
}

/// Extract the controller address from a device address feature report.
pub fn parse_ds3_device_address(report: &[u8]) -> DualShockResult<BdAddr> {
    address_at(report, DEVICE_ADDRESS_OFFSET)
}

/// Extract the paired host address from a host address feature report.
pub fn parse_ds3_host_address(report: &[u8]) -> DualShockResult<BdAddr> {
    address_at(report, HOST_ADDRESS_OFFSET)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enable_setup_values() {
        let setup = ds3_enable_setup();
        assert_eq!(setup.w_value, 0x03F4);
        assert_eq!(setup.b_request, 0x09);
        assert_eq!(setup.w_length, 4);
        assert_eq!(setup.to_bytes(), [0x21, 0x09, 0xF4, 0x03, 0x00, 0x00, 0x04, 0x00]);
    }

    #[test]
    fn test_output_setup_values() {
        assert_eq!(ds3_output_setup().w_value, 0x0201);
        assert_eq!(ds3_output_setup().w_length, 48);
        assert_eq!(ds4_output_setup().w_value, 0x0205);
        assert!(ds4_output_setup().is_set_report());
    }

    #[test]
    fn test_feature_values() {
        assert_eq!(setup_value(HidReportType::Feature, ds3_features::DEVICE_ADDRESS), 0x03F2);
        assert_eq!(setup_value(HidReportType::Feature, ds3_features::HOST_ADDRESS), 0x03F5);
        let setup = ds3_device_address_setup();
        assert_eq!(setup.report_type(), 3);
        assert_eq!(setup.report_id(), 0xF2);
        assert_eq!(setup.bm_request_type, 0xA1);
    }

    #[test]
    fn test_host_address_report_layout() {
        let host = BdAddr([0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]);
        let setup = ds3_host_address_setup();
        assert_eq!(setup.w_value, 0x03F5);
        assert_eq!(setup.w_length, 8);
        assert!(setup.is_set_report());
        assert!(!setup.is_device_to_host());
        assert!(ds3_host_address_read_setup().is_device_to_host());
        assert_eq!(
            ds3_host_address_report(&host),
            [0x00, 0x00, 0x00, 0x1B, 0xDC, 0x0F, 0x22, 0x5E]
        );
        assert_eq!(parse_ds3_host_address(&ds3_host_address_report(&host)), Ok(host));
    }

    #[test]
    fn test_device_address_parse() {
        let mut report = [0u8; DS3_DEVICE_ADDRESS_REPORT_LEN];
        report[4..10].copy_from_slice(&[0x04, 0x76, 0x6E, 0xA1, 0xB2, 0xC3]);
        assert_eq!(
            parse_ds3_device_address(&report).map(|addr| addr.to_string()),
            Ok("04:76:6E:A1:B2:C3".to_string())
        );
        assert_eq!(
            parse_ds3_device_address(&report[..7]),
            Err(DualShockError::report_too_short(10, 7))
        );
    }
}
