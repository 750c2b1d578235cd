//! Synthesized USB configuration and HID report descriptors.
//!
//! The DualShock 3 exposes a HID interface whose report descriptor does not
//! match the reports it actually sends. These replacements describe the
//! report produced by [`crate::input::synthesize_input_report`].

use crate::error::{DualShockError, DualShockResult};
use crate::ids::DeviceType;

/// Length of a standard USB configuration descriptor header.
pub const CONFIGURATION_HEADER_LEN: usize = 9;

/// USB descriptor type codes.
pub mod descriptor_types {
    pub const DEVICE: u8 = 0x01;
    pub const CONFIGURATION: u8 = 0x02;
    pub const STRING: u8 = 0x03;
    pub const INTERFACE: u8 = 0x04;
    pub const ENDPOINT: u8 = 0x05;
    pub const HID: u8 = 0x21;
    pub const HID_REPORT: u8 = 0x22;
    pub const HID_PHYSICAL: u8 = 0x23;
}

pub const DS3_CONFIGURATION_DESCRIPTOR_LEN: usize = 41;
pub const DS3_HID_REPORT_DESCRIPTOR_LEN: usize = 176;

/// DualShock 3 configuration: one HID interface, interrupt OUT 0x02 and IN 0x81.
#[rustfmt::skip]
pub const DS3_CONFIGURATION_DESCRIPTOR: [u8; DS3_CONFIGURATION_DESCRIPTOR_LEN] = [
    // Configuration
    0x09, 0x02, 0x29, 0x00, 0x01, 0x01, 0x00, 0x80, 0xFA,
    // Interface 0, HID class
    0x09, 0x04, 0x00, 0x00, 0x02, 0x03, 0x00, 0x00, 0x00,
    // HID 1.11, one report descriptor of 176 bytes
    0x09, 0x21, 0x11, 0x01, 0x00, 0x01, 0x22, 0xB0, 0x00,
    // Endpoint 0x02 OUT, interrupt, 64 bytes, 1 ms
    0x07, 0x05, 0x02, 0x03, 0x40, 0x00, 0x01,
    // Endpoint 0x81 IN, interrupt, 64 bytes, 1 ms
    0x07, 0x05, 0x81, 0x03, 0x40, 0x00, 0x01,
];

/// DualShock 3 HID report descriptor for the synthesized input report.
#[rustfmt::skip]
pub const DS3_HID_REPORT_DESCRIPTOR: [u8; DS3_HID_REPORT_DESCRIPTOR_LEN] = [
    0x05, 0x01,        // Usage Page (Generic Desktop)
    0x09, 0x05,        // Usage (Game Pad)
    0xA1, 0x02,        // Collection (Logical)
    0xA1, 0x01,        //   Collection (Application)
    0x85, 0x01,        //     Report ID (1)
    0x09, 0x30,        //     Usage (X)
    0x09, 0x31,        //     Usage (Y)
    0x09, 0x32,        //     Usage (Z)
    0x09, 0x35,        //     Usage (Rz)
    0x15, 0x00,        //     Logical Minimum (0)
    0x26, 0xFF, 0x00,  //     Logical Maximum (255)
    0x75, 0x08,        //     Report Size (8)
    0x95, 0x04,        //     Report Count (4)
    0x81, 0x02,        //     Input (Data,Var,Abs)
    0x09, 0x39,        //     Usage (Hat switch)
    0x15, 0x00,        //     Logical Minimum (0)
    0x25, 0x07,        //     Logical Maximum (7)
    0x35, 0x00,        //     Physical Minimum (0)
    0x46, 0x3B, 0x01,  //     Physical Maximum (315)
    0x65, 0x14,        //     Unit (Degrees)
    0x75, 0x04,        //     Report Size (4)
    0x95, 0x01,        //     Report Count (1)
    0x81, 0x42,        //     Input (Data,Var,Abs,Null State)
    0x65, 0x00,        //     Unit (None)
    0x05, 0x09,        //     Usage Page (Button)
    0x19, 0x01,        //     Usage Minimum (1)
    0x29, 0x0E,        //     Usage Maximum (14)
    0x15, 0x00,        //     Logical Minimum (0)
    0x25, 0x01,        //     Logical Maximum (1)
    0x75, 0x01,        //     Report Size (1)
    0x95, 0x0E,        //     Report Count (14)
    0x81, 0x02,        //     Input (Data,Var,Abs)
    0x06, 0x00, 0xFF,  //     Usage Page (Vendor 0xFF00)
    0x09, 0x20,        //     Usage (0x20)
    0x75, 0x06,        //     Report Size (6)
    0x95, 0x01,        //     Report Count (1)
    0x15, 0x00,        //     Logical Minimum (0)
    0x25, 0x7F,        //     Logical Maximum (127)
    0x81, 0x02,        //     Input (Data,Var,Abs)
    0x05, 0x01,        //     Usage Page (Generic Desktop)
    0x09, 0x33,        //     Usage (Rx)
    0x09, 0x34,        //     Usage (Ry)
    0x15, 0x00,        //     Logical Minimum (0)
    0x26, 0xFF, 0x00,  //     Logical Maximum (255)
    0x75, 0x08,        //     Report Size (8)
    0x95, 0x02,        //     Report Count (2)
    0x81, 0x02,        //     Input (Data,Var,Abs)
    0x75, 0x08,        //     Report Size (8)
    0x95, 0x30,        //     Report Count (48)
    0x09, 0x01,        //     Usage (Pointer)
    0x91, 0x02,        //     Output (Data,Var,Abs)
    0x75, 0x08,        //     Report Size (8)
    0x95, 0x30,        //     Report Count (48)
    0x09, 0x01,        //     Usage (Pointer)
    0xB1, 0x02,        //     Feature (Data,Var,Abs)
    0xC0,              //   End Collection
    0xA1, 0x01,        //   Collection (Application)
    0x85, 0x01,        //     Report ID (1)
    0x06, 0x00, 0xFF,  //     Usage Page (Vendor 0xFF00)
    0x09, 0x01,        //     Usage (0x01)
    0x09, 0x02,        //     Usage (0x02)
    0x09, 0x03,        //     Usage (0x03)
    0x09, 0x04,        //     Usage (0x04)
    0x09, 0x05,        //     Usage (0x05)
    0x09, 0x06,        //     Usage (0x06)
    0x09, 0x07,        //     Usage (0x07)
    0x09, 0x08,        //     Usage (0x08)
    0x09, 0x09,        //     Usage (0x09)
    0x09, 0x0A,        //     Usage (0x0A)
    0x75, 0x08,        //     Report Size (8)
    0x95, 0x0A,        //     Report Count (10)
    0x15, 0x00,        //     Logical Minimum (0)
    0x26, 0xFF, 0x00,  //     Logical Maximum (255)
    0x81, 0x02,        //     Input (Data,Var,Abs)
    0xA1, 0x01,        //     Collection (Application)
    0x85, 0x01,        //       Report ID (1)
    0x06, 0x01, 0xFF,  //       Usage Page (Vendor 0xFF01)
    0x09, 0x01,        //       Usage (0x01)
    0x75, 0x08,        //       Report Size (8)
    0x95, 0x1D,        //       Report Count (29)
    0x15, 0x00,        //       Logical Minimum (0)
    0x26, 0xFF, 0x00,  //       Logical Maximum (255)
    0x81, 0x02,        //       Input (Data,Var,Abs)
    0xC0,              //     End Collection
    0xC0,              //   End Collection
    0xC0,              // End Collection
];

/// Canonical configuration descriptor for a device family.
pub fn configuration_descriptor(device_type: DeviceType) -> DualShockResult<&'static [u8]> {
    match device_type {
        DeviceType::DualShock3 => Ok(&DS3_CONFIGURATION_DESCRIPTOR),
        DeviceType::DualShock4 | DeviceType::Unknown => {
            Err(DualShockError::NotImplemented(device_type))
        }
    }
}

/// Canonical HID report descriptor for a device family.
pub fn hid_report_descriptor(device_type: DeviceType) -> DualShockResult<&'static [u8]> {
    match device_type {
        DeviceType::DualShock3 => Ok(&DS3_HID_REPORT_DESCRIPTOR),
        DeviceType::DualShock4 | DeviceType::Unknown => {
            Err(DualShockError::NotImplemented(device_type))
        }
    }
}

/// Write the configuration descriptor into `out` following the two-phase
/// retrieval protocol.
///
/// A buffer of exactly [`CONFIGURATION_HEADER_LEN`] bytes receives only the
/// header; a larger buffer receives the full descriptor, truncated to the
/// buffer length. Returns the number of bytes written.
pub fn synthesize_configuration(
    device_type: DeviceType,
    out: &mut [u8],
) -> DualShockResult<usize> {
    let descriptor = configuration_descriptor(device_type)?;
    if out.len() < CONFIGURATION_HEADER_LEN {
        return Err(DualShockError::buffer_too_small(
            CONFIGURATION_HEADER_LEN,
            out.len(),
        ));
    }
    Ok(copy_truncated(descriptor, out))
}

/// Write the HID report descriptor into `out`, truncated to its length.
pub fn synthesize_report_descriptor(
    device_type: DeviceType,
    out: &mut [u8],
) -> DualShockResult<usize> {
    let descriptor = hid_report_descriptor(device_type)?;
    if out.is_empty() {
        return Err(DualShockError::buffer_too_small(1, 0));
    }
    Ok(copy_truncated(descriptor, out))
}

fn copy_truncated(src: &[u8], out: &mut [u8]) -> usize {
    let len = src.len().min(out.len());
    out[..len].copy_from_slice(&src[..len]);
    len
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_total_length_matches_array() {
        let total = u16::from_le_bytes([
            DS3_CONFIGURATION_DESCRIPTOR[2],
            DS3_CONFIGURATION_DESCRIPTOR[3],
        ]);
        assert_eq!(total as usize, DS3_CONFIGURATION_DESCRIPTOR_LEN);
    }

    #[test]
    fn test_hid_descriptor_announces_report_length() {
        // HID class descriptor starts at offset 18; wDescriptorLength at 7..9.
        let announced = u16::from_le_bytes([
            DS3_CONFIGURATION_DESCRIPTOR[25],
            DS3_CONFIGURATION_DESCRIPTOR[26],
        ]);
        assert_eq!(announced as usize, DS3_HID_REPORT_DESCRIPTOR_LEN);
        assert_eq!(DS3_CONFIGURATION_DESCRIPTOR[19], descriptor_types::HID);
    }

    #[test]
    fn test_report_descriptor_collections_balanced() {
        let opens = DS3_HID_REPORT_DESCRIPTOR
            .windows(2)
            .filter(|w| w[0] == 0xA1)
            .count();
        let closes = DS3_HID_REPORT_DESCRIPTOR
            .iter()
            .rev()
            .take_while(|b| **b == 0xC0)
            .count();
        assert_eq!(opens, 4);
        assert_eq!(closes, 3);
    }

    #[test]
    fn test_header_phase_returns_header_only() {
        let mut out = [0u8; CONFIGURATION_HEADER_LEN];
        let written = synthesize_configuration(DeviceType::DualShock3, &mut out);
        assert_eq!(written, Ok(CONFIGURATION_HEADER_LEN));
        assert_eq!(&out[..], &DS3_CONFIGURATION_DESCRIPTOR[..CONFIGURATION_HEADER_LEN]);
    }

    #[test]
    fn test_unknown_device_not_implemented() {
        let mut out = [0u8; 64];
        assert_eq!(
            synthesize_configuration(DeviceType::Unknown, &mut out),
            Err(DualShockError::NotImplemented(DeviceType::Unknown))
        );
        assert_eq!(
            synthesize_report_descriptor(DeviceType::DualShock4, &mut out),
            Err(DualShockError::NotImplemented(DeviceType::DualShock4))
        );
    }

    #[test]
    fn test_short_buffer_rejected() {
        let mut out = [0u8; 4];
        assert!(matches!(
            synthesize_configuration(DeviceType::DualShock3, &mut out),
            Err(DualShockError::BufferTooSmall { .. })
        ));
    }
}
