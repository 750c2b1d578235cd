//! DualShock 3 / DualShock 4 USB HID protocol.
//!
//! Descriptor synthesis, input report decoding and re-encoding, output
//! buffers, XUSB translation and the sideband wire structures. The crate is
//! I/O-free and allocation-free on the report paths so every transformation
//! can be tested without hardware.

#![deny(static_mut_refs)]

pub mod control;
pub mod descriptors;
pub mod error;
pub mod ids;
pub mod input;
pub mod output;
pub mod types;
pub mod wire;
pub mod xusb;

pub use control::{
    ControlSetup, DS3_DEVICE_ADDRESS_REPORT_LEN, DS3_ENABLE_COMMAND, DS3_HOST_ADDRESS_REPORT_LEN,
    HidReportType, ds3_device_address_setup, ds3_enable_setup, ds3_features,
    ds3_host_address_read_setup, ds3_host_address_report, ds3_host_address_setup,
    ds3_output_setup, ds4_output_setup, hid_requests, parse_ds3_device_address,
    parse_ds3_host_address, setup_value,
};
pub use descriptors::{
    CONFIGURATION_HEADER_LEN, DS3_CONFIGURATION_DESCRIPTOR, DS3_HID_REPORT_DESCRIPTOR,
    configuration_descriptor, descriptor_types, hid_report_descriptor, synthesize_configuration,
    synthesize_report_descriptor,
};
pub use error::{DualShockError, DualShockResult};
pub use ids::{DeviceType, SONY_VENDOR_ID, classify, product_ids};
pub use input::{
    DS3_INPUT_MIN_LEN, DS3_INPUT_REPORT_LEN, DS4_INPUT_MIN_LEN, DS4_INPUT_REPORT_LEN,
    SYNTHESIZED_REPORT_MIN_LEN, encode_ds3_input, parse_ds3_input, parse_ds4_input, parse_input,
    parse_synthesized_report, report_ids, synthesize_input_report,
};
pub use output::{
    DS3_OUTPUT_REPORT_LEN, DS3_UPSTREAM_OUTPUT_MIN_LEN, DS4_OUTPUT_REPORT_LEN, Ds3OutputReport,
    Ds4OutputReport,
};
pub use types::{
    BD_ADDR_LEN, BdAddr, DeviceSettings, GAMEPAD_STATE_WIRE_LEN, GamepadState, HAT_RELEASED,
    HatDirection, PressureState, buttons,
};
pub use wire::{
    AddressRequest, DeviceTypeRequest, GamepadReportRequest, IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR,
    IOCTL_FIRESHOCK_GET_DEVICE_TYPE, IOCTL_FIRESHOCK_GET_HOST_BD_ADDR,
    IOCTL_FIRESHOCK_REQUEST_REPORT, IOCTL_FIRESHOCK_REQUEST_SETTINGS,
    IOCTL_FIRESHOCK_SET_HOST_BD_ADDR, IOCTL_FIRESHOCK_SUBMIT_REPORT,
    IOCTL_FIRESHOCK_SUBMIT_SETTINGS, SettingsRequest, SidebandCode, SidebandHeader,
};
pub use xusb::{XusbNotification, XusbReport, scale_axis, xusb_buttons};
