//! Command implementations for fireshockctl

pub mod decode;
pub mod descriptor;
pub mod ioctl;
pub mod simulate;

use clap::ValueEnum;
use fireshock_hid_dualshock_protocol::DeviceType;

/// Which synthesized descriptor to print.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DescriptorKind {
    /// USB configuration descriptor
    Config,
    /// HID report descriptor
    Report,
}

/// Controller family of a raw report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DeviceArg {
    Ds3,
    Ds4,
}

impl From<DeviceArg> for DeviceType {
    fn from(device: DeviceArg) -> Self {
        match device {
            DeviceArg::Ds3 => DeviceType::DualShock3,
            DeviceArg::Ds4 => DeviceType::DualShock4,
        }
    }
}
