//! IOCTL code table

use anyhow::Result;
use fireshock_filter::usb::{
    IOCTL_INTERNAL_USB_GET_PORT_STATUS, IOCTL_INTERNAL_USB_RESET_PORT,
    IOCTL_INTERNAL_USB_SUBMIT_URB,
};
use fireshock_hid_dualshock_protocol::SidebandCode;
use serde::Serialize;

use crate::output;

#[derive(Debug, Clone, Serialize)]
pub struct IoctlEntry {
    pub name: &'static str,
    pub code: String,
    /// Canonical structure size for sideband codes.
    pub structure_len: Option<usize>,
    pub handled: bool,
}

fn sideband_name(code: SidebandCode) -> &'static str {
    match code {
        SidebandCode::RequestReport => "IOCTL_FIRESHOCK_REQUEST_REPORT",
        SidebandCode::SubmitReport => "IOCTL_FIRESHOCK_SUBMIT_REPORT",
        SidebandCode::RequestSettings => "IOCTL_FIRESHOCK_REQUEST_SETTINGS",
        SidebandCode::SubmitSettings => "IOCTL_FIRESHOCK_SUBMIT_SETTINGS",
        SidebandCode::GetHostAddress => "IOCTL_FIRESHOCK_GET_HOST_BD_ADDR",
        SidebandCode::GetDeviceAddress => "IOCTL_FIRESHOCK_GET_DEVICE_BD_ADDR",
        SidebandCode::SetHostAddress => "IOCTL_FIRESHOCK_SET_HOST_BD_ADDR",
        SidebandCode::GetDeviceType => "IOCTL_FIRESHOCK_GET_DEVICE_TYPE",
    }
}

pub fn table() -> Vec<IoctlEntry> {
    let sideband = SidebandCode::ALL.into_iter().map(|code| IoctlEntry {
        name: sideband_name(code),
        code: format!("{:#010X}", code.ioctl()),
        structure_len: Some(code.structure_len()),
        handled: code != SidebandCode::SubmitReport,
    });
    let internal = [
        ("IOCTL_INTERNAL_USB_SUBMIT_URB", IOCTL_INTERNAL_USB_SUBMIT_URB, true),
        ("IOCTL_INTERNAL_USB_RESET_PORT", IOCTL_INTERNAL_USB_RESET_PORT, false),
        (
            "IOCTL_INTERNAL_USB_GET_PORT_STATUS",
            IOCTL_INTERNAL_USB_GET_PORT_STATUS,
            false,
        ),
    ]
    .into_iter()
    .map(|(name, code, handled)| IoctlEntry {
        name,
        code: format!("{code:#010X}"),
        structure_len: None,
        handled,
    });
    sideband.chain(internal).collect()
}

pub fn execute(json: bool) -> Result<()> {
    let entries = table();
    if json {
        return output::print_json(&entries);
    }

    output::print_heading("Control codes");
    for entry in &entries {
        let size = entry
            .structure_len
            .map(|len| format!("{len} bytes"))
            .unwrap_or_else(|| "-".to_string());
        let handling = if entry.handled { "handled" } else { "forwarded" };
        println!("  {:<36} {}  {:>9}  {}", entry.name, entry.code, size, handling);
    }
    Ok(())
}
