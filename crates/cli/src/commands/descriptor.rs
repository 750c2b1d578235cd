//! Synthesized descriptor dump

use anyhow::Result;
use fireshock_hid_dualshock_protocol::{
    DeviceType, configuration_descriptor, hid_report_descriptor, synthesize_configuration,
    synthesize_report_descriptor,
};
use serde::Serialize;

use crate::commands::DescriptorKind;
use crate::error::CliError;
use crate::output;

#[derive(Debug, Serialize)]
struct DescriptorOutput {
    kind: &'static str,
    requested: usize,
    total: usize,
    written: usize,
    bytes: String,
}

/// Synthesize a descriptor into a buffer of `len` bytes, as a host would
/// request it.
pub fn synthesize(kind: DescriptorKind, len: Option<usize>) -> Result<Vec<u8>, CliError> {
    let device = DeviceType::DualShock3;
    let total = match kind {
        DescriptorKind::Config => configuration_descriptor(device)?.len(),
        DescriptorKind::Report => hid_report_descriptor(device)?.len(),
    };
    let mut buffer = vec![0u8; len.unwrap_or(total)];
    let written = match kind {
        DescriptorKind::Config => synthesize_configuration(device, &mut buffer)?,
        DescriptorKind::Report => synthesize_report_descriptor(device, &mut buffer)?,
    };
    buffer.truncate(written);
    Ok(buffer)
}

pub fn execute(kind: DescriptorKind, len: Option<usize>, json: bool) -> Result<()> {
    let total = synthesize(kind, None)?.len();
    let bytes = synthesize(kind, len)?;
    let name = match kind {
        DescriptorKind::Config => "configuration",
        DescriptorKind::Report => "hid-report",
    };

    if json {
        return output::print_json(&DescriptorOutput {
            kind: name,
            requested: len.unwrap_or(total),
            total,
            written: bytes.len(),
            bytes: output::hex_string(&bytes),
        });
    }

    output::print_heading(&format!("DualShock 3 {name} descriptor"));
    output::print_field("Total length", total);
    output::print_field("Written", bytes.len());
    println!("{}", output::hex_dump(&bytes));
    Ok(())
}
