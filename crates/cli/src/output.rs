//! Output formatting for CLI responses

use anyhow::Error;
use colored::Colorize;
use serde::Serialize;
use serde_json::json;

/// Print error in JSON format
pub fn print_error_json(error: &Error) {
    let error_json = json!({
        "success": false,
        "error": {
            "message": error.to_string(),
        }
    });
    match serde_json::to_string_pretty(&error_json) {
        Ok(s) => println!("{s}"),
        Err(e) => eprintln!("Failed to format error as JSON: {e}"),
    }
}

/// Print error in human-readable format
pub fn print_error_human(error: &Error) {
    eprintln!("{} {}", "Error:".red().bold(), error);

    let mut source = error.source();
    while let Some(err) = source {
        eprintln!("  {} {}", "Caused by:".yellow(), err);
        source = err.source();
    }
}

/// Print `value` wrapped in a success envelope.
pub fn print_json<T: Serialize>(value: &T) -> anyhow::Result<()> {
    let output = json!({
        "success": true,
        "data": value,
    });
    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}

/// Print a section heading.
pub fn print_heading(title: &str) {
    println!("{}", title.bold());
}

/// Print a labelled value.
pub fn print_field(label: &str, value: impl std::fmt::Display) {
    println!("  {:<22} {}", format!("{label}:").dimmed(), value);
}

/// Space-separated uppercase hex.
pub fn hex_string(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|byte| format!("{byte:02X}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Classic offset-prefixed hex dump, 16 bytes per line.
pub fn hex_dump(bytes: &[u8]) -> String {
    bytes
        .chunks(16)
        .enumerate()
        .map(|(line, chunk)| format!("{:04X}  {}", line * 16, hex_string(chunk)))
        .collect::<Vec<_>>()
        .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_string() {
        assert_eq!(hex_string(&[0x09, 0x02, 0xAB]), "09 02 AB");
        assert_eq!(hex_string(&[]), "");
    }

    #[test]
    fn test_hex_dump_lines() {
        let bytes: Vec<u8> = (0u8..20).collect();
        let dump = hex_dump(&bytes);
        let lines: Vec<&str> = dump.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines.get(1).copied(), Some("0010  10 11 12 13"));
    }
}
