//! Byte count helpers: human-readable formatting and size-limit parsing.

use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ByteSizeError {
    #[error("size `{0}` is empty")]
    Empty(String),
    #[error("size `{0}` is not a number")]
    InvalidNumber(String),
    #[error("size `{input}` has unknown unit `{unit}`")]
    UnknownUnit { input: String, unit: String },
    #[error("size `{0}` exceeds the supported range")]
    Overflow(String),
}

/// Parse a size limit such as `25MB`, `1.5 GiB`, `512k` or `1048576`.
///
/// Decimal-looking units are treated as binary multiples (`1MB` = 1 MiB),
/// matching how upload limits are conventionally written.
pub fn parse_byte_size(input: &str) -> Result<u64, ByteSizeError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ByteSizeError::Empty(input.to_string()));
    }

    let split = trimmed
        .find(|c: char| !(c.is_ascii_digit() || c == '.'))
        .unwrap_or(trimmed.len());
    let (number, unit) = trimmed.split_at(split);
    let value: f64 = number
        .parse()
        .map_err(|_| ByteSizeError::InvalidNumber(input.to_string()))?;

    let multiplier: u64 = match unit.trim().to_ascii_lowercase().as_str() {
        "" | "b" => 1,
        "k" | "kb" | "kib" => 1 << 10,
        "m" | "mb" | "mib" => 1 << 20,
        "g" | "gb" | "gib" => 1 << 30,
        "t" | "tb" | "tib" => 1 << 40,
        other => {
            return Err(ByteSizeError::UnknownUnit {
                input: input.to_string(),
                unit: other.to_string(),
            });
        }
    };

    let bytes = (value * multiplier as f64).round();
    if !bytes.is_finite() || bytes < 0.0 || bytes >= u64::MAX as f64 {
        return Err(ByteSizeError::Overflow(input.to_string()));
    }
    Ok(bytes as u64)
}

/// Format a byte count into IEC units (KiB, MiB, GiB, TiB) with trimmed precision.
pub fn format_bytes(bytes: u64) -> String {
    const UNITS: [&str; 5] = ["B", "KiB", "MiB", "GiB", "TiB"];

    let mut value = bytes as f64;
    let mut unit_index = 0;

    while value >= 1024.0 && unit_index < UNITS.len() - 1 {
        value /= 1024.0;
        unit_index += 1;
    }

    if unit_index == 0 {
        return format!("{bytes} {}", UNITS[unit_index]);
    }

    let mut value_str = if value >= 10.0 {
        format!("{value:.1}")
    } else {
        format!("{value:.2}")
    };

    if value_str.contains('.') {
        while value_str.ends_with('0') {
            value_str.pop();
        }
        if value_str.ends_with('.') {
            value_str.pop();
        }
    }

    format!("{value_str} {}", UNITS[unit_index])
}
