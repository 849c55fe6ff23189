//! Unit conversion and value formatting
//!
//! Pure functions only: the semantic [`DataKind`] of a reading decides its unit
//! suffix, throughput values are bucketed into k/M/G tiers by
//! [`minify_rate`], and numbers are rendered with at most two decimals and
//! thousands separators by [`format_number`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Text rendered in place of a number when a reading is unavailable.
pub const NO_VALUE: &str = "No Value";

/// Semantic unit of a labeled value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataKind {
    Clock,
    Voltage,
    Percent,
    Rpm,
    Celsius,
    Fahrenheit,
    Gigabyte,
}

impl DataKind {
    /// All kinds, in declaration order
    pub const ALL: [DataKind; 7] = [
        DataKind::Clock,
        DataKind::Voltage,
        DataKind::Percent,
        DataKind::Rpm,
        DataKind::Celsius,
        DataKind::Fahrenheit,
        DataKind::Gigabyte,
    ];

    /// Suffix appended after the formatted number
    pub fn suffix(&self) -> &'static str {
        match self {
            DataKind::Clock => " MHz",
            DataKind::Voltage => " V",
            DataKind::Percent => "%",
            DataKind::Rpm => " RPM",
            DataKind::Celsius => " C",
            DataKind::Fahrenheit => " F",
            DataKind::Gigabyte => " GB",
        }
    }

    /// Whether this kind carries a temperature
    pub fn is_temperature(&self) -> bool {
        matches!(self, DataKind::Celsius | DataKind::Fahrenheit)
    }
}

impl fmt::Display for DataKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataKind::Clock => write!(f, "Clock"),
            DataKind::Voltage => write!(f, "Voltage"),
            DataKind::Percent => write!(f, "Percent"),
            DataKind::Rpm => write!(f, "RPM"),
            DataKind::Celsius => write!(f, "Celsius"),
            DataKind::Fahrenheit => write!(f, "Fahrenheit"),
            DataKind::Gigabyte => write!(f, "Gigabyte"),
        }
    }
}

/// Scale a rate expressed in kilo-units per second into the k/M/G tier it
/// falls in. No rounding happens here.
///
/// `is_bytes` picks the byte family (`kB/s`, `MB/s`, `GB/s`) over the bit
/// family (`kbps`, `Mbps`, `Gbps`).
pub fn minify_rate(value: f64, is_bytes: bool) -> (f64, &'static str) {
    const KILO: f64 = 1024.0;
    const MEGA: f64 = 1024.0 * 1024.0;

    if value < KILO {
        (value, if is_bytes { "kB/s" } else { "kbps" })
    } else if value < MEGA {
        (value / KILO, if is_bytes { "MB/s" } else { "Mbps" })
    } else {
        (value / MEGA, if is_bytes { "GB/s" } else { "Gbps" })
    }
}

/// Convert a Celsius temperature to Fahrenheit
pub fn celsius_to_fahrenheit(celsius: f64) -> f64 {
    celsius * 1.8 + 32.0
}

/// Format a number as `#,##0.##`: thousands separators, at most two
/// decimals, trailing zeros dropped.
pub fn format_number(value: f64) -> String {
    if !value.is_finite() {
        return value.to_string();
    }

    let rounded = (value * 100.0).round() / 100.0;
    let negative = rounded < 0.0;
    let abs = rounded.abs();

    let mut whole = abs.trunc() as u64;
    let mut cents = ((abs - abs.trunc()) * 100.0).round() as u64;
    if cents >= 100 {
        whole += 1;
        cents -= 100;
    }

    let digits = whole.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3 + 4);
    if negative && (whole > 0 || cents > 0) {
        out.push('-');
    }
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }

    if cents > 0 {
        if cents % 10 == 0 {
            out.push_str(&format!(".{}", cents / 10));
        } else {
            out.push_str(&format!(".{:02}", cents));
        }
    }

    out
}

/// Render `"{label}: {value}{suffix}"`, or `"{label}: No Value"` when the
/// reading is unavailable.
pub fn format_labeled(label: &str, value: Option<f64>, suffix: &str) -> String {
    match value {
        Some(v) => format!("{}: {}{}", label, format_number(v), suffix),
        None => format!("{}: {}", label, NO_VALUE),
    }
}

/// Render a throughput reading (in kilo-units per second) as
/// `"{label}: {value} {unit}"` after minification.
pub fn format_rate(label: &str, value: Option<f64>, is_bytes: bool) -> String {
    match value {
        Some(v) => {
            let (scaled, unit) = minify_rate(v, is_bytes);
            format!("{}: {} {}", label, format_number(scaled), unit)
        }
        None => format!("{}: {}", label, NO_VALUE),
    }
}
