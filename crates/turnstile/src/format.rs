//! Human-readable durations and byte sizes for log lines.

use std::time::Duration;

/// Time units, smallest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Unit {
    Nanos,
    Micros,
    Millis,
    Secs,
    Mins,
    Hours,
    Days,
    Years,
}

/// Each unit with its suffix and how many of it make the next unit.
/// Years have no next unit.
const UNITS: [(Unit, &str, u128); 8] = [
    (Unit::Nanos, "ns", 1000),
    (Unit::Micros, "µs", 1000),
    (Unit::Millis, "ms", 1000),
    (Unit::Secs, "s", 60),
    (Unit::Mins, "m", 60),
    (Unit::Hours, "h", 24),
    (Unit::Days, "d", 365),
    (Unit::Years, "y", 0),
];

/// Formats a duration like `1h2m3s`, truncated to whole units.
///
/// Units below `min` are dropped, unless the whole duration is shorter
/// than one `min` (then the largest non-zero small unit is shown instead
/// of an empty string). Zero components are omitted.
///
/// ```rust
/// use std::time::Duration;
/// use turnstile::format::{Unit, format_duration};
///
/// assert_eq!(format_duration(Duration::from_micros(36_395), Unit::Millis), "36ms");
/// assert_eq!(format_duration(Duration::from_secs(90), Unit::Millis), "1m30s");
/// ```
pub fn format_duration(duration: Duration, min: Unit) -> String {
    let mut rest = duration.as_nanos();
    if rest == 0 {
        return "0ns".to_string();
    }

    let mut parts = Vec::new();
    for (unit, suffix, per_next) in UNITS {
        if per_next == 0 {
            parts.push(format!("{rest}{suffix}"));
            break;
        }
        if unit >= min || rest < per_next {
            let count = rest % per_next;
            if count > 0 {
                parts.push(format!("{count}{suffix}"));
            }
        }
        rest /= per_next;
        if rest == 0 {
            break;
        }
    }

    parts.reverse();
    parts.concat()
}

const KIB: f64 = 1024.0;
const SIZES: [(&str, f64); 6] = [
    ("EiB", KIB * KIB * KIB * KIB * KIB * KIB),
    ("PiB", KIB * KIB * KIB * KIB * KIB),
    ("TiB", KIB * KIB * KIB * KIB),
    ("GiB", KIB * KIB * KIB),
    ("MiB", KIB * KIB),
    ("KiB", KIB),
];

/// Formats a byte count with binary units: `512 B`, `1.5 KiB`, `3.0 GiB`.
pub fn bytes_to_size(bytes: u64) -> String {
    let value = bytes as f64;
    for (suffix, size) in SIZES {
        if value >= size {
            return format!("{:.1} {suffix}", value / size);
        }
    }
    format!("{bytes} B")
}
