//! Human readable rendering of values for check summaries.

/// Two decimals, the default for [`check_levels`](crate::check_levels).
pub fn number(value: f64) -> String {
    format!("{value:.2}")
}

/// A percentage, e.g. `"85.30%"`.
pub fn percent(value: f64) -> String {
    format!("{value:.2}%")
}

const IEC_UNITS: &[&str] = &["KiB", "MiB", "GiB", "TiB", "PiB", "EiB"];

/// A byte count in IEC units, e.g. `"1.50 GiB"`.
pub fn bytes(value: f64) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut scaled = value.abs();
    if scaled < 1024.0 {
        return format!("{sign}{scaled:.0} B");
    }
    let mut unit = IEC_UNITS[0];
    for candidate in IEC_UNITS {
        scaled /= 1024.0;
        unit = candidate;
        if scaled < 1024.0 {
            break;
        }
    }
    format!("{sign}{scaled:.2} {unit}")
}

fn scale_si(value: f64, units: &[&str]) -> String {
    let sign = if value < 0.0 { "-" } else { "" };
    let mut scaled = value.abs();
    let mut unit = units[0];
    for candidate in &units[1..] {
        if scaled < 1000.0 {
            break;
        }
        scaled /= 1000.0;
        unit = candidate;
    }
    format!("{sign}{scaled:.2} {unit}")
}

/// Octets per second rendered as bits per second, e.g. `"1.00 MBit/s"`.
pub fn networkbandwidth(octets_per_sec: f64) -> String {
    scale_si(
        octets_per_sec * 8.0,
        &["Bit/s", "kBit/s", "MBit/s", "GBit/s", "TBit/s"],
    )
}

/// A frequency, e.g. `"2.40 GHz"`.
pub fn frequency(hertz: f64) -> String {
    scale_si(hertz, &["Hz", "kHz", "MHz", "GHz", "THz"])
}

const SPANS: &[(&str, f64)] = &[
    ("day", 86_400.0),
    ("hour", 3_600.0),
    ("minute", 60.0),
    ("second", 1.0),
];

fn plural(count: u64, unit: &str) -> String {
    if count == 1 {
        format!("{count} {unit}")
    } else {
        format!("{count} {unit}s")
    }
}

/// A time span in seconds, e.g. `"2 days 3 hours"` or `"250 milliseconds"`.
///
/// Spans of a minute or more show the two most significant units.
pub fn timespan(seconds: f64) -> String {
    if seconds < 0.0 {
        return format!("-{}", timespan(-seconds));
    }
    if seconds == 0.0 {
        return "0 seconds".to_string();
    }
    if seconds < 1e-6 {
        return format!("{:.0} nanoseconds", seconds * 1e9);
    }
    if seconds < 1e-3 {
        return format!("{:.0} microseconds", seconds * 1e6);
    }
    if seconds < 1.0 {
        return format!("{:.0} milliseconds", seconds * 1e3);
    }
    if seconds < 60.0 {
        return format!("{seconds:.2} seconds");
    }

    let mut remaining = seconds.round() as u64;
    let mut parts = Vec::with_capacity(2);
    for (unit, size) in SPANS {
        let size = *size as u64;
        let count = remaining / size;
        remaining %= size;
        if count > 0 || !parts.is_empty() {
            parts.push(plural(count, unit));
        }
        if parts.len() == 2 {
            break;
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_number_and_percent() {
        assert_eq!(number(70.0), "70.00");
        assert_eq!(number(1.0 / 3.0), "0.33");
        assert_eq!(percent(85.3), "85.30%");
    }

    #[test]
    fn test_bytes() {
        assert_eq!(bytes(0.0), "0 B");
        assert_eq!(bytes(1023.0), "1023 B");
        assert_eq!(bytes(1024.0), "1.00 KiB");
        assert_eq!(bytes(1.5 * 1024.0 * 1024.0 * 1024.0), "1.50 GiB");
        assert_eq!(bytes(-2048.0), "-2.00 KiB");
    }

    #[test]
    fn test_networkbandwidth() {
        assert_eq!(networkbandwidth(0.0), "0.00 Bit/s");
        assert_eq!(networkbandwidth(125_000.0), "1.00 MBit/s");
        assert_eq!(networkbandwidth(125_000_000.0), "1.00 GBit/s");
    }

    #[test]
    fn test_frequency() {
        assert_eq!(frequency(2_400_000_000.0), "2.40 GHz");
        assert_eq!(frequency(50.0), "50.00 Hz");
    }

    #[test]
    fn test_timespan() {
        assert_eq!(timespan(0.0), "0 seconds");
        assert_eq!(timespan(0.25), "250 milliseconds");
        assert_eq!(timespan(0.000_016_958), "17 microseconds");
        assert_eq!(timespan(12.5), "12.50 seconds");
        assert_eq!(timespan(65.0), "1 minute 5 seconds");
        assert_eq!(timespan(3_600.0), "1 hour 0 minutes");
        assert_eq!(timespan(2.0 * 86_400.0 + 3.0 * 3_600.0 + 59.0), "2 days 3 hours");
        assert_eq!(timespan(-65.0), "-1 minute 5 seconds");
    }
}
