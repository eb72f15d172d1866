//! Human-readable byte sizes

const KILOBYTE: u64 = 1 << 10;
const MEGABYTE: u64 = 1 << 20;
const GIGABYTE: u64 = 1 << 30;
const TERABYTE: u64 = 1 << 40;

/// Format a byte count as `10M`, `12.5K`, `512B`, ...
///
/// Picks the largest unit that keeps the value at or above one, prints one
/// decimal and drops a trailing `.0`.
pub fn format_size(bytes: u64) -> String {
    let (value, unit) = match bytes {
        0 => return "0".to_string(),
        b if b >= TERABYTE => (b as f64 / TERABYTE as f64, "T"),
        b if b >= GIGABYTE => (b as f64 / GIGABYTE as f64, "G"),
        b if b >= MEGABYTE => (b as f64 / MEGABYTE as f64, "M"),
        b if b >= KILOBYTE => (b as f64 / KILOBYTE as f64, "K"),
        b => (b as f64, "B"),
    };

    let rendered = format!("{:.1}", value);
    let rendered = rendered.strip_suffix(".0").unwrap_or(&rendered);
    format!("{}{}", rendered, unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(0), "0");
        assert_eq!(format_size(1), "1B");
        assert_eq!(format_size(512), "512B");
        assert_eq!(format_size(1024), "1K");
        assert_eq!(format_size(1536), "1.5K");
        assert_eq!(format_size(100 * MEGABYTE + MEGABYTE / 2), "100.5M");
        assert_eq!(format_size(GIGABYTE), "1G");
        assert_eq!(format_size(3 * TERABYTE), "3T");
    }
}
