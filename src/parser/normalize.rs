use std::sync::LazyLock;

use regex::Regex;

static INT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+)").unwrap());
static FLOAT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(\d+(?:[.,]\d+)?)").unwrap());
static STORAGE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+(?:[.,]\d+)?)\s*(T|TB|G|GB)\b").unwrap());
static RESOLUTION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{3,5})x(\d{3,5})").unwrap());

/// Collapse runs of whitespace to a single space and trim.
pub fn clean(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// First integer literal in the text, thousands separators stripped.
pub fn first_int(text: &str) -> Option<i64> {
    let stripped = text.replace(',', "");
    INT_RE
        .captures(&stripped)
        .and_then(|c| c[1].parse::<i64>().ok())
}

/// First decimal literal, accepting `,` or `.` as fractional separator.
pub fn first_float(text: &str) -> Option<f64> {
    FLOAT_RE
        .captures(text)
        .and_then(|c| c[1].replace(',', ".").parse::<f64>().ok())
}

/// Largest storage size in the text, converted to GB.
///
/// Scans for every `<number><unit>` token (G/GB/T/TB, optional space) and
/// takes the maximum, so "1TB + 128GB" resolves to 1024. Without any
/// unit-qualified token the first bare integer is read as GB.
pub fn parse_storage_gb(text: &str) -> Option<i64> {
    let mut sizes = Vec::new();
    for caps in STORAGE_RE.captures_iter(text) {
        let val: f64 = match caps[1].replace(',', ".").parse() {
            Ok(v) => v,
            Err(_) => continue,
        };
        let gb = if caps[2].to_uppercase().starts_with('T') {
            (val * 1024.0).round() as i64
        } else {
            val.round() as i64
        };
        sizes.push(gb);
    }
    sizes.into_iter().max().or_else(|| first_int(text))
}

/// Parse "W x H" (also with `×`) into a (width, height) pair.
pub fn parse_resolution(text: &str) -> (Option<i64>, Option<i64>) {
    let t: String = text.to_lowercase().replace('×', "x");
    let t: String = t.split_whitespace().collect();
    match RESOLUTION_RE.captures(&t) {
        Some(caps) => (caps[1].parse().ok(), caps[2].parse().ok()),
        None => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clean_collapses_whitespace() {
        assert_eq!(clean("  Dell   Latitude\t5420 "), "Dell Latitude 5420");
    }

    #[test]
    fn first_int_basic() {
        assert_eq!(first_int("8 cores"), Some(8));
        assert_eq!(first_int("up to 1,024 MB"), Some(1024));
        assert_eq!(first_int("no digits"), None);
    }

    #[test]
    fn first_float_separators() {
        assert_eq!(first_float("1.35 kg"), Some(1.35));
        assert_eq!(first_float("1,35 kg"), Some(1.35));
        assert_eq!(first_float("14"), Some(14.0));
        assert_eq!(first_float("light"), None);
    }

    #[test]
    fn storage_takes_max_across_devices() {
        assert_eq!(parse_storage_gb("1TB + 128GB"), Some(1024));
        assert_eq!(parse_storage_gb("SSD NVMe 256GB"), Some(256));
        assert_eq!(parse_storage_gb("512 GB SSD"), Some(512));
    }

    #[test]
    fn storage_fractional_tb() {
        assert_eq!(parse_storage_gb("0,5 TB"), Some(512));
    }

    #[test]
    fn storage_bare_number_fallback() {
        assert_eq!(parse_storage_gb("256 SSD"), Some(256));
        assert_eq!(parse_storage_gb("bare text, no digits"), None);
    }

    #[test]
    fn resolution_variants() {
        assert_eq!(parse_resolution("1920x1080"), (Some(1920), Some(1080)));
        assert_eq!(parse_resolution("2160 × 1440"), (Some(2160), Some(1440)));
        assert_eq!(parse_resolution("garbage"), (None, None));
    }
}
