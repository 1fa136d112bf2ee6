use std::sync::LazyLock;

use regex::Regex;

/// Operating systems outside this catalog's scope. The same pattern gates
/// both the staging write and the promotion pass, so the two filters can
/// never drift apart.
pub static OS_EXCLUDE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(chrome ?os|chromebook|ios|ipad ?os|windows 11)").unwrap());

static INTEL_GEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\bi[3-9]-(8|9|\d{2})\d{2,3}").unwrap());
static LOW_POWER_N_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\bn\d{3}\b").unwrap());
static RYZEN_SERIES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"ryzen\s*[3-9]?\s*([1-9])\d{3}").unwrap());

/// CPU families that (almost always) fail the Windows 11 requirements.
const UNSUPPORTED_FAMILIES: &[&str] = &[
    "celeron", "pentium", "atom", "athlon", "a4-", "a6-", "a8-", "a10-", "fx-",
];

/// Coarse CPU vendor tag. Apple and ARM parts stay unclassified; the catalog
/// only tracks Windows/Linux laptops.
pub fn cpu_arch(cpu_text: &str) -> Option<&'static str> {
    let t = cpu_text.to_lowercase();
    if t.contains("intel") {
        Some("Intel")
    } else if t.contains("ryzen") || t.contains("amd") {
        Some("AMD")
    } else {
        None
    }
}

/// Does this OS text disqualify the device from the catalog?
pub fn is_excluded_os(os_text: &str) -> bool {
    OS_EXCLUDE.is_match(os_text)
}

/// Windows-11 eligibility rules, evaluated in order; the first rule with an
/// opinion wins, and the release year is the terminal fallback. Conservative:
/// unknown low-power parts are pushed toward "unsupported".
const W11_RULES: &[fn(&str, Option<i64>) -> Option<bool>] = &[
    rule_unsupported_family,
    rule_intel_core_generation,
    rule_intel_modern,
    rule_ryzen_series,
];

pub fn guess_supports_w11(cpu_text: Option<&str>, release_year: Option<i64>) -> bool {
    let Some(cpu) = cpu_text else {
        // No CPU info at all: the year is the only signal left.
        return year_cutoff(release_year);
    };

    let t = cpu.to_lowercase();
    for rule in W11_RULES {
        if let Some(verdict) = rule(&t, release_year) {
            return verdict;
        }
    }
    year_cutoff(release_year)
}

fn year_cutoff(release_year: Option<i64>) -> bool {
    release_year.is_some_and(|y| y >= 2018)
}

fn rule_unsupported_family(cpu: &str, _year: Option<i64>) -> Option<bool> {
    UNSUPPORTED_FAMILIES
        .iter()
        .any(|f| cpu.contains(f))
        .then_some(false)
}

/// Intel Core i3..i9, 8th gen or newer (also U/H/G suffix variants).
fn rule_intel_core_generation(cpu: &str, _year: Option<i64>) -> Option<bool> {
    INTEL_GEN_RE.is_match(cpu).then_some(true)
}

/// Newer Intel naming without the i-prefix ("Core 7 155U", "Core Ultra").
/// N-series parts (N100 etc.) are officially unsupported despite being
/// recent silicon.
fn rule_intel_modern(cpu: &str, year: Option<i64>) -> Option<bool> {
    if !cpu.contains("intel")
        || !(cpu.contains("core") || cpu.contains("ultra") || cpu.contains("n100"))
    {
        return None;
    }
    if cpu.contains("n100") || LOW_POWER_N_RE.is_match(cpu) {
        return Some(false);
    }
    year_cutoff(year).then_some(true)
}

/// AMD Ryzen 2000-series or newer.
fn rule_ryzen_series(cpu: &str, year: Option<i64>) -> Option<bool> {
    if !cpu.contains("ryzen") {
        return None;
    }
    if let Some(caps) = RYZEN_SERIES_RE.captures(cpu) {
        let series: i64 = caps[1].parse().ok()?;
        if series >= 2 {
            return Some(true);
        }
    }
    year_cutoff(year).then_some(true)
}
