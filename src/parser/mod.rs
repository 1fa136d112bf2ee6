pub mod classify;
pub mod normalize;
pub mod table;

use chrono::Utc;
use scraper::{Html, Selector};

use crate::db::DeviceRecord;
use normalize::{clean, first_float, first_int, parse_resolution, parse_storage_gb};
use table::{lookup, TableSource};

/// Assemble one typed record from a detail page: heading → brand/model,
/// spec-table lookups → raw text fields, normalizers + classifiers →
/// derived fields.
pub fn parse_detail(url: &str, html: &str) -> DeviceRecord {
    let doc = Html::parse_document(html);
    let h1 = Selector::parse("h1").unwrap();

    // Title: first whitespace token is the brand, the remainder the model.
    let (brand, model_name) = doc
        .select(&h1)
        .next()
        .map(|h| clean(&h.text().collect::<String>()))
        .and_then(|title| split_title(&title))
        .unzip();

    let rows = doc.spec_rows();

    // Dutch and English label variants, per the source site's locales.
    let cpu = lookup(&rows, &["Model", "CPU"]);
    let cpu_cores = lookup(&rows, &["Aantal kernen", "Cores"]).and_then(|t| first_int(&t));
    let ram_installed_gb = lookup(&rows, &["Capaciteit", "Memory"]).and_then(|t| first_int(&t));
    let ram_max_gb = lookup(&rows, &["Geheugenlimiet", "Max memory"]).and_then(|t| first_int(&t));
    let storage_text = lookup(&rows, &["Model/Capaciteit", "Storage"]);
    let screen_size_in = lookup(&rows, &["Maat", "Size"]).and_then(|t| first_float(&t));
    let resolution = lookup(&rows, &["Oplossing", "Resolution"]);
    let panel_type = lookup(&rows, &["Technologie", "Panel"]);
    let os = lookup(&rows, &["Systeem", "OS", "Operating system"]);
    let release_year = lookup(&rows, &["Jaren", "Launch", "Year"]).and_then(|t| first_int(&t));
    let weight_kg = lookup(&rows, &["Gewicht", "Weight"]).and_then(|t| first_float(&t));
    let battery_wh = lookup(&rows, &["Capaciteit:", "Battery"]).and_then(|t| first_float(&t));

    let storage_gb = storage_text.as_deref().and_then(parse_storage_gb);
    let (res_w, res_h) = resolution
        .as_deref()
        .map(parse_resolution)
        .unwrap_or((None, None));
    let cpu_arch = cpu.as_deref().and_then(classify::cpu_arch);
    let supports_w11 = classify::guess_supports_w11(cpu.as_deref(), release_year);

    DeviceRecord {
        source_url: url.to_string(),
        brand,
        model_name,
        cpu,
        cpu_cores,
        ram_installed_gb,
        ram_max_gb,
        storage_text,
        storage_gb,
        screen_size_in,
        resolution,
        res_w,
        res_h,
        panel_type,
        os,
        release_year,
        weight_kg,
        battery_wh,
        cpu_arch: cpu_arch.map(str::to_string),
        supports_w11,
        notes: None,
        scraped_at: Utc::now().format("%Y-%m-%d %H:%M:%S").to_string(),
    }
}

/// A heading without any space yields no brand/model; such records are never
/// persisted.
fn split_title(title: &str) -> Option<(String, String)> {
    let (brand, rest) = title.split_once(' ')?;
    Some((brand.to_string(), rest.trim().to_string()))
}
