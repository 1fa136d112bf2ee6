//! Offline feed: scrape pre-2021 laptop model names from Wikipedia brand
//! pages into a CSV seed file for the catalog importer. Independent of the
//! staging/promotion pipeline; shares only the HTTP client conventions.

use std::collections::HashSet;
use std::sync::LazyLock;
use std::time::Duration;

use anyhow::{Context, Result};
use regex::Regex;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use tracing::{info, warn};

use crate::parser::normalize::clean;

const UA: &str = "UpgradeKeuzeBot/1.0 (+contact: admin@upgradekeuze.nl)";
const PAUSE: Duration = Duration::from_millis(1200);

/// Years 1960..2029; the pre-2021 cut happens later.
static YEAR_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(19[6-9]\d|20[0-2]\d)\b").unwrap());
static REGEX_SPECIALS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"([.^$+(){}\[\]|\\])").unwrap());
static SPLIT_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[\s\-]+").unwrap());

const MODEL_COLS: &[&str] = &["Model", "Name", "Model name", "Series"];
const YEAR_COLS: &[&str] = &["Released", "Release date", "Launch", "Introduced"];
const NOTES_COLS: &[&str] = &["Notes", "Remarks", "Comments", "Description"];

const SOURCES: &[(&str, &str)] = &[
    ("Lenovo", "https://en.wikipedia.org/wiki/List_of_IBM_and_Lenovo_ThinkPad_laptops"),
    ("HP", "https://en.wikipedia.org/wiki/HP_EliteBook"),
    ("HP", "https://en.wikipedia.org/wiki/HP_ProBook"),
    ("Dell", "https://en.wikipedia.org/wiki/Dell_Latitude"),
    ("Acer", "https://en.wikipedia.org/wiki/Acer_Aspire"),
    ("ASUS", "https://en.wikipedia.org/wiki/Asus_VivoBook"),
];

#[derive(Debug, Clone)]
pub struct FeedRow {
    pub brand: String,
    pub display_model: String,
    pub year: Option<i64>,
    pub notes: String,
}

/// Scrape all brand sources, filter to pre-2021 models, dedupe, and write
/// the CSV seed file. Per-source failures are logged and skipped.
pub async fn run(out_path: &str) -> Result<()> {
    let client = Client::builder().user_agent(UA).build()?;

    let mut rows = Vec::new();
    for (brand, url) in SOURCES {
        match scrape_brand_page(&client, brand, url).await {
            Ok(mut part) => {
                info!("{}: {} model rows from {}", brand, part.len(), url);
                rows.append(&mut part);
            }
            Err(e) => warn!("{} source failed, skipping {}: {}", brand, url, e),
        }
        tokio::time::sleep(PAUSE).await;
    }

    info!("total raw rows: {}", rows.len());
    let rows = dedupe(filter_pre2021(rows));
    info!("after pre-2021 filter + dedupe: {}", rows.len());

    write_csv(out_path, &rows)?;
    println!("Wrote {} models to {}", rows.len(), out_path);
    Ok(())
}

async fn scrape_brand_page(client: &Client, brand: &str, url: &str) -> Result<Vec<FeedRow>> {
    let html = client
        .get(url)
        .timeout(Duration::from_secs(20))
        .send()
        .await?
        .error_for_status()?
        .text()
        .await
        .with_context(|| format!("fetching {url}"))?;
    Ok(parse_wikitables(brand, &html))
}

/// Pull model rows out of every `wikitable` on the page. Column positions
/// come from the header row: exact candidate match first, substring second.
pub fn parse_wikitables(brand: &str, html: &str) -> Vec<FeedRow> {
    let doc = Html::parse_document(html);
    let table_sel = Selector::parse("table.wikitable").unwrap();
    let tr_sel = Selector::parse("tr").unwrap();
    let th_sel = Selector::parse("th").unwrap();
    let cell_sel = Selector::parse("td, th").unwrap();

    let mut out = Vec::new();
    for table in doc.select(&table_sel) {
        let headers: Vec<String> = table
            .select(&th_sel)
            .map(|th| clean(&th.text().collect::<String>()))
            .collect();
        if headers.is_empty() {
            continue;
        }

        let Some(idx_model) = find_column(&headers, MODEL_COLS) else {
            continue;
        };
        let idx_year = find_column(&headers, YEAR_COLS);
        let idx_notes = find_column(&headers, NOTES_COLS);

        for tr in table.select(&tr_sel).skip(1) {
            let cells: Vec<ElementRef> = tr.select(&cell_sel).collect();
            if cells.len() <= idx_model {
                continue;
            }
            let model = clean(&cells[idx_model].text().collect::<String>());
            if model.len() < 2 {
                continue;
            }

            let mut year_text = String::new();
            for idx in [idx_year, idx_notes].into_iter().flatten() {
                if let Some(cell) = cells.get(idx) {
                    year_text.push(' ');
                    year_text.push_str(&cell.text().collect::<String>());
                }
            }

            out.push(FeedRow {
                brand: brand.to_string(),
                display_model: model,
                year: earliest_year(&year_text),
                notes: clean(&year_text),
            });
        }
    }
    out
}

fn find_column(headers: &[String], candidates: &[&str]) -> Option<usize> {
    for c in candidates {
        if let Some(idx) = headers.iter().position(|h| h == c) {
            return Some(idx);
        }
    }
    // fuzzy fallback: candidate contained in the header
    headers.iter().position(|h| {
        candidates
            .iter()
            .any(|c| h.to_lowercase().contains(&c.to_lowercase()))
    })
}

/// Earliest plausible year mentioned in the text.
pub fn earliest_year(text: &str) -> Option<i64> {
    YEAR_RE
        .captures_iter(text)
        .filter_map(|c| c[1].parse::<i64>().ok())
        .min()
}

/// Tolerant identification pattern: lowercased, specials escaped, whitespace
/// and hyphens interchangeable between parts.
/// "EliteBook 840 G1" → `elitebook\s*-?\s*840\s*-?\s*g1`
pub fn build_model_regex(display_model: &str) -> String {
    let base = display_model.to_lowercase();
    let base = REGEX_SPECIALS.replace_all(base.trim(), r"\$1");
    let parts: Vec<&str> = SPLIT_RE.split(&base).filter(|p| !p.is_empty()).collect();
    parts.join(r"\s*-?\s*")
}

/// Keep models released before 2021. Unknown years stay in unless the notes
/// mention 2021 or later.
pub fn filter_pre2021(rows: Vec<FeedRow>) -> Vec<FeedRow> {
    rows.into_iter()
        .filter(|r| match r.year {
            Some(y) => y < 2021,
            None => !earliest_year(&r.notes).is_some_and(|y| y >= 2021),
        })
        .collect()
}

pub fn dedupe(rows: Vec<FeedRow>) -> Vec<FeedRow> {
    let mut seen = HashSet::new();
    rows.into_iter()
        .filter(|r| {
            seen.insert((
                r.brand.trim().to_lowercase(),
                r.display_model.trim().to_lowercase(),
            ))
        })
        .collect()
}

fn write_csv(path: &str, rows: &[FeedRow]) -> Result<()> {
    let mut out = String::from(
        "brand,display_model,model_regex_json,max_ram_gb,supports_w11,storage,cpu_arch,notes,active\n",
    );
    for r in rows {
        let regex_json = serde_json::to_string(&vec![build_model_regex(&r.display_model)])?;
        out.push_str(&format!(
            "{},{},{},,,,,{},1\n",
            csv_field(&r.brand),
            csv_field(&r.display_model),
            csv_field(&regex_json),
            csv_field(&r.notes),
        ));
    }
    std::fs::write(path, out).with_context(|| format!("writing {path}"))?;
    Ok(())
}

fn csv_field(s: &str) -> String {
    if s.contains([',', '"', '\n']) {
        format!("\"{}\"", s.replace('"', "\"\""))
    } else {
        s.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn model_regex_is_tolerant() {
        assert_eq!(
            build_model_regex("EliteBook 840 G1"),
            r"elitebook\s*-?\s*840\s*-?\s*g1"
        );
        assert_eq!(
            build_model_regex("ThinkPad X1-Carbon"),
            r"thinkpad\s*-?\s*x1\s*-?\s*carbon"
        );
    }

    #[test]
    fn model_regex_escapes_specials() {
        assert_eq!(build_model_regex("Aspire 5+"), r"aspire\s*-?\s*5\+");
    }

    #[test]
    fn earliest_year_picks_minimum_plausible() {
        assert_eq!(earliest_year("Released 2014, refreshed 2016"), Some(2014));
        assert_eq!(earliest_year("serial 10234"), None);
        assert_eq!(earliest_year(""), None);
    }

    #[test]
    fn pre2021_filter() {
        let rows = vec![
            row("A", Some(2019), ""),
            row("B", Some(2021), ""),
            row("C", None, "announced 2022"),
            row("D", None, "classic model"),
        ];
        let kept: Vec<String> = filter_pre2021(rows)
            .into_iter()
            .map(|r| r.display_model)
            .collect();
        assert_eq!(kept, vec!["A", "D"]);
    }

    #[test]
    fn dedupe_on_brand_and_model() {
        let rows = vec![row("A", None, ""), row("a ", None, ""), row("B", None, "")];
        assert_eq!(dedupe(rows).len(), 2);
    }

    #[test]
    fn wikitable_parsing() {
        let html = r#"
            <table class="wikitable">
              <tr><th>Model</th><th>Released</th><th>Notes</th></tr>
              <tr><td>Latitude E7450</td><td>2015</td><td>14-inch</td></tr>
              <tr><td>Latitude 9510</td><td>2020</td><td></td></tr>
              <tr><td>X</td><td>2015</td><td>too short</td></tr>
            </table>"#;
        let rows = parse_wikitables("Dell", html);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].display_model, "Latitude E7450");
        assert_eq!(rows[0].year, Some(2015));
    }

    fn row(model: &str, year: Option<i64>, notes: &str) -> FeedRow {
        FeedRow {
            brand: "Test".into(),
            display_model: model.into(),
            year,
            notes: notes.into(),
        }
    }
}
