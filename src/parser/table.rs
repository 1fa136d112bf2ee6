use scraper::{Html, Selector};

use super::normalize::clean;

/// One key/value row of a spec sheet: the left-most header cell text and the
/// text of the row's last cell.
#[derive(Debug, Clone)]
pub struct SpecRow {
    pub label: String,
    pub value: String,
}

/// Anything that can present itself as a flat sequence of label/value rows.
/// Keeps the extractor ignorant of the concrete document markup.
pub trait TableSource {
    fn spec_rows(&self) -> Vec<SpecRow>;
}

impl TableSource for Html {
    fn spec_rows(&self) -> Vec<SpecRow> {
        let tr = Selector::parse("tr").unwrap();
        let th = Selector::parse("th").unwrap();
        let td = Selector::parse("td").unwrap();

        let mut rows = Vec::new();
        for row in self.select(&tr) {
            let header = row
                .select(&th)
                .next()
                .or_else(|| row.select(&td).next());
            let Some(header) = header else { continue };

            let value = row
                .select(&td)
                .last()
                .unwrap_or(header);

            rows.push(SpecRow {
                label: clean(&header.text().collect::<String>()),
                value: clean(&value.text().collect::<String>()),
            });
        }
        rows
    }
}

/// Find the value for the first row whose label equals one of the accepted
/// synonyms (case-insensitive, post-normalization). Matching is exact, not
/// substring: callers enumerate every locale variant they accept.
pub fn lookup(rows: &[SpecRow], labels: &[&str]) -> Option<String> {
    let wanted: Vec<String> = labels.iter().map(|l| l.to_lowercase()).collect();
    rows.iter()
        .find(|r| wanted.iter().any(|w| r.label.to_lowercase() == *w))
        .map(|r| r.value.clone())
}
