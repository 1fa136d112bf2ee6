use anyhow::Result;
use rusqlite::{Connection, OptionalExtension};
use tracing::info;

use crate::db::{self, StagingRow};
use crate::parser::classify;

const STORAGE_MAX_LEN: usize = 190;

pub struct PromoteCounts {
    pub eligible: usize,
    pub skipped: usize,
    pub models_created: usize,
    pub w11_backfilled: usize,
    pub specs_created: usize,
}

impl PromoteCounts {
    pub fn print(&self) {
        println!(
            "Promoted {} staging rows ({} skipped): {} new models, {} supports_w11 backfills, {} new spec rows.",
            self.eligible, self.skipped, self.models_created, self.w11_backfilled, self.specs_created,
        );
    }
}

/// Promote all eligible staging rows into the catalog. Idempotent: every
/// insert is gated by an existence check, so re-running over unchanged
/// staging data is a no-op.
pub fn promote_all(conn: &Connection) -> Result<PromoteCounts> {
    let rows = db::fetch_staging(conn)?;
    let mut counts = PromoteCounts {
        eligible: 0,
        skipped: 0,
        models_created: 0,
        w11_backfilled: 0,
        specs_created: 0,
    };

    for row in &rows {
        if !is_promotable(row) {
            counts.skipped += 1;
            continue;
        }
        let (Some(brand), Some(model)) = (non_empty(&row.brand), non_empty(&row.model_name))
        else {
            counts.skipped += 1;
            continue;
        };

        counts.eligible += 1;
        let (model_id, created, backfilled) = upsert_model(conn, brand, model, row)?;
        counts.models_created += created as usize;
        counts.w11_backfilled += backfilled as usize;
        counts.specs_created += ensure_specs(conn, model_id, row)? as usize;
    }

    info!(
        "promotion pass: {} eligible, {} skipped, {} models created",
        counts.eligible, counts.skipped, counts.models_created
    );
    Ok(counts)
}

/// Staging rows the promotion pass accepts: identity present and OS inside
/// the catalog's scope. The OS check is the second application of the
/// shared exclusion filter; staging may predate the current exclusion list.
pub fn is_promotable(row: &StagingRow) -> bool {
    non_empty(&row.brand).is_some()
        && non_empty(&row.model_name).is_some()
        && !row.os.as_deref().is_some_and(classify::is_excluded_os)
}

/// How many staging rows the next promotion pass would accept.
pub fn eligible_count(conn: &Connection) -> Result<usize> {
    Ok(db::fetch_staging(conn)?
        .iter()
        .filter(|r| is_promotable(r))
        .count())
}

/// Exact-match pattern for later fuzzy identification of this model in
/// third-party strings: every regex metacharacter escaped, then anchored.
pub fn anchor_pattern(display_model: &str) -> String {
    format!("^{}$", regex::escape(display_model))
}

/// Human-readable storage summary: prefer the parsed GB value, fall back to
/// the raw storage text, bounded to the column width.
fn storage_summary(row: &StagingRow) -> String {
    let s = match row.storage_gb {
        Some(gb) => format!("{gb} GB"),
        None => row.storage_text.clone().unwrap_or_default(),
    };
    s.chars().take(STORAGE_MAX_LEN).collect()
}

/// Create the catalog entry if absent; otherwise only backfill supports_w11
/// when it is still NULL. All other fields are frozen at creation time.
/// Returns (model_id, created, backfilled).
fn upsert_model(
    conn: &Connection,
    brand: &str,
    model: &str,
    row: &StagingRow,
) -> Result<(i64, bool, bool)> {
    let existing: Option<(i64, Option<i64>)> = conn
        .query_row(
            "SELECT id, supports_w11 FROM models WHERE brand = ?1 AND display_model = ?2",
            rusqlite::params![brand, model],
            |r| Ok((r.get(0)?, r.get(1)?)),
        )
        .optional()?;

    if let Some((id, supports)) = existing {
        if supports.is_none() {
            conn.execute(
                "UPDATE models SET supports_w11 = ?1 WHERE id = ?2",
                rusqlite::params![row.supports_w11, id],
            )?;
            return Ok((id, false, true));
        }
        return Ok((id, false, false));
    }

    conn.execute(
        "INSERT INTO models
         (brand, display_model, model_regex, max_ram_gb, supports_w11, storage, cpu_arch, notes, active)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 1)",
        rusqlite::params![
            brand,
            model,
            anchor_pattern(model),
            row.ram_max_gb.or(row.ram_installed_gb),
            row.supports_w11,
            storage_summary(row),
            row.cpu_arch,
            format!("Bron: noteb.com • OS: {}", row.os.as_deref().unwrap_or("")),
        ],
    )?;
    Ok((conn.last_insert_rowid(), true, false))
}

/// First-write-wins spec row: created once per catalog id, never updated.
/// Only fields the pipeline derives with confidence are filled; the rest
/// stay NULL rather than guessed. Returns whether a row was created.
fn ensure_specs(conn: &Connection, model_id: i64, row: &StagingRow) -> Result<bool> {
    let exists: Option<i64> = conn
        .query_row(
            "SELECT model_id FROM model_specs WHERE model_id = ?1",
            [model_id],
            |r| r.get(0),
        )
        .optional()?;
    if exists.is_some() {
        return Ok(false);
    }

    conn.execute(
        "INSERT INTO model_specs
         (model_id, device_type, cpu_cores, cpu_arch, ram_gb, storage_gb,
          display_inches, display_height_px)
         VALUES (?1, 'Notebook', ?2, ?3, ?4, ?5, ?6, ?7)",
        rusqlite::params![
            model_id,
            row.cpu_cores,
            row.cpu_arch,
            row.ram_installed_gb,
            row.storage_gb,
            row.screen_size_in,
            row.res_h,
        ],
    )?;
    Ok(true)
}

fn non_empty(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{init_schema, test_record, upsert_raw};

    fn mem_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    fn model_count(conn: &Connection, table: &str) -> usize {
        conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |r| r.get(0))
            .unwrap()
    }

    #[test]
    fn promotion_creates_model_and_spec_once() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();

        let counts = promote_all(&conn).unwrap();
        assert_eq!(counts.models_created, 1);
        assert_eq!(counts.specs_created, 1);

        // Second pass over unchanged staging data is a no-op.
        let counts = promote_all(&conn).unwrap();
        assert_eq!(counts.models_created, 0);
        assert_eq!(counts.specs_created, 0);
        assert_eq!(model_count(&conn, "models"), 1);
        assert_eq!(model_count(&conn, "model_specs"), 1);

        let (regex, active): (String, i64) = conn
            .query_row(
                "SELECT model_regex, active FROM models WHERE display_model = 'Latitude 5420'",
                [],
                |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .unwrap();
        assert_eq!(regex, "^Latitude 5420$");
        assert_eq!(active, 1);
    }

    #[test]
    fn promotion_skips_excluded_os_and_missing_identity() {
        let conn = mem_db();

        let mut chromebook = test_record("Acer", "Chromebook 314");
        chromebook.os = Some("ChromeOS".into());
        upsert_raw(&conn, &chromebook).unwrap();

        let mut nameless = test_record("", "");
        nameless.brand = Some(String::new());
        nameless.model_name = Some(String::new());
        upsert_raw(&conn, &nameless).unwrap();

        let counts = promote_all(&conn).unwrap();
        assert_eq!(counts.eligible, 0);
        assert_eq!(counts.skipped, 2);
        assert_eq!(model_count(&conn, "models"), 0);
    }

    #[test]
    fn eligible_count_splits_staging() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();

        let mut chromebook = test_record("Acer", "Chromebook 314");
        chromebook.os = Some("Chrome OS".into());
        upsert_raw(&conn, &chromebook).unwrap();

        let mut nameless = test_record("", "");
        nameless.brand = Some(String::new());
        nameless.model_name = Some(String::new());
        upsert_raw(&conn, &nameless).unwrap();

        assert_eq!(eligible_count(&conn).unwrap(), 1);
    }

    #[test]
    fn supports_w11_backfilled_only_while_unset() {
        let conn = mem_db();
        conn.execute(
            "INSERT INTO models (brand, display_model, supports_w11) VALUES ('Dell', 'Latitude 5420', NULL)",
            [],
        )
        .unwrap();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();

        let counts = promote_all(&conn).unwrap();
        assert_eq!(counts.w11_backfilled, 1);
        let sup: i64 = conn
            .query_row("SELECT supports_w11 FROM models", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sup, 1);

        // Once set, a later pass with a different verdict must not change it.
        let mut older = test_record("Dell", "Latitude 5420");
        older.cpu = Some("Intel Celeron N3060".into());
        older.supports_w11 = false;
        upsert_raw(&conn, &older).unwrap();

        let counts = promote_all(&conn).unwrap();
        assert_eq!(counts.w11_backfilled, 0);
        let sup: i64 = conn
            .query_row("SELECT supports_w11 FROM models", [], |r| r.get(0))
            .unwrap();
        assert_eq!(sup, 1);
    }

    #[test]
    fn existing_model_fields_stay_frozen() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();
        promote_all(&conn).unwrap();

        let mut rescrape = test_record("Dell", "Latitude 5420");
        rescrape.storage_gb = Some(1024);
        rescrape.ram_max_gb = Some(64);
        upsert_raw(&conn, &rescrape).unwrap();
        promote_all(&conn).unwrap();

        let (storage, ram): (String, i64) = conn
            .query_row("SELECT storage, max_ram_gb FROM models", [], |r| {
                Ok((r.get(0)?, r.get(1)?))
            })
            .unwrap();
        assert_eq!(storage, "256 GB");
        assert_eq!(ram, 32);

        // Spec row is first-write-wins too.
        let spec_storage: i64 = conn
            .query_row("SELECT storage_gb FROM model_specs", [], |r| r.get(0))
            .unwrap();
        assert_eq!(spec_storage, 256);
    }

    #[test]
    fn spec_row_leaves_unknowable_fields_null() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();
        promote_all(&conn).unwrap();

        let (device_type, tpm, cores, height): (String, Option<String>, i64, i64) = conn
            .query_row(
                "SELECT device_type, tpm_version, cpu_cores, display_height_px FROM model_specs",
                [],
                |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
            )
            .unwrap();
        assert_eq!(device_type, "Notebook");
        assert_eq!(tpm, None);
        assert_eq!(cores, 4);
        assert_eq!(height, 1080);
    }

    #[test]
    fn anchor_pattern_escapes_metacharacters() {
        assert_eq!(anchor_pattern("Latitude 5420"), "^Latitude 5420$");
        assert_eq!(anchor_pattern("Vivobook (14)"), r"^Vivobook \(14\)$");
        assert_eq!(anchor_pattern("X1 Carbon+"), r"^X1 Carbon\+$");
    }

    #[test]
    fn storage_summary_prefers_parsed_gb() {
        let mut row = blank_row();
        row.storage_gb = Some(1024);
        row.storage_text = Some("1TB NVMe".into());
        assert_eq!(storage_summary(&row), "1024 GB");

        row.storage_gb = None;
        assert_eq!(storage_summary(&row), "1TB NVMe");

        row.storage_text = None;
        assert_eq!(storage_summary(&row), "");
    }

    #[test]
    fn storage_summary_truncates_long_raw_text() {
        let mut row = blank_row();
        row.storage_text = Some("x".repeat(300));
        assert_eq!(storage_summary(&row).len(), STORAGE_MAX_LEN);
    }

    fn blank_row() -> StagingRow {
        StagingRow {
            brand: None,
            model_name: None,
            cpu_cores: None,
            ram_installed_gb: None,
            ram_max_gb: None,
            storage_text: None,
            storage_gb: None,
            screen_size_in: None,
            res_h: None,
            os: None,
            cpu_arch: None,
            supports_w11: false,
        }
    }
}
