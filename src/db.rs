use anyhow::Result;
use rusqlite::Connection;

const DB_PATH: &str = "data/noteb.sqlite";

pub fn connect() -> Result<Connection> {
    std::fs::create_dir_all("data")?;
    let conn = Connection::open(DB_PATH)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    Ok(conn)
}

pub fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        -- First landing of scraped attributes, one row per device,
        -- overwritten on re-scrape.
        CREATE TABLE IF NOT EXISTS models_raw (
            id               INTEGER PRIMARY KEY,
            source_url       TEXT NOT NULL,
            brand            TEXT,
            model_name       TEXT,
            cpu              TEXT,
            cpu_cores        INTEGER,
            ram_installed_gb INTEGER,
            ram_max_gb       INTEGER,
            storage_text     TEXT,
            storage_gb       INTEGER,
            screen_size_in   REAL,
            resolution       TEXT,
            res_w            INTEGER,
            res_h            INTEGER,
            panel_type       TEXT,
            os               TEXT,
            release_year     INTEGER,
            weight_kg        REAL,
            battery_wh       REAL,
            cpu_arch         TEXT,
            supports_w11     INTEGER,
            notes            TEXT,
            scraped_at       TEXT NOT NULL,
            UNIQUE(brand, model_name)
        );

        -- Canonical device identities, write-once-then-frozen
        -- (only supports_w11 may be backfilled while NULL).
        CREATE TABLE IF NOT EXISTS models (
            id            INTEGER PRIMARY KEY,
            brand         TEXT NOT NULL,
            display_model TEXT NOT NULL,
            model_regex   TEXT,
            max_ram_gb    INTEGER,
            supports_w11  INTEGER,
            storage       TEXT,
            cpu_arch      TEXT,
            notes         TEXT,
            active        INTEGER NOT NULL DEFAULT 1,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(brand, display_model)
        );

        -- Write-once hardware capability enrichment, 1:1 with models.
        CREATE TABLE IF NOT EXISTS model_specs (
            model_id               INTEGER PRIMARY KEY REFERENCES models(id),
            device_type            TEXT NOT NULL DEFAULT 'Notebook',
            cpu_ghz                REAL,
            cpu_cores              INTEGER,
            cpu_arch               TEXT,
            ram_gb                 INTEGER,
            storage_gb             INTEGER,
            tpm_version            TEXT,
            has_uefi               INTEGER,
            secure_boot_enabled    INTEGER,
            gpu_supports_dx12      INTEGER,
            wddm_major             INTEGER,
            display_inches         REAL,
            display_height_px      INTEGER,
            display_effective_8bit INTEGER,
            has_bluetooth          INTEGER,
            has_wifi               INTEGER,
            has_ethernet           INTEGER
        );
        ",
    )?;
    Ok(())
}

/// One assembled detail page: identity, raw spec text, and derived fields.
#[derive(Debug, Clone)]
pub struct DeviceRecord {
    pub source_url: String,
    pub brand: Option<String>,
    pub model_name: Option<String>,
    pub cpu: Option<String>,
    pub cpu_cores: Option<i64>,
    pub ram_installed_gb: Option<i64>,
    pub ram_max_gb: Option<i64>,
    pub storage_text: Option<String>,
    pub storage_gb: Option<i64>,
    pub screen_size_in: Option<f64>,
    pub resolution: Option<String>,
    pub res_w: Option<i64>,
    pub res_h: Option<i64>,
    pub panel_type: Option<String>,
    pub os: Option<String>,
    pub release_year: Option<i64>,
    pub weight_kg: Option<f64>,
    pub battery_wh: Option<f64>,
    pub cpu_arch: Option<String>,
    pub supports_w11: bool,
    pub notes: Option<String>,
    pub scraped_at: String,
}

/// Insert or fully replace the staging row for (brand, model_name). The
/// identity key stays, every other column takes the new value, so
/// re-scraping a stable device converges to its latest observed spec.
pub fn upsert_raw(conn: &Connection, rec: &DeviceRecord) -> Result<()> {
    conn.execute(
        "INSERT INTO models_raw
         (source_url, brand, model_name, cpu, cpu_cores, ram_installed_gb, ram_max_gb,
          storage_text, storage_gb, screen_size_in, resolution, res_w, res_h, panel_type,
          os, release_year, weight_kg, battery_wh, cpu_arch, supports_w11, notes, scraped_at)
         VALUES (?1,?2,?3,?4,?5,?6,?7,?8,?9,?10,?11,?12,?13,?14,?15,?16,?17,?18,?19,?20,?21,?22)
         ON CONFLICT(brand, model_name) DO UPDATE SET
           source_url = excluded.source_url,
           cpu = excluded.cpu,
           cpu_cores = excluded.cpu_cores,
           ram_installed_gb = excluded.ram_installed_gb,
           ram_max_gb = excluded.ram_max_gb,
           storage_text = excluded.storage_text,
           storage_gb = excluded.storage_gb,
           screen_size_in = excluded.screen_size_in,
           resolution = excluded.resolution,
           res_w = excluded.res_w,
           res_h = excluded.res_h,
           panel_type = excluded.panel_type,
           os = excluded.os,
           release_year = excluded.release_year,
           weight_kg = excluded.weight_kg,
           battery_wh = excluded.battery_wh,
           cpu_arch = excluded.cpu_arch,
           supports_w11 = excluded.supports_w11,
           notes = excluded.notes,
           scraped_at = excluded.scraped_at",
        rusqlite::params![
            rec.source_url,
            rec.brand,
            rec.model_name,
            rec.cpu,
            rec.cpu_cores,
            rec.ram_installed_gb,
            rec.ram_max_gb,
            rec.storage_text,
            rec.storage_gb,
            rec.screen_size_in,
            rec.resolution,
            rec.res_w,
            rec.res_h,
            rec.panel_type,
            rec.os,
            rec.release_year,
            rec.weight_kg,
            rec.battery_wh,
            rec.cpu_arch,
            rec.supports_w11,
            rec.notes,
            rec.scraped_at,
        ],
    )?;
    Ok(())
}

/// Staging row as seen by the promotion pass.
#[derive(Debug)]
pub struct StagingRow {
    pub brand: Option<String>,
    pub model_name: Option<String>,
    pub cpu_cores: Option<i64>,
    pub ram_installed_gb: Option<i64>,
    pub ram_max_gb: Option<i64>,
    pub storage_text: Option<String>,
    pub storage_gb: Option<i64>,
    pub screen_size_in: Option<f64>,
    pub res_h: Option<i64>,
    pub os: Option<String>,
    pub cpu_arch: Option<String>,
    pub supports_w11: bool,
}

pub fn fetch_staging(conn: &Connection) -> Result<Vec<StagingRow>> {
    let mut stmt = conn.prepare(
        "SELECT brand, model_name, cpu_cores, ram_installed_gb, ram_max_gb,
                storage_text, storage_gb, screen_size_in, res_h, os, cpu_arch, supports_w11
         FROM models_raw
         ORDER BY brand, model_name",
    )?;
    let rows = stmt
        .query_map([], |row| {
            Ok(StagingRow {
                brand: row.get(0)?,
                model_name: row.get(1)?,
                cpu_cores: row.get(2)?,
                ram_installed_gb: row.get(3)?,
                ram_max_gb: row.get(4)?,
                storage_text: row.get(5)?,
                storage_gb: row.get(6)?,
                screen_size_in: row.get(7)?,
                res_h: row.get(8)?,
                os: row.get(9)?,
                cpu_arch: row.get(10)?,
                supports_w11: row.get(11)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Overview ──

pub struct OverviewRow {
    pub brand: String,
    pub display_model: String,
    pub max_ram_gb: Option<i64>,
    pub supports_w11: Option<i64>,
    pub storage: String,
    pub cpu_arch: String,
}

pub fn fetch_overview(conn: &Connection, limit: usize) -> Result<Vec<OverviewRow>> {
    let mut stmt = conn.prepare(&format!(
        "SELECT brand, display_model, max_ram_gb, supports_w11,
                COALESCE(storage,''), COALESCE(cpu_arch,'')
         FROM models
         ORDER BY brand, display_model
         LIMIT {limit}"
    ))?;
    let rows = stmt
        .query_map([], |row| {
            Ok(OverviewRow {
                brand: row.get(0)?,
                display_model: row.get(1)?,
                max_ram_gb: row.get(2)?,
                supports_w11: row.get(3)?,
                storage: row.get(4)?,
                cpu_arch: row.get(5)?,
            })
        })?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct Stats {
    pub staged: usize,
    pub models: usize,
    pub specs: usize,
    pub w11_ready: usize,
}

pub fn get_stats(conn: &Connection) -> Result<Stats> {
    let staged: usize = conn.query_row("SELECT COUNT(*) FROM models_raw", [], |r| r.get(0))?;
    let models: usize = conn.query_row("SELECT COUNT(*) FROM models", [], |r| r.get(0))?;
    let specs: usize = conn.query_row("SELECT COUNT(*) FROM model_specs", [], |r| r.get(0))?;
    let w11_ready: usize = conn.query_row(
        "SELECT COUNT(*) FROM models WHERE supports_w11 = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(Stats {
        staged,
        models,
        specs,
        w11_ready,
    })
}

#[cfg(test)]
pub fn test_record(brand: &str, model: &str) -> DeviceRecord {
    DeviceRecord {
        source_url: "https://noteb.com/search/detail?id=1".into(),
        brand: Some(brand.into()),
        model_name: Some(model.into()),
        cpu: Some("Intel Core i5-8250U".into()),
        cpu_cores: Some(4),
        ram_installed_gb: Some(8),
        ram_max_gb: Some(32),
        storage_text: Some("256GB SSD".into()),
        storage_gb: Some(256),
        screen_size_in: Some(14.0),
        resolution: Some("1920x1080".into()),
        res_w: Some(1920),
        res_h: Some(1080),
        panel_type: Some("IPS".into()),
        os: Some("Windows 10".into()),
        release_year: Some(2018),
        weight_kg: Some(1.4),
        battery_wh: Some(54.0),
        cpu_arch: Some("Intel".into()),
        supports_w11: true,
        notes: None,
        scraped_at: "2024-01-01 00:00:00".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();
        conn
    }

    #[test]
    fn upsert_raw_is_idempotent() {
        let conn = mem_db();
        let rec = test_record("Dell", "Latitude 5420");
        upsert_raw(&conn, &rec).unwrap();
        upsert_raw(&conn, &rec).unwrap();

        let count: usize = conn
            .query_row("SELECT COUNT(*) FROM models_raw", [], |r| r.get(0))
            .unwrap();
        assert_eq!(count, 1);

        let rows = fetch_staging(&conn).unwrap();
        assert_eq!(rows[0].storage_gb, Some(256));
        assert_eq!(rows[0].os.as_deref(), Some("Windows 10"));
    }

    #[test]
    fn upsert_raw_fully_replaces_on_rescrape() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();

        let mut newer = test_record("Dell", "Latitude 5420");
        newer.storage_text = Some("1TB NVMe".into());
        newer.storage_gb = Some(1024);
        newer.os = Some("Ubuntu".into());
        newer.scraped_at = "2024-06-01 00:00:00".into();
        upsert_raw(&conn, &newer).unwrap();

        let rows = fetch_staging(&conn).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].storage_gb, Some(1024));
        assert_eq!(rows[0].os.as_deref(), Some("Ubuntu"));
    }

    #[test]
    fn distinct_models_get_distinct_rows() {
        let conn = mem_db();
        upsert_raw(&conn, &test_record("Dell", "Latitude 5420")).unwrap();
        upsert_raw(&conn, &test_record("Dell", "Latitude 7420")).unwrap();
        assert_eq!(fetch_staging(&conn).unwrap().len(), 2);
    }
}
