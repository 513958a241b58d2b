use crate::scan::normalize_site_url;
use chrono::Utc;
use rusqlite::{Connection, Result, params};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use xmlnexus_scanner::ScanResult;

/// Scan-history store: one row per scanned site, keyed by the normalized
/// site URL and refreshed in place on every rescan.
pub struct Database {
    conn: Connection,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScannedSite {
    pub site_url: String,
    pub sitemap_url: String,
    pub pages: i64,
    pub sitemaps: i64,
    pub errors: i64,
    pub status: String,
    pub scanned_at: String,
}

impl Database {
    pub fn drop(path: &Path) {
        fs::remove_file(path).unwrap();
    }

    pub fn exists(path: &Path) -> bool {
        path.exists()
    }

    pub fn new(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
            ",
        )?;

        let db = Database { conn };
        db.init_schema()?;
        Ok(db)
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS scanned_sites (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                site_url TEXT NOT NULL UNIQUE,
                sitemap_url TEXT NOT NULL,
                pages INTEGER NOT NULL DEFAULT 0,
                sitemaps INTEGER NOT NULL DEFAULT 0,
                errors INTEGER NOT NULL DEFAULT 0,
                status TEXT NOT NULL CHECK(status IN ('ok', 'failed')),
                scanned_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_scanned_sites_scanned_at
                ON scanned_sites(scanned_at);
            ",
        )?;
        Ok(())
    }

    /// Insert or refresh the row for a site. The timestamp is always
    /// updated so a rescanned site surfaces as recently scanned.
    pub fn upsert_site(
        &self,
        original_url: &str,
        sitemap_url: &str,
        result: &ScanResult,
    ) -> Result<()> {
        let site_url = normalize_site_url(original_url);
        let status = if result.is_failure() { "failed" } else { "ok" };
        let scanned_at = Utc::now().to_rfc3339();

        self.conn.execute(
            "INSERT INTO scanned_sites (site_url, sitemap_url, pages, sitemaps, errors, status, scanned_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT(site_url) DO UPDATE SET
                sitemap_url = excluded.sitemap_url,
                pages = excluded.pages,
                sitemaps = excluded.sitemaps,
                errors = excluded.errors,
                status = excluded.status,
                scanned_at = excluded.scanned_at",
            params![
                site_url,
                sitemap_url,
                result.total_urls as i64,
                result.total_sitemaps as i64,
                result.errors.len() as i64,
                status,
                scanned_at,
            ],
        )?;
        Ok(())
    }

    /// Most recently scanned sites first.
    pub fn recent_sites(&self, limit: usize) -> Result<Vec<ScannedSite>> {
        let mut statement = self.conn.prepare(
            "SELECT site_url, sitemap_url, pages, sitemaps, errors, status, scanned_at
             FROM scanned_sites
             ORDER BY scanned_at DESC, id DESC
             LIMIT ?1",
        )?;

        let rows = statement.query_map(params![limit as i64], |row| {
            Ok(ScannedSite {
                site_url: row.get(0)?,
                sitemap_url: row.get(1)?,
                pages: row.get(2)?,
                sitemaps: row.get(3)?,
                errors: row.get(4)?,
                status: row.get(5)?,
                scanned_at: row.get(6)?,
            })
        })?;

        rows.collect()
    }

    /// Delete every history row, returning how many were removed.
    pub fn clear(&self) -> Result<usize> {
        self.conn.execute("DELETE FROM scanned_sites", [])
    }
}
