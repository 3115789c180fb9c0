use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{Context, Result};
use rusqlite::{params, Connection};
use tracing::debug;

use crate::record::{IncidentRecord, Series, SeriesYearDescriptor};

/// Cross-series metadata partition holding season descriptors.
pub const SERIES_DATA_PARTITION: &str = "Series_Data";

/// Storage partition for one series-year's records.
pub fn partition_name(series: Series, year: i32) -> String {
    format!("{}_{}_WC_Docs", year, series.as_str().to_uppercase())
}

/// Connection registry keyed by partition name. Each partition is its
/// own SQLite file, opened on first use and held for process life; the
/// registry is owned by the orchestrator rather than living in module
/// globals, so shutdown is an ordinary drop.
pub struct StoreRegistry {
    data_dir: PathBuf,
    connections: Mutex<HashMap<String, Connection>>,
}

impl StoreRegistry {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        StoreRegistry {
            data_dir: data_dir.into(),
            connections: Mutex::new(HashMap::new()),
        }
    }

    /// Check for an already-persisted record with the same business
    /// identity. source_url only participates when the candidate
    /// carries one.
    pub fn find_by_identity(&self, partition: &str, record: &IncidentRecord) -> Result<bool> {
        self.with_conn(partition, |conn| {
            let mut stmt = conn.prepare(
                "SELECT COUNT(*) FROM penalty_docs
                 WHERE series = ?1 AND doc_type = ?2 AND doc_name = ?3
                   AND doc_date = ?4 AND penalty_type = ?5 AND grand_prix = ?6
                   AND weekend = ?7 AND incident_title = ?8
                   AND (?9 IS NULL OR ifnull(source_url, '') = ?9)",
            )?;
            let count: i64 = stmt.query_row(
                params![
                    record.series.as_str(),
                    record.doc_type.as_str(),
                    record.doc_name,
                    record.doc_date,
                    record.penalty_type.as_str(),
                    record.grand_prix,
                    record.weekend,
                    record.incident_title,
                    record.source_url,
                ],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
    }

    /// Insert a record; the identity index makes this a no-op for
    /// duplicates. Returns whether a row was actually written.
    pub fn insert(&self, partition: &str, record: &IncidentRecord) -> Result<bool> {
        self.with_conn(partition, |conn| {
            let changed = conn.execute(
                "INSERT OR IGNORE INTO penalty_docs
                 (series, doc_type, doc_name, doc_date, penalty_type, grand_prix,
                  weekend, incident_title, document_info, incident_info, stewards,
                  source_url, manual_upload)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
                params![
                    record.series.as_str(),
                    record.doc_type.as_str(),
                    record.doc_name,
                    record.doc_date,
                    record.penalty_type.as_str(),
                    record.grand_prix,
                    record.weekend,
                    record.incident_title,
                    serde_json::to_string(&record.document_info)?,
                    serde_json::to_string(&record.incident_info)?,
                    serde_json::to_string(&record.stewards)?,
                    record.source_url,
                    record.manual_upload,
                ],
            )?;
            Ok(changed > 0)
        })
    }

    /// Newest doc_date in a partition; the canonical date layout sorts
    /// lexicographically, so MAX is chronological.
    pub fn latest_doc_date(&self, partition: &str) -> Result<Option<String>> {
        self.with_conn(partition, |conn| {
            conn.query_row("SELECT MAX(doc_date) FROM penalty_docs", [], |row| {
                row.get::<_, Option<String>>(0)
            })
            .context("latest doc_date lookup")
        })
    }

    pub fn count(&self, partition: &str) -> Result<usize> {
        self.with_conn(partition, |conn| {
            conn.query_row("SELECT COUNT(*) FROM penalty_docs", [], |row| row.get(0))
                .context("record count")
        })
    }

    /// Create or refresh a season descriptor. A season's listing URL can
    /// be repointed by the source, so the URL is last-write-wins.
    pub fn upsert_descriptor(&self, descriptor: &SeriesYearDescriptor) -> Result<()> {
        self.with_conn(SERIES_DATA_PARTITION, |conn| {
            conn.execute(
                "INSERT INTO series_data (series, year, documents_url)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT(series, year)
                 DO UPDATE SET documents_url = excluded.documents_url",
                params![
                    descriptor.series.as_str(),
                    descriptor.year,
                    descriptor.documents_url
                ],
            )?;
            Ok(())
        })
    }

    pub fn find_descriptor(
        &self,
        series: Series,
        year: i32,
    ) -> Result<Option<SeriesYearDescriptor>> {
        self.with_conn(SERIES_DATA_PARTITION, |conn| {
            let mut stmt = conn.prepare(
                "SELECT documents_url FROM series_data WHERE series = ?1 AND year = ?2",
            )?;
            let url = stmt
                .query_map(params![series.as_str(), year], |row| {
                    row.get::<_, String>(0)
                })?
                .next()
                .transpose()?;
            Ok(url.map(|documents_url| SeriesYearDescriptor {
                series,
                year,
                documents_url,
            }))
        })
    }

    /// All known seasons for a series, newest first.
    pub fn descriptors(&self, series: Series) -> Result<Vec<SeriesYearDescriptor>> {
        self.with_conn(SERIES_DATA_PARTITION, |conn| {
            let mut stmt = conn.prepare(
                "SELECT year, documents_url FROM series_data
                 WHERE series = ?1 ORDER BY year DESC",
            )?;
            let rows = stmt
                .query_map(params![series.as_str()], |row| {
                    Ok((row.get::<_, i32>(0)?, row.get::<_, String>(1)?))
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows
                .into_iter()
                .map(|(year, documents_url)| SeriesYearDescriptor {
                    series,
                    year,
                    documents_url,
                })
                .collect())
        })
    }

    /// Partition files already on disk, for the stats overview.
    pub fn partitions_on_disk(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(_) => return Ok(names),
        };
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "sqlite") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    names.push(stem.to_string());
                }
            }
        }
        names.sort();
        Ok(names)
    }

    fn with_conn<T>(
        &self,
        partition: &str,
        f: impl FnOnce(&Connection) -> Result<T>,
    ) -> Result<T> {
        let mut connections = self.connections.lock().unwrap_or_else(|e| e.into_inner());
        if !connections.contains_key(partition) {
            let conn = open_partition(&self.data_dir, partition)
                .with_context(|| format!("opening partition {partition}"))?;
            debug!(partition, "opened store partition");
            connections.insert(partition.to_string(), conn);
        }
        f(connections
            .get(partition)
            .expect("connection inserted above"))
    }
}

fn open_partition(data_dir: &Path, partition: &str) -> Result<Connection> {
    std::fs::create_dir_all(data_dir)?;
    let conn = Connection::open(data_dir.join(format!("{partition}.sqlite")))?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
    init_schema(&conn)?;
    Ok(conn)
}

fn init_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS penalty_docs (
            id             INTEGER PRIMARY KEY,
            series         TEXT NOT NULL,
            doc_type       TEXT NOT NULL,
            doc_name       TEXT NOT NULL,
            doc_date       TEXT NOT NULL,
            penalty_type   TEXT NOT NULL,
            grand_prix     TEXT NOT NULL,
            weekend        TEXT NOT NULL,
            incident_title TEXT NOT NULL,
            document_info  TEXT NOT NULL,
            incident_info  TEXT NOT NULL,
            stewards       TEXT NOT NULL,
            source_url     TEXT,
            manual_upload  BOOLEAN NOT NULL DEFAULT 0,
            created_at     TEXT NOT NULL DEFAULT (datetime('now'))
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_penalty_identity
            ON penalty_docs(series, doc_type, doc_name, doc_date, penalty_type,
                            grand_prix, weekend, incident_title,
                            ifnull(source_url, ''));
        CREATE INDEX IF NOT EXISTS idx_penalty_doc_date ON penalty_docs(doc_date);

        CREATE TABLE IF NOT EXISTS series_data (
            id            INTEGER PRIMARY KEY,
            series        TEXT NOT NULL,
            year          INTEGER NOT NULL,
            documents_url TEXT NOT NULL,
            created_at    TEXT NOT NULL DEFAULT (datetime('now')),
            UNIQUE(series, year)
        );
        ",
    )?;
    Ok(())
}

// ── Tests ──
