//! Persisted pipeline state: the location cache and the recruitment counter.
//!
//! Both tables live in one SQLite database. Schema creation is idempotent;
//! the cache is append-only for identifiers already present, and the
//! recruitment counter upserts per calendar date.

use rusqlite::Connection;
use std::collections::HashMap;
use std::path::Path;

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl std::fmt::Display for StoreError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "Database error: {}", e),
        }
    }
}

impl std::error::Error for StoreError {}

pub struct StateStore {
    conn: Connection,
}

impl StateStore {
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS location_cache (
                identifier  TEXT PRIMARY KEY,
                region      TEXT,
                fetched_at  INTEGER NOT NULL
            );
            CREATE TABLE IF NOT EXISTS recruitment_log (
                date            TEXT PRIMARY KEY,
                eligible_count  INTEGER NOT NULL,
                updated_at      INTEGER NOT NULL
            );
            "#,
        )?;

        Ok(Self { conn })
    }

    /// Read the whole cache. Values are `Some(region)` or `None` for a
    /// cached definitive no-region answer.
    pub fn load_location_cache(&self) -> Result<HashMap<String, Option<String>>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT identifier, region FROM location_cache")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, Option<String>>(1)?))
        })?;

        let mut cache = HashMap::new();
        for row in rows {
            let (identifier, region) = row?;
            cache.insert(identifier, region);
        }
        Ok(cache)
    }

    /// Merge newly resolved entries. Identifiers already cached are left
    /// untouched; only first-time identifiers are written.
    pub fn merge_location_cache(
        &self,
        entries: &[(String, Option<String>)],
        now: i64,
    ) -> Result<usize, StoreError> {
        let mut inserted = 0usize;
        for (identifier, region) in entries {
            inserted += self.conn.execute(
                "INSERT OR IGNORE INTO location_cache (identifier, region, fetched_at)
                 VALUES (?1, ?2, ?3)",
                rusqlite::params![identifier, region, now],
            )?;
        }
        if inserted > 0 {
            log::info!("💾 Location cache: {} new entries persisted", inserted);
        }
        Ok(inserted)
    }

    /// Record the count of non-excluded participants as of `date`
    /// (YYYY-MM-DD). Re-running on the same date overwrites the count.
    pub fn upsert_recruitment(
        &self,
        date: &str,
        eligible_count: i64,
        now: i64,
    ) -> Result<(), StoreError> {
        self.conn.execute(
            r#"
            INSERT INTO recruitment_log (date, eligible_count, updated_at)
            VALUES (?1, ?2, ?3)
            ON CONFLICT(date) DO UPDATE SET
                eligible_count = excluded.eligible_count,
                updated_at = excluded.updated_at
            "#,
            rusqlite::params![date, eligible_count, now],
        )?;
        Ok(())
    }

    pub fn recruitment_count(&self, date: &str) -> Result<Option<i64>, StoreError> {
        let mut stmt = self
            .conn
            .prepare("SELECT eligible_count FROM recruitment_log WHERE date = ?1")?;
        let mut rows = stmt.query_map([date], |row| row.get::<_, i64>(0))?;
        match rows.next() {
            Some(count) => Ok(Some(count?)),
            None => Ok(None),
        }
    }
}
