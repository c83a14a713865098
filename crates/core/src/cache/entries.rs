//! SQLite persistence for cache entries.
//!
//! One row per `(query_key, source_id)` holding the JSON-encoded entry. A write
//! only replaces a row when it is newer (by `updated_at`, then `revision`), so
//! background persists that land out of order cannot roll an entry back.

use std::collections::HashMap;

use chrono::{DateTime, SecondsFormat, Utc};
use tokio_rusqlite::params;

use super::connection::CacheDb;
use super::entry::CacheEntry;
use super::store::CacheBackend;
use crate::Error;

/// Fixed-width UTC timestamp so that text comparison matches time order.
fn timestamp(at: DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

impl CacheDb {
    /// Number of persisted entries.
    pub async fn count_entries(&self) -> Result<u64, Error> {
        self.conn
            .call(|conn| -> Result<u64, Error> {
                let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[async_trait::async_trait]
impl CacheBackend for CacheDb {
    async fn load(&self, query_key: &str) -> Result<HashMap<String, CacheEntry>, Error> {
        let query_key = query_key.to_string();
        self.conn
            .call(move |conn| -> Result<HashMap<String, CacheEntry>, Error> {
                let mut stmt = conn.prepare("SELECT source_id, entry_json FROM cache_entries WHERE query_key = ?1")?;
                let rows = stmt.query_map(params![query_key], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })?;

                let mut entries = HashMap::new();
                for row in rows {
                    let (source_id, json) = row?;
                    match serde_json::from_str::<CacheEntry>(&json) {
                        Ok(entry) => {
                            entries.insert(source_id, entry);
                        }
                        Err(e) => {
                            tracing::warn!(query = %query_key, source = %source_id, "skipping corrupt cache entry: {}", e)
                        }
                    }
                }
                Ok(entries)
            })
            .await
            .map_err(Error::from)
    }

    async fn store(&self, query_key: &str, source_id: &str, entry: &CacheEntry) -> Result<(), Error> {
        let query_key = query_key.to_string();
        let source_id = source_id.to_string();
        let entry_json = serde_json::to_string(entry)?;
        let updated_at = timestamp(entry.updated_at);
        let revision = entry.revision as i64;

        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT INTO cache_entries (query_key, source_id, entry_json, updated_at, revision)
                    VALUES (?1, ?2, ?3, ?4, ?5)
                    ON CONFLICT(query_key, source_id) DO UPDATE SET
                        entry_json = excluded.entry_json,
                        updated_at = excluded.updated_at,
                        revision = excluded.revision
                    WHERE excluded.updated_at > cache_entries.updated_at
                       OR (excluded.updated_at = cache_entries.updated_at
                           AND excluded.revision > cache_entries.revision)",
                    params![query_key, source_id, entry_json, updated_at, revision],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    async fn purge_older_than(&self, cutoff: DateTime<Utc>) -> Result<u64, Error> {
        let cutoff = timestamp(cutoff);
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let count = conn.execute("DELETE FROM cache_entries WHERE updated_at < ?1", params![cutoff])?;
                Ok(count as u64)
            })
            .await
            .map_err(Error::from)
    }
}
