//! Bucket operations: open, enumerate, delete and measure named partitions.

use super::connection::CacheStore;
use crate::Error;
use serde::{Deserialize, Serialize};
use tokio_rusqlite::params;

/// Entry count and summed `content-length` of one bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct BucketUsage {
    pub name: String,
    pub entries: u64,
    pub total_bytes: u64,
}

impl CacheStore {
    /// Create the bucket if it does not exist yet.
    pub async fn open_bucket(&self, name: &str) -> Result<(), Error> {
        let name = name.to_string();
        let now = chrono::Utc::now().to_rfc3339();
        self.conn
            .call(move |conn| -> Result<(), Error> {
                conn.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![name, now],
                )?;
                Ok(())
            })
            .await
            .map_err(Error::from)
    }

    /// All bucket names, oldest first.
    pub async fn bucket_names(&self) -> Result<Vec<String>, Error> {
        self.conn
            .call(|conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT name FROM buckets ORDER BY rowid ASC")?;
                let names = stmt
                    .query_map([], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(names)
            })
            .await
            .map_err(Error::from)
    }

    pub async fn has_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let exists =
                    conn.query_row("SELECT EXISTS(SELECT 1 FROM buckets WHERE name = ?1)", params![name], |row| {
                        row.get(0)
                    })?;
                Ok(exists)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete a bucket and every entry in it.
    ///
    /// Returns false if no bucket had that name.
    pub async fn delete_bucket(&self, name: &str) -> Result<bool, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM buckets WHERE name = ?1", params![name])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// Entry count and summed size of a bucket. Missing buckets report zero.
    pub async fn bucket_usage(&self, name: &str) -> Result<BucketUsage, Error> {
        let name = name.to_string();
        self.conn
            .call(move |conn| -> Result<BucketUsage, Error> {
                let (entries, total_bytes): (i64, i64) = conn.query_row(
                    "SELECT COUNT(*), COALESCE(SUM(size_bytes), 0) FROM entries WHERE bucket = ?1",
                    params![name],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )?;
                Ok(BucketUsage { name, entries: entries as u64, total_bytes: total_bytes as u64 })
            })
            .await
            .map_err(Error::from)
    }
}
