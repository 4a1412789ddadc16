//! Entry operations: store, match, delete and evict cached responses.
//!
//! Each row carries an insertion sequence. Rewriting a URL replaces the row,
//! so the sequence always orders entries by their last write.

use std::collections::BTreeMap;

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio_rusqlite::{params, rusqlite};

use super::connection::CacheStore;
use crate::Error;
use crate::http::Response;

/// A stored request/response pair.
///
/// `stored_at` and `size_bytes` are computed once when the entry is built:
/// the response `date` header (else the store time) and its `content-length`
/// (else zero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct CacheEntry {
    pub bucket: String,
    pub url: String,
    /// Insertion order within the store; 0 until written.
    pub seq: i64,
    pub status: u16,
    pub headers: BTreeMap<String, String>,
    pub size_bytes: u64,
    #[schemars(with = "String")]
    pub stored_at: DateTime<Utc>,
    #[serde(skip)]
    pub body: Bytes,
}

impl CacheEntry {
    pub fn from_response(bucket: &str, url: &str, response: &Response, now: DateTime<Utc>) -> Self {
        Self {
            bucket: bucket.to_string(),
            url: url.to_string(),
            seq: 0,
            status: response.status,
            headers: response.headers.clone(),
            size_bytes: response.content_length().unwrap_or(0),
            stored_at: response.date().unwrap_or(now),
            body: response.body.clone(),
        }
    }

    pub fn to_response(&self) -> Response {
        Response { url: self.url.clone(), status: self.status, headers: self.headers.clone(), body: self.body.clone() }
    }
}

const ENTRY_COLUMNS: &str = "seq, bucket, url, status, headers_json, body, size_bytes, stored_at";

fn entry_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<(CacheEntry, String, String)> {
    let body: Vec<u8> = row.get(5)?;
    let entry = CacheEntry {
        seq: row.get(0)?,
        bucket: row.get(1)?,
        url: row.get(2)?,
        status: row.get(3)?,
        headers: BTreeMap::new(),
        body: Bytes::from(body),
        size_bytes: row.get::<_, i64>(6)? as u64,
        stored_at: DateTime::<Utc>::MIN_UTC,
    };
    Ok((entry, row.get(4)?, row.get(7)?))
}

fn decode_entry((mut entry, headers_json, stored_at): (CacheEntry, String, String)) -> Result<CacheEntry, Error> {
    entry.headers = serde_json::from_str(&headers_json)
        .map_err(|e| Error::CorruptEntry(format!("{} headers: {e}", entry.url)))?;
    entry.stored_at = DateTime::parse_from_rfc3339(&stored_at)
        .map_err(|e| Error::CorruptEntry(format!("{} stored_at: {e}", entry.url)))?
        .with_timezone(&Utc);
    Ok(entry)
}

impl CacheStore {
    /// Store `response` under `url` in `bucket`, creating the bucket if needed.
    pub async fn put(&self, bucket: &str, url: &str, response: &Response) -> Result<CacheEntry, Error> {
        let entry = CacheEntry::from_response(bucket, url, response, Utc::now());
        self.put_entry(&entry).await
    }

    /// Write a prepared entry. Replaces any entry for the same URL, which
    /// then becomes the newest in the bucket.
    pub async fn put_entry(&self, entry: &CacheEntry) -> Result<CacheEntry, Error> {
        let mut entry = entry.clone();
        let headers_json = serde_json::to_string(&entry.headers)
            .map_err(|e| Error::InvalidInput(format!("unserializable headers: {e}")))?;

        let row = entry.clone();
        let seq = self
            .conn
            .call(move |conn| -> Result<i64, Error> {
                let tx = conn.transaction()?;
                tx.execute(
                    "INSERT OR IGNORE INTO buckets (name, created_at) VALUES (?1, ?2)",
                    params![row.bucket, Utc::now().to_rfc3339()],
                )?;
                tx.execute(
                    "INSERT OR REPLACE INTO entries (bucket, url, status, headers_json, body, size_bytes, stored_at)
                    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                    params![
                        row.bucket,
                        row.url,
                        row.status,
                        headers_json,
                        row.body.as_ref(),
                        row.size_bytes as i64,
                        row.stored_at.to_rfc3339(),
                    ],
                )?;
                let seq = tx.last_insert_rowid();
                tx.commit()?;
                Ok(seq)
            })
            .await
            .map_err(Error::from)?;

        entry.seq = seq;
        Ok(entry)
    }

    /// Look up `url` in one bucket.
    pub async fn match_entry(&self, bucket: &str, url: &str) -> Result<Option<CacheEntry>, Error> {
        let bucket = bucket.to_string();
        let url = url.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(CacheEntry, String, String)>, Error> {
                let mut stmt =
                    conn.prepare(&format!("SELECT {ENTRY_COLUMNS} FROM entries WHERE bucket = ?1 AND url = ?2"))?;

                match stmt.query_row(params![bucket, url], entry_from_row) {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_entry).transpose()
    }

    /// Look up `url` across all buckets, oldest bucket first.
    pub async fn match_any(&self, url: &str) -> Result<Option<CacheEntry>, Error> {
        let url = url.to_string();
        let raw = self
            .conn
            .call(move |conn| -> Result<Option<(CacheEntry, String, String)>, Error> {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {ENTRY_COLUMNS} FROM entries e
                    JOIN buckets b ON b.name = e.bucket
                    WHERE e.url = ?1
                    ORDER BY b.rowid ASC
                    LIMIT 1"
                ))?;

                match stmt.query_row(params![url], entry_from_row) {
                    Ok(raw) => Ok(Some(raw)),
                    Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
                    Err(e) => Err(e.into()),
                }
            })
            .await
            .map_err(Error::from)?;

        raw.map(decode_entry).transpose()
    }

    /// Delete one entry. Returns false if it was not stored.
    pub async fn delete_entry(&self, bucket: &str, url: &str) -> Result<bool, Error> {
        let bucket = bucket.to_string();
        let url = url.to_string();
        self.conn
            .call(move |conn| -> Result<bool, Error> {
                let count = conn.execute("DELETE FROM entries WHERE bucket = ?1 AND url = ?2", params![bucket, url])?;
                Ok(count > 0)
            })
            .await
            .map_err(Error::from)
    }

    /// URLs stored in a bucket, oldest write first.
    pub async fn entry_urls(&self, bucket: &str) -> Result<Vec<String>, Error> {
        let bucket = bucket.to_string();
        self.conn
            .call(move |conn| -> Result<Vec<String>, Error> {
                let mut stmt = conn.prepare("SELECT url FROM entries WHERE bucket = ?1 ORDER BY seq ASC")?;
                let urls = stmt
                    .query_map(params![bucket], |row| row.get(0))?
                    .collect::<Result<Vec<String>, _>>()?;
                Ok(urls)
            })
            .await
            .map_err(Error::from)
    }

    /// Delete the `count` oldest entries of a bucket.
    ///
    /// Returns the number of deleted entries.
    pub async fn evict_oldest(&self, bucket: &str, count: u64) -> Result<u64, Error> {
        let bucket = bucket.to_string();
        let limit = count as i64;
        self.conn
            .call(move |conn| -> Result<u64, Error> {
                let deleted = conn.execute(
                    "DELETE FROM entries WHERE seq IN (
                    SELECT seq FROM entries WHERE bucket = ?1 ORDER BY seq ASC LIMIT ?2
                )",
                    params![bucket, limit],
                )?;
                Ok(deleted as u64)
            })
            .await
            .map_err(Error::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn response(url: &str, headers: &[(&str, &str)], body: &'static [u8]) -> Response {
        let headers = headers.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        Response::new(url, 200, headers, Bytes::from_static(body))
    }

    #[tokio::test]
    async fn test_put_and_match() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://example.com/PHTV/logo.webp";
        let stored = store
            .put("phtv-images-v1", url, &response(url, &[("content-length", "4")], b"webp"))
            .await
            .unwrap();
        assert!(stored.seq > 0);

        let entry = store.match_entry("phtv-images-v1", url).await.unwrap().unwrap();
        assert_eq!(entry.size_bytes, 4);
        assert_eq!(entry.body, Bytes::from_static(b"webp"));
        assert_eq!(entry.to_response().header("content-length"), Some("4"));
        assert!(store.has_bucket("phtv-images-v1").await.unwrap());
    }

    #[tokio::test]
    async fn test_match_missing() {
        let store = CacheStore::open_in_memory().await.unwrap();
        assert!(store.match_entry("phtv-images-v1", "https://x/y.png").await.unwrap().is_none());
        assert!(store.match_any("https://x/y.png").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_stored_at_from_date_header() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://example.com/a.png";
        store
            .put("b", url, &response(url, &[("date", "Tue, 15 Nov 1994 08:12:31 GMT")], b""))
            .await
            .unwrap();

        let entry = store.match_entry("b", url).await.unwrap().unwrap();
        assert_eq!(entry.stored_at.to_rfc3339(), "1994-11-15T08:12:31+00:00");
    }

    #[tokio::test]
    async fn test_missing_size_header_counts_zero() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let url = "https://example.com/a.png";
        let entry = store.put("b", url, &response(url, &[], b"twelve bytes")).await.unwrap();
        assert_eq!(entry.size_bytes, 0);
        assert_eq!(store.bucket_usage("b").await.unwrap().total_bytes, 0);
    }

    #[tokio::test]
    async fn test_rewrite_moves_entry_to_newest() {
        let store = CacheStore::open_in_memory().await.unwrap();
        for url in ["https://e/1", "https://e/2", "https://e/1"] {
            store.put("b", url, &response(url, &[], b"x")).await.unwrap();
        }

        assert_eq!(store.entry_urls("b").await.unwrap(), vec!["https://e/2", "https://e/1"]);
    }

    #[tokio::test]
    async fn test_match_any_across_buckets() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.open_bucket("phtv-precache-v1").await.unwrap();
        let url = "https://example.com/PHTV/";
        store.put("phtv-runtime-v1", url, &response(url, &[], b"runtime")).await.unwrap();
        store.put("phtv-precache-v1", url, &response(url, &[], b"precache")).await.unwrap();

        let entry = store.match_any(url).await.unwrap().unwrap();
        assert_eq!(entry.bucket, "phtv-precache-v1");
    }

    #[tokio::test]
    async fn test_delete_entry() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.put("b", "https://e/1", &response("https://e/1", &[], b"x")).await.unwrap();

        assert!(store.delete_entry("b", "https://e/1").await.unwrap());
        assert!(!store.delete_entry("b", "https://e/1").await.unwrap());
    }

    #[tokio::test]
    async fn test_evict_oldest() {
        let store = CacheStore::open_in_memory().await.unwrap();
        for i in 0..5 {
            let url = format!("https://e/{i}");
            store.put("b", &url, &response(&url, &[], b"x")).await.unwrap();
        }
        store.put("other", "https://e/0", &response("https://e/0", &[], b"x")).await.unwrap();

        assert_eq!(store.evict_oldest("b", 2).await.unwrap(), 2);
        assert_eq!(store.entry_urls("b").await.unwrap(), vec!["https://e/2", "https://e/3", "https://e/4"]);
        assert_eq!(store.entry_urls("other").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_bucket_delete_cascades() {
        let store = CacheStore::open_in_memory().await.unwrap();
        store.put("b", "https://e/1", &response("https://e/1", &[], b"x")).await.unwrap();
        store.delete_bucket("b").await.unwrap();

        assert!(store.match_any("https://e/1").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_put_backdated_entry() {
        let store = CacheStore::open_in_memory().await.unwrap();
        let now = Utc::now();
        let mut entry = CacheEntry::from_response("b", "https://e/1", &response("https://e/1", &[], b"x"), now);
        entry.stored_at = now - Duration::days(29);
        store.put_entry(&entry).await.unwrap();

        let read = store.match_entry("b", "https://e/1").await.unwrap().unwrap();
        assert_eq!(read.stored_at.timestamp(), entry.stored_at.timestamp());
    }
}
