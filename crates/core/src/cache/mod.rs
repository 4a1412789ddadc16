//! SQLite-backed bucket store.
//!
//! Named, versioned buckets of request/response pairs with async access via
//! tokio-rusqlite. It supports:
//!
//! - Automatic schema migrations
//! - WAL mode for concurrent access
//! - Cascading bucket deletion
//! - Oldest-first eviction by insertion sequence

pub mod buckets;
pub mod connection;
pub mod entries;
pub mod migrations;

pub use crate::Error;

pub use buckets::BucketUsage;
pub use connection::CacheStore;
pub use entries::CacheEntry;
