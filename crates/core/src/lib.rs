//! Core types and shared functionality for edge-cache.
//!
//! This crate provides:
//! - Bucket store with SQLite backend
//! - Request classification and the per-category TTL table
//! - Unified error types
//! - Configuration structures

pub mod cache;
pub mod config;
pub mod error;
pub mod http;
pub mod message;
pub mod policy;

pub use cache::{BucketUsage, CacheEntry, CacheStore};
pub use config::{AppConfig, ConfigError};
pub use error::Error;
pub use http::{CacheRequest, Response};
pub use message::{Broadcast, ClientMessage};
pub use policy::{BucketNamer, Category, Classifier, Route, TtlTable};
