//! Bucket inspection and maintenance tools.

pub mod get;
pub mod stats;
pub mod sweep;

pub use get::{CacheGetParams, get_impl};
pub use stats::stats_impl;
pub use sweep::{CacheSweepParams, sweep_impl};
