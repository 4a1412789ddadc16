//! Edge cache client.
//!
//! This crate provides the network fetch pipeline (with request coalescing)
//! and the cache manager that serves intercepted requests from buckets.

pub mod fetch;
pub mod manager;

#[cfg(test)]
mod testing;

pub use fetch::{DedupFetcher, FetchConfig, FetchError, Fetcher, HttpFetcher, UrlError, resolve};
pub use manager::{
    ActivateReport, CacheManager, GovernorConfig, InstallReport, Interception, LifecycleState, MessageOutcome,
    SweepReport,
};
