//! Cache policy: bucket categories, their max ages, versioned bucket names
//! and the request classifier.

pub mod classify;

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

pub use classify::{Classifier, Route};

use crate::Error;

/// A bucket partition. One live bucket per category per version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Precache,
    Runtime,
    Images,
    Fonts,
    Api,
    Cdn,
}

impl Category {
    pub const ALL: [Category; 6] =
        [Category::Precache, Category::Runtime, Category::Images, Category::Fonts, Category::Api, Category::Cdn];

    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Precache => "precache",
            Category::Runtime => "runtime",
            Category::Images => "images",
            Category::Fonts => "fonts",
            Category::Api => "api",
            Category::Cdn => "cdn",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Category::ALL
            .into_iter()
            .find(|c| c.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| Error::InvalidInput(format!("unknown bucket category: {s}")))
    }
}

/// Max ages for the categories that have one. Everything else never expires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TtlTable {
    pub images: Duration,
    /// Advisory only: API fallbacks are served regardless of age.
    pub api: Duration,
}

impl Default for TtlTable {
    fn default() -> Self {
        Self { images: Duration::days(30), api: Duration::hours(1) }
    }
}

impl TtlTable {
    /// Max age for `category`, `None` when unbounded.
    pub fn max_age(&self, category: Category) -> Option<Duration> {
        match category {
            Category::Images => Some(self.images),
            Category::Api => Some(self.api),
            Category::Precache | Category::Runtime | Category::Fonts | Category::Cdn => None,
        }
    }

    /// Max age checked on the read path. The API max age is not.
    pub fn enforced_max_age(&self, category: Category) -> Option<Duration> {
        match category {
            Category::Api => None,
            other => self.max_age(other),
        }
    }
}

/// `now - stored_at < ttl`. Entries dated in the future are fresh.
pub fn is_fresh(stored_at: DateTime<Utc>, ttl: Duration, now: DateTime<Utc>) -> bool {
    now.signed_duration_since(stored_at) < ttl
}

/// Names buckets `{prefix}-{category}-{version}` and recognises stale ones.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BucketNamer {
    prefix: String,
    version: String,
}

impl BucketNamer {
    pub fn new(prefix: impl Into<String>, version: impl Into<String>) -> Self {
        Self { prefix: prefix.into(), version: version.into() }
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn name(&self, category: Category) -> String {
        format!("{}-{}-{}", self.prefix, category, self.version)
    }

    /// All live bucket names for the current version.
    pub fn live_names(&self) -> Vec<String> {
        Category::ALL.iter().map(|c| self.name(*c)).collect()
    }

    /// Owned by this cache (carries the prefix) but tagged with another version.
    pub fn is_stale(&self, name: &str) -> bool {
        let owned = name
            .strip_prefix(&self.prefix)
            .is_some_and(|rest| rest.starts_with('-'));
        owned && !name.ends_with(&format!("-{}", self.version))
    }
}
