//! Freshness policy for cached records.
//!
//! Each cached entity kind has a maximum age. Records older than that, or
//! records that were never stamped with a fetch time, must be refreshed from
//! upstream before they are served.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Entity kinds held by the cache store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheKind {
    Profile,
    ReviewQueue,
    SubjectSummary,
    SubjectDetail,
}

impl CacheKind {
    /// Maximum age for this kind. `None` means the record never goes stale on
    /// its own and is only refreshed by an explicit force.
    pub fn max_age(self) -> Option<Duration> {
        match self {
            Self::Profile => Some(Duration::minutes(5)),
            Self::ReviewQueue => Some(Duration::minutes(1)),
            Self::SubjectSummary => Some(Duration::hours(1)),
            Self::SubjectDetail => None,
        }
    }
}

/// Whether a record of `kind` fetched at `fetched_at` may still be served at `now`.
pub fn is_fresh(kind: CacheKind, fetched_at: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
    let Some(fetched_at) = fetched_at else {
        return false;
    };
    match kind.max_age() {
        Some(max_age) => now.signed_duration_since(fetched_at) <= max_age,
        None => true,
    }
}
