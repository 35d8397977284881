//! Cache-or-fetch for the simple collections: profile, review queue and
//! subject summaries.
//!
//! Each read consults the store first and only calls upstream when the cached
//! data is missing or stale. Any upstream failure goes straight back to the
//! caller; nothing here retries.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::db::{Database, Invalidation};
use crate::error::Result;
use crate::models::{Profile, ReviewQueueEntry, Source, SubjectKind, SubjectSummary};
use crate::services::wanikani::WaniKaniClient;
use wanikani_core::{is_fresh, CacheKind};

/// Data together with where it came from.
#[derive(Debug)]
pub struct Fetched<T> {
    pub source: Source,
    pub data: T,
}

impl<T> Fetched<T> {
    fn cache(data: T) -> Self {
        Self {
            source: Source::Cache,
            data,
        }
    }

    fn api(data: T) -> Self {
        Self {
            source: Source::Api,
            data,
        }
    }
}

/// Learner profile, refreshed when older than the profile window.
pub async fn profile(db: &Database, client: &WaniKaniClient) -> Result<Fetched<Profile>> {
    let now = Utc::now();

    if let Some(cached) = db.get_profile().await? {
        if is_fresh(CacheKind::Profile, cached.fetched_at, now) {
            tracing::debug!("profile served from cache");
            return Ok(Fetched::cache(cached));
        }
    }

    let mut fresh = client.fetch_profile().await?;
    fresh.fetched_at = Some(now);
    db.upsert_profile(&fresh).await?;

    tracing::info!(username = %fresh.username, level = fresh.level, "profile refreshed");
    Ok(Fetched::api(fresh))
}

/// Reviews available now. A refresh replaces the whole snapshot.
pub async fn review_queue(
    db: &Database,
    client: &WaniKaniClient,
) -> Result<Fetched<Vec<ReviewQueueEntry>>> {
    let now = Utc::now();

    let cached = db.list_review_queue().await?;
    if all_fresh(CacheKind::ReviewQueue, cached.iter().map(|r| r.fetched_at), now) {
        tracing::debug!(count = cached.len(), "review queue served from cache");
        return Ok(Fetched::cache(cached));
    }

    let mut entries = client.fetch_review_queue().await?;
    for entry in &mut entries {
        entry.fetched_at = Some(now);
    }
    db.replace_review_queue(&entries).await?;

    tracing::info!(count = entries.len(), "review queue refreshed");
    Ok(Fetched::api(db.list_review_queue().await?))
}

/// Subject summaries for `levels`, narrowed to `kinds` when non-empty.
///
/// The cache answers only when the result is non-empty and nothing in it is
/// stale. Without a kind filter every requested level must also be present;
/// with one, a level may legitimately have no subjects of those kinds, so
/// coverage is not checked. Otherwise summaries are
/// fetched, SRS stages resolved through the assignment lookup, and the result
/// persisted.
pub async fn subjects(
    db: &Database,
    client: &WaniKaniClient,
    levels: &[i64],
    kinds: &[SubjectKind],
) -> Result<Fetched<Vec<SubjectSummary>>> {
    let now = Utc::now();

    let cached = db.get_subjects_by_levels(levels, kinds).await?;
    if (!kinds.is_empty() || covers_levels(&cached, levels))
        && all_fresh(CacheKind::SubjectSummary, cached.iter().map(|s| s.fetched_at), now)
    {
        tracing::debug!(count = cached.len(), "subjects served from cache");
        return Ok(Fetched::cache(cached));
    }

    let mut subjects = client.fetch_subjects_by_levels(levels, kinds).await?;
    let ids: Vec<i64> = subjects.iter().map(|s| s.id).collect();
    let assignments = client.fetch_assignments_for_subjects(&ids).await?;

    for subject in &mut subjects {
        subject.srs_stage = assignments.get(&subject.id).and_then(|a| a.srs_stage);
        subject.fetched_at = Some(now);
    }
    db.upsert_subjects(&subjects).await?;

    tracing::info!(
        count = subjects.len(),
        levels = ?levels,
        "subjects refreshed"
    );
    subjects.sort_by_key(|s| (s.level, s.id));
    Ok(Fetched::api(subjects))
}

/// Clear profile, review queue and summary timestamps so the next reads go upstream.
pub async fn force_resync(db: &Database) -> Result<()> {
    for kind in [
        CacheKind::Profile,
        CacheKind::ReviewQueue,
        CacheKind::SubjectSummary,
    ] {
        let cleared = db.invalidate(kind, Invalidation::All).await?;
        tracing::debug!(?kind, cleared, "invalidated");
    }
    tracing::info!("cache invalidated, next requests will fetch fresh data");
    Ok(())
}

/// Non-empty and every timestamp within the window.
fn all_fresh<I>(kind: CacheKind, mut fetched: I, now: DateTime<Utc>) -> bool
where
    I: ExactSizeIterator<Item = Option<DateTime<Utc>>>,
{
    fetched.len() > 0 && fetched.all(|at| is_fresh(kind, at, now))
}

fn covers_levels(subjects: &[SubjectSummary], levels: &[i64]) -> bool {
    let present: BTreeSet<i64> = subjects.iter().map(|s| s.level).collect();
    levels.iter().all(|l| present.contains(l))
}
