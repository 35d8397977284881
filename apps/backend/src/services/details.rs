//! Batch subject detail synchronizer.
//!
//! Given a set of subject ids, fetches the ones missing from the cache (or all
//! of them when forced) strictly one at a time with a pause between requests,
//! persists each as it arrives and reports progress through a channel.
//!
//! Event order for one run:
//!
//! ```text
//! start (progress | error)* (complete | rate_limit)?
//! ```
//!
//! A per-id failure produces an `error` event and the batch moves on. A 429
//! from upstream produces `rate_limit` and nothing further is requested. The
//! run also stops quietly if the receiver is dropped.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc;

use crate::db::Database;
use crate::error::{ApiError, Result};
use crate::services::wanikani::{UpstreamError, WaniKaniClient};
use wanikani_core::{is_fresh, CacheKind};

const EVENT_BUFFER: usize = 32;

const RATE_LIMIT_MESSAGE: &str =
    "Rate limited by WaniKani API. Please wait a minute and try again.";

/// Progress message for one synchronization run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DetailEvent {
    Start {
        total: usize,
        cached: usize,
    },
    Progress {
        current: usize,
        total: usize,
        id: i64,
        characters: String,
        parts_of_speech: Vec<String>,
    },
    Error {
        #[serde(skip_serializing_if = "Option::is_none")]
        id: Option<i64>,
        message: String,
    },
    RateLimit {
        message: String,
        fetched: usize,
        remaining: usize,
    },
    Complete {
        fetched: usize,
        cached: usize,
        total: usize,
    },
}

impl DetailEvent {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::RateLimit { .. } | Self::Complete { .. })
    }
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunOutcome {
    Completed,
    RateLimited,
    Cancelled,
    /// The final cache count could not be read.
    Failed,
}

/// The receiver went away.
struct Disconnected;

/// Ids split by cache state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub ids: Vec<i64>,
    pub to_fetch: Vec<i64>,
}

impl Plan {
    pub fn cached(&self) -> usize {
        self.ids.len() - self.to_fetch.len()
    }
}

/// Drives detail fetches for the service.
#[derive(Clone)]
pub struct DetailSynchronizer {
    db: Arc<Database>,
    client: Arc<WaniKaniClient>,
    pacing: Duration,
}

impl DetailSynchronizer {
    pub fn new(db: Arc<Database>, client: Arc<WaniKaniClient>, pacing: Duration) -> Self {
        Self { db, client, pacing }
    }

    /// Deduplicate `ids` and split them into cached and to-fetch.
    ///
    /// Fails before any upstream I/O when `ids` is empty, or when something
    /// must be fetched and no credential is configured.
    pub async fn plan(&self, ids: &[i64], force: bool) -> Result<Plan> {
        let ids = dedup(ids);
        if ids.is_empty() {
            return Err(ApiError::Validation("ids required".to_string()));
        }

        let to_fetch = if force {
            ids.clone()
        } else {
            let now = Utc::now();
            let fetched = self.db.get_detail_fetch_times(&ids).await?;
            ids.iter()
                .copied()
                .filter(|id| {
                    let at = fetched.get(id).copied().flatten();
                    !is_fresh(CacheKind::SubjectDetail, at, now)
                })
                .collect()
        };

        if !to_fetch.is_empty() && !self.client.has_credential() {
            return Err(UpstreamError::Auth.into());
        }

        Ok(Plan { ids, to_fetch })
    }

    /// Plan, then run in a background task. Events arrive on the returned receiver.
    pub async fn spawn(&self, ids: &[i64], force: bool) -> Result<mpsc::Receiver<DetailEvent>> {
        let plan = self.plan(ids, force).await?;
        let (tx, rx) = mpsc::channel(EVENT_BUFFER);

        let this = self.clone();
        tokio::spawn(async move {
            let outcome = this.run(plan, tx).await;
            tracing::debug!(?outcome, "detail synchronization finished");
        });

        Ok(rx)
    }

    /// Execute `plan`, sending events to `tx`.
    pub async fn run(&self, plan: Plan, tx: mpsc::Sender<DetailEvent>) -> RunOutcome {
        match self.execute(&plan, &tx).await {
            Ok(outcome) => outcome,
            Err(Disconnected) => {
                tracing::info!("detail stream closed by client, stopping");
                RunOutcome::Cancelled
            }
        }
    }

    async fn execute(
        &self,
        plan: &Plan,
        tx: &mpsc::Sender<DetailEvent>,
    ) -> std::result::Result<RunOutcome, Disconnected> {
        let total = plan.to_fetch.len();
        let cached = plan.cached();

        emit(tx, DetailEvent::Start { total, cached }).await?;
        tracing::info!(total, cached, "detail synchronization started");

        let mut fetched = 0usize;
        for (index, &id) in plan.to_fetch.iter().enumerate() {
            if index > 0 {
                self.pause(tx).await?;
            }
            if tx.is_closed() {
                return Err(Disconnected);
            }

            let detail = match self.client.fetch_subject_detail(id).await {
                Ok(detail) => detail,
                Err(e) if e.is_rate_limit() => {
                    tracing::warn!(id, fetched, remaining = total - index, "rate limited, aborting batch");
                    emit(
                        tx,
                        DetailEvent::RateLimit {
                            message: RATE_LIMIT_MESSAGE.to_string(),
                            fetched,
                            remaining: total - index,
                        },
                    )
                    .await?;
                    return Ok(RunOutcome::RateLimited);
                }
                Err(e) => {
                    tracing::warn!(id, error = %e, "subject detail fetch failed");
                    emit(tx, error_event(id, e.to_string())).await?;
                    continue;
                }
            };

            let detail = wanikani_core::SubjectDetail {
                fetched_at: Some(Utc::now()),
                ..detail
            };
            if let Err(e) = self.db.upsert_subject_detail(&detail).await {
                tracing::warn!(id, error = %e, "failed to cache subject detail");
                emit(tx, error_event(id, e.to_string())).await?;
                continue;
            }

            fetched += 1;
            emit(
                tx,
                DetailEvent::Progress {
                    current: index + 1,
                    total,
                    id,
                    characters: detail.characters,
                    parts_of_speech: detail.parts_of_speech,
                },
            )
            .await?;
        }

        let event = match self.db.count_subject_details(&plan.ids).await {
            Ok(present) => DetailEvent::Complete {
                fetched,
                cached,
                total: present,
            },
            Err(e) => DetailEvent::Error {
                id: None,
                message: e.to_string(),
            },
        };
        let completed = event.is_terminal();
        emit(tx, event).await?;

        tracing::info!(fetched, cached, "detail synchronization done");
        Ok(if completed {
            RunOutcome::Completed
        } else {
            RunOutcome::Failed
        })
    }

    /// Wait out the pacing delay, returning early if the receiver goes away.
    async fn pause(&self, tx: &mpsc::Sender<DetailEvent>) -> std::result::Result<(), Disconnected> {
        tokio::select! {
            _ = tokio::time::sleep(self.pacing) => Ok(()),
            _ = tx.closed() => Err(Disconnected),
        }
    }
}

fn error_event(id: i64, message: String) -> DetailEvent {
    DetailEvent::Error {
        id: Some(id),
        message,
    }
}

async fn emit(
    tx: &mpsc::Sender<DetailEvent>,
    event: DetailEvent,
) -> std::result::Result<(), Disconnected> {
    tx.send(event).await.map_err(|_| Disconnected)
}

/// Drop repeated ids, keeping first occurrence order.
fn dedup(ids: &[i64]) -> Vec<i64> {
    let mut seen = HashSet::with_capacity(ids.len());
    ids.iter().copied().filter(|id| seen.insert(*id)).collect()
}
