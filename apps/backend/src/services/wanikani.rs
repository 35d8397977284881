//! WaniKani API client.
//!
//! Authenticated GETs, cursor pagination and failure classification. The
//! client never touches the cache; callers persist what it returns.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::config::AppConfig;
use wanikani_core::{
    AssignmentStatus, ContextSentence, Profile, ReviewQueueEntry, SrsStage, SubjectDetail,
    SubjectKind, SubjectSummary,
};

/// Upstream errors.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("WANIKANI_API_TOKEN not set in environment")]
    Auth,

    #[error("WaniKani API error: {status}")]
    Http { status: u16 },

    #[error("Network error: {0}")]
    Network(String),

    #[error("Unexpected response: {0}")]
    Decode(String),
}

impl UpstreamError {
    /// True when the provider answered "too many requests".
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::Http { status } if *status == StatusCode::TOO_MANY_REQUESTS.as_u16())
    }

    fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) => true,
            Self::Http { status } => *status >= 500,
            Self::Auth | Self::Decode(_) => false,
        }
    }
}

/// How many times a failed request is attempted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    /// Single attempt. Failures go straight back to the caller.
    pub const fn none() -> Self {
        Self {
            max_attempts: 1,
            backoff: Duration::ZERO,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

// === Wire Types ===

#[derive(Debug, Deserialize)]
struct Resource<T> {
    id: i64,
    object: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct Collection<T> {
    #[serde(default)]
    pages: Pages,
    data: Vec<T>,
}

#[derive(Debug, Default, Deserialize)]
struct Pages {
    next_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserData {
    username: String,
    level: i64,
    #[serde(default)]
    profile_url: String,
    subscription: Subscription,
}

#[derive(Debug, Deserialize)]
struct Subscription {
    max_level_granted: i64,
}

#[derive(Debug, Deserialize)]
struct AssignmentData {
    subject_id: i64,
    subject_type: String,
    srs_stage: i64,
    available_at: Option<DateTime<Utc>>,
    unlocked_at: Option<DateTime<Utc>>,
    started_at: Option<DateTime<Utc>>,
    passed_at: Option<DateTime<Utc>>,
    burned_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct Meaning {
    meaning: String,
}

#[derive(Debug, Deserialize)]
struct Reading {
    reading: String,
}

#[derive(Debug, Deserialize)]
struct SubjectData {
    level: i64,
    characters: Option<String>,
    slug: Option<String>,
    #[serde(default)]
    meanings: Vec<Meaning>,
    #[serde(default)]
    readings: Option<Vec<Reading>>,
    #[serde(default)]
    component_subject_ids: Vec<i64>,
    #[serde(default)]
    amalgamation_subject_ids: Vec<i64>,
    meaning_mnemonic: Option<String>,
    meaning_hint: Option<String>,
    reading_mnemonic: Option<String>,
    reading_hint: Option<String>,
    #[serde(default)]
    context_sentences: Vec<ContextSentence>,
    #[serde(default)]
    parts_of_speech: Vec<String>,
}

impl SubjectData {
    fn characters(&self) -> String {
        self.characters
            .clone()
            .or_else(|| self.slug.clone())
            .unwrap_or_default()
    }

    fn meanings(&self) -> Vec<String> {
        self.meanings.iter().map(|m| m.meaning.clone()).collect()
    }

    fn readings(&self) -> Vec<String> {
        self.readings
            .as_deref()
            .unwrap_or_default()
            .iter()
            .map(|r| r.reading.clone())
            .collect()
    }
}

fn parse_kind(object: &str) -> Result<SubjectKind, UpstreamError> {
    object
        .parse()
        .map_err(|e: wanikani_core::CoreError| UpstreamError::Decode(e.to_string()))
}

fn parse_stage(stage: i64) -> Result<SrsStage, UpstreamError> {
    SrsStage::try_from(stage).map_err(|e| UpstreamError::Decode(e.to_string()))
}

impl Resource<SubjectData> {
    fn into_summary(self) -> Result<SubjectSummary, UpstreamError> {
        Ok(SubjectSummary {
            id: self.id,
            kind: parse_kind(&self.object)?,
            level: self.data.level,
            characters: self.data.characters(),
            meanings: self.data.meanings(),
            readings: self.data.readings(),
            srs_stage: None,
            fetched_at: None,
        })
    }

    fn into_detail(self) -> Result<SubjectDetail, UpstreamError> {
        let kind = parse_kind(&self.object)?;
        let characters = self.data.characters();
        let meanings = self.data.meanings();
        let readings = self.data.readings();
        let data = self.data;
        Ok(SubjectDetail {
            id: self.id,
            kind,
            level: data.level,
            characters,
            meanings,
            readings,
            component_subject_ids: data.component_subject_ids,
            amalgamation_subject_ids: data.amalgamation_subject_ids,
            meaning_mnemonic: data.meaning_mnemonic.unwrap_or_default(),
            meaning_hint: data.meaning_hint.unwrap_or_default(),
            reading_mnemonic: data.reading_mnemonic.unwrap_or_default(),
            reading_hint: data.reading_hint.unwrap_or_default(),
            context_sentences: data.context_sentences,
            parts_of_speech: data.parts_of_speech,
            fetched_at: None,
        })
    }
}

/// Client for the WaniKani v2 API.
#[derive(Debug, Clone)]
pub struct WaniKaniClient {
    client: Client,
    base_url: String,
    token: Option<String>,
    revision: String,
    retry: RetryPolicy,
    assignment_chunk_size: usize,
}

impl WaniKaniClient {
    /// Create a client from service configuration.
    pub fn new(config: &AppConfig) -> Result<Self, UpstreamError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| UpstreamError::Network(e.to_string()))?;
        Ok(Self::with_http_client(client, config))
    }

    /// Create a client around an already configured HTTP client.
    pub fn with_http_client(client: Client, config: &AppConfig) -> Self {
        Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.api_token.clone(),
            revision: config.api_revision.clone(),
            retry: RetryPolicy::none(),
            assignment_chunk_size: config.assignment_chunk_size.max(1),
        }
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn has_credential(&self) -> bool {
        self.token.is_some()
    }

    fn url_for(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}{}", self.base_url, path)
        }
    }

    /// GET one resource. `path` is relative to the API base or an absolute URL.
    pub async fn fetch_resource<T: DeserializeOwned>(&self, path: &str) -> Result<T, UpstreamError> {
        let token = self.token.as_deref().ok_or(UpstreamError::Auth)?;
        let url = self.url_for(path);

        let mut attempt = 1;
        loop {
            match self.get_once(&url, token).await {
                Err(e) if attempt < self.retry.max_attempts && e.is_retryable() => {
                    tracing::debug!(%url, attempt, error = %e, "retrying upstream request");
                    attempt += 1;
                    tokio::time::sleep(self.retry.backoff).await;
                }
                result => return result,
            }
        }
    }

    async fn get_once<T: DeserializeOwned>(&self, url: &str, token: &str) -> Result<T, UpstreamError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(token)
            .header("Wanikani-Revision", &self.revision)
            .send()
            .await
            .map_err(|e| UpstreamError::Network(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(UpstreamError::Http {
                status: resp.status().as_u16(),
            });
        }

        resp.json()
            .await
            .map_err(|e| UpstreamError::Decode(e.to_string()))
    }

    /// GET a collection, following `pages.next_url` until it runs out.
    pub async fn fetch_paginated<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, UpstreamError> {
        let mut items = Vec::new();
        let mut next = Some(path.to_string());

        while let Some(page) = next {
            let collection: Collection<T> = self.fetch_resource(&page).await?;
            items.extend(collection.data);
            next = collection.pages.next_url;
        }

        Ok(items)
    }

    /// Fetch the learner profile.
    pub async fn fetch_profile(&self) -> Result<Profile, UpstreamError> {
        let user: Resource<UserData> = self.fetch_resource("/user").await?;
        Ok(Profile {
            username: user.data.username,
            level: user.data.level,
            max_level: user.data.subscription.max_level_granted,
            profile_url: user.data.profile_url,
            fetched_at: None,
        })
    }

    /// Fetch every assignment that is available for review right now.
    pub async fn fetch_review_queue(&self) -> Result<Vec<ReviewQueueEntry>, UpstreamError> {
        let assignments: Vec<Resource<AssignmentData>> = self
            .fetch_paginated("/assignments?immediately_available_for_review=true")
            .await?;

        assignments
            .into_iter()
            .map(|a| {
                Ok(ReviewQueueEntry {
                    assignment_id: a.id,
                    subject_id: a.data.subject_id,
                    subject_type: parse_kind(&a.data.subject_type)?,
                    srs_stage: parse_stage(a.data.srs_stage)?,
                    available_at: a.data.available_at,
                    fetched_at: None,
                })
            })
            .collect()
    }

    /// Fetch subject summaries for the given levels, optionally narrowed by kind.
    pub async fn fetch_subjects_by_levels(
        &self,
        levels: &[i64],
        kinds: &[SubjectKind],
    ) -> Result<Vec<SubjectSummary>, UpstreamError> {
        let mut path = format!("/subjects?levels={}", join(levels));
        if !kinds.is_empty() {
            path.push_str("&types=");
            path.push_str(&join(kinds));
        }

        let subjects: Vec<Resource<SubjectData>> = self.fetch_paginated(&path).await?;
        subjects.into_iter().map(Resource::into_summary).collect()
    }

    /// Look up assignment progress for `subject_ids`, keyed by subject id.
    ///
    /// Ids are sent in chunks no larger than the configured ceiling and each
    /// chunk is paginated on its own.
    pub async fn fetch_assignments_for_subjects(
        &self,
        subject_ids: &[i64],
    ) -> Result<HashMap<i64, AssignmentStatus>, UpstreamError> {
        let mut statuses = HashMap::new();

        for chunk in subject_ids.chunks(self.assignment_chunk_size) {
            let path = format!("/assignments?subject_ids={}", join(chunk));
            let assignments: Vec<Resource<AssignmentData>> = self.fetch_paginated(&path).await?;

            for a in assignments {
                statuses.insert(
                    a.data.subject_id,
                    AssignmentStatus {
                        srs_stage: Some(parse_stage(a.data.srs_stage)?),
                        unlocked_at: a.data.unlocked_at,
                        started_at: a.data.started_at,
                        passed_at: a.data.passed_at,
                        burned_at: a.data.burned_at,
                    },
                );
            }
        }

        Ok(statuses)
    }

    /// Fetch the full record for one subject.
    pub async fn fetch_subject_detail(&self, id: i64) -> Result<SubjectDetail, UpstreamError> {
        let subject: Resource<SubjectData> = self.fetch_resource(&format!("/subjects/{id}")).await?;
        subject.into_detail()
    }
}

fn join<T: ToString>(items: &[T]) -> String {
    items
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
