//! Database models and API types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

// Re-export shared types from wanikani-core
pub use wanikani_core::types::{
    AssignmentStatus, ContextSentence, Profile, ReviewQueueEntry, SrsStage, SubjectDetail,
    SubjectKind, SubjectSummary,
};

use crate::error::ApiError;

// === Database Entity Types ===

/// Profile row in SQLite
#[derive(Debug, Clone, FromRow)]
pub struct DbProfile {
    pub username: String,
    pub level: i64,
    pub max_level: i64,
    pub profile_url: String,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl From<DbProfile> for Profile {
    fn from(row: DbProfile) -> Self {
        Profile {
            username: row.username,
            level: row.level,
            max_level: row.max_level,
            profile_url: row.profile_url,
            fetched_at: row.fetched_at,
        }
    }
}

/// Review queue row in SQLite
#[derive(Debug, Clone, FromRow)]
pub struct DbReviewEntry {
    pub assignment_id: i64,
    pub subject_id: i64,
    pub subject_type: String,
    pub srs_stage: i64,
    pub available_at: Option<DateTime<Utc>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbReviewEntry> for ReviewQueueEntry {
    type Error = ApiError;

    fn try_from(row: DbReviewEntry) -> Result<Self, Self::Error> {
        Ok(ReviewQueueEntry {
            assignment_id: row.assignment_id,
            subject_id: row.subject_id,
            subject_type: row.subject_type.parse()?,
            srs_stage: SrsStage::try_from(row.srs_stage)?,
            available_at: row.available_at,
            fetched_at: row.fetched_at,
        })
    }
}

/// Subject summary row in SQLite
#[derive(Debug, Clone, FromRow)]
pub struct DbSubject {
    pub id: i64,
    pub kind: String,
    pub level: i64,
    pub characters: String,
    pub meanings: Json<Vec<String>>,
    pub readings: Json<Vec<String>>,
    pub srs_stage: Option<i64>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbSubject> for SubjectSummary {
    type Error = ApiError;

    fn try_from(row: DbSubject) -> Result<Self, Self::Error> {
        Ok(SubjectSummary {
            id: row.id,
            kind: row.kind.parse()?,
            level: row.level,
            characters: row.characters,
            meanings: row.meanings.0,
            readings: row.readings.0,
            srs_stage: row.srs_stage.map(SrsStage::try_from).transpose()?,
            fetched_at: row.fetched_at,
        })
    }
}

/// Subject detail row in SQLite
#[derive(Debug, Clone, FromRow)]
pub struct DbSubjectDetail {
    pub id: i64,
    pub kind: String,
    pub level: i64,
    pub characters: String,
    pub meanings: Json<Vec<String>>,
    pub readings: Json<Vec<String>>,
    pub component_subject_ids: Json<Vec<i64>>,
    pub amalgamation_subject_ids: Json<Vec<i64>>,
    pub meaning_mnemonic: String,
    pub meaning_hint: String,
    pub reading_mnemonic: String,
    pub reading_hint: String,
    pub context_sentences: Json<Vec<ContextSentence>>,
    pub parts_of_speech: Json<Vec<String>>,
    pub fetched_at: Option<DateTime<Utc>>,
}

impl TryFrom<DbSubjectDetail> for SubjectDetail {
    type Error = ApiError;

    fn try_from(row: DbSubjectDetail) -> Result<Self, Self::Error> {
        Ok(SubjectDetail {
            id: row.id,
            kind: row.kind.parse()?,
            level: row.level,
            characters: row.characters,
            meanings: row.meanings.0,
            readings: row.readings.0,
            component_subject_ids: row.component_subject_ids.0,
            amalgamation_subject_ids: row.amalgamation_subject_ids.0,
            meaning_mnemonic: row.meaning_mnemonic,
            meaning_hint: row.meaning_hint,
            reading_mnemonic: row.reading_mnemonic,
            reading_hint: row.reading_hint,
            context_sentences: row.context_sentences.0,
            parts_of_speech: row.parts_of_speech.0,
            fetched_at: row.fetched_at,
        })
    }
}

// === API Request/Response Types ===

/// Where a response's data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Source {
    Cache,
    Api,
}

/// Response for GET /api/user
#[derive(Debug, Serialize)]
pub struct ProfileResponse {
    pub source: Source,
    pub data: Profile,
}

/// Response for GET /api/reviews
#[derive(Debug, Serialize)]
pub struct ReviewQueueResponse {
    pub source: Source,
    pub count: usize,
    pub data: Vec<ReviewQueueEntry>,
}

/// Query for GET /api/subjects
#[derive(Debug, Deserialize)]
pub struct SubjectsQuery {
    pub levels: Option<String>,
    pub types: Option<String>,
}

/// Subject summary with progress flags derived from its SRS stage
#[derive(Debug, Serialize)]
pub struct SubjectView {
    #[serde(flatten)]
    pub subject: SubjectSummary,
    pub unlocked: bool,
    pub started: bool,
    pub passed: bool,
    pub burned: bool,
}

impl From<SubjectSummary> for SubjectView {
    fn from(subject: SubjectSummary) -> Self {
        Self {
            unlocked: subject.is_unlocked(),
            started: subject.is_started(),
            passed: subject.is_passed(),
            burned: subject.is_burned(),
            subject,
        }
    }
}

/// Response for GET /api/subjects
#[derive(Debug, Serialize)]
pub struct SubjectsResponse {
    pub source: Source,
    pub count: usize,
    pub data: Vec<SubjectView>,
}

/// Query for GET /api/subject-details and its stream
#[derive(Debug, Deserialize)]
pub struct SubjectDetailsQuery {
    pub ids: Option<String>,
    #[serde(default)]
    pub force: bool,
}

/// Response for GET /api/subject-details
#[derive(Debug, Serialize)]
pub struct CachedDetailsResponse {
    pub count: usize,
    pub missing: Vec<i64>,
    pub data: Vec<SubjectDetail>,
}

/// Request for POST /api/subject-details
#[derive(Debug, Deserialize)]
pub struct FetchDetailsRequest {
    #[serde(default)]
    pub ids: Vec<i64>,
    #[serde(default)]
    pub force: bool,
}

/// Per-id failure reported by POST /api/subject-details
#[derive(Debug, Serialize)]
pub struct DetailFailure {
    pub id: Option<i64>,
    pub message: String,
}

/// Response for POST /api/subject-details
#[derive(Debug, Serialize)]
pub struct FetchDetailsResponse {
    pub fetched: usize,
    pub cached: usize,
    pub rate_limited: bool,
    pub errors: Vec<DetailFailure>,
    pub data: Vec<SubjectDetail>,
}

/// Response for POST /api/sync
#[derive(Debug, Serialize)]
pub struct SyncResponse {
    pub message: String,
}
