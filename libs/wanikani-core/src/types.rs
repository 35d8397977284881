//! Core types for cached WaniKani data.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

/// Kind of learnable subject.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubjectKind {
    Radical,
    Kanji,
    Vocabulary,
    KanaVocabulary,
}

impl SubjectKind {
    pub const ALL: [SubjectKind; 4] = [
        Self::Radical,
        Self::Kanji,
        Self::Vocabulary,
        Self::KanaVocabulary,
    ];

    /// Wire name, as used by the upstream API and the cache tables.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Radical => "radical",
            Self::Kanji => "kanji",
            Self::Vocabulary => "vocabulary",
            Self::KanaVocabulary => "kana_vocabulary",
        }
    }
}

impl fmt::Display for SubjectKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubjectKind {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "radical" => Ok(Self::Radical),
            "kanji" => Ok(Self::Kanji),
            "vocabulary" => Ok(Self::Vocabulary),
            "kana_vocabulary" => Ok(Self::KanaVocabulary),
            other => Err(CoreError::UnknownSubjectKind(other.to_string())),
        }
    }
}

/// Spaced repetition stage, 0 (newly available) through 9 (burned).
///
/// A missing stage (`Option::None` wherever this type appears) means the
/// subject is still locked for the learner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "u8")]
pub struct SrsStage(u8);

impl SrsStage {
    pub const MIN: u8 = 0;
    pub const MAX: u8 = 9;
    pub const PASSED: u8 = 5;

    pub fn new(value: u8) -> Result<Self, CoreError> {
        Self::try_from(i64::from(value))
    }

    pub fn value(self) -> u8 {
        self.0
    }

    pub fn is_started(self) -> bool {
        self.0 > Self::MIN
    }

    pub fn is_passed(self) -> bool {
        self.0 >= Self::PASSED
    }

    pub fn is_burned(self) -> bool {
        self.0 == Self::MAX
    }

    pub fn bucket(self) -> SrsBucket {
        match self.0 {
            0 => SrsBucket::Lesson,
            1..=4 => SrsBucket::Apprentice,
            5 | 6 => SrsBucket::Guru,
            7 => SrsBucket::Master,
            8 => SrsBucket::Enlightened,
            _ => SrsBucket::Burned,
        }
    }
}

impl TryFrom<i64> for SrsStage {
    type Error = CoreError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        if (i64::from(Self::MIN)..=i64::from(Self::MAX)).contains(&value) {
            Ok(Self(value as u8))
        } else {
            Err(CoreError::InvalidSrsStage(value))
        }
    }
}

impl From<SrsStage> for u8 {
    fn from(stage: SrsStage) -> Self {
        stage.0
    }
}

impl From<SrsStage> for i64 {
    fn from(stage: SrsStage) -> Self {
        i64::from(stage.0)
    }
}

/// Coarse SRS grouping used for filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SrsBucket {
    Locked,
    Lesson,
    Apprentice,
    Guru,
    Master,
    Enlightened,
    Burned,
}

impl SrsBucket {
    pub fn of(stage: Option<SrsStage>) -> Self {
        stage.map_or(Self::Locked, SrsStage::bucket)
    }
}

/// Cached learner profile. There is only ever one.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    pub username: String,
    pub level: i64,
    pub max_level: i64,
    pub profile_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// One assignment currently available for review.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewQueueEntry {
    pub assignment_id: i64,
    pub subject_id: i64,
    pub subject_type: SubjectKind,
    pub srs_stage: SrsStage,
    pub available_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

/// Summary of a subject, as listed per level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectSummary {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SubjectKind,
    pub level: i64,
    pub characters: String,
    pub meanings: Vec<String>,
    pub readings: Vec<String>,
    pub srs_stage: Option<SrsStage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SubjectSummary {
    pub fn is_unlocked(&self) -> bool {
        self.srs_stage.is_some()
    }

    pub fn is_started(&self) -> bool {
        self.srs_stage.is_some_and(SrsStage::is_started)
    }

    pub fn is_passed(&self) -> bool {
        self.srs_stage.is_some_and(SrsStage::is_passed)
    }

    pub fn is_burned(&self) -> bool {
        self.srs_stage.is_some_and(SrsStage::is_burned)
    }
}

/// Example sentence attached to a vocabulary subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextSentence {
    pub ja: String,
    pub en: String,
}

/// Full subject record, a superset of [`SubjectSummary`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubjectDetail {
    pub id: i64,
    #[serde(rename = "type")]
    pub kind: SubjectKind,
    pub level: i64,
    pub characters: String,
    pub meanings: Vec<String>,
    pub readings: Vec<String>,
    pub component_subject_ids: Vec<i64>,
    pub amalgamation_subject_ids: Vec<i64>,
    pub meaning_mnemonic: String,
    pub meaning_hint: String,
    pub reading_mnemonic: String,
    pub reading_hint: String,
    pub context_sentences: Vec<ContextSentence>,
    pub parts_of_speech: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fetched_at: Option<DateTime<Utc>>,
}

impl SubjectDetail {
    /// True when the summary's shared fields agree with this detail.
    pub fn agrees_with(&self, summary: &SubjectSummary) -> bool {
        self.id == summary.id
            && self.kind == summary.kind
            && self.characters == summary.characters
            && self.meanings == summary.meanings
            && self.readings == summary.readings
    }
}

/// Assignment progress for one subject.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AssignmentStatus {
    pub srs_stage: Option<SrsStage>,
    pub unlocked_at: Option<DateTime<Utc>>,
    pub started_at: Option<DateTime<Utc>>,
    pub passed_at: Option<DateTime<Utc>>,
    pub burned_at: Option<DateTime<Utc>>,
}
