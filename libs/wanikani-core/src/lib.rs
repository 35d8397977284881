//! Core library shared by the WaniKani cache service.
//!
//! Provides:
//! - Subject kinds and the SRS stage domain
//! - Cached record types (profile, review queue, subject summary and detail)
//! - Freshness policy for cached data
//! - Filter corpus projection over cached subjects

pub mod corpus;
pub mod error;
pub mod freshness;
pub mod types;

pub use corpus::{part_of_speech_vocabulary, project, CorpusRow, FilterCriteria, PosFilter};
pub use error::{CoreError, Result};
pub use freshness::{is_fresh, CacheKind};
pub use types::{
    AssignmentStatus, ContextSentence, Profile, ReviewQueueEntry, SrsBucket, SrsStage,
    SubjectDetail, SubjectKind, SubjectSummary,
};
