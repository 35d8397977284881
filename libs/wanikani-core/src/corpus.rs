//! Filter corpus projection.
//!
//! Builds the filterable view the export layer works from: subject summaries
//! joined with whatever details are cached, narrowed by kind, SRS bucket and
//! part of speech.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{SrsBucket, SubjectDetail, SubjectKind, SubjectSummary};

/// Part-of-speech filter entry. `Untagged` selects details with no tags.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PosFilter {
    Tag(String),
    Untagged,
}

/// Filter criteria. An empty set means "no restriction" for that dimension.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterCriteria {
    #[serde(default)]
    pub kinds: HashSet<SubjectKind>,
    #[serde(default)]
    pub buckets: HashSet<SrsBucket>,
    #[serde(default)]
    pub parts_of_speech: HashSet<PosFilter>,
}

impl FilterCriteria {
    fn admits_pos(&self, detail: Option<&SubjectDetail>) -> bool {
        if self.parts_of_speech.is_empty() {
            return true;
        }
        // Subjects without a cached detail have unknown tags and are kept.
        let Some(detail) = detail else {
            return true;
        };
        if detail.parts_of_speech.is_empty() {
            return self.parts_of_speech.contains(&PosFilter::Untagged);
        }
        detail
            .parts_of_speech
            .iter()
            .any(|pos| self.parts_of_speech.contains(&PosFilter::Tag(pos.clone())))
    }

    pub fn admits(&self, summary: &SubjectSummary, detail: Option<&SubjectDetail>) -> bool {
        (self.kinds.is_empty() || self.kinds.contains(&summary.kind))
            && (self.buckets.is_empty() || self.buckets.contains(&SrsBucket::of(summary.srs_stage)))
            && self.admits_pos(detail)
    }
}

/// One row of the projected corpus.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorpusRow<'a> {
    pub summary: &'a SubjectSummary,
    pub detail: Option<&'a SubjectDetail>,
    pub bucket: SrsBucket,
}

/// Project summaries and cached details through `criteria`, ordered by level then id.
///
/// Library entry point for the export layer; the HTTP service does not call it.
pub fn project<'a>(
    summaries: &'a [SubjectSummary],
    details: &'a [SubjectDetail],
    criteria: &FilterCriteria,
) -> Vec<CorpusRow<'a>> {
    let by_id: HashMap<i64, &SubjectDetail> = details.iter().map(|d| (d.id, d)).collect();

    let mut rows: Vec<CorpusRow<'a>> = summaries
        .iter()
        .filter_map(|summary| {
            let detail = by_id.get(&summary.id).copied();
            criteria.admits(summary, detail).then(|| CorpusRow {
                summary,
                detail,
                bucket: SrsBucket::of(summary.srs_stage),
            })
        })
        .collect();

    rows.sort_by_key(|row| (row.summary.level, row.summary.id));
    rows
}

/// Sorted set of every part-of-speech tag present in `details`.
pub fn part_of_speech_vocabulary(details: &[SubjectDetail]) -> BTreeSet<String> {
    details
        .iter()
        .flat_map(|d| d.parts_of_speech.iter().cloned())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::SrsStage;
    use pretty_assertions::assert_eq;

    fn summary(id: i64, kind: SubjectKind, level: i64, stage: Option<u8>) -> SubjectSummary {
        SubjectSummary {
            id,
            kind,
            level,
            characters: format!("s{id}"),
            meanings: vec![format!("meaning {id}")],
            readings: Vec::new(),
            srs_stage: stage.map(|s| SrsStage::new(s).unwrap()),
            fetched_at: None,
        }
    }

    fn detail(id: i64, pos: &[&str]) -> SubjectDetail {
        SubjectDetail {
            id,
            kind: SubjectKind::Vocabulary,
            level: 1,
            characters: format!("s{id}"),
            meanings: vec![format!("meaning {id}")],
            readings: Vec::new(),
            component_subject_ids: Vec::new(),
            amalgamation_subject_ids: Vec::new(),
            meaning_mnemonic: String::new(),
            meaning_hint: String::new(),
            reading_mnemonic: String::new(),
            reading_hint: String::new(),
            context_sentences: Vec::new(),
            parts_of_speech: pos.iter().map(|p| p.to_string()).collect(),
            fetched_at: None,
        }
    }

    fn ids(rows: &[CorpusRow<'_>]) -> Vec<i64> {
        rows.iter().map(|r| r.summary.id).collect()
    }

    #[test]
    fn empty_criteria_keeps_everything_sorted_by_level() {
        let summaries = vec![
            summary(3, SubjectKind::Vocabulary, 2, None),
            summary(2, SubjectKind::Kanji, 1, Some(1)),
            summary(1, SubjectKind::Radical, 1, Some(9)),
        ];
        let rows = project(&summaries, &[], &FilterCriteria::default());
        assert_eq!(ids(&rows), vec![1, 2, 3]);
    }

    #[test]
    fn filters_by_kind_and_bucket() {
        let summaries = vec![
            summary(1, SubjectKind::Radical, 1, Some(9)),
            summary(2, SubjectKind::Kanji, 1, Some(1)),
            summary(3, SubjectKind::Kanji, 1, None),
        ];
        let criteria = FilterCriteria {
            kinds: [SubjectKind::Kanji].into_iter().collect(),
            buckets: [SrsBucket::Locked].into_iter().collect(),
            ..Default::default()
        };
        let rows = project(&summaries, &[], &criteria);
        assert_eq!(ids(&rows), vec![3]);
        assert_eq!(rows[0].bucket, SrsBucket::Locked);
    }

    #[test]
    fn pos_filter_only_applies_to_subjects_with_details() {
        let summaries = vec![
            summary(1, SubjectKind::Vocabulary, 1, Some(1)),
            summary(2, SubjectKind::Vocabulary, 1, Some(1)),
            summary(3, SubjectKind::Vocabulary, 1, Some(1)),
            summary(4, SubjectKind::Vocabulary, 1, Some(1)),
        ];
        let details = vec![
            detail(1, &["noun"]),
            detail(2, &["godan verb", "transitive verb"]),
            detail(3, &[]),
        ];
        let criteria = FilterCriteria {
            parts_of_speech: [PosFilter::Tag("transitive verb".to_string())]
                .into_iter()
                .collect(),
            ..Default::default()
        };
        let rows = project(&summaries, &details, &criteria);
        assert_eq!(ids(&rows), vec![2, 4]);
        assert!(rows[1].detail.is_none());
    }

    #[test]
    fn untagged_marker_selects_details_without_tags() {
        let summaries = vec![
            summary(1, SubjectKind::Vocabulary, 1, Some(1)),
            summary(3, SubjectKind::Vocabulary, 1, Some(1)),
        ];
        let details = vec![detail(1, &["noun"]), detail(3, &[])];
        let criteria = FilterCriteria {
            parts_of_speech: [PosFilter::Untagged].into_iter().collect(),
            ..Default::default()
        };
        assert_eq!(ids(&project(&summaries, &details, &criteria)), vec![3]);
    }

    #[test]
    fn vocabulary_is_sorted_and_deduplicated() {
        let details = vec![
            detail(1, &["noun", "suru verb"]),
            detail(2, &["noun"]),
            detail(3, &[]),
        ];
        let vocab: Vec<String> = part_of_speech_vocabulary(&details).into_iter().collect();
        assert_eq!(vocab, vec!["noun".to_string(), "suru verb".to_string()]);
    }
}
