//! Subject summary endpoint

use axum::{
    extract::{Query, State},
    Json,
};

use crate::error::Result;
use crate::models::*;
use crate::routes::parse_id_list;
use crate::services::cache;
use crate::AppState;

/// GET /api/subjects?levels=1,2,3&types=kanji,vocabulary
pub async fn list(
    State(state): State<AppState>,
    Query(query): Query<SubjectsQuery>,
) -> Result<Json<SubjectsResponse>> {
    let levels = parse_id_list(query.levels.as_deref(), "levels")?;
    let kinds = parse_kinds(query.types.as_deref());

    let fetched = cache::subjects(&state.db, &state.upstream, &levels, &kinds).await?;
    Ok(Json(SubjectsResponse {
        source: fetched.source,
        count: fetched.data.len(),
        data: fetched.data.into_iter().map(SubjectView::from).collect(),
    }))
}

/// Known subject kinds from a comma-separated list; unknown names are ignored.
fn parse_kinds(raw: Option<&str>) -> Vec<SubjectKind> {
    let mut kinds: Vec<SubjectKind> = raw
        .unwrap_or_default()
        .split(',')
        .filter_map(|t| t.trim().parse().ok())
        .collect();
    kinds.sort();
    kinds.dedup();
    kinds
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_kinds_ignores_unknown() {
        assert_eq!(
            parse_kinds(Some("vocabulary,grammar,kanji,kanji")),
            vec![SubjectKind::Kanji, SubjectKind::Vocabulary]
        );
        assert!(parse_kinds(None).is_empty());
    }
}
