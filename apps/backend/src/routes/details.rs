//! Subject detail endpoints

use std::time::Duration;

use axum::{
    extract::{Query, State},
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures_util::stream::{Stream, StreamExt};
use tokio_stream::wrappers::ReceiverStream;

use crate::error::Result;
use crate::models::*;
use crate::routes::parse_id_list;
use crate::services::details::DetailEvent;
use crate::AppState;

/// GET /api/subject-details?ids=1,2,3
/// Cached details only, with the ids that are not cached
pub async fn cached(
    State(state): State<AppState>,
    Query(query): Query<SubjectDetailsQuery>,
) -> Result<Json<CachedDetailsResponse>> {
    let ids = parse_id_list(query.ids.as_deref(), "ids")?;
    let mut found = state.db.get_subject_details(&ids).await?;

    let mut data = Vec::with_capacity(found.len());
    let mut missing = Vec::new();
    for id in ids {
        match found.remove(&id) {
            Some(detail) => data.push(detail),
            None if !missing.contains(&id) => missing.push(id),
            None => {}
        }
    }

    Ok(Json(CachedDetailsResponse {
        count: data.len(),
        missing,
        data,
    }))
}

/// GET /api/subject-details/stream?ids=1,2,3&force=false
/// Fetch missing details, reporting progress as server-sent events
pub async fn stream(
    State(state): State<AppState>,
    Query(query): Query<SubjectDetailsQuery>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    let ids = parse_id_list(query.ids.as_deref(), "ids")?;
    let rx = state.details.spawn(&ids, query.force).await?;

    let events = ReceiverStream::new(rx).map(|event| Event::default().json_data(event));

    Ok(Sse::new(events).keep_alive(KeepAlive::new().interval(Duration::from_secs(15))))
}

/// POST /api/subject-details
/// Non-streaming variant: run the batch to the end, then return what is cached
pub async fn fetch(
    State(state): State<AppState>,
    Json(request): Json<FetchDetailsRequest>,
) -> Result<Json<FetchDetailsResponse>> {
    let mut rx = state.details.spawn(&request.ids, request.force).await?;

    let mut fetched = 0;
    let mut cached = 0;
    let mut rate_limited = false;
    let mut errors = Vec::new();
    while let Some(event) = rx.recv().await {
        match event {
            DetailEvent::Start { cached: c, .. } => cached = c,
            DetailEvent::Progress { .. } => fetched += 1,
            DetailEvent::Error { id, message } => errors.push(DetailFailure { id, message }),
            DetailEvent::RateLimit { .. } => rate_limited = true,
            DetailEvent::Complete { .. } => {}
        }
    }

    let mut found = state.db.get_subject_details(&request.ids).await?;
    let mut data = Vec::with_capacity(found.len());
    for id in &request.ids {
        if let Some(detail) = found.remove(id) {
            data.push(detail);
        }
    }

    Ok(Json(FetchDetailsResponse {
        fetched,
        cached,
        rate_limited,
        errors,
        data,
    }))
}
