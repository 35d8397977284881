//! Review queue endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::*;
use crate::services::cache;
use crate::AppState;

/// GET /api/reviews
pub async fn list(State(state): State<AppState>) -> Result<Json<ReviewQueueResponse>> {
    let fetched = cache::review_queue(&state.db, &state.upstream).await?;
    Ok(Json(ReviewQueueResponse {
        source: fetched.source,
        count: fetched.data.len(),
        data: fetched.data,
    }))
}
