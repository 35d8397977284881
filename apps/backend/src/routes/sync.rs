//! Sync endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::*;
use crate::services::cache;
use crate::AppState;

/// POST /api/sync
/// Invalidate profile, review queue and subject summaries
pub async fn force(State(state): State<AppState>) -> Result<Json<SyncResponse>> {
    cache::force_resync(&state.db).await?;
    Ok(Json(SyncResponse {
        message: "Cache cleared, next request will fetch fresh data".to_string(),
    }))
}
