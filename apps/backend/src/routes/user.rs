//! Profile endpoint

use axum::{extract::State, Json};

use crate::error::Result;
use crate::models::*;
use crate::services::cache;
use crate::AppState;

/// GET /api/user
pub async fn get(State(state): State<AppState>) -> Result<Json<ProfileResponse>> {
    let fetched = cache::profile(&state.db, &state.upstream).await?;
    Ok(Json(ProfileResponse {
        source: fetched.source,
        data: fetched.data,
    }))
}
