pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod routes;
pub mod services;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::AppConfig;
use crate::db::Database;
use crate::services::details::DetailSynchronizer;
use crate::services::wanikani::WaniKaniClient;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<Database>,
    pub upstream: Arc<WaniKaniClient>,
    pub details: DetailSynchronizer,
}

impl AppState {
    pub fn new(db: Arc<Database>, upstream: Arc<WaniKaniClient>, config: &AppConfig) -> Self {
        let details =
            DetailSynchronizer::new(db.clone(), upstream.clone(), config.detail_fetch_delay);
        Self {
            db,
            upstream,
            details,
        }
    }
}

/// Build the full router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/user", get(routes::user::get))
        .route("/api/reviews", get(routes::reviews::list))
        .route("/api/subjects", get(routes::subjects::list))
        .route(
            "/api/subject-details",
            get(routes::details::cached).post(routes::details::fetch),
        )
        .route("/api/subject-details/stream", get(routes::details::stream))
        .route("/api/sync", post(routes::sync::force))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

pub async fn run() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    if config.api_token.is_none() {
        tracing::warn!("WANIKANI_API_TOKEN is not set; upstream requests will fail");
    }

    tracing::info!("Opening cache database...");
    let db = Database::connect(&config.database_url).await?;

    tracing::info!("Running migrations...");
    db.run_migrations().await?;

    let upstream = WaniKaniClient::new(&config)?;
    let state = AppState::new(Arc::new(db), Arc::new(upstream), &config);

    let app = router(state);
    let addr = config.listen_addr();

    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

async fn health_check() -> &'static str {
    "OK"
}
