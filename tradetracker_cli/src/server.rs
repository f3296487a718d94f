//! HTTP front end over a shared [`PnlService`].

use std::error::Error;
use std::sync::Arc;

use anyhow::Result;
use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use chrono::Utc;
use serde::Deserialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};
use tradetracker_lib::{PnlService, TrackerError};

const DEFAULT_TRADE_DAYS: i64 = 7;

#[derive(Clone)]
pub struct AppState {
    pub service: Arc<PnlService>,
}

#[derive(Debug, Deserialize)]
pub struct TradesQuery {
    pub days: Option<i64>,
}

/// A failed request rendered as `{"error": ..., "causes": [...]}`.
pub struct ApiError(TrackerError);

impl From<TrackerError> for ApiError {
    fn from(e: TrackerError) -> Self {
        Self(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            TrackerError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let mut causes = Vec::new();
        let mut source = self.0.source();
        while let Some(err) = source {
            causes.push(err.to_string());
            source = err.source();
        }
        if status.is_server_error() {
            error!("Request failed: {}", self.0);
        }
        let body = serde_json::json!({ "error": self.0.to_string(), "causes": causes });
        (status, Json(body)).into_response()
    }
}

pub fn router(service: Arc<PnlService>) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/stats", get(stats))
        .route("/api/trades", get(trades))
        .route("/api/update", get(update))
        .route("/api/reset", get(reset))
        .route("/api/debug/history", get(debug_history))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(AppState { service })
}

pub async fn serve(service: Arc<PnlService>, bind: &str) -> Result<()> {
    let app = router(service);
    let listener = tokio::net::TcpListener::bind(bind).await?;
    info!("Serving on http://{}", listener.local_addr()?);
    axum::serve(listener, app).await?;
    Ok(())
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "timestamp": Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "strategy": state.service.strategy(),
        "cache_age_secs": state.service.cache_age().map(|age| age.as_secs()),
        "cache_ttl_secs": state.service.cache_ttl().as_secs(),
    }))
}

async fn stats(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let stats = state.service.stats(Utc::now()).await?;
    Ok(Json(stats))
}

async fn trades(
    State(state): State<AppState>,
    Query(query): Query<TradesQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let days = query.days.unwrap_or(DEFAULT_TRADE_DAYS);
    let closes = state.service.trades(days, Utc::now()).await?;
    Ok(Json(serde_json::json!({
        "days": days,
        "count": closes.len(),
        "trades": closes,
    })))
}

async fn update(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let now = Utc::now();
    state.service.report_at(true, now).await?;
    let stats = state.service.stats(now).await?;
    Ok(Json(stats))
}

async fn reset(State(state): State<AppState>) -> impl IntoResponse {
    state.service.reset();
    Json(serde_json::json!({ "status": "reset" }))
}

async fn debug_history(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    let summary = state.service.history_summary(Utc::now()).await?;
    Ok(Json(summary))
}
