//! HTTP health endpoint for container orchestration.
//!
//! `GET /health` checks the message store and answers 200 with the store's
//! report while the store is reachable, 500 otherwise.

use std::sync::Arc;

use anyhow::{Context, Result};
use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use wishengine_store::MessageStore;

/// Body of `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HealthSummary {
    /// `"healthy"` or `"unhealthy"`.
    pub status: &'static str,
    pub api_endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_connected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_status_code: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_response: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl HealthSummary {
    pub fn is_healthy(&self) -> bool {
        self.status == "healthy"
    }
}

/// Check the store once.
///
/// The store counts as healthy whenever it answers at all; the status code
/// it answered with is reported alongside.
pub async fn check(store: &dyn MessageStore) -> HealthSummary {
    match store.health().await {
        Ok(report) => HealthSummary {
            status: "healthy",
            api_endpoint: report.endpoint,
            api_connected: Some(report.connected),
            api_status_code: Some(report.status_code),
            api_response: Some(report.body),
            error: None,
        },
        Err(e) => {
            warn!(endpoint = %store.endpoint(), error = %e, "store health check failed");
            HealthSummary {
                status: "unhealthy",
                api_endpoint: store.endpoint().to_string(),
                api_connected: None,
                api_status_code: None,
                api_response: None,
                error: Some(e.to_string()),
            }
        }
    }
}

async fn health(State(store): State<Arc<dyn MessageStore>>) -> (StatusCode, Json<HealthSummary>) {
    let summary = check(store.as_ref()).await;
    let status = if summary.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };
    (status, Json(summary))
}

/// Router serving `GET /health`.
pub fn router(store: Arc<dyn MessageStore>) -> Router {
    Router::new()
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(store)
}

/// Bind `addr` and serve the health endpoint until the task is dropped.
pub async fn serve(addr: &str, store: Arc<dyn MessageStore>) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health endpoint on {addr}"))?;
    info!(addr = %addr, "health endpoint listening");
    axum::serve(listener, router(store))
        .await
        .context("health endpoint stopped")
}
