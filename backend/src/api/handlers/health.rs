//! Liveness and readiness endpoints.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde::Serialize;
use utoipa::{OpenApi, ToSchema};

use crate::api::SharedState;

#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ReadinessResponse {
    pub status: &'static str,
    pub database: CheckStatus,
    pub media: CheckStatus,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CheckStatus {
    pub healthy: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl CheckStatus {
    fn ok() -> Self {
        Self {
            healthy: true,
            message: None,
        }
    }

    fn failed(message: String) -> Self {
        Self {
            healthy: false,
            message: Some(message),
        }
    }
}

/// Process is up
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses((status = 200, description = "Alive", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
    })
}

/// Service can take traffic: database reachable, media volume mounted
#[utoipa::path(
    get,
    path = "/ready",
    tag = "health",
    responses(
        (status = 200, description = "Ready", body = ReadinessResponse),
        (status = 503, description = "Not ready", body = ReadinessResponse),
    )
)]
pub async fn readiness_check(State(state): State<SharedState>) -> impl IntoResponse {
    let database = match sqlx::query("SELECT 1").execute(&state.db).await {
        Ok(_) => CheckStatus::ok(),
        Err(e) => CheckStatus::failed(format!("Database unavailable: {}", e)),
    };

    let media = match tokio::fs::metadata(&state.config.media_root).await {
        Ok(meta) if meta.is_dir() => CheckStatus::ok(),
        Ok(_) => CheckStatus::failed("Media root is not a directory".to_string()),
        Err(e) => CheckStatus::failed(format!("Media root unavailable: {}", e)),
    };

    let ready = database.healthy && media.healthy;
    let status = if ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (
        status,
        Json(ReadinessResponse {
            status: if ready { "ready" } else { "not_ready" },
            database,
            media,
        }),
    )
}

#[derive(OpenApi)]
#[openapi(
    paths(health_check, readiness_check),
    components(schemas(HealthResponse, ReadinessResponse, CheckStatus))
)]
pub struct HealthApiDoc;
