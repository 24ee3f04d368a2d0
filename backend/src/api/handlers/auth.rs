//! Token login / logout handlers.

use std::sync::Arc;

use axum::{
    extract::{Extension, State},
    http::StatusCode,
    middleware,
    routing::post,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use utoipa::{OpenApi, ToSchema};

use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::middleware::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::api::SharedState;
use crate::error::Result;

/// Create auth routes; login is rate limited per client address.
pub fn router(login_limiter: Arc<RateLimiter>) -> Router<SharedState> {
    Router::new()
        .route(
            "/api/auth/token/login/",
            post(login).layer(middleware::from_fn_with_state(
                login_limiter,
                rate_limit_middleware,
            )),
        )
        .route("/api/auth/token/logout/", post(logout))
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub auth_token: String,
}

/// Exchange email and password for an auth token
#[utoipa::path(
    post,
    path = "/token/login/",
    context_path = "/api/auth",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Token issued", body = LoginResponse),
        (status = 400, description = "Invalid credentials"),
        (status = 429, description = "Too many attempts"),
    )
)]
pub async fn login(
    State(state): State<SharedState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>> {
    let (_, token) = state
        .auth_service
        .login(&payload.email, &payload.password)
        .await?;
    Ok(Json(LoginResponse { auth_token: token }))
}

/// Revoke the current token
#[utoipa::path(
    post,
    path = "/token/logout/",
    context_path = "/api/auth",
    tag = "auth",
    responses(
        (status = 204, description = "Token revoked"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn logout(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
) -> Result<StatusCode> {
    let auth = require_auth(auth)?;
    state.auth_service.logout(auth.user_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(login, logout),
    components(schemas(LoginRequest, LoginResponse))
)]
pub struct AuthApiDoc;
