//! Tag handlers.

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use utoipa::OpenApi;

use crate::api::middleware::auth::{require_staff, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::tag::Tag;
use crate::services::tag_service::CreateTagRequest;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/tags/", get(list_tags).post(create_tag))
        .route("/api/tags/:id/", get(get_tag))
}

/// List all tags
#[utoipa::path(
    get,
    path = "/",
    context_path = "/api/tags",
    tag = "tags",
    responses((status = 200, description = "All tags", body = Vec<Tag>))
)]
pub async fn list_tags(State(state): State<SharedState>) -> Result<Json<Vec<Tag>>> {
    Ok(Json(state.tags().list().await?))
}

/// Get a tag
#[utoipa::path(
    get,
    path = "/{id}/",
    context_path = "/api/tags",
    tag = "tags",
    params(("id" = i64, Path, description = "Tag ID")),
    responses(
        (status = 200, description = "Tag", body = Tag),
        (status = 404, description = "Tag not found"),
    )
)]
pub async fn get_tag(State(state): State<SharedState>, Path(id): Path<i64>) -> Result<Json<Tag>> {
    Ok(Json(state.tags().get(id).await?))
}

/// Create a tag (staff only)
#[utoipa::path(
    post,
    path = "/",
    context_path = "/api/tags",
    tag = "tags",
    request_body = CreateTagRequest,
    responses(
        (status = 201, description = "Tag created", body = Tag),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Staff access required"),
        (status = 409, description = "Tag already exists"),
    ),
    security(("token_auth" = []))
)]
pub async fn create_tag(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Json(payload): Json<CreateTagRequest>,
) -> Result<(StatusCode, Json<Tag>)> {
    require_staff(auth)?;
    let tag = state.tags().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(tag)))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_tags, get_tag, create_tag),
    components(schemas(Tag, CreateTagRequest))
)]
pub struct TagsApiDoc;
