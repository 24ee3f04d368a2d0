//! Ingredient handlers.

use axum::{
    extract::{Extension, Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use crate::api::middleware::auth::{require_staff, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::models::ingredient::Ingredient;
use crate::services::ingredient_service::CreateIngredientRequest;

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/ingredients/", get(list_ingredients).post(create_ingredient))
        .route("/api/ingredients/:id/", get(get_ingredient))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct IngredientSearchQuery {
    /// Case-insensitive name prefix
    pub name: Option<String>,
}

/// List ingredients, optionally by name prefix
#[utoipa::path(
    get,
    path = "/",
    context_path = "/api/ingredients",
    tag = "ingredients",
    params(IngredientSearchQuery),
    responses((status = 200, description = "Matching ingredients", body = Vec<Ingredient>))
)]
pub async fn list_ingredients(
    State(state): State<SharedState>,
    Query(query): Query<IngredientSearchQuery>,
) -> Result<Json<Vec<Ingredient>>> {
    let ingredients = state.ingredients().search(query.name.as_deref()).await?;
    Ok(Json(ingredients))
}

/// Get an ingredient
#[utoipa::path(
    get,
    path = "/{id}/",
    context_path = "/api/ingredients",
    tag = "ingredients",
    params(("id" = i64, Path, description = "Ingredient ID")),
    responses(
        (status = 200, description = "Ingredient", body = Ingredient),
        (status = 404, description = "Ingredient not found"),
    )
)]
pub async fn get_ingredient(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<Json<Ingredient>> {
    Ok(Json(state.ingredients().get(id).await?))
}

/// Create an ingredient (staff only)
#[utoipa::path(
    post,
    path = "/",
    context_path = "/api/ingredients",
    tag = "ingredients",
    request_body = CreateIngredientRequest,
    responses(
        (status = 201, description = "Ingredient created", body = Ingredient),
        (status = 400, description = "Validation error"),
        (status = 403, description = "Staff access required"),
        (status = 409, description = "Ingredient already exists"),
    ),
    security(("token_auth" = []))
)]
pub async fn create_ingredient(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Json(payload): Json<CreateIngredientRequest>,
) -> Result<(StatusCode, Json<Ingredient>)> {
    require_staff(auth)?;
    let ingredient = state.ingredients().create(&payload).await?;
    Ok((StatusCode::CREATED, Json(ingredient)))
}

#[derive(OpenApi)]
#[openapi(
    paths(list_ingredients, get_ingredient, create_ingredient),
    components(schemas(Ingredient, CreateIngredientRequest))
)]
pub struct IngredientsApiDoc;
