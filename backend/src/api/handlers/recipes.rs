//! Recipe handlers, including favorites, shopping cart and the shopping
//! list download.

use axum::{
    extract::{Extension, OriginalUri, Path, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use utoipa::{IntoParams, OpenApi};

use crate::api::dto::{Page, PaginationQuery};
use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::{AppError, Result};
use crate::models::recipe::RecipeIngredientLine;
use crate::services::recipe_service::{
    IngredientAmount, RecipeDetail, RecipeFilter, RecipeList, RecipeShort, RecipeWrite,
};
use crate::services::shopping_list_service::{render_shopping_list, shopping_list_filename};

pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/recipes/", get(list_recipes).post(create_recipe))
        .route("/api/recipes/download_shopping_cart/", get(download_shopping_cart))
        .route(
            "/api/recipes/:id/",
            get(get_recipe).patch(update_recipe).delete(delete_recipe),
        )
        .route(
            "/api/recipes/:id/favorite/",
            axum::routing::post(add_favorite).delete(remove_favorite),
        )
        .route(
            "/api/recipes/:id/shopping_cart/",
            axum::routing::post(add_to_cart).delete(remove_from_cart),
        )
}

/// Recipe list query. `tags` may repeat.
#[derive(Debug, Default, PartialEq, Eq, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipeListQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Author ID
    pub author: Option<i64>,
    /// Tag slugs; recipes with any of them match
    pub tags: Vec<String>,
    /// `1` to list only the caller's favorites
    pub is_favorited: Option<bool>,
    /// `1` to list only recipes in the caller's cart
    pub is_in_shopping_cart: Option<bool>,
}

fn parse_flag(field: &str, value: &str) -> Result<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" => Ok(true),
        "0" | "false" | "" => Ok(false),
        _ => Err(AppError::field(field, "Expected 0 or 1.")),
    }
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| AppError::field(field, "A valid integer is required."))
}

impl RecipeListQuery {
    pub fn parse(raw: Option<&str>) -> Result<Self> {
        let pairs: Vec<(String, String)> = serde_urlencoded::from_str(raw.unwrap_or(""))
            .map_err(|e| AppError::Validation(format!("Malformed query string: {}", e)))?;
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "page" => query.page = Some(parse_number("page", &value)?),
                "limit" => query.limit = Some(parse_number("limit", &value)?),
                "author" => query.author = Some(parse_number("author", &value)?),
                "tags" => {
                    let slug = value.trim();
                    if !slug.is_empty() {
                        query.tags.push(slug.to_string());
                    }
                }
                "is_favorited" => query.is_favorited = Some(parse_flag("is_favorited", &value)?),
                "is_in_shopping_cart" => {
                    query.is_in_shopping_cart = Some(parse_flag("is_in_shopping_cart", &value)?)
                }
                _ => {}
            }
        }
        Ok(query)
    }

    fn filter(&self) -> RecipeFilter {
        RecipeFilter {
            author: self.author,
            tags: self.tags.clone(),
            is_favorited: self.is_favorited.unwrap_or(false),
            is_in_shopping_cart: self.is_in_shopping_cart.unwrap_or(false),
        }
    }
}

/// List recipes, newest first
#[utoipa::path(
    get,
    path = "/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(RecipeListQuery),
    responses(
        (status = 200, description = "Page of recipes", body = Page<RecipeDetail>),
        (status = 400, description = "Malformed filter"),
    )
)]
pub async fn list_recipes(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    OriginalUri(uri): OriginalUri,
    RawQuery(raw): RawQuery,
) -> Result<Json<Page<RecipeDetail>>> {
    let query = RecipeListQuery::parse(raw.as_deref())?;
    let page = state.page_params(&PaginationQuery {
        page: query.page,
        limit: query.limit,
    });
    let (recipes, total) = state
        .recipes()
        .list(auth.map(|a| a.user_id), &query.filter(), page)
        .await?;
    Ok(Json(Page::new(recipes, total, page, &uri)))
}

/// Publish a recipe
#[utoipa::path(
    post,
    path = "/",
    context_path = "/api/recipes",
    tag = "recipes",
    request_body = RecipeWrite,
    responses(
        (status = 201, description = "Recipe created", body = RecipeDetail),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn create_recipe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Json(payload): Json<RecipeWrite>,
) -> Result<(StatusCode, Json<RecipeDetail>)> {
    let auth = require_auth(auth)?;
    let recipe = state.recipes().create(auth.user_id, &payload).await?;
    Ok((StatusCode::CREATED, Json(recipe)))
}

/// Get a recipe
#[utoipa::path(
    get,
    path = "/{id}/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 200, description = "Recipe", body = RecipeDetail),
        (status = 404, description = "Recipe not found"),
    )
)]
pub async fn get_recipe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<Json<RecipeDetail>> {
    Ok(Json(state.recipes().get(auth.map(|a| a.user_id), id).await?))
}

/// Update a recipe (author or staff)
#[utoipa::path(
    patch,
    path = "/{id}/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    request_body = RecipeWrite,
    responses(
        (status = 200, description = "Recipe updated", body = RecipeDetail),
        (status = 400, description = "Validation error"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn update_recipe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
    Json(payload): Json<RecipeWrite>,
) -> Result<Json<RecipeDetail>> {
    let auth = require_auth(auth)?;
    let recipe = state
        .recipes()
        .update(id, auth.user_id, auth.is_staff, &payload)
        .await?;
    Ok(Json(recipe))
}

/// Delete a recipe (author or staff)
#[utoipa::path(
    delete,
    path = "/{id}/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Recipe deleted"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not the author"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn delete_recipe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let auth = require_auth(auth)?;
    state.recipes().delete(id, auth.user_id, auth.is_staff).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn add_to(
    state: &SharedState,
    auth: Option<AuthExtension>,
    list: RecipeList,
    id: i64,
) -> Result<(StatusCode, Json<RecipeShort>)> {
    let auth = require_auth(auth)?;
    let short = state.recipes().add_to_list(list, auth.user_id, id).await?;
    Ok((StatusCode::CREATED, Json(short)))
}

async fn remove_from(
    state: &SharedState,
    auth: Option<AuthExtension>,
    list: RecipeList,
    id: i64,
) -> Result<StatusCode> {
    let auth = require_auth(auth)?;
    state.recipes().remove_from_list(list, auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Add a recipe to favorites
#[utoipa::path(
    post,
    path = "/{id}/favorite/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShort),
        (status = 400, description = "Already in favorites"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn add_favorite(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>)> {
    add_to(&state, auth, RecipeList::Favorites, id).await
}

/// Remove a recipe from favorites
#[utoipa::path(
    delete,
    path = "/{id}/favorite/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in favorites"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn remove_favorite(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    remove_from(&state, auth, RecipeList::Favorites, id).await
}

/// Add a recipe to the shopping cart
#[utoipa::path(
    post,
    path = "/{id}/shopping_cart/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 201, description = "Added", body = RecipeShort),
        (status = 400, description = "Already in the cart"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn add_to_cart(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<(StatusCode, Json<RecipeShort>)> {
    add_to(&state, auth, RecipeList::ShoppingCart, id).await
}

/// Remove a recipe from the shopping cart
#[utoipa::path(
    delete,
    path = "/{id}/shopping_cart/",
    context_path = "/api/recipes",
    tag = "recipes",
    params(("id" = i64, Path, description = "Recipe ID")),
    responses(
        (status = 204, description = "Removed"),
        (status = 400, description = "Not in the cart"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Recipe not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn remove_from_cart(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    remove_from(&state, auth, RecipeList::ShoppingCart, id).await
}

/// Download the aggregated shopping list as plain text
#[utoipa::path(
    get,
    path = "/download_shopping_cart/",
    context_path = "/api/recipes",
    tag = "recipes",
    responses(
        (status = 200, description = "Shopping list attachment", body = String, content_type = "text/plain"),
        (status = 400, description = "Shopping cart is empty"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn download_shopping_cart(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
) -> Result<Response> {
    let auth = require_auth(auth)?;
    let lines = state.shopping_list().aggregate(auth.user_id).await?;
    let body = render_shopping_list(&auth.full_name, chrono::Local::now().date_naive(), &lines);
    let disposition = format!(
        "attachment; filename=\"{}\"",
        shopping_list_filename(&auth.username)
    );

    Ok((
        [
            (header::CONTENT_TYPE, "text/plain; charset=utf-8".to_string()),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        body,
    )
        .into_response())
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_recipes,
        create_recipe,
        get_recipe,
        update_recipe,
        delete_recipe,
        add_favorite,
        remove_favorite,
        add_to_cart,
        remove_from_cart,
        download_shopping_cart,
    ),
    components(schemas(
        RecipeDetail,
        RecipeShort,
        RecipeWrite,
        IngredientAmount,
        RecipeIngredientLine,
    ))
)]
pub struct RecipesApiDoc;
