//! User, profile and subscription handlers.

use axum::{
    extract::{Extension, OriginalUri, Path, Query, State},
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use utoipa::{IntoParams, OpenApi};

use crate::api::dto::{Page, PaginationQuery};
use crate::api::middleware::auth::{require_auth, AuthExtension};
use crate::api::SharedState;
use crate::error::Result;
use crate::services::recipe_service::RecipeShort;
use crate::services::subscription_service::AuthorWithRecipes;
use crate::services::user_service::{
    RegisterRequest, RegisteredUser, SetPasswordRequest, UserProfile,
};

/// Create user routes
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/api/users/", get(list_users).post(register))
        .route("/api/users/me/", get(me))
        .route("/api/users/set_password/", post(set_password))
        .route("/api/users/subscriptions/", get(list_subscriptions))
        .route("/api/users/:id/", get(get_user))
        .route("/api/users/:id/subscribe/", post(subscribe).delete(unsubscribe))
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct RecipesLimitQuery {
    /// Maximum recipes listed per author
    pub recipes_limit: Option<i64>,
}

#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct SubscriptionsQuery {
    pub page: Option<u32>,
    pub limit: Option<u32>,
    /// Maximum recipes listed per author
    pub recipes_limit: Option<i64>,
}

/// List users
#[utoipa::path(
    get,
    path = "/",
    context_path = "/api/users",
    tag = "users",
    params(PaginationQuery),
    responses(
        (status = 200, description = "Page of users", body = Page<UserProfile>),
    )
)]
pub async fn list_users(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<PaginationQuery>,
) -> Result<Json<Page<UserProfile>>> {
    let page = state.page_params(&query);
    let viewer = auth.map(|a| a.user_id);
    let (users, total) = state.users().list(viewer, page).await?;
    Ok(Json(Page::new(users, total, page, &uri)))
}

/// Register a new user
#[utoipa::path(
    post,
    path = "/",
    context_path = "/api/users",
    tag = "users",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = RegisteredUser),
        (status = 400, description = "Validation error"),
    )
)]
pub async fn register(
    State(state): State<SharedState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<RegisteredUser>)> {
    let user = state.users().register(payload).await?;
    Ok((StatusCode::CREATED, Json(RegisteredUser::from(user))))
}

/// Get a user profile
#[utoipa::path(
    get,
    path = "/{id}/",
    context_path = "/api/users",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User profile", body = UserProfile),
        (status = 404, description = "User not found"),
    )
)]
pub async fn get_user(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<Json<UserProfile>> {
    let profile = state.users().get_profile(auth.map(|a| a.user_id), id).await?;
    Ok(Json(profile))
}

/// Current user's profile
#[utoipa::path(
    get,
    path = "/me/",
    context_path = "/api/users",
    tag = "users",
    responses(
        (status = 200, description = "Current user", body = UserProfile),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn me(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
) -> Result<Json<UserProfile>> {
    let auth = require_auth(auth)?;
    let profile = state
        .users()
        .get_profile(Some(auth.user_id), auth.user_id)
        .await?;
    Ok(Json(profile))
}

/// Change the current user's password
#[utoipa::path(
    post,
    path = "/set_password/",
    context_path = "/api/users",
    tag = "users",
    request_body = SetPasswordRequest,
    responses(
        (status = 204, description = "Password changed"),
        (status = 400, description = "Wrong current password or invalid new password"),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn set_password(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Json(payload): Json<SetPasswordRequest>,
) -> Result<StatusCode> {
    let auth = require_auth(auth)?;
    state.users().set_password(auth.user_id, &payload).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Authors the current user follows
#[utoipa::path(
    get,
    path = "/subscriptions/",
    context_path = "/api/users",
    tag = "users",
    params(SubscriptionsQuery),
    responses(
        (status = 200, description = "Page of followed authors", body = Page<AuthorWithRecipes>),
        (status = 401, description = "Not authenticated"),
    ),
    security(("token_auth" = []))
)]
pub async fn list_subscriptions(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    OriginalUri(uri): OriginalUri,
    Query(query): Query<SubscriptionsQuery>,
) -> Result<Json<Page<AuthorWithRecipes>>> {
    let auth = require_auth(auth)?;
    let page = state.page_params(&PaginationQuery {
        page: query.page,
        limit: query.limit,
    });
    let (authors, total) = state
        .subscriptions()
        .list(auth.user_id, page, query.recipes_limit)
        .await?;
    Ok(Json(Page::new(authors, total, page, &uri)))
}

/// Follow an author
#[utoipa::path(
    post,
    path = "/{id}/subscribe/",
    context_path = "/api/users",
    tag = "users",
    params(("id" = i64, Path, description = "Author ID"), RecipesLimitQuery),
    responses(
        (status = 201, description = "Subscribed", body = AuthorWithRecipes),
        (status = 400, description = "Self subscription or already subscribed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Author not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn subscribe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
    Query(query): Query<RecipesLimitQuery>,
) -> Result<(StatusCode, Json<AuthorWithRecipes>)> {
    let auth = require_auth(auth)?;
    let author = state
        .subscriptions()
        .subscribe(auth.user_id, id, query.recipes_limit)
        .await?;
    Ok((StatusCode::CREATED, Json(author)))
}

/// Unfollow an author
#[utoipa::path(
    delete,
    path = "/{id}/subscribe/",
    context_path = "/api/users",
    tag = "users",
    params(("id" = i64, Path, description = "Author ID")),
    responses(
        (status = 204, description = "Unsubscribed"),
        (status = 400, description = "Not subscribed"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Author not found"),
    ),
    security(("token_auth" = []))
)]
pub async fn unsubscribe(
    State(state): State<SharedState>,
    Extension(auth): Extension<Option<AuthExtension>>,
    Path(id): Path<i64>,
) -> Result<StatusCode> {
    let auth = require_auth(auth)?;
    state.subscriptions().unsubscribe(auth.user_id, id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[derive(OpenApi)]
#[openapi(
    paths(
        list_users,
        register,
        get_user,
        me,
        set_password,
        list_subscriptions,
        subscribe,
        unsubscribe,
    ),
    components(schemas(
        UserProfile,
        RegisterRequest,
        RegisteredUser,
        SetPasswordRequest,
        AuthorWithRecipes,
        RecipeShort,
    ))
)]
pub struct UsersApiDoc;
