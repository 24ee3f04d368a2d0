//! Author subscriptions.

use std::collections::HashMap;

use serde::Serialize;
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;

use crate::api::dto::PageParams;
use crate::error::{AppError, Result};
use crate::services::image_service::media_url;
use crate::services::recipe_service::RecipeShort;

/// An author as seen from the subscriptions page.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AuthorWithRecipes {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_subscribed: bool,
    /// Newest recipes first, limited by `recipes_limit`
    pub recipes: Vec<RecipeShort>,
    pub recipes_count: i64,
}

#[derive(FromRow)]
struct AuthorRow {
    email: String,
    id: i64,
    username: String,
    first_name: String,
    last_name: String,
    is_subscribed: bool,
    recipes_count: i64,
}

#[derive(FromRow)]
struct ShortRow {
    author_id: i64,
    id: i64,
    name: String,
    image: String,
    cooking_time: i16,
}

pub struct SubscriptionService {
    db: PgPool,
}

impl SubscriptionService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Follow `author_id`.
    pub async fn subscribe(
        &self,
        user_id: i64,
        author_id: i64,
        recipes_limit: Option<i64>,
    ) -> Result<AuthorWithRecipes> {
        if user_id == author_id {
            return Err(AppError::Validation(
                "You cannot subscribe to yourself".to_string(),
            ));
        }
        self.ensure_user(author_id).await?;

        let result = sqlx::query(
            r#"
            INSERT INTO subscriptions (user_id, author_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id, author_id) DO NOTHING
            "#,
        )
        .bind(user_id)
        .bind(author_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "You are already subscribed to this author".to_string(),
            ));
        }
        tracing::info!(user_id, author_id, "Subscribed");

        self.load_authors(user_id, &[author_id], recipes_limit)
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Stop following `author_id`.
    pub async fn unsubscribe(&self, user_id: i64, author_id: i64) -> Result<()> {
        self.ensure_user(author_id).await?;
        let result = sqlx::query("DELETE FROM subscriptions WHERE user_id = $1 AND author_id = $2")
            .bind(user_id)
            .bind(author_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(
                "You are not subscribed to this author".to_string(),
            ));
        }
        tracing::info!(user_id, author_id, "Unsubscribed");
        Ok(())
    }

    /// Authors `user_id` follows, most recently followed first.
    pub async fn list(
        &self,
        user_id: i64,
        page: PageParams,
        recipes_limit: Option<i64>,
    ) -> Result<(Vec<AuthorWithRecipes>, i64)> {
        let author_ids: Vec<i64> = sqlx::query_scalar(
            r#"
            SELECT author_id FROM subscriptions
            WHERE user_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT $2 OFFSET $3
            "#,
        )
        .bind(user_id)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM subscriptions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;

        Ok((self.load_authors(user_id, &author_ids, recipes_limit).await?, total))
    }

    async fn ensure_user(&self, id: i64) -> Result<()> {
        let exists: bool = sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM users WHERE id = $1)")
            .bind(id)
            .fetch_one(&self.db)
            .await?;
        if exists {
            Ok(())
        } else {
            Err(AppError::NotFound("User not found".to_string()))
        }
    }

    /// Author views in the order of `author_ids`.
    async fn load_authors(
        &self,
        viewer: i64,
        author_ids: &[i64],
        recipes_limit: Option<i64>,
    ) -> Result<Vec<AuthorWithRecipes>> {
        if author_ids.is_empty() {
            return Ok(Vec::new());
        }

        let rows: Vec<AuthorRow> = sqlx::query_as(
            r#"
            SELECT u.email, u.id, u.username, u.first_name, u.last_name,
                   EXISTS (SELECT 1 FROM subscriptions s
                           WHERE s.user_id = $2 AND s.author_id = u.id) AS is_subscribed,
                   (SELECT COUNT(*) FROM recipes r WHERE r.author_id = u.id) AS recipes_count
            FROM users u
            WHERE u.id = ANY($1)
            "#,
        )
        .bind(author_ids)
        .bind(viewer)
        .fetch_all(&self.db)
        .await?;

        // Negative limits are treated as no limit.
        let limit = recipes_limit.filter(|l| *l >= 0);
        let shorts: Vec<ShortRow> = sqlx::query_as(
            r#"
            SELECT author_id, id, name, image, cooking_time FROM (
                SELECT r.author_id, r.id, r.name, r.image, r.cooking_time,
                       ROW_NUMBER() OVER (PARTITION BY r.author_id
                                          ORDER BY r.pub_date DESC, r.id DESC) AS rn
                FROM recipes r
                WHERE r.author_id = ANY($1)
            ) ranked
            WHERE $2::bigint IS NULL OR rn <= $2
            ORDER BY author_id, rn
            "#,
        )
        .bind(author_ids)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        let mut recipes: HashMap<i64, Vec<RecipeShort>> = HashMap::new();
        for row in shorts {
            recipes.entry(row.author_id).or_default().push(RecipeShort {
                id: row.id,
                name: row.name,
                image: media_url(&row.image),
                cooking_time: row.cooking_time,
            });
        }

        let mut by_id: HashMap<i64, AuthorRow> = rows.into_iter().map(|r| (r.id, r)).collect();
        Ok(author_ids
            .iter()
            .filter_map(|id| by_id.remove(id))
            .map(|row| AuthorWithRecipes {
                recipes: recipes.remove(&row.id).unwrap_or_default(),
                email: row.email,
                id: row.id,
                username: row.username,
                first_name: row.first_name,
                last_name: row.last_name,
                is_subscribed: row.is_subscribed,
                recipes_count: row.recipes_count,
            })
            .collect())
    }
}
