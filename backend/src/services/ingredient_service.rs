//! Ingredient catalogue with name-prefix search.

use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::error::{AppError, Result};
use crate::models::ingredient::{Ingredient, INGREDIENT_FIELD_MAX};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateIngredientRequest {
    pub name: String,
    pub measurement_unit: String,
}

/// Escape `LIKE` wildcards so user input matches literally.
pub fn like_prefix(input: &str) -> String {
    let mut pattern = String::with_capacity(input.len() + 1);
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

pub struct IngredientService {
    db: PgPool,
}

impl IngredientService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// All ingredients, or those whose name starts with `prefix`
    /// (case-insensitive), ordered by name.
    pub async fn search(&self, prefix: Option<&str>) -> Result<Vec<Ingredient>> {
        let pattern = prefix
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(|p| like_prefix(&p.to_lowercase()));

        let ingredients = sqlx::query_as(
            r#"
            SELECT id, name, measurement_unit FROM ingredients
            WHERE $1::text IS NULL OR LOWER(name) LIKE $1
            ORDER BY name, measurement_unit
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.db)
        .await?;
        Ok(ingredients)
    }

    pub async fn get(&self, id: i64) -> Result<Ingredient> {
        sqlx::query_as("SELECT id, name, measurement_unit FROM ingredients WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Ingredient not found".to_string()))
    }

    pub async fn create(&self, req: &CreateIngredientRequest) -> Result<Ingredient> {
        let name = req.name.trim();
        let unit = req.measurement_unit.trim();
        for (field, value) in [("name", name), ("measurement_unit", unit)] {
            if value.is_empty() || value.chars().count() > INGREDIENT_FIELD_MAX {
                return Err(AppError::field(
                    field,
                    format!("Must be 1-{} characters.", INGREDIENT_FIELD_MAX),
                ));
            }
        }

        let created: Ingredient = sqlx::query_as(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            RETURNING id, name, measurement_unit
            "#,
        )
        .bind(name)
        .bind(unit)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("Ingredient with this unit already exists".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        tracing::info!(ingredient_id = created.id, "Ingredient created");
        Ok(created)
    }
}
