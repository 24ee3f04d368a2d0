//! Recipe models.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;
use utoipa::ToSchema;

pub const RECIPE_NAME_MAX: usize = 200;
pub const RECIPE_TEXT_MAX: usize = 3000;

/// Recipe row
#[derive(Debug, Clone, FromRow)]
pub struct Recipe {
    pub id: i64,
    pub author_id: i64,
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    /// Media-relative image path, e.g. `recipes/<uuid>.png`
    pub image: String,
    pub pub_date: DateTime<Utc>,
}

/// Ingredient line of a recipe, joined with the ingredient itself
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct RecipeIngredientLine {
    #[serde(skip)]
    pub recipe_id: i64,
    /// Ingredient ID
    pub id: i64,
    pub name: String,
    pub measurement_unit: String,
    pub amount: i16,
}

/// Aggregated shopping list line
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize)]
pub struct ShoppingListLine {
    pub name: String,
    pub measurement_unit: String,
    pub total_amount: i64,
}
