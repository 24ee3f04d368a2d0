//! Recipes: validation, persistence, filtering and the per-user
//! favorites / shopping cart lists.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Postgres, Transaction};
use utoipa::ToSchema;

use crate::api::dto::PageParams;
use crate::error::{too_long, AppError, FieldErrors, Result};
use crate::models::recipe::{Recipe, RecipeIngredientLine, RECIPE_NAME_MAX, RECIPE_TEXT_MAX};
use crate::models::tag::Tag;
use crate::services::image_service::{media_url, ImageService};
use crate::services::user_service::{UserProfile, UserService};
use crate::storage::StorageBackend;

/// Full recipe view.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RecipeDetail {
    pub id: i64,
    pub tags: Vec<Tag>,
    pub author: UserProfile,
    pub ingredients: Vec<RecipeIngredientLine>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
    pub name: String,
    /// Image URL under `/media/`
    pub image: String,
    pub text: String,
    /// Minutes
    pub cooking_time: i16,
}

/// Compact recipe view used by favorites, cart and subscriptions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct RecipeShort {
    pub id: i64,
    pub name: String,
    pub image: String,
    pub cooking_time: i16,
}

impl From<&Recipe> for RecipeShort {
    fn from(r: &Recipe) -> Self {
        Self {
            id: r.id,
            name: r.name.clone(),
            image: media_url(&r.image),
            cooking_time: r.cooking_time,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct IngredientAmount {
    /// Ingredient ID
    pub id: i64,
    pub amount: i64,
}

/// Create / update payload.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RecipeWrite {
    #[serde(default)]
    pub ingredients: Vec<IngredientAmount>,
    /// Tag IDs
    #[serde(default)]
    pub tags: Vec<i64>,
    /// `data:image/<type>;base64,...`
    pub image: Option<String>,
    pub name: String,
    pub text: String,
    pub cooking_time: i64,
}

/// A write payload that passed shape validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidRecipe {
    pub name: String,
    pub text: String,
    pub cooking_time: i16,
    pub ingredient_ids: Vec<i64>,
    pub amounts: Vec<i16>,
    pub tag_ids: Vec<i64>,
    pub image: Option<String>,
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn positive_i16(value: i64) -> Option<i16> {
    i16::try_from(value).ok().filter(|v| *v >= 1)
}

/// Shape checks that need no database access. Existence of the referenced
/// ingredients and tags is checked separately.
pub fn validate_recipe(req: &RecipeWrite, image_required: bool) -> Result<ValidRecipe> {
    let mut errors = FieldErrors::new();

    let name = req.name.trim();
    if name.is_empty() {
        push(&mut errors, "name", "This field may not be blank.");
    } else if name.chars().count() > RECIPE_NAME_MAX {
        push(&mut errors, "name", too_long(RECIPE_NAME_MAX));
    }

    let text = req.text.trim();
    if text.is_empty() {
        push(&mut errors, "text", "This field may not be blank.");
    } else if text.chars().count() > RECIPE_TEXT_MAX {
        push(&mut errors, "text", too_long(RECIPE_TEXT_MAX));
    }

    let cooking_time = positive_i16(req.cooking_time);
    if cooking_time.is_none() {
        let message = format!("Cooking time must be between 1 and {}.", i16::MAX);
        push(&mut errors, "cooking_time", message);
    }

    let mut ingredient_ids = Vec::with_capacity(req.ingredients.len());
    let mut amounts = Vec::with_capacity(req.ingredients.len());
    if req.ingredients.is_empty() {
        push(&mut errors, "ingredients", "At least one ingredient is required.");
    }
    let mut seen = HashSet::new();
    for item in &req.ingredients {
        if !seen.insert(item.id) {
            let message = format!("Ingredient {} is listed more than once.", item.id);
            push(&mut errors, "ingredients", message);
            continue;
        }
        match positive_i16(item.amount) {
            Some(amount) => {
                ingredient_ids.push(item.id);
                amounts.push(amount);
            }
            None => push(
                &mut errors,
                "ingredients",
                format!("Amount for ingredient {} must be between 1 and {}.", item.id, i16::MAX),
            ),
        }
    }

    if req.tags.is_empty() {
        push(&mut errors, "tags", "At least one tag is required.");
    }
    let mut tag_ids = Vec::with_capacity(req.tags.len());
    let mut seen = HashSet::new();
    for id in &req.tags {
        if seen.insert(*id) {
            tag_ids.push(*id);
        } else {
            push(&mut errors, "tags", format!("Tag {} is listed more than once.", id));
        }
    }

    let image = req.image.as_deref().map(str::trim).filter(|s| !s.is_empty());
    if image_required && image.is_none() {
        push(&mut errors, "image", "This field is required.");
    }

    match cooking_time {
        Some(cooking_time) if errors.is_empty() => Ok(ValidRecipe {
            name: name.to_string(),
            text: text.to_string(),
            cooking_time,
            ingredient_ids,
            amounts,
            tag_ids,
            image: image.map(str::to_string),
        }),
        _ => Err(AppError::FieldValidation {
            message: "Invalid recipe".to_string(),
            fields: errors,
        }),
    }
}

/// Recipe list filters.
#[derive(Debug, Clone, Default)]
pub struct RecipeFilter {
    pub author: Option<i64>,
    /// Tag slugs; a recipe matches when it carries any of them
    pub tags: Vec<String>,
    pub is_favorited: bool,
    pub is_in_shopping_cart: bool,
}

/// Per-user recipe lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecipeList {
    Favorites,
    ShoppingCart,
}

impl RecipeList {
    fn table(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping_cart_items",
        }
    }

    fn label(self) -> &'static str {
        match self {
            RecipeList::Favorites => "favorites",
            RecipeList::ShoppingCart => "shopping cart",
        }
    }
}

const RECIPE_COLUMNS: &str =
    "r.id, r.author_id, r.name, r.text, r.cooking_time, r.image, r.pub_date";

// $1 author, $2 tag slugs, $3 favorited only, $4 in cart only, $5 viewer
const LIST_FILTER: &str = r#"
    WHERE ($1::bigint IS NULL OR r.author_id = $1)
      AND (cardinality($2::text[]) = 0 OR EXISTS (
            SELECT 1 FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = r.id AND t.slug = ANY($2)))
      AND (NOT $3::bool OR EXISTS (
            SELECT 1 FROM favorites f WHERE f.recipe_id = r.id AND f.user_id = $5::bigint))
      AND (NOT $4::bool OR EXISTS (
            SELECT 1 FROM shopping_cart_items c WHERE c.recipe_id = r.id AND c.user_id = $5::bigint))
"#;

#[derive(FromRow)]
struct TagRow {
    recipe_id: i64,
    #[sqlx(flatten)]
    tag: Tag,
}

/// Recipe service
pub struct RecipeService {
    db: PgPool,
    images: ImageService,
}

impl RecipeService {
    pub fn new(db: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        Self {
            db,
            images: ImageService::new(storage),
        }
    }

    async fn fetch(&self, id: i64) -> Result<Recipe> {
        sqlx::query_as(&format!("SELECT {RECIPE_COLUMNS} FROM recipes r WHERE r.id = $1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))
    }

    /// Fetch a recipe and check `user_id` may modify it.
    async fn fetch_owned(&self, id: i64, user_id: i64, is_staff: bool) -> Result<Recipe> {
        let recipe = self.fetch(id).await?;
        if recipe.author_id != user_id && !is_staff {
            return Err(AppError::Authorization(
                "Only the author can change this recipe".to_string(),
            ));
        }
        Ok(recipe)
    }

    async fn check_references(&self, recipe: &ValidRecipe) -> Result<()> {
        let mut errors = FieldErrors::new();

        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM ingredients WHERE id = ANY($1)")
            .bind(&recipe.ingredient_ids)
            .fetch_all(&self.db)
            .await?;
        let found: HashSet<i64> = found.into_iter().collect();
        for id in recipe.ingredient_ids.iter().filter(|id| !found.contains(id)) {
            push(&mut errors, "ingredients", format!("Ingredient {} does not exist.", id));
        }

        let found: Vec<i64> = sqlx::query_scalar("SELECT id FROM tags WHERE id = ANY($1)")
            .bind(&recipe.tag_ids)
            .fetch_all(&self.db)
            .await?;
        let found: HashSet<i64> = found.into_iter().collect();
        for id in recipe.tag_ids.iter().filter(|id| !found.contains(id)) {
            push(&mut errors, "tags", format!("Tag {} does not exist.", id));
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(AppError::FieldValidation {
                message: "Invalid recipe".to_string(),
                fields: errors,
            })
        }
    }

    async fn write_links(
        tx: &mut Transaction<'_, Postgres>,
        recipe_id: i64,
        recipe: &ValidRecipe,
    ) -> Result<()> {
        sqlx::query(
            r#"
            INSERT INTO recipe_ingredients (recipe_id, ingredient_id, amount)
            SELECT $1, * FROM UNNEST($2::bigint[], $3::smallint[])
            "#,
        )
        .bind(recipe_id)
        .bind(&recipe.ingredient_ids)
        .bind(&recipe.amounts)
        .execute(&mut **tx)
        .await?;

        sqlx::query(
            r#"
            INSERT INTO recipe_tags (recipe_id, tag_id)
            SELECT $1, * FROM UNNEST($2::bigint[])
            "#,
        )
        .bind(recipe_id)
        .bind(&recipe.tag_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }

    /// Create a recipe authored by `author_id`.
    pub async fn create(&self, author_id: i64, req: &RecipeWrite) -> Result<RecipeDetail> {
        let recipe = validate_recipe(req, true)?;
        self.check_references(&recipe).await?;

        let image_key = match recipe.image.as_deref() {
            Some(uri) => self.images.store(uri).await?,
            None => return Err(AppError::field("image", "This field is required.")),
        };

        let result = async {
            let mut tx = self.db.begin().await?;
            let id: i64 = sqlx::query_scalar(
                r#"
                INSERT INTO recipes (author_id, name, text, cooking_time, image)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING id
                "#,
            )
            .bind(author_id)
            .bind(&recipe.name)
            .bind(&recipe.text)
            .bind(recipe.cooking_time)
            .bind(&image_key)
            .fetch_one(&mut *tx)
            .await?;
            Self::write_links(&mut tx, id, &recipe).await?;
            tx.commit().await?;
            Ok::<_, AppError>(id)
        }
        .await;

        let id = match result {
            Ok(id) => id,
            Err(e) => {
                self.images.remove(&image_key).await;
                return Err(e);
            }
        };

        tracing::info!(recipe_id = id, author_id, "Recipe created");
        self.get(Some(author_id), id).await
    }

    /// Replace a recipe's fields, ingredients and tags. The image is kept
    /// unless a new one is supplied.
    pub async fn update(
        &self,
        id: i64,
        user_id: i64,
        is_staff: bool,
        req: &RecipeWrite,
    ) -> Result<RecipeDetail> {
        let existing = self.fetch_owned(id, user_id, is_staff).await?;
        let recipe = validate_recipe(req, false)?;
        self.check_references(&recipe).await?;

        let new_image = match recipe.image.as_deref() {
            Some(uri) => Some(self.images.store(uri).await?),
            None => None,
        };

        let result = async {
            let mut tx = self.db.begin().await?;
            sqlx::query(
                r#"
                UPDATE recipes
                SET name = $2, text = $3, cooking_time = $4, image = COALESCE($5, image)
                WHERE id = $1
                "#,
            )
            .bind(id)
            .bind(&recipe.name)
            .bind(&recipe.text)
            .bind(recipe.cooking_time)
            .bind(new_image.as_deref())
            .execute(&mut *tx)
            .await?;

            sqlx::query("DELETE FROM recipe_ingredients WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            sqlx::query("DELETE FROM recipe_tags WHERE recipe_id = $1")
                .bind(id)
                .execute(&mut *tx)
                .await?;
            Self::write_links(&mut tx, id, &recipe).await?;
            tx.commit().await?;
            Ok::<_, AppError>(())
        }
        .await;

        match (result, new_image) {
            (Ok(()), Some(_)) => self.images.remove(&existing.image).await,
            (Ok(()), None) => {}
            (Err(e), new_image) => {
                if let Some(key) = new_image {
                    self.images.remove(&key).await;
                }
                return Err(e);
            }
        }

        tracing::info!(recipe_id = id, user_id, "Recipe updated");
        self.get(Some(user_id), id).await
    }

    pub async fn delete(&self, id: i64, user_id: i64, is_staff: bool) -> Result<()> {
        let recipe = self.fetch_owned(id, user_id, is_staff).await?;
        sqlx::query("DELETE FROM recipes WHERE id = $1")
            .bind(id)
            .execute(&self.db)
            .await?;
        self.images.remove(&recipe.image).await;
        tracing::info!(recipe_id = id, user_id, "Recipe deleted");
        Ok(())
    }

    pub async fn get(&self, viewer: Option<i64>, id: i64) -> Result<RecipeDetail> {
        let recipe = self.fetch(id).await?;
        self.hydrate(viewer, vec![recipe])
            .await?
            .pop()
            .ok_or_else(|| AppError::NotFound("Recipe not found".to_string()))
    }

    /// Filtered page of recipes, newest first.
    pub async fn list(
        &self,
        viewer: Option<i64>,
        filter: &RecipeFilter,
        page: PageParams,
    ) -> Result<(Vec<RecipeDetail>, i64)> {
        // List flags only make sense for a known user.
        let favorited = filter.is_favorited && viewer.is_some();
        let in_cart = filter.is_in_shopping_cart && viewer.is_some();

        let recipes: Vec<Recipe> = sqlx::query_as(&format!(
            "SELECT {RECIPE_COLUMNS} FROM recipes r {LIST_FILTER} \
             ORDER BY r.pub_date DESC, r.id DESC LIMIT $6 OFFSET $7"
        ))
        .bind(filter.author)
        .bind(&filter.tags)
        .bind(favorited)
        .bind(in_cart)
        .bind(viewer)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let count_sql = format!("SELECT COUNT(*) FROM recipes r {LIST_FILTER}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(filter.author)
            .bind(&filter.tags)
            .bind(favorited)
            .bind(in_cart)
            .bind(viewer)
            .fetch_one(&self.db)
            .await?;

        Ok((self.hydrate(viewer, recipes).await?, total))
    }

    /// Attach tags, ingredients, author profiles and viewer flags, keeping
    /// the input order.
    async fn hydrate(
        &self,
        viewer: Option<i64>,
        recipes: Vec<Recipe>,
    ) -> Result<Vec<RecipeDetail>> {
        if recipes.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<i64> = recipes.iter().map(|r| r.id).collect();

        let tag_rows: Vec<TagRow> = sqlx::query_as(
            r#"
            SELECT rt.recipe_id, t.id, t.name, t.color, t.slug
            FROM recipe_tags rt JOIN tags t ON t.id = rt.tag_id
            WHERE rt.recipe_id = ANY($1)
            ORDER BY t.name, t.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let mut tags: HashMap<i64, Vec<Tag>> = HashMap::new();
        for row in tag_rows {
            tags.entry(row.recipe_id).or_default().push(row.tag);
        }

        let lines: Vec<RecipeIngredientLine> = sqlx::query_as(
            r#"
            SELECT ri.recipe_id, i.id, i.name, i.measurement_unit, ri.amount
            FROM recipe_ingredients ri JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE ri.recipe_id = ANY($1)
            ORDER BY ri.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let mut ingredients: HashMap<i64, Vec<RecipeIngredientLine>> = HashMap::new();
        for line in lines {
            ingredients.entry(line.recipe_id).or_default().push(line);
        }

        let flags: Vec<(i64, bool, bool)> = sqlx::query_as(
            r#"
            SELECT r.id,
                   EXISTS (SELECT 1 FROM favorites f
                           WHERE f.recipe_id = r.id AND f.user_id = $2::bigint),
                   EXISTS (SELECT 1 FROM shopping_cart_items c
                           WHERE c.recipe_id = r.id AND c.user_id = $2::bigint)
            FROM recipes r WHERE r.id = ANY($1)
            "#,
        )
        .bind(&ids)
        .bind(viewer)
        .fetch_all(&self.db)
        .await?;
        let flags: HashMap<i64, (bool, bool)> =
            flags.into_iter().map(|(id, f, c)| (id, (f, c))).collect();

        let mut author_ids: Vec<i64> = recipes.iter().map(|r| r.author_id).collect();
        author_ids.sort_unstable();
        author_ids.dedup();
        let authors: HashMap<i64, UserProfile> = UserService::new(self.db.clone())
            .profiles_by_ids(viewer, &author_ids)
            .await?
            .into_iter()
            .map(|p| (p.id, p))
            .collect();

        recipes
            .into_iter()
            .map(|r| {
                let author = authors.get(&r.author_id).cloned().ok_or_else(|| {
                    AppError::Internal(format!("Author {} of recipe {} missing", r.author_id, r.id))
                })?;
                let (is_favorited, is_in_shopping_cart) =
                    flags.get(&r.id).copied().unwrap_or_default();
                Ok(RecipeDetail {
                    id: r.id,
                    tags: tags.remove(&r.id).unwrap_or_default(),
                    author,
                    ingredients: ingredients.remove(&r.id).unwrap_or_default(),
                    is_favorited,
                    is_in_shopping_cart,
                    image: media_url(&r.image),
                    name: r.name,
                    text: r.text,
                    cooking_time: r.cooking_time,
                })
            })
            .collect()
    }

    /// Add a recipe to one of the user's lists.
    pub async fn add_to_list(
        &self,
        list: RecipeList,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<RecipeShort> {
        let recipe = self.fetch(recipe_id).await?;
        let result = sqlx::query(&format!(
            "INSERT INTO {} (user_id, recipe_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            list.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "Recipe is already in your {}",
                list.label()
            )));
        }
        tracing::debug!(user_id, recipe_id, list = list.label(), "Recipe added to list");
        Ok(RecipeShort::from(&recipe))
    }

    /// Remove a recipe from one of the user's lists.
    pub async fn remove_from_list(
        &self,
        list: RecipeList,
        user_id: i64,
        recipe_id: i64,
    ) -> Result<()> {
        self.fetch(recipe_id).await?;
        let result = sqlx::query(&format!(
            "DELETE FROM {} WHERE user_id = $1 AND recipe_id = $2",
            list.table()
        ))
        .bind(user_id)
        .bind(recipe_id)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::Validation(format!(
                "Recipe is not in your {}",
                list.label()
            )));
        }
        tracing::debug!(user_id, recipe_id, list = list.label(), "Recipe removed from list");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> RecipeWrite {
        RecipeWrite {
            ingredients: vec![
                IngredientAmount { id: 1123, amount: 10 },
                IngredientAmount { id: 7, amount: 1 },
            ],
            tags: vec![1, 2],
            image: Some("data:image/png;base64,iVBORw0KGgo=".into()),
            name: "  Нечто съедобное  ".into(),
            text: "Приготовьте как нибудь".into(),
            cooking_time: 5,
        }
    }

    fn field_errors(err: AppError) -> FieldErrors {
        match err {
            AppError::FieldValidation { fields, .. } => fields,
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_payload() {
        let recipe = validate_recipe(&payload(), true).unwrap();
        assert_eq!(recipe.name, "Нечто съедобное");
        assert_eq!(recipe.ingredient_ids, vec![1123, 7]);
        assert_eq!(recipe.amounts, vec![10, 1]);
        assert_eq!(recipe.tag_ids, vec![1, 2]);
        assert_eq!(recipe.cooking_time, 5);
    }

    #[test]
    fn test_rejects_duplicates() {
        let mut req = payload();
        req.ingredients.push(IngredientAmount { id: 7, amount: 3 });
        req.tags.push(1);
        let errors = field_errors(validate_recipe(&req, true).unwrap_err());
        assert!(errors.contains_key("ingredients"));
        assert!(errors.contains_key("tags"));
    }

    #[test]
    fn test_rejects_empty_sets() {
        let mut req = payload();
        req.ingredients.clear();
        req.tags.clear();
        let errors = field_errors(validate_recipe(&req, true).unwrap_err());
        assert!(errors.contains_key("ingredients"));
        assert!(errors.contains_key("tags"));
    }

    #[test]
    fn test_rejects_zero_amount_and_cooking_time() {
        let mut req = payload();
        req.ingredients[0].amount = 0;
        req.cooking_time = 0;
        let errors = field_errors(validate_recipe(&req, true).unwrap_err());
        assert!(errors.contains_key("ingredients"));
        assert!(errors.contains_key("cooking_time"));

        let mut req = payload();
        req.cooking_time = i64::from(i16::MAX) + 1;
        assert!(validate_recipe(&req, true).is_err());
    }

    #[test]
    fn test_image_required_only_on_create() {
        let mut req = payload();
        req.image = None;
        let errors = field_errors(validate_recipe(&req, true).unwrap_err());
        assert!(errors.contains_key("image"));

        let recipe = validate_recipe(&req, false).unwrap();
        assert!(recipe.image.is_none());
    }

    #[test]
    fn test_name_and_text_limits() {
        let mut req = payload();
        req.name = "x".repeat(RECIPE_NAME_MAX + 1);
        req.text = "   ".into();
        let errors = field_errors(validate_recipe(&req, true).unwrap_err());
        assert!(errors.contains_key("name"));
        assert!(errors.contains_key("text"));
    }

    #[test]
    fn test_short_view_uses_media_url() {
        let recipe = Recipe {
            id: 3,
            author_id: 1,
            name: "Borscht".into(),
            text: "Boil".into(),
            cooking_time: 90,
            image: "recipes/abc.png".into(),
            pub_date: chrono::Utc::now(),
        };
        let short = RecipeShort::from(&recipe);
        assert_eq!(short.image, "/media/recipes/abc.png");
        assert_eq!(short.cooking_time, 90);
    }
}
