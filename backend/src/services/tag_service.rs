//! Tag catalogue.

use serde::Deserialize;
use sqlx::PgPool;
use utoipa::ToSchema;

use crate::error::{AppError, FieldErrors, Result};
use crate::models::tag::{is_hex_color, is_valid_slug, Tag, TAG_NAME_MAX, TAG_SLUG_MAX};

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateTagRequest {
    pub name: String,
    /// `#RRGGBB`
    pub color: String,
    pub slug: String,
}

/// Normalize and check a new tag. Returns the tag with an uppercased color.
pub fn validate_tag(req: &CreateTagRequest) -> Result<CreateTagRequest> {
    let mut errors = FieldErrors::new();
    let name = req.name.trim();
    let color = req.color.trim().to_uppercase();
    let slug = req.slug.trim();

    if name.is_empty() || name.chars().count() > TAG_NAME_MAX {
        errors
            .entry("name".into())
            .or_default()
            .push(format!("Name must be 1-{} characters.", TAG_NAME_MAX));
    }
    if !is_hex_color(&color) {
        errors
            .entry("color".into())
            .or_default()
            .push("Color must be a hex value like #E26C2D.".into());
    }
    if slug.chars().count() > TAG_SLUG_MAX || !is_valid_slug(slug) {
        errors
            .entry("slug".into())
            .or_default()
            .push("Enter a valid slug.".into());
    }

    if !errors.is_empty() {
        return Err(AppError::FieldValidation {
            message: "Invalid tag".to_string(),
            fields: errors,
        });
    }

    Ok(CreateTagRequest {
        name: name.to_string(),
        color,
        slug: slug.to_string(),
    })
}

pub struct TagService {
    db: PgPool,
}

impl TagService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn list(&self) -> Result<Vec<Tag>> {
        let tags = sqlx::query_as("SELECT id, name, color, slug FROM tags ORDER BY name, id")
            .fetch_all(&self.db)
            .await?;
        Ok(tags)
    }

    pub async fn get(&self, id: i64) -> Result<Tag> {
        sqlx::query_as("SELECT id, name, color, slug FROM tags WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("Tag not found".to_string()))
    }

    pub async fn create(&self, req: &CreateTagRequest) -> Result<Tag> {
        let tag = validate_tag(req)?;
        let created: Tag = sqlx::query_as(
            r#"
            INSERT INTO tags (name, color, slug)
            VALUES ($1, $2, $3)
            RETURNING id, name, color, slug
            "#,
        )
        .bind(&tag.name)
        .bind(&tag.color)
        .bind(&tag.slug)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::Conflict("A tag with this name, color or slug already exists".to_string())
            }
            other => AppError::Database(other.to_string()),
        })?;

        tracing::info!(tag_id = created.id, slug = %created.slug, "Tag created");
        Ok(created)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_tag_normalizes() {
        let tag = validate_tag(&CreateTagRequest {
            name: " Завтрак ".into(),
            color: "#e26c2d".into(),
            slug: "breakfast".into(),
        })
        .unwrap();
        assert_eq!(tag.name, "Завтрак");
        assert_eq!(tag.color, "#E26C2D");
    }

    #[test]
    fn test_validate_tag_reports_each_field() {
        let err = validate_tag(&CreateTagRequest {
            name: String::new(),
            color: "orange".into(),
            slug: "a b".into(),
        })
        .unwrap_err();
        match err {
            AppError::FieldValidation { fields, .. } => {
                assert_eq!(fields.len(), 3);
            }
            other => panic!("unexpected {other:?}"),
        }
    }
}
