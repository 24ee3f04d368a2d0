//! Reference data loaders for ingredients and tags.
//!
//! Fixture files are header-less CSV:
//! - `ingredients.csv`: `name,measurement_unit`
//! - `tags.csv`: `name,color,slug`
//!
//! Loading runs in a single transaction and inserts with
//! `ON CONFLICT DO NOTHING` against the natural unique keys, so the startup
//! sequence can run it on every container restart without duplicating rows.

use std::io::Read;
use std::path::Path;

use serde::Serialize;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::ingredient::INGREDIENT_FIELD_MAX;
use crate::models::tag::{is_hex_color, is_valid_slug, TAG_NAME_MAX, TAG_SLUG_MAX};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngredientRecord {
    pub name: String,
    pub measurement_unit: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TagRecord {
    pub name: String,
    pub color: String,
    pub slug: String,
}

/// Outcome of a fixture load.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct LoadReport {
    pub inserted: u64,
    pub skipped: u64,
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

/// Parse rows into fixed-width string tuples, rejecting wrong column counts
/// and empty cells.
fn parse_rows<R: Read, const N: usize>(reader: R, kind: &str) -> Result<Vec<(u64, [String; N])>> {
    let mut rows = Vec::new();
    for (index, record) in csv_reader(reader).records().enumerate() {
        let record = record
            .map_err(|e| AppError::Validation(format!("{} fixture: malformed CSV: {}", kind, e)))?;
        let line = record
            .position()
            .map(|p| p.line())
            .unwrap_or(index as u64 + 1);

        if record.len() == 1 && record.get(0).map(str::is_empty).unwrap_or(true) {
            continue;
        }
        if record.len() != N {
            return Err(AppError::Validation(format!(
                "{} fixture line {}: expected {} columns, found {}",
                kind,
                line,
                N,
                record.len()
            )));
        }

        let fields: [String; N] = std::array::from_fn(|i| record.get(i).unwrap_or("").to_string());
        if let Some(pos) = fields.iter().position(String::is_empty) {
            return Err(AppError::Validation(format!(
                "{} fixture line {}: column {} is empty",
                kind,
                line,
                pos + 1
            )));
        }
        rows.push((line, fields));
    }
    Ok(rows)
}

fn check_len(kind: &str, line: u64, field: &str, value: &str, max: usize) -> Result<()> {
    if value.chars().count() > max {
        return Err(AppError::Validation(format!(
            "{} fixture line {}: {} longer than {} characters",
            kind, line, field, max
        )));
    }
    Ok(())
}

/// Parse the ingredients fixture format.
pub fn parse_ingredients<R: Read>(reader: R) -> Result<Vec<IngredientRecord>> {
    parse_rows::<_, 2>(reader, "ingredients")?
        .into_iter()
        .map(|(line, [name, measurement_unit])| {
            check_len("ingredients", line, "name", &name, INGREDIENT_FIELD_MAX)?;
            check_len(
                "ingredients",
                line,
                "measurement_unit",
                &measurement_unit,
                INGREDIENT_FIELD_MAX,
            )?;
            Ok(IngredientRecord {
                name,
                measurement_unit,
            })
        })
        .collect()
}

/// Parse the tags fixture format.
pub fn parse_tags<R: Read>(reader: R) -> Result<Vec<TagRecord>> {
    parse_rows::<_, 3>(reader, "tags")?
        .into_iter()
        .map(|(line, [name, color, slug])| {
            check_len("tags", line, "name", &name, TAG_NAME_MAX)?;
            check_len("tags", line, "slug", &slug, TAG_SLUG_MAX)?;
            if !is_hex_color(&color) {
                return Err(AppError::Validation(format!(
                    "tags fixture line {}: invalid color '{}'",
                    line, color
                )));
            }
            if !is_valid_slug(&slug) {
                return Err(AppError::Validation(format!(
                    "tags fixture line {}: invalid slug '{}'",
                    line, slug
                )));
            }
            Ok(TagRecord {
                name,
                color: color.to_uppercase(),
                slug,
            })
        })
        .collect()
}

fn open_fixture(path: &Path) -> Result<std::fs::File> {
    std::fs::File::open(path).map_err(|e| {
        AppError::Startup(format!("cannot open fixture {}: {}", path.display(), e))
    })
}

/// Load ingredients from a CSV file into the database.
pub async fn load_ingredients(pool: &PgPool, path: &Path) -> Result<LoadReport> {
    let records = parse_ingredients(open_fixture(path)?)?;
    let mut report = LoadReport::default();
    let mut tx = pool.begin().await?;

    for record in &records {
        let result = sqlx::query(
            r#"
            INSERT INTO ingredients (name, measurement_unit)
            VALUES ($1, $2)
            ON CONFLICT (name, measurement_unit) DO NOTHING
            "#,
        )
        .bind(&record.name)
        .bind(&record.measurement_unit)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            report.skipped += 1;
        } else {
            report.inserted += 1;
        }
    }

    tx.commit().await?;
    tracing::info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Ingredients loaded"
    );
    Ok(report)
}

/// Load tags from a CSV file into the database.
pub async fn load_tags(pool: &PgPool, path: &Path) -> Result<LoadReport> {
    let records = parse_tags(open_fixture(path)?)?;
    let mut report = LoadReport::default();
    let mut tx = pool.begin().await?;

    for record in &records {
        // Any of name/color/slug colliding means the tag is already seeded.
        let result = sqlx::query(
            r#"
            INSERT INTO tags (name, color, slug)
            VALUES ($1, $2, $3)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(&record.name)
        .bind(&record.color)
        .bind(&record.slug)
        .execute(&mut *tx)
        .await?;

        if result.rows_affected() == 0 {
            report.skipped += 1;
        } else {
            report.inserted += 1;
        }
    }

    tx.commit().await?;
    tracing::info!(
        path = %path.display(),
        inserted = report.inserted,
        skipped = report.skipped,
        "Tags loaded"
    );
    Ok(report)
}
