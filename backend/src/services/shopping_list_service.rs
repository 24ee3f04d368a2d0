//! Shopping list built from the recipes in a user's cart.

use chrono::NaiveDate;
use sqlx::PgPool;

use crate::error::{AppError, Result};
use crate::models::recipe::ShoppingListLine;

/// Render the plain-text shopping list.
pub fn render_shopping_list(
    full_name: &str,
    date: NaiveDate,
    lines: &[ShoppingListLine],
) -> String {
    let mut out = String::new();
    out.push_str("Foodgram shopping list\n");
    out.push_str(&format!("For: {}\n", full_name));
    out.push_str(&format!("Date: {}\n\n", date.format("%d.%m.%Y")));
    for (n, line) in lines.iter().enumerate() {
        out.push_str(&format!(
            "{}. {} ({}) - {}\n",
            n + 1,
            line.name,
            line.measurement_unit,
            line.total_amount
        ));
    }
    out
}

/// Attachment file name for a user's list.
pub fn shopping_list_filename(username: &str) -> String {
    let safe: String = username
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    format!("{}_shopping_list.txt", safe)
}

pub struct ShoppingListService {
    db: PgPool,
}

impl ShoppingListService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Ingredient totals across the cart, grouped by name and unit and
    /// ordered by name.
    pub async fn aggregate(&self, user_id: i64) -> Result<Vec<ShoppingListLine>> {
        let lines: Vec<ShoppingListLine> = sqlx::query_as(
            r#"
            SELECT i.name, i.measurement_unit, SUM(ri.amount)::bigint AS total_amount
            FROM shopping_cart_items c
            JOIN recipe_ingredients ri ON ri.recipe_id = c.recipe_id
            JOIN ingredients i ON i.id = ri.ingredient_id
            WHERE c.user_id = $1
            GROUP BY i.name, i.measurement_unit
            ORDER BY i.name, i.measurement_unit
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        if lines.is_empty() {
            return Err(AppError::Validation("Shopping cart is empty".to_string()));
        }
        Ok(lines)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(name: &str, unit: &str, total: i64) -> ShoppingListLine {
        ShoppingListLine {
            name: name.into(),
            measurement_unit: unit.into(),
            total_amount: total,
        }
    }

    #[test]
    fn test_render_numbers_lines_in_order() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 8).unwrap();
        let text = render_shopping_list(
            "Вася Пупкин",
            date,
            &[line("мука", "г", 700), line("яйца", "шт.", 3)],
        );
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "For: Вася Пупкин");
        assert_eq!(lines[2], "Date: 08.03.2024");
        assert_eq!(lines[4], "1. мука (г) - 700");
        assert_eq!(lines[5], "2. яйца (шт.) - 3");
    }

    #[test]
    fn test_filename_is_header_safe() {
        assert_eq!(shopping_list_filename("vasya.pupkin"), "vasya.pupkin_shopping_list.txt");
        assert_eq!(shopping_list_filename("a@b+c"), "a_b_c_shopping_list.txt");
    }
}
