//! Tag model.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Recipe tag
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize, ToSchema)]
pub struct Tag {
    pub id: i64,
    pub name: String,
    /// Hex color, `#RRGGBB`
    pub color: String,
    pub slug: String,
}

pub const TAG_NAME_MAX: usize = 200;
pub const TAG_SLUG_MAX: usize = 100;

/// Returns true for `#` followed by exactly six hex digits.
pub fn is_hex_color(value: &str) -> bool {
    value.len() == 7
        && value.starts_with('#')
        && value[1..].chars().all(|c| c.is_ascii_hexdigit())
}

/// Returns true for a non-empty `[-a-zA-Z0-9_]+` slug.
pub fn is_valid_slug(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_color() {
        assert!(is_hex_color("#E26C2D"));
        assert!(is_hex_color("#abcdef"));
        assert!(!is_hex_color("E26C2D"));
        assert!(!is_hex_color("#E26C2"));
        assert!(!is_hex_color("#GGGGGG"));
    }

    #[test]
    fn test_slug() {
        assert!(is_valid_slug("breakfast"));
        assert!(is_valid_slug("low-carb_2"));
        assert!(!is_valid_slug(""));
        assert!(!is_valid_slug("with space"));
        assert!(!is_valid_slug("завтрак"));
    }
}
