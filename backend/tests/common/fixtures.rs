//! Test data factories.

#![allow(dead_code)]

use serde_json::{json, Value};

/// 1x1 transparent PNG as a data URI.
pub const PIXEL_PNG: &str = concat!(
    "data:image/png;base64,",
    "iVBORw0KGgoAAAANSUhEUgAAAAEAAAABCAYAAAAfFcSJAAAADUlEQVR42mNkYPhfDwAChwGA60e6kgAAAABJRU5ErkJggg=="
);

/// Test user credentials
pub struct TestUser {
    pub username: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

impl TestUser {
    pub fn with_name(name: &str) -> Self {
        Self {
            username: name.to_string(),
            email: format!("{}@test.local", name),
            password: "correct-horse-battery".to_string(),
            first_name: "Test".to_string(),
            last_name: name.to_string(),
        }
    }

    pub fn registration(&self) -> Value {
        json!({
            "email": self.email,
            "username": self.username,
            "first_name": self.first_name,
            "last_name": self.last_name,
            "password": self.password,
        })
    }
}

/// Recipe write payload using the given tag and ingredient ids.
pub fn recipe_payload(name: &str, tag_id: i64, ingredient_id: i64, amount: i64) -> Value {
    json!({
        "ingredients": [{ "id": ingredient_id, "amount": amount }],
        "tags": [tag_id],
        "image": PIXEL_PNG,
        "name": name,
        "text": "Mix everything and bake.",
        "cooking_time": 15,
    })
}

/// Ingredient fixture rows unique to `id`, with a blank line in the middle.
pub fn ingredients_csv(id: &str) -> String {
    format!("{id} flour,g\n{id} sugar,g\n\n{id} milk,ml\n")
}

/// Tag fixture rows unique to `id`. Colors derive from `seed` so reruns
/// with a fresh seed do not collide with earlier rows.
pub fn tags_csv(id: &str, seed: u32) -> String {
    let first = seed & 0x7F_FFFF;
    let second = first | 0x80_0000;
    format!("{id} breakfast,#{first:06X},{id}-breakfast\n{id} lunch,#{second:06X},{id}-lunch\n")
}
