//! Business logic services.

pub mod auth_service;
pub mod image_service;
pub mod ingredient_service;
pub mod recipe_service;
pub mod shopping_list_service;
pub mod subscription_service;
pub mod tag_service;
pub mod user_service;
