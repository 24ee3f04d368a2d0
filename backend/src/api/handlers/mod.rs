//! HTTP request handlers.

pub mod auth;
pub mod docs;
pub mod health;
pub mod ingredients;
pub mod recipes;
pub mod tags;
pub mod users;
