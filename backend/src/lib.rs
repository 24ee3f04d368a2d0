//! Foodgram - Backend Library
//!
//! Recipe publishing service: users publish recipes, follow authors, keep
//! favorites and a shopping cart that renders into a shopping list.

#[macro_use]
mod macros;

pub mod api;
pub mod assets;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod fixtures;
pub mod models;
pub mod services;
pub mod storage;
pub mod telemetry;

pub use config::Config;
pub use error::{AppError, Result};
