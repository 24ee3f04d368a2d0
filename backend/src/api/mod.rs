//! API module - HTTP handlers and middleware.

pub mod dto;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod routes;

use std::sync::Arc;

use sqlx::PgPool;

use crate::api::dto::{PageParams, PaginationQuery};
use crate::config::Config;
use crate::services::auth_service::AuthService;
use crate::services::ingredient_service::IngredientService;
use crate::services::recipe_service::RecipeService;
use crate::services::shopping_list_service::ShoppingListService;
use crate::services::subscription_service::SubscriptionService;
use crate::services::tag_service::TagService;
use crate::services::user_service::UserService;
use crate::storage::StorageBackend;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub db: PgPool,
    /// Media volume
    pub storage: Arc<dyn StorageBackend>,
    pub auth_service: Arc<AuthService>,
}

impl AppState {
    pub fn new(config: Config, db: PgPool, storage: Arc<dyn StorageBackend>) -> Self {
        let config = Arc::new(config);
        let auth_service = Arc::new(AuthService::new(db.clone(), config.clone()));
        Self {
            config,
            db,
            storage,
            auth_service,
        }
    }

    /// Resolve `page` / `limit` against the configured page size.
    pub fn page_params(&self, query: &PaginationQuery) -> PageParams {
        PageParams::resolve(query, self.config.page_size, self.config.max_page_size)
    }

    pub fn users(&self) -> UserService {
        UserService::new(self.db.clone())
    }

    pub fn subscriptions(&self) -> SubscriptionService {
        SubscriptionService::new(self.db.clone())
    }

    pub fn tags(&self) -> TagService {
        TagService::new(self.db.clone())
    }

    pub fn ingredients(&self) -> IngredientService {
        IngredientService::new(self.db.clone())
    }

    pub fn recipes(&self) -> RecipeService {
        RecipeService::new(self.db.clone(), self.storage.clone())
    }

    pub fn shopping_list(&self) -> ShoppingListService {
        ShoppingListService::new(self.db.clone())
    }
}

pub type SharedState = Arc<AppState>;
