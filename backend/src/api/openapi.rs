//! OpenAPI specification generated from handler annotations via utoipa,
//! plus the two documentation viewer pages.

use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Top-level OpenAPI document for the Foodgram API.
///
/// Each handler module contributes its own paths and schemas via per-module
/// `#[derive(OpenApi)]` structs that are merged into this root document.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Foodgram API",
        description = "Recipe publishing: recipes, tags, ingredients, subscriptions, favorites and shopping lists.",
        version = "1.0.0",
        license(name = "MIT", url = "https://opensource.org/licenses/MIT")
    ),
    servers(
        (url = "/", description = "Current server"),
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "Token login and logout"),
        (name = "users", description = "Accounts, profiles and subscriptions"),
        (name = "tags", description = "Recipe tags"),
        (name = "ingredients", description = "Ingredient catalogue"),
        (name = "recipes", description = "Recipes, favorites and shopping cart"),
        (name = "health", description = "Health and readiness checks"),
    ),
    components(schemas(ErrorResponse))
)]
pub struct ApiDoc;

/// Standard error response body returned by all endpoints on failure.
#[derive(serde::Serialize, utoipa::ToSchema)]
pub struct ErrorResponse {
    /// Machine-readable error code (e.g. "NOT_FOUND", "VALIDATION_ERROR")
    pub code: String,
    /// Human-readable error message
    pub message: String,
    /// Per-field messages for validation errors
    pub fields: Option<std::collections::BTreeMap<String, Vec<String>>>,
}

/// Registers the `Authorization: Token <key>` scheme.
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "token_auth",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::with_description(
                    "Authorization",
                    "Auth token as `Token <key>` (or `Bearer <key>`), issued by /api/auth/token/login/",
                ))),
            );
        }
    }
}

/// Build the merged OpenAPI document from all handler modules.
pub fn build_openapi() -> utoipa::openapi::OpenApi {
    let mut doc = ApiDoc::openapi();

    doc.merge(super::handlers::auth::AuthApiDoc::openapi());
    doc.merge(super::handlers::users::UsersApiDoc::openapi());
    doc.merge(super::handlers::tags::TagsApiDoc::openapi());
    doc.merge(super::handlers::ingredients::IngredientsApiDoc::openapi());
    doc.merge(super::handlers::recipes::RecipesApiDoc::openapi());
    doc.merge(super::handlers::health::HealthApiDoc::openapi());

    doc
}

/// Standalone Swagger UI page that loads the document at `spec_url`.
pub fn swagger_page(spec_url: &str) -> String {
    format!(
        r##"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Foodgram API - Swagger UI</title>
  <link rel="stylesheet" href="https://unpkg.com/swagger-ui-dist@5/swagger-ui.css">
</head>
<body>
  <div id="swagger-ui"></div>
  <script src="https://unpkg.com/swagger-ui-dist@5/swagger-ui-bundle.js"></script>
  <script>
    window.ui = SwaggerUIBundle({{ url: "{spec_url}", dom_id: "#swagger-ui" }});
  </script>
</body>
</html>
"##
    )
}

/// ReDoc page that renders the document at `spec_url`.
pub fn redoc_page(spec_url: &str) -> String {
    format!(
        r#"<!DOCTYPE html>
<html lang="en">
<head>
  <meta charset="utf-8">
  <title>Foodgram API - ReDoc</title>
  <meta name="viewport" content="width=device-width, initial-scale=1">
</head>
<body>
  <redoc spec-url="{spec_url}"></redoc>
  <script src="https://cdn.redoc.ly/redoc/latest/bundles/redoc.standalone.js"></script>
</body>
</html>
"#
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_spec_is_valid() {
        let spec = build_openapi();
        assert_eq!(spec.info.title, "Foodgram API");

        let has_token = spec
            .components
            .as_ref()
            .is_some_and(|c| c.security_schemes.contains_key("token_auth"));
        assert!(has_token, "Token auth security scheme is missing.");

        let tags: Vec<&str> = spec
            .tags
            .as_ref()
            .map_or(vec![], |t| t.iter().map(|tag| tag.name.as_str()).collect());
        for expected in ["auth", "users", "tags", "ingredients", "recipes", "health"] {
            assert!(tags.contains(&expected), "Missing expected tag: {expected}");
        }
    }

    #[test]
    fn test_openapi_paths_registered() {
        let spec = build_openapi();
        for path in [
            "/api/auth/token/login/",
            "/api/auth/token/logout/",
            "/api/users/",
            "/api/users/{id}/",
            "/api/users/me/",
            "/api/users/set_password/",
            "/api/users/subscriptions/",
            "/api/users/{id}/subscribe/",
            "/api/tags/",
            "/api/tags/{id}/",
            "/api/ingredients/",
            "/api/ingredients/{id}/",
            "/api/recipes/",
            "/api/recipes/{id}/",
            "/api/recipes/{id}/favorite/",
            "/api/recipes/{id}/shopping_cart/",
            "/api/recipes/download_shopping_cart/",
            "/health",
            "/ready",
        ] {
            assert!(spec.paths.paths.contains_key(path), "Missing path {path}");
        }

        let recipe = &spec.paths.paths["/api/recipes/{id}/"];
        assert!(recipe.get.is_some() && recipe.patch.is_some() && recipe.delete.is_some());
    }

    #[test]
    fn test_viewer_pages_reference_spec() {
        assert!(swagger_page("openapi.json").contains(r#"url: "openapi.json""#));
        assert!(redoc_page("/api/schema/").contains(r#"spec-url="/api/schema/""#));
    }
}
