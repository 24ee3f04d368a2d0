//! ReDoc page for the OpenAPI schema. Swagger UI is mounted by the router.

use axum::response::Html;

use crate::api::openapi;

/// Path the merged OpenAPI document is served from.
pub const SCHEMA_PATH: &str = "/api/schema/";

pub async fn redoc() -> Html<String> {
    Html(openapi::redoc_page(SCHEMA_PATH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_redoc_points_at_schema() {
        let Html(page) = redoc().await;
        assert!(page.contains(r#"spec-url="/api/schema/""#));
    }
}
