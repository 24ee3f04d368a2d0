//! Authentication middleware.
//!
//! Resolves the request's auth token to a user. Supported headers:
//! - `Authorization: Token <key>`
//! - `Authorization: Bearer <key>`
//!
//! Anonymous requests pass through; handlers that need a user call
//! [`require_auth`] or [`require_staff`].

use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::error::{AppError, Result};
use crate::models::user::User;
use crate::services::auth_service::AuthService;

/// Extension that holds authenticated user information
#[derive(Debug, Clone)]
pub struct AuthExtension {
    pub user_id: i64,
    pub username: String,
    pub email: String,
    pub is_staff: bool,
    pub full_name: String,
}

impl From<User> for AuthExtension {
    fn from(user: User) -> Self {
        Self {
            full_name: user.full_name(),
            user_id: user.id,
            username: user.username,
            email: user.email,
            is_staff: user.is_staff,
        }
    }
}

/// Token extraction result
#[derive(Debug, PartialEq, Eq)]
enum ExtractedToken<'a> {
    Token(&'a str),
    None,
    /// Unknown scheme or empty credentials
    Invalid,
}

fn extract_token_from_auth_header(auth_header: &str) -> ExtractedToken<'_> {
    let Some((scheme, credentials)) = auth_header.trim().split_once(' ') else {
        return ExtractedToken::Invalid;
    };
    let credentials = credentials.trim();
    if credentials.is_empty() || credentials.contains(' ') {
        return ExtractedToken::Invalid;
    }
    if scheme.eq_ignore_ascii_case("Token") || scheme.eq_ignore_ascii_case("Bearer") {
        ExtractedToken::Token(credentials)
    } else {
        ExtractedToken::Invalid
    }
}

fn extract_token(request: &Request) -> ExtractedToken<'_> {
    match request.headers().get(AUTHORIZATION) {
        None => ExtractedToken::None,
        Some(value) => match value.to_str() {
            Ok(header) => extract_token_from_auth_header(header),
            Err(_) => ExtractedToken::Invalid,
        },
    }
}

/// Optional authentication middleware.
///
/// Inserts `Option<AuthExtension>`: `None` for anonymous requests. A token
/// that is presented but invalid is rejected with 401 rather than being
/// downgraded to anonymous.
pub async fn optional_auth_middleware(
    State(auth_service): State<Arc<AuthService>>,
    mut request: Request,
    next: Next,
) -> Response {
    let auth_ext = match extract_token(&request) {
        ExtractedToken::Token(token) => match auth_service.validate_token(token).await {
            Ok(user) => Some(AuthExtension::from(user)),
            Err(e) => return e.into_response(),
        },
        ExtractedToken::None => None,
        ExtractedToken::Invalid => {
            return AppError::Authentication("Invalid authorization header format".to_string())
                .into_response()
        }
    };

    request.extensions_mut().insert(auth_ext);
    next.run(request).await
}

/// The authenticated user, or 401.
pub fn require_auth(auth: Option<AuthExtension>) -> Result<AuthExtension> {
    auth.ok_or_else(|| {
        AppError::Authentication("Authentication credentials were not provided.".to_string())
    })
}

/// The authenticated staff user, or 401/403.
pub fn require_staff(auth: Option<AuthExtension>) -> Result<AuthExtension> {
    let auth = require_auth(auth)?;
    if !auth.is_staff {
        return Err(AppError::Authorization("Staff access required".to_string()));
    }
    Ok(auth)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ext(is_staff: bool) -> AuthExtension {
        AuthExtension {
            user_id: 1,
            username: "cook".into(),
            email: "cook@example.com".into(),
            is_staff,
            full_name: "cook".into(),
        }
    }

    #[test]
    fn test_token_and_bearer_schemes() {
        let key = "0123456789abcdef0123456789abcdef01234567";
        assert_eq!(
            extract_token_from_auth_header(&format!("Token {key}")),
            ExtractedToken::Token(key)
        );
        assert_eq!(
            extract_token_from_auth_header(&format!("Bearer {key}")),
            ExtractedToken::Token(key)
        );
        assert_eq!(
            extract_token_from_auth_header(&format!("token  {key} ")),
            ExtractedToken::Token(key)
        );
    }

    #[test]
    fn test_rejects_other_schemes() {
        for header in ["Basic dXNlcjpwYXNz", "Token", "Token ", "ApiKey abc", "Token a b"] {
            assert_eq!(
                extract_token_from_auth_header(header),
                ExtractedToken::Invalid,
                "{header:?}"
            );
        }
    }

    #[test]
    fn test_missing_header() {
        let request = Request::builder().uri("/").body(axum::body::Body::empty()).unwrap();
        assert_eq!(extract_token(&request), ExtractedToken::None);
    }

    #[test]
    fn test_require_helpers() {
        assert!(matches!(require_auth(None), Err(AppError::Authentication(_))));
        assert!(require_auth(Some(ext(false))).is_ok());
        assert!(matches!(require_staff(Some(ext(false))), Err(AppError::Authorization(_))));
        assert!(require_staff(Some(ext(true))).is_ok());
    }
}
