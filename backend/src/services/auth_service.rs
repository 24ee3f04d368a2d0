//! Authentication service.
//!
//! Handles password hashing, opaque token issue/revocation and token
//! validation. Tokens are random 40-character hex keys handed to the client
//! once; only their HMAC-SHA256 digest (keyed with `SECRET_KEY`) is stored.

use std::sync::Arc;

use bcrypt::{hash, verify, DEFAULT_COST};
use hmac::{Hmac, Mac};
use rand::RngCore;
use sha2::Sha256;
use sqlx::PgPool;

use crate::config::Config;
use crate::error::{AppError, Result};
use crate::models::user::{User, USER_COLUMNS};

type HmacSha256 = Hmac<Sha256>;

/// Random bytes per token; hex encoding doubles the length.
const TOKEN_BYTES: usize = 20;

/// Authentication service
pub struct AuthService {
    db: PgPool,
    config: Arc<Config>,
}

impl AuthService {
    /// Create a new authentication service
    pub fn new(db: PgPool, config: Arc<Config>) -> Self {
        Self { db, config }
    }

    /// Authenticate by email and password and issue a fresh token.
    ///
    /// Any token the user held before is replaced.
    pub async fn login(&self, email: &str, password: &str) -> Result<(User, String)> {
        let user: User = sqlx::query_as(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE lower(email) = lower($1) AND is_active = true"
        ))
        .bind(email.trim())
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| {
            AppError::field(
                "non_field_errors",
                "Unable to log in with provided credentials.",
            )
        })?;

        if !Self::verify_password(password, &user.password_hash)? {
            return Err(AppError::field(
                "non_field_errors",
                "Unable to log in with provided credentials.",
            ));
        }

        let token = generate_token();
        let digest = token_digest(&self.config.secret_key, &token);

        let mut tx = self.db.begin().await?;
        sqlx::query(
            r#"
            INSERT INTO auth_tokens (digest, user_id)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO UPDATE SET digest = EXCLUDED.digest, created_at = NOW()
            "#,
        )
        .bind(&digest)
        .bind(user.id)
        .execute(&mut *tx)
        .await?;

        sqlx::query("UPDATE users SET last_login = NOW() WHERE id = $1")
            .bind(user.id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(user_id = user.id, "User logged in");
        Ok((user, token))
    }

    /// Revoke the user's token.
    pub async fn logout(&self, user_id: i64) -> Result<()> {
        sqlx::query("DELETE FROM auth_tokens WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;
        tracing::info!(user_id, "User logged out");
        Ok(())
    }

    /// Resolve a presented token to its active user.
    pub async fn validate_token(&self, token: &str) -> Result<User> {
        if token.len() != TOKEN_BYTES * 2 || !token.bytes().all(|b| b.is_ascii_hexdigit()) {
            return Err(AppError::Authentication("Invalid token.".to_string()));
        }
        let digest = token_digest(&self.config.secret_key, token);

        sqlx::query_as::<_, User>(&format!(
            r#"
            SELECT {cols} FROM users
            WHERE id = (SELECT user_id FROM auth_tokens WHERE digest = $1)
              AND is_active = true
            "#,
            cols = USER_COLUMNS
        ))
        .bind(&digest)
        .fetch_optional(&self.db)
        .await
        .map_err(|e| AppError::Database(e.to_string()))?
        .ok_or_else(|| AppError::Authentication("Invalid token.".to_string()))
    }

    /// Hash a password
    pub fn hash_password(password: &str) -> Result<String> {
        hash(password, DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("Password hashing failed: {}", e)))
    }

    /// Verify a password against a hash
    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash)
            .map_err(|e| AppError::Internal(format!("Password verification failed: {}", e)))
    }
}

/// New random token, lowercase hex.
pub fn generate_token() -> String {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Keyed digest of a token, the only form that reaches the database.
pub fn token_digest(secret: &str, token: &str) -> String {
    let mut mac = <HmacSha256 as Mac>::new_from_slice(secret.as_bytes())
        .expect("HMAC-SHA256 accepts any key length");
    mac.update(token.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "test_password_123";
        let hash = AuthService::hash_password(password).unwrap();
        assert!(AuthService::verify_password(password, &hash).unwrap());
        assert!(!AuthService::verify_password("wrong_password", &hash).unwrap());
    }

    #[test]
    fn test_generate_token_shape() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), 40);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_token_digest_is_keyed() {
        let token = "0123456789abcdef0123456789abcdef01234567";
        let d1 = token_digest("secret-one", token);
        let d2 = token_digest("secret-two", token);
        assert_eq!(d1.len(), 64);
        assert_ne!(d1, d2);
        assert_eq!(d1, token_digest("secret-one", token));
        assert!(!d1.contains(token));
    }
}
