//! User accounts: registration, profiles and password changes.

use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use utoipa::ToSchema;

use crate::api::dto::PageParams;
use crate::error::{too_long, AppError, FieldErrors, Result};
use crate::models::user::{User, USER_COLUMNS};
use crate::services::auth_service::AuthService;

pub const EMAIL_MAX: usize = 254;
pub const NAME_MAX: usize = 150;
pub const PASSWORD_MAX: usize = 150;
pub const PASSWORD_MIN: usize = 8;

/// Public view of a user, as seen by `viewer`.
#[derive(Debug, Clone, FromRow, Serialize, ToSchema)]
pub struct UserProfile {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    /// Whether the requesting user follows this user
    pub is_subscribed: bool,
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub password: String,
}

/// Registration response: the new account without `is_subscribed`.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RegisteredUser {
    pub email: String,
    pub id: i64,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
}

impl From<User> for RegisteredUser {
    fn from(u: User) -> Self {
        Self {
            email: u.email,
            id: u.id,
            username: u.username,
            first_name: u.first_name,
            last_name: u.last_name,
        }
    }
}

#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub new_password: String,
    pub current_password: String,
}

const PROFILE_SELECT: &str = r#"
    SELECT u.email, u.id, u.username, u.first_name, u.last_name,
           EXISTS (
               SELECT 1 FROM subscriptions s
               WHERE s.user_id = $1::bigint AND s.author_id = u.id
           ) AS is_subscribed
    FROM users u
"#;

/// Username characters: letters, digits and `.@+-_`.
pub fn is_valid_username(value: &str) -> bool {
    !value.is_empty()
        && value
            .chars()
            .all(|c| c.is_alphanumeric() || matches!(c, '.' | '@' | '+' | '-' | '_'))
}

/// Loose shape check: one `@`, non-empty local part, dotted domain.
pub fn is_valid_email(value: &str) -> bool {
    let Some((local, domain)) = value.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !value.chars().any(char::is_whitespace)
}

fn push(errors: &mut FieldErrors, field: &str, message: impl Into<String>) {
    errors.entry(field.to_string()).or_default().push(message.into());
}

fn too_short(min: usize) -> String {
    format!("Ensure this field has at least {} characters.", min)
}

fn check_password(errors: &mut FieldErrors, field: &str, password: &str) {
    let len = password.chars().count();
    if len < PASSWORD_MIN {
        push(errors, field, too_short(PASSWORD_MIN));
    } else if len > PASSWORD_MAX {
        push(errors, field, too_long(PASSWORD_MAX));
    }
    if !password.is_empty() && password.chars().all(|c| c.is_ascii_digit()) {
        push(errors, field, "This password is entirely numeric.");
    }
}

/// Shape checks for a registration payload. Uniqueness is checked against
/// the database separately.
pub fn validate_registration(req: &RegisterRequest) -> Result<()> {
    let mut errors = FieldErrors::new();

    let email = req.email.trim();
    if email.is_empty() {
        push(&mut errors, "email", "This field may not be blank.");
    } else if email.chars().count() > EMAIL_MAX || !is_valid_email(email) {
        push(&mut errors, "email", "Enter a valid email address.");
    }

    let username = req.username.trim();
    if username.is_empty() {
        push(&mut errors, "username", "This field may not be blank.");
    } else if username.chars().count() > NAME_MAX {
        push(&mut errors, "username", too_long(NAME_MAX));
    } else if !is_valid_username(username) {
        push(&mut errors, "username", "Enter a valid username.");
    } else if username.eq_ignore_ascii_case("me") {
        push(&mut errors, "username", "This username is reserved.");
    }

    for (field, value) in [("first_name", &req.first_name), ("last_name", &req.last_name)] {
        let value = value.trim();
        if value.is_empty() {
            push(&mut errors, field, "This field may not be blank.");
        } else if value.chars().count() > NAME_MAX {
            push(&mut errors, field, too_long(NAME_MAX));
        }
    }

    check_password(&mut errors, "password", &req.password);

    if errors.is_empty() {
        Ok(())
    } else {
        Err(AppError::FieldValidation {
            message: "Invalid registration data".to_string(),
            fields: errors,
        })
    }
}

/// User service
pub struct UserService {
    db: PgPool,
}

impl UserService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Register a regular user.
    pub async fn register(&self, req: RegisterRequest) -> Result<User> {
        validate_registration(&req)?;
        self.insert_user(
            req.email.trim(),
            req.username.trim(),
            req.first_name.trim(),
            req.last_name.trim(),
            &req.password,
            false,
        )
        .await
    }

    /// Create a staff account, used by the `create-superuser` command.
    pub async fn create_superuser(
        &self,
        email: &str,
        username: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
    ) -> Result<User> {
        let mut errors = FieldErrors::new();
        if !is_valid_email(email) {
            push(&mut errors, "email", "Enter a valid email address.");
        }
        if !is_valid_username(username) {
            push(&mut errors, "username", "Enter a valid username.");
        }
        check_password(&mut errors, "password", password);
        if !errors.is_empty() {
            return Err(AppError::FieldValidation {
                message: "Invalid superuser data".to_string(),
                fields: errors,
            });
        }

        let user = self
            .insert_user(email, username, first_name, last_name, password, true)
            .await?;
        tracing::info!(user_id = user.id, username = %user.username, "Superuser created");
        Ok(user)
    }

    async fn insert_user(
        &self,
        email: &str,
        username: &str,
        first_name: &str,
        last_name: &str,
        password: &str,
        is_staff: bool,
    ) -> Result<User> {
        let mut errors = FieldErrors::new();
        let (email_taken, username_taken): (bool, bool) = sqlx::query_as(
            r#"
            SELECT
                EXISTS (SELECT 1 FROM users WHERE lower(email) = lower($1)),
                EXISTS (SELECT 1 FROM users WHERE username = $2)
            "#,
        )
        .bind(email)
        .bind(username)
        .fetch_one(&self.db)
        .await?;
        if email_taken {
            push(&mut errors, "email", "A user with that email already exists.");
        }
        if username_taken {
            push(&mut errors, "username", "A user with that username already exists.");
        }
        if !errors.is_empty() {
            return Err(AppError::FieldValidation {
                message: "User already exists".to_string(),
                fields: errors,
            });
        }

        let password_hash = AuthService::hash_password(password)?;
        let user: User = sqlx::query_as(&format!(
            r#"
            INSERT INTO users (email, username, first_name, last_name, password_hash, is_staff)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(email)
        .bind(username)
        .bind(first_name)
        .bind(last_name)
        .bind(&password_hash)
        .bind(is_staff)
        .fetch_one(&self.db)
        .await
        .map_err(|e| match e {
            sqlx::Error::Database(ref db) if db.is_unique_violation() => {
                AppError::field("username", "A user with that username or email already exists.")
            }
            other => AppError::Database(other.to_string()),
        })?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Page through all users, ordered by id.
    pub async fn list(
        &self,
        viewer: Option<i64>,
        page: PageParams,
    ) -> Result<(Vec<UserProfile>, i64)> {
        let users: Vec<UserProfile> = sqlx::query_as(&format!(
            "{PROFILE_SELECT} ORDER BY u.id LIMIT $2 OFFSET $3"
        ))
        .bind(viewer)
        .bind(page.limit_i64())
        .bind(page.offset())
        .fetch_all(&self.db)
        .await?;

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.db)
            .await?;

        Ok((users, total))
    }

    /// Fetch one profile.
    pub async fn get_profile(&self, viewer: Option<i64>, id: i64) -> Result<UserProfile> {
        sqlx::query_as(&format!("{PROFILE_SELECT} WHERE u.id = $2"))
            .bind(viewer)
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    /// Profiles for a set of ids, in no particular order.
    pub async fn profiles_by_ids(
        &self,
        viewer: Option<i64>,
        ids: &[i64],
    ) -> Result<Vec<UserProfile>> {
        let profiles = sqlx::query_as(&format!("{PROFILE_SELECT} WHERE u.id = ANY($2)"))
            .bind(viewer)
            .bind(ids)
            .fetch_all(&self.db)
            .await?;
        Ok(profiles)
    }

    /// Change the password after checking the current one.
    pub async fn set_password(&self, user_id: i64, req: &SetPasswordRequest) -> Result<()> {
        let hash: String = sqlx::query_scalar("SELECT password_hash FROM users WHERE id = $1")
            .bind(user_id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if !AuthService::verify_password(&req.current_password, &hash)? {
            return Err(AppError::field("current_password", "Invalid password."));
        }

        let mut errors = FieldErrors::new();
        check_password(&mut errors, "new_password", &req.new_password);
        if !errors.is_empty() {
            return Err(AppError::FieldValidation {
                message: "Invalid password".to_string(),
                fields: errors,
            });
        }

        let new_hash = AuthService::hash_password(&req.new_password)?;
        sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(user_id)
            .bind(&new_hash)
            .execute(&self.db)
            .await?;

        tracing::info!(user_id, "Password changed");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn request() -> RegisterRequest {
        RegisterRequest {
            email: "vpupkin@yandex.ru".into(),
            username: "vasya.pupkin".into(),
            first_name: "Вася".into(),
            last_name: "Пупкин".into(),
            password: "Qwerty123!".into(),
        }
    }

    fn fields(err: AppError) -> FieldErrors {
        match err {
            AppError::FieldValidation { fields, .. } => fields,
            other => panic!("expected field errors, got {other:?}"),
        }
    }

    #[test]
    fn test_valid_registration() {
        assert!(validate_registration(&request()).is_ok());
    }

    #[test]
    fn test_reserved_and_invalid_username() {
        let mut req = request();
        req.username = "me".into();
        assert!(fields(validate_registration(&req).unwrap_err()).contains_key("username"));

        req.username = "bad name!".into();
        assert!(fields(validate_registration(&req).unwrap_err()).contains_key("username"));
    }

    #[test]
    fn test_collects_all_field_errors() {
        let req = RegisterRequest {
            email: "not-an-email".into(),
            username: String::new(),
            first_name: String::new(),
            last_name: "x".repeat(NAME_MAX + 1),
            password: "1234".into(),
        };
        let errs = fields(validate_registration(&req).unwrap_err());
        for key in ["email", "username", "first_name", "last_name", "password"] {
            assert!(errs.contains_key(key), "missing {key}");
        }
        assert_eq!(errs["password"].len(), 2);
    }

    #[test]
    fn test_email_shape() {
        assert!(is_valid_email("a@b.co"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("@b.co"));
        assert!(!is_valid_email("a@@b.co"));
        assert!(!is_valid_email("a b@c.co"));
    }
}
