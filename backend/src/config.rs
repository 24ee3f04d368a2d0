//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Application configuration
#[derive(Clone)]
pub struct Config {
    /// Database engine identifier, only "postgresql" is supported
    pub db_engine: String,

    /// Database name
    pub db_name: String,

    /// Database user
    pub db_user: String,

    /// Database password
    pub db_password: String,

    /// Database host, used for the readiness wait and the connection URL
    pub db_host: String,

    /// Database port
    pub db_port: u16,

    /// Full connection URL overriding the assembled one
    pub database_url_override: Option<String>,

    /// Secret key used to sign auth token digests
    pub secret_key: String,

    /// Debug mode: verbose logs, CORS limited to `cors_origins` with credentials
    pub debug: bool,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Directory holding the static assets shipped with the image
    pub static_source_dir: PathBuf,

    /// Shared volume the collected static assets are copied into
    pub static_root: PathBuf,

    /// Shared volume for uploaded recipe images
    pub media_root: PathBuf,

    /// Shared volume for the generated API documentation
    pub docs_root: PathBuf,

    /// Directory with the ingredient and tag fixture files
    pub fixtures_dir: PathBuf,

    /// Upper bound on the startup database readiness wait
    pub db_wait_timeout: Duration,

    /// Delay between readiness probes
    pub db_wait_interval: Duration,

    /// Default page size for paginated lists
    pub page_size: u32,

    /// Hard cap on the `limit` query parameter
    pub max_page_size: u32,

    /// Allowed origins when running in debug mode
    pub cors_origins: Vec<String>,

    /// OTLP collector endpoint (optional)
    pub otel_endpoint: Option<String>,
}

redacted_debug!(Config {
    show db_engine,
    show db_name,
    show db_user,
    redact db_password,
    show db_host,
    show db_port,
    redact_option database_url_override,
    redact secret_key,
    show debug,
    show bind_address,
    show static_source_dir,
    show static_root,
    show media_root,
    show docs_root,
    show fixtures_dir,
    show db_wait_timeout,
    show db_wait_interval,
    show page_size,
    show max_page_size,
    show cors_origins,
    show otel_endpoint,
});

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .ok_or_else(|| AppError::Config(format!("{} not set", key)))
        };

        let db_engine = var_or("DB_ENGINE", "postgresql");
        if !is_postgres_engine(&db_engine) {
            return Err(AppError::Config(format!(
                "Unsupported DB_ENGINE '{}', only postgresql is supported",
                db_engine
            )));
        }

        let db_port_raw = var_or("DB_PORT", "5432");
        let db_port = db_port_raw
            .parse()
            .map_err(|_| AppError::Config(format!("Invalid DB_PORT '{}'", db_port_raw)))?;

        let debug = parse_bool(&var_or("DEBUG", "false"));

        Ok(Self {
            db_engine,
            db_name: var_or("DB_NAME", "foodgram"),
            db_user: var_or("POSTGRES_USER", "foodgram"),
            db_password: required("POSTGRES_PASSWORD")?,
            db_host: var_or("DB_HOST", "db"),
            db_port,
            database_url_override: lookup("DATABASE_URL").filter(|v| !v.is_empty()),
            secret_key: required("SECRET_KEY")?,
            debug,
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:8000"),
            static_source_dir: var_or("STATIC_SOURCE_DIR", "./static").into(),
            static_root: var_or("STATIC_ROOT", "/app/collected_static").into(),
            media_root: var_or("MEDIA_ROOT", "/app/media").into(),
            docs_root: var_or("DOCS_ROOT", "/app/docs").into(),
            fixtures_dir: var_or("FIXTURES_DIR", "./data").into(),
            db_wait_timeout: Duration::from_secs(
                var_or("DB_WAIT_TIMEOUT_SECS", "30").parse().unwrap_or(30),
            ),
            db_wait_interval: Duration::from_millis(
                var_or("DB_WAIT_INTERVAL_MS", "500").parse().unwrap_or(500),
            ),
            page_size: var_or("PAGE_SIZE", "6").parse().unwrap_or(6),
            max_page_size: var_or("MAX_PAGE_SIZE", "100").parse().unwrap_or(100),
            cors_origins: var_or("CORS_ORIGINS", "http://localhost:3000")
                .split(',')
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty())
                .collect(),
            otel_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }

    /// Connection URL, either the explicit override or one assembled from parts.
    pub fn database_url(&self) -> String {
        match &self.database_url_override {
            Some(url) => url.clone(),
            None => format!(
                "postgres://{}:{}@{}:{}/{}",
                self.db_user, self.db_password, self.db_host, self.db_port, self.db_name
            ),
        }
    }

    /// Path to the ingredients fixture file.
    pub fn ingredients_fixture(&self) -> PathBuf {
        self.fixtures_dir.join("ingredients.csv")
    }

    /// Path to the tags fixture file.
    pub fn tags_fixture(&self) -> PathBuf {
        self.fixtures_dir.join("tags.csv")
    }
}

/// Accepts both the bare name and the Django-style dotted backend path.
fn is_postgres_engine(engine: &str) -> bool {
    matches!(
        engine.to_ascii_lowercase().as_str(),
        "postgresql" | "postgres" | "django.db.backends.postgresql"
    )
}

fn parse_bool(raw: &str) -> bool {
    matches!(
        raw.trim().to_ascii_lowercase().as_str(),
        "1" | "true" | "yes" | "on"
    )
}
