//! Gateway configuration from environment variables.

use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub bind_address: String,
    /// Base URL of the API server, without a trailing slash
    pub backend_url: String,
    pub frontend_root: PathBuf,
    pub static_root: PathBuf,
    pub media_root: PathBuf,
    pub docs_root: PathBuf,
    pub backend_timeout: Duration,
    pub check_interval: Duration,
}

impl GatewayConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let var_or = |key: &str, default: &str| {
            lookup(key)
                .filter(|v| !v.is_empty())
                .unwrap_or_else(|| default.to_string())
        };
        let secs = |key: &str, default: u64| {
            Duration::from_secs(var_or(key, "").parse().unwrap_or(default))
        };

        Self {
            bind_address: var_or("BIND_ADDRESS", "0.0.0.0:80"),
            backend_url: var_or("BACKEND_URL", "http://backend:8000")
                .trim_end_matches('/')
                .to_string(),
            frontend_root: var_or("FRONTEND_ROOT", "/usr/share/foodgram/frontend").into(),
            static_root: var_or("STATIC_ROOT", "/usr/share/foodgram/static").into(),
            media_root: var_or("MEDIA_ROOT", "/usr/share/foodgram/media").into(),
            docs_root: var_or("DOCS_ROOT", "/usr/share/foodgram/docs").into(),
            backend_timeout: secs("BACKEND_TIMEOUT_SECS", 60),
            check_interval: secs("BACKEND_CHECK_INTERVAL_SECS", 30),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = GatewayConfig::from_lookup(|_| None);
        assert_eq!(config.bind_address, "0.0.0.0:80");
        assert_eq!(config.backend_url, "http://backend:8000");
        assert_eq!(config.check_interval, Duration::from_secs(30));
    }

    #[test]
    fn test_backend_url_trailing_slash_trimmed() {
        let config = GatewayConfig::from_lookup(|key| match key {
            "BACKEND_URL" => Some("http://127.0.0.1:8000/".into()),
            "BACKEND_CHECK_INTERVAL_SECS" => Some("nope".into()),
            _ => None,
        });
        assert_eq!(config.backend_url, "http://127.0.0.1:8000");
        assert_eq!(config.check_interval, Duration::from_secs(30));
    }
}
