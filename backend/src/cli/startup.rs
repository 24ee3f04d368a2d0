//! Container startup steps and command dispatch.
//!
//! `serve` runs every step in order: wait for the database port, apply
//! migrations, collect static files and export API docs, load reference
//! fixtures, then serve HTTP. Any failing step aborts with an error and the
//! process exits non-zero; restarting the sequence is left to the
//! orchestrator.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::http::{header, Method};
use axum::Router;
use sqlx::PgPool;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::api::{self, AppState};
use crate::assets;
use crate::cli::Command;
use crate::config::Config;
use crate::db;
use crate::error::{AppError, Result};
use crate::fixtures;
use crate::services::user_service::UserService;
use crate::storage::filesystem::FilesystemStorage;

/// Run a CLI command to completion.
pub async fn run(command: Command, config: Config) -> Result<()> {
    match command {
        Command::Serve => serve_with_startup(config).await,
        Command::WaitForDb => wait_for_db(&config).await,
        Command::Migrate => {
            let pool = connect(&config).await?;
            migrate(&pool).await
        }
        Command::CollectStatic => collect_static(&config).await,
        Command::LoadIngredients { path } => {
            let pool = connect(&config).await?;
            let path = path.unwrap_or_else(|| config.ingredients_fixture());
            fixtures::load_ingredients(&pool, &path).await.map(|_| ())
        }
        Command::LoadTags { path } => {
            let pool = connect(&config).await?;
            let path = path.unwrap_or_else(|| config.tags_fixture());
            fixtures::load_tags(&pool, &path).await.map(|_| ())
        }
        Command::CreateSuperuser {
            email,
            username,
            password,
            first_name,
            last_name,
        } => {
            let password = password.filter(|p| !p.is_empty()).ok_or_else(|| {
                AppError::Config("--password or SUPERUSER_PASSWORD is required".to_string())
            })?;
            let pool = connect(&config).await?;
            let user = UserService::new(pool)
                .create_superuser(&email, &username, &password, &first_name, &last_name)
                .await?;
            tracing::info!(user_id = user.id, username = %user.username, "Superuser created");
            Ok(())
        }
        Command::ExportOpenapi { output } => export_openapi(output.as_deref()).await,
    }
}

/// Full startup sequence followed by the HTTP server.
async fn serve_with_startup(config: Config) -> Result<()> {
    wait_for_db(&config).await?;

    let pool = connect(&config).await?;
    migrate(&pool).await?;
    collect_static(&config).await?;
    load_fixtures(&pool, &config).await?;

    serve(config, pool).await
}

pub async fn wait_for_db(config: &Config) -> Result<()> {
    tracing::info!(
        host = %config.db_host,
        port = config.db_port,
        timeout_secs = config.db_wait_timeout.as_secs(),
        "Waiting for database"
    );
    db::wait_for_port(
        &config.db_host,
        config.db_port,
        config.db_wait_timeout,
        config.db_wait_interval,
    )
    .await?;
    Ok(())
}

async fn connect(config: &Config) -> Result<PgPool> {
    let pool = db::create_pool(&config.database_url()).await?;
    tracing::info!("Connected to database");
    Ok(pool)
}

pub async fn migrate(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations complete");
    Ok(())
}

pub async fn collect_static(config: &Config) -> Result<()> {
    assets::collect_static(&config.static_source_dir, &config.static_root).await?;
    assets::export_docs(&config.docs_root).await
}

pub async fn load_fixtures(pool: &PgPool, config: &Config) -> Result<()> {
    fixtures::load_ingredients(pool, &config.ingredients_fixture()).await?;
    fixtures::load_tags(pool, &config.tags_fixture()).await?;
    Ok(())
}

async fn export_openapi(output: Option<&Path>) -> Result<()> {
    let spec = api::openapi::build_openapi()
        .to_pretty_json()
        .map_err(|e| AppError::Internal(format!("Failed to render OpenAPI document: {}", e)))?;

    match output {
        Some(path) => {
            tokio::fs::write(path, spec).await?;
            tracing::info!(path = %path.display(), "OpenAPI document written");
        }
        None => println!("{spec}"),
    }
    Ok(())
}

/// Bind and serve until Ctrl-C or SIGTERM.
pub async fn serve(config: Config, pool: PgPool) -> Result<()> {
    let addr: SocketAddr = config.bind_address.parse()?;
    let media_root: PathBuf = config.media_root.clone();
    tokio::fs::create_dir_all(&media_root).await?;

    let cors = cors_layer(&config);
    let storage = Arc::new(FilesystemStorage::new(media_root));
    let state = Arc::new(AppState::new(config, pool, storage));

    let app = Router::new()
        .merge(api::routes::create_router(state))
        .layer(cors)
        .layer(TraceLayer::new_for_http());

    let listener = TcpListener::bind(addr).await?;
    tracing::info!("Listening on {}", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    tracing::info!("Server stopped");
    Ok(())
}

/// In debug mode a separately served dev frontend calls the API cross-origin
/// with credentials, so its origins are listed explicitly.
fn cors_layer(config: &Config) -> CorsLayer {
    if config.debug {
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|origin| match origin.parse() {
                Ok(value) => Some(value),
                Err(_) => {
                    tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                    None
                }
            })
            .collect();
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::ACCEPT])
            .allow_credentials(true)
    } else {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
        tracing::info!("Received Ctrl+C, shutting down");
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM, shutting down");
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(debug: &str) -> Config {
        let debug = debug.to_string();
        Config::from_lookup(move |key| match key {
            "POSTGRES_PASSWORD" => Some("secret".into()),
            "SECRET_KEY" => Some("test-secret".into()),
            "DEBUG" => Some(debug.clone()),
            "CORS_ORIGINS" => Some("http://localhost:3000, not a url\u{7f}".into()),
            _ => None,
        })
        .unwrap()
    }

    #[tokio::test]
    async fn test_export_openapi_to_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("schema.json");
        export_openapi(Some(&path)).await.unwrap();

        let doc: serde_json::Value =
            serde_json::from_slice(&std::fs::read(&path).unwrap()).unwrap();
        assert!(doc["paths"]["/api/recipes/"].is_object());
    }

    async fn preflight(config: &Config, origin: &str) -> axum::http::HeaderMap {
        use axum::body::Body;
        use axum::http::Request;
        use tower::ServiceExt;

        let app = Router::new()
            .route("/api/recipes/", axum::routing::get(|| async { "ok" }))
            .layer(cors_layer(config));
        let response = app
            .oneshot(
                Request::builder()
                    .method(Method::OPTIONS)
                    .uri("/api/recipes/")
                    .header(header::ORIGIN, origin)
                    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        response.headers().clone()
    }

    #[tokio::test]
    async fn test_cors_debug_admits_listed_origins_with_credentials() {
        let config = config("true");

        let headers = preflight(&config, "http://localhost:3000").await;
        assert_eq!(
            headers[header::ACCESS_CONTROL_ALLOW_ORIGIN],
            "http://localhost:3000"
        );
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_CREDENTIALS], "true");

        let headers = preflight(&config, "http://elsewhere.example").await;
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    }

    #[tokio::test]
    async fn test_cors_production_admits_any_origin() {
        let headers = preflight(&config("false"), "http://elsewhere.example").await;
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert!(!headers.contains_key(header::ACCESS_CONTROL_ALLOW_CREDENTIALS));
    }

    #[tokio::test]
    async fn test_wait_for_db_times_out() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        drop(listener);

        let mut config = config("false");
        config.db_host = "127.0.0.1".into();
        config.db_port = port;
        config.db_wait_timeout = std::time::Duration::from_millis(200);
        config.db_wait_interval = std::time::Duration::from_millis(50);

        assert!(matches!(wait_for_db(&config).await, Err(AppError::Startup(_))));
    }
}
