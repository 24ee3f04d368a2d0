//! Foodgram Gateway - single-port entry point.
//!
//! Serves API docs, static files, media and the frontend build from their
//! volumes and forwards `/api/` to the backend.

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::{Json, Router};
use tokio::sync::RwLock;
use tower::ServiceExt;
use tower_http::services::{ServeDir, ServeFile};
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod config;
mod proxy;
mod routing;

use config::GatewayConfig;
use routing::Target;

/// Gateway state with backend reachability tracking.
pub struct GatewayState {
    pub config: GatewayConfig,
    pub client: reqwest::Client,
    /// Set while the backend cannot be reached.
    pub is_offline: AtomicBool,
    /// Timestamp of the last successful backend response.
    pub last_backend_contact: RwLock<Option<Instant>>,
    docs: ServeDir,
    static_files: ServeDir,
    media: ServeDir,
    frontend: ServeDir<ServeFile>,
}

impl GatewayState {
    pub fn new(config: GatewayConfig, client: reqwest::Client) -> Self {
        let index = config.frontend_root.join("index.html");
        Self {
            docs: ServeDir::new(&config.docs_root),
            static_files: ServeDir::new(&config.static_root),
            media: ServeDir::new(&config.media_root).append_index_html_on_directories(false),
            frontend: ServeDir::new(&config.frontend_root).fallback(ServeFile::new(index)),
            config,
            client,
            is_offline: AtomicBool::new(false),
            last_backend_contact: RwLock::new(None),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "foodgram_gateway=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = GatewayConfig::from_env();
    tracing::info!("Starting Foodgram gateway");
    tracing::info!("Backend: {}", config.backend_url);

    let client = reqwest::Client::builder()
        .timeout(config.backend_timeout)
        .redirect(reqwest::redirect::Policy::none())
        .build()?;
    let addr: SocketAddr = config.bind_address.parse()?;
    let state = Arc::new(GatewayState::new(config, client));

    let connectivity_state = state.clone();
    tokio::spawn(async move {
        connectivity_check_loop(connectivity_state).await;
    });

    let app = app(state);

    tracing::info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

fn app(state: Arc<GatewayState>) -> Router {
    Router::new()
        .fallback(dispatch)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn dispatch(State(state): State<Arc<GatewayState>>, request: Request) -> Response {
    let target = routing::classify(request.uri().path());
    match target {
        Target::Health => health_check(&state).await.into_response(),
        Target::Backend => proxy_to_backend(&state, request).await,
        Target::Docs => serve_dir(state.docs.clone(), target, request).await,
        Target::Static => serve_dir(state.static_files.clone(), target, request).await,
        Target::Media => serve_dir(state.media.clone(), target, request).await,
        Target::Frontend => serve_dir(state.frontend.clone(), target, request).await,
    }
}

/// Serve `request` from a volume after mapping its path into the volume.
async fn serve_dir<S>(service: S, target: Target, mut request: Request) -> Response
where
    S: tower::Service<Request, Error = std::convert::Infallible>,
    S::Response: IntoResponse,
{
    let path = routing::volume_path(target, request.uri().path());
    let rewritten = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path,
    };
    match rewritten.parse() {
        Ok(uri) => *request.uri_mut() = uri,
        Err(_) => return StatusCode::BAD_REQUEST.into_response(),
    }

    match service.oneshot(request).await {
        Ok(response) => response.into_response(),
        Err(never) => match never {},
    }
}

async fn proxy_to_backend(state: &GatewayState, request: Request) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);

    match proxy::forward(&state.client, &state.config.backend_url, request, peer).await {
        Ok(response) => {
            mark_online(state).await;
            response
        }
        Err(e) => {
            if is_connectivity_error(&e) {
                mark_offline(state);
            }
            tracing::warn!(error = %e, "Backend request failed");
            (
                StatusCode::BAD_GATEWAY,
                Json(serde_json::json!({
                    "code": "BAD_GATEWAY",
                    "message": "The API server is unavailable. Please try again later.",
                })),
            )
                .into_response()
        }
    }
}

/// Check if an error indicates the backend cannot be reached.
fn is_connectivity_error(err: &anyhow::Error) -> bool {
    err.downcast_ref::<reqwest::Error>()
        .is_some_and(|e| e.is_connect() || e.is_timeout())
}

async fn mark_online(state: &GatewayState) {
    if state.is_offline.swap(false, Ordering::SeqCst) {
        tracing::info!("Backend is reachable again");
    }
    let mut last_contact = state.last_backend_contact.write().await;
    *last_contact = Some(Instant::now());
}

fn mark_offline(state: &GatewayState) {
    if !state.is_offline.swap(true, Ordering::SeqCst) {
        tracing::warn!("Backend became unreachable");
    }
}

/// Gateway status. Always 200: static content is still served while the
/// backend is down.
async fn health_check(state: &GatewayState) -> Json<serde_json::Value> {
    let is_offline = state.is_offline.load(Ordering::SeqCst);
    let seconds_since_contact = state
        .last_backend_contact
        .read()
        .await
        .map(|t| t.elapsed().as_secs());

    Json(serde_json::json!({
        "status": if is_offline { "degraded" } else { "ok" },
        "backend_reachable": !is_offline,
        "seconds_since_backend_contact": seconds_since_contact,
    }))
}

/// Probe the backend's `/health` on a fixed interval and track transitions.
async fn connectivity_check_loop(state: Arc<GatewayState>) {
    let health_url = format!("{}/health", state.config.backend_url);

    loop {
        match state.client.get(&health_url).send().await {
            Ok(response) if response.status().is_success() => mark_online(&state).await,
            Ok(response) => {
                tracing::debug!(status = %response.status(), "Backend health check not successful");
                mark_offline(&state);
            }
            Err(e) => {
                tracing::debug!(error = %e, "Backend health check failed");
                mark_offline(&state);
            }
        }
        tokio::time::sleep(state.config.check_interval).await;
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
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
    tracing::info!("Shutting down");
}
