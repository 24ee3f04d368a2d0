//! Fixed-window rate limiting for credential endpoints.
//!
//! Keys are client addresses. Behind the gateway the TCP peer is always the
//! gateway itself, so the `X-Real-IP` header it sets is preferred when the
//! peer is a private address.

use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header::HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use tokio::sync::Mutex;

/// Header the gateway sets to the original client address.
pub const REAL_IP_HEADER: &str = "x-real-ip";

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Counts requests per key inside a fixed window.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<String, Window>>,
    max_requests: u32,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            windows: Mutex::new(HashMap::new()),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    /// `Ok(remaining)` when allowed, `Err(retry_after_secs)` when exhausted.
    pub async fn check(&self, key: &str) -> Result<u32, u64> {
        self.check_at(key, Instant::now()).await
    }

    async fn check_at(&self, key: &str, now: Instant) -> Result<u32, u64> {
        let mut windows = self.windows.lock().await;

        // Drop stale windows so the map tracks only active clients.
        if windows.len() > 10_000 {
            let window = self.window;
            windows.retain(|_, w| now.duration_since(w.started) < window);
        }

        let entry = windows.entry(key.to_string()).or_insert(Window {
            started: now,
            count: 0,
        });

        if now.duration_since(entry.started) >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }

        if entry.count >= self.max_requests {
            let elapsed = now.duration_since(entry.started);
            let retry_after = self.window.saturating_sub(elapsed).as_secs();
            return Err(retry_after.max(1));
        }

        entry.count += 1;
        Ok(self.max_requests - entry.count)
    }
}

fn is_private(ip: IpAddr) -> bool {
    match ip {
        IpAddr::V4(v4) => v4.is_private() || v4.is_loopback(),
        IpAddr::V6(v6) => v6.is_loopback(),
    }
}

/// Rate limit key for a request.
fn client_key(request: &Request) -> String {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|c| c.0.ip());

    let forwarded = request
        .headers()
        .get(REAL_IP_HEADER)
        .and_then(|h| h.to_str().ok())
        .and_then(|s| s.trim().parse::<IpAddr>().ok());

    match (peer, forwarded) {
        (Some(peer), Some(client)) if is_private(peer) => format!("ip:{}", client),
        (Some(peer), _) => format!("ip:{}", peer),
        (None, _) => "ip:unknown".to_string(),
    }
}

/// Reject with 429 once the caller's window is exhausted.
pub async fn rate_limit_middleware(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let key = client_key(&request);

    match limiter.check(&key).await {
        Ok(_) => next.run(request).await,
        Err(retry_after) => {
            tracing::warn!(key = %key, retry_after, "Rate limit exceeded");
            let mut response = (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "code": "RATE_LIMITED",
                    "message": "Too many requests. Please try again later.",
                })),
            )
                .into_response();
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert("Retry-After", value);
            }
            response
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[tokio::test]
    async fn test_blocks_after_limit() {
        let limiter = RateLimiter::new(3, 60);
        assert_eq!(limiter.check("a").await, Ok(2));
        assert_eq!(limiter.check("a").await, Ok(1));
        assert_eq!(limiter.check("a").await, Ok(0));
        let retry = limiter.check("a").await.unwrap_err();
        assert!((1..=60).contains(&retry));
        // Other keys are unaffected.
        assert!(limiter.check("b").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_resets() {
        let limiter = RateLimiter::new(1, 60);
        let start = Instant::now();
        assert!(limiter.check_at("a", start).await.is_ok());
        assert!(limiter.check_at("a", start + Duration::from_secs(59)).await.is_err());
        assert_eq!(limiter.check_at("a", start + Duration::from_secs(60)).await, Ok(0));
    }

    fn request(peer: Option<&str>, real_ip: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/api/auth/token/login/");
        if let Some(ip) = real_ip {
            builder = builder.header(REAL_IP_HEADER, ip);
        }
        let mut request = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            request.extensions_mut().insert(ConnectInfo(addr));
        }
        request
    }

    #[test]
    fn test_client_key_trusts_gateway_header() {
        let req = request(Some("172.18.0.5:40000"), Some("203.0.113.9"));
        assert_eq!(client_key(&req), "ip:203.0.113.9");
    }

    #[test]
    fn test_client_key_ignores_header_from_public_peer() {
        let req = request(Some("198.51.100.7:40000"), Some("10.0.0.1"));
        assert_eq!(client_key(&req), "ip:198.51.100.7");
    }

    #[test]
    fn test_client_key_without_peer() {
        assert_eq!(client_key(&request(None, Some("203.0.113.9"))), "ip:unknown");
    }
}
