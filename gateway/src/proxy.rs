//! Forwarding of API requests to the backend.

use std::net::SocketAddr;

use anyhow::Context;
use axum::body::Body;
use axum::extract::Request;
use axum::http::header::{self, HeaderMap, HeaderName, HeaderValue};
use axum::response::Response;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const REAL_IP_HEADER: &str = "x-real-ip";

/// Connection-scoped headers that must not be forwarded in either direction.
const HOP_BY_HOP: [&str; 8] = [
    "connection",
    "keep-alive",
    "proxy-authenticate",
    "proxy-authorization",
    "te",
    "trailer",
    "transfer-encoding",
    "upgrade",
];

/// Remove hop-by-hop headers, including any named by `Connection`.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    let listed: Vec<HeaderName> = headers
        .get_all(header::CONNECTION)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .filter_map(|name| HeaderName::from_bytes(name.trim().as_bytes()).ok())
        .collect();

    for name in listed {
        headers.remove(&name);
    }
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Headers sent upstream: client headers minus hop-by-hop, plus forwarding
/// metadata. A client-supplied request id is kept.
pub fn upstream_headers(original: &HeaderMap, peer: Option<SocketAddr>) -> HeaderMap {
    let mut headers = original.clone();
    strip_hop_by_hop(&mut headers);
    headers.remove(REAL_IP_HEADER);

    if let Some(host) = headers.remove(header::HOST) {
        headers.insert(HeaderName::from_static("x-forwarded-host"), host);
    }
    headers.insert(
        HeaderName::from_static("x-forwarded-proto"),
        HeaderValue::from_static("http"),
    );

    if let Some(peer) = peer {
        let ip = peer.ip().to_string();
        if let Ok(value) = HeaderValue::from_str(&ip) {
            headers.insert(HeaderName::from_static(REAL_IP_HEADER), value);
        }
        let forwarded_for = match original
            .get("x-forwarded-for")
            .and_then(|v| v.to_str().ok())
        {
            Some(existing) => format!("{existing}, {ip}"),
            None => ip,
        };
        if let Ok(value) = HeaderValue::from_str(&forwarded_for) {
            headers.insert(HeaderName::from_static("x-forwarded-for"), value);
        }
    }

    if !headers.contains_key(REQUEST_ID_HEADER) {
        let id = uuid::Uuid::new_v4().to_string();
        if let Ok(value) = HeaderValue::from_str(&id) {
            headers.insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
        }
    }

    headers
}

/// Forward `request` to `backend_url`, streaming both bodies.
pub async fn forward(
    client: &reqwest::Client,
    backend_url: &str,
    request: Request,
    peer: Option<SocketAddr>,
) -> anyhow::Result<Response> {
    let (parts, body) = request.into_parts();
    let path_and_query = parts
        .uri
        .path_and_query()
        .map_or("/", |pq| pq.as_str());
    let url = format!("{backend_url}{path_and_query}");

    let upstream = client
        .request(parts.method.clone(), &url)
        .headers(upstream_headers(&parts.headers, peer))
        .body(reqwest::Body::wrap_stream(body.into_data_stream()))
        .send()
        .await
        .with_context(|| format!("{} {}", parts.method, url))?;

    let status = upstream.status();
    let mut headers = upstream.headers().clone();
    strip_hop_by_hop(&mut headers);

    let mut response = Response::new(Body::from_stream(upstream.bytes_stream()));
    *response.status_mut() = status;
    *response.headers_mut() = headers;
    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_hop_by_hop() {
        let mut headers = HeaderMap::new();
        headers.insert(header::CONNECTION, HeaderValue::from_static("keep-alive, x-trace"));
        headers.insert("keep-alive", HeaderValue::from_static("timeout=5"));
        headers.insert("x-trace", HeaderValue::from_static("1"));
        headers.insert(header::TRANSFER_ENCODING, HeaderValue::from_static("chunked"));
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Token abc"));
        headers.insert(header::CONTENT_TYPE, HeaderValue::from_static("application/json"));

        strip_hop_by_hop(&mut headers);

        assert!(!headers.contains_key(header::CONNECTION));
        assert!(!headers.contains_key("keep-alive"));
        assert!(!headers.contains_key("x-trace"));
        assert!(!headers.contains_key(header::TRANSFER_ENCODING));
        assert_eq!(headers[header::AUTHORIZATION], "Token abc");
        assert_eq!(headers[header::CONTENT_TYPE], "application/json");
    }

    #[test]
    fn test_upstream_headers_add_forwarding_metadata() {
        let mut original = HeaderMap::new();
        original.insert(header::HOST, HeaderValue::from_static("foodgram.local"));
        original.insert("x-forwarded-for", HeaderValue::from_static("10.1.1.1"));
        let peer: SocketAddr = "192.168.0.7:51234".parse().unwrap();

        let headers = upstream_headers(&original, Some(peer));

        assert!(!headers.contains_key(header::HOST));
        assert_eq!(headers["x-forwarded-host"], "foodgram.local");
        assert_eq!(headers[REAL_IP_HEADER], "192.168.0.7");
        assert_eq!(headers["x-forwarded-for"], "10.1.1.1, 192.168.0.7");
        assert!(headers.contains_key(REQUEST_ID_HEADER));
    }

    #[test]
    fn test_client_request_id_is_kept() {
        let mut original = HeaderMap::new();
        original.insert(REQUEST_ID_HEADER, HeaderValue::from_static("abc-123"));
        original.insert(REAL_IP_HEADER, HeaderValue::from_static("1.2.3.4"));

        let headers = upstream_headers(&original, None);
        assert_eq!(headers[REQUEST_ID_HEADER], "abc-123");
        assert!(!headers.contains_key(REAL_IP_HEADER));
    }
}
