//! Per-request span and request id propagation.
//!
//! The id comes from `X-Request-ID` when the caller (normally the gateway)
//! sent a usable one, else from the trace id of a W3C `traceparent`, else a
//! fresh UUID. It is echoed on the response.

use std::time::Instant;

use axum::{
    extract::Request,
    http::{header::HeaderValue, HeaderMap},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
const TRACEPARENT_HEADER: &str = "traceparent";
const MAX_REQUEST_ID_LEN: usize = 128;

/// Request id, stored as a request extension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestId(pub String);

fn usable(id: &str) -> bool {
    !id.is_empty()
        && id.len() <= MAX_REQUEST_ID_LEN
        && id.bytes().all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// `00-<32 hex trace id>-<16 hex parent id>-<2 hex flags>`
fn trace_id_from_traceparent(value: &str) -> Option<&str> {
    let mut parts = value.split('-');
    let (_version, trace_id) = (parts.next()?, parts.next()?);
    (trace_id.len() == 32 && trace_id.bytes().all(|b| b.is_ascii_hexdigit())).then_some(trace_id)
}

pub fn resolve_request_id(headers: &HeaderMap) -> RequestId {
    let header = |name: &str| headers.get(name).and_then(|h| h.to_str().ok());

    if let Some(id) = header(REQUEST_ID_HEADER).map(str::trim).filter(|id| usable(id)) {
        return RequestId(id.to_string());
    }
    if let Some(trace_id) = header(TRACEPARENT_HEADER).and_then(trace_id_from_traceparent) {
        return RequestId(trace_id.to_string());
    }
    RequestId(Uuid::new_v4().to_string())
}

pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = resolve_request_id(request.headers());
    request.extensions_mut().insert(request_id.clone());

    let span = tracing::info_span!(
        "http_request",
        request_id = %request_id.0,
        method = %request.method(),
        path = %request.uri().path(),
    );

    async move {
        let started = Instant::now();
        let mut response = next.run(request).await;

        if let Ok(value) = HeaderValue::from_str(&request_id.0) {
            response.headers_mut().insert(REQUEST_ID_HEADER, value);
        }
        tracing::info!(
            status = response.status().as_u16(),
            latency_ms = started.elapsed().as_millis() as u64,
            "Request completed"
        );
        response
    }
    .instrument(span)
    .await
}
