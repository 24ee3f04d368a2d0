//! Security headers middleware.

use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const API_CSP: &str = "default-src 'none'; frame-ancestors 'none'";

/// Documentation pages load their viewer bundles and inline bootstrap code.
const DOCS_CSP: &str = "default-src 'self'; script-src 'self' 'unsafe-inline' https://cdn.redoc.ly; \
     style-src 'self' 'unsafe-inline' https://fonts.googleapis.com; font-src 'self' https://fonts.gstatic.com; \
     img-src 'self' data: https://cdn.redoc.ly; worker-src 'self' blob:; frame-ancestors 'none'";

fn content_security_policy(path: &str) -> &'static str {
    if path.starts_with("/api/docs/") {
        DOCS_CSP
    } else {
        API_CSP
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let csp = content_security_policy(request.uri().path());
    let mut response = next.run(request).await;
    let headers = response.headers_mut();

    let fixed: [(&'static str, &'static str); 4] = [
        ("x-frame-options", "DENY"),
        ("x-content-type-options", "nosniff"),
        ("referrer-policy", "same-origin"),
        ("cross-origin-opener-policy", "same-origin"),
    ];
    for (name, value) in fixed {
        headers.insert(HeaderName::from_static(name), HeaderValue::from_static(value));
    }
    headers.insert(
        HeaderName::from_static("content-security-policy"),
        HeaderValue::from_static(csp),
    );

    response
}
