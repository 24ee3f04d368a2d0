//! Shared Data Transfer Objects (DTOs) for API handlers.
//!
//! List endpoints share one envelope, `{count, next, previous, results}`,
//! driven by the `page` / `limit` query parameters.

use axum::http::Uri;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

/// Query parameters for paginated list requests.
#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct PaginationQuery {
    /// Requested page number (default: 1)
    pub page: Option<u32>,
    /// Requested items per page (default: server page size)
    pub limit: Option<u32>,
}

/// Resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageParams {
    pub page: u32,
    pub limit: u32,
}

impl PageParams {
    /// Resolve query values against the configured default and cap.
    pub fn resolve(query: &PaginationQuery, default_limit: u32, max_limit: u32) -> Self {
        let limit = query
            .limit
            .filter(|l| *l > 0)
            .unwrap_or(default_limit)
            .min(max_limit.max(1));
        Self {
            page: query.page.unwrap_or(1).max(1),
            limit,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page as i64 - 1) * self.limit as i64
    }

    pub fn limit_i64(&self) -> i64 {
        self.limit as i64
    }
}

/// Paginated list envelope.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct Page<T> {
    /// Total number of items across all pages
    pub count: i64,
    /// Link to the next page, if any
    pub next: Option<String>,
    /// Link to the previous page, if any
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Page<T> {
    /// Build the envelope; links keep every other query parameter of `uri`.
    pub fn new(results: Vec<T>, count: i64, params: PageParams, uri: &Uri) -> Self {
        let last_page = if count <= 0 {
            1
        } else {
            ((count + params.limit as i64 - 1) / params.limit as i64) as u32
        };

        let next = (params.page < last_page).then(|| page_link(uri, params.page + 1));
        let previous = (params.page > 1).then(|| page_link(uri, params.page - 1));

        Self {
            count,
            next,
            previous,
            results,
        }
    }
}

/// Rewrite the `page` parameter of `uri`, keeping the rest of the query.
fn page_link(uri: &Uri, page: u32) -> String {
    let mut parts: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|p| !p.is_empty() && !p.starts_with("page=") && *p != "page")
        .map(str::to_string)
        .collect();
    parts.push(format!("page={}", page));
    format!("{}?{}", uri.path(), parts.join("&"))
}
