//! Page-number pagination for list endpoints.
//!
//! `?page=N&limit=M` in, `{count, next, previous, results}` out. `next` and
//! `previous` are relative links that keep the remaining query parameters.

use axum::http::Uri;
use serde::{Deserialize, Serialize};

use crate::config::PaginationConfig;
use crate::error::{AppError, AppResult};

#[derive(Debug, Clone, Copy, Deserialize, Default)]
pub struct PageParams {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// A resolved page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub number: i64,
    pub size: i64,
}

impl Page {
    pub fn resolve(params: PageParams, cfg: &PaginationConfig) -> AppResult<Self> {
        let number = params.page.unwrap_or(1);
        if number < 1 {
            return Err(AppError::NotFound("Invalid page".to_string()));
        }
        let size = params.limit.unwrap_or(cfg.default_page_size as i64);
        if size < 1 {
            return Err(AppError::ValidationError {
                field: "limit".to_string(),
                message: "Value must be positive".to_string(),
            });
        }
        Ok(Self { number, size: size.min(cfg.max_page_size as i64) })
    }

    pub fn offset(&self) -> i64 {
        (self.number - 1).saturating_mul(self.size)
    }
}

#[derive(Debug, Serialize)]
pub struct Paginated<T> {
    pub count: i64,
    pub next: Option<String>,
    pub previous: Option<String>,
    pub results: Vec<T>,
}

impl<T> Paginated<T> {
    pub fn new(results: Vec<T>, count: i64, page: Page, uri: &Uri) -> Self {
        let has_next = page.offset() + (results.len() as i64) < count;
        let next = has_next.then(|| page_link(uri, Some(page.number + 1)));
        let previous = (page.number > 1).then(|| {
            // Page 1 is linked without the page parameter
            page_link(uri, if page.number == 2 { None } else { Some(page.number - 1) })
        });
        Self { count, next, previous, results }
    }
}

fn page_link(uri: &Uri, page: Option<i64>) -> String {
    let mut params: Vec<String> = uri
        .query()
        .unwrap_or("")
        .split('&')
        .filter(|kv| !kv.is_empty() && !kv.starts_with("page="))
        .map(str::to_string)
        .collect();
    if let Some(p) = page {
        params.push(format!("page={}", p));
    }
    if params.is_empty() {
        uri.path().to_string()
    } else {
        format!("{}?{}", uri.path(), params.join("&"))
    }
}
