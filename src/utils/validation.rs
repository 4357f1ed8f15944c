//! URL and input validation utilities

use url::Url;

use crate::core::models::{AppError, AppResult};

/// Parse an absolute http(s) URL
pub fn validate_http_url(url: &str) -> AppResult<Url> {
    let parsed =
        Url::parse(url.trim()).map_err(|e| AppError::Config(format!("Invalid URL {}: {}", url, e)))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        other => Err(AppError::Config(format!(
            "Unsupported URL scheme '{}' in {}",
            other, url
        ))),
    }
}

pub fn is_http_url(url: &str) -> bool {
    validate_http_url(url).is_ok()
}
