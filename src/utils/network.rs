//! Network utilities and helpers

use std::time::Duration;

use crate::core::models::{AppError, AppResult};

/// Connect timeout shared by every client
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Get user agent string
pub fn get_user_agent() -> String {
    format!("TubeForge/{}", env!("CARGO_PKG_VERSION"))
}

/// Build a client with the shared user agent and connect timeout
///
/// Per-request timeouts are applied by the caller.
pub fn build_http_client() -> AppResult<reqwest::Client> {
    build_http_client_with(&get_user_agent())
}

pub fn build_http_client_with(user_agent: &str) -> AppResult<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(user_agent)
        .connect_timeout(CONNECT_TIMEOUT)
        .build()
        .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_user_agent_carries_version() {
        assert!(get_user_agent().starts_with("TubeForge/"));
        assert!(build_http_client().is_ok());
    }
}
