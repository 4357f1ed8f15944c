//! Swarm instance protocol
//!
//! Wire types for the JSON API spoken by swarm instances and the transport seam
//! the orchestrator drives. A single instance is contacted with a primary request
//! and, when that is refused, at most one safe-mode request.

use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use url::Url;

use crate::core::models::{AppError, AppResult, AttemptOutcome, VideoRequest};

/// Tier forced by a safe-mode retry
pub const SAFE_MODE_TIER: &str = "720";

/// Static request fields shared by every attempt
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestProfile {
    pub audio_format: String,
    pub filename_style: String,
}

impl Default for RequestProfile {
    fn default() -> Self {
        Self {
            audio_format: "mp3".to_string(),
            filename_style: "basic".to_string(),
        }
    }
}

/// Body POSTed to an instance
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SwarmRequest {
    pub url: String,
    pub v_quality: String,
    pub a_format: String,
    pub filename_style: String,
    pub is_audio_only: bool,
    pub disable_metadata: bool,
}

impl SwarmRequest {
    /// The user's own tier
    pub fn primary(request: &VideoRequest, profile: &RequestProfile) -> Self {
        Self {
            url: request.source_url.clone(),
            v_quality: request.desired_quality.swarm_tier().to_string(),
            a_format: profile.audio_format.clone(),
            filename_style: profile.filename_style.clone(),
            is_audio_only: request.desired_quality.is_audio_only(),
            disable_metadata: false,
        }
    }

    /// Degraded retry: 720p with metadata stripped
    pub fn safe_mode(request: &VideoRequest, profile: &RequestProfile) -> Self {
        Self {
            v_quality: SAFE_MODE_TIER.to_string(),
            disable_metadata: true,
            ..Self::primary(request, profile)
        }
    }

    pub fn is_safe_mode(&self) -> bool {
        self.disable_metadata
    }
}

/// Reply body; every field is optional on the wire
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct SwarmReply {
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub pickle: Option<serde_json::Value>,
    #[serde(default)]
    pub text: Option<String>,
}

impl SwarmReply {
    pub fn parse(body: &str) -> AppResult<Self> {
        serde_json::from_str(body)
            .map_err(|e| AppError::Parse(format!("Malformed instance reply: {}", e)))
    }

    pub fn is_error(&self) -> bool {
        self.status.as_deref() == Some("error")
    }

    /// Usable link, `None` for an explicit error or a reply carrying neither `url` nor `pickle`
    pub fn download_url(&self) -> Option<String> {
        if self.is_error() {
            return None;
        }

        let direct = self.url.as_deref().filter(|u| !u.is_empty());
        let picked = self.pickle.as_ref().and_then(|p| match p {
            serde_json::Value::String(s) => Some(s.as_str()),
            serde_json::Value::Object(map) => map.get("url").and_then(|u| u.as_str()),
            serde_json::Value::Array(items) => items
                .iter()
                .find_map(|item| item.get("url").and_then(|u| u.as_str())),
            _ => None,
        });

        direct
            .or(picked.filter(|u| !u.is_empty()))
            .map(str::to_string)
    }

    fn rejection_reason(&self) -> String {
        match (&self.text, self.is_error()) {
            (Some(text), _) if !text.is_empty() => text.clone(),
            (_, true) => "instance reported an error".to_string(),
            _ => "reply carried no download link".to_string(),
        }
    }
}

/// Raw status and body as received from an instance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportResponse {
    pub status: u16,
    pub body: String,
}

impl TransportResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Classify a response the way the swarm cycle consumes it
    pub fn interpret(&self) -> AttemptOutcome {
        if !self.is_success() {
            return AttemptOutcome::Rejected {
                reason: format!("HTTP {}", self.status),
            };
        }

        match SwarmReply::parse(&self.body) {
            Ok(reply) => match reply.download_url() {
                Some(download_url) => AttemptOutcome::Success { download_url },
                None => AttemptOutcome::Rejected {
                    reason: reply.rejection_reason(),
                },
            },
            Err(e) => AttemptOutcome::Rejected {
                reason: e.to_string(),
            },
        }
    }
}

/// Outbound seam for instance calls
#[async_trait]
pub trait SwarmTransport: Send + Sync {
    async fn post_json(
        &self,
        endpoint: &Url,
        request: &SwarmRequest,
        timeout: Duration,
    ) -> AppResult<TransportResponse>;
}

/// HTTP transport backed by reqwest
#[derive(Debug, Clone)]
pub struct ReqwestSwarmTransport {
    client: reqwest::Client,
}

impl ReqwestSwarmTransport {
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl SwarmTransport for ReqwestSwarmTransport {
    async fn post_json(
        &self,
        endpoint: &Url,
        request: &SwarmRequest,
        timeout: Duration,
    ) -> AppResult<TransportResponse> {
        let response = self
            .client
            .post(endpoint.clone())
            .header(ACCEPT, "application/json")
            .json(request)
            .timeout(timeout)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        let status = response.status().as_u16();
        let body = response.text().await.map_err(AppError::from_transport)?;

        tracing::debug!("{} answered HTTP {} ({} bytes)", endpoint, status, body.len());
        Ok(TransportResponse { status, body })
    }
}
