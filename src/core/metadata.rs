//! Best-effort metadata lookup
//!
//! The resolver never fails to its caller. Any transport, status or payload
//! problem collapses into [`ResolvedMetadata::unavailable`].

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

use crate::core::config::MetadataConfig;

/// Title used when the lookup yields nothing
pub const UNAVAILABLE_TITLE: &str = "unavailable";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolvedMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub tags: Vec<String>,
    pub ai_summary: Option<String>,
}

impl ResolvedMetadata {
    pub fn unavailable() -> Self {
        Self {
            title: Some(UNAVAILABLE_TITLE.to_string()),
            ..Self::default()
        }
    }

    pub fn is_unavailable(&self) -> bool {
        self.title.as_deref() == Some(UNAVAILABLE_TITLE)
    }
}

#[async_trait]
pub trait MetadataResolver: Send + Sync {
    async fn resolve(&self, video_id: &str, url: &str) -> ResolvedMetadata;
}

/// Lookup reply (oEmbed shape)
#[derive(Debug, Default, Deserialize)]
struct OEmbedReply {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    author_name: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

impl OEmbedReply {
    fn into_metadata(self) -> ResolvedMetadata {
        if let Some(error) = self.error {
            debug!("Metadata service reported: {}", error);
            return ResolvedMetadata::unavailable();
        }

        ResolvedMetadata {
            title: self.title.filter(|t| !t.trim().is_empty()),
            description: self.author_name.map(|author| format!("by {}", author)),
            tags: Vec::new(),
            ai_summary: None,
        }
    }
}

/// Public oEmbed-style lookup service
#[derive(Debug, Clone)]
pub struct OEmbedResolver {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
}

impl OEmbedResolver {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
        }
    }

    pub fn from_config(client: reqwest::Client, config: &MetadataConfig) -> Self {
        Self::new(
            client,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_seconds),
        )
    }

    async fn lookup(&self, url: &str) -> Result<ResolvedMetadata, reqwest::Error> {
        let reply: OEmbedReply = self
            .client
            .get(&self.endpoint)
            .query(&[("url", url)])
            .timeout(self.timeout)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;
        Ok(reply.into_metadata())
    }
}

#[async_trait]
impl MetadataResolver for OEmbedResolver {
    async fn resolve(&self, video_id: &str, url: &str) -> ResolvedMetadata {
        match self.lookup(url).await {
            Ok(metadata) => metadata,
            Err(e) => {
                warn!("Metadata lookup for {} failed: {}", video_id, e);
                ResolvedMetadata::unavailable()
            }
        }
    }
}

/// Resolver used when lookups are switched off
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledResolver;

#[async_trait]
impl MetadataResolver for DisabledResolver {
    async fn resolve(&self, _video_id: &str, _url: &str) -> ResolvedMetadata {
        ResolvedMetadata::default()
    }
}
