//! Download hand-off
//!
//! Once the swarm resolves a link, something outside the orchestrator takes
//! over the actual transfer. The hand-off is terminal and never retried.

use async_trait::async_trait;
use std::path::PathBuf;
use std::time::Duration;
use tokio::sync::broadcast;
use tracing::info;

use crate::core::models::{AppError, AppResult, HandoffReceipt, VideoRequest};
use crate::utils::file_utils::{
    ensure_dir_exists, filename_from_content_disposition, format_bytes, stream_response_to_file,
    unique_path,
};
use crate::utils::network::build_http_client;

#[async_trait]
pub trait LinkHandoff: Send + Sync {
    async fn hand_off(&self, download_url: &str, request: &VideoRequest) -> AppResult<HandoffReceipt>;
}

/// Publishes the resolved link for the presentation layer to open
#[derive(Debug, Clone)]
pub struct AnnounceHandoff {
    tx: broadcast::Sender<String>,
}

impl AnnounceHandoff {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<String> {
        self.tx.subscribe()
    }
}

impl Default for AnnounceHandoff {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LinkHandoff for AnnounceHandoff {
    async fn hand_off(&self, download_url: &str, request: &VideoRequest) -> AppResult<HandoffReceipt> {
        info!("Resolved link for {}: {}", request.id, download_url);
        let _ = self.tx.send(download_url.to_string());
        Ok(HandoffReceipt::Announced {
            url: download_url.to_string(),
        })
    }
}

/// Streams the resolved link straight into a local directory
#[derive(Debug, Clone)]
pub struct FetchHandoff {
    client: reqwest::Client,
    output_dir: PathBuf,
    timeout: Duration,
}

impl FetchHandoff {
    pub fn new(client: reqwest::Client, output_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            client,
            output_dir: output_dir.into(),
            timeout,
        }
    }

    pub fn with_output_dir(output_dir: impl Into<PathBuf>, timeout: Duration) -> AppResult<Self> {
        Ok(Self::new(build_http_client()?, output_dir, timeout))
    }
}

fn default_filename(request: &VideoRequest) -> String {
    let ext = if request.desired_quality.is_audio_only() {
        "mp3"
    } else {
        "mp4"
    };
    format!("video-{}.{}", request.id, ext)
}

#[async_trait]
impl LinkHandoff for FetchHandoff {
    async fn hand_off(&self, download_url: &str, request: &VideoRequest) -> AppResult<HandoffReceipt> {
        ensure_dir_exists(&self.output_dir)?;

        let response = self
            .client
            .get(download_url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(AppError::from_transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::EndpointRejected {
                endpoint: download_url.to_string(),
                reason: format!("HTTP {}", status.as_u16()),
            });
        }

        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| default_filename(request));

        let path = unique_path(&self.output_dir, &filename);
        let bytes = stream_response_to_file(response, &path, None).await?;

        info!("Saved {} to {}", format_bytes(bytes), path.display());
        Ok(HandoffReceipt::Saved { path, bytes })
    }
}
