//! Alternate delivery modes
//!
//! Used when the swarm is unavailable or exhausted: a local command line for
//! the user to run, and a client for the self-hosted bridge server.

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::core::config::BridgeConfig;
use crate::core::models::{AppError, AppResult, VideoQuality, VideoRequest};
use crate::utils::file_utils::{
    ensure_dir_exists, filename_from_content_disposition, format_bytes, stream_response_to_file,
    unique_path,
};
use crate::utils::network::build_http_client;

/// A single-line external tool invocation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CliCommand {
    pub tool: String,
    pub args: Vec<String>,
    pub url: String,
}

impl CliCommand {
    /// Arguments as passed to the process, URL last
    pub fn argv(&self) -> Vec<String> {
        let mut argv = self.args.clone();
        argv.push(self.url.clone());
        argv
    }
}

fn needs_quoting(arg: &str) -> bool {
    arg.is_empty()
        || !arg
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || "-_./:=,@%+".contains(c))
}

impl fmt::Display for CliCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.tool)?;
        for arg in &self.args {
            if needs_quoting(arg) {
                write!(f, " \"{}\"", arg)?;
            } else {
                write!(f, " {}", arg)?;
            }
        }
        write!(f, " \"{}\"", self.url)
    }
}

/// yt-dlp arguments selecting the requested tier
pub fn cli_format_args(quality: VideoQuality) -> Vec<String> {
    if quality.is_audio_only() {
        return vec!["-x".into(), "--audio-format".into(), "mp3".into()];
    }

    let selector = match quality.height_cap() {
        Some(h) => format!("bv*[height<={h}]+ba/b[height<={h}]"),
        None => "bv*+ba/b".to_string(),
    };
    vec![
        "-f".into(),
        selector,
        "--merge-output-format".into(),
        "mp4".into(),
    ]
}

/// Deterministic command for the given tier and source URL
pub fn cli_command(tool: &str, quality: VideoQuality, source_url: &str) -> CliCommand {
    CliCommand {
        tool: tool.to_string(),
        args: cli_format_args(quality),
        url: source_url.to_string(),
    }
}

/// Format selection used by the bridge server when invoking yt-dlp
pub fn bridge_format_args(quality: VideoQuality) -> Vec<&'static str> {
    match quality {
        VideoQuality::Q4K => vec!["-f", "bv*[height<=2160]+ba/b"],
        VideoQuality::Q1080 => vec!["-f", "bv*[height<=1080]+ba/b"],
        VideoQuality::Q720 => vec!["-f", "bv*[height<=720]+ba/b"],
        VideoQuality::Q480 => vec!["-f", "bv*[height<=480]+ba/b"],
        VideoQuality::Audio => vec!["-x", "--audio-format", "mp3"],
    }
}

/// Body POSTed to the bridge
#[derive(Debug, Serialize)]
pub struct BridgeRequestBody<'a> {
    pub url: &'a str,
    pub quality: &'a str,
}

/// File written from a bridge stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BridgeDelivery {
    pub path: PathBuf,
    pub bytes: u64,
}

/// Client for a user-operated bridge server
#[derive(Debug, Clone)]
pub struct BridgeClient {
    client: reqwest::Client,
    endpoint: String,
    timeout: Duration,
    output_dir: PathBuf,
}

impl BridgeClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: impl Into<String>,
        timeout: Duration,
        output_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            timeout,
            output_dir: output_dir.into(),
        }
    }

    pub fn from_config(config: &BridgeConfig) -> AppResult<Self> {
        let output_dir = config
            .output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        Ok(Self::new(
            build_http_client()?,
            config.endpoint.clone(),
            Duration::from_secs(config.timeout_seconds),
            output_dir,
        ))
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Ask the bridge to retrieve the video and stream it to disk
    pub async fn fetch(
        &self,
        request: &VideoRequest,
        cancel_flag: Option<&AtomicBool>,
    ) -> AppResult<BridgeDelivery> {
        let body = BridgeRequestBody {
            url: &request.source_url,
            quality: request.desired_quality.label(),
        };

        debug!("POST {} ({})", self.endpoint, body.quality);
        let response = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| AppError::BridgeFailure {
                status: None,
                body: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = match response.text().await {
                Ok(text) => text,
                Err(e) => {
                    warn!("Bridge error body unreadable: {}", e);
                    format!("HTTP {} (body unreadable: {})", status.as_u16(), e)
                }
            };
            return Err(AppError::BridgeFailure {
                status: Some(status.as_u16()),
                body: text,
            });
        }

        ensure_dir_exists(&self.output_dir)?;
        let filename = response
            .headers()
            .get(reqwest::header::CONTENT_DISPOSITION)
            .and_then(|v| v.to_str().ok())
            .and_then(filename_from_content_disposition)
            .unwrap_or_else(|| format!("video-{}.mp4", request.id));

        let path = unique_path(&self.output_dir, &filename);
        let bytes = stream_response_to_file(response, &path, cancel_flag)
            .await
            .map_err(|e| match e {
                AppError::NetworkFailure { message, .. } => AppError::BridgeFailure {
                    status: Some(status.as_u16()),
                    body: format!("stream interrupted: {}", message),
                },
                other => other,
            })?;

        info!("Bridge delivered {} to {}", format_bytes(bytes), path.display());
        Ok(BridgeDelivery { path, bytes })
    }
}
