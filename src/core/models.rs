//! Core data models for the download orchestrator

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Quality tiers offered to the user

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum VideoQuality {
    #[serde(rename = "2160p (4K)")]
    Q4K,

    #[default]
    #[serde(rename = "1080p (HD)")]
    Q1080,

    #[serde(rename = "720p")]
    Q720,

    #[serde(rename = "480p")]
    Q480,

    #[serde(rename = "Audio Only (MP3)")]
    Audio,
}

impl VideoQuality {
    pub const ALL: [VideoQuality; 5] = [
        VideoQuality::Q4K,
        VideoQuality::Q1080,
        VideoQuality::Q720,
        VideoQuality::Q480,
        VideoQuality::Audio,
    ];

    /// Human readable label, as shown in the quality picker
    pub fn label(&self) -> &'static str {
        match self {
            Self::Q4K => "2160p (4K)",
            Self::Q1080 => "1080p (HD)",
            Self::Q720 => "720p",
            Self::Q480 => "480p",
            Self::Audio => "Audio Only (MP3)",
        }
    }

    /// Quality vocabulary understood by swarm instances
    pub fn swarm_tier(&self) -> &'static str {
        match self {
            Self::Q4K => "max",
            Self::Q1080 => "1080",
            Self::Q720 => "720",
            Self::Q480 | Self::Audio => "480",
        }
    }

    pub fn is_audio_only(&self) -> bool {
        matches!(self, Self::Audio)
    }

    /// Already the most conservative tier, so a safe-mode retry cannot help
    pub fn is_degraded_tier(&self) -> bool {
        matches!(self, Self::Q480 | Self::Audio)
    }

    /// Maximum video height, `None` when the tier is uncapped or has no video
    pub fn height_cap(&self) -> Option<u32> {
        match self {
            Self::Q4K | Self::Audio => None,
            Self::Q1080 => Some(1080),
            Self::Q720 => Some(720),
            Self::Q480 => Some(480),
        }
    }
}

impl fmt::Display for VideoQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for VideoQuality {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_lowercase();
        match normalized.as_str() {
            "2160p (4k)" | "2160p" | "4k" | "max" | "best" => Ok(Self::Q4K),
            "1080p (hd)" | "1080p" | "1080" | "hd" => Ok(Self::Q1080),
            "720p" | "720" => Ok(Self::Q720),
            "480p" | "480" => Ok(Self::Q480),
            "audio only (mp3)" | "audio" | "mp3" | "audio-only" => Ok(Self::Audio),
            _ => Err(AppError::Parse(format!("Unknown quality: {}", s))),
        }
    }
}

/// Delivery strategy for a download session

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryMode {
    #[default]
    Swarm,

    Bridge,

    Cli,

    DirectStream,
}

impl fmt::Display for DeliveryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Swarm => "swarm",
            Self::Bridge => "bridge",
            Self::Cli => "cli",
            Self::DirectStream => "direct",
        };
        f.write_str(name)
    }
}

impl FromStr for DeliveryMode {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "swarm" => Ok(Self::Swarm),
            "bridge" | "server" => Ok(Self::Bridge),
            "cli" | "command" => Ok(Self::Cli),
            "direct" | "direct_stream" | "stream" => Ok(Self::DirectStream),
            _ => Err(AppError::Parse(format!("Unknown delivery mode: {}", s))),
        }
    }
}

/// Session lifecycle states

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionState {
    Idle,

    Analyzing,

    Ready,

    Downloading,

    Completed,

    Error,

    FallbackOffered,
}

impl SessionState {
    pub fn is_busy(&self) -> bool {
        matches!(self, Self::Analyzing | Self::Downloading)
    }

    /// Process exit code for a headless run ending in this state
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Completed => 0,
            Self::FallbackOffered => 2,
            _ => 1,
        }
    }
}

/// A validated download request

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VideoRequest {
    pub id: String,

    pub source_url: String,

    pub desired_quality: VideoQuality,
}

impl VideoRequest {
    /// Same video at a different tier
    pub fn with_quality(&self, quality: VideoQuality) -> Self {
        Self {
            desired_quality: quality,
            ..self.clone()
        }
    }
}

/// Video metadata gathered during analysis

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VideoMetadata {
    pub id: String,

    pub url: String,

    pub thumbnail_url: String,

    pub title: Option<String>,

    pub description: Option<String>,

    pub tags: Vec<String>,

    pub duration: Option<String>,

    pub ai_summary: Option<String>,
}

/// Swarm instance endpoint

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InstanceEndpoint {
    pub url: String,
}

impl InstanceEndpoint {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    pub fn parse(&self) -> Result<url::Url, url::ParseError> {
        url::Url::parse(&self.url)
    }
}

/// Outcome of contacting a single instance

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AttemptOutcome {
    Success { download_url: String },

    Rejected { reason: String },

    NetworkFailure { message: String },

    Timeout,
}

impl AttemptOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttemptResult {
    pub endpoint: InstanceEndpoint,

    pub used_safe_mode: bool,

    pub outcome: AttemptOutcome,
}

/// How a completed session delivered its result

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Delivery {
    /// A resolved download link handed to the link hand-off collaborator
    Link {
        download_url: String,
        receipt: Option<HandoffReceipt>,
    },

    /// A file written by the bridge
    File { path: PathBuf, bytes: u64 },

    /// A command line for the user to run locally
    Command { command: String },
}

/// What the hand-off collaborator did with a resolved link

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HandoffReceipt {
    Announced { url: String },

    Saved { path: PathBuf, bytes: u64 },
}

/// Error categories used for logging and propagation decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorCategory {
    /// Transport level errors (DNS, connection, timeout)
    Network,
    /// Bad responses from a remote instance
    Protocol,
    /// Relay or bridge failures surfaced to the user
    ExternalService,
    /// Invalid settings or transitions
    Configuration,
    /// Disk errors while writing output
    FileSystem,
    /// Input or payload parsing errors
    Parsing,
}

/// Application error types

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Invalid YouTube URL: {0}")]
    InvalidUrl(String),

    #[error("Endpoint {endpoint} rejected request: {reason}")]
    EndpointRejected { endpoint: String, reason: String },

    #[error("Network failure: {message}")]
    NetworkFailure { message: String, timed_out: bool },

    #[error("Bridge failure{}: {body}", status_suffix(.status))]
    BridgeFailure { status: Option<u16>, body: String },

    #[error("All {pool_size} nodes failed")]
    ExhaustionFailure { pool_size: usize },

    #[error("Cannot {event} while session is {from:?}")]
    InvalidTransition { from: SessionState, event: String },

    #[error("Download cancelled")]
    Cancelled,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Parsing error: {0}")]
    Parse(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

fn status_suffix(status: &Option<u16>) -> String {
    status
        .map(|code| format!(" (HTTP {})", code))
        .unwrap_or_default()
}

impl AppError {
    /// Map a transport error, keeping track of timeouts
    pub fn from_transport(error: reqwest::Error) -> Self {
        Self::NetworkFailure {
            timed_out: error.is_timeout(),
            message: error.to_string(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::InvalidUrl(_) | Self::Parse(_) => ErrorCategory::Parsing,
            Self::EndpointRejected { .. } => ErrorCategory::Protocol,
            Self::NetworkFailure { .. } | Self::Network(_) => ErrorCategory::Network,
            Self::BridgeFailure { .. } | Self::ExhaustionFailure { .. } => {
                ErrorCategory::ExternalService
            }
            Self::InvalidTransition { .. } | Self::Cancelled | Self::Config(_) => {
                ErrorCategory::Configuration
            }
            Self::Io(_) => ErrorCategory::FileSystem,
        }
    }

    /// Whether the error ends the whole session rather than a single endpoint attempt
    pub fn is_session_fatal(&self) -> bool {
        !matches!(
            self.category(),
            ErrorCategory::Network | ErrorCategory::Protocol | ErrorCategory::Parsing
        )
    }

    pub fn is_timeout(&self) -> bool {
        match self {
            Self::NetworkFailure { timed_out, .. } => *timed_out,
            Self::Network(e) => e.is_timeout(),
            _ => false,
        }
    }
}

/// Result type alias for application operations

pub type AppResult<T> = Result<T, AppError>;
