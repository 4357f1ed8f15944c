//! TubeForge - Core Library
//!
//! This library resolves YouTube downloads through a pool of public swarm
//! instances, with bridge, direct stream and command-line fallbacks.

pub mod commands;
pub mod core;
pub mod utils;

// Re-export commonly used types
pub use crate::core::{
    activity_log::{ActivityLog, LogEntry, Severity},
    config::AppConfig,
    fallback::{cli_command, BridgeClient, CliCommand},
    handoff::{AnnounceHandoff, FetchHandoff, LinkHandoff},
    instance_pool::InstancePool,
    metadata::{MetadataResolver, OEmbedResolver},
    models::{AppError, AppResult, DeliveryMode, SessionState, VideoMetadata, VideoQuality},
    orchestrator::{CancelHandle, DownloadOutcome, DownloadSession, Orchestrator},
    swarm::{ReqwestSwarmTransport, SwarmTransport},
    video_id::extract_video_id,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Library name
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Initialize the library with default settings
pub fn init() -> anyhow::Result<()> {
    utils::logging::init_tracing();

    tracing::info!("{} v{} initialized", NAME, VERSION);
    Ok(())
}
