//! Core business logic module
//!
//! This module contains the domain models, the swarm download orchestrator and
//! the collaborators it drives (metadata lookup, link hand-off, bridge relay).

pub mod activity_log;
pub mod bridge_server;
pub mod config;
pub mod fallback;
pub mod handoff;
pub mod instance_pool;
pub mod metadata;
pub mod models;
pub mod orchestrator;
pub mod swarm;
pub mod video_id;

#[cfg(test)]
pub(crate) mod test_support;

#[cfg(test)]
mod orchestrator_integration_tests;


// Re-export commonly used types
pub use config::AppConfig;
pub use orchestrator::{DownloadOutcome, Orchestrator};
