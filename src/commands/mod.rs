//! Terminal command handlers
//!
//! Each handler backs one `tubeforge` subcommand and returns the process exit
//! code. Handlers print user-facing output to stdout; diagnostics go through
//! `tracing` to stderr.

pub mod analyze;
pub mod bridge;
pub mod command;
pub mod config;
pub mod download;
pub mod render;

// Re-export all command functions for easy access
pub use analyze::*;
pub use bridge::*;
pub use command::*;
pub use config::*;
pub use download::*;
