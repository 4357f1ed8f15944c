//! `tubeforge command <url>`

use crate::core::fallback::cli_command;
use crate::core::models::VideoQuality;
use crate::core::video_id::require_video_id;
use crate::core::AppConfig;

/// Print the local tool invocation for a URL without contacting any service
pub fn print_command(config: &AppConfig, url: &str, quality: VideoQuality) -> anyhow::Result<i32> {
    if let Err(e) = require_video_id(url) {
        eprintln!("{}", e);
        return Ok(1);
    }

    println!("{}", cli_command(&config.cli.tool, quality, url));
    Ok(0)
}
