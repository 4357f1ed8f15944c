//! Video id extraction
//!
//! Recognises the common YouTube URL shapes (`watch?v=`, `youtu.be/`, `/embed/`,
//! `/v/` and the legacy `/u/<x>/` form) with a single pattern.

use regex::Regex;
use std::sync::OnceLock;
use tracing::error;

use crate::core::models::{AppError, AppResult};

/// Length of a canonical YouTube video id
pub const VIDEO_ID_LEN: usize = 11;

const VIDEO_ID_PATTERN: &str =
    r"^.*((youtu\.be/)|(v/)|(/u/\w/)|(embed/)|(watch\?))\??v?=?(?P<id>[^#&?]*).*";

/// Compiled once; `None` only if the pattern itself is broken
fn video_id_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| match Regex::new(VIDEO_ID_PATTERN) {
            Ok(regex) => Some(regex),
            Err(e) => {
                error!("Video id pattern failed to compile: {}", e);
                None
            }
        })
        .as_ref()
}

/// Extract the 11 character id, `None` if the input is not a recognised video URL
pub fn extract_video_id(input: &str) -> Option<String> {
    let captures = video_id_pattern()?.captures(input.trim())?;
    let id = captures.name("id")?.as_str();
    (id.chars().count() == VIDEO_ID_LEN).then(|| id.to_string())
}

/// Like [`extract_video_id`] but reports `InvalidUrl`
pub fn require_video_id(input: &str) -> AppResult<String> {
    extract_video_id(input).ok_or_else(|| AppError::InvalidUrl(input.trim().to_string()))
}

pub fn thumbnail_url(video_id: &str) -> String {
    format!("https://img.youtube.com/vi/{}/maxresdefault.jpg", video_id)
}
