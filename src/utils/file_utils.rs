//! File system utilities

use futures_util::StreamExt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::fs::File;
use tokio::io::AsyncWriteExt;

use crate::core::models::{AppError, AppResult};

/// Ensure directory exists
pub fn ensure_dir_exists(path: &Path) -> AppResult<()> {
    if !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}

/// Sanitize filename for filesystem
pub fn sanitize_filename(filename: &str) -> String {
    let cleaned: String = filename
        .chars()
        .map(|c| match c {
            '<' | '>' | ':' | '"' | '|' | '?' | '*' => '_',
            '/' | '\\' => '_',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let trimmed = cleaned.trim().trim_matches('.');
    if trimmed.is_empty() {
        "download".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Filename advertised by a `Content-Disposition` header
///
/// `filename*=UTF-8''...` wins over the plain `filename=` parameter.
pub fn filename_from_content_disposition(header: &str) -> Option<String> {
    let mut plain = None;
    let mut extended = None;

    for part in header.split(';').map(str::trim) {
        let Some((key, value)) = part.split_once('=') else {
            continue;
        };
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = value.trim().trim_matches('"');
                let raw = encoded
                    .split_once("''")
                    .map(|(_, rest)| rest)
                    .unwrap_or(encoded);
                extended = Some(percent_decode(raw));
            }
            "filename" => plain = Some(value.trim().trim_matches('"').to_string()),
            _ => {}
        }
    }

    extended
        .or(plain)
        .filter(|name| !name.trim().is_empty())
        .map(|name| sanitize_filename(&name))
}

fn percent_decode(input: &str) -> String {
    url::form_urlencoded::parse(format!("n={}", input.replace('+', "%2B")).as_bytes())
        .next()
        .map(|(_, value)| value.into_owned())
        .unwrap_or_else(|| input.to_string())
}

/// Pick a path inside `dir` that does not exist yet
pub fn unique_path(dir: &Path, filename: &str) -> PathBuf {
    let candidate = dir.join(filename);
    if !candidate.exists() {
        return candidate;
    }

    let path = Path::new(filename);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("download");
    let ext = path.extension().and_then(|e| e.to_str());

    (1..)
        .map(|n| match ext {
            Some(ext) => dir.join(format!("{} ({}).{}", stem, n, ext)),
            None => dir.join(format!("{} ({})", stem, n)),
        })
        .find(|p| !p.exists())
        .unwrap_or(candidate)
}

/// Stream a response body to disk, returning the number of bytes written
///
/// A partial file never survives: on cancellation, a dropped connection or a
/// write error the file is removed before the error is returned.
pub async fn stream_response_to_file(
    response: reqwest::Response,
    path: &Path,
    cancel_flag: Option<&AtomicBool>,
) -> AppResult<u64> {
    let result = write_body(response, path, cancel_flag).await;
    if let Err(e) = &result {
        match tokio::fs::remove_file(path).await {
            Ok(()) => tracing::debug!("Removed partial file {} ({})", path.display(), e),
            Err(io) if io.kind() == std::io::ErrorKind::NotFound => {}
            Err(io) => tracing::warn!("Could not remove partial file {}: {}", path.display(), io),
        }
    }
    result
}

async fn write_body(
    response: reqwest::Response,
    path: &Path,
    cancel_flag: Option<&AtomicBool>,
) -> AppResult<u64> {
    let mut file = File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;

    while let Some(chunk) = stream.next().await {
        if cancel_flag.is_some_and(|flag| flag.load(Ordering::Relaxed)) {
            return Err(AppError::Cancelled);
        }

        let chunk = chunk.map_err(AppError::from_transport)?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }

    file.flush().await?;
    file.sync_all().await?;

    tracing::debug!("Wrote {} to {}", format_bytes(written), path.display());
    Ok(written)
}

pub fn format_bytes(bytes: u64) -> String {
    const UNITS: &[&str] = &["B", "KB", "MB", "GB", "TB"];
    const THRESHOLD: u64 = 1024;

    if bytes < THRESHOLD {
        return format!("{} B", bytes);
    }

    let mut size = bytes as f64;
    let mut unit_index = 0;

    while size >= THRESHOLD as f64 && unit_index < UNITS.len() - 1 {
        size /= THRESHOLD as f64;
        unit_index += 1;
    }

    format!("{:.1} {}", size, UNITS[unit_index])
}
