//! Bridge server
//!
//! A small HTTP relay the user runs next to a local `yt-dlp` install. It accepts
//! `POST /download {url, quality}` and streams yt-dlp's stdout back as the
//! response body.

use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::Router;
use serde::Deserialize;
use std::net::SocketAddr;
use std::process::Stdio;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::process::Command;
use tokio_util::io::ReaderStream;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info, warn};

use crate::core::config::BridgeConfig;
use crate::core::fallback::bridge_format_args;
use crate::core::models::VideoQuality;

#[derive(Debug, Clone)]
pub struct BridgeServerConfig {
    pub host: String,
    pub port: u16,
    pub ytdlp_path: String,
}

impl BridgeServerConfig {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: config.listen_port,
            ytdlp_path: config.ytdlp_path.clone(),
        }
    }
}

#[derive(Clone)]
struct BridgeState {
    ytdlp_path: Arc<str>,
}

#[derive(Debug, Default, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

pub fn router(ytdlp_path: &str) -> Router {
    Router::new()
        .route("/download", post(download))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(BridgeState {
            ytdlp_path: Arc::from(ytdlp_path),
        })
}

/// Any body without a usable `url` (absent, not JSON, wrong content type) is a 400
fn parse_body(raw: &[u8]) -> DownloadBody {
    match serde_json::from_slice(raw) {
        Ok(body) => body,
        Err(e) => {
            warn!("[Bridge] Unreadable request body: {}", e);
            DownloadBody::default()
        }
    }
}

async fn download(State(state): State<BridgeState>, raw: Bytes) -> Response {
    let body = parse_body(&raw);
    let Some(url) = body.url.filter(|u| !u.trim().is_empty()) else {
        return (StatusCode::BAD_REQUEST, "URL is required").into_response();
    };

    // Unknown labels fall back to 1080p
    let quality = body
        .quality
        .as_deref()
        .and_then(|q| q.parse::<VideoQuality>().ok())
        .unwrap_or_default();

    info!("[Bridge] Request received for: {} ({})", url, quality);

    let format_args = bridge_format_args(quality);
    info!(
        "[Bridge] Executing: {} {} -o - -- {}",
        state.ytdlp_path,
        format_args.join(" "),
        url
    );

    let spawned = Command::new(state.ytdlp_path.as_ref())
        .args(&format_args)
        .args(["-o", "-", "--"])
        .arg(&url)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn();

    let mut child = match spawned {
        Ok(child) => child,
        Err(e) => {
            error!("[Bridge] Failed to start {}: {}", state.ytdlp_path, e);
            return (StatusCode::INTERNAL_SERVER_ERROR, "Download failed").into_response();
        }
    };

    let (Some(stdout), stderr) = (child.stdout.take(), child.stderr.take()) else {
        error!("[Bridge] yt-dlp stdout was not captured");
        return (StatusCode::INTERNAL_SERVER_ERROR, "Download failed").into_response();
    };

    if let Some(stderr) = stderr {
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                warn!("[yt-dlp]: {}", line);
            }
        });
    }

    tokio::spawn(async move {
        match child.wait().await {
            Ok(status) if status.success() => info!("[Bridge] Process exited with {}", status),
            Ok(status) => warn!("[Bridge] Process exited with {}", status),
            Err(e) => error!("[Bridge] Failed to wait for yt-dlp: {}", e),
        }
    });

    let (filename, content_type) = if quality.is_audio_only() {
        ("audio.mp3", "audio/mpeg")
    } else {
        ("video.mp4", "video/mp4")
    };

    (
        [
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", filename),
            ),
            (header::CONTENT_TYPE, content_type.to_string()),
        ],
        Body::from_stream(ReaderStream::new(stdout)),
    )
        .into_response()
}

/// Bind and serve until the process is stopped
pub async fn serve(config: BridgeServerConfig) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    let listener = TcpListener::bind(addr).await?;
    let local = listener.local_addr()?;

    info!("==================================================");
    info!("TubeForge Bridge Server Running on Port {}", local.port());
    info!("1. Select the 'bridge' delivery mode");
    info!("2. Set bridge.endpoint to: http://{}/download", local);
    info!("==================================================");

    axum::serve(listener, router(&config.ytdlp_path)).await?;
    Ok(())
}
