//! `tubeforge bridge serve`

use tracing::info;

use crate::core::bridge_server::{serve, BridgeServerConfig};
use crate::core::AppConfig;

/// Run the bridge server in the foreground until interrupted
pub async fn serve_bridge(config: &AppConfig, port: Option<u16>) -> anyhow::Result<i32> {
    let mut server_config = BridgeServerConfig::from_config(&config.bridge);
    if let Some(port) = port {
        server_config.port = port;
    }

    info!(
        "Starting bridge server on {}:{} using {}",
        server_config.host, server_config.port, server_config.ytdlp_path
    );

    tokio::select! {
        result = serve(server_config) => result?,
        _ = tokio::signal::ctrl_c() => info!("Bridge server stopped"),
    }
    Ok(0)
}
