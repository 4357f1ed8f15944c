use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::warn;

use tubeforge::commands::{self, ConfigAction, DownloadArgs};
use tubeforge::core::models::{DeliveryMode, VideoQuality};
use tubeforge::core::AppConfig;
use tubeforge::utils::logging::init_tracing_with;

#[derive(Parser, Debug)]
#[command(author, version, about = "Resilient YouTube downloads over a public instance swarm", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a URL and show the video details
    Analyze {
        url: String,
    },

    /// Resolve and deliver a video
    Download {
        url: String,

        /// 2160p, 1080p, 720p, 480p or audio
        #[arg(short, long, default_value = "1080p")]
        quality: VideoQuality,

        /// swarm, bridge, cli or direct
        #[arg(short, long, default_value = "swarm")]
        mode: DeliveryMode,

        /// Save the resolved file instead of only printing its link
        #[arg(long)]
        fetch: bool,

        /// Directory for saved files
        #[arg(long)]
        out_dir: Option<PathBuf>,
    },

    /// Print the local yt-dlp command for a URL
    Command {
        url: String,

        #[arg(short, long, default_value = "1080p")]
        quality: VideoQuality,
    },

    /// Self-hosted bridge server
    Bridge {
        #[command(subcommand)]
        action: BridgeAction,
    },

    /// Inspect, import or reset the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum BridgeAction {
    /// Relay download requests to the local yt-dlp
    Serve {
        #[arg(short, long)]
        port: Option<u16>,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    Show,
    Path,
    Reset,
    /// Replace the configuration file with a JSON document
    Import {
        file: PathBuf,

        /// Overlay the document on the current settings instead of replacing them
        #[arg(long)]
        merge: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = AppConfig::load();
    let log_level = loaded
        .as_ref()
        .map(|c| c.advanced.log_level.clone())
        .unwrap_or_else(|_| "info".to_string());
    init_tracing_with(&format!("tubeforge={}", log_level));

    let config = loaded.unwrap_or_else(|e| {
        warn!("Failed to load configuration: {:#}. Using defaults", e);
        AppConfig::default()
    });

    let code = match run(cli.command, &config).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("error: {:#}", e);
            1
        }
    };
    std::process::exit(code);
}

async fn run(command: Command, config: &AppConfig) -> anyhow::Result<i32> {
    match command {
        Command::Analyze { url } => commands::analyze(config, &url).await,
        Command::Download {
            url,
            quality,
            mode,
            fetch,
            out_dir,
        } => {
            let args = DownloadArgs {
                url,
                quality,
                mode,
                fetch,
                out_dir,
            };
            commands::download(config, args).await
        }
        Command::Command { url, quality } => commands::print_command(config, &url, quality),
        Command::Bridge {
            action: BridgeAction::Serve { port },
        } => commands::serve_bridge(config, port).await,
        Command::Config { action } => {
            let action = match action {
                ConfigCommand::Show => ConfigAction::Show,
                ConfigCommand::Path => ConfigAction::Path,
                ConfigCommand::Reset => ConfigAction::Reset,
                ConfigCommand::Import { file, merge } => ConfigAction::Import { file, merge },
            };
            commands::run_config(config, action)
        }
    }
}
