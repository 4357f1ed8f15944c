//! `tubeforge download <url>`

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

use super::analyze::print_metadata;
use super::render::{spawn_link_collector, spawn_log_printer};
use crate::core::handoff::{AnnounceHandoff, FetchHandoff};
use crate::core::models::{DeliveryMode, Delivery, HandoffReceipt, VideoQuality};
use crate::core::{AppConfig, DownloadOutcome, Orchestrator};
use crate::utils::file_utils::format_bytes;

#[derive(Debug, Clone)]
pub struct DownloadArgs {
    pub url: String,
    pub quality: VideoQuality,
    pub mode: DeliveryMode,
    /// Stream resolved links to disk instead of only printing them
    pub fetch: bool,
    pub out_dir: Option<PathBuf>,
}

/// Analyze the URL, then run one download cycle; the exit code follows the final state
pub async fn download(config: &AppConfig, args: DownloadArgs) -> anyhow::Result<i32> {
    info!(
        "Download requested for {} ({}, {})",
        args.url, args.quality, args.mode
    );

    let mut config = config.clone();
    if let Some(dir) = &args.out_dir {
        config.bridge.output_dir = Some(dir.to_string_lossy().into_owned());
    }

    let mut orchestrator = Orchestrator::from_config(&config)?;
    let mut links = None;
    if args.fetch {
        let output_dir = config
            .bridge
            .output_dir
            .as_deref()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let handoff = FetchHandoff::with_output_dir(
            output_dir,
            Duration::from_secs(config.bridge.timeout_seconds),
        )?;
        orchestrator = orchestrator.with_handoff(Arc::new(handoff));
    } else {
        let announce = AnnounceHandoff::new();
        links = Some(spawn_link_collector(announce.subscribe()));
        orchestrator = orchestrator.with_handoff(Arc::new(announce));
    }

    orchestrator.select_quality(args.quality)?;
    orchestrator.select_mode(args.mode)?;

    let printer = spawn_log_printer(orchestrator.subscribe());

    let cancel = orchestrator.cancel_handle();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_err() {
            return;
        }
        warn!("Interrupt received, cancelling after the current attempt (Ctrl-C again to quit)");
        cancel.cancel();
        if tokio::signal::ctrl_c().await.is_ok() {
            error!("Second interrupt, exiting");
            std::process::exit(130);
        }
    });

    let result = match orchestrator.analyze(&args.url).await {
        Ok(metadata) => {
            print_metadata(&metadata);
            println!();
            orchestrator.download().await
        }
        Err(e) => Err(e),
    };
    let exit_code = orchestrator.session().state().exit_code();

    interrupt.abort();
    drop(orchestrator);
    let _ = printer.await;
    let announced = match links {
        Some(task) => task.await.unwrap_or_default(),
        None => Vec::new(),
    };

    match result {
        Ok(outcome) => print_outcome(&outcome, &announced),
        Err(e) => error!("Download failed: {}", e),
    }

    Ok(exit_code)
}

fn print_outcome(outcome: &DownloadOutcome, announced: &[String]) {
    println!();
    match outcome {
        DownloadOutcome::Completed { mode, delivery } => {
            println!("Completed via {}", mode);
            print_delivery(delivery);
            for url in announced {
                println!("Open in your download manager: {}", url);
            }
        }
        DownloadOutcome::FallbackOffered { command, cause } => {
            println!("No automatic delivery succeeded ({}).", cause);
            println!("Run this locally instead:");
            println!("  {}", command);
        }
    }
}

fn print_delivery(delivery: &Delivery) {
    match delivery {
        Delivery::Link {
            download_url,
            receipt,
        } => {
            match receipt {
                Some(HandoffReceipt::Saved { path, bytes }) => {
                    println!("Download link: {}", download_url);
                    println!("Saved {} to {}", format_bytes(*bytes), path.display());
                }
                // Printed from the announcement feed
                Some(HandoffReceipt::Announced { .. }) => {}
                None => println!("Download link: {} (hand-off failed)", download_url),
            }
        }
        Delivery::File { path, bytes } => {
            println!("Saved {} to {}", format_bytes(*bytes), path.display());
        }
        Delivery::Command { command } => {
            println!("Run this locally:");
            println!("  {}", command);
        }
    }
}
