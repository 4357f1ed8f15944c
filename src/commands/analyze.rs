//! `tubeforge analyze <url>`

use tracing::{error, info};

use super::render::spawn_log_printer;
use crate::core::models::VideoMetadata;
use crate::core::{AppConfig, Orchestrator};

/// Validate a URL and print what the metadata service knows about it
pub async fn analyze(config: &AppConfig, url: &str) -> anyhow::Result<i32> {
    info!("Analyzing {}", url);

    let mut orchestrator = Orchestrator::from_config(config)?;
    let printer = spawn_log_printer(orchestrator.subscribe());

    let result = orchestrator.analyze(url).await;

    drop(orchestrator);
    let _ = printer.await;

    match result {
        Ok(metadata) => {
            print_metadata(&metadata);
            Ok(0)
        }
        Err(e) => {
            error!("Analysis failed: {}", e);
            Ok(1)
        }
    }
}

pub fn print_metadata(metadata: &VideoMetadata) {
    println!();
    println!("Video ID:   {}", metadata.id);
    println!("Thumbnail:  {}", metadata.thumbnail_url);
    if let Some(title) = &metadata.title {
        println!("Title:      {}", title);
    }
    if let Some(description) = &metadata.description {
        println!("Details:    {}", description);
    }
    if !metadata.tags.is_empty() {
        println!("Tags:       {}", metadata.tags.join(", "));
    }
    if let Some(summary) = &metadata.ai_summary {
        println!("Summary:    {}", summary);
    }
}
