//! Live rendering of activity log entries

use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::debug;

use crate::core::activity_log::{LogEntry, Severity};

/// Print entries as they are appended until the log's sender is dropped
pub fn spawn_log_printer(mut rx: broadcast::Receiver<LogEntry>) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(entry) => print_entry(&entry),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Log printer skipped {} entries", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
    })
}

/// Gather links announced by the hand-off until its sender is dropped
pub fn spawn_link_collector(mut rx: broadcast::Receiver<String>) -> JoinHandle<Vec<String>> {
    tokio::spawn(async move {
        let mut links = Vec::new();
        loop {
            match rx.recv().await {
                Ok(url) => links.push(url),
                Err(RecvError::Lagged(skipped)) => {
                    debug!("Link collector skipped {} announcements", skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        links
    })
}

pub fn print_entry(entry: &LogEntry) {
    match entry.severity {
        Severity::Error | Severity::Warning => eprintln!("{}", entry.render()),
        Severity::Info | Severity::Success => println!("{}", entry.render()),
    }
}
