//! Activity log sink
//!
//! Append-only, timestamped event stream written by every other component and
//! rendered by the presentation layer. Entries are mirrored to `tracing` and
//! published on a broadcast channel for live rendering.

use chrono::{DateTime, DurationRound, Local};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{error, info, warn};

/// Log entry severity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Success,
    Warning,
    Error,
}

/// A single user-facing log line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEntry {
    /// `HH:MM:SS.mmm`, 24-hour clock
    pub timestamp: String,
    pub at: DateTime<Local>,
    pub message: String,
    pub severity: Severity,
}

impl LogEntry {
    /// Terminal-friendly rendering
    pub fn render(&self) -> String {
        format!("[{}] {}", self.timestamp, self.message)
    }
}

pub fn format_timestamp(at: &DateTime<Local>) -> String {
    at.format("%H:%M:%S%.3f").to_string()
}

const CHANNEL_CAPACITY: usize = 256;

#[derive(Debug)]
pub struct ActivityLog {
    entries: Vec<LogEntry>,
    last_at: Option<DateTime<Local>>,
    tx: broadcast::Sender<LogEntry>,
}

impl ActivityLog {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self {
            entries: Vec::new(),
            last_at: None,
            tx,
        }
    }

    /// Live feed of appended entries
    pub fn subscribe(&self) -> broadcast::Receiver<LogEntry> {
        self.tx.subscribe()
    }

    pub fn push(&mut self, message: impl Into<String>, severity: Severity) -> &LogEntry {
        let at = self.next_timestamp();
        let entry = LogEntry {
            timestamp: format_timestamp(&at),
            at,
            message: message.into(),
            severity,
        };

        match severity {
            Severity::Info | Severity::Success => info!(target: "tubeforge::activity", "{}", entry.message),
            Severity::Warning => warn!(target: "tubeforge::activity", "{}", entry.message),
            Severity::Error => error!(target: "tubeforge::activity", "{}", entry.message),
        }

        // No subscribers is fine
        let _ = self.tx.send(entry.clone());
        self.entries.push(entry);
        &self.entries[self.entries.len() - 1]
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Info);
    }

    pub fn success(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Success);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Warning);
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(message, Severity::Error);
    }

    pub fn entries(&self) -> &[LogEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.entries
            .iter()
            .filter(|e| e.severity == severity)
            .count()
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.entries.iter().any(|e| e.message.contains(needle))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    /// Millisecond clock that never repeats or goes backwards within a log
    fn next_timestamp(&mut self) -> DateTime<Local> {
        let now = Local::now();
        let now = now
            .duration_trunc(chrono::Duration::milliseconds(1))
            .unwrap_or(now);
        let at = match self.last_at {
            Some(last) if now <= last => last + chrono::Duration::milliseconds(1),
            _ => now,
        };
        self.last_at = Some(at);
        at
    }
}

impl Default for ActivityLog {
    fn default() -> Self {
        Self::new()
    }
}
