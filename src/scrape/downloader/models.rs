//! Data structures for the download system
//!
//! Results, progress events and the observer seam the front ends subscribe to.

use serde::Serialize;
use std::{
    fmt,
    path::{Path, PathBuf},
    sync::Mutex,
};
use url::Url;

/// How a single URL of the batch ended
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum DownloadOutcome {
    /// The body was written to this path
    Saved { path: PathBuf, bytes: u64 },
    /// The download failed; nothing was left on disk
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
pub struct DownloadResult {
    pub url: Url,
    #[serde(flatten)]
    pub outcome: DownloadOutcome,
}

impl DownloadResult {
    pub fn saved(url: Url, path: PathBuf, bytes: u64) -> Self {
        Self {
            url,
            outcome: DownloadOutcome::Saved { path, bytes },
        }
    }

    pub fn failed(url: Url, error: impl fmt::Display) -> Self {
        Self {
            url,
            outcome: DownloadOutcome::Failed {
                error: error.to_string(),
            },
        }
    }

    pub fn path(&self) -> Option<&Path> {
        match &self.outcome {
            DownloadOutcome::Saved { path, .. } => Some(path),
            DownloadOutcome::Failed { .. } => None,
        }
    }

    pub fn error_message(&self) -> Option<&str> {
        match &self.outcome {
            DownloadOutcome::Failed { error } => Some(error),
            DownloadOutcome::Saved { .. } => None,
        }
    }

    pub fn is_successful(&self) -> bool {
        matches!(self.outcome, DownloadOutcome::Saved { .. })
    }
}

/// Progress notifications emitted while a batch runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadEvent {
    Started {
        index: usize,
        total: usize,
        url: Url,
    },
    Saved {
        url: Url,
        path: PathBuf,
        bytes: u64,
    },
    Failed {
        url: Url,
        error: String,
    },
    Finished {
        succeeded: usize,
        failed: usize,
    },
}

impl fmt::Display for DownloadEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Started { index, total, url } => {
                write!(f, "Downloading {}/{}: {}", index + 1, total, url)
            }
            Self::Saved { url, path, bytes } => {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy())
                    .unwrap_or_default();
                write!(
                    f,
                    "Saved {} as {} ({})",
                    url,
                    name,
                    bytesize::ByteSize::b(*bytes)
                )
            }
            Self::Failed { url, error } => write!(f, "Failed to download {}: {}", url, error),
            Self::Finished { succeeded, failed } => {
                write!(f, "Finished: {} saved, {} failed", succeeded, failed)
            }
        }
    }
}

/// Receives the events of a running batch.
///
/// The downloader never renders anything itself; front ends implement this.
pub trait DownloadObserver: Send + Sync {
    fn on_event(&self, event: &DownloadEvent);
}

/// Logs every event through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingObserver;

impl DownloadObserver for TracingObserver {
    fn on_event(&self, event: &DownloadEvent) {
        match event {
            DownloadEvent::Failed { url, error } => {
                tracing::warn!(url = %url, error = %error, "Download failed")
            }
            DownloadEvent::Finished { succeeded, failed } => {
                tracing::info!(succeeded, failed, "Batch finished")
            }
            other => tracing::info!("{}", other),
        }
    }
}

/// Keeps every event so it can be shown once the batch is done
#[derive(Debug, Default)]
pub struct RecordingObserver {
    events: Mutex<Vec<DownloadEvent>>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn into_events(self) -> Vec<DownloadEvent> {
        self.events
            .into_inner()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl DownloadObserver for RecordingObserver {
    fn on_event(&self, event: &DownloadEvent) {
        let mut events = self
            .events
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        events.push(event.clone());
    }
}

/// Fans one event out to several observers
pub struct ObserverSet<'a>(pub Vec<&'a dyn DownloadObserver>);

impl DownloadObserver for ObserverSet<'_> {
    fn on_event(&self, event: &DownloadEvent) {
        for observer in &self.0 {
            observer.on_event(event);
        }
    }
}
