//! Module for downloading media files over HTTP
//!
//! Downloads run one after another; each outcome is reported to a
//! [`DownloadObserver`] so front ends can render progress.

mod http;
mod models;

// Re-export the public API
pub use http::Downloader;
pub use models::{
    DownloadObserver, DownloadOutcome, DownloadResult, ObserverSet, RecordingObserver,
    TracingObserver,
};
