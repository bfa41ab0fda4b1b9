//! Page scraping sessions.
//!
//! A session takes one page URL through the whole pipeline:
//!
//! - fetch the page and extract image/video links ([`extract`])
//! - keep the links with a known media extension ([`classify`])
//! - download them one by one ([`downloader`])
//! - zip whatever was saved ([`archive`])
//!
//! Every session owns a fresh temporary directory and shares nothing with
//! other sessions.

pub mod archive;
pub mod classify;
pub mod downloader;
pub mod extract;

use std::path::{Path, PathBuf};

use serde::Serialize;
use tempfile::TempDir;
use thiserror::Error;
use tracing::{info, instrument};
use ulid::Ulid;
use url::Url;

use archive::{ARCHIVE_NAME, ArchiveError, build_archive};
use classify::{MediaKind, classify_path};
use downloader::{DownloadObserver, DownloadResult, Downloader};

const FILES_DIR: &str = "files";

#[derive(Error, Debug)]
pub enum ScrapeError {
    #[error("Failed to fetch page: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Failed to fetch page {url}: HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to build archive: {0}")]
    Archive(#[from] ArchiveError),
}

impl ScrapeError {
    /// Whether the page itself could not be fetched
    pub fn is_network(&self) -> bool {
        matches!(self, Self::Network(_) | Self::Status { .. })
    }
}

pub type Result<T> = std::result::Result<T, ScrapeError>;

/// A downloaded file, as the front ends show it
#[derive(Debug, Clone, Serialize)]
pub struct SavedFile {
    pub filename: String,
    pub kind: Option<MediaKind>,
    pub size: String,
}

/// Everything one finished session produced.
///
/// Dropping the report deletes its directory.
#[derive(Debug)]
pub struct SessionReport {
    pub id: Ulid,
    pub page_url: Url,
    /// Media links that passed classification
    pub found: usize,
    pub results: Vec<DownloadResult>,
    pub archive: PathBuf,
    dir: TempDir,
}

impl SessionReport {
    pub fn dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| r.is_successful())
    }

    pub fn failed(&self) -> impl Iterator<Item = &DownloadResult> {
        self.results.iter().filter(|r| !r.is_successful())
    }

    pub fn saved_files(&self) -> Vec<SavedFile> {
        self.succeeded()
            .filter_map(|result| {
                let path = result.path()?;
                let filename = path.file_name()?.to_string_lossy().into_owned();
                let bytes = match &result.outcome {
                    downloader::DownloadOutcome::Saved { bytes, .. } => *bytes,
                    downloader::DownloadOutcome::Failed { .. } => 0,
                };
                Some(SavedFile {
                    filename,
                    kind: classify_path(path),
                    size: bytesize::ByteSize::b(bytes).to_string(),
                })
            })
            .collect()
    }

    #[cfg(test)]
    pub(crate) fn empty(id: Ulid) -> Self {
        let dir = tempfile::tempdir().unwrap();
        Self {
            id,
            page_url: Url::parse("https://example.com/").unwrap(),
            found: 0,
            results: Vec::new(),
            archive: dir.path().join(ARCHIVE_NAME),
            dir,
        }
    }

    /// Path of a downloaded file by name, if this session saved it
    pub fn file(&self, filename: &str) -> Option<PathBuf> {
        self.succeeded()
            .filter_map(|r| r.path())
            .find(|path| path.file_name().is_some_and(|n| n == filename))
            .map(Path::to_path_buf)
    }
}

/// Run one scrape session from start to finish.
///
/// Only the page fetch and the archive can fail the session; individual
/// media downloads are reported through `observer` and the results.
#[instrument(skip(downloader, observer), fields(url = %page_url))]
pub async fn run_session(
    downloader: &Downloader,
    page_url: &Url,
    observer: &dyn DownloadObserver,
) -> Result<SessionReport> {
    let dir = tempfile::Builder::new().prefix("media-scrape-").tempdir()?;
    let files_dir = dir.path().join(FILES_DIR);
    tokio::fs::create_dir(&files_dir).await?;

    let links = extract::find_media_links(downloader.client(), page_url).await?;
    info!(found = links.len(), "Found media links");

    let results = downloader.download_all(&links, &files_dir, observer).await;

    let archive = dir.path().join(ARCHIVE_NAME);
    build_archive(&files_dir, &archive).await?;

    Ok(SessionReport {
        id: Ulid::new(),
        page_url: page_url.clone(),
        found: links.len(),
        results,
        archive,
        dir,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ScrapeConfig;
    use downloader::RecordingObserver;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn mount(server: &MockServer, route: &str, template: ResponseTemplate) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(template)
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_session_archives_successful_downloads() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/gallery",
            ResponseTemplate::new(200).set_body_raw(
                r#"<img src="/a.jpg"><img src="/missing.png"><img src="/pixel">
                   <video><source src="/b.mp4"></video>"#,
                "text/html",
            ),
        )
        .await;
        mount(&server, "/a.jpg", ResponseTemplate::new(200).set_body_bytes(b"jpg".to_vec())).await;
        mount(&server, "/b.mp4", ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec())).await;
        mount(&server, "/missing.png", ResponseTemplate::new(404)).await;

        let downloader = Downloader::new(&ScrapeConfig::default()).unwrap();
        let page = Url::parse(&format!("{}/gallery", server.uri())).unwrap();
        let report = run_session(&downloader, &page, &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(report.found, 3);
        assert_eq!(report.succeeded().count(), 2);
        assert_eq!(report.failed().count(), 1);
        assert!(report.file("a.jpg").is_some());
        assert!(report.file("missing.png").is_none());

        let saved = report.saved_files();
        assert_eq!(saved[0].kind, Some(MediaKind::Image));
        assert_eq!(saved[1].kind, Some(MediaKind::Video));

        let bytes = std::fs::read(&report.archive).unwrap();
        assert_eq!(archive::entry_names(bytes).await, vec!["a.jpg", "b.mp4"]);
    }

    #[tokio::test]
    async fn test_page_failure_is_fatal() {
        let server = MockServer::start().await;
        mount(&server, "/down", ResponseTemplate::new(503)).await;

        let downloader = Downloader::new(&ScrapeConfig::default()).unwrap();
        let page = Url::parse(&format!("{}/down", server.uri())).unwrap();
        let err = run_session(&downloader, &page, &RecordingObserver::new())
            .await
            .unwrap_err();

        assert!(err.is_network());
    }

    #[tokio::test]
    async fn test_dropping_report_removes_directory() {
        let server = MockServer::start().await;
        mount(
            &server,
            "/empty",
            ResponseTemplate::new(200).set_body_raw("<p>nothing here</p>", "text/html"),
        )
        .await;

        let downloader = Downloader::new(&ScrapeConfig::default()).unwrap();
        let page = Url::parse(&format!("{}/empty", server.uri())).unwrap();
        let report = run_session(&downloader, &page, &RecordingObserver::new())
            .await
            .unwrap();

        assert_eq!(report.found, 0);
        let dir = report.dir().to_path_buf();
        assert!(report.archive.exists());
        drop(report);
        assert!(!dir.exists());
    }
}
