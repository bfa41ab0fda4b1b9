//! HTTP download implementation
//!
//! Streams each media URL of a batch to disk, one at a time.

use futures_util::StreamExt;
use reqwest::{Client, header};
use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};
use tokio::{fs::File, io::AsyncWriteExt};
use tracing::{debug, instrument, trace};
use url::Url;

use super::models::{DownloadEvent, DownloadObserver, DownloadResult};
use crate::config::ScrapeConfig;

#[derive(Debug, thiserror::Error)]
pub enum DownloadError {
    #[error("Request error: {0}")]
    Request(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(reqwest::StatusCode),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub struct Downloader {
    client: Client,
}

impl Downloader {
    pub fn new(config: &ScrapeConfig) -> reqwest::Result<Self> {
        Ok(Self::with_client(config.http_client()?))
    }

    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    /// Download every URL into `dir`, in order.
    ///
    /// A failing URL is recorded and the batch moves on; this never returns early.
    pub async fn download_all(
        &self,
        urls: &[Url],
        dir: &Path,
        observer: &dyn DownloadObserver,
    ) -> Vec<DownloadResult> {
        let total = urls.len();
        let mut taken = HashSet::new();
        let mut results = Vec::with_capacity(total);

        for (index, url) in urls.iter().enumerate() {
            observer.on_event(&DownloadEvent::Started {
                index,
                total,
                url: url.clone(),
            });

            let result = match self.download(url, dir, &mut taken).await {
                Ok((path, bytes)) => {
                    observer.on_event(&DownloadEvent::Saved {
                        url: url.clone(),
                        path: path.clone(),
                        bytes,
                    });
                    DownloadResult::saved(url.clone(), path, bytes)
                }
                Err(e) => {
                    observer.on_event(&DownloadEvent::Failed {
                        url: url.clone(),
                        error: e.to_string(),
                    });
                    DownloadResult::failed(url.clone(), e)
                }
            };
            results.push(result);
        }

        let succeeded = results.iter().filter(|r| r.is_successful()).count();
        observer.on_event(&DownloadEvent::Finished {
            succeeded,
            failed: total - succeeded,
        });

        results
    }

    /// Stream one URL into `dir` under a name no earlier download of the batch used.
    ///
    /// Returns the final path and the number of bytes written.
    #[instrument(name = "download_file", level = "debug", skip(self, dir, taken), fields(url = %url))]
    pub async fn download(
        &self,
        url: &Url,
        dir: &Path,
        taken: &mut HashSet<String>,
    ) -> Result<(PathBuf, u64), DownloadError> {
        let response = self.client.get(url.clone()).send().await?;

        trace!(status = %response.status(), "Got response");
        if !response.status().is_success() {
            return Err(DownloadError::Status(response.status()));
        }

        let total_size = response
            .headers()
            .get(header::CONTENT_LENGTH)
            .and_then(|cl| cl.to_str().ok())
            .and_then(|cl| cl.parse::<u64>().ok());

        let filename = filename_from_url(url).unwrap_or_else(random_filename);
        let final_path = unique_path(dir, &filename, taken);
        debug!(path = ?final_path, size = ?total_size, "Final download path");

        let mut file = File::create(&final_path).await?;
        match stream_to_file(response, &mut file).await {
            Ok(downloaded) => Ok((final_path, downloaded)),
            Err(e) => {
                // failed downloads never leave a partial file for the archive to pick up
                drop(file);
                let _ = tokio::fs::remove_file(&final_path).await;
                Err(e)
            }
        }
    }
}

async fn stream_to_file(response: reqwest::Response, file: &mut File) -> Result<u64, DownloadError> {
    let mut stream = response.bytes_stream();
    let mut downloaded: u64 = 0;

    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        downloaded += chunk.len() as u64;
        trace!(bytes = downloaded, chunk_size = chunk.len(), "Received chunk");
    }
    file.flush().await?;

    Ok(downloaded)
}

/// The last path segment of `url`, percent-decoded, without the query string.
///
/// Returns `None` when nothing usable is left.
pub fn filename_from_url(url: &Url) -> Option<String> {
    let segment = url.path_segments()?.next_back()?;
    let decoded = urlencoding::decode(segment).ok()?;
    let name: String = decoded
        .chars()
        .filter(|c| !matches!(c, '/' | '\\' | '\0'))
        .collect();
    let name = name.trim();

    if name.is_empty() || name == "." || name == ".." {
        None
    } else {
        Some(name.to_string())
    }
}

fn random_filename() -> String {
    format!("download_{:016x}", rand::random::<u64>())
}

/// Pick a path for `filename` that neither this batch nor the directory already holds.
///
/// `a.jpg` becomes `a-1.jpg`, `a-2.jpg`, ... on collision.
fn unique_path(dir: &Path, filename: &str, taken: &mut HashSet<String>) -> PathBuf {
    let (stem, extension) = match filename.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => (stem, Some(ext)),
        _ => (filename, None),
    };

    let mut candidate = filename.to_string();
    let mut counter = 1;
    while taken.contains(&candidate) || dir.join(&candidate).exists() {
        candidate = match extension {
            Some(ext) => format!("{stem}-{counter}.{ext}"),
            None => format!("{stem}-{counter}"),
        };
        counter += 1;
    }

    taken.insert(candidate.clone());
    dir.join(candidate)
}
