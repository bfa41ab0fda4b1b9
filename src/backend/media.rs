//! Endpoints over the configured media directory.
//!
//! Every request goes straight to the filesystem; nothing is cached, and the
//! zip is rebuilt on each download.

use axum::{
    Json,
    extract::{Path as HttpPath, State},
    response::Response,
};
use serde::Serialize;
use std::path::Path;

use super::{AppState, MediaError, MediaRes};
use crate::scrape::archive::{ARCHIVE_NAME, archive_to_bytes};
use crate::util::{Disposition, file_response, resolve_file, zip_response};

#[derive(Debug, Serialize)]
pub struct MediaPreview {
    pub filename: String,
    pub preview_url: String,
}

#[derive(Debug, Serialize)]
pub struct RawUrl {
    pub raw_url: String,
}

fn media_url(relative: &str) -> String {
    let encoded = relative
        .split('/')
        .map(|segment| urlencoding::encode(segment).into_owned())
        .collect::<Vec<_>>()
        .join("/");
    format!("/media/{encoded}")
}

/// Names of the entries directly inside `dir`, sorted, without subdirectories.
///
/// Entries are not followed, so a dangling symlink is still listed.
async fn listed_names(dir: &Path) -> std::io::Result<Vec<String>> {
    let mut names = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;

    while let Some(entry) = entries.next_entry().await? {
        match entry.file_type().await {
            Ok(file_type) if file_type.is_dir() => continue,
            Ok(_) => names.push(entry.file_name().to_string_lossy().into_owned()),
            Err(e) => tracing::warn!(entry = ?entry.path(), error = %e, "Skipping unreadable entry"),
        }
    }

    names.sort();
    Ok(names)
}

pub async fn get_media(
    State(state): State<AppState>,
    HttpPath(path): HttpPath<String>,
) -> MediaRes<Response> {
    let path = resolve_file(&state.config.media_dir, &path)?;
    file_response(&path, Disposition::Inline).await
}

pub async fn download_media(
    State(state): State<AppState>,
    HttpPath(path): HttpPath<String>,
) -> MediaRes<Response> {
    let path = resolve_file(&state.config.media_dir, &path)?;
    file_response(&path, Disposition::Attachment).await
}

pub async fn list_previews(State(state): State<AppState>) -> MediaRes<Json<Vec<MediaPreview>>> {
    let previews = listed_names(&state.config.media_dir)
        .await?
        .into_iter()
        .map(|filename| MediaPreview {
            preview_url: media_url(&filename),
            filename,
        })
        .collect::<Vec<_>>();

    tracing::trace!(count = previews.len(), "Listed media previews");
    Ok(Json(previews))
}

pub async fn download_zip(State(state): State<AppState>) -> MediaRes<Response> {
    let bytes = archive_to_bytes(&state.config.media_dir).await?;
    Ok(zip_response(bytes, ARCHIVE_NAME))
}

pub async fn raw_url(
    State(state): State<AppState>,
    HttpPath(relative): HttpPath<String>,
) -> MediaRes<Json<RawUrl>> {
    let path = resolve_file(&state.config.media_dir, &relative)?;
    if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
        return Err(MediaError::NotFound);
    }
    Ok(Json(RawUrl {
        raw_url: media_url(&relative),
    }))
}
