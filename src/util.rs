use axum::{
    body::Body,
    http::header,
    response::{IntoResponse, Response},
};
use std::path::{Component, Path, PathBuf};
use tokio_util::io::ReaderStream;

use crate::backend::MediaError;

/// How a file response asks the browser to handle the body
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    Inline,
    Attachment,
}

/// Join a client-supplied relative path onto `dir`.
///
/// Only plain path components are accepted; anything that could climb out of
/// `dir` is treated as missing.
pub fn resolve_file(dir: &Path, relative: &str) -> Result<PathBuf, MediaError> {
    let path = Path::new(relative);
    let plain = path
        .components()
        .all(|component| matches!(component, Component::Normal(_)));
    if relative.is_empty() || !plain {
        tracing::debug!(relative, "Rejected file path");
        return Err(MediaError::NotFound);
    }
    Ok(dir.join(path))
}

/// `Content-Disposition` value for a download named `filename`
pub fn attachment_header(filename: &str) -> String {
    if filename.is_ascii() {
        format!(
            "attachment; filename=\"{}\"",
            filename.replace(['"', '\\'], "_")
        )
    } else {
        format!(
            "attachment; filename*=UTF-8''{}",
            urlencoding::encode(filename)
        )
    }
}

/// Stream a file from disk, or `NotFound` if there is no regular file at `path`.
pub async fn file_response(path: &Path, disposition: Disposition) -> Result<Response, MediaError> {
    let is_file = tokio::fs::metadata(path)
        .await
        .map(|m| m.is_file())
        .unwrap_or(false);
    if !is_file {
        return Err(MediaError::NotFound);
    }

    let file = match tokio::fs::File::open(path).await {
        Ok(file) => file,
        Err(_) => return Err(MediaError::NotFound),
    };

    let stream = ReaderStream::new(file);
    let body = Body::from_stream(stream);

    let mime = mime_guess::from_path(path).first_or_octet_stream();
    let filename = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let response = match disposition {
        Disposition::Inline => ([(header::CONTENT_TYPE, mime.to_string())], body).into_response(),
        Disposition::Attachment => (
            [
                (header::CONTENT_TYPE, mime.to_string()),
                (header::CONTENT_DISPOSITION, attachment_header(&filename)),
            ],
            body,
        )
            .into_response(),
    };

    Ok(response)
}

/// An in-memory zip sent as a `media.zip`-style download
pub fn zip_response(bytes: Vec<u8>, filename: &str) -> Response {
    (
        [
            (header::CONTENT_TYPE, "application/zip".to_string()),
            (header::CONTENT_DISPOSITION, attachment_header(filename)),
        ],
        bytes,
    )
        .into_response()
}
