//! HTTP side of media-scraper: the media directory endpoints and the scrape page.

pub mod media;
pub mod router;
pub mod scrape;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::{
    collections::BTreeMap,
    sync::{Arc, Mutex, MutexGuard},
};
use tera::Tera;
use ulid::Ulid;

use crate::config::ServerConfig;
use crate::scrape::{SessionReport, archive::ArchiveError, downloader::Downloader};

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum MediaError {
    #[error("File not found")]
    NotFound,

    #[error("Session not found")]
    SessionNotFound,

    #[error("Archive error: {0}")]
    Archive(#[from] ArchiveError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Template error: {0}")]
    Template(#[from] tera::Error),
}

impl IntoResponse for MediaError {
    fn into_response(self) -> Response {
        let status = match self {
            Self::NotFound | Self::SessionNotFound => StatusCode::NOT_FOUND,
            _ => {
                tracing::error!(error = %self, "Request failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        (status, Json(ErrorResponse::new(self.to_string()))).into_response()
    }
}

pub type MediaRes<T> = Result<T, MediaError>;

/// Finished scrape sessions, kept so their files stay downloadable.
///
/// Reports are immutable once stored; the registry only hands out shared
/// references to them. At most `capacity` sessions are kept, and inserting
/// past that discards the oldest.
#[derive(Clone)]
pub struct SessionRegistry {
    sessions: Arc<Mutex<BTreeMap<Ulid, Arc<SessionReport>>>>,
    capacity: usize,
}

impl SessionRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            sessions: Arc::default(),
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<Ulid, Arc<SessionReport>>> {
        self.sessions
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn insert(&self, report: SessionReport) -> Arc<SessionReport> {
        let report = Arc::new(report);
        let mut sessions = self.lock();
        sessions.insert(report.id, report.clone());

        // ulids sort by creation time
        while sessions.len() > self.capacity {
            if let Some((id, _)) = sessions.pop_first() {
                tracing::info!(session = %id, "Discarding oldest scrape session");
            }
        }
        report
    }

    pub fn get(&self, id: &Ulid) -> Option<Arc<SessionReport>> {
        self.lock().get(id).cloned()
    }

    /// Forget a session; its directory goes away with the last reference.
    pub fn remove(&self, id: &Ulid) -> bool {
        self.lock().remove(id).is_some()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }
}

/// Everything a handler needs, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    pub downloader: Arc<Downloader>,
    pub sessions: SessionRegistry,
    pub templates: Arc<Tera>,
}

impl AppState {
    pub fn new(config: ServerConfig, downloader: Downloader) -> tera::Result<Self> {
        Ok(Self {
            sessions: SessionRegistry::new(config.max_sessions),
            config: Arc::new(config),
            downloader: Arc::new(downloader),
            templates: Arc::new(scrape::templates()?),
        })
    }
}
