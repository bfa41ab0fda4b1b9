use axum::{
    Json, Router,
    http::StatusCode,
    routing::{delete, get, post},
};
use tower_http::trace::TraceLayer;

use super::{AppState, ErrorResponse, media, scrape};

/// Routes over the configured media directory
pub fn media_router() -> Router<AppState> {
    Router::new()
        .route("/previews", get(media::list_previews))
        .route("/download/zip", get(media::download_zip))
        .route("/download/{*path}", get(media::download_media))
        .route("/raw/{*path}", get(media::raw_url))
        .route("/{*path}", get(media::get_media))
}

/// The scrape page and the files of finished sessions
pub fn scrape_router() -> Router<AppState> {
    Router::new()
        .route("/", get(scrape::index))
        .route("/scrape", post(scrape::scrape))
        .route("/sessions/{id}", delete(scrape::delete_session))
        .route("/sessions/{id}/media.zip", get(scrape::session_archive))
        .route("/sessions/{id}/files/{filename}", get(scrape::session_file))
        .route(
            "/sessions/{id}/download/{filename}",
            get(scrape::session_download),
        )
}

/// Create the main router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/media", media_router())
        .merge(scrape_router())
        .fallback(|| async {
            (
                StatusCode::NOT_FOUND,
                Json(ErrorResponse::new("Not Found")),
            )
        })
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
