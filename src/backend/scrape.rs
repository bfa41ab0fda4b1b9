//! The interactive scrape page.
//!
//! `POST /scrape` runs a whole session inside the request and renders the
//! outcome; the session's files stay reachable under `/sessions/{id}` until
//! the page's discard button deletes the session, newer sessions push it out
//! of the registry, or the server stops.

use axum::{
    Form,
    extract::{Path as HttpPath, State},
    http::StatusCode,
    response::{Html, IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use tera::{Context, Tera};
use ulid::Ulid;
use url::Url;

use super::{AppState, MediaError, MediaRes};
use crate::scrape::{
    SessionReport,
    downloader::{DownloadObserver, ObserverSet, RecordingObserver, TracingObserver},
    run_session,
};
use crate::util::{Disposition, file_response};

const INDEX_TEMPLATE: &str = "index.html";

pub fn templates() -> tera::Result<Tera> {
    let mut tera = Tera::default();
    tera.add_raw_template(INDEX_TEMPLATE, include_str!("../../templates/index.html"))?;
    Ok(tera)
}

#[derive(Debug, Deserialize)]
pub struct ScrapeForm {
    pub url: String,
}

#[derive(Debug, Serialize)]
struct Failure {
    url: String,
    error: String,
}

fn base_context(page_url: &str) -> Context {
    let mut context = Context::new();
    context.insert("page_url", page_url);
    context.insert("error", &None::<String>);
    context.insert("session_id", &None::<String>);
    context
}

fn render(state: &AppState, status: StatusCode, context: &Context) -> MediaRes<Response> {
    let page = state.templates.render(INDEX_TEMPLATE, context)?;
    Ok((status, Html(page)).into_response())
}

fn report_context(report: &SessionReport, messages: Vec<String>, preview_limit: usize) -> Context {
    let mut context = base_context(report.page_url.as_str());
    let files = report.saved_files();
    let previews: Vec<_> = files.iter().take(preview_limit).cloned().collect();
    let failures: Vec<Failure> = report
        .failed()
        .map(|r| Failure {
            url: r.url.to_string(),
            error: r.error_message().unwrap_or_default().to_string(),
        })
        .collect();

    context.insert("session_id", &report.id.to_string());
    context.insert("found", &report.found);
    context.insert("files", &files);
    context.insert("previews", &previews);
    context.insert("failures", &failures);
    context.insert("messages", &messages);
    context
}

pub async fn index(State(state): State<AppState>) -> MediaRes<Response> {
    render(&state, StatusCode::OK, &base_context(""))
}

#[tracing::instrument(skip_all, fields(url = %form.url))]
pub async fn scrape(State(state): State<AppState>, Form(form): Form<ScrapeForm>) -> MediaRes<Response> {
    let page_url = match Url::parse(form.url.trim()) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => url,
        _ => {
            let mut context = base_context(&form.url);
            context.insert("error", "Please enter a valid http(s) URL");
            return render(&state, StatusCode::BAD_REQUEST, &context);
        }
    };

    let recorder = RecordingObserver::new();
    let result = {
        let observers = ObserverSet(vec![&TracingObserver as &dyn DownloadObserver, &recorder]);
        run_session(&state.downloader, &page_url, &observers).await
    };

    match result {
        Ok(report) => {
            let messages = recorder
                .into_events()
                .iter()
                .map(ToString::to_string)
                .collect();
            let context = report_context(&report, messages, state.config.preview_limit);
            let report = state.sessions.insert(report);
            tracing::info!(
                session = %report.id,
                found = report.found,
                active_sessions = state.sessions.len(),
                "Scrape session finished"
            );
            render(&state, StatusCode::OK, &context)
        }
        Err(e) => {
            tracing::error!(error = %e, "Scrape session failed");
            let status = if e.is_network() {
                StatusCode::BAD_GATEWAY
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            };
            let mut context = base_context(page_url.as_str());
            context.insert("error", &e.to_string());
            render(&state, status, &context)
        }
    }
}

fn session(state: &AppState, id: &Ulid) -> MediaRes<std::sync::Arc<SessionReport>> {
    state.sessions.get(id).ok_or(MediaError::SessionNotFound)
}

pub async fn session_file(
    State(state): State<AppState>,
    HttpPath((id, filename)): HttpPath<(Ulid, String)>,
) -> MediaRes<Response> {
    let path = session(&state, &id)?
        .file(&filename)
        .ok_or(MediaError::NotFound)?;
    file_response(&path, Disposition::Inline).await
}

pub async fn session_download(
    State(state): State<AppState>,
    HttpPath((id, filename)): HttpPath<(Ulid, String)>,
) -> MediaRes<Response> {
    let path = session(&state, &id)?
        .file(&filename)
        .ok_or(MediaError::NotFound)?;
    file_response(&path, Disposition::Attachment).await
}

pub async fn session_archive(
    State(state): State<AppState>,
    HttpPath(id): HttpPath<Ulid>,
) -> MediaRes<Response> {
    let report = session(&state, &id)?;
    tracing::debug!(session = %id, archive = ?report.archive, "Serving session archive");
    file_response(&report.archive, Disposition::Attachment).await
}

pub async fn delete_session(
    State(state): State<AppState>,
    HttpPath(id): HttpPath<Ulid>,
) -> MediaRes<StatusCode> {
    if state.sessions.remove(&id) {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(MediaError::SessionNotFound)
    }
}

#[cfg(test)]
mod tests {
    use crate::backend::AppState;
    use crate::backend::router::create_router;
    use crate::config::{ScrapeConfig, ServerConfig};
    use crate::scrape::{archive::entry_names, downloader::Downloader};
    use axum::body::{Body, to_bytes};
    use axum::http::{Request, StatusCode, header};
    use tower::ServiceExt; // for oneshot()
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state() -> (AppState, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let downloader = Downloader::new(&ScrapeConfig::default()).unwrap();
        let state = AppState::new(ServerConfig::for_media_dir(dir.path()), downloader).unwrap();
        (state, dir)
    }

    fn form(url: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/scrape")
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(Body::from(format!("url={}", urlencoding::encode(url))))
            .unwrap()
    }

    async fn text(response: axum::response::Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn gallery() -> MockServer {
        let server = MockServer::start().await;
        let page = (1..=7)
            .map(|i| format!(r#"<img src="/img{i}.png">"#))
            .chain([r#"<video src="/clip.webm"></video>"#.to_string()])
            .collect::<String>();
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(200).set_body_raw(page, "text/html"))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/clip.webm"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;
        for i in 1..=7 {
            Mock::given(method("GET"))
                .and(path(format!("/img{i}.png")))
                .respond_with(ResponseTemplate::new(200).set_body_bytes(format!("png {i}")))
                .mount(&server)
                .await;
        }
        server
    }

    #[tokio::test]
    async fn test_index_renders_form() {
        let (state, _dir) = state();
        let request = Request::builder().uri("/").body(Body::empty()).unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert!(text(response).await.contains(r#"action="/scrape""#));
    }

    #[tokio::test]
    async fn test_scrape_renders_results_and_keeps_session() {
        let server = gallery().await;
        let (state, _dir) = state();
        let app = create_router(state.clone());

        let response = app
            .clone()
            .oneshot(form(&format!("{}/page", server.uri())))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let page = text(response).await;
        assert!(page.contains("Found 8 media links"));
        assert!(page.contains("Downloaded 7 files"));
        // only the first five files are previewed inline
        assert_eq!(page.matches("<img ").count(), 5);
        assert!(page.contains("clip.webm"));

        assert_eq!(state.sessions.len(), 1);
        assert!(page.contains("method: 'DELETE'"));
        let id = page
            .split("/sessions/")
            .nth(1)
            .and_then(|rest| rest.split('/').next())
            .unwrap()
            .to_string();

        let request = Request::builder()
            .uri(format!("/sessions/{id}/files/img3.png"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(text(response).await, "png 3");

        let request = Request::builder()
            .uri(format!("/sessions/{id}/media.zip"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(entry_names(bytes.to_vec()).await.len(), 7);

        let request = Request::builder()
            .method("DELETE")
            .uri(format!("/sessions/{id}"))
            .body(Body::empty())
            .unwrap();
        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(state.sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_old_sessions_are_discarded() {
        let server = gallery().await;
        let dir = tempfile::tempdir().unwrap();
        let config = ServerConfig {
            max_sessions: 2,
            ..ServerConfig::for_media_dir(dir.path())
        };
        let downloader = Downloader::new(&ScrapeConfig::default()).unwrap();
        let state = AppState::new(config, downloader).unwrap();
        let app = create_router(state.clone());

        for _ in 0..3 {
            let response = app
                .clone()
                .oneshot(form(&format!("{}/page", server.uri())))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::OK);
        }

        assert_eq!(state.sessions.len(), 2);
    }

    #[tokio::test]
    async fn test_unreachable_page_reports_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/page"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;
        let (state, _dir) = state();

        let response = create_router(state.clone())
            .oneshot(form(&format!("{}/page", server.uri())))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert!(text(response).await.contains("Error: Failed to fetch page"));
        assert_eq!(state.sessions.len(), 0);
    }

    #[tokio::test]
    async fn test_invalid_url_is_rejected() {
        let (state, _dir) = state();
        let response = create_router(state).oneshot(form("not a url")).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_session_is_404() {
        let (state, _dir) = state();
        let request = Request::builder()
            .uri(format!("/sessions/{}/media.zip", ulid::Ulid::new()))
            .body(Body::empty())
            .unwrap();
        let response = create_router(state).oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }
}
