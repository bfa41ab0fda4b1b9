mod backend;
mod config;
mod scrape;
mod util;

use clap::Parser;
use color_eyre::eyre::WrapErr;
use std::path::Path;
use tracing_subscriber::EnvFilter;
use url::Url;

use backend::{AppState, router::create_router};
use config::{Command, Config, ServerConfig};
use scrape::downloader::{Downloader, TracingObserver};

async fn serve(server: ServerConfig, downloader: Downloader) -> color_eyre::Result<()> {
    // create media directory
    if !server.media_dir.exists() {
        std::fs::create_dir_all(&server.media_dir)?;
        tracing::info!(
            "Directory '{}' does not exist, creating...",
            server.media_dir.display()
        );
    } else {
        tracing::info!(
            "Directory '{}' already exists, skipping...",
            server.media_dir.display()
        );
    }

    let host = server.host.clone();
    let state = AppState::new(server, downloader)?;
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&host)
        .await
        .wrap_err_with(|| format!("Failed to bind {host}"))?;
    tracing::info!("Listening on: {}", listener.local_addr()?);
    axum::serve(listener, app).await?;

    Ok(())
}

async fn scrape_once(downloader: &Downloader, url: &Url, output: &Path) -> color_eyre::Result<()> {
    let report = match scrape::run_session(downloader, url, &TracingObserver).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "Scrape failed");
            return Err(e).wrap_err_with(|| format!("Could not scrape {url}"));
        }
    };

    tracing::debug!(dir = ?report.dir(), "Session directory");
    println!("Found {} media links", report.found);
    for file in report.saved_files().iter().take(5) {
        println!("  {} ({})", file.filename, file.size);
    }
    for failed in report.failed() {
        println!(
            "  failed: {} ({})",
            failed.url,
            failed.error_message().unwrap_or_default()
        );
    }

    tokio::fs::copy(&report.archive, output)
        .await
        .wrap_err_with(|| format!("Failed to write {}", output.display()))?;
    println!(
        "Saved {} of {} files to {}",
        report.succeeded().count(),
        report.found,
        output.display()
    );

    Ok(())
}

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();
    color_eyre::install()?;

    let config = Config::parse();
    let downloader = Downloader::new(&config.scrape)?;

    match config.command {
        Command::Serve { server } => serve(server, downloader).await,
        Command::Scrape { url, output } => scrape_once(&downloader, &url, &output).await,
    }
}
