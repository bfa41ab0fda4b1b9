//! Config module for media-scraper

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

const DEFAULT_USER_AGENT: &str = concat!("media-scraper/", env!("CARGO_PKG_VERSION"));

/// Settings for the media directory server
#[derive(Args, Debug, Clone)]
pub struct ServerConfig {
    #[clap(long, env = "MSC_HOST", default_value = "0.0.0.0:3000")]
    pub host: String,

    /// Directory served under `/media`
    #[clap(long, env = "MSC_MEDIA_DIR", default_value = "media")]
    pub media_dir: PathBuf,

    /// How many downloaded files the scrape page previews inline
    #[clap(long, env = "MSC_PREVIEW_LIMIT", default_value_t = 5)]
    pub preview_limit: usize,

    /// Finished scrape sessions kept at once; the oldest is discarded beyond this
    #[clap(long, env = "MSC_MAX_SESSIONS", default_value_t = 16)]
    pub max_sessions: usize,
}

#[cfg(test)]
impl ServerConfig {
    pub fn for_media_dir(media_dir: impl Into<PathBuf>) -> Self {
        Self {
            host: "127.0.0.1:0".to_string(),
            media_dir: media_dir.into(),
            preview_limit: 5,
            max_sessions: 16,
        }
    }
}

/// Settings shared by every outgoing request a scrape session makes
#[derive(Args, Debug, Clone)]
pub struct ScrapeConfig {
    /// Per-request network timeout, in seconds
    #[clap(long = "timeout", env = "MSC_TIMEOUT_SECS", default_value_t = 10)]
    pub timeout_secs: u64,

    #[clap(long, env = "MSC_USER_AGENT", default_value = DEFAULT_USER_AGENT)]
    pub user_agent: String,

    #[clap(long, env = "MSC_MAX_REDIRECTS", default_value_t = 10)]
    pub max_redirects: usize,
}

impl ScrapeConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the HTTP client every scrape request goes through
    pub fn http_client(&self) -> reqwest::Result<reqwest::Client> {
        reqwest::Client::builder()
            .timeout(self.timeout())
            .user_agent(&self.user_agent)
            .redirect(reqwest::redirect::Policy::limited(self.max_redirects))
            .build()
    }
}

impl Default for ScrapeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 10,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            max_redirects: 10,
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Serve the media directory and the scrape page
    Serve {
        #[clap(flatten)]
        server: ServerConfig,
    },
    /// Scrape one page from the terminal and save its media archive
    Scrape {
        /// Page to collect images and videos from
        url: url::Url,

        /// Where to copy the finished archive
        #[clap(short, long, default_value = "media.zip")]
        output: PathBuf,
    },
}

#[derive(Parser, Debug, Clone)]
#[clap(name = "media-scraper", version, about)]
pub struct Config {
    #[clap(flatten)]
    pub scrape: ScrapeConfig,

    #[clap(subcommand)]
    pub command: Command,
}
