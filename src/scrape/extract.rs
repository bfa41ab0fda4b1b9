//! Pulls media links out of a fetched page.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use reqwest::Client;
use scraper::{Html, Selector};
use tracing::{debug, instrument};
use url::Url;

use super::classify::is_media_url;
use super::{Result, ScrapeError};

static BASE_SELECTOR: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("base[href]").expect("valid selector"));

// `img`, `video` and every `source` under a `video`
static MEDIA_SELECTOR: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse("img[src], video[src], video source[src]").expect("valid selector")
});

/// Fetch a page and return its body as text.
///
/// Both transport failures and non-success statuses end the session.
#[instrument(skip(client), fields(url = %url))]
pub async fn fetch_page(client: &Client, url: &Url) -> Result<String> {
    let response = client.get(url.clone()).send().await?;

    if !response.status().is_success() {
        return Err(ScrapeError::Status {
            url: url.to_string(),
            status: response.status(),
        });
    }

    let body = response.text().await?;
    debug!(bytes = body.len(), "Fetched page");
    Ok(body)
}

/// Every absolute http(s) URL referenced by an image or video element.
pub fn extract_media_links(html: &str, page_url: &Url) -> BTreeSet<Url> {
    let document = Html::parse_document(html);

    // a document <base> overrides the page URL for relative references
    let base = document
        .select(&BASE_SELECTOR)
        .next()
        .and_then(|element| element.value().attr("href"))
        .and_then(|href| page_url.join(href.trim()).ok())
        .unwrap_or_else(|| page_url.clone());

    document
        .select(&MEDIA_SELECTOR)
        .filter_map(|element| element.value().attr("src"))
        .map(str::trim)
        .filter(|src| !src.is_empty())
        .filter_map(|src| base.join(src).ok())
        .filter(|url| matches!(url.scheme(), "http" | "https"))
        .collect()
}

/// Fetch a page and keep only the links the classifier recognises.
pub async fn find_media_links(client: &Client, page_url: &Url) -> Result<Vec<Url>> {
    let html = fetch_page(client, page_url).await?;
    let candidates = extract_media_links(&html, page_url);
    let total = candidates.len();

    let links: Vec<Url> = candidates.into_iter().filter(is_media_url).collect();
    debug!(
        candidates = total,
        media = links.len(),
        "Classified page links"
    );
    Ok(links)
}
