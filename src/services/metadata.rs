//! Single-shot metadata fetcher
//!
//! Downloads a page once and extracts its OpenGraph / standard metadata.
//! There are no retries here: failed fetches are retried by the retry worker.

use reqwest::Client as HttpClient;
use scraper::{Html, Selector};
use std::time::Duration;

use crate::{
    error::{AppError, AppResult},
    models::ArticleMetadata,
};

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);
pub const DEFAULT_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Outbound request settings for the fetcher
#[derive(Debug, Clone)]
pub struct FetcherConfig {
    pub timeout: Duration,
    pub user_agent: String,
}

/// Why a single fetch attempt failed
#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("Timed out fetching {url}")]
    Timeout { url: String },

    #[error("Request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to read body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

impl FetchError {
    fn request(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Request {
                url: url.to_string(),
                source,
            }
        }
    }

    fn body(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            FetchError::Timeout {
                url: url.to_string(),
            }
        } else {
            FetchError::Body {
                url: url.to_string(),
                source,
            }
        }
    }
}

/// Produces page metadata for a URL
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait MetadataFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<ArticleMetadata, FetchError>;
}

/// Fetcher backed by reqwest and the `scraper` HTML parser
#[derive(Clone)]
pub struct HttpMetadataFetcher {
    http_client: HttpClient,
}

impl HttpMetadataFetcher {
    pub fn new(config: &FetcherConfig) -> AppResult<Self> {
        let http_client = HttpClient::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { http_client })
    }
}

#[async_trait::async_trait]
impl MetadataFetcher for HttpMetadataFetcher {
    async fn fetch(&self, url: &str) -> Result<ArticleMetadata, FetchError> {
        let response = self
            .http_client
            .get(url)
            .send()
            .await
            .map_err(|e| FetchError::request(url, e))?;

        let status = response.status();
        if !status.is_success() {
            // Error pages still carry a parseable document
            tracing::warn!(url = %url, status = %status, "Non-success status while fetching metadata");
        }

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::body(url, e))?;

        let metadata = extract_metadata(&body);

        tracing::debug!(
            url = %url,
            title = %metadata.title,
            has_description = !metadata.description.is_empty(),
            has_image = !metadata.image_url.is_empty(),
            "Scraped metadata"
        );

        Ok(metadata)
    }
}

/// Extracts title, description and image from an HTML document
///
/// Title: `og:title`, else `<title>`. Description: `og:description`, else
/// `<meta name="description">`. Image: `og:image` only. Missing values are
/// empty strings.
pub fn extract_metadata(html: &str) -> ArticleMetadata {
    let document = Html::parse_document(html);

    let title = meta_content(&document, r#"meta[property="og:title"]"#)
        .or_else(|| element_text(&document, "title"))
        .unwrap_or_default();

    let description = meta_content(&document, r#"meta[property="og:description"]"#)
        .or_else(|| meta_content(&document, r#"meta[name="description"]"#))
        .unwrap_or_default();

    let image_url = meta_content(&document, r#"meta[property="og:image"]"#).unwrap_or_default();

    ArticleMetadata {
        title,
        description,
        image_url,
    }
}

fn meta_content(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr("content"))
        .map(|content| content.trim().to_string())
        .filter(|content| !content.is_empty())
}

fn element_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .map(|el| el.text().collect::<String>().trim().to_string())
        .filter(|text| !text.is_empty())
}
