use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use spider_transformations::transformation::content::{
    transform_content_input, ReturnFormat, TransformConfig, TransformInput,
};
use tokio::sync::Semaphore;
use tracing::{info, warn};

use blogsmith_common::SourceRef;

use crate::traits::{PageScraper, WebSearcher};

// --- Serper (Google Search) ---

pub struct SerperSearcher {
    api_key: String,
    client: reqwest::Client,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResponse {
    #[serde(default)]
    organic: Vec<SerperResult>,
}

#[derive(Debug, serde::Deserialize)]
struct SerperResult {
    #[serde(default)]
    link: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    snippet: String,
}

impl SerperSearcher {
    pub fn new(api_key: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .expect("Failed to build HTTP client"),
        }
    }
}

#[async_trait]
impl WebSearcher for SerperSearcher {
    async fn search(
        &self,
        query: &str,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SourceRef>> {
        info!(query, country, max_results, "Serper search");

        let body = serde_json::json!({
            "q": query,
            "gl": country,
            "num": max_results,
        });

        let resp = self
            .client
            .post("https://google.serper.dev/search")
            .header("X-API-KEY", &self.api_key)
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .context("Serper API request failed")?;

        let data: SerperResponse = resp
            .json()
            .await
            .context("Failed to parse Serper response")?;

        let results: Vec<SourceRef> = data
            .organic
            .into_iter()
            .take(max_results)
            .map(|r| SourceRef {
                url: r.link,
                title: if r.title.is_empty() {
                    "Unknown Source".to_string()
                } else {
                    r.title
                },
                snippet: if r.snippet.is_empty() {
                    None
                } else {
                    Some(r.snippet)
                },
            })
            .collect();

        info!(query, count = results.len(), "Serper search complete");
        Ok(results)
    }
}

// --- HTTP fetch + Readability scraper ---

/// Max concurrent page fetches across all in-flight units.
const MAX_CONCURRENT_FETCHES: usize = 8;

/// Plain HTTP fetch followed by Readability main-content extraction.
/// Returns markdown; an empty string means the page had nothing usable.
pub struct HttpScraper {
    client: reqwest::Client,
    semaphore: Semaphore,
}

impl HttpScraper {
    pub fn new(timeout: Duration) -> Self {
        info!(
            timeout_secs = timeout.as_secs(),
            max_concurrent = MAX_CONCURRENT_FETCHES,
            "Using HttpScraper (fetch + Readability extraction)"
        );
        Self {
            client: reqwest::Client::builder()
                .timeout(timeout)
                .user_agent("Mozilla/5.0 (compatible; blogsmith/0.1)")
                .build()
                .expect("Failed to build HTTP client"),
            semaphore: Semaphore::new(MAX_CONCURRENT_FETCHES),
        }
    }
}

#[async_trait]
impl PageScraper for HttpScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        let parsed = url::Url::parse(url).context("Invalid URL")?;
        if parsed.scheme() != "http" && parsed.scheme() != "https" {
            anyhow::bail!("Only http/https URLs are allowed, got: {}", parsed.scheme());
        }

        let _permit = self
            .semaphore
            .acquire()
            .await
            .map_err(|_| anyhow::anyhow!("Scraper semaphore closed"))?;

        info!(url, scraper = "http", "Scraping URL");

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Page fetch failed")?;

        if !response.status().is_success() {
            warn!(url, status = %response.status(), scraper = "http", "Non-success response");
            return Ok(String::new());
        }

        let html = response.text().await.context("Failed to read page body")?;
        if html.is_empty() {
            warn!(url, scraper = "http", "Empty response body");
            return Ok(String::new());
        }

        let config = TransformConfig {
            readability: true,
            main_content: true,
            return_format: ReturnFormat::Markdown,
            filter_images: true,
            filter_svg: true,
            clean_html: true,
        };
        let input = TransformInput {
            url: Some(&parsed),
            content: html.as_bytes(),
            screenshot_bytes: None,
            encoding: None,
            selector_config: None,
            ignore_tags: None,
        };

        let text = transform_content_input(input, &config);

        if text.trim().is_empty() {
            warn!(url, scraper = "http", "Empty content after Readability extraction");
            return Ok(String::new());
        }

        info!(url, scraper = "http", bytes = text.len(), "Scraped successfully");
        Ok(text)
    }

    fn name(&self) -> &str {
        "http"
    }
}
