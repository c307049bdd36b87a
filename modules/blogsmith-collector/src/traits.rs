// Trait boundaries for the collection pipeline.
//
// Production impls hit Serper, the open web, and OpenAI; the mocks in
// `testing` swap them for HashMap fixtures so the whole pipeline runs in
// `cargo test` with no network.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use blogsmith_common::{Outline, SourceRef};

/// Everything a planner or extractor needs to know about the unit in flight.
#[derive(Debug, Clone, Copy)]
pub struct UnitContext<'a> {
    pub blog_title: &'a str,
    pub primary_keyword: &'a str,
    pub country: &'a str,
    pub heading_title: &'a str,
    pub subsection_title: &'a str,
    pub outline: &'a Outline,
}

/// A scraped page: the search hit plus its extracted main content.
#[derive(Debug, Clone)]
pub struct ScrapedSource {
    pub url: String,
    pub title: String,
    pub snippet: Option<String>,
    pub content: String,
}

impl ScrapedSource {
    pub fn reference(&self) -> SourceRef {
        SourceRef {
            url: self.url.clone(),
            title: self.title.clone(),
            snippet: self.snippet.clone(),
        }
    }
}

/// Web search: query in, ranked hits out.
#[async_trait]
pub trait WebSearcher: Send + Sync {
    async fn search(
        &self,
        query: &str,
        country: &str,
        max_results: usize,
    ) -> Result<Vec<SourceRef>>;
}

/// Fetch a page and return readable main-content markdown.
/// An empty string means the page had nothing usable, not an error.
#[async_trait]
pub trait PageScraper: Send + Sync {
    async fn scrape(&self, url: &str) -> Result<String>;
    fn name(&self) -> &str;
}

/// Plan the search queries for one unit.
#[async_trait]
pub trait QueryPlanner: Send + Sync {
    async fn plan_queries(
        &self,
        ctx: &UnitContext<'_>,
        max_queries: usize,
    ) -> Result<Vec<String>>;
}

/// Distill scraped sources into the structured `informations` payload.
#[async_trait]
pub trait InfoExtractor: Send + Sync {
    async fn extract(&self, ctx: &UnitContext<'_>, sources: &[ScrapedSource]) -> Result<Value>;
}
