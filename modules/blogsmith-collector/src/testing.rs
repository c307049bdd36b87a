// Test mocks for the collection pipeline.
//
// One mock per trait boundary, HashMap-backed with builder registration:
// - MockSearcher (WebSearcher): query to fixed hits
// - MockScraper (PageScraper): url to fixed content, or forced failure
// - MockQueryPlanner (QueryPlanner): subsection title to fixed queries
// - MockInfoExtractor (InfoExtractor): subsection title to fixed informations
//
// Unregistered lookups return Err so a misconfigured test fails loudly
// instead of silently collecting nothing.

use std::collections::{HashMap, HashSet};

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;

use blogsmith_common::SourceRef;

use crate::traits::{InfoExtractor, PageScraper, QueryPlanner, ScrapedSource, UnitContext, WebSearcher};

/// Search hit fixture.
pub fn hit(url: &str, title: &str) -> SourceRef {
    SourceRef {
        url: url.to_string(),
        title: title.to_string(),
        snippet: Some(format!("snippet for {title}")),
    }
}

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

pub struct MockSearcher {
    hits: HashMap<String, Vec<SourceRef>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            hits: HashMap::new(),
        }
    }

    pub fn on_query(mut self, query: &str, hits: Vec<SourceRef>) -> Self {
        self.hits.insert(query.to_string(), hits);
        self
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(
        &self,
        query: &str,
        _country: &str,
        max_results: usize,
    ) -> Result<Vec<SourceRef>> {
        let hits = self
            .hits
            .get(query)
            .ok_or_else(|| anyhow::anyhow!("MockSearcher: no hits registered for '{query}'"))?;
        Ok(hits.iter().take(max_results).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MockScraper
// ---------------------------------------------------------------------------

pub struct MockScraper {
    pages: HashMap<String, String>,
    failing: HashSet<String>,
}

impl MockScraper {
    pub fn new() -> Self {
        Self {
            pages: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn on_page(mut self, url: &str, content: &str) -> Self {
        self.pages.insert(url.to_string(), content.to_string());
        self
    }

    /// Make scraping this URL return an error.
    pub fn failing(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }
}

impl Default for MockScraper {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PageScraper for MockScraper {
    async fn scrape(&self, url: &str) -> Result<String> {
        if self.failing.contains(url) {
            anyhow::bail!("MockScraper: forced failure for {url}");
        }
        self.pages
            .get(url)
            .cloned()
            .ok_or_else(|| anyhow::anyhow!("MockScraper: no page registered for {url}"))
    }

    fn name(&self) -> &str {
        "mock"
    }
}

// ---------------------------------------------------------------------------
// MockQueryPlanner
// ---------------------------------------------------------------------------

pub struct MockQueryPlanner {
    plans: HashMap<String, Vec<String>>,
    failing: HashSet<String>,
}

impl MockQueryPlanner {
    pub fn new() -> Self {
        Self {
            plans: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn on_unit(mut self, subsection_title: &str, queries: &[&str]) -> Self {
        self.plans.insert(
            subsection_title.to_string(),
            queries.iter().map(|q| q.to_string()).collect(),
        );
        self
    }

    /// Make planning for this unit return an error.
    pub fn failing_for(mut self, subsection_title: &str) -> Self {
        self.failing.insert(subsection_title.to_string());
        self
    }
}

impl Default for MockQueryPlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl QueryPlanner for MockQueryPlanner {
    async fn plan_queries(&self, ctx: &UnitContext<'_>, max_queries: usize) -> Result<Vec<String>> {
        if self.failing.contains(ctx.subsection_title) {
            anyhow::bail!(
                "MockQueryPlanner: forced failure for '{}'",
                ctx.subsection_title
            );
        }
        let queries = self.plans.get(ctx.subsection_title).ok_or_else(|| {
            anyhow::anyhow!(
                "MockQueryPlanner: no plan registered for '{}'",
                ctx.subsection_title
            )
        })?;
        Ok(queries.iter().take(max_queries).cloned().collect())
    }
}

// ---------------------------------------------------------------------------
// MockInfoExtractor
// ---------------------------------------------------------------------------

pub struct MockInfoExtractor {
    responses: HashMap<String, Value>,
    failing: HashSet<String>,
}

impl MockInfoExtractor {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            failing: HashSet::new(),
        }
    }

    pub fn on_unit(mut self, subsection_title: &str, informations: Value) -> Self {
        self.responses
            .insert(subsection_title.to_string(), informations);
        self
    }

    /// Make extraction for this unit return an error.
    pub fn failing_for(mut self, subsection_title: &str) -> Self {
        self.failing.insert(subsection_title.to_string());
        self
    }
}

impl Default for MockInfoExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InfoExtractor for MockInfoExtractor {
    async fn extract(&self, ctx: &UnitContext<'_>, _sources: &[ScrapedSource]) -> Result<Value> {
        if self.failing.contains(ctx.subsection_title) {
            anyhow::bail!(
                "MockInfoExtractor: forced failure for '{}'",
                ctx.subsection_title
            );
        }
        self.responses
            .get(ctx.subsection_title)
            .cloned()
            .ok_or_else(|| {
                anyhow::anyhow!(
                    "MockInfoExtractor: no response registered for '{}'",
                    ctx.subsection_title
                )
            })
    }
}
