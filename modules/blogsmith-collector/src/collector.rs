//! The source collector: walks the outline unit by unit, fans out search and
//! scrape work inside each unit, runs LLM extraction over what survived, and
//! emits progress events through the sink.
//!
//! Units are processed strictly in outline order; concurrency lives inside a
//! unit only, so the events a client observes are always in outline order.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use blogsmith_common::{
    no_information_marker, Config, Outline, ProcessingMetadata, ProcessingUnit, StreamEvent,
};

use crate::domains;
use crate::sink::EventSink;
use crate::traits::{InfoExtractor, PageScraper, QueryPlanner, ScrapedSource, UnitContext, WebSearcher};

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub queries_per_subsection: usize,
    pub results_per_query: usize,
    pub max_sources_per_subsection: usize,
    pub scrape_timeout: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        Self {
            queries_per_subsection: 5,
            results_per_query: 2,
            max_sources_per_subsection: 10,
            scrape_timeout: Duration::from_secs(20),
        }
    }
}

impl CollectorConfig {
    pub fn from_config(config: &Config) -> Self {
        Self {
            queries_per_subsection: config.queries_per_subsection,
            results_per_query: config.results_per_query,
            max_sources_per_subsection: config.max_sources_per_subsection,
            scrape_timeout: Duration::from_secs(config.scrape_timeout_secs),
        }
    }

    pub fn metadata(&self) -> ProcessingMetadata {
        ProcessingMetadata {
            queries_per_subsection: self.queries_per_subsection,
            results_per_query: self.results_per_query,
            max_sources_per_subsection: self.max_sources_per_subsection,
        }
    }
}

/// Per-request collection inputs, resolved by validation before the run.
#[derive(Debug, Clone)]
pub struct RunContext {
    pub blog_title: String,
    pub primary_keyword: String,
    pub country: String,
    pub outline: Outline,
}

pub struct SourceCollector {
    searcher: Arc<dyn WebSearcher>,
    scraper: Arc<dyn PageScraper>,
    planner: Arc<dyn QueryPlanner>,
    extractor: Arc<dyn InfoExtractor>,
    config: CollectorConfig,
}

impl SourceCollector {
    pub fn new(
        searcher: Arc<dyn WebSearcher>,
        scraper: Arc<dyn PageScraper>,
        planner: Arc<dyn QueryPlanner>,
        extractor: Arc<dyn InfoExtractor>,
        config: CollectorConfig,
    ) -> Self {
        Self {
            searcher,
            scraper,
            planner,
            extractor,
            config,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Process every unit of the outline, emitting one completion event per
    /// unit and `processing_complete` after the last one.
    ///
    /// A cancelled sink (client gone) ends the run silently. Per-unit failures
    /// degrade to an empty completion event; only orchestration-level faults
    /// surface as `Err`, which the caller reports as a failed run.
    pub async fn collect(&self, ctx: &RunContext, sink: &EventSink) -> Result<usize> {
        let units = ctx.outline.units();
        info!(units = units.len(), "Starting sources collection");

        let mut processed = 0usize;
        for unit in &units {
            if sink.is_cancelled() {
                info!(processed, "Collection cancelled, stopping");
                return Ok(processed);
            }

            let (sources, informations) = match self.process_unit(ctx, unit, sink).await {
                Ok(outcome) => outcome,
                Err(e) => {
                    warn!(
                        subsection = unit.title,
                        error = %e,
                        "Unit processing failed, emitting empty completion"
                    );
                    (Vec::new(), no_information_marker())
                }
            };

            if sink.is_cancelled() {
                info!(processed, "Collection cancelled, stopping");
                return Ok(processed);
            }

            let refs = sources.iter().map(ScrapedSource::reference).collect();
            if !sink
                .send(StreamEvent::unit_completed(unit, refs, informations))
                .await
            {
                return Ok(processed);
            }
            processed += 1;
            info!(
                subsection = unit.title,
                progress = format!("{processed}/{}", units.len()),
                "Unit completed"
            );
        }

        sink.send(StreamEvent::processing_complete(processed)).await;
        Ok(processed)
    }

    /// One unit: plan queries, fan out search+scrape, stream found websites,
    /// extract informations.
    async fn process_unit(
        &self,
        ctx: &RunContext,
        unit: &ProcessingUnit,
        sink: &EventSink,
    ) -> Result<(Vec<ScrapedSource>, serde_json::Value)> {
        let unit_ctx = UnitContext {
            blog_title: &ctx.blog_title,
            primary_keyword: &ctx.primary_keyword,
            country: &ctx.country,
            heading_title: &unit.heading_title,
            subsection_title: &unit.title,
            outline: &ctx.outline,
        };

        let queries = self
            .planner
            .plan_queries(&unit_ctx, self.config.queries_per_subsection)
            .await?;

        if queries.is_empty() {
            warn!(subsection = unit.title, "No search queries planned");
            return Ok((Vec::new(), no_information_marker()));
        }

        // Fan out one search per query; scrapes for a query run inline after
        // its search. Completion order across queries is unconstrained.
        let country = ctx.country.as_str();
        let scraped: Vec<ScrapedSource> = stream::iter(queries.into_iter().map(|query| {
            async move {
                if sink.is_cancelled() {
                    return Vec::new();
                }
                let hits = match self
                    .searcher
                    .search(&query, country, self.config.results_per_query)
                    .await
                {
                    Ok(hits) => hits,
                    Err(e) => {
                        warn!(query, error = %e, "Search failed, skipping query");
                        return Vec::new();
                    }
                };

                let mut results = Vec::new();
                for hit in hits {
                    if sink.is_cancelled() {
                        break;
                    }
                    if domains::is_blocked(&hit.url) {
                        debug!(url = hit.url, "Skipping blocked domain");
                        continue;
                    }
                    match timeout(self.config.scrape_timeout, self.scraper.scrape(&hit.url)).await
                    {
                        Ok(Ok(content)) if !content.trim().is_empty() => {
                            results.push(ScrapedSource {
                                url: hit.url,
                                title: hit.title,
                                snippet: hit.snippet,
                                content,
                            });
                        }
                        Ok(Ok(_)) => debug!(url = hit.url, "Scrape returned no content"),
                        Ok(Err(e)) => warn!(url = hit.url, error = %e, "Scrape failed"),
                        Err(_) => warn!(url = hit.url, "Scrape timed out"),
                    }
                }
                results
            }
        }))
        .buffer_unordered(self.config.queries_per_subsection.max(1))
        .collect::<Vec<_>>()
        .await
        .into_iter()
        .flatten()
        .collect();

        // Dedupe by URL and cap. Search engines repeat top results across
        // related queries.
        let mut seen = HashSet::new();
        let mut sources = Vec::new();
        for source in scraped {
            if seen.insert(source.url.clone()) {
                sources.push(source);
                if sources.len() >= self.config.max_sources_per_subsection {
                    break;
                }
            }
        }

        if sources.is_empty() {
            warn!(subsection = unit.title, "No usable sources for unit");
            return Ok((Vec::new(), no_information_marker()));
        }

        for (idx, source) in sources.iter().enumerate() {
            if !sink
                .send(StreamEvent::found_websites(unit, source.reference(), idx + 1))
                .await
            {
                return Ok((Vec::new(), no_information_marker()));
            }
        }

        let informations = match self.extractor.extract(&unit_ctx, &sources).await {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    subsection = unit.title,
                    error = %e,
                    "Information extraction failed, storing marker"
                );
                no_information_marker()
            }
        };

        Ok((sources, informations))
    }
}
