//! LLM search-query planning.

use anyhow::Result;
use async_trait::async_trait;
use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use tracing::info;

use ai_client::OpenAi;

use crate::traits::{QueryPlanner, UnitContext};

/// What the LLM returns for one unit's query plan.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PlannedQueries {
    /// Short-tail search queries, most relevant first.
    #[serde(default)]
    pub queries: Vec<String>,
}

// StructuredOutput is auto-implemented via blanket impl for JsonSchema + DeserializeOwned

const QUERY_SYSTEM_PROMPT: &str = "You are an expert SEO research specialist who generates \
highly effective search queries to find the best web sources. You understand search engine \
optimization, user intent, and how to craft queries that return authoritative, comprehensive \
results.";

pub struct OpenAiQueryPlanner {
    ai: OpenAi,
}

impl OpenAiQueryPlanner {
    pub fn new(ai: OpenAi) -> Self {
        Self { ai }
    }
}

#[async_trait]
impl QueryPlanner for OpenAiQueryPlanner {
    async fn plan_queries(&self, ctx: &UnitContext<'_>, max_queries: usize) -> Result<Vec<String>> {
        let outline_context = serde_json::to_string_pretty(ctx.outline)?;
        let today = Utc::now().format("%B %d, %Y");

        let user_prompt = format!(
            "Blog title: {blog_title}\n\
             Primary keyword: {primary_keyword}\n\
             Heading: {heading}\n\
             Subsection to research: {subsection}\n\n\
             Full outline for context:\n{outline_context}\n\n\
             Generate up to {max_queries} diverse search queries for this subsection. \
             Queries must be specific to the subsection but tied to the overall blog. \
             Skip basic common knowledge and target information that deserves real-time \
             research. The reader is in country '{country}'; use the location where it \
             sharpens a query. Today's date is {today}. Keep queries short-tail; very \
             long queries return poor results.",
            blog_title = ctx.blog_title,
            primary_keyword = ctx.primary_keyword,
            heading = ctx.heading_title,
            subsection = ctx.subsection_title,
            country = ctx.country,
        );

        let response: PlannedQueries = self.ai.extract(QUERY_SYSTEM_PROMPT, user_prompt).await?;

        let queries: Vec<String> = response
            .queries
            .into_iter()
            .map(|q| q.trim().to_string())
            .filter(|q| !q.is_empty())
            .take(max_queries)
            .collect();

        info!(
            subsection = ctx.subsection_title,
            count = queries.len(),
            "Planned search queries"
        );
        Ok(queries)
    }
}
