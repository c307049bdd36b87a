//! LLM information extraction over scraped sources.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::{info, warn};

use ai_client::OpenAi;

use crate::traits::{InfoExtractor, ScrapedSource, UnitContext};

/// Max bytes of scraped content fed to the prompt per source.
const MAX_CONTENT_BYTES: usize = 1500;

/// Clip text to a byte budget without splitting a UTF-8 character.
fn clip(text: &str, max_bytes: usize) -> &str {
    if text.len() <= max_bytes {
        return text;
    }
    let end = (0..=max_bytes)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0);
    &text[..end]
}

/// Models wrap JSON in markdown fences despite being told not to.
fn without_code_fence(response: &str) -> &str {
    let trimmed = response.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

const INFORMATION_SYSTEM_PROMPT: &str = "Role: You are an expert researcher who specialises \
in extracting relevant information from scraped web pages.\n\
Goal: extract the information a writer needs to draft the given subsection.\n\n\
Process:\n\
1. Understand the subsection the information will be used for.\n\
2. Read every source in full.\n\
3. Keep only information relevant to the subsection; break complex findings into \
self-contained points with substantial differentiation between them.\n\n\
Output: lead with the main point, details after. Respond with ONLY a JSON object mapping \
source labels to their extracted points, for example:\n\
{\"source_1\": {\"url\": \"...\", \"points\": [\"...\"]}, \"source_2\": {...}}\n\
Do not wrap the output in markdown code fences.";

pub struct OpenAiInfoExtractor {
    ai: OpenAi,
}

impl OpenAiInfoExtractor {
    pub fn new(ai: OpenAi) -> Self {
        Self { ai }
    }

    fn build_user_prompt(ctx: &UnitContext<'_>, sources: &[ScrapedSource]) -> Result<String> {
        let mut sources_block = String::new();
        for (idx, source) in sources.iter().enumerate() {
            let content = clip(&source.content, MAX_CONTENT_BYTES);
            sources_block.push_str(&format!(
                "SOURCE {n}: {url} - {title}\nCONTENT:\n{content}\n\n",
                n = idx + 1,
                url = source.url,
                title = source.title,
            ));
        }

        let outline_context = serde_json::to_string_pretty(ctx.outline)?;

        Ok(format!(
            "Subsection where this information will be used: {subsection}\n\
             (under heading: {heading}, blog: {blog_title})\n\n\
             Blog outline structure:\n{outline_context}\n\n\
             Sources data:\n{sources_block}",
            subsection = ctx.subsection_title,
            heading = ctx.heading_title,
            blog_title = ctx.blog_title,
        ))
    }
}

#[async_trait]
impl InfoExtractor for OpenAiInfoExtractor {
    async fn extract(&self, ctx: &UnitContext<'_>, sources: &[ScrapedSource]) -> Result<Value> {
        let user_prompt = Self::build_user_prompt(ctx, sources)?;

        let response = self
            .ai
            .chat_completion(INFORMATION_SYSTEM_PROMPT, user_prompt, 1.0)
            .await?;

        let cleaned = without_code_fence(&response);

        // Model output is free-shaped JSON; keep the raw text when it fails to
        // parse so downstream aggregation still has something to store.
        let informations = match serde_json::from_str::<Value>(cleaned) {
            Ok(value) => value,
            Err(e) => {
                warn!(
                    subsection = ctx.subsection_title,
                    error = %e,
                    "Information response was not valid JSON, storing raw text"
                );
                serde_json::json!({
                    "raw_response": cleaned,
                    "parse_error": e.to_string(),
                })
            }
        };

        info!(
            subsection = ctx.subsection_title,
            sources = sources.len(),
            "Information extraction complete"
        );
        Ok(informations)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use blogsmith_common::Outline;

    #[test]
    fn clip_respects_char_boundaries() {
        let text = "précis über alles";
        let clipped = clip(text, 7);
        assert!(clipped.len() <= 7);
        assert!(text.starts_with(clipped));
        assert_eq!(clip("short", 100), "short");
    }

    #[test]
    fn code_fences_are_stripped() {
        assert_eq!(without_code_fence("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(without_code_fence("```\n[]\n```"), "[]");
        assert_eq!(without_code_fence("{\"a\":1}"), "{\"a\":1}");
    }

    #[test]
    fn prompt_truncates_long_source_content() {
        let outline = Outline::from_payload(&serde_json::json!([
            {"heading": "H", "subsections": ["S"]}
        ]));
        let ctx = UnitContext {
            blog_title: "Blog",
            primary_keyword: "kw",
            country: "us",
            heading_title: "H",
            subsection_title: "S",
            outline: &outline,
        };
        let sources = vec![ScrapedSource {
            url: "https://example.com".to_string(),
            title: "Example".to_string(),
            snippet: None,
            content: "x".repeat(10_000),
        }];

        let prompt = OpenAiInfoExtractor::build_user_prompt(&ctx, &sources).unwrap();
        assert!(prompt.len() < 5_000);
        assert!(prompt.contains("SOURCE 1: https://example.com - Example"));
    }
}
