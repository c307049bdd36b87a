//! Minimal OpenAI chat-completions client.
//!
//! Two call shapes: plain [`OpenAi::chat_completion`] for free-text output,
//! and [`OpenAi::extract`] for schema-constrained structured output driven
//! by a `schemars`-derived response type. Both go through one transport
//! path, since the structured endpoint is the same chat-completions route
//! with a `response_format` attached.

pub mod schema;
mod types;

pub use schema::StructuredOutput;

use anyhow::{anyhow, bail, Result};
use serde::Serialize;
use tracing::debug;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    http: reqwest::Client,
    base_url: String,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            http: reqwest::Client::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Override the API base URL (proxies, test servers).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// POST a chat-completions request and return the first choice's text.
    async fn completion<B: Serialize>(&self, body: &B) -> Result<String> {
        debug!(model = %self.model, "OpenAI chat request");

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            bail!("OpenAI API error ({status}): {error_text}");
        }

        let parsed: types::ChatResponse = response.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow!("No response from OpenAI"))
    }

    /// Plain chat completion: system + user message, text back.
    pub async fn chat_completion(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
        temperature: f32,
    ) -> Result<String> {
        let request = types::ChatRequest::new(&self.model)
            .message(types::WireMessage::system(system))
            .message(types::WireMessage::user(user))
            .temperature(temperature)
            .max_tokens(16_384);

        self.completion(&request).await
    }

    /// Schema-constrained structured output, deserialized into `T`.
    pub async fn extract<T: StructuredOutput>(
        &self,
        system: impl Into<String>,
        user: impl Into<String>,
    ) -> Result<T> {
        let request = types::StructuredRequest {
            model: self.model.clone(),
            messages: vec![
                types::WireMessage::system(system),
                types::WireMessage::user(user),
            ],
            temperature: Some(0.0),
            response_format: types::ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: types::JsonSchemaFormat {
                    name: "structured_response".to_string(),
                    strict: true,
                    schema: T::response_schema(),
                },
            },
        };

        let json_str = self.completion(&request).await?;

        serde_json::from_str(&json_str)
            .map_err(|e| anyhow!("Failed to deserialize structured response: {e}"))
    }
}
