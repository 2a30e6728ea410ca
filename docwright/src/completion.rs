//! # DeepSeek completion client
//!
//! Implements [`Completer`] against the DeepSeek `beta/completions` endpoint.
//! One prompt is one POST; the text of the first choice is returned as
//! received. Any non-success status becomes [`CompletionError::Status`] with
//! the response body attached, and nothing is retried.

use async_trait::async_trait;
use docwright_core::config::CompletionConfig;
use docwright_core::contract::Completer;
use docwright_core::error::CompletionError;
use serde::{Deserialize, Serialize};

#[derive(Serialize)]
struct CompletionRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    max_tokens: u32,
    temperature: f32,
}

#[derive(Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    text: String,
}

pub struct DeepSeekClient {
    http: reqwest::Client,
    config: CompletionConfig,
}

impl DeepSeekClient {
    pub fn new(config: CompletionConfig) -> Result<Self, CompletionError> {
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| {
                tracing::error!(error = ?e, "Failed to build completion HTTP client");
                CompletionError::Transport(e.to_string())
            })?;
        tracing::info!(
            base_url = %config.base_url,
            model = %config.model,
            api_key_set = !config.api_key.is_empty(),
            "Initialized DeepSeekClient"
        );
        Ok(Self { http, config })
    }

    fn endpoint(&self) -> String {
        format!("{}/beta/completions", self.config.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl Completer for DeepSeekClient {
    async fn complete(&self, prompt: &str) -> Result<String, CompletionError> {
        let url = self.endpoint();
        let body = CompletionRequest {
            model: &self.config.model,
            prompt,
            max_tokens: self.config.max_tokens,
            temperature: self.config.temperature,
        };

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                tracing::error!(error = ?e, url = %url, "Failed to reach completion API");
                CompletionError::Transport(e.to_string())
            })?;

        let status = response.status();
        if !status.is_success() {
            let text = response
                .text()
                .await
                .unwrap_or_else(|_| String::from("<Failed to decode response body>"));
            tracing::error!(
                status = %status,
                url = %url,
                "Completion API returned error. Response body: {text}"
            );
            return Err(CompletionError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: CompletionResponse = response.json().await.map_err(|e| {
            tracing::error!(error = ?e, "Failed to decode completion response");
            CompletionError::Malformed(e.to_string())
        })?;

        match parsed.choices.into_iter().next() {
            Some(choice) => {
                tracing::debug!(chars = choice.text.len(), "Completion received");
                Ok(choice.text)
            }
            None => {
                tracing::error!("Completion response contained no choices");
                Err(CompletionError::Malformed("no choices in response".to_string()))
            }
        }
    }
}
