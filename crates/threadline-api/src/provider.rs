// OpenAI-compatible chat completions client (HTTP direct, no SDK)

use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use serde::Deserialize;
use serde_json::{json, Value};
use std::pin::Pin;

use threadline_client::stream::LineBuffer;

use crate::config::LlmConfig;
use crate::error::{ApiError, ApiResult};
use crate::handlers::chat::ChatParts;

/// What the provider stream carries, reduced to what the proxy forwards
#[derive(Debug, Clone, PartialEq)]
pub enum ProviderEvent {
    Delta(String),
    Finished(String),
    Failed(String),
}

pub type ProviderStream = Pin<Box<dyn Stream<Item = ApiResult<ProviderEvent>> + Send>>;

#[derive(Debug, Deserialize)]
struct ChatStreamChunk {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    error: Option<ProviderErrorBody>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<Delta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProviderErrorBody {
    #[serde(default)]
    message: Option<String>,
}

impl ChatStreamChunk {
    fn into_events(self) -> Vec<ProviderEvent> {
        if let Some(error) = self.error {
            let message = error.message.unwrap_or_else(|| "provider error".to_string());
            return vec![ProviderEvent::Failed(message)];
        }

        let mut events = Vec::new();
        if let Some(choice) = self.choices.into_iter().next() {
            if let Some(content) = choice.delta.and_then(|d| d.content) {
                if !content.is_empty() {
                    events.push(ProviderEvent::Delta(content));
                }
            }
            if let Some(reason) = choice.finish_reason {
                events.push(ProviderEvent::Finished(reason));
            }
        }
        events
    }
}

/// One `data:` line of the provider stream. `None` ends the stream.
pub fn decode_provider_line(line: &str) -> Option<Vec<ProviderEvent>> {
    let Some(data) = line.strip_prefix("data:").map(str::trim_start) else {
        return Some(Vec::new());
    };

    if data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<ChatStreamChunk>(data) {
        Ok(chunk) => Some(chunk.into_events()),
        Err(e) => {
            tracing::debug!(error = %e, "skipping malformed provider chunk");
            Some(Vec::new())
        }
    }
}

/// Turn a provider SSE body into events
pub fn provider_events<S>(body: S) -> ProviderStream
where
    S: Stream<Item = reqwest::Result<Bytes>> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut body = Box::pin(body);
        let mut buffer = LineBuffer::with_capacity(8192);
        let mut done = false;

        while !done {
            let Some(chunk) = body.next().await else { break };
            let bytes = match chunk {
                Ok(bytes) => bytes,
                Err(e) => {
                    yield Err(ApiError::Upstream(e));
                    break;
                }
            };

            buffer.extend(&bytes);
            while let Some(line) = buffer.next_line() {
                let Ok(line) = line else { continue };
                match decode_provider_line(&line) {
                    Some(events) => {
                        for event in events {
                            yield Ok(event);
                        }
                    }
                    None => {
                        done = true;
                        break;
                    }
                }
            }
        }
    })
}

pub struct ProviderClient {
    http_client: reqwest::Client,
    config: LlmConfig,
}

impl ProviderClient {
    pub fn new(config: LlmConfig, api_key: &str) -> ApiResult<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if !api_key.is_empty() {
            let value = HeaderValue::from_str(&format!("Bearer {}", api_key))
                .map_err(|_| ApiError::Config("Invalid API key format".to_string()))?;
            headers.insert(reqwest::header::AUTHORIZATION, value);
        }

        let http_client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| ApiError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http_client, config })
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn build_request(&self, parts: &ChatParts) -> Value {
        let mut messages = Vec::with_capacity(parts.turns.len() + 1);
        let system = parts
            .system_instructions
            .as_ref()
            .or(self.config.system_prompt.as_ref());
        if let Some(prompt) = system {
            messages.push(json!({ "role": "system", "content": prompt }));
        }
        messages.extend(
            parts
                .turns
                .iter()
                .map(|turn| json!({ "role": turn.role.as_str(), "content": turn.content })),
        );

        let mut request = json!({
            "model": self.config.model,
            "messages": messages,
            "stream": true,
        });

        if let Some(obj) = request.as_object_mut() {
            if let Some(temperature) = self.config.temperature {
                obj.insert("temperature".to_string(), json!(temperature));
            }
            if let Some(tools) = parts.tools.as_ref().filter(|t| !t.is_empty()) {
                obj.insert("tools".to_string(), json!(tools));
            }
        }

        request
    }

    /// Open a streaming completion. Non-2xx answers become [`ApiError::Provider`].
    pub async fn stream_chat(&self, parts: &ChatParts) -> ApiResult<ProviderStream> {
        let response = self
            .http_client
            .post(self.config.completions_url())
            .json(&self.build_request(parts))
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(ApiError::Provider { status, body });
        }

        Ok(provider_events(response.bytes_stream()))
    }
}
