// HTTP implementation of the chat gateway

use async_trait::async_trait;
use chrono::Utc;
use futures::StreamExt;
use reqwest::header::{HeaderMap, HeaderValue, CONTENT_TYPE};
use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::Arc;
use tokio::sync::RwLock;

use super::wire::{
    id_text, CreateMessageBody, CreateThreadBody, CreatedMessage, MessageEnvelope, MessageList,
    ThreadList, ThreadRecord, TitleRequest,
};
use super::{ByteStream, ChatGateway};
use crate::config::ClientConfig;
use crate::error::{GatewayError, Result};
use crate::stream::WireFormat;
use crate::types::{ChatStreamRequest, ChatTurn, Message, MessageId, NewMessage, Thread, ThreadId};

/// Thread backend client (HTTP direct)
#[derive(Clone)]
pub struct ApiClient {
    http_client: reqwest::Client,
    config: ClientConfig,
    session_token: Arc<RwLock<Option<String>>>,
}

impl ApiClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        if config.base_url.trim().is_empty() {
            return Err(GatewayError::InvalidConfig("base_url must not be empty".to_string()));
        }

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(timeout) = config.timeout() {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http_client: builder.build()?,
            config,
            session_token: Arc::new(RwLock::new(None)),
        })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(ClientConfig::from_env()?)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// Bearer token attached to every subsequent request; `None` signs out
    pub async fn set_session_token(&self, token: Option<String>) {
        *self.session_token.write().await = token;
    }

    async fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session_token.read().await.as_deref() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = self.authorize(request).await.send().await?;
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    if response.status().is_success() {
        return Ok(response);
    }

    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(%status, body = %body, "backend request failed");
    Err(GatewayError::Http { status, body })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let body = response.text().await?;
    Ok(serde_json::from_str(&body)?)
}

#[async_trait]
impl ChatGateway for ApiClient {
    async fn create_thread(&self, title: Option<&str>) -> Result<Thread> {
        let now = Utc::now();
        let body = CreateThreadBody {
            title,
            last_message_at: now,
        };

        let request = self
            .http_client
            .post(self.config.endpoint("/v1/threads"))
            .json(&body);
        let record: ThreadRecord = read_json(self.send(request).await?).await?;

        let thread = record.into_thread(title, now).ok_or_else(|| {
            GatewayError::UnexpectedResponse("create thread response carried no thread id".to_string())
        })?;

        tracing::info!(thread_id = %thread.id, "thread created");
        Ok(thread)
    }

    async fn list_threads(&self) -> Result<Vec<Thread>> {
        let request = self.http_client.get(self.config.endpoint("/v1/threads"));
        let list: ThreadList = read_json(self.send(request).await?).await?;

        let now = Utc::now();
        let threads: Vec<Thread> = list
            .into_records()
            .into_iter()
            .filter_map(|record| record.into_thread(None, now))
            .collect();

        tracing::debug!(count = threads.len(), "threads listed");
        Ok(threads)
    }

    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<Thread>> {
        let url = self.config.endpoint(&format!("/v1/threads/{}", thread_id));
        let response = self.authorize(self.http_client.get(url)).await.send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            tracing::debug!(thread_id = %thread_id, "thread not found");
            return Ok(None);
        }

        let record: ThreadRecord = read_json(ensure_success(response).await?).await?;
        Ok(record.into_thread(None, Utc::now()))
    }

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>> {
        let url = self
            .config
            .endpoint(&format!("/v1/threads/{}/messages", thread_id));
        let list: MessageList = read_json(self.send(self.http_client.get(url)).await?).await?;

        let now = Utc::now();
        let messages: Vec<Message> = list
            .into_records()
            .into_iter()
            .filter_map(|record| {
                let message = record.into_message(thread_id, now);
                if message.is_none() {
                    tracing::warn!(thread_id = %thread_id, "skipping message without id");
                }
                message
            })
            .collect();

        tracing::debug!(thread_id = %thread_id, count = messages.len(), "messages listed");
        Ok(messages)
    }

    async fn create_message(&self, thread_id: &ThreadId, message: NewMessage) -> Result<MessageId> {
        let url = self
            .config
            .endpoint(&format!("/v1/threads/{}/messages", thread_id));
        let request = self
            .http_client
            .post(url)
            .json(&CreateMessageBody::new(&message));

        let created: CreatedMessage = read_json(self.send(request).await?).await?;
        let id = id_text(&created.message_id).ok_or_else(|| {
            GatewayError::UnexpectedResponse("create message response carried no message id".to_string())
        })?;

        tracing::debug!(thread_id = %thread_id, message_id = %id, role = message.role.as_str(), "message stored");
        Ok(MessageId::new(id))
    }

    async fn open_chat_stream(&self, request: ChatStreamRequest) -> Result<ByteStream> {
        let url = self.config.chat_url();
        tracing::debug!(url = %url, turns = request.messages.len(), "opening chat stream");

        let http_request = match self.config.wire_format {
            WireFormat::LinePrefixed => self.http_client.post(url).json(&request),
            WireFormat::EventStream => {
                let envelope = MessageEnvelope::new(&request).ok_or_else(|| {
                    GatewayError::InvalidRequest("chat request carries no turns".to_string())
                })?;
                self.http_client.post(url).json(&envelope)
            }
        };
        let response = self.send(http_request).await?;

        if response.status() == StatusCode::NO_CONTENT || response.content_length() == Some(0) {
            return Err(GatewayError::MissingBody);
        }

        Ok(Box::pin(
            response
                .bytes_stream()
                .map(|chunk| chunk.map_err(GatewayError::from)),
        ))
    }

    async fn generate_title(&self, thread_id: &ThreadId, turns: &[ChatTurn]) -> Result<String> {
        let body = TitleRequest {
            thread_id: thread_id.as_str(),
            messages: turns,
        };
        let request = self
            .http_client
            .post(self.config.endpoint("/v1/runs/stream"))
            .json(&body);

        let title = self.send(request).await?.text().await?;
        Ok(title.trim().to_string())
    }

    fn wire_format(&self) -> WireFormat {
        self.config.wire_format
    }
}
