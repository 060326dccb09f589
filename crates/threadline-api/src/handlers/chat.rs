use axum::{
    body::Body,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    Json,
};
use futures::StreamExt;
use serde::Deserialize;
use serde_json::Value;
use std::convert::Infallible;
use std::sync::Arc;

use threadline_client::stream::{encode_error, encode_finish, encode_text};
use threadline_client::{ChatTurn, Role};

use crate::error::{ApiError, ApiResult};
use crate::provider::{ProviderEvent, ProviderStream};
use crate::state::AppState;

/// Body of `POST /api/chat`: either plain turns or the history/message envelope
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum ChatRequest {
    Turns {
        messages: Vec<ChatTurn>,
        #[serde(default)]
        tools: Option<Vec<Value>>,
        #[serde(default)]
        system_instructions: Option<String>,
    },
    Envelope {
        #[serde(default)]
        history: Vec<(String, String)>,
        message: EnvelopeMessage,
        #[serde(default)]
        tools: Option<Vec<Value>>,
        #[serde(default)]
        system_instructions: Option<String>,
    },
}

/// A validated chat request
#[derive(Debug, PartialEq)]
pub struct ChatParts {
    pub turns: Vec<ChatTurn>,
    pub tools: Option<Vec<Value>>,
    /// Replaces the configured system prompt for this request
    pub system_instructions: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeMessage {
    pub content: String,
}

fn parse_role(raw: &str) -> ApiResult<Role> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "user" | "human" => Ok(Role::User),
        "assistant" | "ai" | "model" => Ok(Role::Assistant),
        other => Err(ApiError::BadRequest(format!("Unknown role '{}'", other))),
    }
}

impl ChatRequest {
    /// Normalize into provider turns plus optional tools and instructions
    pub fn into_parts(self) -> ApiResult<ChatParts> {
        let (turns, tools, system_instructions) = match self {
            ChatRequest::Turns {
                messages,
                tools,
                system_instructions,
            } => (messages, tools, system_instructions),
            ChatRequest::Envelope {
                history,
                message,
                tools,
                system_instructions,
            } => {
                let mut turns = history
                    .into_iter()
                    .map(|(role, text)| Ok(ChatTurn::new(parse_role(&role)?, text)))
                    .collect::<ApiResult<Vec<_>>>()?;
                turns.push(ChatTurn::user(message.content));
                (turns, tools, system_instructions)
            }
        };

        if turns.is_empty() {
            return Err(ApiError::BadRequest("messages must not be empty".to_string()));
        }

        Ok(ChatParts {
            turns,
            tools,
            system_instructions: system_instructions.filter(|s| !s.trim().is_empty()),
        })
    }
}

/// Re-encode provider events as the line-prefixed chat protocol
pub fn encode_events(mut events: ProviderStream) -> impl futures::Stream<Item = Result<String, Infallible>> + Send {
    async_stream::stream! {
        let mut finish_reason = "stop".to_string();

        while let Some(event) = events.next().await {
            match event {
                Ok(ProviderEvent::Delta(text)) => yield Ok(encode_text(&text)),
                Ok(ProviderEvent::Finished(reason)) => finish_reason = reason,
                Ok(ProviderEvent::Failed(message)) => {
                    tracing::warn!(error = %message, "provider reported an error mid-stream");
                    yield Ok(encode_error(&message));
                    finish_reason = "error".to_string();
                    break;
                }
                Err(e) => {
                    tracing::error!(error = %e, "provider stream failed");
                    yield Ok(encode_error(&e.to_string()));
                    finish_reason = "error".to_string();
                    break;
                }
            }
        }

        yield Ok(encode_finish(&finish_reason));
    }
}

/// Stream a completion for the given conversation
pub async fn chat(
    State(state): State<Arc<AppState>>,
    Json(req): Json<ChatRequest>,
) -> ApiResult<Response> {
    let parts = req.into_parts()?;

    tracing::info!(
        model = state.provider.model(),
        turns = parts.turns.len(),
        tools = parts.tools.as_ref().map_or(0, Vec::len),
        custom_instructions = parts.system_instructions.is_some(),
        "forwarding chat"
    );

    let events = state.provider.stream_chat(&parts).await?;

    Ok((
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        Body::from_stream(encode_events(events)),
    )
        .into_response())
}
