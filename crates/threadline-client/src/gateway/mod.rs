mod client;
pub(crate) mod wire;

pub use client::ApiClient;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use std::pin::Pin;

use crate::error::{GatewayError, Result};
use crate::stream::WireFormat;
use crate::types::{ChatStreamRequest, ChatTurn, Message, MessageId, NewMessage, Thread, ThreadId};

/// Raw chat response body
pub type ByteStream = Pin<Box<dyn Stream<Item = std::result::Result<Bytes, GatewayError>> + Send>>;

/// Remote operations the conversation store depends on
///
/// Implemented by [`ApiClient`] over HTTP; tests substitute in-memory fakes.
#[async_trait]
pub trait ChatGateway: Send + Sync {
    /// Create a thread. The returned thread carries the title that was
    /// requested when the backend echoes none.
    async fn create_thread(&self, title: Option<&str>) -> Result<Thread>;

    async fn list_threads(&self) -> Result<Vec<Thread>>;

    /// `Ok(None)` when the backend does not know the thread
    async fn get_thread(&self, thread_id: &ThreadId) -> Result<Option<Thread>>;

    async fn list_messages(&self, thread_id: &ThreadId) -> Result<Vec<Message>>;

    /// Persist one message, returning its server-assigned id
    async fn create_message(&self, thread_id: &ThreadId, message: NewMessage) -> Result<MessageId>;

    /// Open the chat endpoint and hand back the undecoded body. The request
    /// body takes the shape the wire format's backend expects.
    async fn open_chat_stream(&self, request: ChatStreamRequest) -> Result<ByteStream>;

    /// Ask the backend for a short title summarising `turns`
    async fn generate_title(&self, thread_id: &ThreadId, turns: &[ChatTurn]) -> Result<String>;

    /// Framing of the body returned by [`ChatGateway::open_chat_stream`]
    fn wire_format(&self) -> WireFormat;
}
