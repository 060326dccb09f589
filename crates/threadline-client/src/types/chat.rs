use serde::{Deserialize, Serialize};

use super::message::{Message, MessageId, Role};
use super::thread::ThreadId;

/// Role/content pair sent as chat history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

impl ChatTurn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

impl From<&Message> for ChatTurn {
    fn from(message: &Message) -> Self {
        Self::new(message.role, message.content.clone())
    }
}

/// Body of the chat streaming endpoint
///
/// Serializes as `{messages, tools?, system_instructions?}`. Event-stream
/// backends take the same data as a message envelope, which also carries
/// the thread and user message ids.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatStreamRequest {
    pub messages: Vec<ChatTurn>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<serde_json::Value>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<String>,

    #[serde(skip)]
    pub thread_id: Option<ThreadId>,

    /// Id of the user message the reply answers
    #[serde(skip)]
    pub message_id: Option<MessageId>,
}

impl ChatStreamRequest {
    pub fn new(messages: Vec<ChatTurn>) -> Self {
        Self {
            messages,
            ..Self::default()
        }
    }

    pub fn with_tools(mut self, tools: Vec<serde_json::Value>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_system_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.system_instructions = Some(instructions.into());
        self
    }

    pub fn with_origin(mut self, thread_id: ThreadId, message_id: MessageId) -> Self {
        self.thread_id = Some(thread_id);
        self.message_id = Some(message_id);
        self
    }
}

/// Message to be stored by the backend
#[derive(Debug, Clone, PartialEq)]
pub struct NewMessage {
    pub role: Role,
    pub content: String,
    pub parent_id: Option<MessageId>,
}

impl NewMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            parent_id: None,
        }
    }

    pub fn with_parent(mut self, parent_id: MessageId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }
}
