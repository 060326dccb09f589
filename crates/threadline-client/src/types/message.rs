use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use super::thread::ThreadId;

/// Author of a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[serde(alias = "human")]
    User,
    #[serde(alias = "ai")]
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Server-assigned message identifier
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// All-zero id the backend uses for "no real parent"
    pub const ROOT: &'static str = "00000000-0000-0000-0000-000000000000";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    pub fn is_root(&self) -> bool {
        self.0 == Self::ROOT
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Local-only marker for a message the server has not confirmed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PendingId(Uuid);

impl PendingId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for PendingId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for PendingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pending:{}", self.0)
    }
}

/// Identity of a message in local state
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum MessageKey {
    Persisted(MessageId),
    Pending(PendingId),
}

impl MessageKey {
    pub fn persisted_id(&self) -> Option<&MessageId> {
        match self {
            Self::Persisted(id) => Some(id),
            Self::Pending(_) => None,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending(_))
    }
}

impl From<MessageId> for MessageKey {
    fn from(id: MessageId) -> Self {
        Self::Persisted(id)
    }
}

impl From<PendingId> for MessageKey {
    fn from(id: PendingId) -> Self {
        Self::Pending(id)
    }
}

/// One turn in a thread
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub key: MessageKey,
    pub thread_id: ThreadId,
    pub role: Role,
    pub content: String,
    pub created_at: DateTime<Utc>,
    pub parent_id: Option<MessageId>,
    pub is_streaming: bool,
}

impl Message {
    /// A message the server has already stored
    pub fn persisted(
        id: MessageId,
        thread_id: ThreadId,
        role: Role,
        content: impl Into<String>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: MessageKey::Persisted(id),
            thread_id,
            role,
            content: content.into(),
            created_at,
            parent_id: None,
            is_streaming: false,
        }
    }

    /// Empty assistant reply that will be filled in from a stream
    pub fn streaming_placeholder(
        thread_id: ThreadId,
        parent_id: Option<MessageId>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key: MessageKey::Pending(PendingId::new()),
            thread_id,
            role: Role::Assistant,
            content: String::new(),
            created_at,
            parent_id,
            is_streaming: true,
        }
    }

    pub fn with_parent(mut self, parent_id: MessageId) -> Self {
        self.parent_id = Some(parent_id);
        self
    }

    pub fn id(&self) -> Option<&MessageId> {
        self.key.persisted_id()
    }
}

/// File handed to `send_message`. Not uploaded yet.
#[derive(Debug, Clone, PartialEq)]
pub struct Attachment {
    pub name: String,
    pub media_type: String,
    pub data: Bytes,
}

impl Attachment {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, data: impl Into<Bytes>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            data: data.into(),
        }
    }
}
