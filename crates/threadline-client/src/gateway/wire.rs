// Request/response shapes of the thread backend.
// The backend has gone through several revisions; readers here accept all of them.

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

use crate::types::{
    ChatStreamRequest, ChatTurn, Message, MessageId, NewMessage, Role, Thread, ThreadId,
};

pub(crate) const MESSAGE_FORMAT: &str = "aui/v0";

// ============================================================================
// SCALAR HELPERS
// ============================================================================

/// Ids arrive as strings or integers depending on the backend revision
pub(crate) fn id_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn role_from(value: &Value) -> Option<Role> {
    serde_json::from_value(value.clone()).ok()
}

/// RFC 3339, naive ISO-8601 (assumed UTC) or epoch milliseconds
pub(crate) fn parse_timestamp(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(raw) => DateTime::parse_from_rfc3339(raw)
            .map(|dt| dt.with_timezone(&Utc))
            .ok()
            .or_else(|| {
                NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                    .ok()
                    .map(|naive| naive.and_utc())
            }),
        Value::Number(n) => n.as_i64().and_then(DateTime::from_timestamp_millis),
        _ => None,
    }
}

fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<Value> = Option::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(parse_timestamp))
}

// ============================================================================
// THREADS
// ============================================================================

#[derive(Debug, Serialize)]
pub(crate) struct CreateThreadBody<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<&'a str>,
    pub last_message_at: DateTime<Utc>,
}

/// Either a bare `{thread_id}` or a full thread record
#[derive(Debug, Deserialize)]
pub(crate) struct ThreadRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    thread_id: Option<Value>,
    #[serde(default)]
    title: Option<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    updated_at: Option<DateTime<Utc>>,
}

impl ThreadRecord {
    /// `None` when the record carries no usable id
    pub(crate) fn into_thread(self, fallback_title: Option<&str>, now: DateTime<Utc>) -> Option<Thread> {
        let id = self
            .id
            .as_ref()
            .and_then(id_text)
            .or_else(|| self.thread_id.as_ref().and_then(id_text))?;

        let created_at = self.created_at.unwrap_or(now);
        let title = self.title.or_else(|| fallback_title.map(str::to_string));

        let mut thread = Thread::new(ThreadId::new(id), title, created_at);
        if let Some(updated_at) = self.updated_at {
            thread.touch(updated_at);
        }
        Some(thread)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum ThreadList {
    Bare(Vec<ThreadRecord>),
    Wrapped { threads: Vec<ThreadRecord> },
}

impl ThreadList {
    pub(crate) fn into_records(self) -> Vec<ThreadRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { threads: records } => records,
        }
    }
}

#[derive(Debug, Serialize)]
pub(crate) struct TitleRequest<'a> {
    pub thread_id: &'a str,
    pub messages: &'a [ChatTurn],
}

// ============================================================================
// CHAT (event-stream backends)
// ============================================================================

/// `{message, history: [[role, text]], system_instructions}`; the last turn
/// is the message, earlier turns are history
#[derive(Debug, Serialize)]
pub(crate) struct MessageEnvelope<'a> {
    pub message: EnvelopeMessage<'a>,
    pub history: Vec<(&'static str, &'a str)>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instructions: Option<&'a str>,
}

#[derive(Debug, Serialize)]
pub(crate) struct EnvelopeMessage<'a> {
    pub message_id: Option<&'a str>,
    pub content: &'a str,
    pub thread_id: Option<&'a str>,
}

fn history_role(role: Role) -> &'static str {
    match role {
        Role::User => "human",
        Role::Assistant => "ai",
    }
}

impl<'a> MessageEnvelope<'a> {
    /// `None` when the request carries no turns
    pub(crate) fn new(request: &'a ChatStreamRequest) -> Option<Self> {
        let (last, earlier) = request.messages.split_last()?;

        Some(Self {
            message: EnvelopeMessage {
                message_id: request.message_id.as_ref().map(MessageId::as_str),
                content: &last.content,
                thread_id: request.thread_id.as_ref().map(ThreadId::as_str),
            },
            history: earlier
                .iter()
                .map(|turn| (history_role(turn.role), turn.content.as_str()))
                .collect(),
            system_instructions: request.system_instructions.as_deref(),
        })
    }
}

// ============================================================================
// MESSAGES
// ============================================================================

#[derive(Debug, Deserialize)]
struct ContentPart {
    #[serde(rename = "type", default)]
    kind: Option<String>,
    #[serde(default)]
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
    Envelope {
        #[serde(default)]
        role: Option<Value>,
        content: Vec<ContentPart>,
    },
}

impl MessageContent {
    fn role(&self) -> Option<Role> {
        match self {
            Self::Envelope { role: Some(role), .. } => role_from(role),
            _ => None,
        }
    }

    fn text(&self) -> String {
        let parts = match self {
            Self::Text(text) => return text.clone(),
            Self::Parts(parts) | Self::Envelope { content: parts, .. } => parts,
        };

        parts
            .iter()
            .filter(|part| part.kind.as_deref().map_or(true, |kind| kind == "text"))
            .filter_map(|part| part.text.as_deref())
            .collect()
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct MessageRecord {
    #[serde(default)]
    id: Option<Value>,
    #[serde(default)]
    message_id: Option<Value>,
    #[serde(default)]
    thread_id: Option<Value>,
    #[serde(default)]
    role: Option<Value>,
    #[serde(default)]
    content: Option<MessageContent>,
    #[serde(default, alias = "createdAt", deserialize_with = "lenient_timestamp")]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    parent_id: Option<Value>,
}

impl MessageRecord {
    /// `thread_id` missing from the record means it belongs to `requested`
    pub(crate) fn into_message(self, requested: &ThreadId, now: DateTime<Utc>) -> Option<Message> {
        let id = self
            .id
            .as_ref()
            .and_then(id_text)
            .or_else(|| self.message_id.as_ref().and_then(id_text))?;

        let thread_id = self
            .thread_id
            .as_ref()
            .and_then(id_text)
            .map(ThreadId::new)
            .unwrap_or_else(|| requested.clone());

        let role = self
            .role
            .as_ref()
            .and_then(role_from)
            .or_else(|| self.content.as_ref().and_then(MessageContent::role))
            .unwrap_or(Role::User);

        let content = self.content.as_ref().map(MessageContent::text).unwrap_or_default();

        let mut message = Message::persisted(
            MessageId::new(id),
            thread_id,
            role,
            content,
            self.created_at.unwrap_or(now),
        );
        if let Some(parent) = self.parent_id.as_ref().and_then(id_text) {
            message = message.with_parent(MessageId::new(parent));
        }
        Some(message)
    }
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub(crate) enum MessageList {
    Bare(Vec<MessageRecord>),
    Wrapped { messages: Vec<MessageRecord> },
}

impl MessageList {
    pub(crate) fn into_records(self) -> Vec<MessageRecord> {
        match self {
            Self::Bare(records) | Self::Wrapped { messages: records } => records,
        }
    }
}

#[derive(Debug, Serialize)]
struct TextPart<'a> {
    #[serde(rename = "type")]
    kind: &'static str,
    text: &'a str,
}

#[derive(Debug, Default, Serialize)]
struct EnvelopeMetadata {
    custom: Map<String, Value>,
}

#[derive(Debug, Serialize)]
struct NewMessageContent<'a> {
    role: Role,
    content: Vec<TextPart<'a>>,
    metadata: EnvelopeMetadata,
}

/// Nested create-message body: `{parent_id, format, content: {role, content: [..], metadata}}`
#[derive(Debug, Serialize)]
pub(crate) struct CreateMessageBody<'a> {
    parent_id: Option<&'a str>,
    format: &'static str,
    content: NewMessageContent<'a>,
}

impl<'a> CreateMessageBody<'a> {
    pub(crate) fn new(message: &'a NewMessage) -> Self {
        Self {
            parent_id: message.parent_id.as_ref().map(MessageId::as_str),
            format: MESSAGE_FORMAT,
            content: NewMessageContent {
                role: message.role,
                content: vec![TextPart {
                    kind: "text",
                    text: &message.content,
                }],
                metadata: EnvelopeMetadata::default(),
            },
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreatedMessage {
    #[serde(alias = "id")]
    pub message_id: Value,
}
