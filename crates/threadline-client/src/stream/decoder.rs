use serde::Deserialize;
use serde_json::Value;

use super::frames::{Frame, WireFormat};

/// Strategy for turning one complete line into a frame
pub trait FrameDecoder: Send + Sync {
    /// Decode a trimmed, non-empty line. `None` means the line carries
    /// nothing (unknown prefix, malformed payload) and is skipped.
    fn decode_line(&self, line: &str) -> Option<Frame>;
}

impl WireFormat {
    pub fn decoder(&self) -> Box<dyn FrameDecoder> {
        match self {
            WireFormat::LinePrefixed => Box::new(LinePrefixedDecoder),
            WireFormat::EventStream => Box::new(EventStreamDecoder),
        }
    }
}

// ============================================================================
// LINE-PREFIXED: 0:"text" / 3:"error" / e:{..} / d:{..}
// ============================================================================

pub struct LinePrefixedDecoder;

impl LinePrefixedDecoder {
    fn unescape(payload: &str) -> Option<String> {
        match serde_json::from_str::<String>(payload) {
            Ok(text) => Some(text),
            // Some backends quote the fragment without escaping it
            Err(_) if payload.len() >= 2 && payload.starts_with('"') && payload.ends_with('"') => {
                Some(payload[1..payload.len() - 1].to_string())
            }
            Err(e) => {
                tracing::debug!(error = %e, payload, "skipping malformed text frame");
                None
            }
        }
    }
}

impl FrameDecoder for LinePrefixedDecoder {
    fn decode_line(&self, line: &str) -> Option<Frame> {
        let (prefix, payload) = line.split_once(':')?;

        match prefix {
            "0" => Self::unescape(payload).map(Frame::Text),
            "3" => Some(Frame::Error(
                Self::unescape(payload).unwrap_or_else(|| payload.to_string()),
            )),
            "e" | "d" => Some(Frame::End),
            _ => None,
        }
    }
}

// ============================================================================
// EVENT STREAM: data: {"metadata": ..} / {"chk": ..} / {"eofs": true}
// ============================================================================

pub struct EventStreamDecoder;

#[derive(Debug, Deserialize)]
struct EventPayload {
    #[serde(default)]
    metadata: Option<EventMetadata>,
    #[serde(default)]
    chk: Option<String>,
    #[serde(default)]
    eofs: bool,
    /// Failure reported by the backend, followed by `eofs`
    #[serde(default)]
    err: Option<String>,
    /// Informational notice (e.g. an empty reply); carries no text
    #[serde(default)]
    info: Option<String>,
}

#[derive(Debug, Deserialize)]
struct EventMetadata {
    #[serde(default, alias = "threadId")]
    thread_id: Option<Value>,
    #[serde(
        default,
        alias = "messageId",
        alias = "ai_message_id",
        alias = "assistant_message_id"
    )]
    message_id: Option<Value>,
}

fn id_text(value: Option<Value>) -> Option<String> {
    match value? {
        Value::String(s) => Some(s),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

impl FrameDecoder for EventStreamDecoder {
    fn decode_line(&self, line: &str) -> Option<Frame> {
        let data = line.strip_prefix("data:")?.trim_start();

        if data == "[DONE]" {
            return Some(Frame::End);
        }

        let payload: EventPayload = match serde_json::from_str(data) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::debug!(error = %e, data, "skipping malformed event");
                return None;
            }
        };

        if let Some(message) = payload.err {
            return Some(Frame::Error(message));
        }
        if payload.eofs {
            return Some(Frame::End);
        }
        if let Some(info) = payload.info {
            tracing::debug!(info = %info, "backend notice");
            return None;
        }
        if let Some(meta) = payload.metadata {
            return Some(Frame::Metadata {
                thread_id: id_text(meta.thread_id),
                message_id: id_text(meta.message_id),
            });
        }
        payload.chk.map(Frame::Text)
    }
}
