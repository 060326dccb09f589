use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::str::FromStr;

use crate::error::GatewayError;

/// One decoded unit of a chat stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Text fragment to append
    Text(String),

    /// Identifiers announced by the server near the start of the stream
    Metadata {
        thread_id: Option<String>,
        message_id: Option<String>,
    },

    /// Error reported in-band by the server
    Error(String),

    /// Explicit end of stream
    End,
}

/// Framing used by a chat endpoint. One format per connection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WireFormat {
    /// `0:"text"` lines, ended by `e:` / `d:` lines
    #[default]
    LinePrefixed,

    /// `data: {"chk": ...}` lines carrying JSON objects, ended by `eofs`
    EventStream,
}

impl FromStr for WireFormat {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "line_prefixed" | "line-prefixed" | "lines" => Ok(Self::LinePrefixed),
            "event_stream" | "event-stream" | "sse" => Ok(Self::EventStream),
            other => Err(GatewayError::InvalidConfig(format!(
                "unknown wire format '{}'",
                other
            ))),
        }
    }
}

// ============================================================================
// LINE-PREFIXED ENCODING (what the chat proxy emits)
// ============================================================================

/// `0:"<escaped text>"\n`
pub fn encode_text(text: &str) -> String {
    format!("0:{}\n", Value::String(text.to_string()))
}

/// `3:"<escaped message>"\n`
pub fn encode_error(message: &str) -> String {
    format!("3:{}\n", Value::String(message.to_string()))
}

/// Step-finish and done lines closing a stream
pub fn encode_finish(finish_reason: &str) -> String {
    let payload = json!({ "finishReason": finish_reason });
    format!("e:{}\nd:{}\n", payload, payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_encode_text_escapes() {
        assert_eq!(encode_text("a \"b\"\nc"), "0:\"a \\\"b\\\"\\nc\"\n");
    }

    #[test]
    fn test_encode_finish() {
        assert_eq!(
            encode_finish("stop"),
            "e:{\"finishReason\":\"stop\"}\nd:{\"finishReason\":\"stop\"}\n"
        );
    }

    #[test]
    fn test_wire_format_parse() {
        assert_eq!("sse".parse::<WireFormat>().unwrap(), WireFormat::EventStream);
        assert_eq!("LINE_PREFIXED".parse::<WireFormat>().unwrap(), WireFormat::LinePrefixed);
        assert!("xml".parse::<WireFormat>().is_err());
    }
}
