//! Chart Protocol Frame Codec
//!
//! The chart WebSocket wraps every payload as `~m~<len>~m~<payload>`,
//! and a single WebSocket text message may carry several frames back to
//! back. Payloads are either JSON messages `{"m": method, "p": params}` or
//! heartbeats `~h~<n>` that the client must echo.

use serde_json::{Value, json};

const MARKER: &str = "~m~";
const HEARTBEAT_PREFIX: &str = "~h~";

/// Codec errors.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    /// Frame did not start with the `~m~` marker.
    #[error("missing frame marker at offset {0}")]
    MissingMarker(usize),

    /// Length prefix was not a number or overran the message.
    #[error("invalid frame length at offset {0}")]
    InvalidLength(usize),

    /// Payload was neither a heartbeat nor valid JSON.
    #[error("JSON codec error: {0}")]
    Json(#[from] serde_json::Error),
}

/// One decoded frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// Heartbeat payload (including the `~h~` prefix), to be echoed back.
    Heartbeat(String),
    /// JSON message.
    Message(Value),
}

/// Wrap a raw payload in a frame.
pub fn frame(payload: &str) -> String {
    format!("{MARKER}{}{MARKER}{payload}", payload.len())
}

/// Encode a protocol call as a framed JSON message.
pub fn encode_message(method: &str, params: &Value) -> String {
    frame(&json!({ "m": method, "p": params }).to_string())
}

/// Decode every frame in a WebSocket text message.
///
/// # Errors
/// Fails on the first malformed frame; frames before it are discarded
/// along with it since the stream position is no longer trustworthy.
pub fn decode_frames(text: &str) -> Result<Vec<Frame>, CodecError> {
    let mut frames = Vec::new();
    let mut offset = 0;

    while offset < text.len() {
        let rest = &text[offset..];
        let after_marker = rest
            .strip_prefix(MARKER)
            .ok_or(CodecError::MissingMarker(offset))?;
        let len_end = after_marker
            .find(MARKER)
            .ok_or(CodecError::InvalidLength(offset))?;
        let len: usize = after_marker[..len_end]
            .parse()
            .map_err(|_| CodecError::InvalidLength(offset))?;

        let payload_start = offset + MARKER.len() + len_end + MARKER.len();
        let payload_end = payload_start
            .checked_add(len)
            .filter(|end| *end <= text.len() && text.is_char_boundary(*end))
            .ok_or(CodecError::InvalidLength(offset))?;
        let payload = &text[payload_start..payload_end];

        if payload.starts_with(HEARTBEAT_PREFIX) {
            frames.push(Frame::Heartbeat(payload.to_string()));
        } else {
            frames.push(Frame::Message(serde_json::from_str(payload)?));
        }

        offset = payload_end;
    }

    Ok(frames)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frame_prefixes_length() {
        assert_eq!(frame("~h~7"), "~m~4~m~~h~7");
    }

    #[test]
    fn test_encode_message_shape() {
        let text = encode_message("chart_create_session", &json!(["cs_1", ""]));
        let frames = decode_frames(&text).unwrap();
        assert_eq!(
            frames,
            vec![Frame::Message(json!({ "m": "chart_create_session", "p": ["cs_1", ""] }))]
        );
    }

    #[test]
    fn test_decode_multiple_frames_and_heartbeat() {
        let text = format!("{}{}", frame(r#"{"m":"du","p":[]}"#), frame("~h~12"));
        let frames = decode_frames(&text).unwrap();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1], Frame::Heartbeat("~h~12".to_string()));
    }

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(matches!(decode_frames("hello"), Err(CodecError::MissingMarker(0))));
        assert!(matches!(decode_frames("~m~99~m~{}"), Err(CodecError::InvalidLength(0))));
        assert!(matches!(decode_frames("~m~x~m~{}"), Err(CodecError::InvalidLength(0))));
        assert!(matches!(decode_frames("~m~3~m~{x}"), Err(CodecError::Json(_))));
    }

    #[test]
    fn test_decode_empty_message() {
        assert!(decode_frames("").unwrap().is_empty());
    }
}
