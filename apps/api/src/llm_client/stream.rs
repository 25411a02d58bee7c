//! Incremental decoder for the Messages API server-sent event stream.
//!
//! Bytes arrive in arbitrary chunks; frames are only parsed once their blank
//! line terminator has been seen, so multi-byte characters and JSON payloads
//! split across chunks decode correctly.

use serde::Deserialize;
use tracing::warn;

/// One decoded upstream event, reduced to what the chat handler consumes.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamEvent {
    TextDelta(String),
    ToolUseStart { index: usize, id: String, name: String },
    ToolInputDelta { index: usize, partial_json: String },
    BlockStop { index: usize },
    MessageStop,
    Error(String),
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireEvent {
    ContentBlockStart { index: usize, content_block: WireBlock },
    ContentBlockDelta { index: usize, delta: WireDelta },
    ContentBlockStop { index: usize },
    MessageStop,
    Error { error: WireError },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireBlock {
    Text {
        #[serde(default)]
        text: String,
    },
    ToolUse {
        id: String,
        name: String,
    },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WireDelta {
    TextDelta { text: String },
    InputJsonDelta { partial_json: String },
    #[serde(other)]
    Other,
}

#[derive(Debug, Deserialize)]
struct WireError {
    message: String,
}

impl WireEvent {
    fn into_event(self) -> Option<StreamEvent> {
        match self {
            WireEvent::ContentBlockStart { index, content_block } => match content_block {
                WireBlock::Text { text } if !text.is_empty() => Some(StreamEvent::TextDelta(text)),
                WireBlock::ToolUse { id, name } => {
                    Some(StreamEvent::ToolUseStart { index, id, name })
                }
                _ => None,
            },
            WireEvent::ContentBlockDelta { index, delta } => match delta {
                WireDelta::TextDelta { text } => Some(StreamEvent::TextDelta(text)),
                WireDelta::InputJsonDelta { partial_json } => {
                    Some(StreamEvent::ToolInputDelta { index, partial_json })
                }
                WireDelta::Other => None,
            },
            WireEvent::ContentBlockStop { index } => Some(StreamEvent::BlockStop { index }),
            WireEvent::MessageStop => Some(StreamEvent::MessageStop),
            WireEvent::Error { error } => Some(StreamEvent::Error(error.message)),
            WireEvent::Other => None,
        }
    }
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    /// Appends a chunk and returns the events of every frame it completed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        self.buffer.extend_from_slice(chunk);
        let mut events = Vec::new();
        while let Some((end, separator_len)) = frame_boundary(&self.buffer) {
            let frame: Vec<u8> = self.buffer.drain(..end + separator_len).collect();
            events.extend(parse_frame(&frame[..end]));
        }
        events
    }

    /// Flushes a final frame that was not followed by a blank line.
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let rest = std::mem::take(&mut self.buffer);
        parse_frame(&rest).into_iter().collect()
    }
}

/// Position and length of the first blank-line separator (`\n\n` or `\r\n\r\n`).
fn frame_boundary(buffer: &[u8]) -> Option<(usize, usize)> {
    let lf = find(buffer, b"\n\n").map(|pos| (pos, 2));
    let crlf = find(buffer, b"\r\n\r\n").map(|pos| (pos, 4));
    match (lf, crlf) {
        (Some(a), Some(b)) => Some(if a.0 <= b.0 { a } else { b }),
        (a, b) => a.or(b),
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

fn parse_frame(frame: &[u8]) -> Option<StreamEvent> {
    let text = String::from_utf8_lossy(frame);
    let data = text
        .lines()
        .map(|line| line.trim_end_matches('\r'))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(str::trim_start)
        .collect::<Vec<_>>()
        .join("\n");

    if data.is_empty() || data == "[DONE]" {
        return None;
    }

    match serde_json::from_str::<WireEvent>(&data) {
        Ok(event) => event.into_event(),
        Err(e) => {
            warn!("Skipping undecodable stream frame: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(event: &str, data: &str) -> String {
        format!("event: {event}\ndata: {data}\n\n")
    }

    #[test]
    fn test_text_deltas_across_chunk_boundaries() {
        let body = [
            frame("message_start", r#"{"type":"message_start","message":{"id":"m1"}}"#),
            frame(
                "content_block_start",
                r#"{"type":"content_block_start","index":0,"content_block":{"type":"text","text":""}}"#,
            ),
            frame(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":0,"delta":{"type":"text_delta","text":"Héllo"}}"#,
            ),
            frame("content_block_stop", r#"{"type":"content_block_stop","index":0}"#),
            frame("message_stop", r#"{"type":"message_stop"}"#),
        ]
        .concat();

        let mut decoder = SseDecoder::default();
        let mut events = Vec::new();
        for chunk in body.as_bytes().chunks(7) {
            events.extend(decoder.push(chunk));
        }
        events.extend(decoder.finish());

        assert_eq!(
            events,
            vec![
                StreamEvent::TextDelta("Héllo".to_string()),
                StreamEvent::BlockStop { index: 0 },
                StreamEvent::MessageStop,
            ]
        );
    }

    #[test]
    fn test_tool_use_events() {
        let body = [
            frame(
                "content_block_start",
                r#"{"type":"content_block_start","index":1,"content_block":{"type":"tool_use","id":"toolu_1","name":"add_to_shortlist","input":{}}}"#,
            ),
            frame(
                "content_block_delta",
                r#"{"type":"content_block_delta","index":1,"delta":{"type":"input_json_delta","partial_json":"{\"university_name\":"}}"#,
            ),
            frame("ping", r#"{"type":"ping"}"#),
            frame("content_block_stop", r#"{"type":"content_block_stop","index":1}"#),
        ]
        .concat();

        let events = SseDecoder::default().push(body.as_bytes());
        assert_eq!(
            events,
            vec![
                StreamEvent::ToolUseStart {
                    index: 1,
                    id: "toolu_1".to_string(),
                    name: "add_to_shortlist".to_string(),
                },
                StreamEvent::ToolInputDelta {
                    index: 1,
                    partial_json: "{\"university_name\":".to_string(),
                },
                StreamEvent::BlockStop { index: 1 },
            ]
        );
    }

    #[test]
    fn test_error_event_and_crlf_framing() {
        let body = "event: error\r\ndata: {\"type\":\"error\",\"error\":{\"type\":\"overloaded_error\",\"message\":\"Overloaded\"}}\r\n\r\n";
        let events = SseDecoder::default().push(body.as_bytes());
        assert_eq!(events, vec![StreamEvent::Error("Overloaded".to_string())]);
    }

    #[test]
    fn test_garbage_and_unterminated_frames() {
        let mut decoder = SseDecoder::default();
        assert!(decoder.push(b"data: not json\n\n").is_empty());
        assert!(decoder.push(b"data: {\"type\":\"message_stop\"}").is_empty());
        assert_eq!(decoder.finish(), vec![StreamEvent::MessageStop]);
        assert!(decoder.finish().is_empty());
    }
}
