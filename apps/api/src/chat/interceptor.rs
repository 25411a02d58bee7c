//! Decides, while the model is still streaming, which text reaches the
//! student and which tool calls must run.
//!
//! Native tool-use blocks are assembled from their JSON deltas. For the text
//! fallback the first non-whitespace character decides the mode: a reply that
//! opens with `{` is held back until the end of the stream and parsed as a
//! tool call, anything else is forwarded as it arrives.

use std::collections::BTreeMap;

use serde_json::Value;
use tracing::warn;

use crate::chat::tools::{extract_tool_call, ToolCall};
use crate::llm_client::{ContentBlock, LlmResponse, StreamEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Emit(String),
    Invoke(ToolCall),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum Mode {
    #[default]
    Undecided,
    Forwarding,
    Buffering,
}

#[derive(Debug, Default)]
struct PendingToolUse {
    id: String,
    name: String,
    input_json: String,
}

#[derive(Debug, Default)]
pub struct StreamInterceptor {
    mode: Mode,
    held: String,
    tool_uses: BTreeMap<usize, PendingToolUse>,
}

impl StreamInterceptor {
    pub fn on_event(&mut self, event: &StreamEvent) -> Vec<Action> {
        match event {
            StreamEvent::TextDelta(text) => self.on_text(text),
            StreamEvent::ToolUseStart { index, id, name } => {
                self.tool_uses.insert(
                    *index,
                    PendingToolUse {
                        id: id.clone(),
                        name: name.clone(),
                        input_json: String::new(),
                    },
                );
                Vec::new()
            }
            StreamEvent::ToolInputDelta { index, partial_json } => {
                if let Some(pending) = self.tool_uses.get_mut(index) {
                    pending.input_json.push_str(partial_json);
                }
                Vec::new()
            }
            StreamEvent::BlockStop { index } => self
                .tool_uses
                .remove(index)
                .and_then(|pending| native_call(&pending.id, &pending.name, &pending.input_json))
                .map(Action::Invoke)
                .into_iter()
                .collect(),
            StreamEvent::MessageStop | StreamEvent::Error(_) => Vec::new(),
        }
    }

    fn on_text(&mut self, text: &str) -> Vec<Action> {
        match self.mode {
            Mode::Forwarding => vec![Action::Emit(text.to_string())],
            Mode::Buffering => {
                self.held.push_str(text);
                Vec::new()
            }
            Mode::Undecided => {
                self.held.push_str(text);
                match self.held.trim_start().chars().next() {
                    None => Vec::new(),
                    Some('{') => {
                        self.mode = Mode::Buffering;
                        Vec::new()
                    }
                    Some(_) => {
                        self.mode = Mode::Forwarding;
                        vec![Action::Emit(std::mem::take(&mut self.held))]
                    }
                }
            }
        }
    }

    /// End of stream: resolves text held back in buffering mode.
    pub fn finish(&mut self) -> Vec<Action> {
        let held = std::mem::take(&mut self.held);
        match self.mode {
            Mode::Buffering => match extract_tool_call(&held) {
                Some(call) => vec![Action::Invoke(call)],
                None => vec![Action::Emit(held)],
            },
            Mode::Undecided | Mode::Forwarding => Vec::new(),
        }
    }

    /// Runs a complete (non-streamed) response through the same rules.
    pub fn absorb_response(response: &LlmResponse) -> Vec<Action> {
        let mut interceptor = Self::default();
        let mut actions = Vec::new();
        for block in &response.content {
            match block {
                ContentBlock::Text { text } => {
                    actions.extend(interceptor.on_text(text));
                }
                ContentBlock::ToolUse { name, input, .. } => {
                    actions.extend(ToolCall::from_native(name, input).map(Action::Invoke));
                }
                ContentBlock::Other => {}
            }
        }
        actions.extend(interceptor.finish());
        actions
    }
}

fn native_call(id: &str, name: &str, input_json: &str) -> Option<ToolCall> {
    let input: Value = if input_json.trim().is_empty() {
        Value::Object(Default::default())
    } else {
        match serde_json::from_str(input_json) {
            Ok(v) => v,
            Err(e) => {
                warn!("Discarding tool_use {id} ({name}) with invalid input: {e}");
                return None;
            }
        }
    };
    let call = ToolCall::from_native(name, &input);
    if call.is_none() {
        warn!("Ignoring unusable tool_use {id} ({name})");
    }
    call
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::Usage;
    use serde_json::json;

    fn text(t: &str) -> StreamEvent {
        StreamEvent::TextDelta(t.to_string())
    }

    fn run(events: &[StreamEvent]) -> Vec<Action> {
        let mut interceptor = StreamInterceptor::default();
        let mut actions: Vec<Action> = events
            .iter()
            .flat_map(|e| interceptor.on_event(e))
            .collect();
        actions.extend(interceptor.finish());
        actions
    }

    fn add(name: &str) -> ToolCall {
        ToolCall::AddToShortlist {
            university_name: name.to_string(),
        }
    }

    #[test]
    fn test_prose_is_forwarded_immediately() {
        let mut interceptor = StreamInterceptor::default();
        assert!(interceptor.on_event(&text("  ")).is_empty());
        assert_eq!(
            interceptor.on_event(&text("\nHello")),
            vec![Action::Emit("  \nHello".to_string())]
        );
        assert_eq!(
            interceptor.on_event(&text(" {not a tool}")),
            vec![Action::Emit(" {not a tool}".to_string())]
        );
        assert!(interceptor.finish().is_empty());
    }

    #[test]
    fn test_json_reply_becomes_invocation() {
        let actions = run(&[
            text(" {\"tool\": \"add_to_"),
            text("shortlist\", \"args\": {\"university_name\": \"MIT\"}}"),
            StreamEvent::MessageStop,
        ]);
        assert_eq!(actions, vec![Action::Invoke(add("MIT"))]);
    }

    #[test]
    fn test_unparseable_buffer_is_forwarded_verbatim() {
        let actions = run(&[text("{\"tool\": \"add_to_shortlist\""), text(", oops")]);
        assert_eq!(
            actions,
            vec![Action::Emit("{\"tool\": \"add_to_shortlist\", oops".to_string())]
        );
    }

    #[test]
    fn test_native_tool_use_assembled_from_deltas() {
        let actions = run(&[
            text("Adding it."),
            StreamEvent::BlockStop { index: 0 },
            StreamEvent::ToolUseStart {
                index: 1,
                id: "toolu_1".to_string(),
                name: "lock_university".to_string(),
            },
            StreamEvent::ToolInputDelta {
                index: 1,
                partial_json: "{\"university_name\": \"Nat".to_string(),
            },
            StreamEvent::ToolInputDelta {
                index: 1,
                partial_json: "ional University of Singapore\"}".to_string(),
            },
            StreamEvent::BlockStop { index: 1 },
            StreamEvent::MessageStop,
        ]);
        assert_eq!(
            actions,
            vec![
                Action::Emit("Adding it.".to_string()),
                Action::Invoke(ToolCall::LockUniversity {
                    university_name: "National University of Singapore".to_string()
                }),
            ]
        );
    }

    #[test]
    fn test_broken_native_input_is_dropped() {
        let actions = run(&[
            StreamEvent::ToolUseStart {
                index: 0,
                id: "toolu_1".to_string(),
                name: "add_to_shortlist".to_string(),
            },
            StreamEvent::ToolInputDelta {
                index: 0,
                partial_json: "{\"university_name\": ".to_string(),
            },
            StreamEvent::BlockStop { index: 0 },
        ]);
        assert!(actions.is_empty());
    }

    #[test]
    fn test_absorb_buffered_response() {
        let response = LlmResponse {
            content: vec![
                ContentBlock::Text {
                    text: "I'll save it.".to_string(),
                },
                ContentBlock::ToolUse {
                    id: "toolu_1".to_string(),
                    name: "add_to_shortlist".to_string(),
                    input: json!({"university_name": "MIT"}),
                },
            ],
            usage: Usage {
                input_tokens: 1,
                output_tokens: 1,
            },
        };
        assert_eq!(
            StreamInterceptor::absorb_response(&response),
            vec![Action::Emit("I'll save it.".to_string()), Action::Invoke(add("MIT"))]
        );
    }
}
