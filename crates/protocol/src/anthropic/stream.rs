//! Upstream → Anthropic event-typed stream accumulation (spec.md §4.11
//! "Upstream → stream (event-typed)").
//!
//! Unlike the OpenAI dialect's flat delta chunks, Anthropic streams a
//! content-block lifecycle: blocks are opened, receive deltas, and are
//! closed in the same order the upstream produced the parts that back them
//! (spec.md §5 "Ordering").

use serde_json::{json, Value};

use crate::upstream::{UpstreamResponse, UsageMetadata};

#[derive(Debug, Clone)]
pub enum StreamEvent {
    MessageStart { message: Value },
    ContentBlockStart { index: usize, content_block: Value },
    ContentBlockDelta { index: usize, delta: Value },
    ContentBlockStop { index: usize },
    MessageDelta { stop_reason: String, output_tokens: u32 },
    MessageStop,
    Error { kind: String, message: String },
}

impl StreamEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            StreamEvent::MessageStart { .. } => "message_start",
            StreamEvent::ContentBlockStart { .. } => "content_block_start",
            StreamEvent::ContentBlockDelta { .. } => "content_block_delta",
            StreamEvent::ContentBlockStop { .. } => "content_block_stop",
            StreamEvent::MessageDelta { .. } => "message_delta",
            StreamEvent::MessageStop => "message_stop",
            StreamEvent::Error { .. } => "error",
        }
    }

    pub fn to_json(&self) -> Value {
        match self {
            StreamEvent::MessageStart { message } => json!({ "type": "message_start", "message": message }),
            StreamEvent::ContentBlockStart { index, content_block } => {
                json!({ "type": "content_block_start", "index": index, "content_block": content_block })
            }
            StreamEvent::ContentBlockDelta { index, delta } => {
                json!({ "type": "content_block_delta", "index": index, "delta": delta })
            }
            StreamEvent::ContentBlockStop { index } => json!({ "type": "content_block_stop", "index": index }),
            StreamEvent::MessageDelta { stop_reason, output_tokens } => json!({
                "type": "message_delta",
                "delta": { "stop_reason": stop_reason, "stop_sequence": null },
                "usage": { "output_tokens": output_tokens }
            }),
            StreamEvent::MessageStop => json!({ "type": "message_stop" }),
            StreamEvent::Error { kind, message } => json!({
                "type": "error",
                "error": { "type": kind, "message": message }
            }),
        }
    }

    /// Render as one `event: <name>\ndata: <json>\n\n` SSE record (spec.md §6).
    pub fn to_sse(&self) -> String {
        format!("event: {}\ndata: {}\n\n", self.event_name(), self.to_json())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenKind {
    Thinking,
    Text,
}

pub struct StreamAccumulator {
    model: String,
    message_started: bool,
    open_block: Option<(usize, OpenKind)>,
    next_index: usize,
    any_tool_call: bool,
    last_finish_reason: Option<String>,
    is_complete: bool,
}

impl StreamAccumulator {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message_started: false,
            open_block: None,
            next_index: 0,
            any_tool_call: false,
            last_finish_reason: None,
            is_complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    fn message_start_event(&self) -> StreamEvent {
        StreamEvent::MessageStart {
            message: json!({
                "id": format!("msg_{}", uuid::Uuid::new_v4().as_simple()),
                "type": "message",
                "role": "assistant",
                "model": self.model,
                "content": [],
                "stop_reason": null,
                "stop_sequence": null,
                "usage": { "input_tokens": 0, "output_tokens": 0 }
            }),
        }
    }

    /// Process one upstream chunk, returning the client events it produces
    /// in order (spec.md §4.11 "Upstream → stream (event-typed)").
    pub fn on_chunk(&mut self, chunk: &UpstreamResponse) -> Vec<StreamEvent> {
        let mut out = Vec::new();
        if !self.message_started {
            out.push(self.message_start_event());
            self.message_started = true;
        }

        if let Some(candidate) = chunk.candidates.first() {
            if let Some(reason) = &candidate.finish_reason {
                self.last_finish_reason = Some(reason.clone());
            }

            for part in &candidate.content.parts {
                if let Some(call) = &part.function_call {
                    self.any_tool_call = true;
                    if let Some((idx, _)) = self.open_block.take() {
                        out.push(StreamEvent::ContentBlockStop { index: idx });
                    }
                    let idx = self.next_index;
                    self.next_index += 1;
                    let id = call.id.clone().unwrap_or_else(common::ids::tool_call_id);
                    out.push(StreamEvent::ContentBlockStart {
                        index: idx,
                        content_block: json!({
                            "type": "tool_use", "id": id, "name": call.name, "input": {}
                        }),
                    });
                    let partial_json =
                        serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
                    out.push(StreamEvent::ContentBlockDelta {
                        index: idx,
                        delta: json!({ "type": "input_json_delta", "partial_json": partial_json }),
                    });
                    out.push(StreamEvent::ContentBlockStop { index: idx });
                    continue;
                }

                if let Some(text) = &part.text {
                    let kind = if part.is_thought() { OpenKind::Thinking } else { OpenKind::Text };
                    let idx = match self.open_block {
                        Some((idx, open_kind)) if open_kind == kind => idx,
                        Some((idx, _)) => {
                            out.push(StreamEvent::ContentBlockStop { index: idx });
                            let new_idx = self.next_index;
                            self.next_index += 1;
                            let block = match kind {
                                OpenKind::Thinking => json!({ "type": "thinking", "thinking": "" }),
                                OpenKind::Text => json!({ "type": "text", "text": "" }),
                            };
                            out.push(StreamEvent::ContentBlockStart { index: new_idx, content_block: block });
                            self.open_block = Some((new_idx, kind));
                            new_idx
                        }
                        None => {
                            let new_idx = self.next_index;
                            self.next_index += 1;
                            let block = match kind {
                                OpenKind::Thinking => json!({ "type": "thinking", "thinking": "" }),
                                OpenKind::Text => json!({ "type": "text", "text": "" }),
                            };
                            out.push(StreamEvent::ContentBlockStart { index: new_idx, content_block: block });
                            self.open_block = Some((new_idx, kind));
                            new_idx
                        }
                    };
                    let delta = match kind {
                        OpenKind::Thinking => json!({ "type": "thinking_delta", "thinking": text }),
                        OpenKind::Text => json!({ "type": "text_delta", "text": text }),
                    };
                    out.push(StreamEvent::ContentBlockDelta { index: idx, delta });
                }
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            if usage.candidates_token_count > 0 {
                out.extend(self.completion_events(usage));
            }
        }

        out
    }

    fn completion_events(&mut self, usage: &UsageMetadata) -> Vec<StreamEvent> {
        self.is_complete = true;
        let mut out = Vec::new();
        if let Some((idx, _)) = self.open_block.take() {
            out.push(StreamEvent::ContentBlockStop { index: idx });
        }
        out.push(StreamEvent::MessageDelta {
            stop_reason: self.determine_stop_reason(),
            output_tokens: usage.candidates_token_count,
        });
        out.push(StreamEvent::MessageStop);
        out
    }

    /// If upstream ends before a usage-bearing chunk, synthesize the closing
    /// sequence (spec.md §4.11 point 4).
    pub fn finalize(&mut self) -> Vec<StreamEvent> {
        if self.is_complete {
            return Vec::new();
        }
        self.is_complete = true;
        let mut out = Vec::new();
        if let Some((idx, _)) = self.open_block.take() {
            out.push(StreamEvent::ContentBlockStop { index: idx });
        }
        out.push(StreamEvent::MessageDelta {
            stop_reason: self.determine_stop_reason(),
            output_tokens: 0,
        });
        out.push(StreamEvent::MessageStop);
        out
    }

    fn determine_stop_reason(&self) -> String {
        if self.any_tool_call {
            return "tool_use".to_string();
        }
        match self.last_finish_reason.as_deref() {
            Some("MAX_TOKENS") => "max_tokens".to_string(),
            _ => "end_turn".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{Candidate, Content, FunctionCall, Part};
    use serde_json::json as jsonmacro;

    fn chunk(parts: Vec<Part>, finish_reason: Option<&str>) -> UpstreamResponse {
        UpstreamResponse {
            candidates: vec![Candidate {
                content: Content { role: "model".to_string(), parts },
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage_metadata: None,
        }
    }

    #[test]
    fn thinking_then_text_then_usage_matches_spec_sequence() {
        let mut acc = StreamAccumulator::new("claude-sonnet-4-5");
        let mut events = Vec::new();
        events.extend(acc.on_chunk(&chunk(
            vec![Part { thought: Some(true), text: Some("think…".into()), ..Default::default() }],
            None,
        )));
        events.extend(acc.on_chunk(&chunk(vec![Part::text("answer")], None)));
        let usage_chunk = UpstreamResponse {
            candidates: vec![Candidate { content: Content::default(), finish_reason: Some("STOP".to_string()) }],
            usage_metadata: Some(UsageMetadata { prompt_token_count: 1, candidates_token_count: 2, total_token_count: 3 }),
        };
        events.extend(acc.on_chunk(&usage_chunk));

        let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec![
                "message_start",
                "content_block_start",
                "content_block_delta",
                "content_block_start",
                "content_block_delta",
                "content_block_stop",
                "content_block_stop",
                "message_delta",
                "message_stop",
            ]
        );
        assert!(acc.is_complete());
    }

    #[test]
    fn tool_use_block_opens_deltas_and_closes_immediately() {
        let mut acc = StreamAccumulator::new("claude-sonnet-4-5");
        let events = acc.on_chunk(&chunk(
            vec![Part {
                function_call: Some(FunctionCall { id: Some("toolu_1".into()), name: "lookup".into(), args: jsonmacro!({"q":"x"}) }),
                ..Default::default()
            }],
            None,
        ));
        let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
        assert_eq!(
            names,
            vec!["message_start", "content_block_start", "content_block_delta", "content_block_stop"]
        );
    }

    #[test]
    fn finalize_synthesizes_closing_sequence_when_stream_ends_early() {
        let mut acc = StreamAccumulator::new("claude-sonnet-4-5");
        acc.on_chunk(&chunk(vec![Part::text("partial")], None));
        let events = acc.finalize();
        let names: Vec<&str> = events.iter().map(|e| e.event_name()).collect();
        assert_eq!(names, vec!["content_block_stop", "message_delta", "message_stop"]);
        assert!(acc.finalize().is_empty());
    }

    #[test]
    fn sse_rendering_includes_event_and_data_lines() {
        let event = StreamEvent::MessageStop;
        let rendered = event.to_sse();
        assert!(rendered.starts_with("event: message_stop\ndata: "));
        assert!(rendered.ends_with("\n\n"));
    }
}
