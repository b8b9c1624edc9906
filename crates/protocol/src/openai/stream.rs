//! Upstream → OpenAI stream accumulation (spec.md §4.10 "Upstream → stream",
//! §3 "Stream accumulator").
//!
//! One accumulator is owned by the task servicing a single stream (spec.md
//! §3 Ownership). Each upstream chunk produces zero or more client chunks;
//! the tool-call index scheme follows the literal behavior spec.md §9 flags
//! as an Open Question rather than the strictly-correct id-keyed one — see
//! `DESIGN.md`.

use std::collections::BTreeMap;

use serde::Serialize;

use crate::upstream::UpstreamResponse;

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeltaToolCall {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub function: Option<DeltaFunction>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DeltaFunction {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub arguments: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct Delta {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "reasoning_content", skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(rename = "tool_calls", skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<DeltaToolCall>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChunkChoice {
    pub index: u32,
    pub delta: Delta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionChunk {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChunkChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<super::response::Usage>,
}

#[derive(Debug, Clone)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

pub struct StreamAccumulator {
    id: String,
    model: String,
    created: u64,
    first_emission: bool,
    tool_calls: BTreeMap<usize, PartialToolCall>,
    next_tool_idx: usize,
    any_tool_call: bool,
    last_finish_reason: Option<String>,
    is_complete: bool,
}

impl StreamAccumulator {
    pub fn new(model: impl Into<String>, created: u64) -> Self {
        Self {
            id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
            model: model.into(),
            created,
            first_emission: true,
            tool_calls: BTreeMap::new(),
            next_tool_idx: 0,
            any_tool_call: false,
            last_finish_reason: None,
            is_complete: false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.is_complete
    }

    fn base_chunk(&self) -> ChatCompletionChunk {
        ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk",
            created: self.created,
            model: self.model.clone(),
            choices: vec![],
            usage: None,
        }
    }

    /// Process one upstream chunk, returning the client chunks it produces
    /// (spec.md §4.10: zero or one for content, plus a terminal chunk when
    /// the chunk carries a non-zero candidates token count).
    pub fn on_chunk(&mut self, chunk: &UpstreamResponse) -> Vec<ChatCompletionChunk> {
        let mut out = Vec::new();

        if let Some(candidate) = chunk.candidates.first() {
            if let Some(reason) = &candidate.finish_reason {
                self.last_finish_reason = Some(reason.clone());
            }

            let mut content = String::new();
            let mut reasoning = String::new();
            let mut tool_deltas = Vec::new();

            for part in &candidate.content.parts {
                if let Some(call) = &part.function_call {
                    let idx = self.next_tool_idx;
                    self.next_tool_idx += 1;
                    self.any_tool_call = true;
                    let id = call.id.clone().unwrap_or_else(common::ids::tool_call_id);
                    let arguments =
                        serde_json::to_string(&call.args).unwrap_or_else(|_| "{}".to_string());
                    self.tool_calls.insert(
                        idx,
                        PartialToolCall {
                            id: id.clone(),
                            name: call.name.clone(),
                            arguments: arguments.clone(),
                        },
                    );
                    tool_deltas.push(DeltaToolCall {
                        index: idx,
                        id: Some(id),
                        kind: Some("function".to_string()),
                        function: Some(DeltaFunction {
                            name: Some(call.name.clone()),
                            arguments,
                        }),
                    });
                    continue;
                }
                if let Some(text) = &part.text {
                    if part.is_thought() {
                        reasoning.push_str(text);
                    } else {
                        content.push_str(text);
                    }
                }
            }

            if !content.is_empty() || !reasoning.is_empty() || !tool_deltas.is_empty() || self.first_emission {
                let role = self.first_emission.then(|| "assistant".to_string());
                self.first_emission = false;
                let mut chunk_out = self.base_chunk();
                chunk_out.choices.push(ChunkChoice {
                    index: 0,
                    delta: Delta {
                        role,
                        content: (!content.is_empty()).then_some(content),
                        reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
                        tool_calls: (!tool_deltas.is_empty()).then_some(tool_deltas),
                    },
                    finish_reason: None,
                });
                out.push(chunk_out);
            }
        }

        if let Some(usage) = &chunk.usage_metadata {
            if usage.candidates_token_count > 0 {
                out.push(self.completion_chunk(usage));
            }
        }

        out
    }

    fn completion_chunk(&mut self, usage: &crate::upstream::UsageMetadata) -> ChatCompletionChunk {
        self.is_complete = true;
        let finish_reason = self.determine_finish_reason();
        let mut chunk = self.base_chunk();
        chunk.choices.push(ChunkChoice {
            index: 0,
            delta: Delta::default(),
            finish_reason: Some(finish_reason.to_string()),
        });
        chunk.usage = Some(super::response::Usage {
            prompt_tokens: usage.prompt_token_count,
            completion_tokens: usage.candidates_token_count,
            total_tokens: usage.total_token_count,
        });
        chunk
    }

    /// If the upstream ended without a usage-bearing chunk, synthesize the
    /// trailing empty-delta completion chunk (spec.md §4.10 last paragraph).
    pub fn finalize(&mut self) -> Option<ChatCompletionChunk> {
        if self.is_complete {
            return None;
        }
        self.is_complete = true;
        let finish_reason = self.determine_finish_reason();
        let mut chunk = self.base_chunk();
        chunk.choices.push(ChunkChoice {
            index: 0,
            delta: Delta::default(),
            finish_reason: Some(finish_reason.to_string()),
        });
        Some(chunk)
    }

    /// Final finish reason selection (spec.md §4.10 last paragraph):
    /// `tool_calls` if any were emitted, else `length`/`content_filter` from
    /// the last observed upstream finish reason, else `stop`.
    fn determine_finish_reason(&self) -> &'static str {
        if self.any_tool_call {
            return "tool_calls";
        }
        match self.last_finish_reason.as_deref() {
            Some("MAX_TOKENS") => "length",
            Some("SAFETY") | Some("RECITATION") => "content_filter",
            _ => "stop",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{Candidate, Content, FunctionCall, Part, UsageMetadata};
    use serde_json::json;

    fn chunk_with_parts(parts: Vec<Part>, finish_reason: Option<&str>) -> UpstreamResponse {
        UpstreamResponse {
            candidates: vec![Candidate {
                content: Content {
                    role: "model".to_string(),
                    parts,
                },
                finish_reason: finish_reason.map(str::to_string),
            }],
            usage_metadata: None,
        }
    }

    #[test]
    fn first_chunk_sets_assistant_role() {
        let mut acc = StreamAccumulator::new("gemini-3-flash", 0);
        let chunks = acc.on_chunk(&chunk_with_parts(vec![Part::text("Hi")], None));
        assert_eq!(chunks[0].choices[0].delta.role.as_deref(), Some("assistant"));
        assert_eq!(chunks[0].choices[0].delta.content.as_deref(), Some("Hi"));
    }

    #[test]
    fn tool_call_then_usage_chunk_produces_expected_sequence() {
        let mut acc = StreamAccumulator::new("gemini-3-flash", 0);
        let mut all = Vec::new();
        all.extend(acc.on_chunk(&chunk_with_parts(vec![Part::text("Hi")], None)));
        all.extend(acc.on_chunk(&chunk_with_parts(
            vec![Part {
                function_call: Some(FunctionCall {
                    id: None,
                    name: "lookup".into(),
                    args: json!({"q": "x"}),
                }),
                ..Default::default()
            }],
            None,
        )));
        let usage_chunk = UpstreamResponse {
            candidates: vec![Candidate {
                content: Content::default(),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: 5,
                candidates_token_count: 3,
                total_token_count: 8,
            }),
        };
        all.extend(acc.on_chunk(&usage_chunk));

        assert_eq!(all.len(), 3);
        assert_eq!(all[0].choices[0].delta.content.as_deref(), Some("Hi"));
        let tool_calls = all[1].choices[0].delta.tool_calls.as_ref().unwrap();
        assert_eq!(tool_calls[0].index, 0);
        assert_eq!(
            tool_calls[0].function.as_ref().unwrap().arguments,
            r#"{"q":"x"}"#
        );
        assert_eq!(all[2].choices[0].finish_reason.as_deref(), Some("tool_calls"));
        assert!(acc.is_complete());
    }

    #[test]
    fn finalize_is_noop_once_already_complete() {
        let mut acc = StreamAccumulator::new("gemini-3-flash", 0);
        acc.on_chunk(&UpstreamResponse {
            candidates: vec![],
            usage_metadata: Some(UsageMetadata {
                prompt_token_count: 1,
                candidates_token_count: 1,
                total_token_count: 2,
            }),
        });
        assert!(acc.finalize().is_none());
    }

    #[test]
    fn finalize_synthesizes_trailing_chunk_when_stream_ends_without_usage() {
        let mut acc = StreamAccumulator::new("gemini-3-flash", 0);
        acc.on_chunk(&chunk_with_parts(vec![Part::text("partial")], Some("MAX_TOKENS")));
        let trailing = acc.finalize().unwrap();
        assert_eq!(trailing.choices[0].finish_reason.as_deref(), Some("length"));
    }
}
