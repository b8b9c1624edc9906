//! Upstream → Anthropic unary response translation (spec.md §4.11
//! "Upstream → response (unary)").

use serde::Serialize;
use serde_json::Value;

use crate::upstream::{Candidate, UpstreamResponse};

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ContentBlockOut {
    #[serde(rename = "thinking")]
    Thinking { thinking: String },
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: Value,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct AnthropicUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct MessagesResponse {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub role: &'static str,
    pub model: String,
    pub content: Vec<ContentBlockOut>,
    pub stop_reason: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequence: Option<String>,
    pub usage: AnthropicUsage,
}

fn map_stop_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("MAX_TOKENS") => "max_tokens",
        _ => "end_turn",
    }
}

pub fn to_messages_response(response: &UpstreamResponse, model: &str) -> MessagesResponse {
    let candidate = response.candidates.first().cloned().unwrap_or_default();
    let content = build_content_blocks(&candidate);

    let mut stop_reason = map_stop_reason(candidate.finish_reason.as_deref());
    if content.iter().any(|b| matches!(b, ContentBlockOut::ToolUse { .. })) {
        stop_reason = "tool_use";
    }

    let usage = response
        .usage_metadata
        .as_ref()
        .map(|u| AnthropicUsage {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        })
        .unwrap_or(AnthropicUsage {
            input_tokens: 0,
            output_tokens: 0,
        });

    MessagesResponse {
        id: format!("msg_{}", uuid::Uuid::new_v4().as_simple()),
        kind: "message",
        role: "assistant",
        model: model.to_string(),
        content,
        stop_reason: stop_reason.to_string(),
        stop_sequence: None,
        usage,
    }
}

fn build_content_blocks(candidate: &Candidate) -> Vec<ContentBlockOut> {
    let mut blocks = Vec::new();
    for part in &candidate.content.parts {
        if let Some(call) = &part.function_call {
            blocks.push(ContentBlockOut::ToolUse {
                id: call.id.clone().unwrap_or_else(common::ids::tool_call_id),
                name: call.name.clone(),
                input: call.args.clone(),
            });
            continue;
        }
        if let Some(text) = &part.text {
            if part.is_thought() {
                blocks.push(ContentBlockOut::Thinking {
                    thinking: text.clone(),
                });
            } else {
                blocks.push(ContentBlockOut::Text { text: text.clone() });
            }
        }
    }
    blocks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{Content, FunctionCall, Part};
    use serde_json::json;

    fn response_with(parts: Vec<Part>, finish_reason: Option<&str>) -> UpstreamResponse {
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
    fn thought_and_text_parts_map_to_distinct_block_types() {
        let response = response_with(
            vec![
                Part { thought: Some(true), text: Some("pondering".into()), ..Default::default() },
                Part::text("answer"),
            ],
            Some("STOP"),
        );
        let out = to_messages_response(&response, "claude-sonnet-4-5");
        assert!(matches!(&out.content[0], ContentBlockOut::Thinking { thinking } if thinking == "pondering"));
        assert!(matches!(&out.content[1], ContentBlockOut::Text { text } if text == "answer"));
        assert_eq!(out.stop_reason, "end_turn");
    }

    #[test]
    fn tool_use_overrides_stop_reason() {
        let response = response_with(
            vec![Part {
                function_call: Some(FunctionCall { id: Some("toolu_1".into()), name: "lookup".into(), args: json!({"q":"x"}) }),
                ..Default::default()
            }],
            Some("STOP"),
        );
        let out = to_messages_response(&response, "claude-sonnet-4-5");
        assert_eq!(out.stop_reason, "tool_use");
        assert!(matches!(&out.content[0], ContentBlockOut::ToolUse { id, name, .. } if id == "toolu_1" && name == "lookup"));
    }

    #[test]
    fn max_tokens_maps_to_max_tokens_stop_reason() {
        let response = response_with(vec![Part::text("cut")], Some("MAX_TOKENS"));
        let out = to_messages_response(&response, "claude-sonnet-4-5");
        assert_eq!(out.stop_reason, "max_tokens");
    }
}
