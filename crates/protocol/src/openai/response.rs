//! Upstream → OpenAI unary response translation (spec.md §4.10
//! "Upstream → response (unary)").

use serde::Serialize;
use serde_json::Value;

use crate::upstream::{Candidate, UpstreamResponse};

#[derive(Debug, Clone, Serialize)]
pub struct ToolCallOut {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionOut,
}

#[derive(Debug, Clone, Serialize)]
pub struct FunctionOut {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatMessageOut {
    pub role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(rename = "reasoning_content", skip_serializing_if = "Option::is_none")]
    pub reasoning_content: Option<String>,
    #[serde(rename = "tool_calls", skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCallOut>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatChoice {
    pub index: u32,
    pub message: ChatMessageOut,
    pub finish_reason: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionResponse {
    pub id: String,
    pub object: &'static str,
    pub created: u64,
    pub model: String,
    pub choices: Vec<ChatChoice>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage: Option<Usage>,
}

/// Map an upstream `finishReason` to the OpenAI dialect's finish reason
/// (spec.md §4.10), before the tool-call override is applied.
fn map_finish_reason(reason: Option<&str>) -> &'static str {
    match reason {
        Some("STOP") => "stop",
        Some("MAX_TOKENS") => "length",
        Some("SAFETY") | Some("RECITATION") => "content_filter",
        _ => "stop",
    }
}

pub fn to_chat_completion(
    response: &UpstreamResponse,
    model: &str,
    created: u64,
) -> ChatCompletionResponse {
    let candidate = response.candidates.first().cloned().unwrap_or_default();
    let (content, reasoning, tool_calls) = extract(&candidate);

    let mut finish_reason = map_finish_reason(candidate.finish_reason.as_deref());
    if !tool_calls.is_empty() {
        finish_reason = "tool_calls";
    }

    let usage = response.usage_metadata.as_ref().map(|u| Usage {
        prompt_tokens: u.prompt_token_count,
        completion_tokens: u.candidates_token_count,
        total_tokens: u.total_token_count,
    });

    ChatCompletionResponse {
        id: format!("chatcmpl-{}", uuid::Uuid::new_v4()),
        object: "chat.completion",
        created,
        model: model.to_string(),
        choices: vec![ChatChoice {
            index: 0,
            message: ChatMessageOut {
                role: "assistant".to_string(),
                content: (!content.is_empty()).then_some(content),
                reasoning_content: (!reasoning.is_empty()).then_some(reasoning),
                tool_calls: (!tool_calls.is_empty()).then_some(tool_calls),
            },
            finish_reason: finish_reason.to_string(),
        }],
        usage,
    }
}

fn extract(candidate: &Candidate) -> (String, String, Vec<ToolCallOut>) {
    let mut content = String::new();
    let mut reasoning = String::new();
    let mut tool_calls = Vec::new();

    for part in &candidate.content.parts {
        if let Some(call) = &part.function_call {
            let id = call
                .id
                .clone()
                .unwrap_or_else(common::ids::tool_call_id);
            let args: Value = call.args.clone();
            tool_calls.push(ToolCallOut {
                id,
                kind: "function".to_string(),
                function: FunctionOut {
                    name: call.name.clone(),
                    arguments: serde_json::to_string(&args).unwrap_or_else(|_| "{}".to_string()),
                },
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

    (content, reasoning, tool_calls)
}
