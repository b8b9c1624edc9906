//! Anthropic `/v1/messages` request parsing and translation to the upstream
//! `generateContent` body (spec.md §4.11 "Request → upstream").

use serde::Deserialize;
use serde_json::Value;

use crate::image::parse_image_url;
use crate::models::{self, CLAUDE_DEFAULT_MAX_TOKENS};
use crate::schema::clean_claude_schema;
use crate::upstream::{
    Content, FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse,
    GenerateContentBody, GenerationConfig, InlineData, Part, ThinkingConfig, Tool, ToolConfig,
    default_safety_settings,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct MessagesRequest {
    pub model: String,
    #[serde(default)]
    pub system: Option<Value>,
    pub messages: Vec<AnthropicMessage>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub stop_sequences: Option<Vec<String>>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub tools: Option<Vec<AnthropicTool>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub thinking: Option<ThinkingParam>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ThinkingParam {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub budget_tokens: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicMessage {
    pub role: String,
    pub content: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnthropicTool {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "input_schema")]
    pub input_schema: Option<Value>,
}

/// Build the upstream `generateContent` body for a `/v1/messages` request
/// (spec.md §4.11 "Request → upstream").
pub fn build_generate_content_body(req: &MessagesRequest) -> Result<GenerateContentBody> {
    let system_instruction = req
        .system
        .as_ref()
        .and_then(system_text)
        .map(|text| Content {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        });

    let mut contents = Vec::new();
    for message in &req.messages {
        contents.push(translate_message(message)?);
    }

    let claude = models::is_claude(&req.model);
    let max_tokens = req.max_tokens.or(Some(CLAUDE_DEFAULT_MAX_TOKENS));

    let thinking_config = req.thinking.as_ref().and_then(|t| {
        (t.kind == "enabled").then(|| ThinkingConfig {
            thinking_level: None,
            thinking_budget: Some(t.budget_tokens.unwrap_or(16384)),
            include_thoughts: Some(true),
        })
    });

    let generation_config = GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: max_tokens,
        stop_sequences: req.stop_sequences.clone(),
        thinking_config,
    };

    let tools = req
        .tools
        .as_ref()
        .filter(|t| !t.is_empty())
        .map(|tools| vec![Tool { function_declarations: build_declarations(tools, claude) }]);

    let tool_config = req.tool_choice.as_ref().map(build_tool_config);

    Ok(GenerateContentBody {
        contents,
        system_instruction,
        generation_config: Some(generation_config),
        tools,
        tool_config,
        safety_settings: Some(default_safety_settings()),
    })
}

fn system_text(system: &Value) -> Option<String> {
    match system {
        Value::String(s) => Some(s.clone()),
        Value::Array(blocks) => {
            let joined: String = blocks
                .iter()
                .filter_map(|b| b.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn build_declarations(tools: &[AnthropicTool], claude: bool) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|t| {
            let mut decl = FunctionDeclaration {
                name: t.name.clone(),
                description: t.description.clone(),
                parameters: None,
                parameters_json_schema: None,
            };
            if let Some(schema) = &t.input_schema {
                if claude {
                    decl.parameters = Some(clean_claude_schema(schema));
                } else {
                    decl.parameters_json_schema = Some(schema.clone());
                }
            }
            decl
        })
        .collect()
}

fn build_tool_config(choice: &Value) -> ToolConfig {
    let kind = choice.get("type").and_then(|t| t.as_str()).unwrap_or("auto");
    let (mode, allowed) = match kind {
        "auto" => ("AUTO".to_string(), None),
        "none" => ("NONE".to_string(), None),
        "any" => ("ANY".to_string(), None),
        "tool" => {
            let name = choice.get("name").and_then(|n| n.as_str()).map(str::to_string);
            ("ANY".to_string(), name.map(|n| vec![n]))
        }
        _ => ("AUTO".to_string(), None),
    };
    ToolConfig {
        function_calling_config: FunctionCallingConfig {
            mode,
            allowed_function_names: allowed,
        },
    }
}

fn translate_message(message: &AnthropicMessage) -> Result<Content> {
    match message.role.as_str() {
        "user" => translate_user_content(&message.content),
        "assistant" => translate_assistant_content(&message.content),
        other => Err(Error::InvalidRequest(format!("unsupported role: {other}"))),
    }
}

fn translate_user_content(content: &Value) -> Result<Content> {
    let mut parts = Vec::new();
    match content {
        Value::String(text) => parts.push(Part::text(text.clone())),
        Value::Array(blocks) => {
            for block in blocks {
                let kind = block.get("type").and_then(|t| t.as_str()).unwrap_or("text");
                match kind {
                    "text" => {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            parts.push(Part::text(text));
                        }
                    }
                    "image" => {
                        if let Some(source) = block.get("source") {
                            if source.get("type").and_then(|t| t.as_str()) == Some("base64") {
                                let mime_type = source
                                    .get("media_type")
                                    .and_then(|m| m.as_str())
                                    .unwrap_or("image/png")
                                    .to_string();
                                let data = source
                                    .get("data")
                                    .and_then(|d| d.as_str())
                                    .unwrap_or_default()
                                    .to_string();
                                parts.push(Part {
                                    inline_data: Some(InlineData { mime_type, data }),
                                    ..Default::default()
                                });
                            }
                        }
                    }
                    "tool_result" => {
                        let tool_use_id = block
                            .get("tool_use_id")
                            .and_then(|i| i.as_str())
                            .map(str::to_string);
                        let raw = tool_result_text(block);
                        let parsed: Value = serde_json::from_str(&raw)
                            .unwrap_or_else(|_| serde_json::json!({ "output": raw }));
                        parts.push(Part {
                            function_response: Some(FunctionResponse {
                                id: tool_use_id,
                                name: "tool_result".to_string(),
                                response: serde_json::json!({ "result": parsed }),
                            }),
                            ..Default::default()
                        });
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(Content {
        role: "user".to_string(),
        parts,
    })
}

fn tool_result_text(block: &Value) -> String {
    match block.get("content") {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|i| i.get("text").and_then(|t| t.as_str()))
            .collect::<Vec<_>>()
            .join(""),
        Some(other) => other.to_string(),
        None => String::new(),
    }
}

fn translate_assistant_content(content: &Value) -> Result<Content> {
    let mut parts = Vec::new();
    match content {
        Value::String(text) => parts.push(Part::text(text.clone())),
        Value::Array(blocks) => {
            for block in blocks {
                let kind = block.get("type").and_then(|t| t.as_str()).unwrap_or("text");
                match kind {
                    "text" => {
                        if let Some(text) = block.get("text").and_then(|t| t.as_str()) {
                            parts.push(Part::text(text));
                        }
                    }
                    "tool_use" => {
                        let name = block
                            .get("name")
                            .and_then(|n| n.as_str())
                            .unwrap_or_default()
                            .to_string();
                        let id = block.get("id").and_then(|i| i.as_str()).map(str::to_string);
                        let args = block.get("input").cloned().unwrap_or(Value::Null);
                        parts.push(Part {
                            function_call: Some(FunctionCall { id, name, args }),
                            ..Default::default()
                        });
                    }
                    _ => {}
                }
            }
        }
        _ => {}
    }
    Ok(Content {
        role: "model".to_string(),
        parts,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn system_string_becomes_system_instruction() {
        let req = MessagesRequest {
            model: "gemini-3-flash".into(),
            system: Some(json!("be concise")),
            messages: vec![],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            stream: false,
            tools: None,
            tool_choice: None,
            thinking: None,
        };
        let body = build_generate_content_body(&req).unwrap();
        let system = body.system_instruction.unwrap();
        assert_eq!(system.parts[0].text.as_deref(), Some("be concise"));
    }

    #[test]
    fn user_tool_result_parses_json_content() {
        let message = AnthropicMessage {
            role: "user".into(),
            content: json!([{
                "type": "tool_result",
                "tool_use_id": "toolu_1",
                "content": r#"{"ok":true}"#,
            }]),
        };
        let content = translate_message(&message).unwrap();
        let response = content.parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.id.as_deref(), Some("toolu_1"));
        assert_eq!(response.response, json!({"result": {"ok": true}}));
    }

    #[test]
    fn assistant_tool_use_maps_to_function_call() {
        let message = AnthropicMessage {
            role: "assistant".into(),
            content: json!([
                {"type": "text", "text": "let me check"},
                {"type": "tool_use", "id": "toolu_1", "name": "lookup", "input": {"q": "x"}}
            ]),
        };
        let content = translate_message(&message).unwrap();
        assert_eq!(content.role, "model");
        assert_eq!(content.parts[0].text.as_deref(), Some("let me check"));
        let call = content.parts[1].function_call.as_ref().unwrap();
        assert_eq!(call.name, "lookup");
        assert_eq!(call.args, json!({"q": "x"}));
    }

    #[test]
    fn thinking_enabled_sets_budget_and_include_thoughts() {
        let req = MessagesRequest {
            model: "claude-sonnet-4-5".into(),
            system: None,
            messages: vec![],
            max_tokens: None,
            temperature: None,
            top_p: None,
            stop_sequences: None,
            stream: false,
            tools: None,
            tool_choice: None,
            thinking: Some(ThinkingParam { kind: "enabled".into(), budget_tokens: None }),
        };
        let body = build_generate_content_body(&req).unwrap();
        let thinking = body.generation_config.unwrap().thinking_config.unwrap();
        assert_eq!(thinking.thinking_budget, Some(16384));
        assert_eq!(thinking.include_thoughts, Some(true));
    }
}
