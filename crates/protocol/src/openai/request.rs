//! OpenAI `chat/completions` request parsing and translation to the upstream
//! `generateContent` body (spec.md §4.10 "Request → upstream").

use serde::Deserialize;
use serde_json::Value;

use crate::image::parse_image_url;
use crate::models::{self, CLAUDE_DEFAULT_MAX_TOKENS};
use crate::schema::clean_claude_schema;
use crate::upstream::{
    Content, FunctionCall, FunctionCallingConfig, FunctionDeclaration, FunctionResponse,
    GenerateContentBody, GenerationConfig, Part, Tool, ToolConfig, default_safety_settings,
};
use crate::{Error, Result};

#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub stream: bool,
    #[serde(default)]
    pub temperature: Option<f64>,
    #[serde(default)]
    pub top_p: Option<f64>,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stop: Option<StopSequences>,
    #[serde(default)]
    pub tools: Option<Vec<ChatTool>>,
    #[serde(default)]
    pub tool_choice: Option<Value>,
    #[serde(default)]
    pub reasoning_effort: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum StopSequences {
    One(String),
    Many(Vec<String>),
}

impl StopSequences {
    fn into_vec(self) -> Vec<String> {
        match self {
            StopSequences::One(s) => vec![s],
            StopSequences::Many(v) => v,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    #[serde(default)]
    pub content: Option<Value>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallIn>>,
    #[serde(default)]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ToolCallIn {
    #[serde(default)]
    pub id: Option<String>,
    pub function: FunctionCallIn,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FunctionCallIn {
    pub name: String,
    pub arguments: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatTool {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: ChatFunctionDef,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatFunctionDef {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Option<Value>,
}

/// Build the upstream `generateContent` body for a chat-completions request
/// (spec.md §4.10 "Request → upstream").
pub fn build_generate_content_body(req: &ChatCompletionRequest) -> Result<GenerateContentBody> {
    let (system_instruction, contents) = translate_messages(&req.messages)?;

    let claude = models::is_claude(&req.model);
    let max_tokens = req
        .max_tokens
        .or(if claude { Some(CLAUDE_DEFAULT_MAX_TOKENS) } else { None });

    let thinking_config = models::build_thinking_config(&req.model, req.reasoning_effort.as_deref());

    let generation_config = GenerationConfig {
        temperature: req.temperature,
        top_p: req.top_p,
        max_output_tokens: max_tokens,
        stop_sequences: req.stop.clone().map(StopSequences::into_vec),
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

fn build_declarations(tools: &[ChatTool], claude: bool) -> Vec<FunctionDeclaration> {
    tools
        .iter()
        .map(|t| {
            let mut decl = FunctionDeclaration {
                name: t.function.name.clone(),
                description: t.function.description.clone(),
                parameters: None,
                parameters_json_schema: None,
            };
            if let Some(schema) = &t.function.parameters {
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
    let (mode, allowed) = match choice {
        Value::String(s) if s == "auto" => ("AUTO".to_string(), None),
        Value::String(s) if s == "none" => ("NONE".to_string(), None),
        Value::String(s) if s == "required" => ("ANY".to_string(), None),
        Value::Object(obj) => {
            let name = obj
                .get("function")
                .and_then(|f| f.get("name"))
                .and_then(|n| n.as_str())
                .map(str::to_string);
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

/// Split messages into the upstream `systemInstruction` (last `system`
/// message) and the ordered `contents` list (spec.md §4.10).
fn translate_messages(messages: &[ChatMessage]) -> Result<(Option<Content>, Vec<Content>)> {
    let system_instruction = messages
        .iter()
        .rev()
        .find(|m| m.role == "system")
        .and_then(|m| m.content.as_ref())
        .and_then(text_of)
        .map(|text| Content {
            role: "user".to_string(),
            parts: vec![Part::text(text)],
        });

    let mut contents = Vec::new();
    for message in messages {
        match message.role.as_str() {
            "system" => continue,
            "user" => contents.push(translate_user_message(message)?),
            "assistant" => contents.push(translate_assistant_message(message)?),
            "tool" => contents.push(translate_tool_message(message)?),
            other => return Err(Error::InvalidRequest(format!("unsupported role: {other}"))),
        }
    }

    Ok((system_instruction, contents))
}

fn text_of(content: &Value) -> Option<String> {
    match content {
        Value::String(s) => Some(s.clone()),
        Value::Array(parts) => {
            let joined: String = parts
                .iter()
                .filter_map(|p| p.get("text").and_then(|t| t.as_str()))
                .collect::<Vec<_>>()
                .join("");
            (!joined.is_empty()).then_some(joined)
        }
        _ => None,
    }
}

fn translate_user_message(message: &ChatMessage) -> Result<Content> {
    let mut parts = Vec::new();
    match message.content.as_ref() {
        Some(Value::String(text)) => parts.push(Part::text(text.clone())),
        Some(Value::Array(items)) => {
            for item in items {
                let kind = item.get("type").and_then(|t| t.as_str()).unwrap_or("text");
                match kind {
                    "text" => {
                        if let Some(text) = item.get("text").and_then(|t| t.as_str()) {
                            parts.push(Part::text(text));
                        }
                    }
                    "image_url" => {
                        let url = item
                            .get("image_url")
                            .and_then(|u| u.get("url"))
                            .and_then(|u| u.as_str())
                            .unwrap_or_default();
                        parts.push(Part {
                            inline_data: Some(parse_image_url(url)),
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

fn translate_assistant_message(message: &ChatMessage) -> Result<Content> {
    let mut parts = Vec::new();
    if let Some(text) = message.content.as_ref().and_then(text_of) {
        parts.push(Part::text(text));
    }
    if let Some(tool_calls) = &message.tool_calls {
        for call in tool_calls {
            let args: serde_json::Value =
                serde_json::from_str(&call.function.arguments).unwrap_or(Value::Null);
            parts.push(Part {
                function_call: Some(FunctionCall {
                    id: call.id.clone(),
                    name: call.function.name.clone(),
                    args,
                }),
                ..Default::default()
            });
        }
    }
    Ok(Content {
        role: "model".to_string(),
        parts,
    })
}

fn translate_tool_message(message: &ChatMessage) -> Result<Content> {
    let raw = message
        .content
        .as_ref()
        .and_then(text_of)
        .unwrap_or_default();
    let parsed: Value = serde_json::from_str(&raw)
        .unwrap_or_else(|_| serde_json::json!({ "output": raw }));
    Ok(Content {
        role: "user".to_string(),
        parts: vec![Part {
            function_response: Some(FunctionResponse {
                id: message.tool_call_id.clone(),
                name: "tool".to_string(),
                response: parsed,
            }),
            ..Default::default()
        }],
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn message(role: &str, content: Value) -> ChatMessage {
        ChatMessage {
            role: role.to_string(),
            content: Some(content),
            tool_calls: None,
            tool_call_id: None,
        }
    }

    #[test]
    fn last_system_message_becomes_system_instruction() {
        let messages = vec![
            message("system", json!("first")),
            message("system", json!("second")),
            message("user", json!("hi")),
        ];
        let (system, contents) = translate_messages(&messages).unwrap();
        let system = system.unwrap();
        assert_eq!(system.role, "user");
        assert_eq!(system.parts[0].text.as_deref(), Some("second"));
        assert_eq!(contents.len(), 1);
    }

    #[test]
    fn user_image_url_parses_data_url() {
        let messages = vec![message(
            "user",
            json!([
                {"type": "text", "text": "what is this?"},
                {"type": "image_url", "image_url": {"url": "data:image/jpeg;base64,Zm9v"}}
            ]),
        )];
        let (_, contents) = translate_messages(&messages).unwrap();
        let parts = &contents[0].parts;
        assert_eq!(parts[0].text.as_deref(), Some("what is this?"));
        let inline = parts[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/jpeg");
        assert_eq!(inline.data, "Zm9v");
    }

    #[test]
    fn assistant_tool_calls_decode_arguments_into_args() {
        let mut msg = message("assistant", json!(null));
        msg.tool_calls = Some(vec![ToolCallIn {
            id: Some("call_1".into()),
            function: FunctionCallIn {
                name: "lookup".into(),
                arguments: r#"{"q":"x"}"#.into(),
            },
        }]);
        let content = translate_assistant_message(&msg).unwrap();
        assert_eq!(content.role, "model");
        let call = content.parts[0].function_call.as_ref().unwrap();
        assert_eq!(call.name, "lookup");
        assert_eq!(call.args, json!({"q":"x"}));
    }

    #[test]
    fn tool_message_falls_back_to_output_wrapper_on_invalid_json() {
        let mut msg = message("tool", json!("not json"));
        msg.tool_call_id = Some("call_1".into());
        let content = translate_tool_message(&msg).unwrap();
        let response = content.parts[0].function_response.as_ref().unwrap();
        assert_eq!(response.response, json!({"output": "not json"}));
        assert_eq!(response.id.as_deref(), Some("call_1"));
    }

    #[test]
    fn claude_model_cleans_tool_schema() {
        let schema = json!({"type": "object", "additionalProperties": false});
        let tools = vec![ChatTool {
            kind: "function".into(),
            function: ChatFunctionDef {
                name: "f".into(),
                description: None,
                parameters: Some(schema),
            },
        }];
        let decls = build_declarations(&tools, true);
        assert!(decls[0].parameters_json_schema.is_none());
        assert_eq!(decls[0].parameters, Some(json!({"type": "object"})));
    }

    #[test]
    fn tool_choice_named_function_maps_to_any_with_allowed_names() {
        let config = build_tool_config(&json!({"type": "function", "function": {"name": "f"}}));
        assert_eq!(config.function_calling_config.mode, "ANY");
        assert_eq!(
            config.function_calling_config.allowed_function_names,
            Some(vec!["f".to_string()])
        );
    }
}
