//! Model-name classification and reasoning-config mapping (spec.md §4.10)

use crate::upstream::ThinkingConfig;

/// Advertised by `GET /v1/models` (spec.md §6). Not fetched from the
/// upstream — this is the fixed set of model ids the proxy accepts.
pub const MODEL_TABLE: [&str; 6] = [
    "gemini-3-pro",
    "gemini-3-flash",
    "gemini-2.5-pro",
    "gemini-2.5-flash",
    "claude-sonnet-4-5",
    "claude-opus-4-1",
];

pub const CLAUDE_DEFAULT_MAX_TOKENS: u32 = 8192;

fn normalized(model: &str) -> String {
    model.to_ascii_lowercase()
}

pub fn is_gemini3(model: &str) -> bool {
    normalized(model).contains("gemini-3")
}

pub fn is_gemini25(model: &str) -> bool {
    normalized(model).contains("gemini-2.5")
}

pub fn is_claude(model: &str) -> bool {
    normalized(model).contains("claude")
}

pub fn is_opus(model: &str) -> bool {
    normalized(model).contains("opus")
}

fn thinking_budget_for_effort(effort: &str) -> i64 {
    match effort {
        "low" => 8192,
        "high" => 32768,
        _ => 16384, // "medium" and anything unrecognized
    }
}

/// Build the upstream `thinkingConfig` for a model + optional client
/// `reasoning_effort`, per spec.md §4.10's reasoning rules.
pub fn build_thinking_config(model: &str, reasoning_effort: Option<&str>) -> Option<ThinkingConfig> {
    if is_gemini3(model) {
        let level = if reasoning_effort == Some("low") {
            "low"
        } else {
            "high"
        };
        return Some(ThinkingConfig {
            thinking_level: Some(level.to_string()),
            thinking_budget: None,
            include_thoughts: Some(true),
        });
    }

    if is_claude(model) || is_gemini25(model) {
        if let Some(effort) = reasoning_effort {
            return Some(ThinkingConfig {
                thinking_level: None,
                thinking_budget: Some(thinking_budget_for_effort(effort)),
                include_thoughts: Some(true),
            });
        }
        if is_opus(model) {
            return Some(ThinkingConfig {
                thinking_level: None,
                thinking_budget: Some(-1),
                include_thoughts: Some(true),
            });
        }
    }

    None
}
