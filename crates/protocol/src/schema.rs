//! JSON-schema cleaning for Claude-variant models (spec.md §4.10)
//!
//! Claude's tool-use schema rejects several JSON-schema keys that Gemini's
//! upstream tolerates. Removal is recursive and, per spec.md §9, a
//! deliberately lossy one for `$ref` — it drops the reference instead of
//! resolving it, which destroys any schema that relies on one.

use serde_json::Value;

const REMOVED_KEYS: [&str; 6] = [
    "$schema",
    "additionalProperties",
    "strict",
    "default",
    "title",
    "$id",
];

/// Plus `$ref`, tracked separately only so the constant list above reads as
/// the "normal" JSON-schema noise and this one documents the lossy case.
const REF_KEY: &str = "$ref";

/// Recursively strip schema keys Claude's tool-use endpoint rejects.
/// Idempotent: cleaning an already-clean schema is a no-op.
pub fn clean_claude_schema(value: &Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut cleaned = serde_json::Map::new();
            for (key, v) in map {
                if REMOVED_KEYS.contains(&key.as_str()) || key == REF_KEY {
                    continue;
                }
                cleaned.insert(key.clone(), clean_claude_schema(v));
            }
            Value::Object(cleaned)
        }
        Value::Array(items) => Value::Array(items.iter().map(clean_claude_schema).collect()),
        other => other.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn removes_top_level_disallowed_keys() {
        let schema = json!({
            "$schema": "http://json-schema.org/draft-07/schema#",
            "type": "object",
            "additionalProperties": false,
            "strict": true,
            "default": {},
            "title": "Thing",
            "$id": "thing",
        });
        let cleaned = clean_claude_schema(&schema);
        assert_eq!(cleaned, json!({ "type": "object" }));
    }

    #[test]
    fn removes_ref_key_even_though_lossy() {
        let schema = json!({ "$ref": "#/definitions/Foo" });
        let cleaned = clean_claude_schema(&schema);
        assert_eq!(cleaned, json!({}));
    }

    #[test]
    fn recurses_into_nested_objects_and_arrays() {
        let schema = json!({
            "type": "object",
            "properties": {
                "items": {
                    "type": "array",
                    "items": { "title": "Item", "type": "string" }
                }
            }
        });
        let cleaned = clean_claude_schema(&schema);
        assert_eq!(
            cleaned,
            json!({
                "type": "object",
                "properties": {
                    "items": {
                        "type": "array",
                        "items": { "type": "string" }
                    }
                }
            })
        );
    }

    #[test]
    fn cleaning_is_idempotent() {
        let schema = json!({
            "$schema": "x", "type": "object", "title": "t",
            "properties": { "a": { "$ref": "#/a", "default": 1 } }
        });
        let once = clean_claude_schema(&schema);
        let twice = clean_claude_schema(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn no_removed_key_survives_anywhere_in_output() {
        let schema = json!({
            "$schema": "x",
            "nested": { "additionalProperties": false, "deeper": { "strict": true, "$ref": "y" } }
        });
        let cleaned = clean_claude_schema(&schema);
        let serialized = cleaned.to_string();
        for key in REMOVED_KEYS.iter().chain([&REF_KEY]) {
            assert!(!serialized.contains(key), "key {key} leaked into cleaned schema");
        }
    }
}
