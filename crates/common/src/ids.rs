//! Identifier generation
//!
//! Every id format the proxy emits — client-facing request ids, upstream
//! metadata envelope ids, tool-call ids, and the degraded-mode dummy project
//! id — lives here so the formats stay in one place instead of drifting
//! across the dispatcher and the two dialect transformers.

use rand::Rng;
use uuid::Uuid;

/// Client-facing `x-request-id` header value (spec.md §4.6).
pub fn request_id() -> String {
    format!("req_{}", Uuid::new_v4().as_simple())
}

/// Upstream metadata envelope `requestId` (spec.md §4.10 "Metadata envelope").
pub fn agent_request_id() -> String {
    format!("agent-{}", Uuid::new_v4())
}

/// Upstream metadata envelope `sessionId`: a negative-prefixed 18-digit
/// decimal string, e.g. `-123456789012345678` (spec.md §4.10).
pub fn session_id() -> String {
    let mut rng = rand::rng();
    let digits: String = (0..18)
        .map(|_| char::from_digit(rng.random_range(0..10), 10).unwrap())
        .collect();
    format!("-{digits}")
}

/// OpenAI-dialect tool-call id synthesized when upstream doesn't provide one:
/// `call_<24-hex>` (spec.md §4.10 "Upstream → response (unary)").
pub fn tool_call_id() -> String {
    format!("call_{}", hex_chars(24))
}

const DUMMY_ADJECTIVES: &[&str] = &[
    "quiet", "amber", "brisk", "lunar", "coral", "swift", "vivid", "stark",
];
const DUMMY_NOUNS: &[&str] = &[
    "harbor", "meadow", "falcon", "cinder", "thicket", "summit", "basin", "rivet",
];

/// Degraded-mode dummy project id (spec.md §4.3 step 4).
///
/// Deterministic-looking, but not deterministic: an adjective/noun pair plus
/// 5 random hex characters. This id is expected to be rejected by the
/// upstream; it exists so a resolution failure never blocks dispatch outright,
/// and the caller is responsible for logging it prominently (spec.md §9).
pub fn dummy_project_id() -> String {
    let mut rng = rand::rng();
    let adjective = DUMMY_ADJECTIVES[rng.random_range(0..DUMMY_ADJECTIVES.len())];
    let noun = DUMMY_NOUNS[rng.random_range(0..DUMMY_NOUNS.len())];
    format!("{adjective}-{noun}-{}", hex_chars(5))
}

fn hex_chars(n: usize) -> String {
    let mut rng = rand::rng();
    const HEX: &[u8] = b"0123456789abcdef";
    (0..n)
        .map(|_| HEX[rng.random_range(0..HEX.len())] as char)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_id_has_prefix() {
        assert!(request_id().starts_with("req_"));
    }

    #[test]
    fn agent_request_id_has_prefix_and_uuid_shape() {
        let id = agent_request_id();
        assert!(id.starts_with("agent-"));
        assert_eq!(id.len(), "agent-".len() + 36);
    }

    #[test]
    fn session_id_is_negative_18_digits() {
        let id = session_id();
        assert!(id.starts_with('-'));
        assert_eq!(id.len(), 19);
        assert!(id[1..].chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn tool_call_id_is_24_hex_with_prefix() {
        let id = tool_call_id();
        assert!(id.starts_with("call_"));
        let hex = &id["call_".len()..];
        assert_eq!(hex.len(), 24);
        assert!(hex.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn dummy_project_id_has_adjective_noun_hex_shape() {
        let id = dummy_project_id();
        let parts: Vec<&str> = id.split('-').collect();
        assert_eq!(parts.len(), 3, "expected adjective-noun-hex, got {id}");
        assert_eq!(parts[2].len(), 5);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn ids_are_not_trivially_repeated() {
        let a = request_id();
        let b = request_id();
        assert_ne!(a, b);
    }
}
