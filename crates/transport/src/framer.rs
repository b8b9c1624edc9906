//! SSE Framer (spec.md C9 / §4.9)
//!
//! Turns a byte stream into a stream of `data:` payloads, surviving
//! arbitrary chunk boundaries by holding the last incomplete line across
//! calls to [`SseFramer::feed`].

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

#[derive(Debug, Default)]
pub struct SseFramer {
    buffer: Vec<u8>,
}

impl SseFramer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed one chunk of upstream bytes, returning the complete `data:`
    /// payloads it produced (trimmed, with empty payloads and the
    /// `[DONE]` sentinel dropped).
    ///
    /// Buffers raw bytes rather than decoding eagerly: a multi-byte UTF-8
    /// character can straddle a chunk boundary, and decoding each chunk in
    /// isolation would independently replace both halves with U+FFFD. Only
    /// a complete line (everything up to and including a `\n`) is ever
    /// decoded, so a split character is kept whole in the byte buffer until
    /// the rest of it arrives.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(chunk);

        let mut payloads = Vec::new();
        let Some(last) = self.buffer.iter().rposition(|&b| b == b'\n') else {
            return payloads;
        };

        let complete: Vec<u8> = self.buffer[..last].to_vec();
        self.buffer.drain(..=last);

        for line in complete.split(|&b| b == b'\n') {
            let line = line.strip_suffix(b"\r").unwrap_or(line);
            let line = String::from_utf8_lossy(line);
            if let Some(rest) = line.strip_prefix(DATA_PREFIX) {
                let payload = rest.trim();
                if payload.is_empty() || payload == DONE_SENTINEL {
                    continue;
                }
                payloads.push(payload.to_string());
            }
        }

        payloads
    }

    /// True if this chunk's textual form contains the `[DONE]` sentinel.
    pub fn saw_done(&self, chunk: &[u8]) -> bool {
        String::from_utf8_lossy(chunk).contains("data: [DONE]")
    }

    /// Clear the partial-line buffer, e.g. between retried streams.
    pub fn reset(&mut self) {
        self.buffer.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_payload_for_whole_line_in_one_chunk() {
        let mut framer = SseFramer::new();
        let payloads = framer.feed(b"data: {\"a\":1}\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn buffers_partial_line_across_chunks() {
        let mut framer = SseFramer::new();
        assert!(framer.feed(b"data: {\"a\":").is_empty());
        let payloads = framer.feed(b"1}\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn ignores_empty_payloads_and_done_sentinel() {
        let mut framer = SseFramer::new();
        let payloads = framer.feed(b"data: \ndata: [DONE]\ndata: {\"a\":1}\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn ignores_non_data_lines() {
        let mut framer = SseFramer::new();
        let payloads = framer.feed(b"event: message\ndata: {\"a\":1}\n\n");
        assert_eq!(payloads, vec!["{\"a\":1}"]);
    }

    #[test]
    fn byte_wise_split_yields_same_payloads_as_one_shot() {
        let whole = b"data: one\ndata: two\ndata: three\n".to_vec();

        let mut one_shot = SseFramer::new();
        let expected = one_shot.feed(&whole);

        let mut split_framer = SseFramer::new();
        let mut actual = Vec::new();
        for byte in &whole {
            actual.extend(split_framer.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(actual, expected);
    }

    #[test]
    fn byte_wise_split_survives_a_multibyte_character_split_mid_codepoint() {
        // "café 🎉" — both the accented 'é' (2 bytes) and the emoji (4 bytes)
        // are multi-byte UTF-8 sequences that can land on either side of a
        // chunk boundary.
        let whole = "data: caf\u{e9} \u{1f389}\n".as_bytes().to_vec();

        let mut one_shot = SseFramer::new();
        let expected = one_shot.feed(&whole);
        assert_eq!(expected, vec!["caf\u{e9} \u{1f389}"]);

        let mut split_framer = SseFramer::new();
        let mut actual = Vec::new();
        for byte in &whole {
            actual.extend(split_framer.feed(std::slice::from_ref(byte)));
        }

        assert_eq!(actual, expected);
    }

    #[test]
    fn reset_clears_buffer() {
        let mut framer = SseFramer::new();
        framer.feed(b"data: partial");
        framer.reset();
        let payloads = framer.feed(b"line\n");
        assert!(payloads.is_empty(), "reset buffer should not complete old partial line");
    }

    #[test]
    fn saw_done_detects_sentinel_in_raw_chunk() {
        let framer = SseFramer::new();
        assert!(framer.saw_done(b"data: [DONE]\n"));
        assert!(!framer.saw_done(b"data: {\"a\":1}\n"));
    }
}
