//! Generic upstream-chunk → client-SSE-record driver shared by both dialects
//! (spec.md §4.9 SSE Framer, §4.10/§4.11 stream accumulation).
//!
//! Dialect-specific translation (what a chunk/finalize call produces) is
//! injected via closures; this module only owns the framing, JSON parsing,
//! and `[DONE]`/end-of-body bookkeeping that's identical either way.

use std::collections::VecDeque;

use bytes::Bytes;
use futures_util::stream::{self, Stream};
use protocol::upstream::UpstreamResponse;
use transport::SseFramer;

struct StreamState<Acc, FChunk, FFinal> {
    response: reqwest::Response,
    framer: SseFramer,
    accumulator: Acc,
    on_chunk: FChunk,
    on_finalize: FFinal,
    queue: VecDeque<String>,
    done_line: Option<&'static str>,
    finished: bool,
}

/// Drive `response`'s body through the SSE framer, feeding each parsed
/// upstream chunk to `on_chunk` and the end-of-body condition to
/// `on_finalize`, both writing already-rendered SSE records (`data: ...\n\n`
/// or `event: ...\ndata: ...\n\n`) into the output stream. A malformed
/// upstream JSON line is logged and skipped (spec.md §7 `ParseFailure`); a
/// read error on the body ends the stream the same way a clean EOF would,
/// after running `on_finalize` once.
pub(crate) fn drive<Acc, FChunk, FFinal>(
    response: reqwest::Response,
    accumulator: Acc,
    on_chunk: FChunk,
    on_finalize: FFinal,
    done_line: Option<&'static str>,
) -> impl Stream<Item = Bytes>
where
    Acc: Send + 'static,
    FChunk: FnMut(&mut Acc, &UpstreamResponse) -> Vec<String> + Send + 'static,
    FFinal: FnMut(&mut Acc) -> Vec<String> + Send + 'static,
{
    let state = StreamState {
        response,
        framer: SseFramer::new(),
        accumulator,
        on_chunk,
        on_finalize,
        queue: VecDeque::new(),
        done_line,
        finished: false,
    };

    stream::unfold(state, |mut state| async move {
        loop {
            if let Some(line) = state.queue.pop_front() {
                return Some((Bytes::from(line), state));
            }
            if state.finished {
                return None;
            }

            match state.response.chunk().await {
                Ok(Some(chunk)) => {
                    let payloads = state.framer.feed(&chunk);
                    let saw_done = state.framer.saw_done(&chunk);
                    for payload in payloads {
                        match serde_json::from_str::<UpstreamResponse>(&payload) {
                            Ok(upstream_chunk) => {
                                let lines = (state.on_chunk)(&mut state.accumulator, &upstream_chunk);
                                state.queue.extend(lines);
                            }
                            Err(e) => {
                                tracing::warn!(error = %e, "skipping malformed upstream stream chunk");
                            }
                        }
                    }
                    if saw_done {
                        state.finish();
                    }
                }
                Ok(None) => state.finish(),
                Err(e) => {
                    tracing::warn!(error = %e, "upstream stream body read failed, ending stream");
                    state.finish();
                }
            }
        }
    })
}

impl<Acc, FChunk, FFinal> StreamState<Acc, FChunk, FFinal>
where
    FFinal: FnMut(&mut Acc) -> Vec<String>,
{
    fn finish(&mut self) {
        let lines = (self.on_finalize)(&mut self.accumulator);
        self.queue.extend(lines);
        if let Some(done) = self.done_line {
            self.queue.push_back(done.to_string());
        }
        self.finished = true;
    }
}
