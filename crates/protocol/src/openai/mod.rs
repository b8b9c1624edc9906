//! OpenAI ↔ Upstream Transformer (spec.md C10 / §4.10)

mod request;
mod response;
mod stream;

pub use request::{ChatCompletionRequest, ChatMessage, ChatTool};
pub use response::{ChatCompletionResponse, to_chat_completion};
pub use stream::{ChatCompletionChunk, StreamAccumulator};

use crate::upstream::UpstreamRequest;
use crate::Result;

/// Translate a client `chat/completions` body into the upstream envelope
/// (spec.md §4.10 "Request → upstream").
pub fn to_upstream(req: &ChatCompletionRequest, project: &str) -> Result<UpstreamRequest> {
    let body = request::build_generate_content_body(req)?;
    Ok(UpstreamRequest::wrap(req.model.clone(), project.to_string(), body))
}
