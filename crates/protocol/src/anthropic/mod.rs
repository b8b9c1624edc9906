//! Anthropic ↔ Upstream Transformer (spec.md C11 / §4.11)

mod request;
mod response;
mod stream;

pub use request::{AnthropicTool, MessagesRequest};
pub use response::{ContentBlockOut, MessagesResponse, to_messages_response};
pub use stream::{StreamAccumulator, StreamEvent};

use crate::upstream::UpstreamRequest;
use crate::Result;

/// Translate a client `/v1/messages` body into the upstream envelope
/// (spec.md §4.11 "Request → upstream").
pub fn to_upstream(req: &MessagesRequest, project: &str) -> Result<UpstreamRequest> {
    let body = request::build_generate_content_body(req)?;
    Ok(UpstreamRequest::wrap(req.model.clone(), project.to_string(), body))
}
