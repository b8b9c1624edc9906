//! OpenAI dialect entry points, wiring [`Dispatcher`] to the
//! `protocol::openai` request/response/stream translation (spec.md C10).

use bytes::Bytes;
use futures_util::Stream;
use protocol::openai::{ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, StreamAccumulator};

use crate::{sse, Dispatcher, Result};

fn render(chunk: &ChatCompletionChunk) -> String {
    format!(
        "data: {}\n\n",
        serde_json::to_string(chunk).expect("ChatCompletionChunk always serializes")
    )
}

/// `POST /v1/chat/completions`, non-streaming (spec.md §4.10 "Upstream →
/// response (unary)").
pub async fn unary(dispatcher: &Dispatcher, req: &ChatCompletionRequest) -> Result<ChatCompletionResponse> {
    let created = common::time::now_secs();
    let model = req.model.clone();
    let response = dispatcher
        .unary(Some(&req.model), move |project| protocol::openai::to_upstream(req, project))
        .await?;
    Ok(protocol::openai::to_chat_completion(&response, &model, created))
}

/// `POST /v1/chat/completions`, streaming (spec.md §4.10 "Upstream →
/// stream"). Produces already-framed `data: ...\n\n` SSE records terminated
/// by `data: [DONE]\n\n`.
pub async fn stream(dispatcher: &Dispatcher, req: &ChatCompletionRequest) -> Result<impl Stream<Item = Bytes>> {
    let created = common::time::now_secs();
    let model = req.model.clone();
    let (response, _account) = dispatcher
        .stream(Some(&req.model), move |project| protocol::openai::to_upstream(req, project))
        .await?;

    let accumulator = StreamAccumulator::new(model, created);
    Ok(sse::drive(
        response,
        accumulator,
        |acc, chunk| acc.on_chunk(chunk).iter().map(render).collect(),
        |acc| acc.finalize().iter().map(render).collect(),
        Some("data: [DONE]\n\n"),
    ))
}
