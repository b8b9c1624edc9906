//! Anthropic dialect entry points, wiring [`Dispatcher`] to the
//! `protocol::anthropic` request/response/stream translation (spec.md C11).

use bytes::Bytes;
use futures_util::Stream;
use protocol::anthropic::{MessagesRequest, MessagesResponse, StreamAccumulator};

use crate::{sse, Dispatcher, Result};

/// `POST /v1/messages`, non-streaming (spec.md §4.11 "Upstream → response
/// (unary)").
pub async fn unary(dispatcher: &Dispatcher, req: &MessagesRequest) -> Result<MessagesResponse> {
    let model = req.model.clone();
    let response = dispatcher
        .unary(Some(&req.model), move |project| protocol::anthropic::to_upstream(req, project))
        .await?;
    Ok(protocol::anthropic::to_messages_response(&response, &model))
}

/// `POST /v1/messages`, streaming (spec.md §4.11 "Upstream → stream
/// (event-typed)"). Anthropic's wire format has no terminal sentinel line;
/// the response body simply ends after `message_stop`.
pub async fn stream(dispatcher: &Dispatcher, req: &MessagesRequest) -> Result<impl Stream<Item = Bytes>> {
    let model = req.model.clone();
    let (response, _account) = dispatcher
        .stream(Some(&req.model), move |project| protocol::anthropic::to_upstream(req, project))
        .await?;

    let accumulator = StreamAccumulator::new(model);
    Ok(sse::drive(
        response,
        accumulator,
        |acc, chunk| acc.on_chunk(chunk).iter().map(|e| e.to_sse()).collect(),
        |acc| acc.finalize().iter().map(|e| e.to_sse()).collect(),
        None,
    ))
}
