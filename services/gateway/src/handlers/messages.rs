//! `POST /v1/messages` — Anthropic dialect (spec.md §6, §4.11)

use std::time::Instant;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;
use protocol::anthropic::MessagesRequest;
use tracing::{debug, info};

use crate::auth::check_anthropic_key;
use crate::error::{ApiError, Dialect};
use crate::state::AppState;

pub async fn messages(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(req): Json<MessagesRequest>,
) -> Response {
    if let Err(e) = check_anthropic_key(&headers, state.proxy_api_key.as_ref()) {
        return e.into_response();
    }

    let request_id = common::ids::request_id();
    let started = Instant::now();
    debug!(request_id = %request_id, model = %req.model, stream = req.stream, "messages request received");

    if req.stream {
        return stream_response(&state, &req, request_id, started).await;
    }

    match dispatch::anthropic::unary(&state.dispatcher, &req).await {
        Ok(resp) => {
            crate::metrics::record_request("anthropic", 200, started.elapsed().as_secs_f64());
            info!(request_id = %request_id, model = %req.model, "messages request served");
            let mut response = (StatusCode::OK, Json(resp)).into_response();
            insert_header(&mut response, "x-request-id", &request_id);
            response
        }
        Err(err) => {
            let api_err = ApiError::from_dispatch(err, Dialect::Anthropic);
            crate::metrics::record_request("anthropic", api_err.status.as_u16(), started.elapsed().as_secs_f64());
            if api_err.status == StatusCode::TOO_MANY_REQUESTS {
                crate::metrics::record_upstream_retry("anthropic");
            }
            let mut response = api_err.into_response();
            insert_header(&mut response, "x-request-id", &request_id);
            response
        }
    }
}

async fn stream_response(
    state: &AppState,
    req: &MessagesRequest,
    request_id: String,
    started: Instant,
) -> Response {
    match dispatch::anthropic::stream(&state.dispatcher, req).await {
        Ok(stream) => {
            crate::metrics::record_request("anthropic", 200, started.elapsed().as_secs_f64());
            let body = Body::from_stream(stream.map(Ok::<_, std::io::Error>));
            let mut response = Response::new(body);
            *response.status_mut() = StatusCode::OK;
            insert_header(&mut response, header::CONTENT_TYPE.as_str(), "text/event-stream");
            insert_header(&mut response, header::CACHE_CONTROL.as_str(), "no-cache");
            insert_header(&mut response, "x-request-id", &request_id);
            response
        }
        Err(err) => {
            let api_err = ApiError::from_dispatch(err, Dialect::Anthropic);
            crate::metrics::record_request("anthropic", api_err.status.as_u16(), started.elapsed().as_secs_f64());
            let mut response = api_err.into_response();
            insert_header(&mut response, "x-request-id", &request_id);
            response
        }
    }
}

fn insert_header(response: &mut Response, name: &str, value: &str) {
    if let Ok(value) = HeaderValue::from_str(value) {
        response.headers_mut().insert(
            axum::http::HeaderName::from_bytes(name.as_bytes()).expect("valid header name"),
            value,
        );
    }
}
