//! 请求追踪 ID 注入。
//!
//! 每个请求生成 request_id / trace_id（请求已携带 `x-request-id` 时沿用），
//! 写入请求扩展、日志 span 与响应头。

use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use fabric_telemetry::{RequestIds, new_request_ids};
use tracing::Instrument;

pub const REQUEST_ID_HEADER: &str = "x-request-id";
pub const TRACE_ID_HEADER: &str = "x-trace-id";

pub async fn request_context(mut req: Request<Body>, next: Next) -> Response {
    let mut ids = new_request_ids();
    if let Some(incoming) = req
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
    {
        ids.request_id = incoming.to_string();
    }
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    req.extensions_mut().insert(ids.clone());

    let span = tracing::info_span!(
        "request",
        request_id = %ids.request_id,
        trace_id = %ids.trace_id,
        method = %method,
        path = %path
    );

    let mut response = next.run(req).instrument(span).await;
    insert_ids(&mut response, &ids);
    response
}

fn insert_ids(response: &mut Response, ids: &RequestIds) {
    response.headers_mut().insert(
        REQUEST_ID_HEADER,
        HeaderValue::from_str(&ids.request_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
    response.headers_mut().insert(
        TRACE_ID_HEADER,
        HeaderValue::from_str(&ids.trace_id).unwrap_or_else(|_| HeaderValue::from_static("")),
    );
}
