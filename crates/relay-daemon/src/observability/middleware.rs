//! Request ID tagging and HTTP metrics collection for the dashboard's
//! axum router.

use axum::{
    body::Body,
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use uuid::Uuid;

use super::metrics::METRICS;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Request ID extension type, inserted for handlers that want it.
#[derive(Clone, Debug)]
pub struct RequestId(pub String);

/// Tags every request with a request id (propagated from the inbound
/// header if present), carried both as a tracing span and a response
/// header.
pub async fn request_id_middleware(mut request: Request, next: Next) -> Response {
    let request_id = request
        .headers()
        .get(REQUEST_ID_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestId(request_id.clone()));

    let span = tracing::info_span!(
        "request",
        request_id = %request_id,
        method = %request.method(),
        uri = %request.uri(),
    );
    let _guard = span.enter();

    let mut response = next.run(request).await;
    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response
            .headers_mut()
            .insert(HeaderName::from_static("x-request-id"), value);
    }
    response
}

/// Records request count, latency, and active-connection gauge for every
/// request passing through the dashboard.
pub async fn metrics_middleware(request: Request, next: Next) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    METRICS.http_active_connections.inc();
    let response = next.run(request).await;
    METRICS.http_active_connections.dec();

    let duration = start.elapsed().as_secs_f64();
    let status = response.status().as_u16();
    METRICS.record_http_request(&method, &path, status, duration);

    tracing::debug!(%method, %path, %status, duration_ms = %(duration * 1000.0), "request completed");
    response
}

/// Renders the Prometheus text exposition format at `/metrics`.
pub async fn metrics_handler() -> Response<Body> {
    let body = METRICS.encode();
    Response::builder()
        .status(200)
        .header("content-type", "text/plain; version=0.0.4; charset=utf-8")
        .body(Body::from(body))
        .unwrap_or_else(|_| {
            Response::builder()
                .status(500)
                .body(Body::from("failed to encode metrics"))
                .expect("static error response must build")
        })
}
