use axum::{
    body::Body,
    http::{HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use std::time::Instant;

pub const TIMING_HEADER: &str = "x-biolink-timing-ms";

#[derive(Copy, Clone)]
pub struct RequestStart(pub Instant);

/// Stamp the request with its start time and report the total on the way out
pub async fn record_request_start(mut request: Request<Body>, next: Next) -> Response {
    let start = Instant::now();
    request.extensions_mut().insert(RequestStart(start));

    let mut response = next.run(request).await;
    response.headers_mut().insert(
        TIMING_HEADER,
        HeaderValue::from(start.elapsed().as_millis() as u64),
    );
    response
}
