use axum::extract::Request;
use axum::http::HeaderValue;
use axum::middleware::Next;
use axum::response::Response;
use rand::Rng;
use std::fmt::Write;
use std::time::Instant;

/// Generate a 16-character hex trace ID (8 random bytes).
fn trace_id() -> String {
    let bytes: [u8; 8] = rand::thread_rng().gen();
    let mut s = String::with_capacity(16);
    for b in bytes {
        let _ = write!(s, "{b:02x}");
    }
    s
}

/// Request/response logging with a per-request trace ID echoed back in
/// the `x-trace-id` response header.
pub async fn request_logging(req: Request, next: Next) -> Response {
    let trace_id = trace_id();
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    let start = Instant::now();
    let mut response = next.run(req).await;

    let status = response.status();
    let elapsed_ms = start.elapsed().as_millis() as u64;

    if status.is_server_error() {
        tracing::error!(
            trace_id = %trace_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "request failed"
        );
    } else if status.is_client_error() {
        tracing::warn!(
            trace_id = %trace_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "request rejected"
        );
    } else {
        tracing::info!(
            trace_id = %trace_id,
            method = %method,
            path = %path,
            status = status.as_u16(),
            elapsed_ms,
            "request"
        );
    }

    if let Ok(val) = HeaderValue::from_str(&trace_id) {
        response.headers_mut().insert("x-trace-id", val);
    }
    response
}
