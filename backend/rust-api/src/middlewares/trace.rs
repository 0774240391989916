use axum::{
    extract::Request,
    http::{header::HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};
use tracing::Instrument;
use uuid::Uuid;

pub const TRACE_ID_HEADER: &str = "x-trace-id";

#[derive(Clone, Debug)]
pub struct RequestTraceContext {
    pub trace_id: String,
}

fn trace_header(trace_id: &str) -> Option<(HeaderName, HeaderValue)> {
    HeaderValue::from_str(trace_id)
        .ok()
        .map(|value| (HeaderName::from_static(TRACE_ID_HEADER), value))
}

/// Stamps `x-trace-id` on the request and its response, generating one
/// when the caller did not send it.
pub async fn trace_context_middleware(mut request: Request, next: Next) -> Response {
    let incoming = request
        .headers()
        .get(TRACE_ID_HEADER)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);
    let trace_id = incoming
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    request.extensions_mut().insert(RequestTraceContext {
        trace_id: trace_id.clone(),
    });
    if incoming.is_none() {
        if let Some((name, value)) = trace_header(&trace_id) {
            request.headers_mut().insert(name, value);
        }
    }

    let span = tracing::debug_span!(
        "request",
        trace_id = %trace_id,
        method = %request.method(),
        path = %request.uri().path()
    );
    let mut response = next.run(request).instrument(span).await;

    if !response.headers().contains_key(TRACE_ID_HEADER) {
        if let Some((name, value)) = trace_header(&trace_id) {
            response.headers_mut().insert(name, value);
        }
    }

    response
}
