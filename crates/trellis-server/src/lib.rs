//! HTTP transport boundary for the trellis workflow engine.
//!
//! The engine never opens sockets or parses raw HTTP — this crate does.
//! Every inbound request, whatever its method or path, is converted into
//! [`RequestFacts`] and handed to [`Engine::dispatch`]; trigger matching
//! happens inside the engine, so the axum router needs only a fallback
//! handler. Terminal responses are rendered back as status + content type
//! + body; an unmatched trigger renders as 404.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::body::Body;
use axum::extract::{Request, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Router;
use serde_json::{json, Value};
use tower_http::trace::TraceLayer;

use trellis_engine::{parse_cookies, parse_query, DispatchError, Engine, Rendered, RequestFacts};

/// Request bodies larger than this are rejected at the boundary.
const MAX_BODY_BYTES: usize = 2 * 1024 * 1024;

/// Build the axum router serving one engine.
pub fn router(engine: Arc<Engine>) -> Router {
    Router::new()
        .fallback(handle)
        .layer(TraceLayer::new_for_http())
        .with_state(engine)
}

async fn handle(State(engine): State<Arc<Engine>>, request: Request) -> Response {
    let (parts, body) = request.into_parts();

    let bytes = match axum::body::to_bytes(body, MAX_BODY_BYTES).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::debug!(error = %e, "failed to read request body");
            return error_response(StatusCode::PAYLOAD_TOO_LARGE, "request body too large");
        }
    };

    let mut headers = BTreeMap::new();
    for (name, value) in &parts.headers {
        if let Ok(value) = value.to_str() {
            headers.insert(name.as_str().to_lowercase(), value.to_string());
        }
    }
    let cookies = headers
        .get("cookie")
        .map(|h| parse_cookies(h))
        .unwrap_or_default();

    let facts = RequestFacts {
        method: parts.method.as_str().to_uppercase(),
        path: parts.uri.path().to_string(),
        query: parts.uri.query().map(parse_query).unwrap_or_default(),
        headers,
        cookies,
        body: parse_body(&bytes),
    };

    match engine.dispatch(facts).await {
        Ok(execution) => rendered_response(execution.rendered()),
        Err(DispatchError::NoRoute { method, path }) => {
            tracing::debug!(method = %method, path = %path, "no trigger matched");
            error_response(StatusCode::NOT_FOUND, "not found")
        }
        Err(e) => {
            tracing::warn!(error = %e, "dispatch failed");
            error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error")
        }
    }
}

/// JSON bodies parse to their value; anything else is kept as a string;
/// an empty body is null.
fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    if let Ok(value) = serde_json::from_slice(bytes) {
        return value;
    }
    Value::String(String::from_utf8_lossy(bytes).into_owned())
}

fn rendered_response(rendered: Rendered) -> Response {
    let status =
        StatusCode::from_u16(rendered.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = match serde_json::to_string(&rendered.body) {
        Ok(body) => body,
        Err(e) => {
            tracing::warn!(error = %e, "failed to serialize response body");
            return error_response(StatusCode::INTERNAL_SERVER_ERROR, "internal error");
        }
    };
    (
        status,
        [(header::CONTENT_TYPE, rendered.content_type)],
        Body::from(body),
    )
        .into_response()
}

fn error_response(status: StatusCode, message: &str) -> Response {
    let body = json!({"error": {"code": status.as_u16(), "message": message}});
    (
        status,
        [(header::CONTENT_TYPE, "application/json".to_string())],
        Body::from(body.to_string()),
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
