//! JSON request bodies.
//!
//! The body parser stage buffers `application/json` payloads once, parses
//! them and stores the value as a [`JsonBody`] extension. The original bytes
//! are put back so `axum::Json` extractors keep working.

use axum::{
    body::{Body, Bytes},
    extract::{FromRequestParts, State},
    http::{header, request::Parts, HeaderMap, HeaderValue, Request},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::http::response::ApiError;

/// Parsed JSON body of the current request.
#[derive(Debug, Clone, PartialEq)]
pub struct JsonBody(pub Value);

impl JsonBody {
    /// The body as an object, or a client error.
    pub fn into_object(self) -> Result<Map<String, Value>, ApiError> {
        match self.0 {
            Value::Object(map) => Ok(map),
            _ => Err(ApiError::BadRequest("Request body must be a JSON object".into())),
        }
    }
}

impl<S: Send + Sync> FromRequestParts<S> for JsonBody {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<JsonBody>()
            .cloned()
            .ok_or_else(|| ApiError::BadRequest("Please provide a JSON body".into()))
    }
}

/// `application/json` or any `+json` media type.
pub fn is_json(headers: &HeaderMap) -> bool {
    let Some(content_type) = headers.get(header::CONTENT_TYPE).and_then(|v| v.to_str().ok()) else {
        return false;
    };
    let mime = content_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    mime == "application/json" || (mime.starts_with("application/") && mime.ends_with("+json"))
}

/// Read the whole body, refusing anything above `limit` bytes.
pub async fn buffer(headers: &HeaderMap, body: Body, limit: usize) -> Result<Bytes, ApiError> {
    let declared = headers
        .get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok());
    if declared.is_some_and(|len| len > limit) {
        return Err(ApiError::PayloadTooLarge { limit });
    }

    axum::body::to_bytes(body, limit).await.map_err(|e| {
        tracing::debug!(error = %e, "Failed to buffer request body");
        ApiError::PayloadTooLarge { limit }
    })
}

/// Apply `rewrite` to a JSON body if it parses; malformed bodies are passed
/// through untouched so the body parser can reject them.
///
/// `rewrite` returns whether it changed anything.
pub async fn rewrite_json<F>(
    request: Request<Body>,
    limit: usize,
    rewrite: F,
) -> Result<Request<Body>, ApiError>
where
    F: FnOnce(&mut Value) -> bool,
{
    if !is_json(request.headers()) {
        return Ok(request);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = buffer(&parts.headers, body, limit).await?;

    let rewritten = serde_json::from_slice::<Value>(&bytes)
        .ok()
        .and_then(|mut value| rewrite(&mut value).then_some(value));

    let bytes = match rewritten {
        Some(value) => {
            let encoded =
                serde_json::to_vec(&value).map_err(|e| ApiError::Internal(e.to_string()))?;
            parts
                .headers
                .insert(header::CONTENT_LENGTH, HeaderValue::from(encoded.len()));
            Bytes::from(encoded)
        }
        None => bytes,
    };

    Ok(Request::from_parts(parts, Body::from(bytes)))
}

/// Pipeline stage: parse JSON bodies, reject malformed ones.
///
/// Parsing is strict: only objects and arrays are accepted at the top level.
pub async fn body_parser_middleware(
    State(limit): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_json(request.headers()) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();
    let bytes = buffer(&parts.headers, body, limit).await?;

    let value = if bytes.iter().all(u8::is_ascii_whitespace) {
        Value::Object(Map::new())
    } else {
        serde_json::from_slice(&bytes).map_err(|e| {
            tracing::debug!(error = %e, "Rejected malformed JSON body");
            ApiError::BadRequest("Malformed JSON in request body".into())
        })?
    };

    if !(value.is_object() || value.is_array()) {
        tracing::debug!("Rejected JSON body with a scalar at the top level");
        return Err(ApiError::BadRequest("Malformed JSON in request body".into()));
    }

    parts.extensions.insert(JsonBody(value));
    Ok(next.run(Request::from_parts(parts, Body::from(bytes))).await)
}
