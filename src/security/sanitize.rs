//! Input sanitization: script injection and query-operator injection.
//!
//! Both stages work on the query string and on JSON bodies. Bodies are
//! rewritten before the body parser stage stores the parsed value. Text
//! fields of multipart forms are parsed later, by the upload stage, which
//! runs them through [`sanitize_form`] before exposing them.

use std::borrow::Cow;

use axum::{
    body::Body,
    extract::State,
    http::{Request, Uri},
    middleware::Next,
    response::Response,
};
use serde_json::Value;
use url::form_urlencoded;

use crate::http::body::rewrite_json;
use crate::http::response::ApiError;
use crate::observability::metrics;

/// HTML-escape angle brackets.
pub fn escape_html(input: &str) -> Cow<'_, str> {
    if !input.contains(['<', '>']) {
        return Cow::Borrowed(input);
    }
    Cow::Owned(input.replace('<', "&lt;").replace('>', "&gt;"))
}

/// Escape every string inside `value`. Returns whether anything changed.
pub fn escape_value(value: &mut Value) -> bool {
    match value {
        Value::String(s) => match escape_html(s) {
            Cow::Owned(escaped) => {
                *s = escaped;
                true
            }
            Cow::Borrowed(_) => false,
        },
        Value::Array(items) => items.iter_mut().fold(false, |changed, v| escape_value(v) | changed),
        Value::Object(map) => map
            .values_mut()
            .fold(false, |changed, v| escape_value(v) | changed),
        _ => false,
    }
}

/// Keys a document store could read as an operator or a nested path.
pub fn is_operator_key(key: &str) -> bool {
    key.starts_with('$') || key.contains('.')
}

/// Remove operator keys at any depth. Returns the number removed.
pub fn strip_operator_keys(value: &mut Value) -> usize {
    match value {
        Value::Object(map) => {
            let before = map.len();
            map.retain(|key, _| !is_operator_key(key));
            let removed = before - map.len();
            removed + map.values_mut().map(strip_operator_keys).sum::<usize>()
        }
        Value::Array(items) => items.iter_mut().map(strip_operator_keys).sum(),
        _ => 0,
    }
}

/// Apply both sanitizers to the text fields of a multipart form.
pub fn sanitize_form(value: &mut Value) {
    let removed = strip_operator_keys(value);
    if removed > 0 {
        tracing::warn!(removed, "Stripped operator keys from form fields");
        metrics::record_sanitized("injection_form");
    }
    if escape_value(value) {
        metrics::record_sanitized("xss_form");
    }
}

/// Bracketed query keys such as `price[$gt]` are checked segment by segment.
fn is_operator_query_key(key: &str) -> bool {
    key.split(['[', ']'])
        .filter(|segment| !segment.is_empty())
        .any(is_operator_key)
}

/// Escape query values. `None` when the query needs no change.
pub fn escape_query(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.iter().any(|(_, v)| v.contains(['<', '>'])) {
        return None;
    }
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), escape_html(v))))
            .finish(),
    )
}

/// Drop operator keys from a query. `None` when the query needs no change.
pub fn strip_query_operators(query: &str) -> Option<String> {
    let pairs: Vec<(String, String)> = form_urlencoded::parse(query.as_bytes())
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    if !pairs.iter().any(|(k, _)| is_operator_query_key(k)) {
        return None;
    }
    Some(
        form_urlencoded::Serializer::new(String::new())
            .extend_pairs(pairs.iter().filter(|(k, _)| !is_operator_query_key(k)))
            .finish(),
    )
}

fn replace_query(request: &mut Request<Body>, query: &str) -> Result<(), ApiError> {
    let path_and_query = if query.is_empty() {
        request.uri().path().to_string()
    } else {
        format!("{}?{}", request.uri().path(), query)
    };

    let mut parts = request.uri().clone().into_parts();
    parts.path_and_query = Some(
        path_and_query
            .parse()
            .map_err(|_| ApiError::BadRequest("Invalid query string".into()))?,
    );
    *request.uri_mut() =
        Uri::from_parts(parts).map_err(|_| ApiError::BadRequest("Invalid request URI".into()))?;
    Ok(())
}

/// Pipeline stage: neutralize markup in query values and JSON strings.
pub async fn xss_middleware(
    State(limit): State<usize>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(clean) = request.uri().query().and_then(escape_query) {
        replace_query(&mut request, &clean)?;
        metrics::record_sanitized("xss_query");
    }

    let request = rewrite_json(request, limit, |value| {
        let changed = escape_value(value);
        if changed {
            metrics::record_sanitized("xss_body");
        }
        changed
    })
    .await?;

    Ok(next.run(request).await)
}

/// Pipeline stage: remove document-store operator keys.
pub async fn injection_middleware(
    State(limit): State<usize>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let path = request.uri().path().to_string();

    if let Some(clean) = request.uri().query().and_then(strip_query_operators) {
        tracing::warn!(path = %path, "Stripped operator keys from query string");
        replace_query(&mut request, &clean)?;
        metrics::record_sanitized("injection_query");
    }

    let request = rewrite_json(request, limit, |value| {
        let removed = strip_operator_keys(value);
        if removed > 0 {
            tracing::warn!(path = %path, removed, "Stripped operator keys from request body");
            metrics::record_sanitized("injection_body");
        }
        removed > 0
    })
    .await?;

    Ok(next.run(request).await)
}
