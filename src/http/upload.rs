//! Multipart file upload parsing.
//!
//! Files are buffered in memory and exposed to handlers as [`UploadedFiles`].
//! Plain text fields are sanitized like JSON bodies, then become the
//! request's [`JsonBody`] when none exists yet.

use std::collections::HashMap;

use axum::{
    body::{Body, Bytes},
    extract::{multipart::MultipartError, FromRequest, FromRequestParts, Multipart, State},
    http::{header, request::Parts, HeaderMap, Request, StatusCode},
    middleware::Next,
    response::Response,
};
use serde_json::{Map, Value};

use crate::http::body::JsonBody;
use crate::http::response::ApiError;
use crate::security::sanitize;

/// A single uploaded file.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub field: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Bytes,
}

impl UploadedFile {
    pub fn size(&self) -> usize {
        self.data.len()
    }

    pub fn is_image(&self) -> bool {
        self.content_type.starts_with("image/")
    }
}

/// Files of the current request, grouped by form field.
#[derive(Debug, Clone, Default)]
pub struct UploadedFiles(HashMap<String, Vec<UploadedFile>>);

impl UploadedFiles {
    pub fn insert(&mut self, file: UploadedFile) {
        self.0.entry(file.field.clone()).or_default().push(file);
    }

    pub fn first(&self, field: &str) -> Option<&UploadedFile> {
        self.0.get(field).and_then(|files| files.first())
    }

    pub fn all(&self, field: &str) -> &[UploadedFile] {
        self.0.get(field).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<S: Send + Sync> FromRequestParts<S> for UploadedFiles {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<UploadedFiles>()
            .cloned()
            .unwrap_or_default())
    }
}

pub fn is_multipart(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.to_ascii_lowercase().starts_with("multipart/form-data"))
}

fn upload_error(err: MultipartError, limit: usize) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge { limit }
    } else {
        ApiError::BadRequest(format!("Invalid multipart body: {}", err.body_text()))
    }
}

/// Pipeline stage: parse `multipart/form-data` bodies.
pub async fn upload_middleware(
    State(limit): State<usize>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    if !is_multipart(request.headers()) {
        return Ok(next.run(request).await);
    }

    let (mut parts, body) = request.into_parts();

    let mut form_request = Request::new(body);
    *form_request.headers_mut() = parts.headers.clone();
    *form_request.extensions_mut() = parts.extensions.clone();

    let mut multipart = Multipart::from_request(form_request, &())
        .await
        .map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let mut files = UploadedFiles::default();
    let mut fields = Map::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(e, limit))?
    {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match field.file_name().map(str::to_string) {
            Some(file_name) => {
                let content_type = field
                    .content_type()
                    .unwrap_or("application/octet-stream")
                    .to_string();
                let data = field.bytes().await.map_err(|e| upload_error(e, limit))?;
                tracing::debug!(field = %name, file = %file_name, size = data.len(), "Received upload");
                files.insert(UploadedFile {
                    field: name,
                    file_name,
                    content_type,
                    data,
                });
            }
            None => {
                let text = field.text().await.map_err(|e| upload_error(e, limit))?;
                fields.insert(name, Value::String(text));
            }
        }
    }

    parts.headers.remove(header::CONTENT_LENGTH);
    parts.extensions.insert(files);
    if !fields.is_empty() && parts.extensions.get::<JsonBody>().is_none() {
        let mut value = Value::Object(fields);
        sanitize::sanitize_form(&mut value);
        parts.extensions.insert(JsonBody(value));
    }

    Ok(next.run(Request::from_parts(parts, Body::empty())).await)
}
