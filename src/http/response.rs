//! Error responses and the centralized error handler.
//!
//! # Responsibilities
//! - Single conversion from internal failures to client-safe responses
//! - Generic not-found fallback
//! - Panic capture for handlers that fail without returning an error
//!
//! # Design Decisions
//! - Every stage and collaborator returns `Result<_, ApiError>`
//! - Internal details are logged, never sent to the client
//! - Body shape is always `{"msg": "..."}`

use std::any::Any;
use std::time::Duration;

use axum::{
    body::Body,
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::db::StoreError;
use crate::observability::metrics;

pub const GENERIC_ERROR: &str = "Something went wrong try again later";
pub const ROUTE_NOT_FOUND: &str = "Route does not exist";

/// Error body returned to clients.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ErrorBody {
    pub msg: String,
}

/// Every failure a request can end in.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthenticated(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("Route does not exist")]
    RouteNotFound,

    #[error("Request body exceeds the {limit} byte limit")]
    PayloadTooLarge { limit: usize },

    #[error("Too many requests, please try again later.")]
    TooManyRequests { retry_after: Duration },

    /// Anything unexpected; the message is logged only.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthenticated(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) | ApiError::RouteNotFound => StatusCode::NOT_FOUND,
            ApiError::PayloadTooLarge { .. } => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::TooManyRequests { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Message safe to show a client.
    pub fn client_message(&self) -> String {
        match self {
            ApiError::Internal(_) => GENERIC_ERROR.to_string(),
            other => other.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let ApiError::Internal(detail) = &self {
            tracing::error!(error = %detail, "Internal server error");
        } else {
            tracing::debug!(status = %status, error = %self, "Request rejected");
        }
        metrics::record_error(status.as_u16());

        let mut response = (
            status,
            Json(ErrorBody {
                msg: self.client_message(),
            }),
        )
            .into_response();

        if let ApiError::TooManyRequests { retry_after } = self {
            let secs = retry_after.as_secs().max(1);
            if let Ok(value) = HeaderValue::from_str(&secs.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }
        response
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::InvalidId(id) => ApiError::NotFound(format!("No item found with id : {id}")),
            StoreError::Duplicate { field } => ApiError::BadRequest(format!(
                "Duplicate value entered for {field} field, please choose another value"
            )),
            other => ApiError::Internal(other.to_string()),
        }
    }
}

/// Router fallback for paths no collaborator claims.
pub async fn not_found() -> ApiError {
    ApiError::RouteNotFound
}

/// Turns a handler panic into the generic 500 response.
pub fn handle_panic(payload: Box<dyn Any + Send + 'static>) -> Response<Body> {
    let detail = if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else {
        "unknown panic".to_string()
    };
    ApiError::Internal(format!("handler panicked: {detail}")).into_response()
}
