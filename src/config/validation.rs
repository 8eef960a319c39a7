//! Configuration validation.
//!
//! Semantic checks that serde cannot express. Every problem is reported,
//! not just the first one.

use std::net::SocketAddr;

use axum::http::{HeaderValue, Method};

use crate::config::schema::AppConfig;

/// A single semantic problem with the configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("MONGO_URL / database.url is required")]
    MissingDatabaseUrl,

    #[error("rate_limit.window_secs must be greater than zero")]
    EmptyRateLimitWindow,

    #[error("rate_limit.max_requests must be greater than zero")]
    ZeroRateLimit,

    #[error("security.body_limit_bytes must be greater than zero")]
    ZeroBodyLimit,

    #[error("invalid CORS origin: {0}")]
    InvalidCorsOrigin(String),

    #[error("invalid CORS method: {0}")]
    InvalidCorsMethod(String),

    #[error("cors.allow_credentials cannot be combined with a wildcard origin")]
    CredentialsWithWildcard,

    #[error("invalid metrics address: {0}")]
    InvalidMetricsAddress(String),
}

/// Validate a fully merged configuration.
pub fn validate_config(config: &AppConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.database.url.trim().is_empty() {
        errors.push(ValidationError::MissingDatabaseUrl);
    }

    if config.rate_limit.window_secs == 0 {
        errors.push(ValidationError::EmptyRateLimitWindow);
    }
    if config.rate_limit.max_requests == 0 {
        errors.push(ValidationError::ZeroRateLimit);
    }

    if config.security.body_limit_bytes == 0 {
        errors.push(ValidationError::ZeroBodyLimit);
    }

    for origin in &config.cors.allowed_origins {
        if origin != "*" && HeaderValue::from_str(origin).is_err() {
            errors.push(ValidationError::InvalidCorsOrigin(origin.clone()));
        }
    }
    for method in &config.cors.allowed_methods {
        if method.parse::<Method>().is_err() {
            errors.push(ValidationError::InvalidCorsMethod(method.clone()));
        }
    }
    if config.cors.allow_credentials && config.cors.allows_any_origin() {
        errors.push(ValidationError::CredentialsWithWildcard);
    }

    if let Some(addr) = &config.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::InvalidMetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
