//! The ordered request pipeline.
//!
//! # Data Flow
//! ```text
//! request
//!     → rate limit → security headers → CORS
//!     → XSS sanitizer → injection sanitizer → body parser
//!     → cookie parser → static files → file upload
//!     → route dispatch / not-found fallback
//! ```
//!
//! # Design Decisions
//! - The order lives in one static list, [`PIPELINE`]
//! - Every stage either calls the next one or short-circuits with an
//!   [`ApiError`](crate::http::response::ApiError) or a finished response
//! - The sanitizers rewrite the raw JSON body before the body parser stores
//!   the parsed value
//! - Multipart text fields are only readable after the upload stage, which
//!   applies the same sanitizers before handing them to handlers

use std::path::PathBuf;
use std::sync::Arc;

use axum::{middleware, Router};
use axum_extra::extract::cookie::Key;
use tower_http::catch_panic::CatchPanicLayer;

use crate::config::AppConfig;
use crate::http::body::body_parser_middleware;
use crate::http::cookies::{cookie_middleware, signing_key};
use crate::http::response::handle_panic;
use crate::http::static_files::static_files_middleware;
use crate::http::upload::upload_middleware;
use crate::security::cors::build_cors_layer;
use crate::security::headers::security_headers_middleware;
use crate::security::rate_limit::{rate_limit_middleware, RateLimiter};
use crate::security::sanitize::{injection_middleware, xss_middleware};

/// One pipeline stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    RateLimit,
    SecurityHeaders,
    Cors,
    XssSanitizer,
    InjectionSanitizer,
    BodyParser,
    CookieParser,
    StaticFiles,
    FileUpload,
}

/// Stages in the order a request passes through them.
pub const PIPELINE: [Stage; 9] = [
    Stage::RateLimit,
    Stage::SecurityHeaders,
    Stage::Cors,
    Stage::XssSanitizer,
    Stage::InjectionSanitizer,
    Stage::BodyParser,
    Stage::CookieParser,
    Stage::StaticFiles,
    Stage::FileUpload,
];

/// Shared state the stages are built from.
#[derive(Clone)]
pub struct PipelineState {
    pub config: Arc<AppConfig>,
    pub limiter: Arc<RateLimiter>,
    pub cookie_key: Key,
    pub public_dir: Arc<PathBuf>,
}

impl PipelineState {
    pub fn new(config: Arc<AppConfig>) -> Self {
        let limiter = Arc::new(RateLimiter::new(
            &config.rate_limit,
            config.server.trust_proxy_hops,
        ));
        let cookie_key = signing_key(&config.security.cookie_secret);
        let public_dir = Arc::new(config.assets.public_dir.clone());
        Self {
            config,
            limiter,
            cookie_key,
            public_dir,
        }
    }
}

impl Stage {
    pub fn name(self) -> &'static str {
        match self {
            Stage::RateLimit => "rate_limit",
            Stage::SecurityHeaders => "security_headers",
            Stage::Cors => "cors",
            Stage::XssSanitizer => "xss_sanitizer",
            Stage::InjectionSanitizer => "injection_sanitizer",
            Stage::BodyParser => "body_parser",
            Stage::CookieParser => "cookie_parser",
            Stage::StaticFiles => "static_files",
            Stage::FileUpload => "file_upload",
        }
    }

    /// Wrap `router` in this stage.
    fn attach(self, router: Router, state: &PipelineState) -> Router {
        let body_limit = state.config.security.body_limit_bytes;
        match self {
            Stage::RateLimit if !state.config.rate_limit.enabled => {
                tracing::warn!("Rate limiting is disabled");
                router
            }
            Stage::RateLimit => router.layer(middleware::from_fn_with_state(
                state.limiter.clone(),
                rate_limit_middleware,
            )),
            Stage::SecurityHeaders => {
                router.layer(middleware::from_fn(security_headers_middleware))
            }
            Stage::Cors => router.layer(build_cors_layer(&state.config.cors)),
            Stage::XssSanitizer => {
                router.layer(middleware::from_fn_with_state(body_limit, xss_middleware))
            }
            Stage::InjectionSanitizer => router.layer(middleware::from_fn_with_state(
                body_limit,
                injection_middleware,
            )),
            Stage::BodyParser => router.layer(middleware::from_fn_with_state(
                body_limit,
                body_parser_middleware,
            )),
            Stage::CookieParser => router.layer(middleware::from_fn_with_state(
                state.cookie_key.clone(),
                cookie_middleware,
            )),
            Stage::StaticFiles => router.layer(middleware::from_fn_with_state(
                state.public_dir.clone(),
                static_files_middleware,
            )),
            Stage::FileUpload => router.layer(middleware::from_fn_with_state(
                state.config.uploads.max_bytes,
                upload_middleware,
            )),
        }
    }
}

/// Wrap `router` in every stage of [`PIPELINE`].
///
/// Layers added last run first, so the list is applied back to front.
///
/// Handler panics are caught inside the pipeline, so the 500 they turn
/// into still passes back through every stage.
pub fn assemble(router: Router, state: &PipelineState) -> Router {
    let router = router.layer(CatchPanicLayer::custom(handle_panic));
    PIPELINE
        .iter()
        .rev()
        .fold(router, |router, stage| stage.attach(router, state))
}
