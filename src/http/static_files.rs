//! Static asset serving from the public directory.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{Method, Request},
    middleware::Next,
    response::Response,
};
use tower::ServiceExt;
use tower_http::services::ServeDir;

/// Pipeline stage: answer GET/HEAD requests for files under `root`.
///
/// Anything that is not an existing file (or a directory with an
/// `index.html`) continues to route dispatch untouched.
pub async fn static_files_middleware(
    State(root): State<Arc<PathBuf>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() != Method::GET && request.method() != Method::HEAD {
        return next.run(request).await;
    }

    let serve = ServeDir::new(root.as_path())
        .append_index_html_on_directories(true)
        .fallback(next);

    match serve.oneshot(request).await {
        Ok(response) => response.map(Body::new),
        Err(never) => match never {},
    }
}
