//! HTTP server setup.
//!
//! # Responsibilities
//! - Compose the collaborator route group with the not-found fallback
//! - Wrap it in the request pipeline and the ambient layers
//!   (panic capture, request id, tracing, metrics, upload body limit)
//! - Drop the trailing slash of mounted paths before dispatch
//! - Serve on a bound listener until shutdown is signalled
//! - Run the rate limiter sweep in the background

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    body::Body,
    extract::{DefaultBodyLimit, State},
    http::{Request, Uri},
    middleware::{self, Next},
    response::Response,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::AppConfig;
use crate::db::DocumentStore;
use crate::http::pipeline::{self, PipelineState};
use crate::http::request::X_REQUEST_ID;
use crate::http::response::{handle_panic, not_found};
use crate::observability::metrics;
use crate::resources;
use crate::routing::{RouteError, RouteTable};
use crate::security::rate_limit::RateLimiter;

const MIN_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Shared handles injected into every collaborator.
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn DocumentStore>,
}

impl AppContext {
    pub fn new(config: Arc<AppConfig>, store: Arc<dyn DocumentStore>) -> Self {
        Self { config, store }
    }
}

/// HTTP server for the storefront API.
pub struct HttpServer {
    router: Router,
    limiter: Arc<RateLimiter>,
}

impl HttpServer {
    /// Build the fully layered router for `context`.
    pub fn new(context: AppContext) -> Result<Self, RouteError> {
        let config = context.config.clone();
        let group = resources::router_group(&context)?;
        let routes = Arc::new(group.table());

        let pipeline = PipelineState::new(config.clone());
        let limiter = pipeline.limiter.clone();

        let router = group.into_router().fallback(not_found);
        let router = pipeline::assemble(router, &pipeline);
        let router = Self::with_ambient_layers(router, &config, routes.clone());

        // Layers on a router run after dispatch; rewriting the path needs an outer one.
        let router = Router::new()
            .fallback_service(router)
            .layer(middleware::map_request_with_state(routes, trim_trailing_slash));

        Ok(Self { router, limiter })
    }

    /// Ambient layers, shared by every request regardless of outcome.
    ///
    /// The panic layer here only sees panics raised by pipeline stages.
    fn with_ambient_layers(router: Router, config: &AppConfig, routes: Arc<RouteTable>) -> Router {
        router
            .layer(DefaultBodyLimit::max(config.uploads.max_bytes))
            .layer(middleware::from_fn_with_state(routes, track_metrics))
            .layer(PropagateRequestIdLayer::new(X_REQUEST_ID))
            .layer(TraceLayer::new_for_http())
            .layer(SetRequestIdLayer::new(X_REQUEST_ID, MakeRequestUuid))
            .layer(CatchPanicLayer::custom(handle_panic))
    }

    /// The assembled router, for driving requests without a socket.
    pub fn router(&self) -> Router {
        self.router.clone()
    }

    pub fn into_router(self) -> Router {
        self.router
    }

    /// Serve on `listener` until `shutdown` fires, then drain in-flight requests.
    pub async fn run(
        self,
        listener: TcpListener,
        mut shutdown: broadcast::Receiver<()>,
    ) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        let sweeper = spawn_sweeper(self.limiter.clone(), shutdown.resubscribe());

        let app = self
            .router
            .into_make_service_with_connect_info::<SocketAddr>();

        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown.recv().await;
                tracing::info!("Shutdown signal received, draining connections");
            })
            .await;

        sweeper.abort();
        result?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }
}

/// Periodically forget clients whose window has expired.
fn spawn_sweeper(limiter: Arc<RateLimiter>, mut shutdown: broadcast::Receiver<()>) -> JoinHandle<()> {
    let period = limiter.window().max(MIN_SWEEP_INTERVAL);
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.tick().await;
        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    limiter.sweep(Instant::now());
                    tracing::debug!(clients = limiter.tracked_clients(), "Rate limiter swept");
                }
                _ = shutdown.recv() => break,
            }
        }
    })
}

/// Record count and latency per mount prefix.
async fn track_metrics(
    State(routes): State<Arc<RouteTable>>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let route = routes
        .resolve(request.uri().path())
        .unwrap_or("unmatched")
        .to_string();

    let response = next.run(request).await;
    metrics::record_request(&method, response.status().as_u16(), &route, start);
    response
}

/// Serve `/api/v1/products/` like `/api/v1/products`.
async fn trim_trailing_slash(
    State(routes): State<Arc<RouteTable>>,
    mut request: Request<Body>,
) -> Request<Body> {
    let Some(path) = routes.trim_trailing_slash(request.uri().path()) else {
        return request;
    };
    let path_and_query = match request.uri().query() {
        Some(query) => format!("{path}?{query}"),
        None => path.to_string(),
    };

    let mut parts = request.uri().clone().into_parts();
    if let Ok(path_and_query) = path_and_query.parse() {
        parts.path_and_query = Some(path_and_query);
        if let Ok(uri) = Uri::from_parts(parts) {
            *request.uri_mut() = uri;
        }
    }
    request
}
