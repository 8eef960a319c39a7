//! storefront-api
//!
//! E-commerce REST API: auth, users, products, reviews and orders behind one
//! request pipeline, backed by MongoDB.
//!
//! ```text
//!     Client Request
//!     ──────────────▶ panic capture → request id → trace → metrics
//!                       → rate limit → headers → CORS → sanitizers
//!                       → body / cookie / static / upload parsers
//!                       → /api/v1/{auth,users,products,reviews,orders}
//!                       → not-found fallback
//!     Client Response ◀──────────────────────────── {"msg": ...} on error
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;

use storefront_api::config::load_config;
use storefront_api::db::MongoConnector;
use storefront_api::lifecycle::{signals, Shutdown, Startup};
use storefront_api::observability::{logging, metrics};

#[derive(Debug, Parser)]
#[command(name = "storefront-api", version, about = "E-commerce REST API server")]
struct Cli {
    /// Optional TOML configuration file.
    #[arg(long, env = "APP_CONFIG")]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("storefront-api: {e}");
            return ExitCode::FAILURE;
        }
    };

    logging::init(&config.observability.log_level);
    tracing::info!("storefront-api v{} starting", env!("CARGO_PKG_VERSION"));

    if config.security.cookie_secret.is_empty() {
        tracing::warn!("JWT_SECRET is not set; signed cookies use an empty secret");
    }

    tracing::info!(
        bind_address = %config.server.bind_address(),
        database = %config.database.name,
        public_dir = %config.assets.public_dir.display(),
        rate_limit = config.rate_limit.max_requests,
        "Configuration loaded"
    );

    if let Some(address) = &config.observability.metrics_address {
        match address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(e) => tracing::error!(metrics_address = %address, error = %e, "Failed to parse metrics address"),
        }
    }

    let shutdown = Arc::new(Shutdown::new());
    let signal_task = signals::spawn_signal_handler(shutdown.clone());

    let startup = Startup::new(Arc::new(config), MongoConnector);
    let result = startup.run(shutdown.subscribe()).await;
    signal_task.abort();

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "Exiting after fatal error");
            ExitCode::FAILURE
        }
    }
}
