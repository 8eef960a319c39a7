//! Startup orchestration.
//!
//! # Responsibilities
//! - Connect to the document store
//! - Bind the listener only once the store is reachable
//! - Serve until shutdown, then close the store
//! - Publish every state transition
//!
//! # Design Decisions
//! - Fail fast: a connection failure is fatal and never retried
//! - The port is never bound when the store is unreachable
//!
//! ```text
//! Unstarted → Connecting → Listening(addr) → Stopped
//!                   └────────────┴──→ Failed
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::{broadcast, watch};

use crate::config::AppConfig;
use crate::db::{Connector, DocumentStore, StoreError};
use crate::http::server::{AppContext, HttpServer};
use crate::routing::RouteError;

/// Observable server state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ServerState {
    Unstarted,
    Connecting,
    Listening(SocketAddr),
    Failed,
    Stopped,
}

#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    #[error("database connection failed: {0}")]
    Database(#[from] StoreError),

    #[error("invalid route table: {0}")]
    Routes(#[from] RouteError),

    #[error("failed to bind {address}: {source}")]
    Bind {
        address: String,
        #[source]
        source: std::io::Error,
    },

    #[error("server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Drives one server from connection to shutdown.
pub struct Startup<C> {
    config: Arc<AppConfig>,
    connector: C,
    state: watch::Sender<ServerState>,
}

impl<C: Connector> Startup<C> {
    pub fn new(config: Arc<AppConfig>, connector: C) -> Self {
        let (state, _) = watch::channel(ServerState::Unstarted);
        Self {
            config,
            connector,
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.state.subscribe()
    }

    pub fn state(&self) -> ServerState {
        *self.state.borrow()
    }

    fn set(&self, state: ServerState) {
        tracing::debug!(?state, "Server state changed");
        self.state.send_replace(state);
    }

    /// Record the failure and release the store if one was opened.
    async fn fail(
        &self,
        store: Option<&Arc<dyn DocumentStore>>,
        err: StartupError,
    ) -> Result<(), StartupError> {
        tracing::error!(error = %err, "Server failed to start");
        if let Some(store) = store {
            store.close().await;
        }
        self.set(ServerState::Failed);
        Err(err)
    }

    /// Connect, bind, serve until `shutdown` fires.
    pub async fn run(self, shutdown: broadcast::Receiver<()>) -> Result<(), StartupError> {
        self.set(ServerState::Connecting);
        tracing::info!(database = %self.config.database.name, "Connecting to database");

        let store = match self.connector.connect(&self.config.database).await {
            Ok(store) => store,
            Err(e) => return self.fail(None, e.into()).await,
        };
        tracing::info!("Database connected");

        let server = match HttpServer::new(AppContext::new(self.config.clone(), store.clone())) {
            Ok(server) => server,
            Err(e) => return self.fail(Some(&store), e.into()).await,
        };

        let address = self.config.server.bind_address();
        let listener = match TcpListener::bind(&address).await {
            Ok(listener) => listener,
            Err(source) => {
                return self
                    .fail(Some(&store), StartupError::Bind { address, source })
                    .await
            }
        };
        let local = match listener.local_addr() {
            Ok(local) => local,
            Err(e) => return self.fail(Some(&store), StartupError::Serve(e)).await,
        };

        self.set(ServerState::Listening(local));
        tracing::info!(address = %local, "Server is listening on port {}", local.port());

        let result = server.run(listener, shutdown).await;
        store.close().await;

        match result {
            Ok(()) => {
                self.set(ServerState::Stopped);
                tracing::info!("Shutdown complete");
                Ok(())
            }
            Err(e) => {
                tracing::error!(error = %e, "Server stopped with an error");
                self.set(ServerState::Failed);
                Err(StartupError::Serve(e))
            }
        }
    }
}
