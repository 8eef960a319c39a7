//! Database connector subsystem.
//!
//! # Data Flow
//! ```text
//! Startup:
//!     DatabaseConfig → Connector::connect → ping
//!     → Arc<dyn DocumentStore> (single shared handle)
//!     → injected into every route collaborator via AppContext
//!
//! Shutdown:
//!     server drained → DocumentStore::close
//! ```

pub mod mongo;
pub mod store;

pub use mongo::{MongoConnector, MongoStore};
pub use store::{Connector, DocumentStore, StoreError};
