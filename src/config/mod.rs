//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! defaults (schema.rs)
//!     → optional TOML file (loader.rs)
//!     → environment overlay: MONGO_URL, PORT, JWT_SECRET, ... (loader.rs)
//!     → validation.rs (semantic checks)
//!     → AppConfig (validated, immutable)
//!     → shared via Arc to the pipeline and every collaborator
//! ```
//!
//! # Design Decisions
//! - Config is read once at startup and never mutated
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    AppConfig, AssetsConfig, CorsConfig, DatabaseConfig, ObservabilityConfig, RateLimitConfig,
    SecurityConfig, ServerConfig, UploadConfig,
};
pub use validation::ValidationError;
