//! storefront-api library

pub mod config;
pub mod db;
pub mod http;
pub mod lifecycle;
pub mod observability;
pub mod resources;
pub mod routing;
pub mod security;

pub use config::AppConfig;
pub use http::{AppContext, HttpServer};
pub use lifecycle::{ServerState, Shutdown, Startup};
