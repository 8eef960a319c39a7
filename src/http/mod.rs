//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (axum setup, ambient layers)
//!     → pipeline.rs (ordered stages: security, sanitizers, parsers)
//!     → [routing layer picks the collaborator]
//!     → response.rs (errors become {"msg": ...} bodies)
//!     → Send to client
//! ```

pub mod body;
pub mod cookies;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod server;
pub mod static_files;
pub mod upload;

pub use body::JsonBody;
pub use cookies::Cookies;
pub use request::X_REQUEST_ID;
pub use response::ApiError;
pub use server::{AppContext, HttpServer};
pub use upload::{UploadedFile, UploadedFiles};
