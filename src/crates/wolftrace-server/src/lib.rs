//! HTTP and WebSocket boundary for the wolftrace engine.
//!
//! A thin axum layer over `wolftrace-core`: report intake, case queries,
//! manual links, case metadata and alert publication over REST, plus the
//! caseboard and alert streams over WebSocket. All graph semantics live in
//! the engine; this crate only decodes requests and frames stream
//! messages.

pub mod api;
pub mod config;
pub mod state;

pub use api::routes::create_router;
pub use config::{ServerConfig, ServiceEndpoint, ServicesConfig};
pub use state::AppState;
