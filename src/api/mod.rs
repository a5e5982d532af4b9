//! HTTP API.
//!
//! Exposes the orchestrator as JSON endpoints for the booking client.
//! Routes are nested under `/api/` with an audit-logging middleware;
//! `api_router()` returns a composable `Router` that can be mounted on
//! any axum server instance.

pub mod endpoints;
pub mod error;
pub mod middleware;
pub mod router;
pub mod types;

pub use router::api_router;
pub use types::ApiContext;
