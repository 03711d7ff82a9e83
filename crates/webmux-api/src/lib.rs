//! Axum HTTP producer for remux jobs.
//!
//! This crate provides:
//! - Job creation, status lookup and one-shot output download
//! - Liveness and readiness probes
//! - Request id, logging, CORS and Prometheus metrics middleware

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult};
pub use routes::create_router;
pub use state::AppState;
