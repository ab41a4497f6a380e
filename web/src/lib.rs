//! HTTP surface for the access request service.
//!
//! Thin imperative shell over [`AccessRequestService`](access_request_runtime::AccessRequestService):
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │            HTTP shell (Axum)            │  ← JSON, principal headers
//! │  - extract principal and input          │  ← correlation ids, tracing
//! │  - map AccessError to status + body     │
//! ├─────────────────────────────────────────┤
//! │     AccessRequestService (runtime)      │  ← authorize, validate, store
//! ├─────────────────────────────────────────┤
//! │          Functional core (core)         │  ← reducers, rules, no I/O
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```ignore
//! use access_request_web::{AppState, build_router};
//!
//! let service = AccessRequestService::new(store, Arc::new(SystemClock));
//! let app = build_router(AppState::new(service));
//! axum::serve(listener, app).await?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod config;
pub mod error;
pub mod extractors;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

pub use config::Config;
pub use error::AppError;
pub use extractors::AuthenticatedPrincipal;
pub use middleware::{CORRELATION_ID_HEADER, correlation_id_layer};
pub use routes::build_router;
pub use state::AppState;

/// Result type alias for web handlers.
pub type WebResult<T> = Result<T, AppError>;
