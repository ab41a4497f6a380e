//! # Access Request Runtime
//!
//! Imperative shell around `access-request-core`.
//!
//! [`AccessRequestService`] is the only component that performs I/O. It composes the
//! authorization engine, the request number allocator, the lifecycle and asset
//! linking reducers and the audit ledger over an
//! [`AccessRequestStore`](access_request_core::store::AccessRequestStore).
//!
//! ## Core Components
//!
//! - **Service**: create, list, detail, transition, link and history operations
//! - **Numbering**: per-year request numbers with a bounded collision retry
//! - **Metrics**: Prometheus recorder and the service's counters/histograms
//!
//! ## Example
//!
//! ```ignore
//! use access_request_runtime::AccessRequestService;
//!
//! let service = AccessRequestService::new(store, Arc::new(SystemClock));
//!
//! let request = service.create_request(&principal, body).await?;
//! let request = service
//!     .transition_status(&manager, request.id, "approved", TransitionDetails::default())
//!     .await?;
//! ```

/// Service-level configuration
pub mod config;

/// Prometheus metrics for observability
pub mod metrics;

/// Request number allocation with collision retry
pub mod numbering;

/// Retry logic with jittered backoff
pub mod retry;

/// The orchestration facade
pub mod service;

pub use config::ServiceConfig;
pub use numbering::RequestNumberAllocator;
pub use service::AccessRequestService;
