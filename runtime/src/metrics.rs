//! Prometheus metrics for the access request service.
//!
//! - Requests created, transitions per target status, assets linked
//! - Grant provisioning updates per system
//! - Authorization denials per action, errors per kind
//! - Numbering collisions
//! - Operation latency
//!
//! # Example
//!
//! ```rust,no_run
//! use access_request_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//! let exposition = server.render();
//! # Ok(())
//! # }
//! ```

use access_request_core::ErrorKind;
use access_request_core::grants::{GrantSystem, ProvisioningStatus};
use access_request_core::types::RequestStatus;
use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

// Re-export metrics macros for use in other modules
pub use metrics::{counter, histogram};

/// Errors from metrics operations.
#[derive(Error, Debug)]
pub enum MetricsError {
    /// Failed to build metrics exporter
    #[error("Failed to build metrics exporter: {0}")]
    Build(String),
    /// Failed to install metrics exporter
    #[error("Failed to install metrics exporter: {0}")]
    Install(String),
}

/// Prometheus recorder plus the address its exposition is served on.
///
/// The recorder is process-global; the HTTP side is mounted by the server binary
/// using [`MetricsServer::render`].
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a metrics server for `addr` (e.g. `0.0.0.0:9090`).
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the exposition should be served on.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Describe every metric and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns an error if the exporter cannot be built or installed. A recorder
    /// that is already installed (several servers in one test binary) is not an
    /// error; [`Self::handle`] then stays `None`.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5],
            )
            .map_err(|e| MetricsError::Build(e.to_string()))?;

        match builder.install_recorder() {
            Ok(handle) => {
                self.handle = Some(handle);
                tracing::info!(addr = %self.addr, "Metrics recorder installed");
                Ok(())
            }
            Err(e) => {
                let err_msg = e.to_string();
                if err_msg.contains("already initialized") {
                    tracing::warn!("Metrics recorder already initialized, skipping re-initialization");
                    Ok(())
                } else {
                    Err(MetricsError::Install(err_msg))
                }
            }
        }
    }

    /// Get the metrics handle for rendering.
    #[must_use]
    pub const fn handle(&self) -> Option<&PrometheusHandle> {
        self.handle.as_ref()
    }

    /// Current metrics in Prometheus text format, once started.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

/// Register all metric descriptions.
fn register_metrics() {
    describe_counter!("access_request.created", "Access requests created");
    describe_counter!(
        "access_request.transitions",
        "Committed status transitions, labelled by target status"
    );
    describe_counter!(
        "access_request.assets_linked",
        "Inventory assets linked to handover items"
    );
    describe_counter!(
        "access_request.grant_status_changes",
        "Sub-grant provisioning updates, labelled by system and status"
    );
    describe_counter!(
        "access_request.denied",
        "Authorization denials, labelled by action"
    );
    describe_counter!(
        "access_request.numbering_conflicts",
        "Request number collisions on insert"
    );
    describe_counter!(
        "access_request.errors",
        "Failed operations, labelled by error kind"
    );
    describe_histogram!(
        "access_request.operation.duration_seconds",
        "Facade operation latency, labelled by operation"
    );
}

/// Recorder for facade metrics.
pub struct ServiceMetrics;

impl ServiceMetrics {
    /// A request was created.
    pub fn record_created() {
        counter!("access_request.created").increment(1);
    }

    /// A transition to `to` committed.
    pub fn record_transition(to: RequestStatus) {
        counter!("access_request.transitions", "to" => to.as_str()).increment(1);
    }

    /// An asset was linked.
    pub fn record_asset_linked() {
        counter!("access_request.assets_linked").increment(1);
    }

    /// The `system` grant moved to `status`.
    pub fn record_grant_status(system: GrantSystem, status: ProvisioningStatus) {
        counter!(
            "access_request.grant_status_changes",
            "system" => system.as_str(),
            "status" => status.as_str()
        )
        .increment(1);
    }

    /// `action` was denied.
    pub fn record_denied(action: &'static str) {
        counter!("access_request.denied", "action" => action).increment(1);
    }

    /// An insert collided on the request number.
    pub fn record_numbering_conflict() {
        counter!("access_request.numbering_conflicts").increment(1);
    }

    /// An operation failed with `kind`.
    pub fn record_error(kind: ErrorKind) {
        counter!("access_request.errors", "kind" => kind.as_str()).increment(1);
    }

    /// `operation` took `duration`.
    pub fn record_duration(operation: &'static str, duration: Duration) {
        histogram!("access_request.operation.duration_seconds", "operation" => operation)
            .record(duration.as_secs_f64());
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn server_without_start_has_no_handle() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn started_server_renders_service_metrics() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        ServiceMetrics::record_created();
        ServiceMetrics::record_transition(RequestStatus::Approved);
        ServiceMetrics::record_error(ErrorKind::TerminalState);

        // another test may already own the global recorder
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("access_request_created"));
            assert!(rendered.contains("to=\"approved\""));
            assert!(rendered.contains("kind=\"terminal_state\""));
        }
    }
}
