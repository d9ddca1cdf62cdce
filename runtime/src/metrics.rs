//! Prometheus metrics for the mutation serializer and collection store.
//!
//! # Exported Metrics
//!
//! - `collection_gate_wait_duration_seconds{collection}` - time spent queued on a gate
//! - `collection_commits_total{collection}` - successful collection saves
//! - `collection_store_save_retries_total{collection}` - save attempts after the first
//! - `collection_store_save_failures_total{collection}` - saves that exhausted retries
//!
//! # Example
//!
//! ```rust,no_run
//! use arena_runtime::metrics::MetricsServer;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let mut server = MetricsServer::new("0.0.0.0:9090".parse()?);
//! server.start()?;
//!
//! // Serve `server.render()` on /metrics
//! # Ok(())
//! # }
//! ```

use metrics::{describe_counter, describe_histogram};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};
use std::net::SocketAddr;
use std::time::Duration;
use thiserror::Error;

pub use metrics::{counter, gauge, histogram};

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

/// Prometheus recorder plus the address its scrape endpoint is served on.
pub struct MetricsServer {
    addr: SocketAddr,
    handle: Option<PrometheusHandle>,
}

impl MetricsServer {
    /// Create a new metrics server for the given scrape address.
    #[must_use]
    pub const fn new(addr: SocketAddr) -> Self {
        Self { addr, handle: None }
    }

    /// Address the scrape endpoint should be bound to.
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Register metric descriptions and install the Prometheus recorder.
    ///
    /// # Errors
    ///
    /// Returns error if the exporter cannot be built or installed.
    ///
    /// # Note
    ///
    /// If a recorder is already installed (e.g. by another test), this logs a
    /// warning and leaves `handle()` empty.
    pub fn start(&mut self) -> Result<(), MetricsError> {
        register_metrics();

        let builder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                Matcher::Suffix("duration_seconds".to_string()),
                &[
                    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
                ],
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

    /// Render current metrics in Prometheus text format.
    ///
    /// Returns `None` if the recorder was not installed by this server.
    #[must_use]
    pub fn render(&self) -> Option<String> {
        self.handle.as_ref().map(PrometheusHandle::render)
    }
}

fn register_metrics() {
    describe_histogram!(
        "collection_gate_wait_duration_seconds",
        "Time a mutation waited in the queue for its collection gate"
    );
    describe_counter!(
        "collection_commits_total",
        "Total number of successful collection saves"
    );
    describe_counter!(
        "collection_store_save_retries_total",
        "Total number of collection save attempts after the first"
    );
    describe_counter!(
        "collection_store_save_failures_total",
        "Total number of collection saves that failed after every retry"
    );
}

/// Gate and store metrics recorder.
pub struct GateMetrics;

impl GateMetrics {
    /// Record how long a caller queued for a gate.
    pub fn record_wait(collection: &str, waited: Duration) {
        histogram!("collection_gate_wait_duration_seconds", "collection" => collection.to_string())
            .record(waited.as_secs_f64());
    }

    /// Record a successful save, including the retries it took.
    pub fn record_commit(collection: &str, attempts: usize) {
        counter!("collection_commits_total", "collection" => collection.to_string()).increment(1);
        if attempts > 1 {
            counter!("collection_store_save_retries_total", "collection" => collection.to_string())
                .increment((attempts - 1) as u64);
        }
    }

    /// Record a save that exhausted its retries.
    pub fn record_save_failure(collection: &str, attempts: usize) {
        counter!("collection_store_save_failures_total", "collection" => collection.to_string())
            .increment(1);
        counter!("collection_store_save_retries_total", "collection" => collection.to_string())
            .increment(attempts.saturating_sub(1) as u64);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn server_starts_without_handle() {
        let server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        assert!(server.handle().is_none());
        assert!(server.render().is_none());
    }

    #[test]
    fn gate_metrics_render_after_start() {
        let mut server = MetricsServer::new("127.0.0.1:0".parse().unwrap());
        server.start().unwrap();

        GateMetrics::record_wait("users", Duration::from_millis(3));
        GateMetrics::record_commit("users", 2);
        GateMetrics::record_save_failure("transactions", 4);

        // The recorder is process-global; another test may own it.
        if let Some(rendered) = server.render() {
            assert!(rendered.contains("collection_commits_total"));
            assert!(rendered.contains("collection_store_save_failures_total"));
        }
    }
}
