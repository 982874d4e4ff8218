//! HTTP request instruments.
//!
//! Provides the request duration and response size histograms and the
//! in-flight gauge recorded by the instrumentation middleware.

use crate::metrics::registry::{GaugeHandle, HistogramHandle, MetricsRegistry, RegistryError};
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::histogram::exponential_buckets;
use std::sync::Arc;
use std::time::Duration;

/// Subsystem prefix shared by all HTTP instruments.
pub const SUBSYSTEM: &str = "http";

/// Default request duration buckets, in seconds.
pub const DEFAULT_DURATION_BUCKETS: [f64; 14] = [
    0.005, 0.01, 0.025, 0.05, 0.075, 0.1, 0.25, 0.5, 0.75, 1.0, 2.5, 5.0, 7.5, 10.0,
];

/// Default response size buckets: 100 B, 1 kB, ... 1 GB.
pub fn default_size_buckets() -> Vec<f64> {
    exponential_buckets(100.0, 10.0, 8).collect()
}

/// Labels for the duration and size histograms.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct ResponseLabels {
    pub method: String,
    pub service: String,
    pub code: String,
    pub handler: String,
}

/// Labels for the in-flight gauge.
#[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
pub struct InflightLabels {
    pub method: String,
    pub service: String,
    pub handler: String,
}

/// The HTTP instrument set, bound to one service name.
#[derive(Clone, Debug)]
pub struct HttpMetrics {
    inner: Arc<HttpMetricsInner>,
}

#[derive(Debug)]
struct HttpMetricsInner {
    /// Value of the `service` label.
    service: String,
    /// Request duration histogram (in seconds).
    request_duration: HistogramHandle<ResponseLabels>,
    /// Response size histogram (in bytes).
    response_size: HistogramHandle<ResponseLabels>,
    /// Requests currently being handled.
    requests_inflight: GaugeHandle<InflightLabels>,
}

impl HttpMetrics {
    /// Register the HTTP instruments in `registry`.
    ///
    /// Fails if any of them is already registered there.
    pub fn register(
        registry: &mut MetricsRegistry,
        service: impl Into<String>,
        duration_buckets: &[f64],
        size_buckets: &[f64],
    ) -> Result<Self, RegistryError> {
        let request_duration = registry.register_histogram(
            SUBSYSTEM,
            "request_duration_seconds",
            "The latency of the HTTP requests",
            duration_buckets,
        )?;
        let response_size = registry.register_histogram(
            SUBSYSTEM,
            "response_size_bytes",
            "The size of the HTTP responses",
            size_buckets,
        )?;
        let requests_inflight = registry.register_gauge(
            SUBSYSTEM,
            "requests_inflight",
            "The number of inflight requests being handled at the same time",
        )?;

        Ok(Self {
            inner: Arc::new(HttpMetricsInner {
                service: service.into(),
                request_duration,
                response_size,
                requests_inflight,
            }),
        })
    }

    /// Register with the default bucket layouts.
    pub fn register_default(
        registry: &mut MetricsRegistry,
        service: impl Into<String>,
    ) -> Result<Self, RegistryError> {
        Self::register(
            registry,
            service,
            &DEFAULT_DURATION_BUCKETS,
            &default_size_buckets(),
        )
    }

    pub fn service(&self) -> &str {
        &self.inner.service
    }

    /// Mark a request as in flight.
    pub fn request_started(&self, method: &str, handler: &str) {
        self.inner
            .requests_inflight
            .increment(&self.inflight_labels(method, handler));
    }

    /// Record a finished request and release its in-flight slot.
    pub fn request_finished(
        &self,
        method: &str,
        handler: &str,
        status: u16,
        size: u64,
        duration: Duration,
    ) {
        let labels = ResponseLabels {
            method: method.to_string(),
            service: self.inner.service.clone(),
            code: status.to_string(),
            handler: handler.to_string(),
        };
        self.inner.response_size.observe(&labels, size as f64);
        self.inner
            .request_duration
            .observe(&labels, duration.as_secs_f64());
        self.inner
            .requests_inflight
            .decrement(&self.inflight_labels(method, handler));
    }

    /// Current in-flight count for a method and handler.
    #[cfg(test)]
    pub fn inflight(&self, method: &str, handler: &str) -> i64 {
        self.inner
            .requests_inflight
            .value(&self.inflight_labels(method, handler))
    }

    fn inflight_labels(&self, method: &str, handler: &str) -> InflightLabels {
        InflightLabels {
            method: method.to_string(),
            service: self.inner.service.clone(),
            handler: handler.to_string(),
        }
    }
}
