//! Metric registry built on prometheus-client.
//!
//! Owns every instrument family and renders them in the Prometheus text
//! exposition format. Registration happens once at startup through `&mut self`;
//! afterwards the registry is shared read-only and instruments are updated
//! through their handles.

use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::EncodeLabelSet;
use prometheus_client::metrics::family::{Family, MetricConstructor};
use prometheus_client::metrics::gauge::Gauge;
use prometheus_client::metrics::histogram::Histogram;
use prometheus_client::registry::Registry;
use std::collections::HashSet;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

/// Errors raised by the metrics registry.
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("metric '{0}' is already registered")]
    Duplicate(String),

    #[error("failed to encode metrics: {0}")]
    Encode(#[from] std::fmt::Error),
}

/// Bound required of label sets used with the registry.
pub trait LabelSet: EncodeLabelSet + Clone + Debug + Hash + Eq + Send + Sync + 'static {}

impl<T> LabelSet for T where T: EncodeLabelSet + Clone + Debug + Hash + Eq + Send + Sync + 'static {}

/// Fixed bucket layout shared by every series of a histogram family.
#[derive(Clone, Debug)]
pub struct BucketLayout(Arc<[f64]>);

impl BucketLayout {
    pub fn new(bounds: &[f64]) -> Self {
        Self(Arc::from(bounds))
    }

    pub fn bounds(&self) -> &[f64] {
        &self.0
    }
}

impl MetricConstructor<Histogram> for BucketLayout {
    fn new_metric(&self) -> Histogram {
        Histogram::new(self.0.iter().copied())
    }
}

/// Handle to a registered histogram family.
#[derive(Clone, Debug)]
pub struct HistogramHandle<L: LabelSet> {
    family: Family<L, Histogram, BucketLayout>,
}

impl<L: LabelSet> HistogramHandle<L> {
    /// Record one observation for the given label combination.
    pub fn observe(&self, labels: &L, value: f64) {
        self.family.get_or_create(labels).observe(value);
    }
}

/// Handle to a registered gauge family.
#[derive(Clone, Debug)]
pub struct GaugeHandle<L: LabelSet> {
    family: Family<L, Gauge>,
}

impl<L: LabelSet> GaugeHandle<L> {
    pub fn increment(&self, labels: &L) {
        self.family.get_or_create(labels).inc();
    }

    pub fn decrement(&self, labels: &L) {
        self.family.get_or_create(labels).dec();
    }

    /// Current value for a label combination.
    ///
    /// Creates the series if absent, so it is only available to tests.
    #[cfg(test)]
    pub fn value(&self, labels: &L) -> i64 {
        self.family.get_or_create(labels).get()
    }
}

/// Process-wide set of metric families.
#[derive(Default)]
pub struct MetricsRegistry {
    registry: Registry,
    names: HashSet<String>,
}

impl MetricsRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a histogram family as `<subsystem>_<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the exposed name is taken.
    pub fn register_histogram<L: LabelSet>(
        &mut self,
        subsystem: &str,
        name: &str,
        help: &str,
        buckets: &[f64],
    ) -> Result<HistogramHandle<L>, RegistryError> {
        self.claim(subsystem, name, "histogram")?;

        let family =
            Family::<L, Histogram, BucketLayout>::new_with_constructor(BucketLayout::new(buckets));
        self.scope(subsystem).register(name, help, family.clone());

        Ok(HistogramHandle { family })
    }

    /// Register a gauge family as `<subsystem>_<name>`.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError::Duplicate`] if the exposed name is taken.
    pub fn register_gauge<L: LabelSet>(
        &mut self,
        subsystem: &str,
        name: &str,
        help: &str,
    ) -> Result<GaugeHandle<L>, RegistryError> {
        self.claim(subsystem, name, "gauge")?;

        let family = Family::<L, Gauge>::default();
        self.scope(subsystem).register(name, help, family.clone());

        Ok(GaugeHandle { family })
    }

    /// Encode the current state of every family.
    pub fn render(&self) -> Result<String, RegistryError> {
        let mut buffer = String::new();
        encode(&mut buffer, &self.registry)?;
        Ok(buffer)
    }

    /// Names of every registered family, as exposed.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    fn claim(&mut self, subsystem: &str, name: &str, kind: &str) -> Result<(), RegistryError> {
        let full_name = exposed_name(subsystem, name);
        if self.names.contains(&full_name) {
            return Err(RegistryError::Duplicate(full_name));
        }

        debug!(metric = %full_name, kind, "registered metric");
        self.names.insert(full_name);
        Ok(())
    }

    fn scope(&mut self, subsystem: &str) -> &mut Registry {
        if subsystem.is_empty() {
            &mut self.registry
        } else {
            self.registry.sub_registry_with_prefix(subsystem)
        }
    }
}

fn exposed_name(subsystem: &str, name: &str) -> String {
    if subsystem.is_empty() {
        name.to_string()
    } else {
        format!("{subsystem}_{name}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Debug, Hash, PartialEq, Eq, EncodeLabelSet)]
    struct PathLabels {
        method: String,
        path: String,
    }

    fn labels(method: &str, path: &str) -> PathLabels {
        PathLabels {
            method: method.to_string(),
            path: path.to_string(),
        }
    }

    #[test]
    fn test_duplicate_registration_rejected() {
        let mut registry = MetricsRegistry::new();
        registry
            .register_gauge::<PathLabels>("http", "requests_inflight", "inflight")
            .unwrap();

        let result = registry.register_histogram::<PathLabels>(
            "http",
            "requests_inflight",
            "again",
            &[0.1, 1.0],
        );
        assert!(matches!(result, Err(RegistryError::Duplicate(name)) if name == "http_requests_inflight"));
    }

    #[test]
    fn test_same_name_in_other_subsystem() {
        let mut registry = MetricsRegistry::new();
        registry
            .register_gauge::<PathLabels>("http", "open", "open http")
            .unwrap();
        registry
            .register_gauge::<PathLabels>("grpc", "open", "open grpc")
            .unwrap();

        let mut names: Vec<&str> = registry.names().collect();
        names.sort_unstable();
        assert_eq!(names, vec!["grpc_open", "http_open"]);
    }

    #[test]
    fn test_render_help_and_type() {
        let mut registry = MetricsRegistry::new();
        let gauge = registry
            .register_gauge::<PathLabels>("http", "requests_inflight", "Requests in flight")
            .unwrap();
        gauge.increment(&labels("GET", "/a"));

        let text = registry.render().unwrap();
        assert!(text.contains("# HELP http_requests_inflight Requests in flight"));
        assert!(text.contains("# TYPE http_requests_inflight gauge"));
        assert!(text.contains(r#"http_requests_inflight{method="GET",path="/a"} 1"#));
    }

    #[test]
    fn test_gauge_increment_decrement() {
        let mut registry = MetricsRegistry::new();
        let gauge = registry
            .register_gauge::<PathLabels>("", "busy", "busy")
            .unwrap();
        let get = labels("GET", "/a");
        let post = labels("POST", "/a");

        gauge.increment(&get);
        gauge.increment(&get);
        gauge.increment(&post);
        gauge.decrement(&get);

        assert_eq!(gauge.value(&get), 1);
        assert_eq!(gauge.value(&post), 1);
    }

    #[test]
    fn test_histogram_buckets_cumulative() {
        let mut registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram::<PathLabels>("http", "latency_seconds", "latency", &[0.1, 1.0])
            .unwrap();
        let l = labels("GET", "/a");
        histogram.observe(&l, 0.05);
        histogram.observe(&l, 0.5);
        histogram.observe(&l, 5.0);

        let text = registry.render().unwrap();
        assert!(text.contains("# TYPE http_latency_seconds histogram"));
        assert!(text.contains(r#"http_latency_seconds_bucket{le="0.1",method="GET",path="/a"} 1"#));
        assert!(text.contains(r#"http_latency_seconds_bucket{le="1.0",method="GET",path="/a"} 2"#));
        assert!(text.contains(r#"http_latency_seconds_bucket{le="+Inf",method="GET",path="/a"} 3"#));
        assert!(text.contains(r#"http_latency_seconds_count{method="GET",path="/a"} 3"#));
    }

    #[test]
    fn test_render_is_idempotent() {
        let mut registry = MetricsRegistry::new();
        let histogram = registry
            .register_histogram::<PathLabels>("http", "latency_seconds", "latency", &[0.1])
            .unwrap();
        histogram.observe(&labels("GET", "/a"), 0.01);
        histogram.observe(&labels("GET", "/b"), 0.2);

        assert_eq!(registry.render().unwrap(), registry.render().unwrap());
    }

    #[test]
    fn test_bucket_layout_bounds() {
        let layout = BucketLayout::new(&[1.0, 2.0]);
        assert_eq!(layout.bounds(), &[1.0, 2.0]);
    }
}
