//! Metrics registry, HTTP instruments and exposition.

mod http;
mod registry;
mod server;

pub use http::{
    default_size_buckets, HttpMetrics, InflightLabels, ResponseLabels, DEFAULT_DURATION_BUCKETS,
    SUBSYSTEM,
};
pub use registry::{
    BucketLayout, GaugeHandle, HistogramHandle, LabelSet, MetricsRegistry, RegistryError,
};
pub use server::{scrape_response, MetricsServer, CONTENT_TYPE_TEXT};
