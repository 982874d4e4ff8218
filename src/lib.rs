//! http-meter - Prometheus request instrumentation for hyper services
//!
//! This crate provides:
//! - A metrics registry exposing histograms and gauges in the text exposition format
//! - A middleware recording request latency, response size and in-flight requests
//! - An HTTP server hosting the instrumented application and its scrape endpoint

pub mod config;
pub mod metrics;
pub mod middleware;
pub mod server;
pub mod util;

pub use config::Config;
pub use metrics::{HttpMetrics, MetricsRegistry};
pub use middleware::Instrumented;
