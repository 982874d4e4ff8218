//! http-meter - an HTTP service instrumented with Prometheus metrics
//!
//! Usage:
//!     http-meter [--config <path>]
//!
//! See --help for more options.

use anyhow::{Context, Result};
use clap::Parser;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

use http_meter::config::{read_config, validate_config, Config};
use http_meter::metrics::{HttpMetrics, MetricsRegistry, MetricsServer};
use http_meter::server::{App, HttpServer};
use http_meter::util::{init_logging, wait_for_signal, ShutdownSignal};

/// An HTTP service instrumented with Prometheus request metrics.
#[derive(Parser, Debug)]
#[command(name = "http-meter")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override the listen address
    #[arg(long, value_name = "ADDR")]
    listen: Option<SocketAddr>,

    /// Override the service label
    #[arg(long, value_name = "NAME")]
    service_name: Option<String>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    /// Validate configuration and exit
    #[arg(long)]
    validate: bool,
}

impl Cli {
    fn apply_overrides(&self, config: &mut Config) {
        if let Some(listen) = self.listen {
            config.server.listen = listen;
        }
        if let Some(name) = &self.service_name {
            config.server.service_name = name.clone();
        }
        if let Some(level) = &self.log_level {
            config.global.log_level = level.clone();
        }
    }

    /// Build the effective configuration: file (or defaults), then flags, then validation.
    fn resolve_config(&self) -> Result<Config> {
        let mut config = match &self.config {
            Some(path) => read_config(path).with_context(|| {
                format!("failed to load configuration from '{}'", path.display())
            })?,
            None => Config::default(),
        };

        self.apply_overrides(&mut config);
        validate_config(&config)
            .map_err(anyhow::Error::msg)
            .context("invalid configuration")?;

        Ok(config)
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = cli.resolve_config()?;

    init_logging(&config.global.log_level, &config.global.log_format)
        .context("failed to initialize logging")?;

    if cli.validate {
        info!("Configuration is valid");
        println!("Configuration is valid.");
        println!("  Listen: {}", config.server.listen);
        println!("  Service: {}", config.server.service_name);
        println!("  Metrics path: {}", config.metrics.path);
        if let Some(address) = config.metrics.address {
            println!("  Metrics address: {}", address);
        }
        return Ok(());
    }

    info!(
        listen = %config.server.listen,
        service = %config.server.service_name,
        metrics_path = %config.metrics.path,
        "http-meter starting"
    );

    run(config)
}

/// Run the service with the given configuration.
fn run(config: Config) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;

    runtime.block_on(async { run_async(config).await })
}

/// Async entry point for the service.
async fn run_async(config: Config) -> Result<()> {
    let shutdown = ShutdownSignal::new();

    let mut registry = MetricsRegistry::new();
    let metrics = HttpMetrics::register(
        &mut registry,
        config.server.service_name.clone(),
        &config.metrics.duration_buckets,
        &config.metrics.size_buckets,
    )
    .context("failed to register HTTP metrics")?;
    let registry = Arc::new(registry);

    let mut handles = Vec::new();

    let app = App::new(Arc::clone(&registry), config.metrics.path.as_str());
    let server = HttpServer::bind(config.server.listen, app, metrics)
        .await
        .with_context(|| format!("failed to bind listener on {}", config.server.listen))?;
    let shutdown_rx = shutdown.subscribe();
    handles.push(tokio::spawn(server.run(shutdown_rx)));

    if let Some(address) = config.metrics.address {
        let metrics_server =
            MetricsServer::bind(address, config.metrics.path.as_str(), Arc::clone(&registry))
                .await
                .with_context(|| format!("failed to bind metrics listener on {}", address))?;
        let shutdown_rx = shutdown.subscribe();
        handles.push(tokio::spawn(metrics_server.run(shutdown_rx)));
    }

    info!("http-meter is running");
    info!("press Ctrl+C to stop");

    wait_for_signal().await;
    shutdown.shutdown();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "listener task failed");
        }
    }

    info!("http-meter shut down complete");
    Ok(())
}
