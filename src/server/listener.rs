//! HTTP listener for the instrumented application.
//!
//! Accepts connections and serves each one through [`Instrumented`], so every
//! request except the scrape path is recorded.

use crate::metrics::HttpMetrics;
use crate::middleware::Instrumented;
use crate::server::router::App;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::time::Instant;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;
use tracing::{debug, error, info, instrument, warn};

/// Listener serving the application with request instrumentation.
pub struct HttpServer {
    /// TCP listener.
    listener: TcpListener,
    /// Application router.
    app: App,
    /// HTTP instruments.
    metrics: HttpMetrics,
}

impl HttpServer {
    /// Bind the listener.
    pub async fn bind(address: SocketAddr, app: App, metrics: HttpMetrics) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;

        info!(
            listen = %address,
            service = %metrics.service(),
            scrape_path = %app.scrape_path(),
            "http listener bound"
        );

        Ok(Self {
            listener,
            app,
            metrics,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the listener, accepting connections until shutdown.
    #[instrument(skip_all, fields(service = %self.metrics.service()))]
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!("http listener starting");

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, addr)) => {
                            self.handle_connection(stream, addr);
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("http listener shutting down");
                    break;
                }
            }
        }
    }

    /// Serve one connection on its own task.
    fn handle_connection(&self, stream: TcpStream, client_addr: SocketAddr) {
        if let Err(e) = stream.set_nodelay(true) {
            warn!(error = %e, "failed to set TCP_NODELAY on client connection");
        }

        let app = self.app.clone();
        let service = Instrumented::new(
            service_fn(move |req: Request<Incoming>| {
                let app = app.clone();
                async move { app.handle(req).await }
            }),
            self.metrics.clone(),
            self.app.scrape_path(),
        );

        tokio::spawn(async move {
            let start_time = Instant::now();
            let io = TokioIo::new(stream);

            let result = http1::Builder::new()
                .keep_alive(true)
                .serve_connection(io, service)
                .await;

            let duration = start_time.elapsed();
            if let Err(e) = result {
                warn!(
                    client = %client_addr,
                    duration_ms = duration.as_millis(),
                    error = %e,
                    "connection handling failed"
                );
            } else {
                debug!(
                    client = %client_addr,
                    duration_ms = duration.as_millis(),
                    "connection completed"
                );
            }
        });
    }
}
