//! Prometheus scrape endpoint.
//!
//! [`scrape_response`] is mounted on the application router; [`MetricsServer`]
//! optionally serves the same payload on a dedicated address.

use crate::metrics::MetricsRegistry;
use crate::server::response::{text_response, Body};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use tracing::{debug, error, info};

/// Content type of the text exposition format.
pub const CONTENT_TYPE_TEXT: &str = "text/plain; version=0.0.4; charset=utf-8";

/// Render the registry as a scrape response.
pub fn scrape_response(registry: &MetricsRegistry) -> Result<Response<Body>, hyper::http::Error> {
    match registry.render() {
        Ok(text) => text_response(StatusCode::OK, CONTENT_TYPE_TEXT, text),
        Err(e) => {
            error!(error = %e, "failed to encode metrics");
            text_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "text/plain",
                "Failed to encode metrics\n",
            )
        }
    }
}

/// Dedicated listener serving only the scrape endpoint.
pub struct MetricsServer {
    /// Bound listener.
    listener: TcpListener,
    /// Path for metrics endpoint.
    path: Arc<str>,
    /// Registry to render.
    registry: Arc<MetricsRegistry>,
}

impl MetricsServer {
    /// Bind the metrics listener.
    pub async fn bind(
        address: SocketAddr,
        path: impl Into<Arc<str>>,
        registry: Arc<MetricsRegistry>,
    ) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self {
            listener,
            path: path.into(),
            registry,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Run the metrics server until shutdown.
    pub async fn run(self, mut shutdown: broadcast::Receiver<()>) {
        info!(
            address = ?self.listener.local_addr().ok(),
            path = %self.path,
            "metrics server started"
        );

        loop {
            tokio::select! {
                accept_result = self.listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let registry = Arc::clone(&self.registry);
                            let path = Arc::clone(&self.path);

                            tokio::spawn(async move {
                                let io = TokioIo::new(stream);
                                let service = service_fn(move |req: Request<Incoming>| {
                                    let registry = Arc::clone(&registry);
                                    let path = Arc::clone(&path);
                                    async move { handle_request(req, &registry, &path) }
                                });

                                if let Err(e) = http1::Builder::new()
                                    .serve_connection(io, service)
                                    .await
                                {
                                    debug!(error = %e, "metrics connection error");
                                }
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "failed to accept metrics connection");
                        }
                    }
                }

                _ = shutdown.recv() => {
                    info!("metrics server shutting down");
                    break;
                }
            }
        }
    }
}

/// Handle an incoming request on the dedicated listener.
fn handle_request<B>(
    req: Request<B>,
    registry: &MetricsRegistry,
    metrics_path: &str,
) -> Result<Response<Body>, hyper::http::Error> {
    let path = req.uri().path();
    debug!(path = %path, method = %req.method(), "metrics request");

    if req.method() != Method::GET {
        return text_response(
            StatusCode::METHOD_NOT_ALLOWED,
            "text/plain",
            "Method not allowed\n",
        );
    }

    if path == metrics_path {
        scrape_response(registry)
    } else if path == "/health" {
        text_response(StatusCode::OK, "text/plain", "OK\n")
    } else {
        text_response(StatusCode::NOT_FOUND, "text/plain", "Not found\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::HttpMetrics;
    use bytes::Bytes;
    use http_body_util::{BodyExt, Empty};
    use std::time::Duration;

    fn request(method: Method, path: &str) -> Request<Empty<Bytes>> {
        Request::builder()
            .method(method)
            .uri(path)
            .body(Empty::new())
            .unwrap()
    }

    #[tokio::test]
    async fn test_scrape_response() {
        let mut registry = MetricsRegistry::new();
        let metrics = HttpMetrics::register_default(&mut registry, "svc").unwrap();
        metrics.request_started("GET", "/a");
        metrics.request_finished("GET", "/a", 200, 3, Duration::from_millis(1));

        let resp = scrape_response(&registry).unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(resp.headers()["content-type"], CONTENT_TYPE_TEXT);

        let body = resp.into_body().collect().await.unwrap().to_bytes();
        let text = String::from_utf8(body.to_vec()).unwrap();
        assert_eq!(text, registry.render().unwrap());
        assert!(text.contains("http_request_duration_seconds"));
    }

    #[test]
    fn test_dedicated_routes() {
        let registry = MetricsRegistry::new();

        let resp = handle_request(request(Method::GET, "/metrics"), &registry, "/metrics").unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = handle_request(request(Method::GET, "/health"), &registry, "/metrics").unwrap();
        assert_eq!(resp.status(), StatusCode::OK);

        let resp = handle_request(request(Method::GET, "/other"), &registry, "/metrics").unwrap();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = handle_request(request(Method::POST, "/metrics"), &registry, "/metrics").unwrap();
        assert_eq!(resp.status(), StatusCode::METHOD_NOT_ALLOWED);
    }

    #[tokio::test]
    async fn test_metrics_server_bind() {
        let registry = Arc::new(MetricsRegistry::new());
        let server = MetricsServer::bind("127.0.0.1:0".parse().unwrap(), "/metrics", registry)
            .await
            .unwrap();
        assert_ne!(server.local_addr().unwrap().port(), 0);
    }
}
