//! Request instrumentation middleware.
//!
//! [`Instrumented`] wraps a hyper service and records, for every request
//! except those hitting the scrape path:
//! - the in-flight gauge while the request is being handled
//! - the request duration histogram
//! - the response size histogram, taken from `content-length`
//!
//! Handler errors and panics are turned into a JSON `500` response here, so
//! the accounting above always sees a status code.

use crate::metrics::HttpMetrics;
use crate::server::response::{json_response, Body};
use futures::FutureExt;
use hyper::header::CONTENT_LENGTH;
use hyper::service::Service;
use hyper::{HeaderMap, Request, Response, StatusCode};
use serde_json::json;
use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, warn};

/// Status label recorded when the response future is dropped before completion.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Boxed response future returned by [`Instrumented`].
pub type InstrumentedFuture<E> = Pin<Box<dyn Future<Output = Result<Response<Body>, E>> + Send>>;

/// Service wrapper recording HTTP metrics around an inner service.
#[derive(Clone, Debug)]
pub struct Instrumented<S> {
    inner: S,
    metrics: HttpMetrics,
    scrape_path: Arc<str>,
}

impl<S> Instrumented<S> {
    pub fn new(inner: S, metrics: HttpMetrics, scrape_path: impl Into<Arc<str>>) -> Self {
        Self {
            inner,
            metrics,
            scrape_path: scrape_path.into(),
        }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

impl<S, B> Service<Request<B>> for Instrumented<S>
where
    S: Service<Request<B>, Response = Response<Body>>,
    S::Future: Send + 'static,
    S::Error: fmt::Display + Send + 'static,
{
    type Response = Response<Body>;
    type Error = S::Error;
    type Future = InstrumentedFuture<S::Error>;

    fn call(&self, req: Request<B>) -> Self::Future {
        if req.uri().path() == &*self.scrape_path {
            return Box::pin(self.inner.call(req));
        }

        let guard = InflightGuard::enter(
            self.metrics.clone(),
            req.method().as_str(),
            req.uri().path(),
        );
        let delegated = panic::catch_unwind(AssertUnwindSafe(|| self.inner.call(req)));

        Box::pin(async move {
            let outcome = match delegated {
                Ok(fut) => match AssertUnwindSafe(fut).catch_unwind().await {
                    Ok(Ok(response)) => Ok(response),
                    Ok(Err(err)) => Err(Fault::Handler(err.to_string())),
                    Err(payload) => Err(Fault::Panic(panic_message(payload.as_ref()))),
                },
                Err(payload) => Err(Fault::Panic(panic_message(payload.as_ref()))),
            };

            let response = match outcome {
                Ok(response) => response,
                Err(fault) => {
                    fault.log(&guard);
                    fault_response(fault.detail())
                }
            };

            guard.complete(response.status(), response_size(response.headers()));
            Ok(response)
        })
    }
}

/// A failure of the wrapped handler.
enum Fault {
    Handler(String),
    Panic(String),
}

impl Fault {
    fn detail(&self) -> &str {
        match self {
            Fault::Handler(detail) | Fault::Panic(detail) => detail,
        }
    }

    fn log(&self, guard: &InflightGuard) {
        match self {
            Fault::Handler(detail) => warn!(
                method = %guard.method,
                path = %guard.handler,
                error = %detail,
                "handler failed"
            ),
            Fault::Panic(detail) => error!(
                method = %guard.method,
                path = %guard.handler,
                panic = %detail,
                "handler panicked"
            ),
        }
    }
}

/// Build the `500` response returned in place of a failed handler.
pub fn fault_response(detail: &str) -> Response<Body> {
    json_response(
        StatusCode::INTERNAL_SERVER_ERROR,
        &json!({ "detail": detail }),
    )
}

/// Response size as announced by `content-length`, or 0.
pub fn response_size(headers: &HeaderMap) -> u64 {
    headers
        .get(CONTENT_LENGTH)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(0)
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "internal server error".to_string()
    }
}

/// Holds one in-flight slot; records the request when dropped.
struct InflightGuard {
    metrics: HttpMetrics,
    method: String,
    handler: String,
    start: Instant,
    outcome: Option<(StatusCode, u64)>,
}

impl InflightGuard {
    fn enter(metrics: HttpMetrics, method: &str, handler: &str) -> Self {
        metrics.request_started(method, handler);
        Self {
            metrics,
            method: method.to_string(),
            handler: handler.to_string(),
            start: Instant::now(),
            outcome: None,
        }
    }

    fn complete(mut self, status: StatusCode, size: u64) {
        self.outcome = Some((status, size));
    }
}

impl Drop for InflightGuard {
    fn drop(&mut self) {
        let duration = self.start.elapsed();
        let (status, size) = match self.outcome {
            Some((status, size)) => (status.as_u16(), size),
            None => {
                debug!(
                    method = %self.method,
                    path = %self.handler,
                    "request cancelled before a response was produced"
                );
                (CLIENT_CLOSED_REQUEST, 0)
            }
        };

        self.metrics
            .request_finished(&self.method, &self.handler, status, size, duration);

        debug!(
            method = %self.method,
            path = %self.handler,
            status,
            size,
            duration_ms = duration.as_millis(),
            "request recorded"
        );
    }
}
