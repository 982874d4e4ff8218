//! Application routes.

use crate::metrics::{scrape_response, MetricsRegistry};
use crate::server::response::{json_response, Body, HandlerError};
use hyper::header::{HeaderValue, ALLOW};
use hyper::{Method, Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;

/// Path of the example endpoint.
pub const EXAMPLE_PATH: &str = "/example";

/// Request router for the application.
#[derive(Clone)]
pub struct App {
    registry: Arc<MetricsRegistry>,
    scrape_path: Arc<str>,
}

impl App {
    pub fn new(registry: Arc<MetricsRegistry>, scrape_path: impl Into<Arc<str>>) -> Self {
        Self {
            registry,
            scrape_path: scrape_path.into(),
        }
    }

    pub fn scrape_path(&self) -> &str {
        &self.scrape_path
    }

    /// Dispatch a request to its handler.
    pub async fn handle<B>(&self, req: Request<B>) -> Result<Response<Body>, HandlerError> {
        let path = req.uri().path();
        let known = path == EXAMPLE_PATH || path == &*self.scrape_path;

        match *req.method() {
            Method::GET if path == &*self.scrape_path => Ok(scrape_response(&self.registry)?),
            Method::GET if path == EXAMPLE_PATH => Ok(example()),
            _ if known => Ok(method_not_allowed()),
            _ => Ok(json_response(
                StatusCode::NOT_FOUND,
                &json!({ "detail": "Not Found" }),
            )),
        }
    }
}

fn example() -> Response<Body> {
    json_response(
        StatusCode::OK,
        &json!({ "message": "This is an example endpoint" }),
    )
}

fn method_not_allowed() -> Response<Body> {
    let mut response = json_response(
        StatusCode::METHOD_NOT_ALLOWED,
        &json!({ "detail": "Method Not Allowed" }),
    );
    response
        .headers_mut()
        .insert(ALLOW, HeaderValue::from_static("GET"));
    response
}
