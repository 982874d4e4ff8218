//! Response body type and builders shared by the routers and the middleware.

use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::header::{HeaderValue, CONTENT_LENGTH, CONTENT_TYPE};
use hyper::{Response, StatusCode};
use serde_json::Value;
use thiserror::Error;

/// Body type produced by every handler.
pub type Body = BoxBody<Bytes, hyper::Error>;

/// Error returned by a request handler.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("{0}")]
    Message(String),

    #[error("failed to build response: {0}")]
    Http(#[from] hyper::http::Error),
}

impl HandlerError {
    pub fn msg(message: impl Into<String>) -> Self {
        Self::Message(message.into())
    }
}

/// Wrap a complete chunk as a [`Body`].
pub fn full(chunk: impl Into<Bytes>) -> Body {
    Full::new(chunk.into())
        .map_err(|never| match never {})
        .boxed()
}

/// Build a JSON response with explicit content type and length.
pub fn json_response(status: StatusCode, value: &Value) -> Response<Body> {
    let payload = Bytes::from(value.to_string());
    let length = payload.len();

    let mut response = Response::new(full(payload));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    headers.insert(CONTENT_LENGTH, HeaderValue::from(length));
    response
}

/// Build a plain-text response.
pub fn text_response(
    status: StatusCode,
    content_type: &'static str,
    text: impl Into<Bytes>,
) -> Result<Response<Body>, hyper::http::Error> {
    let text = text.into();
    Response::builder()
        .status(status)
        .header(CONTENT_TYPE, content_type)
        .header(CONTENT_LENGTH, text.len())
        .body(full(text))
}
