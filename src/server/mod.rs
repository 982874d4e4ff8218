//! Host HTTP server: listener, routes and response helpers.

mod listener;
pub mod response;
mod router;

pub use listener::HttpServer;
pub use response::{Body, HandlerError};
pub use router::{App, EXAMPLE_PATH};
