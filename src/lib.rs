//! Transparent forward HTTP proxy.
//!
//! Each inbound request names its origin in an absolute-form target. The
//! proxy strips hop-by-hop headers, forwards the request, and streams the
//! origin's response back with the same treatment applied to its headers.

// Core pipeline
pub mod error;
pub mod http;
pub mod security;

// Cross-cutting concerns
pub mod config;
pub mod lifecycle;
pub mod observability;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use http::HttpServer;
pub use lifecycle::Shutdown;
