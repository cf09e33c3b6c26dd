//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request (absolute-form target)
//!     → server.rs (Axum setup, forwarding handler)
//!     → security::headers (strip hop-by-hop)
//!     → request.rs (rebuild request for the origin)
//!     → dispatch.rs (network call to the origin)
//!     → response.rs (sanitize headers, stream body back)
//!     → observability::exchange (log the exchange)
//! ```

pub mod dispatch;
pub mod request;
pub mod response;
pub mod server;

pub use dispatch::Dispatcher;
pub use server::HttpServer;
