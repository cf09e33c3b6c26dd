//! Security subsystem.
//!
//! # Data Flow
//! ```text
//! Inbound request headers:
//!     → headers.rs (strip hop-by-hop)
//!     → forwarded to origin
//!
//! Origin response headers:
//!     → headers.rs (same filter)
//!     → relayed to client
//! ```
//!
//! # Design Decisions
//! - One filter for both directions keeps the hops symmetric
//! - No trust in connection-scoped headers from either side

pub mod headers;

pub use headers::{sanitize, strip_hop_by_hop, HOP_BY_HOP_HEADERS};
