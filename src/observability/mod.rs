//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Forwarding handler produces:
//!     → exchange.rs (one diagnostic block per exchange)
//!     → metrics.rs (counters, histograms)
//!
//! logging.rs installs the subscriber every event goes through.
//! ```
//!
//! # Design Decisions
//! - Exchange ids correlate log lines; they are never added to forwarded requests
//! - Logging is best-effort and never affects the exchange
//! - Metrics are cheap no-ops when the exporter is disabled

pub mod exchange;
pub mod logging;
pub mod metrics;

pub use exchange::ExchangeRecord;
