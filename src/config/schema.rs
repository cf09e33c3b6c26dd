//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the proxy.
//! All types derive Serde traits for deserialization from config files, and
//! every field has a default so an empty file is a valid configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Root configuration for the forward proxy.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct ProxyConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Upstream dispatch settings.
    pub upstream: UpstreamConfig,

    /// Header copying policy.
    pub headers: HeaderConfig,

    /// Response relay settings.
    pub response: ResponseConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:12345").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:12345".to_string(),
        }
    }
}

/// Upstream dispatch configuration.
///
/// Both timeouts are unset by default: the dispatcher waits for the origin
/// for as long as the transport does.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct UpstreamConfig {
    /// TCP connect timeout in seconds.
    pub connect_timeout_secs: Option<u64>,

    /// Deadline for the origin's response head in seconds.
    pub request_timeout_secs: Option<u64>,

    /// Rebuild origin-form targets (`/path`) from the Host header instead of
    /// rejecting them. For transparent deployments only.
    pub resolve_origin_form: bool,
}

impl UpstreamConfig {
    pub fn connect_timeout(&self) -> Option<Duration> {
        self.connect_timeout_secs.map(Duration::from_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}

/// How header names with several values are copied between hops.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum MultiValuePolicy {
    /// Propagate every value.
    #[default]
    All,
    /// Keep only the first value of each name.
    First,
}

/// Header handling configuration.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct HeaderConfig {
    pub multi_value: MultiValuePolicy,

    /// Also strip the header names listed in the `Connection` header.
    pub strip_connection_tokens: bool,
}

/// Response relay configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ResponseConfig {
    /// Read-ahead window for origin bodies without a Content-Length.
    /// Bodies that end inside the window are sent with an exact length.
    /// Zero disables the read-ahead.
    pub prebuffer_bytes: usize,

    /// Longest time the read-ahead may hold back the response head.
    pub prebuffer_wait_ms: u64,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            prebuffer_bytes: 4096,
            prebuffer_wait_ms: 50,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Log output format.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            metrics_enabled: false,
            metrics_address: "127.0.0.1:9090".to_string(),
        }
    }
}
