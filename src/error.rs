//! Errors that terminate a single proxied exchange.
//!
//! Every variant maps to a 5xx response whose plain-text body is the error
//! message. Nothing here is retried.

use std::error::Error as StdError;
use std::time::Duration;

use axum::{
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProxyError {
    /// The inbound request cannot be turned into a valid outbound request.
    #[error("cannot forward request to {target}: {reason}")]
    Construction { target: String, reason: String },

    /// The network call to the origin failed.
    #[error("upstream request failed: {0}")]
    Upstream(String),

    /// The origin did not answer within the configured deadline.
    #[error("upstream did not respond within {0:?}")]
    UpstreamTimeout(Duration),
}

impl ProxyError {
    pub fn construction(target: impl ToString, reason: impl ToString) -> Self {
        Self::Construction {
            target: target.to_string(),
            reason: reason.to_string(),
        }
    }

    /// Build an upstream error carrying the whole source chain, since hyper's
    /// top-level messages ("client error (Connect)") say little on their own.
    pub fn upstream(err: &(dyn StdError + 'static)) -> Self {
        Self::Upstream(error_chain(err))
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ProxyError::Construction { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ProxyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            ProxyError::UpstreamTimeout(_) => StatusCode::GATEWAY_TIMEOUT,
        }
    }

    /// Label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            ProxyError::Construction { .. } => "construction",
            ProxyError::Upstream(_) => "upstream",
            ProxyError::UpstreamTimeout(_) => "timeout",
        }
    }
}

impl IntoResponse for ProxyError {
    fn into_response(self) -> Response {
        (
            self.status_code(),
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            self.to_string(),
        )
            .into_response()
    }
}

/// Join an error and its sources with ": ".
pub fn error_chain(err: &(dyn StdError + 'static)) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        let text = cause.to_string();
        if !message.ends_with(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = cause.source();
    }
    message
}
