//! Upstream dispatch.
//!
//! # Responsibilities
//! - Send the reconstructed request to the origin server
//! - Map transport failures (DNS, refused, reset, timeout) to `ProxyError`
//!
//! # Design Decisions
//! - One pooled hyper client shared by all requests, with default settings
//! - No deadline unless one is configured; no retries at all

use std::time::Duration;

use axum::{body::Body, http::Request};
use hyper::{body::Incoming, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::TokioExecutor,
};

use crate::config::UpstreamConfig;
use crate::error::ProxyError;

/// Performs the network call to the origin.
#[derive(Clone)]
pub struct Dispatcher {
    client: Client<HttpConnector, Body>,
    request_timeout: Option<Duration>,
}

impl Dispatcher {
    pub fn new(config: &UpstreamConfig) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(config.connect_timeout());

        let client = Client::builder(TokioExecutor::new()).build(connector);

        Self {
            client,
            request_timeout: config.request_timeout(),
        }
    }

    /// Send `request` and wait for the origin's response head.
    ///
    /// The body stream is returned unread.
    pub async fn dispatch(&self, request: Request<Body>) -> Result<Response<Incoming>, ProxyError> {
        let call = self.client.request(request);

        let result = match self.request_timeout {
            Some(limit) => tokio::time::timeout(limit, call)
                .await
                .map_err(|_| ProxyError::UpstreamTimeout(limit))?,
            None => call.await,
        };

        result.map_err(|e| ProxyError::upstream(&e))
    }
}
