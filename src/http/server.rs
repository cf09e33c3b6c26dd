//! HTTP server setup and the forwarding handler.
//!
//! # Responsibilities
//! - Create the Axum router with a single catch-all forwarding handler
//! - Wire up middleware (tracing)
//! - Bind the server to a listener and shut down gracefully
//! - Run the exchange pipeline: sanitize, build, dispatch, relay, log
//!   (the log entry waits for the body to finish)

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::State,
    http::Request,
    response::{IntoResponse, Response},
    Router,
};
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::config::ProxyConfig;
use crate::error::ProxyError;
use crate::http::dispatch::Dispatcher;
use crate::http::request::{build_outbound, OutboundParts};
use crate::http::response::{relay, RelayOptions};
use crate::observability::{metrics, ExchangeRecord};
use crate::security::headers::sanitize;

/// Application state injected into the handler.
///
/// Shared read-only across requests; nothing here is mutated per exchange.
#[derive(Clone)]
pub struct AppState {
    pub dispatcher: Dispatcher,
    pub config: Arc<ProxyConfig>,
}

/// HTTP server for the forward proxy.
pub struct HttpServer {
    router: Router,
}

impl HttpServer {
    /// Create a new HTTP server with the given configuration.
    pub fn new(config: ProxyConfig) -> Self {
        let config = Arc::new(config);
        let state = AppState {
            dispatcher: Dispatcher::new(&config.upstream),
            config,
        };

        Self {
            router: Self::build_router(state),
        }
    }

    /// Every request, whatever its method or target, goes to the forwarder.
    fn build_router(state: AppState) -> Router {
        Router::new()
            .fallback(forward_handler)
            .with_state(state)
            .layer(TraceLayer::new_for_http())
    }

    /// Run the server, accepting connections on the given listener until
    /// `shutdown` resolves. In-flight exchanges are allowed to finish.
    pub async fn run<F>(self, listener: TcpListener, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, "HTTP server starting");

        axum::serve(listener, self.router)
            .with_graceful_shutdown(async move {
                shutdown.await;
                tracing::info!("Shutdown signal received");
            })
            .await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// The router, for serving in-process.
    pub fn router(&self) -> Router {
        self.router.clone()
    }
}

/// Forwarding handler: one call per inbound request.
async fn forward_handler(State(state): State<AppState>, request: Request<Body>) -> Response {
    let start_time = Instant::now();
    let exchange_id = Uuid::new_v4();
    let method = request.method().to_string();
    let target = request.uri().to_string();

    match forward(&state, request, exchange_id, start_time).await {
        Ok(response) => {
            metrics::record_request(&method, response.status().as_u16(), start_time);
            response
        }
        Err(err) => {
            let status = err.status_code();
            match &err {
                ProxyError::Construction { .. } => tracing::warn!(
                    exchange_id = %exchange_id,
                    method = %method,
                    target_uri = %target,
                    status = status.as_u16(),
                    error = %err,
                    "Rejected request"
                ),
                _ => tracing::error!(
                    exchange_id = %exchange_id,
                    method = %method,
                    target_uri = %target,
                    status = status.as_u16(),
                    error = %err,
                    "Upstream error"
                ),
            }
            metrics::record_error(err.kind());
            metrics::record_request(&method, status.as_u16(), start_time);
            err.into_response()
        }
    }
}

async fn forward(
    state: &AppState,
    request: Request<Body>,
    exchange_id: Uuid,
    start_time: Instant,
) -> Result<Response, ProxyError> {
    let config = &state.config;
    let (mut parts, body) = request.into_parts();

    // 1. Strip hop-by-hop headers from the client's hop
    sanitize(&mut parts.headers, &config.headers);

    // 2. Rebuild the request for the origin; the body moves with it
    let outbound = build_outbound(
        OutboundParts {
            method: parts.method.clone(),
            target: &parts.uri,
            headers: &parts.headers,
            multi_value: config.headers.multi_value,
            resolve_origin_form: config.upstream.resolve_origin_form,
        },
        body,
    )?;

    tracing::debug!(
        exchange_id = %exchange_id,
        method = %outbound.method(),
        upstream = %outbound.uri(),
        "Forwarding request"
    );

    // 3. Dispatch
    let origin = state.dispatcher.dispatch(outbound).await?;
    let response_version = origin.version();

    // 4. Relay status, sanitized headers and the body stream
    let options = RelayOptions {
        headers: &config.headers,
        response: &config.response,
    };
    let response = relay(origin, &parts.method, options, exchange_id).await?;

    // 5. Log the exchange once the body has been relayed
    let record = ExchangeRecord {
        id: exchange_id,
        method: parts.method,
        target: parts.uri,
        version: parts.version,
        request_headers: parts.headers,
        response_version,
        status: response.status(),
        response_headers: response.headers().clone(),
        elapsed: start_time.elapsed(),
    };

    Ok(record.emit_after_body(response, start_time))
}
