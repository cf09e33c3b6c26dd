//! Diagnostic record of one proxied exchange.
//!
//! Emitted once per successful exchange, after the response body has been
//! relayed (or abandoned by the client), on the `forward_proxy::exchange`
//! target. Structured fields carry the identifiers; the message is a
//! human-readable block of both heads.

use std::fmt;
use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use axum::body::{Body, Bytes, HttpBody};
use axum::http::{HeaderMap, Method, Response, StatusCode, Uri, Version};
use hyper::body::{Frame, SizeHint};
use uuid::Uuid;

const RULE: &str = "==============================";
const SEPARATOR: &str = "------------------------------";

/// Snapshot of both sides of an exchange, minus the bodies.
#[derive(Debug, Clone)]
pub struct ExchangeRecord {
    pub id: Uuid,
    pub method: Method,
    pub target: Uri,
    pub version: Version,
    /// Inbound headers after sanitization.
    pub request_headers: HeaderMap,
    pub response_version: Version,
    pub status: StatusCode,
    /// Headers as sent to the client.
    pub response_headers: HeaderMap,
    pub elapsed: Duration,
}

impl ExchangeRecord {
    /// Write the record to the log sink.
    pub fn emit(&self) {
        tracing::info!(
            target: "forward_proxy::exchange",
            exchange_id = %self.id,
            method = %self.method,
            target_uri = %self.target,
            status = self.status.as_u16(),
            elapsed_ms = self.elapsed.as_millis() as u64,
            "\n{}",
            self
        );
    }

    /// Emit the record when the connection is done with `response`'s body.
    /// `elapsed` is measured from `started` at that point.
    pub fn emit_after_body(self, response: Response<Body>, started: Instant) -> Response<Body> {
        response.map(|inner| {
            Body::new(RecordedBody {
                inner,
                pending: Some((self, started)),
            })
        })
    }
}

/// Response body that logs its exchange once dropped.
struct RecordedBody {
    inner: Body,
    pending: Option<(ExchangeRecord, Instant)>,
}

impl HttpBody for RecordedBody {
    type Data = Bytes;
    type Error = axum::Error;

    fn poll_frame(
        mut self: Pin<&mut Self>,
        cx: &mut Context<'_>,
    ) -> Poll<Option<Result<Frame<Bytes>, axum::Error>>> {
        Pin::new(&mut self.inner).poll_frame(cx)
    }

    fn is_end_stream(&self) -> bool {
        self.inner.is_end_stream()
    }

    fn size_hint(&self) -> SizeHint {
        self.inner.size_hint()
    }
}

impl Drop for RecordedBody {
    fn drop(&mut self) {
        if let Some((mut record, started)) = self.pending.take() {
            record.elapsed = started.elapsed();
            record.emit();
        }
    }
}

impl fmt::Display for ExchangeRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{RULE}")?;
        writeln!(f, "{} {} {:?}", self.method, self.target, self.version)?;
        write_headers(f, &self.request_headers)?;
        writeln!(f, "{SEPARATOR}")?;
        writeln!(f, "{:?} {}", self.response_version, self.status)?;
        write_headers(f, &self.response_headers)?;
        write!(f, "{RULE}")
    }
}

fn write_headers(f: &mut fmt::Formatter<'_>, headers: &HeaderMap) -> fmt::Result {
    for (name, value) in headers {
        writeln!(f, "{}: {}", name, String::from_utf8_lossy(value.as_bytes()))?;
    }
    Ok(())
}
