//! Response relay from origin to client.
//!
//! # Responsibilities
//! - Copy the origin's status and headers, then strip hop-by-hop headers
//! - Pump the body from the origin stream to the client without buffering it
//! - Log body-copy failures that happen after the head is committed
//!
//! # Design Decisions
//! - Frames are forwarded as they arrive; memory does not grow with body size
//! - Bodies without a Content-Length get a small read-ahead window so short
//!   responses go out with an exact length instead of chunked framing
//! - Responses that cannot carry a body (HEAD, 1xx, 204, 304) skip the relay
//! - Once headers are sent, errors can only end the stream, never change it

use std::pin::Pin;
use std::task::{Context, Poll};
use std::time::Duration;

use axum::{
    body::{Body, Bytes, HttpBody},
    http::{header::CONTENT_LENGTH, HeaderMap, Method, Response, StatusCode},
    BoxError,
};
use futures_util::{
    stream::{self, BoxStream},
    Stream, StreamExt,
};
use tokio::time::Instant;
use uuid::Uuid;

use crate::config::{HeaderConfig, MultiValuePolicy, ResponseConfig};
use crate::error::ProxyError;
use crate::security::headers::{copy_headers, sanitize};

type DataStream = BoxStream<'static, Result<Bytes, axum::Error>>;

/// Settings for relaying one response.
#[derive(Debug, Clone, Copy)]
pub struct RelayOptions<'a> {
    pub headers: &'a HeaderConfig,
    pub response: &'a ResponseConfig,
}

impl RelayOptions<'_> {
    fn multi_value(&self) -> MultiValuePolicy {
        self.headers.multi_value
    }
}

/// Turn the origin's response into the client's response.
///
/// Fails only if the origin body errors while still inside the read-ahead
/// window, i.e. before anything has been sent to the client.
pub async fn relay<B>(
    origin: Response<B>,
    request_method: &Method,
    options: RelayOptions<'_>,
    exchange_id: Uuid,
) -> Result<Response<Body>, ProxyError>
where
    B: HttpBody<Data = Bytes> + Send + 'static,
    B::Error: Into<BoxError>,
{
    let (parts, body) = origin.into_parts();

    let mut headers = HeaderMap::with_capacity(parts.headers.len());
    copy_headers(&parts.headers, &mut headers, options.multi_value());
    sanitize(&mut headers, options.headers);

    let body = if carries_body(request_method, parts.status) {
        pump(Body::new(body), &headers, options.response, exchange_id).await?
    } else {
        // Never polled by the connection; the length headers stay as the origin sent them.
        Body::from_stream(stream::empty::<Result<Bytes, axum::Error>>())
    };

    let mut response = Response::new(body);
    *response.status_mut() = parts.status;
    *response.headers_mut() = headers;
    Ok(response)
}

/// Wrap the origin body for the client, reading ahead when the origin left
/// the length open.
async fn pump(
    origin: Body,
    headers: &HeaderMap,
    config: &ResponseConfig,
    exchange_id: Uuid,
) -> Result<Body, ProxyError> {
    let data: DataStream = origin.into_data_stream().boxed();
    let window = config.prebuffer_bytes;

    if window == 0 || headers.contains_key(CONTENT_LENGTH) {
        return Ok(Body::from_stream(RelayStream::new(data, exchange_id)));
    }

    let deadline = Instant::now() + Duration::from_millis(config.prebuffer_wait_ms);
    match read_ahead(data, window, deadline).await {
        Ok(ReadAhead::Complete(bytes)) => Ok(Body::from(bytes)),
        Ok(ReadAhead::Partial { head, rest }) => {
            let replay = stream::iter(head.into_iter().map(Ok)).chain(rest).boxed();
            Ok(Body::from_stream(RelayStream::new(replay, exchange_id)))
        }
        Err(e) => Err(ProxyError::upstream(&e)),
    }
}

/// RFC 7230 §3.3.3: no body follows a HEAD request or a 1xx, 204 or 304 status.
fn carries_body(method: &Method, status: StatusCode) -> bool {
    *method != Method::HEAD
        && !status.is_informational()
        && status != StatusCode::NO_CONTENT
        && status != StatusCode::NOT_MODIFIED
}

enum ReadAhead {
    /// The whole body fit in the window.
    Complete(Bytes),
    /// The window filled up (or the wait expired) first.
    Partial { head: Vec<Bytes>, rest: DataStream },
}

/// Buffer frames until the body ends, more than `window` bytes are held, or
/// `deadline` passes. Holds at most `window` bytes plus one frame.
async fn read_ahead(
    mut data: DataStream,
    window: usize,
    deadline: Instant,
) -> Result<ReadAhead, axum::Error> {
    let mut head = Vec::new();
    let mut buffered = 0usize;

    while buffered <= window {
        // `next()` is cancel-safe, so an expired wait loses no frame.
        match tokio::time::timeout_at(deadline, data.next()).await {
            Ok(Some(Ok(chunk))) => {
                buffered += chunk.len();
                head.push(chunk);
            }
            Ok(Some(Err(e))) => return Err(e),
            Ok(None) => return Ok(ReadAhead::Complete(concat(head, buffered))),
            Err(_) => break,
        }
    }

    Ok(ReadAhead::Partial { head, rest: data })
}

fn concat(mut chunks: Vec<Bytes>, len: usize) -> Bytes {
    if chunks.len() == 1 {
        return chunks.remove(0);
    }
    let mut out = Vec::with_capacity(len);
    for chunk in &chunks {
        out.extend_from_slice(chunk);
    }
    Bytes::from(out)
}

/// Body stream handed to the client connection. Counts relayed bytes and logs
/// how the relay ended.
struct RelayStream {
    inner: DataStream,
    exchange_id: Uuid,
    relayed: u64,
    finished: bool,
}

impl RelayStream {
    fn new(inner: DataStream, exchange_id: Uuid) -> Self {
        Self {
            inner,
            exchange_id,
            relayed: 0,
            finished: false,
        }
    }
}

impl Stream for RelayStream {
    type Item = Result<Bytes, axum::Error>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if self.finished {
            return Poll::Ready(None);
        }
        match self.inner.poll_next_unpin(cx) {
            Poll::Ready(Some(Ok(chunk))) => {
                self.relayed += chunk.len() as u64;
                Poll::Ready(Some(Ok(chunk)))
            }
            Poll::Ready(Some(Err(e))) => {
                self.finished = true;
                tracing::warn!(
                    exchange_id = %self.exchange_id,
                    bytes = self.relayed,
                    error = %e,
                    "Origin body failed mid-relay"
                );
                Poll::Ready(Some(Err(e)))
            }
            Poll::Ready(None) => {
                self.finished = true;
                tracing::debug!(
                    exchange_id = %self.exchange_id,
                    bytes = self.relayed,
                    "Body relay complete"
                );
                Poll::Ready(None)
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        if !self.finished {
            tracing::warn!(
                exchange_id = %self.exchange_id,
                bytes = self.relayed,
                "Client went away before body relay finished"
            );
        }
    }
}
