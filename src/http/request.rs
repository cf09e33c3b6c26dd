//! Request reconstruction for the upstream call.
//!
//! # Responsibilities
//! - Resolve the inbound request-target into an absolute `http` URI
//! - Copy method, sanitized headers and the body stream into a new request
//! - Point `Host` at the resolved origin (RFC 7230 §5.4)
//!
//! # Design Decisions
//! - Absolute-form targets (RFC 7230 §5.3.2) are forwarded untouched
//! - Origin-form targets are only accepted in transparent deployments, where
//!   the Host header names the origin
//! - The body is moved, never read: it is forwarded once or dropped

use std::str::FromStr;

use axum::{
    body::Body,
    http::{
        header::HOST,
        uri::{Authority, PathAndQuery, Scheme},
        HeaderMap, HeaderValue, Method, Request, Uri,
    },
};

use crate::config::MultiValuePolicy;
use crate::error::ProxyError;
use crate::security::headers::copy_headers;

/// Inputs of the request builder, taken from an already sanitized inbound request.
#[derive(Debug)]
pub struct OutboundParts<'a> {
    pub method: Method,
    pub target: &'a Uri,
    pub headers: &'a HeaderMap,
    pub multi_value: MultiValuePolicy,
    pub resolve_origin_form: bool,
}

/// Build the request sent to the origin.
pub fn build_outbound(parts: OutboundParts<'_>, body: Body) -> Result<Request<Body>, ProxyError> {
    let uri = resolve_target(parts.target, parts.headers, parts.resolve_origin_form)?;
    let host = host_value(&uri).map_err(|e| ProxyError::construction(parts.target, e))?;

    let mut builder = Request::builder().method(parts.method).uri(uri);
    if let Some(headers) = builder.headers_mut() {
        copy_headers(parts.headers, headers, parts.multi_value);
        // Whatever Host the client sent, the origin sees its own authority.
        headers.insert(HOST, host);
    }

    builder
        .body(body)
        .map_err(|e| ProxyError::construction(parts.target, e))
}

/// `host[:port]` of a resolved target, without any userinfo.
fn host_value(uri: &Uri) -> Result<HeaderValue, String> {
    let authority = uri.authority().ok_or("missing host")?;
    let host = match authority.port_u16() {
        Some(port) => format!("{}:{port}", authority.host()),
        None => authority.host().to_string(),
    };
    HeaderValue::from_str(&host).map_err(|e| format!("invalid host: {e}"))
}

/// Turn a request-target into the absolute URI of the origin.
pub fn resolve_target(
    target: &Uri,
    headers: &HeaderMap,
    resolve_origin_form: bool,
) -> Result<Uri, ProxyError> {
    if let Some(scheme) = target.scheme() {
        if *scheme != Scheme::HTTP {
            return Err(ProxyError::construction(
                target,
                format!("unsupported scheme '{scheme}'"),
            ));
        }
        if target.authority().is_none() {
            return Err(ProxyError::construction(target, "missing host"));
        }
        return Ok(target.clone());
    }

    if target.authority().is_some() {
        return Err(ProxyError::construction(
            target,
            "authority-form targets (CONNECT) are not supported",
        ));
    }
    if target.path() == "*" {
        return Err(ProxyError::construction(
            target,
            "asterisk-form targets are not supported",
        ));
    }
    if !resolve_origin_form {
        return Err(ProxyError::construction(
            target,
            "request target is not an absolute URI",
        ));
    }

    let host = headers
        .get(HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ProxyError::construction(target, "missing Host header"))?;
    let authority = Authority::from_str(host)
        .map_err(|e| ProxyError::construction(target, format!("invalid Host header: {e}")))?;
    let path_and_query = target
        .path_and_query()
        .cloned()
        .unwrap_or_else(|| PathAndQuery::from_static("/"));

    Uri::builder()
        .scheme(Scheme::HTTP)
        .authority(authority)
        .path_and_query(path_and_query)
        .build()
        .map_err(|e| ProxyError::construction(target, e))
}
