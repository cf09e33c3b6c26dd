//! Hop-by-hop header sanitization.
//!
//! # Responsibilities
//! - Strip hop-by-hop headers (RFC 7230 §6.1, plus `Proxy-Connection`)
//! - Optionally strip the names listed in the `Connection` header
//! - Copy header multimaps between hops under a multi-value policy
//!
//! # Design Decisions
//! - The denylist is a constant; sanitization is a pure function of the map
//! - The same function runs on request and response headers
//! - `HeaderMap` keys are case-insensitive, so casing never matters here

use axum::http::header::{
    HeaderMap, HeaderName, CONNECTION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION,
    TE, TRANSFER_ENCODING, UPGRADE,
};

use crate::config::{HeaderConfig, MultiValuePolicy};

/// Headers that are meaningful for a single connection only.
pub static HOP_BY_HOP_HEADERS: [HeaderName; 9] = [
    CONNECTION,
    HeaderName::from_static("keep-alive"),
    PROXY_AUTHENTICATE,
    PROXY_AUTHORIZATION,
    // Not standard, but curl sends it.
    HeaderName::from_static("proxy-connection"),
    TE,
    HeaderName::from_static("trailers"),
    TRANSFER_ENCODING,
    UPGRADE,
];

/// Returns true if `name` is on the fixed hop-by-hop denylist.
pub fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(name)
}

/// Remove every value of every hop-by-hop header. Idempotent.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    for name in &HOP_BY_HOP_HEADERS {
        headers.remove(name);
    }
}

/// Header names listed as tokens in the `Connection` header.
///
/// Tokens that are not valid header names are skipped.
pub fn connection_tokens(headers: &HeaderMap) -> Vec<HeaderName> {
    headers
        .get_all(CONNECTION)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(','))
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .filter_map(|token| HeaderName::from_bytes(token.as_bytes()).ok())
        .collect()
}

/// Apply the configured sanitization to one hop's headers.
pub fn sanitize(headers: &mut HeaderMap, config: &HeaderConfig) {
    if config.strip_connection_tokens {
        // Read the tokens before `Connection` itself goes away.
        for name in connection_tokens(headers) {
            headers.remove(&name);
        }
    }
    strip_hop_by_hop(headers);
}

/// Copy `src` into `dst`, keeping either every value or only the first value
/// of each header name.
pub fn copy_headers(src: &HeaderMap, dst: &mut HeaderMap, policy: MultiValuePolicy) {
    match policy {
        MultiValuePolicy::All => {
            for (name, value) in src.iter() {
                dst.append(name.clone(), value.clone());
            }
        }
        MultiValuePolicy::First => {
            for name in src.keys() {
                if let Some(value) = src.get(name) {
                    dst.insert(name.clone(), value.clone());
                }
            }
        }
    }
}
