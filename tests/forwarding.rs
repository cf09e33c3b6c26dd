//! End-to-end forwarding through a running proxy.

use std::net::SocketAddr;

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Router,
};
use forward_proxy::config::{MultiValuePolicy, ProxyConfig};
use forward_proxy::security::HOP_BY_HOP_HEADERS;
use tokio::net::TcpListener;

mod common;

/// Origin built with axum: echoes request bodies and request headers.
async fn start_echo_origin() -> SocketAddr {
    let app = Router::new()
        .route("/echo", post(|body: Bytes| async move { body }))
        .route(
            "/headers",
            get(|headers: HeaderMap| async move {
                headers
                    .iter()
                    .map(|(k, v)| format!("{}: {}\n", k, v.to_str().unwrap_or("?")))
                    .collect::<String>()
            }),
        )
        .route(
            "/missing",
            get(|| async { (StatusCode::NOT_FOUND, "no such thing") }),
        );

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

#[tokio::test]
async fn chunked_origin_reply_relayed_without_hop_headers() {
    let (origin, mut seen) = common::start_raw_origin(
        "HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n2\r\nhi\r\n0\r\n\r\n",
    )
    .await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;
    let client = common::proxied_client(proxy);

    let res = client
        .get(format!("http://{origin}/hello"))
        .header("Connection", "keep-alive")
        .send()
        .await
        .expect("proxy unreachable");

    assert_eq!(res.status(), 200);
    assert!(res.headers().get("connection").is_none());
    assert!(res.headers().get("transfer-encoding").is_none());
    assert_eq!(res.text().await.unwrap(), "hi");

    let head = seen.recv().await.unwrap().to_lowercase();
    assert!(head.starts_with("get /hello http/1.1\r\n"), "{head}");
    assert!(!head.contains("connection:"), "origin saw: {head}");

    shutdown.trigger();
}

#[tokio::test]
async fn origin_sees_target_authority_as_host() {
    let (origin, mut seen) =
        common::start_raw_origin("HTTP/1.1 204 No Content\r\n\r\n").await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let res = common::proxied_client(proxy)
        .get(format!("http://{origin}/x"))
        .header("Host", "evil.example")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NO_CONTENT);

    let head = seen.recv().await.unwrap().to_lowercase();
    assert!(head.contains(&format!("\r\nhost: {origin}\r\n")), "origin saw: {head}");
    assert!(!head.contains("evil.example"), "origin saw: {head}");

    shutdown.trigger();
}

#[tokio::test]
async fn origin_status_and_body_are_exact() {
    let origin = start_echo_origin().await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;
    let client = common::proxied_client(proxy);

    let res = client
        .get(format!("http://{origin}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "no such thing");

    shutdown.trigger();
}

#[tokio::test]
async fn request_body_reaches_origin() {
    let origin = start_echo_origin().await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;
    let client = common::proxied_client(proxy);

    let payload: Vec<u8> = (0..200_000u32).map(|i| (i % 251) as u8).collect();
    let res = client
        .post(format!("http://{origin}/echo"))
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), 200);
    assert_eq!(res.bytes().await.unwrap().as_ref(), payload.as_slice());

    shutdown.trigger();
}

#[tokio::test]
async fn no_hop_header_reaches_origin() {
    let origin = start_echo_origin().await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;
    let client = common::proxied_client(proxy);

    let res = client
        .get(format!("http://{origin}/headers"))
        .header("Keep-Alive", "timeout=5")
        .header("Proxy-Authorization", "Basic Zm9vOmJhcg==")
        .header("Proxy-Connection", "keep-alive")
        .header("TE", "trailers")
        .header("Trailers", "x-checksum")
        .header("Upgrade", "websocket")
        .header("X-Kept", "yes")
        .send()
        .await
        .unwrap();

    let seen = res.text().await.unwrap();
    assert!(seen.contains("x-kept: yes"), "{seen}");
    for name in &HOP_BY_HOP_HEADERS {
        let prefix = format!("{}:", name.as_str());
        assert!(
            !seen.lines().any(|line| line.starts_with(&prefix)),
            "{name} reached the origin:\n{seen}"
        );
    }

    shutdown.trigger();
}

#[tokio::test]
async fn repeated_response_headers_follow_policy() {
    const REPLY: &str = "HTTP/1.1 200 OK\r\nSet-Cookie: a=1\r\nSet-Cookie: b=2\r\nContent-Length: 0\r\n\r\n";

    let (origin, _seen) = common::start_raw_origin(REPLY).await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;
    let res = common::proxied_client(proxy)
        .get(format!("http://{origin}/"))
        .send()
        .await
        .unwrap();
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies, ["a=1", "b=2"]);
    shutdown.trigger();

    let mut legacy = ProxyConfig::default();
    legacy.headers.multi_value = MultiValuePolicy::First;
    let (proxy, shutdown) = common::start_proxy(legacy).await;
    let res = common::proxied_client(proxy)
        .get(format!("http://{origin}/"))
        .send()
        .await
        .unwrap();
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies, ["a=1"]);
    shutdown.trigger();
}

#[tokio::test]
async fn origin_form_resolved_from_host_when_enabled() {
    let origin = start_echo_origin().await;
    let mut config = ProxyConfig::default();
    config.upstream.resolve_origin_form = true;
    let (proxy, shutdown) = common::start_proxy(config).await;

    // Talk to the proxy directly, as a redirected client would.
    let client = reqwest::Client::builder().no_proxy().build().unwrap();
    let res = client
        .get(format!("http://{proxy}/missing"))
        .header("Host", origin.to_string())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(res.text().await.unwrap(), "no such thing");

    shutdown.trigger();
}

#[tokio::test]
async fn exchange_is_logged() {
    let (logs, _guard) = common::capture_logs();
    let origin = start_echo_origin().await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let res = common::proxied_client(proxy)
        .get(format!("http://{origin}/missing"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 404);
    res.text().await.unwrap();

    let text = logs.wait_for("HTTP/1.1 404 Not Found").await;
    assert!(text.contains(&format!("GET http://{origin}/missing HTTP/1.1")), "{text}");
    assert!(text.contains("HTTP/1.1 404 Not Found"), "{text}");

    shutdown.trigger();
}

#[tokio::test]
async fn head_exchange_logs_no_disconnect() {
    let (logs, _guard) = common::capture_logs();
    let (origin, _seen) =
        common::start_raw_origin("HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\n").await;
    let (proxy, shutdown) = common::start_proxy(ProxyConfig::default()).await;

    let res = common::proxied_client(proxy)
        .head(format!("http://{origin}/"))
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers().get("content-length").unwrap(), "5");
    assert!(res.bytes().await.unwrap().is_empty());

    let text = logs.wait_for("HTTP/1.1 200 OK").await;
    assert!(text.contains(&format!("HEAD http://{origin}/ HTTP/1.1")), "{text}");
    assert!(!text.contains("WARN"), "{text}");

    shutdown.trigger();
}
