//! End-to-end: real backends on ephemeral ports, veer in front of them.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::time::Duration;

use bytes::Bytes;
use http::{Method, Request, Response, StatusCode};
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::client::legacy::Client;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::rt::{TokioExecutor, TokioIo};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;

use veer::{Backends, Config, Gateway, MigrationPolicy, Server, Target};

type TestClient = Client<HttpConnector, Full<Bytes>>;

// ── Fixtures ──────────────────────────────────────────────────────────────────

/// Echoes what it received back in `x-seen-*` headers and the body.
/// `/slow` stalls for two seconds; `/fail` answers 503.
async fn echo(name: &'static str, req: Request<Incoming>) -> Result<Response<Full<Bytes>>, Infallible> {
    let (parts, body) = req.into_parts();

    if parts.uri.path() == "/slow" {
        tokio::time::sleep(Duration::from_secs(2)).await;
    }

    let body = body.collect().await.map(|c| c.to_bytes()).unwrap_or_default();
    let seen: Vec<&str> = parts.headers.keys().map(|k| k.as_str()).collect();
    let host = parts
        .headers
        .get("host")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_owned();
    let status = if parts.uri.path() == "/fail" {
        StatusCode::SERVICE_UNAVAILABLE
    } else {
        StatusCode::OK
    };

    Ok(Response::builder()
        .status(status)
        .header("x-backend", name)
        .header("x-seen-method", parts.method.as_str())
        .header("x-seen-uri", parts.uri.to_string())
        .header("x-seen-host", host)
        .header("x-seen-headers", seen.join(","))
        .body(Full::new(body))
        .unwrap())
}

async fn spawn_backend(name: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else { return };
            tokio::spawn(async move {
                let svc = service_fn(move |req| echo(name, req));
                let _ = http1::Builder::new().serve_connection(TokioIo::new(stream), svc).await;
            });
        }
    });

    addr
}

/// Reads one request head off a raw backend socket.
async fn read_head(stream: &mut TcpStream) {
    let mut head = Vec::new();
    let mut buf = [0u8; 1024];
    while !head.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await.unwrap();
        assert!(n > 0, "backend connection closed before the request head");
        head.extend_from_slice(&buf[..n]);
    }
}

/// An address nothing listens on.
async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

async fn spawn_proxy(
    legacy: SocketAddr,
    new: SocketAddr,
    policy: MigrationPolicy,
    backend_timeout: Duration,
) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    let config = Config {
        backends: Backends {
            legacy: Target::parse("legacy", &format!("http://{legacy}")).unwrap(),
            new: Target::parse("new", &format!("http://{new}")).unwrap(),
        },
        policy,
        listen: addr,
        backend_timeout,
    };

    tokio::spawn(async move {
        Server::from_listener(listener)
            .serve_with_shutdown(Gateway::new(&config), std::future::pending())
            .await
            .unwrap();
    });

    addr
}

fn client() -> TestClient {
    Client::builder(TokioExecutor::new()).build_http()
}

async fn send(
    client: &TestClient,
    proxy: SocketAddr,
    method: Method,
    path: &str,
) -> Response<Incoming> {
    let req = Request::builder()
        .method(method)
        .uri(format!("http://{proxy}{path}"))
        .body(Full::default())
        .unwrap();
    client.request(req).await.unwrap()
}

fn header<'a>(res: &'a Response<Incoming>, name: &str) -> &'a str {
    res.headers().get(name).and_then(|v| v.to_str().ok()).unwrap_or_default()
}

async fn body(res: Response<Incoming>) -> Bytes {
    res.into_body().collect().await.unwrap().to_bytes()
}

const TIMEOUT: Duration = Duration::from_secs(5);

// ── Routing ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn zero_percent_keeps_movies_on_legacy() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::enabled(0).unwrap(),
        TIMEOUT,
    )
    .await;
    let c = client();

    for _ in 0..50 {
        let res = send(&c, proxy, Method::GET, "/api/movies").await;
        assert_eq!(header(&res, "x-backend"), "legacy");
    }
}

#[tokio::test]
async fn full_percent_sends_movies_to_new() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::enabled(100).unwrap(),
        TIMEOUT,
    )
    .await;
    let c = client();

    for _ in 0..50 {
        let res = send(&c, proxy, Method::GET, "/api/movies").await;
        assert_eq!(header(&res, "x-backend"), "new");
    }
}

#[tokio::test]
async fn disabled_migration_stays_on_legacy() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::disabled(),
        TIMEOUT,
    )
    .await;
    let c = client();

    for _ in 0..50 {
        let res = send(&c, proxy, Method::GET, "/api/movies").await;
        assert_eq!(header(&res, "x-backend"), "legacy");
    }
}

#[tokio::test]
async fn only_exact_get_movies_is_split() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::enabled(100).unwrap(),
        TIMEOUT,
    )
    .await;
    let c = client();

    let cases = [
        (Method::POST, "/api/movies"),
        (Method::DELETE, "/api/movies"),
        (Method::GET, "/api/movies/"),
        (Method::GET, "/api/movies/7"),
        (Method::GET, "/api/users"),
        (Method::GET, "/"),
    ];
    for (method, path) in cases {
        let res = send(&c, proxy, method.clone(), path).await;
        assert_eq!(header(&res, "x-backend"), "legacy", "{method} {path}");
    }
}

#[tokio::test]
async fn half_split_lands_on_both() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::enabled(50).unwrap(),
        TIMEOUT,
    )
    .await;
    let c = client();

    let mut new = 0;
    for _ in 0..400 {
        let res = send(&c, proxy, Method::GET, "/api/movies").await;
        if header(&res, "x-backend") == "new" {
            new += 1;
        }
    }
    // Mean 200, standard deviation 10.
    assert!((120..=280).contains(&new), "new backend got {new}/400");
}

// ── Forwarding ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_is_forwarded_verbatim_minus_client_hop_headers() {
    let legacy = spawn_backend("legacy").await;
    let proxy = spawn_proxy(legacy, spawn_backend("new").await, MigrationPolicy::disabled(), TIMEOUT).await;
    let c = client();

    let payload = r#"{"title":"Heat","year":1995}"#;
    let req = Request::builder()
        .method(Method::PUT)
        .uri(format!("http://{proxy}/api/movies/3?lang=en&draft=1"))
        .header("x-forwarded-for", "203.0.113.7")
        .header("x-real-ip", "203.0.113.7")
        .header("authorization", "Bearer abc")
        .header("content-type", "application/json")
        .body(Full::new(Bytes::from(payload)))
        .unwrap();
    let res = c.request(req).await.unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "x-seen-method"), "PUT");
    assert_eq!(header(&res, "x-seen-uri"), "/api/movies/3?lang=en&draft=1");
    assert_eq!(header(&res, "x-seen-host"), legacy.to_string());

    let seen: Vec<&str> = header(&res, "x-seen-headers").split(',').collect();
    assert!(!seen.contains(&"x-forwarded-for"));
    assert!(!seen.contains(&"x-real-ip"));
    assert!(seen.contains(&"authorization"));
    assert!(seen.contains(&"content-type"));

    assert_eq!(body(res).await, payload);
}

#[tokio::test]
async fn backend_status_and_body_are_relayed() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::disabled(),
        TIMEOUT,
    )
    .await;

    let res = send(&client(), proxy, Method::GET, "/fail").await;
    assert_eq!(res.status(), StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(header(&res, "x-backend"), "legacy");
}

// ── Failures ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn unreachable_backend_is_bad_gateway_without_fallback() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        dead_addr().await,
        MigrationPolicy::enabled(100).unwrap(),
        TIMEOUT,
    )
    .await;

    let res = send(&client(), proxy, Method::GET, "/api/movies").await;
    assert_eq!(res.status(), StatusCode::BAD_GATEWAY);
    assert!(res.headers().get("x-backend").is_none());
}

#[tokio::test]
async fn slow_backend_is_gateway_timeout() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        spawn_backend("new").await,
        MigrationPolicy::disabled(),
        Duration::from_millis(200),
    )
    .await;

    let res = send(&client(), proxy, Method::GET, "/slow").await;
    assert_eq!(res.status(), StatusCode::GATEWAY_TIMEOUT);
}

#[tokio::test]
async fn failing_backend_does_not_affect_concurrent_requests() {
    let proxy = spawn_proxy(
        spawn_backend("legacy").await,
        dead_addr().await,
        MigrationPolicy::enabled(100).unwrap(),
        TIMEOUT,
    )
    .await;
    let c = client();

    let (broken, healthy) = tokio::join!(
        send(&c, proxy, Method::GET, "/api/movies"),
        send(&c, proxy, Method::GET, "/api/users"),
    );
    assert_eq!(broken.status(), StatusCode::BAD_GATEWAY);
    assert_eq!(healthy.status(), StatusCode::OK);
    assert_eq!(header(&healthy, "x-backend"), "legacy");
}

// ── Health ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn health_never_contacts_a_backend() {
    let proxy = spawn_proxy(
        dead_addr().await,
        dead_addr().await,
        MigrationPolicy::enabled(100).unwrap(),
        TIMEOUT,
    )
    .await;

    let res = send(&client(), proxy, Method::GET, "/health").await;
    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(header(&res, "content-type"), "application/json");
    assert_eq!(body(res).await, r#"{"status":true}"#);
}

// ── Streaming and cancellation ────────────────────────────────────────────────

#[tokio::test]
async fn client_disconnect_aborts_backend_call() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let legacy = backend.local_addr().unwrap();
    let (seen_tx, seen_rx) = oneshot::channel();
    let (closed_tx, closed_rx) = oneshot::channel();

    // Accepts the forwarded request and never answers it.
    tokio::spawn(async move {
        let (mut stream, _) = backend.accept().await.unwrap();
        read_head(&mut stream).await;
        let _ = seen_tx.send(());

        let mut buf = [0u8; 256];
        while let Ok(n) = stream.read(&mut buf).await {
            if n == 0 {
                break;
            }
        }
        let _ = closed_tx.send(());
    });

    let proxy = spawn_proxy(legacy, dead_addr().await, MigrationPolicy::disabled(), Duration::from_secs(30)).await;

    let mut client = TcpStream::connect(proxy).await.unwrap();
    client
        .write_all(b"GET /api/users HTTP/1.1\r\nhost: veer\r\n\r\n")
        .await
        .unwrap();
    tokio::time::timeout(Duration::from_secs(5), seen_rx)
        .await
        .expect("request never reached the backend")
        .unwrap();

    drop(client);

    tokio::time::timeout(Duration::from_secs(2), closed_rx)
        .await
        .expect("backend connection still open after the client left")
        .unwrap();
}

#[tokio::test]
async fn response_body_streams_before_backend_finishes() {
    let backend = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let legacy = backend.local_addr().unwrap();

    // Sends the head and a first chunk, then stalls before the last chunk.
    tokio::spawn(async move {
        let (mut stream, _) = backend.accept().await.unwrap();
        read_head(&mut stream).await;
        stream
            .write_all(b"HTTP/1.1 200 OK\r\ntransfer-encoding: chunked\r\n\r\n5\r\nhello\r\n")
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_secs(3)).await;
        let _ = stream.write_all(b"0\r\n\r\n").await;
    });

    let proxy = spawn_proxy(legacy, dead_addr().await, MigrationPolicy::disabled(), TIMEOUT).await;

    let res = tokio::time::timeout(
        Duration::from_secs(1),
        send(&client(), proxy, Method::GET, "/api/users"),
    )
    .await
    .expect("response head held back");
    assert_eq!(res.status(), StatusCode::OK);

    let mut body = std::pin::pin!(res.into_body());
    let frame = tokio::time::timeout(Duration::from_secs(1), body.frame())
        .await
        .expect("first chunk held back until the backend finished")
        .unwrap()
        .unwrap();
    assert_eq!(frame.into_data().unwrap(), "hello");
}
