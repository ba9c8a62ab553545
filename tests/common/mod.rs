//! Shared backends and proxy harness for integration tests.

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::{HeaderMap, Uri},
    response::Response,
    routing::get,
    Router,
};
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use vhost_proxy::config::{ProxyConfig, RouteConfig};
use vhost_proxy::http::HttpServer;
use vhost_proxy::net::SessionTracker;

/// Delay applied by the HTTP backend's `/slow` route.
pub const SLOW_DELAY: Duration = Duration::from_millis(300);

/// Plain HTTP backend that reports what it received.
pub struct HttpBackend {
    pub addr: SocketAddr,
    pub hits: Arc<AtomicUsize>,
}

impl HttpBackend {
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::SeqCst)
    }
}

/// Start an HTTP backend whose body is `path_and_query|host|x-forwarded-for`.
pub async fn start_http_backend() -> HttpBackend {
    let hits = Arc::new(AtomicUsize::new(0));

    let app = Router::new()
        .route("/slow", get(slow))
        .fallback(report)
        .with_state(Arc::clone(&hits));

    HttpBackend {
        addr: serve(app).await,
        hits,
    }
}

async fn report(State(hits): State<Arc<AtomicUsize>>, uri: Uri, headers: HeaderMap) -> String {
    hits.fetch_add(1, Ordering::SeqCst);
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let path_and_query = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("{}|{}|{}", path_and_query, header("host"), header("x-forwarded-for"))
}

async fn slow(State(hits): State<Arc<AtomicUsize>>) -> &'static str {
    hits.fetch_add(1, Ordering::SeqCst);
    tokio::time::sleep(SLOW_DELAY).await;
    "slow"
}

/// WebSocket backend.
///
/// - `/hangup` sends `bye` and closes
/// - `/whoami` sends `x-forwarded-for|origin|authorization|path_and_query`, then echoes
/// - any other path echoes text and binary messages
///
/// Offers the `v1.chat` sub-protocol. Each finished socket sends on `closed`.
pub struct WsBackend {
    pub addr: SocketAddr,
    pub closed: mpsc::UnboundedReceiver<()>,
}

pub async fn start_ws_backend() -> WsBackend {
    let (tx, closed) = mpsc::unbounded_channel();
    let app = Router::new().fallback(upgrade).with_state(tx);

    WsBackend {
        addr: serve(app).await,
        closed,
    }
}

async fn upgrade(
    State(closed): State<mpsc::UnboundedSender<()>>,
    ws: WebSocketUpgrade,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string()
    };
    let info = format!(
        "{}|{}|{}|{}",
        header("x-forwarded-for"),
        header("origin"),
        header("authorization"),
        uri.path_and_query().map(|p| p.as_str()).unwrap_or("/"),
    );
    let path = uri.path().to_string();

    ws.protocols(["v1.chat"])
        .on_upgrade(move |socket| session(socket, path, info, closed))
}

async fn session(mut socket: WebSocket, path: String, info: String, closed: mpsc::UnboundedSender<()>) {
    match path.as_str() {
        "/hangup" => {
            let _ = socket.send(Message::Text("bye".into())).await;
            let _ = socket.send(Message::Close(None)).await;
        }
        "/whoami" => {
            let _ = socket.send(Message::Text(info.into())).await;
            echo(&mut socket).await;
        }
        _ => echo(&mut socket).await,
    }
    let _ = closed.send(());
}

async fn echo(socket: &mut WebSocket) {
    while let Some(Ok(message)) = socket.recv().await {
        match message {
            Message::Text(_) | Message::Binary(_) => {
                if socket.send(message).await.is_err() {
                    break;
                }
            }
            Message::Close(_) => break,
            _ => {}
        }
    }
}

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    addr
}

/// Start the proxy on an ephemeral port with the given routes.
pub async fn start_proxy(routes: Vec<RouteConfig>) -> (SocketAddr, SessionTracker) {
    let config = ProxyConfig {
        routes,
        ..ProxyConfig::default()
    };
    let server = HttpServer::new(config).unwrap();
    let sessions = server.sessions();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        let _ = server.run(listener).await;
    });

    (addr, sessions)
}

/// An address nothing is listening on.
pub async fn closed_port() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// HTTP client that never reuses connections or consults proxy settings.
pub fn client() -> reqwest::Client {
    reqwest::Client::builder()
        .pool_max_idle_per_host(0)
        .no_proxy()
        .build()
        .unwrap()
}

/// Poll `condition` every 20ms until it holds or `timeout` passes.
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    condition()
}
