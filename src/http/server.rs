//! HTTP server setup and request dispatch.
//!
//! # Responsibilities
//! - Create the Axum router around a single catch-all dispatcher
//! - Wire up middleware (request ID, tracing)
//! - Resolve the request's host against the routing table
//! - Hand resolved requests to the forwarder or the WebSocket proxy
//! - Record per-request metrics
//!
//! # Design Decisions
//! - One decision point: every request, upgrade or not, goes through `dispatch`
//! - Unknown hosts never reach a backend

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use axum::{
    body::Body,
    extract::{ConnectInfo, State},
    http::Request,
    response::Response,
    Router,
};
use rustls::ClientConfig;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    request_id::{PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};

use crate::config::{validate_config, ConfigError, ProxyConfig};
use crate::http::forward::{self, ForwardClient};
use crate::http::request::{request_id, MakeRequestUuid};
use crate::http::{response, websocket};
use crate::net::{tls, SessionTracker};
use crate::observability::metrics;
use crate::routing::{matcher::request_host, RoutingTable};

/// Application state injected into handlers.
#[derive(Clone)]
pub struct AppState {
    pub table: Arc<RoutingTable>,
    pub client: ForwardClient,
    pub tls: Arc<ClientConfig>,
    pub sessions: SessionTracker,
}

/// HTTP server for the reverse proxy.
pub struct HttpServer {
    router: Router,
    config: ProxyConfig,
    table: Arc<RoutingTable>,
    sessions: SessionTracker,
}

impl HttpServer {
    /// Validate `config` and build the server around its routing table.
    pub fn new(config: ProxyConfig) -> Result<Self, ConfigError> {
        validate_config(&config).map_err(ConfigError::Validation)?;

        let table = Arc::new(RoutingTable::from_config(
            &config.routes,
            config.routing.host_matching(),
        )?);
        let tls = tls::client_config()?;
        let client = forward::build_client(Arc::clone(&tls));
        let sessions = SessionTracker::new();

        let state = AppState {
            table: Arc::clone(&table),
            client,
            tls,
            sessions: sessions.clone(),
        };

        Ok(Self {
            router: Self::build_router(state),
            config,
            table,
            sessions,
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(state: AppState) -> Router {
        Router::new().fallback(dispatch).with_state(state).layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
                .layer(TraceLayer::new_for_http())
                .layer(PropagateRequestIdLayer::x_request_id()),
        )
    }

    /// Run the server, accepting connections on the given listener.
    ///
    /// Returns only if the listener fails.
    pub async fn run(self, listener: TcpListener) -> Result<(), std::io::Error> {
        let addr = listener.local_addr()?;
        tracing::info!(address = %addr, routes = self.table.len(), "HTTP server starting");

        let app = self.router.into_make_service_with_connect_info::<SocketAddr>();
        axum::serve(listener, app).await?;

        tracing::info!("HTTP server stopped");
        Ok(())
    }

    /// Get a reference to the config.
    pub fn config(&self) -> &ProxyConfig {
        &self.config
    }

    pub fn routes(&self) -> &RoutingTable {
        &self.table
    }

    /// Handle on the open relay session count.
    pub fn sessions(&self) -> SessionTracker {
        self.sessions.clone()
    }
}

/// Route every request by host, then forward or upgrade it.
async fn dispatch(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    request: Request<Body>,
) -> Response {
    let start = Instant::now();
    let request_id = request_id(request.headers()).to_string();
    let upgrade = websocket::is_upgrade_request(request.headers());
    let kind = if upgrade { "websocket" } else { "http" };
    let host = request_host(&request).unwrap_or_default().to_string();

    tracing::debug!(
        request_id = %request_id,
        method = %request.method(),
        host = %host,
        path = %request.uri().path(),
        upgrade,
        "Dispatching request"
    );

    let response = match state.table.lookup(&host) {
        Err(err) => {
            tracing::warn!(request_id = %request_id, host = %host, upgrade, "No route for host");
            if upgrade {
                response::upgrade_not_found()
            } else {
                response::route_not_found(&err)
            }
        }
        Ok(target) if upgrade => websocket::proxy(&state, request, target, client_addr).await,
        Ok(target) => match forward::forward(&state.client, request, target, client_addr).await {
            Ok(response) => response,
            Err(e) => {
                tracing::error!(request_id = %request_id, host = %host, error = %e, "Upstream error");
                response::bad_gateway()
            }
        },
    };

    metrics::record_request(kind, response.status().as_u16(), start);
    response
}
