//! vhost-proxy
//!
//! Routes HTTP and WebSocket traffic to backends by `Host` header.
//!
//! ```text
//! vhost-proxy [--host H] [--port P] [--config FILE] [HOST TARGET]...
//!
//!     Client ──→ listener ──→ dispatch(Host) ──┬──→ forward ──→ http(s) backend
//!                                              └──→ relay   ──→ ws(s) backend
//! ```
//!
//! Routes come from the config file and from positional `HOST TARGET`
//! pairs; command-line routes are applied after file routes.

use std::net::SocketAddr;
use std::path::PathBuf;

use clap::{error::ErrorKind, CommandFactory, Parser};
use tokio::net::TcpListener;

use vhost_proxy::config::{self, ProxyConfig};
use vhost_proxy::http::HttpServer;
use vhost_proxy::observability::{logging, metrics};

/// Name-based HTTP and WebSocket reverse proxy.
#[derive(Debug, Parser)]
#[command(name = "vhost-proxy", version, about)]
struct Cli {
    /// Address to listen on [default: 0.0.0.0]
    #[arg(long)]
    host: Option<String>,

    /// Port to listen on [default: 80]
    #[arg(short, long)]
    port: Option<u16>,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Routes as alternating HOST TARGET arguments,
    /// e.g. `app.example.com http://127.0.0.1:3000`
    #[arg(value_name = "HOST TARGET")]
    routes: Vec<String>,
}

impl Cli {
    /// File config (or defaults) with command-line values applied on top.
    fn into_config(self) -> Result<ProxyConfig, config::ConfigError> {
        let mut config = match &self.config {
            Some(path) => config::read_config(path)?,
            None => ProxyConfig::default(),
        };

        if let Some(host) = self.host {
            config.listener.host = host;
        }
        if let Some(port) = self.port {
            config.listener.port = port;
        }
        config.routes.extend(config::parse_route_args(&self.routes)?);

        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = match Cli::parse().into_config() {
        Ok(config) => config,
        Err(e) => usage_error(e),
    };

    logging::init(&config.observability.log_level);
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "vhost-proxy starting");

    let server = match HttpServer::new(config) {
        Ok(server) => server,
        Err(e) => usage_error(e),
    };

    for route in server.routes().routes() {
        tracing::info!(host = %route.host, target = %route.target, "Route registered");
    }

    if let Some(addr) = &server.config().observability.metrics_address {
        let addr: SocketAddr = addr.parse()?;
        metrics::init_metrics(addr)?;
    }

    let bind_address = server.config().listener.bind_address();
    let listener = TcpListener::bind(&bind_address).await?;
    tracing::info!(address = %listener.local_addr()?, "Listening for connections");

    server.run(listener).await?;
    Ok(())
}

/// Print `err` with the usage text and exit with status 2.
fn usage_error(err: config::ConfigError) -> ! {
    let kind = match err {
        config::ConfigError::Io { .. } => ErrorKind::Io,
        _ => ErrorKind::ValueValidation,
    };
    Cli::command().error(kind, err).exit()
}
