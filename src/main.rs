//! Multi-protocol reverse proxy.
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────────────┐
//!                        │                   REVERSE PROXY                       │
//!                        │                                                       │
//!   Client Request       │  ┌─────────┐    ┌──────────────┐    ┌─────────────┐   │
//!   ─────────────────────┼─▶│  http   │───▶│ BalancerNode │───▶│TransportNode│───┼──▶ HTTP/3
//!                        │  │ server  │    │  (dispatch)  │    │   http3     │   │
//!                        │  └─────────┘    │              │    └─────────────┘   │
//!                        │                 │              │    ┌─────────────┐   │
//!                        │                 │              │───▶│TransportNode│───┼──▶ HTTP/2
//!                        │                 └──────┬───────┘    │   http2     │   │
//!                        │                        │            └─────────────┘   │
//!                        │                 ┌──────▼───────┐                      │
//!                        │                 │HealthScheduler│ active probes        │
//!                        │                 └──────────────┘                      │
//!                        │                                                       │
//!                        │  config · observability · lifecycle · admin           │
//!                        └──────────────────────────────────────────────────────┘
//! ```

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tokio::net::TcpListener;

use h3_reverse_proxy::admin::{setup_admin_router, AdminState};
use h3_reverse_proxy::config::{read_config, validate_config, ConfigError, ProxyConfig};
use h3_reverse_proxy::lifecycle::{build_balancer, signals, StartupError};
use h3_reverse_proxy::net::DefaultTransports;
use h3_reverse_proxy::observability::{logging, metrics};
use h3_reverse_proxy::{HttpServer, Shutdown, Upstream};

#[derive(Parser, Debug)]
#[command(name = "h3-reverse-proxy")]
#[command(about = "Reverse proxy balancing HTTP/3 and HTTP/2 to one upstream", long_about = None)]
struct Args {
    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Upstream URL, e.g. "https://workers.cloudflare.com/".
    #[arg(long)]
    upstream_server: Option<String>,

    /// Front-end listen address.
    #[arg(long)]
    listen: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long)]
    log_level: Option<String>,
}

fn load(args: &Args) -> Result<ProxyConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => read_config(path)?,
        None => ProxyConfig::default(),
    };

    if let Some(upstream) = &args.upstream_server {
        config.upstream.url = upstream.clone();
    }
    if let Some(listen) = &args.listen {
        config.listener.bind_address = listen.clone();
    }
    if let Some(level) = &args.log_level {
        config.observability.log_level = level.clone();
    }

    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load(&args)?;

    logging::init_logging(&config.observability.log_level);
    tracing::info!("h3-reverse-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        upstream = %config.upstream.url,
        bind_address = %config.listener.bind_address,
        active_checks = config.health_check.active_enabled,
        passive_checks = config.health_check.passive_enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse::<SocketAddr>() {
            Ok(addr) => metrics::init_metrics(addr)?,
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let transports = DefaultTransports::new(
        Duration::from_secs(config.timeouts.connect_secs),
        Duration::from_secs(config.timeouts.request_secs),
    );
    let balancer = Arc::new(build_balancer(&config, &transports)?);
    balancer.start_health_checks();

    let shutdown = Shutdown::new();
    signals::spawn_signal_handler(shutdown.clone());

    if config.admin.enabled {
        let admin = setup_admin_router(AdminState {
            balancer: Arc::clone(&balancer),
            api_key: Arc::from(config.admin.api_key.as_str()),
        });
        let listener = bind(&config.admin.bind_address).await?;
        tracing::info!(address = %config.admin.bind_address, "Admin API listening");
        let wait = shutdown.wait();
        tokio::spawn(async move {
            if let Err(e) = axum::serve(listener, admin).with_graceful_shutdown(wait).await {
                tracing::error!(error = %e, "Admin API failed");
            }
        });
    }

    let listener = bind(&config.listener.bind_address).await?;
    let server = HttpServer::new(&config, Arc::clone(&balancer));
    server.run(listener, shutdown).await?;

    balancer.close()?;
    tracing::info!("Shutdown complete");
    Ok(())
}

async fn bind(address: &str) -> Result<TcpListener, StartupError> {
    TcpListener::bind(address)
        .await
        .map_err(|source| StartupError::Bind {
            address: address.to_string(),
            source,
        })
}
