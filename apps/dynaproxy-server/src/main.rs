//! dynaproxy server: an HTTP proxy in front of a DynamoDB-style table store.
//!
//! Every operation is served on its own path (`/GetItem`, `/GetItem/`) and,
//! for stock SDK clients, on `/` keyed by the `X-Amz-Target` header.
//!
//! # Usage
//!
//! ```text
//! DYNAPROXY_BACKEND_URL=http://localhost:8000 dynaproxy-server
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `DYNAPROXY_PORTS` | `12333,12334` | Candidate listen ports, tried in order |
//! | `DYNAPROXY_BIND_HOST` | `0.0.0.0` | Bind host |
//! | `DYNAPROXY_BACKEND_URL` | `http://localhost:8000` | Table store endpoint |
//! | `DYNAPROXY_BACKEND_TIMEOUT_SECS` | `30` | Per-call backend timeout |
//! | `DYNAPROXY_ENABLE_DELETE_TABLE` | `false` | Install `DeleteTable` endpoints |
//! | `DYNAPROXY_STATUS_POLL_TRIES` | `20` | Default `/StatusTable/` polls |
//! | `DYNAPROXY_STATUS_POLL_INTERVAL_MS` | `1000` | Pause between polls |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use dynaproxy_core::{ProxyConfig, RuntimeInfo};
use dynaproxy_http::{BoundServer, HttpBackend, ProxyHttpConfig, ProxyHttpService};

/// Server version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to `LOG_LEVEL`.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    Ok(())
}

/// Read the log level from the environment.
fn log_level() -> String {
    std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string())
}

/// Request `/Status` from a running server.
///
/// Healthy means a 200 response reporting the `ready` state.
async fn run_health_check(addr: &str) -> Result<()> {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    let stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("cannot connect to {addr}"))?;

    let (mut reader, mut writer) = stream.into_split();

    let request =
        format!("GET /Status?compact=1 HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n\r\n");
    writer.write_all(request.as_bytes()).await?;
    writer.shutdown().await?;

    let mut response = String::new();
    reader.read_to_string(&mut response).await?;

    if response.contains("200 OK") && response.contains("\"ready\"") {
        Ok(())
    } else {
        anyhow::bail!("unhealthy response from {addr}")
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Handle --health-check flag for Docker HEALTHCHECK.
    if std::env::args().any(|a| a == "--health-check") {
        let config = ProxyConfig::from_env();
        let port = config.ports.first().copied().unwrap_or_default();
        let healthy = run_health_check(&format!("127.0.0.1:{port}")).await.is_ok();
        std::process::exit(i32::from(!healthy));
    }

    init_tracing(&log_level())?;
    let config = ProxyConfig::from_env();

    info!(
        version = VERSION,
        backend = %config.backend_url,
        ports = ?config.ports,
        enable_delete_table = config.enable_delete_table,
        "starting dynaproxy",
    );

    let backend = HttpBackend::new(config.backend_url.clone(), config.backend_timeout)
        .context("failed to create backend client")?;
    let runtime = Arc::new(RuntimeInfo::new());
    let service = ProxyHttpService::new(
        Arc::new(backend),
        Arc::clone(&runtime),
        ProxyHttpConfig::from(&config),
    );
    info!(routes = service.routes().len(), "routes installed");

    let server = BoundServer::bind(&config.bind_host, &config.ports, service)
        .await
        .context("failed to start listener")?;
    info!(addr = %server.local_addr(), "dynaproxy listening");

    server
        .run(async {
            tokio::signal::ctrl_c().await.ok();
            info!("received shutdown signal");
        })
        .await;

    info!(state = runtime.gate.state().as_str(), "exiting");
    Ok(())
}
