//! Forward Proxy
//!
//! # Architecture Overview
//!
//! ```text
//!                        ┌──────────────────────────────────────────────┐
//!                        │                FORWARD PROXY                 │
//!                        │                                              │
//!   Client Request       │  ┌──────────┐   ┌───────────┐   ┌─────────┐  │
//!   ─────────────────────┼─▶│  server  │──▶│ sanitize  │──▶│ request │  │
//!   (absolute-form URI)  │  │ handler  │   │ hop-by-hop│   │ builder │  │
//!                        │  └──────────┘   └───────────┘   └────┬────┘  │
//!                        │                                      │       │
//!                        │                                      ▼       │
//!   Client Response      │  ┌──────────┐   ┌───────────┐   ┌─────────┐  │
//!   ◀────────────────────┼──│ response │◀──│ sanitize  │◀──│dispatch │◀─┼── Origin
//!                        │  │  relay   │   │ hop-by-hop│   │         │  │   Server
//!                        │  └──────────┘   └───────────┘   └─────────┘  │
//!                        │                                              │
//!                        │   config · logging · metrics · lifecycle     │
//!                        └──────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use forward_proxy::config::{load_config, ProxyConfig};
use forward_proxy::lifecycle;
use forward_proxy::observability::logging::init_logging;

#[derive(Parser)]
#[command(name = "forward-proxy")]
#[command(about = "Transparent forward HTTP proxy", long_about = None)]
struct Cli {
    /// Path to a TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Listen address, overriding the configuration.
    #[arg(short, long)]
    bind: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => load_config(path)?,
        None => ProxyConfig::default(),
    };
    if let Some(bind) = cli.bind {
        config.listener.bind_address = bind;
    }

    init_logging(&config.observability)?;

    tracing::info!("forward-proxy v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        bind_address = %config.listener.bind_address,
        request_timeout_secs = ?config.upstream.request_timeout_secs,
        multi_value = ?config.headers.multi_value,
        "Configuration loaded"
    );

    lifecycle::start(config).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
