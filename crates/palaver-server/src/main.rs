//! Palaver server binary.
//!
//! # Usage
//!
//! ```bash
//! # Start on the default port
//! palaver-server --bind 0.0.0.0:7429
//!
//! # Tighter history retention, faster sweeps
//! palaver-server --retention 200 --janitor-period-secs 10
//! ```

use std::{sync::Arc, time::Duration};

use clap::Parser;
use palaver_core::EngineConfig;
use palaver_server::{SelfAssertedResolver, Server, ServerRuntimeConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Chat room coordination server
#[derive(Parser, Debug)]
#[command(name = "palaver-server")]
#[command(about = "Chat room coordination server")]
#[command(version)]
struct Args {
    /// Address to bind to
    #[arg(short, long, default_value = "0.0.0.0:7429")]
    bind: String,

    /// Allow joins without credentials (guest identities)
    #[arg(long, default_value = "true", action = clap::ArgAction::Set)]
    allow_anonymous: bool,

    /// Messages retained per room after a janitor sweep
    #[arg(long, default_value = "1000")]
    retention: usize,

    /// Seconds between janitor sweeps
    #[arg(long, default_value = "60")]
    janitor_period_secs: u64,

    /// Maximum concurrent connections
    #[arg(long, default_value = "10000")]
    max_connections: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    tracing::info!("palaver server starting");
    tracing::info!("binding to {}", args.bind);

    if args.allow_anonymous {
        tracing::warn!("anonymous joins enabled: unauthenticated clients get guest identities");
    }

    let config = ServerRuntimeConfig {
        bind_address: args.bind,
        engine: EngineConfig {
            allow_anonymous_join: args.allow_anonymous,
            retention_limit: args.retention,
            max_connections: args.max_connections,
        },
        janitor_period: Duration::from_secs(args.janitor_period_secs),
    };

    let server = Server::bind(config, Arc::new(SelfAssertedResolver)).await?;

    tracing::info!("server listening on {}", server.local_addr()?);

    server.run().await?;

    Ok(())
}
