//! fleet-breaker service.
//!
//! # Architecture Overview
//!
//! ```text
//!     instance A ──┐                                   ┌── instance B
//!                  │   ┌───────────────────────────┐   │
//!   request ─▶ http ─▶ │ breaker middleware / Gate │ ◀─ http ◀─ request
//!                      └─────────────┬─────────────┘
//!                                    │ allow / on_success / on_failure
//!                                    ▼
//!                      ┌───────────────────────────┐
//!                      │   shared store (Redis)    │
//!                      │  open marker, counters,   │
//!                      │  recovery + probe leases  │
//!                      └───────────────────────────┘
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;

use fleet_breaker::config::{load_config, StoreBackend};
use fleet_breaker::observability::{logging, metrics};
use fleet_breaker::{BreakerRegistry, HttpServer, MemoryStore, RedisStore, SharedStore};

#[derive(Parser)]
#[command(name = "fleet-breaker", version, about = "Shared-state circuit breaker service")]
struct Args {
    /// Path to a TOML config file; defaults are used when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config(args.config.as_deref())?;

    logging::init_logging(&config.observability);
    tracing::info!("fleet-breaker v{} starting", env!("CARGO_PKG_VERSION"));

    tracing::info!(
        bind_address = %config.server.bind_address,
        store_backend = ?config.store.backend,
        failure_threshold = config.breaker.failure_threshold,
        fail_open = config.breaker.fail_open,
        half_open_mode = ?config.breaker.half_open_mode,
        overrides = config.breakers.len(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        // address validated by load_config
        let addr = config.observability.metrics_address.parse()?;
        metrics::init_metrics(addr)?;
    }

    let store: Arc<dyn SharedStore> = match config.store.backend {
        StoreBackend::Redis => Arc::new(RedisStore::connect(&config.store).await?),
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; breaker state is not shared between instances");
            Arc::new(MemoryStore::new())
        }
    };

    if let Err(err) = store.ping().await {
        tracing::warn!(error = %err, "Store ping failed at startup");
    }

    let registry = Arc::new(BreakerRegistry::from_config(Arc::clone(&store), &config));

    let listener = TcpListener::bind(&config.server.bind_address).await?;
    let server = HttpServer::new(config, registry);
    server.run(listener).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
