// `spike-server serve`: run the HTTP API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Args;

use spike::internal_adapter::ConcreteInternalAdapter;
use spike_axum::Spike;
use spike_core::db::adapter::Adapter;
use spike_core::db::counter_store::{CounterStore, MemoryCounterStore};
use spike_core::env::{init_logger, is_production};
use spike_gateway::HttpPaymentGateway;
use spike_memory::MemoryAdapter;
use spike_mongodb::MongoAdapter;
use spike_redis::RedisCounterStore;

use crate::config::{DatabaseBackend, ServerConfig};

/// How often in-process rate-limit counters are pruned.
const COUNTER_CLEANUP_PERIOD: Duration = Duration::from_secs(60);

#[derive(Args)]
pub struct ServeArgs {
    /// Path to the configuration file (default: ./spike.toml)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override [server].port
    #[arg(short, long)]
    pub port: Option<u16>,
}

pub fn run(args: ServeArgs) -> anyhow::Result<()> {
    init_logger();
    let runtime = tokio::runtime::Runtime::new().context("cannot start the async runtime")?;
    runtime.block_on(serve(args))
}

async fn serve(args: ServeArgs) -> anyhow::Result<()> {
    let mut config = ServerConfig::load(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.server.port = port;
    }
    let production = is_production();
    config.validate(production)?;

    let document_store: Arc<dyn Adapter> = match config.database.backend {
        DatabaseBackend::Memory => {
            if production {
                tracing::warn!("Using the in-memory document store; data is lost on restart");
            }
            Arc::new(MemoryAdapter::new())
        }
        DatabaseBackend::Mongodb => {
            let uri = config.database.uri.as_deref().unwrap_or_default();
            let mongo = MongoAdapter::connect(uri, &config.database.name).await?;
            mongo.ping().await.context("MongoDB is not reachable")?;
            tracing::info!(database = %config.database.name, "Connected to MongoDB");
            Arc::new(mongo)
        }
    };

    let counters: Arc<dyn CounterStore> = match &config.redis.url {
        Some(url) => {
            let store = RedisCounterStore::connect(url, config.redis.prefix.as_deref())
                .await
                .context("Redis is not reachable")?;
            tracing::info!(prefix = %store.prefix, "Connected to Redis");
            Arc::new(store)
        }
        None => {
            tracing::info!("Using in-process rate limit counters");
            let store = MemoryCounterStore::new();
            store.spawn_cleanup(COUNTER_CLEANUP_PERIOD);
            Arc::new(store)
        }
    };

    // validate() guarantees the section is present.
    let gateway_options = config.gateway.clone().context("[gateway] section is required")?;
    let gateway = Arc::new(HttpPaymentGateway::new(gateway_options)?);

    let spike = Spike::init(
        config.options,
        Arc::new(ConcreteInternalAdapter::new(document_store)),
        counters,
        gateway,
    )
    .await?;
    let app = if config.server.cors {
        spike.router_with_cors()
    } else {
        spike.router()
    };

    let listener = tokio::net::TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("cannot bind {}:{}", config.server.host, config.server.port))?;
    tracing::info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("server error")?;

    tracing::info!("Shut down");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Cannot listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
