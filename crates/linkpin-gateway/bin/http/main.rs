mod cli;

use crate::cli::{AllocatorBackendArg, StoreBackendArg, CLI};
use anyhow::{anyhow, Context};
use clap::Parser;
use linkpin_allocator::{
    CounterSettings, InMemoryAllocator, RedisAllocator, SentinelAllocator, SentinelSettings,
};
use linkpin_codec::{Codec, CodecSettings};
use linkpin_core::{Allocator, MappingStore};
use linkpin_gateway::{App, AppState};
use linkpin_shortener::{Deadlines, ShortenerService};
use linkpin_storage::{CassandraRepository, CassandraSettings, InMemoryRepository, MySqlRepository};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    dotenvy::dotenv().ok();

    let config = CLI::parse();
    linkpin_telemetry::init(config.log_format)?;
    config.validate().map_err(|e| anyhow!(e))?;

    info!(
        listen_addr = %config.listen_addr,
        base_url = %config.base_url,
        allocator_backend = %config.allocator,
        store_backend = %config.store,
        "starting linkpin gateway"
    );

    let codec = Codec::new(
        CodecSettings::builder()
            .salt(config.salt.clone())
            .min_length(config.min_code_length)
            .build(),
    )
    .context("invalid codec settings")?;

    let allocator = build_allocator(&config).await?;
    let store = build_store(&config).await?;

    let deadlines = Deadlines::builder()
        .allocator(config.allocator_timeout())
        .store(config.store_timeout())
        .build();
    let shortener = ShortenerService::new(allocator, store, codec, config.base_url.clone(), deadlines);

    let listener = TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("failed to bind {}", config.listen_addr))?;
    info!(listen_addr = %listener.local_addr()?, "gateway listening");

    // dropping the router on return also stops the sentinel topology watcher
    axum::serve(listener, App::router(AppState::new(Arc::new(shortener))))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("gateway shut down");
    Ok(())
}

fn counter_settings(config: &CLI) -> CounterSettings {
    CounterSettings::builder()
        .key(config.counter_key.clone())
        .initial_value(config.counter_initial_value)
        .min_replica_acks(config.min_replica_acks)
        .build()
}

async fn build_allocator(config: &CLI) -> anyhow::Result<Arc<dyn Allocator>> {
    let allocator: Arc<dyn Allocator> = match config.allocator {
        AllocatorBackendArg::InMemory => {
            warn!("using the in-memory allocator, codes are not unique across instances");
            Arc::new(InMemoryAllocator::with_initial(config.counter_initial_value))
        }
        AllocatorBackendArg::Redis => {
            let url = config
                .redis_url
                .as_deref()
                .ok_or_else(|| anyhow!("redis url is required when the allocator is redis"))?;
            Arc::new(RedisAllocator::connect(url, counter_settings(config)).await?)
        }
        AllocatorBackendArg::Sentinel => {
            let settings = SentinelSettings::builder()
                .sentinels(config.sentinels.clone())
                .service_name(config.primary_name.clone())
                .password(config.redis_password.clone())
                .poll_interval(config.topology_poll_interval())
                .probe_timeout(config.allocator_timeout())
                .build();
            Arc::new(SentinelAllocator::connect(settings, counter_settings(config)).await?)
        }
    };
    Ok(allocator)
}

async fn build_store(config: &CLI) -> anyhow::Result<Arc<dyn MappingStore>> {
    let store: Arc<dyn MappingStore> = match config.store {
        StoreBackendArg::InMemory => {
            warn!("using the in-memory store, mappings are lost on restart");
            Arc::new(InMemoryRepository::new())
        }
        StoreBackendArg::Cassandra => {
            let settings = CassandraSettings::builder()
                .nodes(config.cassandra_nodes.clone())
                .keyspace(config.cassandra_keyspace.clone())
                .local_datacenter(config.cassandra_local_dc.clone())
                .replication_factor(config.cassandra_replication_factor)
                .read_consistency(config.cassandra_read_consistency)
                .write_consistency(config.cassandra_write_consistency)
                .request_timeout(config.store_timeout())
                .credentials(
                    config
                        .cassandra_username
                        .clone()
                        .zip(config.cassandra_password.clone()),
                )
                .build();
            Arc::new(CassandraRepository::connect(settings).await?)
        }
        StoreBackendArg::Mysql => {
            let dsn = config
                .mysql_dsn
                .as_deref()
                .ok_or_else(|| anyhow!("mysql dsn is required when the store is mysql"))?;
            Arc::new(MySqlRepository::connect(dsn, config.store_timeout()).await?)
        }
    };
    Ok(store)
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "failed to listen for ctrl-c");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("received ctrl-c, shutting down"),
        () = terminate => info!("received SIGTERM, shutting down"),
    }
}
