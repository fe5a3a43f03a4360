//! assetline: asset-management RPC service.
//!
//! Subscribes to the RPC subject as a queue-group member, serves health
//! probes and metrics on the admin port, and shuts down cleanly on
//! SIGINT/SIGTERM.
//!
//! ## Configuration
//! Every flag has an `ASSETLINE_*` environment fallback; see `--help`.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use clap::Parser;
use opentelemetry_sdk::propagation::TraceContextPropagator;
use tracing::info;

use assetline_server::admin::{AdminServer, BusReadiness};
use assetline_server::bus::BusConnection;
use assetline_server::config::{BusConfig, Cli};
use assetline_server::domain::{asset_routes, InMemoryAssetStore};
use assetline_server::lifecycle::Coordinator;
use assetline_server::rpc::{DispatcherConfig, MetricsLatencyRecorder, RpcDispatcher};
use assetline_server::telemetry::{init_logging, init_tracer, install_prometheus, TracerFlush};

const UPKEEP_INTERVAL: Duration = Duration::from_secs(5);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Cli::parse().into_config();

    init_logging(&config.log)?;
    let metrics = install_prometheus()?;

    // Histograms render from buckets that only drain on upkeep.
    let upkeep = metrics.clone();
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(UPKEEP_INTERVAL);
        loop {
            interval.tick().await;
            upkeep.run_upkeep();
        }
    });

    let (provider, tracer) = init_tracer(&config.service_name, &config.tracing)?;
    let bus = connect_bus(&config.bus).await?;

    let store = Arc::new(InMemoryAssetStore::new());
    let table = Arc::new(asset_routes(store.clone(), store));
    info!(kinds = ?table.kinds(), "dispatch table built");

    let dispatcher = Arc::new(RpcDispatcher::new(
        DispatcherConfig {
            subject: config.bus.subject.clone(),
            queue_group: config.bus.queue_group.clone(),
        },
        table,
        Arc::clone(&bus),
        tracer,
        Arc::new(TraceContextPropagator::new()),
        Arc::new(MetricsLatencyRecorder),
    ));
    let admin = Arc::new(AdminServer::new(
        config.admin.clone(),
        Arc::new(BusReadiness::new(Arc::clone(&bus))),
        metrics,
    ));

    let coordinator = Coordinator::builder(config.lifecycle.clone())
        .listener(dispatcher)
        .listener(admin)
        .closer(Arc::new(TracerFlush::new(provider)))
        .build();

    info!(
        service = %config.service_name,
        subject = %config.bus.subject,
        queue_group = %config.bus.queue_group,
        "assetline starting"
    );

    let cause = coordinator.start().await.context("assetline exited with error")?;
    info!(?cause, "assetline stopped");
    Ok(())
}

#[cfg(feature = "nats")]
async fn connect_bus(config: &BusConfig) -> anyhow::Result<Arc<dyn BusConnection>> {
    let bus = assetline_server::bus::NatsBus::connect(config).await?;
    Ok(Arc::new(bus))
}

#[cfg(not(feature = "nats"))]
async fn connect_bus(config: &BusConfig) -> anyhow::Result<Arc<dyn BusConnection>> {
    tracing::warn!(url = %config.url, "built without the nats feature; using the in-process bus");
    Ok(Arc::new(assetline_server::bus::InMemoryBus::new()))
}
