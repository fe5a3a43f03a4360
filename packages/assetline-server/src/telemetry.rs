//! Logging, metrics, and tracing initialization.

use std::time::Duration;

use async_trait::async_trait;
use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};
use opentelemetry::trace::TracerProvider as _;
use opentelemetry::{global, KeyValue};
use opentelemetry_sdk::propagation::TraceContextPropagator;
use opentelemetry_sdk::trace::{Builder, Config, Sampler, Tracer, TracerProvider};
use opentelemetry_sdk::Resource;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogConfig, LogFormat, TracingConfig};
use crate::lifecycle::Closer;
use crate::rpc::latency::DURATION_HISTOGRAM;

/// Bucket bounds (seconds) for the RPC latency histogram.
pub const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];

/// Installs the global `tracing` subscriber.
///
/// `ASSETLINE_LOG`, then `RUST_LOG`, override `config.level`.
///
/// # Errors
///
/// Fails if the level directive is invalid or a subscriber is already set.
pub fn init_logging(config: &LogConfig) -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_env("ASSETLINE_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .or_else(|_| EnvFilter::try_new(&config.level))?;

    let registry = tracing_subscriber::registry().with(filter);
    match config.format {
        LogFormat::Json => registry.with(fmt::layer().json()).try_init()?,
        LogFormat::Pretty => registry.with(fmt::layer()).try_init()?,
    }
    Ok(())
}

/// Exporter builder with explicit buckets for the latency histogram. Other
/// histograms, including the latency summary series, render as summaries.
///
/// # Errors
///
/// Returns `BuildError` if the bucket list is rejected.
pub fn prometheus_builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new().set_buckets_for_metric(
        Matcher::Full(DURATION_HISTOGRAM.to_string()),
        LATENCY_BUCKETS,
    )
}

/// Installs the Prometheus recorder globally and returns the render handle
/// served on the admin `/metrics` route.
///
/// # Errors
///
/// Fails if a global recorder is already installed.
pub fn install_prometheus() -> anyhow::Result<PrometheusHandle> {
    Ok(prometheus_builder()?.install_recorder()?)
}

/// Builds a parent-based tracer provider tagged with `service.name`.
///
/// With `config.otlp_endpoint` set, spans go to that collector through a
/// batch exporter; otherwise they stay in-process.
///
/// # Errors
///
/// Fails if the OTLP exporter cannot be built (e.g. a malformed endpoint).
pub fn build_tracer_provider(
    service_name: &str,
    config: &TracingConfig,
) -> anyhow::Result<TracerProvider> {
    let trace_config = Config::default()
        .with_sampler(Sampler::ParentBased(Box::new(Sampler::AlwaysOn)))
        .with_resource(Resource::new([KeyValue::new(
            "service.name",
            service_name.to_string(),
        )]));

    let builder = TracerProvider::builder().with_config(trace_config);
    let builder = match &config.otlp_endpoint {
        Some(endpoint) => with_otlp_exporter(builder, endpoint, config.export_timeout)?,
        None => builder,
    };
    Ok(builder.build())
}

#[cfg(feature = "otel")]
fn with_otlp_exporter(
    builder: Builder,
    endpoint: &str,
    timeout: Duration,
) -> anyhow::Result<Builder> {
    use anyhow::Context as _;
    use opentelemetry_otlp::WithExportConfig;

    let exporter = opentelemetry_otlp::SpanExporter::builder()
        .with_tonic()
        .with_endpoint(endpoint)
        .with_timeout(timeout)
        .build()
        .with_context(|| format!("failed to build OTLP exporter for {endpoint}"))?;

    tracing::info!(%endpoint, "exporting spans over OTLP/gRPC");
    Ok(builder.with_batch_exporter(exporter, opentelemetry_sdk::runtime::Tokio))
}

#[cfg(not(feature = "otel"))]
fn with_otlp_exporter(
    builder: Builder,
    endpoint: &str,
    _timeout: Duration,
) -> anyhow::Result<Builder> {
    tracing::warn!(%endpoint, "built without the otel feature; spans are not exported");
    Ok(builder)
}

/// Builds the tracer provider, registers it and the W3C propagator globally,
/// and returns the provider with a tracer named after the service.
///
/// # Errors
///
/// See [`build_tracer_provider`].
pub fn init_tracer(
    service_name: &str,
    config: &TracingConfig,
) -> anyhow::Result<(TracerProvider, Tracer)> {
    global::set_text_map_propagator(TraceContextPropagator::new());

    let provider = build_tracer_provider(service_name, config)?;
    global::set_tracer_provider(provider.clone());

    let tracer = provider.tracer(service_name.to_string());
    Ok((provider, tracer))
}

/// Shuts the tracer provider down during process shutdown, flushing any
/// spans still queued for export.
pub struct TracerFlush {
    provider: TracerProvider,
}

impl TracerFlush {
    #[must_use]
    pub fn new(provider: TracerProvider) -> Self {
        Self { provider }
    }
}

#[async_trait]
impl Closer for TracerFlush {
    fn name(&self) -> &str {
        "tracer"
    }

    async fn close(&self) -> anyhow::Result<()> {
        let provider = self.provider.clone();
        // Shutdown flushes span processors synchronously.
        tokio::task::spawn_blocking(move || provider.shutdown()).await??;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use opentelemetry::trace::{Span as _, Tracer as _};

    use super::*;

    #[test]
    fn prometheus_builder_accepts_buckets() {
        assert!(prometheus_builder().is_ok());
    }

    #[test]
    fn invalid_level_is_rejected() {
        let config = LogConfig {
            level: "assetline=bogus".to_string(),
            format: LogFormat::Pretty,
        };
        if std::env::var_os("ASSETLINE_LOG").is_none() && std::env::var_os("RUST_LOG").is_none() {
            assert!(init_logging(&config).is_err());
        }
    }

    #[tokio::test]
    async fn tracer_flush_shuts_provider_down() {
        let provider = TracerProvider::builder().build();
        let mut span = provider.tracer("flush-test").start("work");
        assert!(span.span_context().is_valid());
        span.end();

        TracerFlush::new(provider).close().await.unwrap();
    }

    #[test]
    fn provider_without_endpoint_traces_locally() {
        let provider =
            build_tracer_provider("asset-service", &TracingConfig::default()).unwrap();
        let span = provider.tracer("local").start("work");
        assert!(span.span_context().is_valid());
    }

    #[cfg(feature = "otel")]
    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn otlp_endpoint_attaches_batch_exporter() {
        let config = TracingConfig {
            otlp_endpoint: Some("http://127.0.0.1:4317".to_string()),
            ..TracingConfig::default()
        };
        let provider = build_tracer_provider("asset-service", &config).unwrap();

        TracerFlush::new(provider).close().await.unwrap();
    }
}
