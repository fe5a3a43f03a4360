//! Admin HTTP listener: health probes and Prometheus metrics.
//!
//! Binding happens in [`Listener::bind`] so port conflicts and unreadable TLS
//! material fail startup before any traffic is accepted. Serving starts in
//! [`Listener::serve`], which also flips the listener to ready.

pub mod handlers;
pub mod middleware;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::routing::get;
use axum::Router;
use axum_server::tls_rustls::RustlsConfig;
use metrics_exporter_prometheus::PrometheusHandle;
use parking_lot::Mutex;
use tokio::net::TcpListener;
use tracing::info;

use self::handlers::{health_handler, liveness_handler, metrics_handler, readiness_handler};
use self::middleware::build_http_layers;
use crate::bus::BusConnection;
use crate::config::AdminConfig;
use crate::lifecycle::{wait_for_shutdown, Listener, ShutdownController};

// ---------------------------------------------------------------------------
// Readiness
// ---------------------------------------------------------------------------

/// External readiness input for `/ready`, consulted on every probe.
pub trait ReadinessProbe: Send + Sync {
    fn is_ready(&self) -> bool;
}

/// Always ready. For deployments with no external dependency to watch.
pub struct AlwaysReady;

impl ReadinessProbe for AlwaysReady {
    fn is_ready(&self) -> bool {
        true
    }
}

/// Ready while the bus connection is up.
pub struct BusReadiness {
    bus: Arc<dyn BusConnection>,
}

impl BusReadiness {
    #[must_use]
    pub fn new(bus: Arc<dyn BusConnection>) -> Self {
        Self { bus }
    }
}

impl ReadinessProbe for BusReadiness {
    fn is_ready(&self) -> bool {
        self.bus.is_connected()
    }
}

// ---------------------------------------------------------------------------
// Shared handler state
// ---------------------------------------------------------------------------

/// State shared by the admin handlers.
#[derive(Clone)]
pub struct AppState {
    pub shutdown: Arc<ShutdownController>,
    pub readiness: Arc<dyn ReadinessProbe>,
    pub metrics: PrometheusHandle,
    pub start_time: Instant,
}

// ---------------------------------------------------------------------------
// AdminServer
// ---------------------------------------------------------------------------

/// The admin HTTP listener.
pub struct AdminServer {
    config: AdminConfig,
    readiness: Arc<dyn ReadinessProbe>,
    metrics: PrometheusHandle,
    extra_routes: Router,
    shutdown: Arc<ShutdownController>,
    listener: Mutex<Option<TcpListener>>,
    tls: Mutex<Option<RustlsConfig>>,
    local_addr: Mutex<Option<SocketAddr>>,
    serving: AtomicBool,
    start_time: Instant,
}

impl AdminServer {
    #[must_use]
    pub fn new(
        config: AdminConfig,
        readiness: Arc<dyn ReadinessProbe>,
        metrics: PrometheusHandle,
    ) -> Self {
        Self {
            config,
            readiness,
            metrics,
            extra_routes: Router::new(),
            shutdown: Arc::new(ShutdownController::new()),
            listener: Mutex::new(None),
            tls: Mutex::new(None),
            local_addr: Mutex::new(None),
            serving: AtomicBool::new(false),
            start_time: Instant::now(),
        }
    }

    /// Mounts application routes on the admin socket alongside the probes.
    #[must_use]
    pub fn with_routes(mut self, routes: Router) -> Self {
        self.extra_routes = self.extra_routes.merge(routes);
        self
    }

    /// Address the socket was bound to, once `bind` has succeeded.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *self.local_addr.lock()
    }

    pub fn shutdown_controller(&self) -> &Arc<ShutdownController> {
        &self.shutdown
    }

    /// Builds the full router: probes, metrics, any extra routes, and the
    /// middleware stack.
    pub fn build_router(&self) -> Router {
        let state = AppState {
            shutdown: Arc::clone(&self.shutdown),
            readiness: Arc::clone(&self.readiness),
            metrics: self.metrics.clone(),
            start_time: self.start_time,
        };

        Router::new()
            .route("/live", get(liveness_handler))
            .route("/ready", get(readiness_handler))
            .route("/health", get(health_handler))
            .route("/metrics", get(metrics_handler))
            .with_state(state)
            .merge(self.extra_routes.clone())
            .layer(build_http_layers(&self.config))
    }
}

#[async_trait]
impl Listener for AdminServer {
    fn name(&self) -> &str {
        "admin"
    }

    async fn bind(&self) -> anyhow::Result<()> {
        if let Some(tls) = &self.config.tls {
            let rustls = RustlsConfig::from_pem_file(&tls.cert_path, &tls.key_path)
                .await
                .map_err(|e| anyhow!("failed to load TLS certificates: {e}"))?;
            *self.tls.lock() = Some(rustls);
        }

        let addr = format!("{}:{}", self.config.host, self.config.port);
        let listener = TcpListener::bind(&addr).await?;
        let local = listener.local_addr()?;
        info!(addr = %local, tls = self.config.tls.is_some(), "admin listener bound");

        *self.local_addr.lock() = Some(local);
        *self.listener.lock() = Some(listener);
        Ok(())
    }

    async fn serve(&self) -> anyhow::Result<()> {
        let listener = self
            .listener
            .lock()
            .take()
            .ok_or_else(|| anyhow!("admin listener served before bind"))?;
        let tls = self.tls.lock().take();
        let router = self.build_router();

        let mut rx = self.shutdown.shutdown_receiver();
        let signal = async move { wait_for_shutdown(&mut rx).await };

        self.serving.store(true, Ordering::SeqCst);
        self.shutdown.set_ready();

        let result = match tls {
            Some(rustls) => serve_tls(listener, router, rustls, signal).await,
            None => serve_plain(listener, router, signal).await,
        };
        self.shutdown.mark_serve_exited();
        result
    }

    async fn stop(&self, deadline: tokio::time::Instant) -> anyhow::Result<()> {
        self.shutdown.trigger_shutdown();
        // Releases the socket if serve never ran.
        drop(self.listener.lock().take());

        if self.serving.load(Ordering::SeqCst) && !self.shutdown.wait_serve_exited(deadline).await {
            anyhow::bail!("admin listener did not drain before the deadline");
        }
        info!("admin listener stopped");
        Ok(())
    }
}

async fn serve_plain(
    listener: TcpListener,
    router: Router,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown)
        .await?;
    Ok(())
}

/// Serves TLS via `axum-server`, reusing the socket bound in `bind`.
async fn serve_tls(
    listener: TcpListener,
    router: Router,
    rustls: RustlsConfig,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let std_listener = listener.into_std()?;
    let handle = axum_server::Handle::new();
    let shutdown_handle = handle.clone();

    tokio::spawn(async move {
        shutdown.await;
        shutdown_handle.graceful_shutdown(None);
    });

    axum_server::from_tcp_rustls(std_listener, rustls)
        .handle(handle)
        .serve(router.into_make_service())
        .await?;
    Ok(())
}
