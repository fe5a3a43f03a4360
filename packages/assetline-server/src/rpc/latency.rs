//! Latency instrumentation for RPC handlers.
//!
//! `LatencyLayer` wraps a handler service and reports one observation per
//! call to a [`LatencyRecorder`]. The production recorder feeds two series
//! through the `metrics` facade: a bucketed histogram and a summary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::{Duration, Instant};

use serde_json::Value;
use tower::{Layer, Service};

use super::table::{HandlerError, RpcRequest};

/// Histogram series (explicit buckets configured by the exporter).
pub const DURATION_HISTOGRAM: &str = "rpc_request_duration_seconds";
/// Summary series (rendered with quantiles by the exporter).
pub const DURATION_SUMMARY: &str = "rpc_request_duration_summary_seconds";

/// Sink for per-operation latency observations.
pub trait LatencyRecorder: Send + Sync {
    fn record(&self, op: &str, success: bool, elapsed: Duration);
}

/// Records into [`DURATION_HISTOGRAM`] and [`DURATION_SUMMARY`], labelled by
/// `op` and `success`.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsLatencyRecorder;

impl LatencyRecorder for MetricsLatencyRecorder {
    fn record(&self, op: &str, success: bool, elapsed: Duration) {
        let success = if success { "true" } else { "false" };
        let secs = elapsed.as_secs_f64();
        metrics::histogram!(DURATION_HISTOGRAM, "op" => op.to_string(), "success" => success)
            .record(secs);
        metrics::histogram!(DURATION_SUMMARY, "op" => op.to_string(), "success" => success)
            .record(secs);
    }
}

// ---------------------------------------------------------------------------
// LatencyLayer
// ---------------------------------------------------------------------------

/// Tower layer that times each handler call.
#[derive(Clone)]
pub struct LatencyLayer {
    recorder: Arc<dyn LatencyRecorder>,
}

impl LatencyLayer {
    #[must_use]
    pub fn new(recorder: Arc<dyn LatencyRecorder>) -> Self {
        Self { recorder }
    }
}

impl<S> Layer<S> for LatencyLayer {
    type Service = LatencyService<S>;

    fn layer(&self, inner: S) -> Self::Service {
        LatencyService {
            inner,
            recorder: Arc::clone(&self.recorder),
        }
    }
}

// ---------------------------------------------------------------------------
// LatencyService
// ---------------------------------------------------------------------------

#[derive(Clone)]
pub struct LatencyService<S> {
    inner: S,
    recorder: Arc<dyn LatencyRecorder>,
}

impl<S> Service<RpcRequest> for LatencyService<S>
where
    S: Service<RpcRequest, Response = Value, Error = HandlerError> + Send,
    S::Future: Send + 'static,
{
    type Response = Value;
    type Error = HandlerError;
    type Future = Pin<Box<dyn Future<Output = Result<Value, HandlerError>> + Send>>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: RpcRequest) -> Self::Future {
        let op = req.kind.clone();
        let recorder = Arc::clone(&self.recorder);

        // Start before `call` so synchronous work in the handler is counted.
        let start = Instant::now();
        let fut = self.inner.call(req);

        Box::pin(async move {
            let result = fut.await;
            recorder.record(&op, result.is_ok(), start.elapsed());
            result
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
