//! RPC dispatcher: serves envelopes arriving on a queue-group subscription.
//!
//! Each message is handled on its own task:
//! 1. decode the envelope (undecodable messages are logged and dropped)
//! 2. recover the parent span from the carrier and start a server span
//! 3. look up the handler for `kind` (unknown kinds are logged and dropped)
//! 4. call the handler through the latency layer
//! 5. publish the encoded reply when the message carries a reply subject
//!
//! Per-message failures never reach the caller of `serve`; only subscription
//! and connection errors do.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use assetline_core::{carrier, envelope, Envelope};
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::StreamExt;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::trace::{SpanKind, Status, TraceContextExt, Tracer as _};
use opentelemetry::{Context, KeyValue};
use opentelemetry_sdk::trace::Tracer;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::time::Instant;
use tower::{Layer, ServiceExt};
use tracing::{debug, error, info, warn, Instrument};

use super::latency::{LatencyLayer, LatencyRecorder};
use super::table::{DispatchTable, HandlerError, RpcRequest};
use crate::bus::{BusConnection, BusError, BusMessage, Subscription};
use crate::lifecycle::{wait_for_shutdown, Listener, ShutdownController};

/// Subject and queue group the dispatcher serves.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    pub subject: String,
    pub queue_group: String,
}

#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("failed to subscribe: {0}")]
    Subscribe(#[source] BusError),
    #[error("serve() called before start()")]
    NotStarted,
    #[error("subscription on {subject} closed unexpectedly")]
    SubscriptionClosed { subject: String },
    #[error("failed to unsubscribe: {0}")]
    Unsubscribe(#[source] BusError),
    #[error("failed to close bus connection: {0}")]
    Close(#[source] BusError),
}

struct Inner {
    config: DispatcherConfig,
    table: Arc<DispatchTable>,
    bus: Arc<dyn BusConnection>,
    tracer: Tracer,
    propagator: Arc<dyn TextMapPropagator + Send + Sync>,
    latency: LatencyLayer,
    shutdown: ShutdownController,
    subscription: Mutex<Option<Box<dyn Subscription>>>,
    serving: AtomicBool,
}

/// Serves RPC requests from the bus. See the module docs for the per-message
/// pipeline.
///
/// The dispatcher owns the bus connection's shutdown: `stop` closes it once
/// in-flight replies have been published.
pub struct RpcDispatcher {
    inner: Arc<Inner>,
}

impl RpcDispatcher {
    #[must_use]
    pub fn new(
        config: DispatcherConfig,
        table: Arc<DispatchTable>,
        bus: Arc<dyn BusConnection>,
        tracer: Tracer,
        propagator: Arc<dyn TextMapPropagator + Send + Sync>,
        recorder: Arc<dyn LatencyRecorder>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                table,
                bus,
                tracer,
                propagator,
                latency: LatencyLayer::new(recorder),
                shutdown: ShutdownController::new(),
                subscription: Mutex::new(None),
                serving: AtomicBool::new(false),
            }),
        }
    }

    /// Shared shutdown controller (health state and in-flight count).
    #[must_use]
    pub fn shutdown_controller(&self) -> &ShutdownController {
        &self.inner.shutdown
    }

    /// Subscribes to the configured subject as a queue-group member.
    ///
    /// # Errors
    ///
    /// Returns `Subscribe` if the bus rejects the subscription. No retry.
    pub async fn start(&self) -> Result<(), DispatchError> {
        let config = &self.inner.config;
        let subscription = self
            .inner
            .bus
            .queue_subscribe(&config.subject, &config.queue_group)
            .await
            .map_err(DispatchError::Subscribe)?;
        *self.inner.subscription.lock() = Some(subscription);

        info!(
            subject = %config.subject,
            queue_group = %config.queue_group,
            broker = self.inner.bus.broker(),
            kinds = self.inner.table.len(),
            "rpc dispatcher subscribed"
        );
        Ok(())
    }

    /// Runs the delivery loop until `stop` is called.
    ///
    /// # Errors
    ///
    /// Returns `NotStarted` without a prior `start`, and `SubscriptionClosed`
    /// if the subscription ends without a stop request.
    pub async fn serve(&self) -> Result<(), DispatchError> {
        // `serving` flips under the subscription lock so a concurrent `stop`
        // either finds the subscription or waits for this loop to exit.
        let mut subscription = {
            let mut slot = self.inner.subscription.lock();
            let Some(subscription) = slot.take() else {
                // Already torn down by a `stop` that ran first.
                if self.inner.shutdown.is_shutdown_triggered() {
                    return Ok(());
                }
                return Err(DispatchError::NotStarted);
            };
            self.inner.serving.store(true, Ordering::SeqCst);
            subscription
        };
        let mut shutdown = self.inner.shutdown.shutdown_receiver();
        self.inner.shutdown.set_ready();

        let result = loop {
            tokio::select! {
                biased;
                () = wait_for_shutdown(&mut shutdown) => break Ok(()),
                next = subscription.next() => match next {
                    Some(msg) => self.spawn_handler(msg),
                    None => break Err(DispatchError::SubscriptionClosed {
                        subject: self.inner.config.subject.clone(),
                    }),
                },
            }
        };

        // Hand the subscription back so `stop` can unsubscribe it.
        *self.inner.subscription.lock() = Some(subscription);
        self.inner.shutdown.mark_serve_exited();
        debug!("rpc delivery loop exited");
        result
    }

    /// Stops delivery, unsubscribes, waits for in-flight messages until
    /// `deadline`, then closes the bus connection.
    ///
    /// Unsubscribe and close are both attempted regardless of earlier
    /// failures.
    ///
    /// # Errors
    ///
    /// Returns the last failure: `Close` if closing failed, otherwise
    /// `Unsubscribe`.
    pub async fn stop(&self, deadline: Instant) -> Result<(), DispatchError> {
        let inner = &self.inner;
        inner.shutdown.trigger_shutdown();

        // Checked and taken under one lock so `serve` cannot claim the
        // subscription in between.
        let (serving, mut subscription) = {
            let mut slot = inner.subscription.lock();
            (inner.serving.load(Ordering::SeqCst), slot.take())
        };
        if serving {
            if !inner.shutdown.wait_serve_exited(deadline).await {
                warn!("rpc delivery loop did not exit before the deadline");
            }
            subscription = subscription.or_else(|| inner.subscription.lock().take());
        }

        let mut last_error = None;

        if let Some(mut subscription) = subscription {
            if let Err(e) = subscription.unsubscribe().await {
                error!(error = %e, subject = %inner.config.subject, "unsubscribe failed");
                last_error = Some(DispatchError::Unsubscribe(e));
            }
        }

        if !inner.shutdown.wait_for_drain(deadline).await {
            warn!(
                in_flight = inner.shutdown.in_flight_count(),
                "deadline reached with rpc messages still in flight"
            );
        }

        if let Err(e) = inner.bus.close().await {
            error!(error = %e, "closing bus connection failed");
            last_error = Some(DispatchError::Close(e));
        }

        info!(subject = %inner.config.subject, "rpc dispatcher stopped");
        last_error.map_or(Ok(()), Err)
    }

    fn spawn_handler(&self, msg: BusMessage) {
        let guard = self.inner.shutdown.in_flight_guard();
        let inner = Arc::clone(&self.inner);
        let span = tracing::debug_span!("rpc_message", subject = %msg.subject);
        tokio::spawn(
            async move {
                let _guard = guard;
                inner.handle_message(msg).await;
            }
            .instrument(span),
        );
    }
}

impl Inner {
    async fn handle_message(&self, msg: BusMessage) {
        let envelope = match envelope::decode(&msg.payload) {
            Ok(envelope) => envelope,
            Err(e) => {
                error!(subject = %msg.subject, error = %e, "dropping undecodable message");
                return;
            }
        };

        let parent = match carrier::deserialize(self.propagator.as_ref(), &envelope.span) {
            Ok(Some(cx)) => cx,
            Ok(None) => Context::new(),
            Err(e) => {
                warn!(kind = %envelope.kind, error = %e, "ignoring invalid span carrier");
                Context::new()
            }
        };

        let reply = msg.reply.unwrap_or_default();
        let span = self
            .tracer
            .span_builder(envelope.kind.clone())
            .with_kind(SpanKind::Server)
            .with_attributes(vec![
                KeyValue::new("broker", self.bus.broker()),
                KeyValue::new("subject", msg.subject),
                KeyValue::new("reply", reply.clone()),
            ])
            .start_with_context(&self.tracer, &parent);
        let cx = parent.with_span(span);

        let Some(handler) = self.table.get(&envelope.kind) else {
            warn!(kind = %envelope.kind, "no handler for kind, dropping message");
            cx.span().set_status(Status::error("unknown kind"));
            cx.span().end();
            return;
        };

        let kind = envelope.kind;
        let request = RpcRequest {
            cx: cx.clone(),
            kind: kind.clone(),
            fields: envelope.fields,
        };
        let outcome = self.latency.layer(handler).oneshot(request).await;

        if let Err(e) = &outcome {
            error!(kind = %kind, error = %e, "handler failed");
            cx.span().set_status(Status::error(e.to_string()));
        }

        if !reply.is_empty() {
            if let Some(payload) = reply_payload(&kind, &outcome) {
                if let Err(e) = self.bus.publish(&reply, Bytes::from(payload)).await {
                    error!(kind = %kind, reply = %reply, error = %e, "failed to publish reply");
                }
            }
        }

        cx.span().end();
    }
}

/// Encodes the reply, falling back to an error reply if the handler's
/// response cannot be encoded.
fn reply_payload(kind: &str, outcome: &Result<Value, HandlerError>) -> Option<Vec<u8>> {
    match envelope::encode(kind, outcome) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            error!(kind, error = %e, "failed to encode reply");
            Envelope::failure(kind, e.to_string())
                .to_bytes()
                .inspect_err(|e| error!(kind, error = %e, "failed to encode error reply"))
                .ok()
        }
    }
}

#[async_trait]
impl Listener for RpcDispatcher {
    fn name(&self) -> &str {
        "rpc"
    }

    async fn bind(&self) -> anyhow::Result<()> {
        Ok(RpcDispatcher::start(self).await?)
    }

    async fn serve(&self) -> anyhow::Result<()> {
        Ok(RpcDispatcher::serve(self).await?)
    }

    async fn stop(&self, deadline: Instant) -> anyhow::Result<()> {
        Ok(RpcDispatcher::stop(self, deadline).await?)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
