//! Caller side of the RPC protocol.

use std::sync::Arc;
use std::time::Duration;

use assetline_core::{carrier, envelope, CarrierError, Envelope, EnvelopeError};
use bytes::Bytes;
use opentelemetry::propagation::TextMapPropagator;
use opentelemetry::Context;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;

use crate::bus::{BusConnection, BusError};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
    #[error(transparent)]
    Carrier(#[from] CarrierError),
    #[error(transparent)]
    Bus(#[from] BusError),
    #[error("no reply to {kind} within {timeout:?}")]
    Timeout { kind: String, timeout: Duration },
    #[error("reply kind {actual} does not match request kind {expected}")]
    KindMismatch { expected: String, actual: String },
    #[error("{kind} failed remotely: {message}")]
    Remote { kind: String, message: String },
}

/// Sends requests to a dispatcher serving `subject`.
#[derive(Clone)]
pub struct RpcClient {
    bus: Arc<dyn BusConnection>,
    propagator: Arc<dyn TextMapPropagator + Send + Sync>,
    subject: String,
    timeout: Duration,
}

impl RpcClient {
    #[must_use]
    pub fn new(
        bus: Arc<dyn BusConnection>,
        propagator: Arc<dyn TextMapPropagator + Send + Sync>,
        subject: impl Into<String>,
        timeout: Duration,
    ) -> Self {
        Self {
            bus,
            propagator,
            subject: subject.into(),
            timeout,
        }
    }

    fn request_bytes<Req: Serialize>(
        &self,
        cx: &Context,
        kind: &str,
        request: &Req,
    ) -> Result<Bytes, ClientError> {
        let span = carrier::serialize(self.propagator.as_ref(), cx)?;
        let bytes = Envelope::new(kind, request)?.with_span(span).to_bytes()?;
        Ok(Bytes::from(bytes))
    }

    /// Sends `request` as `kind` and waits for the typed reply.
    ///
    /// The span in `cx` becomes the parent of the server span.
    ///
    /// # Errors
    ///
    /// - `Timeout` if no reply arrives within the configured timeout
    /// - `Remote` if the reply carries an `error`
    /// - `KindMismatch` if the reply does not echo `kind`
    /// - `Bus`, `Envelope`, `Carrier` for transport and codec failures
    pub async fn call<Req, Resp>(
        &self,
        cx: &Context,
        kind: &str,
        request: &Req,
    ) -> Result<Resp, ClientError>
    where
        Req: Serialize,
        Resp: DeserializeOwned,
    {
        let payload = self.request_bytes(cx, kind, request)?;

        let reply = tokio::time::timeout(self.timeout, self.bus.request(&self.subject, payload))
            .await
            .map_err(|_| ClientError::Timeout {
                kind: kind.to_string(),
                timeout: self.timeout,
            })??;

        let envelope = envelope::decode(&reply.payload)?;
        if envelope.kind != kind {
            return Err(ClientError::KindMismatch {
                expected: kind.to_string(),
                actual: envelope.kind,
            });
        }
        if let Some(message) = envelope.error {
            return Err(ClientError::Remote {
                kind: envelope.kind,
                message,
            });
        }

        debug!(kind, subject = %self.subject, "rpc call completed");
        Ok(envelope.into_payload()?)
    }

    /// Publishes `request` as `kind` without waiting for a reply.
    ///
    /// # Errors
    ///
    /// Returns `Bus`, `Envelope`, or `Carrier` errors from building or
    /// publishing the message.
    pub async fn notify<Req: Serialize>(
        &self,
        cx: &Context,
        kind: &str,
        request: &Req,
    ) -> Result<(), ClientError> {
        let payload = self.request_bytes(cx, kind, request)?;
        self.bus.publish(&self.subject, payload).await?;
        Ok(())
    }
}
