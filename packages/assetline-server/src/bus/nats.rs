//! NATS bus connection backed by `async-nats`.

use std::pin::Pin;
use std::task::{Context, Poll};

use async_nats::client::RequestErrorKind;
use async_nats::connection::State;
use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;
use parking_lot::RwLock;
use tracing::{debug, info};

use super::{BusConnection, BusError, BusMessage, Subscription};
use crate::config::BusConfig;

/// Shared NATS client.
///
/// `close` drops the client; later calls fail with `BusError::Closed`.
pub struct NatsBus {
    url: String,
    client: RwLock<Option<async_nats::Client>>,
}

impl NatsBus {
    /// Connects to the server named in `config`.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Connect` if the initial connection fails.
    pub async fn connect(config: &BusConfig) -> Result<Self, BusError> {
        let client = async_nats::ConnectOptions::new()
            .name(&config.client_name)
            .connect(config.url.as_str())
            .await
            .map_err(|e| BusError::Connect {
                url: config.url.clone(),
                message: e.to_string(),
            })?;

        info!(url = %config.url, name = %config.client_name, "connected to NATS");

        Ok(Self {
            url: config.url.clone(),
            client: RwLock::new(Some(client)),
        })
    }

    fn client(&self) -> Result<async_nats::Client, BusError> {
        self.client.read().clone().ok_or(BusError::Closed)
    }
}

fn to_bus_message(msg: async_nats::Message) -> BusMessage {
    BusMessage {
        subject: msg.subject.to_string(),
        reply: msg.reply.map(|r| r.to_string()),
        payload: msg.payload,
    }
}

#[async_trait]
impl BusConnection for NatsBus {
    fn broker(&self) -> &'static str {
        "nats"
    }

    fn is_connected(&self) -> bool {
        self.client
            .read()
            .as_ref()
            .is_some_and(|c| c.connection_state() == State::Connected)
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.client()?
            .publish(subject.to_string(), payload)
            .await
            .map_err(|e| BusError::transport("publish", e))
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<BusMessage, BusError> {
        let reply = self
            .client()?
            .request(subject.to_string(), payload)
            .await
            .map_err(|e| match e.kind() {
                RequestErrorKind::NoResponders => BusError::NoResponders {
                    subject: subject.to_string(),
                },
                _ => BusError::transport("request", e),
            })?;
        Ok(to_bus_message(reply))
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Box<dyn Subscription>, BusError> {
        let inner = self
            .client()?
            .queue_subscribe(subject.to_string(), queue_group.to_string())
            .await
            .map_err(|e| BusError::transport("subscribe", e))?;

        debug!(subject, queue_group, "queue subscription opened");
        Ok(Box::new(NatsSubscription { inner }))
    }

    async fn close(&self) -> Result<(), BusError> {
        let Some(client) = self.client.write().take() else {
            return Ok(());
        };
        let flushed = client
            .flush()
            .await
            .map_err(|e| BusError::transport("flush", e));
        drop(client);

        info!(url = %self.url, "NATS connection closed");
        flushed
    }
}

/// Queue subscription on a NATS subject.
pub struct NatsSubscription {
    inner: async_nats::Subscriber,
}

impl Stream for NatsSubscription {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Pin::new(&mut self.inner)
            .poll_next(cx)
            .map(|msg| msg.map(to_bus_message))
    }
}

#[async_trait]
impl Subscription for NatsSubscription {
    async fn unsubscribe(&mut self) -> Result<(), BusError> {
        self.inner
            .unsubscribe()
            .await
            .map_err(|e| BusError::transport("unsubscribe", e))
    }
}
