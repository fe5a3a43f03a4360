//! Message bus abstraction.
//!
//! The RPC layer only needs publish, queue-group subscribe, request/reply and
//! close. Implementations:
//!
//! - [`nats`]: `async-nats` client (feature `nats`)
//! - [`memory`]: in-process bus with the same delivery semantics, used by tests
//!   and local runs

pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;

pub use memory::InMemoryBus;
#[cfg(feature = "nats")]
pub use nats::NatsBus;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::Stream;

/// A message delivered by the bus.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BusMessage {
    pub subject: String,
    /// Subject the sender expects a reply on, if any.
    pub reply: Option<String>,
    pub payload: Bytes,
}

/// Errors reported by bus connections.
#[derive(Debug, thiserror::Error)]
pub enum BusError {
    #[error("bus connection is closed")]
    Closed,
    #[error("no responders on subject {subject}")]
    NoResponders { subject: String },
    #[error("failed to connect to {url}: {message}")]
    Connect { url: String, message: String },
    #[error("bus {operation} failed: {message}")]
    Transport {
        operation: &'static str,
        message: String,
    },
}

impl BusError {
    pub(crate) fn transport(operation: &'static str, err: impl std::fmt::Display) -> Self {
        Self::Transport {
            operation,
            message: err.to_string(),
        }
    }
}

/// A live subscription: a stream of messages that can be cancelled.
///
/// The stream ends when the subscription is cancelled or the connection closes.
#[async_trait]
pub trait Subscription: Stream<Item = BusMessage> + Send + Unpin {
    /// Stops delivery for this subscription.
    async fn unsubscribe(&mut self) -> Result<(), BusError>;
}

/// A shared connection to a publish/subscribe broker.
///
/// One handle is used both for the dispatcher's subscription and for
/// publishing replies, so implementations must be safe for concurrent use.
#[async_trait]
pub trait BusConnection: Send + Sync {
    /// Broker name used to tag spans (e.g. `"nats"`).
    fn broker(&self) -> &'static str;

    /// Whether the connection is currently usable.
    fn is_connected(&self) -> bool;

    /// Publishes `payload` on `subject` without a reply subject.
    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError>;

    /// Publishes `payload` on `subject` and waits for the first reply.
    ///
    /// No timeout is applied here; callers bound the wait themselves.
    async fn request(&self, subject: &str, payload: Bytes) -> Result<BusMessage, BusError>;

    /// Subscribes to `subject` as a member of `queue_group`. Each message is
    /// delivered to exactly one member of the group.
    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Box<dyn Subscription>, BusError>;

    /// Flushes pending messages and releases the connection.
    async fn close(&self) -> Result<(), BusError>;
}
