//! In-process bus with NATS-like delivery semantics.
//!
//! Subjects match exactly (no wildcards). Every plain subscriber of a subject
//! receives each message; each queue group receives it once, on one member
//! chosen round-robin. Requests use a private `_INBOX.*` subject for the reply.
//! The most recent publishes are kept in a bounded log so tests can assert
//! on what went over the wire.

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use parking_lot::Mutex;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::{BusConnection, BusError, BusMessage, Subscription};

/// Publishes kept in the log; older entries are dropped first.
pub const PUBLISH_LOG_CAPACITY: usize = 1024;

// ---------------------------------------------------------------------------
// Routing state
// ---------------------------------------------------------------------------

struct Member {
    sid: u64,
    tx: mpsc::UnboundedSender<BusMessage>,
}

#[derive(Default)]
struct QueueGroup {
    members: Vec<Member>,
    cursor: usize,
}

#[derive(Default)]
struct Topic {
    plain: Vec<Member>,
    groups: BTreeMap<String, QueueGroup>,
}

impl Topic {
    fn is_empty(&self) -> bool {
        self.plain.is_empty() && self.groups.values().all(|g| g.members.is_empty())
    }
}

#[derive(Default)]
struct BusState {
    topics: HashMap<String, Topic>,
    published: VecDeque<BusMessage>,
    closed: bool,
    next_sid: u64,
}

impl BusState {
    fn deliver(&mut self, msg: &BusMessage) -> usize {
        let Some(topic) = self.topics.get_mut(&msg.subject) else {
            return 0;
        };

        let mut delivered = 0;
        topic.plain.retain(|m| !m.tx.is_closed());
        for member in &topic.plain {
            if member.tx.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }

        for group in topic.groups.values_mut() {
            group.members.retain(|m| !m.tx.is_closed());
            if group.members.is_empty() {
                continue;
            }
            let idx = group.cursor % group.members.len();
            group.cursor = group.cursor.wrapping_add(1);
            if group.members[idx].tx.send(msg.clone()).is_ok() {
                delivered += 1;
            }
        }
        delivered
    }

    fn remove(&mut self, subject: &str, queue_group: Option<&str>, sid: u64) {
        let Some(topic) = self.topics.get_mut(subject) else {
            return;
        };
        match queue_group {
            Some(name) => {
                if let Some(group) = topic.groups.get_mut(name) {
                    group.members.retain(|m| m.sid != sid);
                }
            }
            None => topic.plain.retain(|m| m.sid != sid),
        }
        if topic.is_empty() {
            self.topics.remove(subject);
        }
    }
}

// ---------------------------------------------------------------------------
// InMemoryBus
// ---------------------------------------------------------------------------

/// Cloneable handle to a shared in-process bus.
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<Mutex<BusState>>,
}

impl InMemoryBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Publishes with an explicit reply subject, like a requester that
    /// collects replies on its own subscription.
    ///
    /// # Errors
    ///
    /// Returns `BusError::Closed` after [`BusConnection::close`].
    pub fn publish_with_reply(
        &self,
        subject: &str,
        reply: Option<&str>,
        payload: Bytes,
    ) -> Result<usize, BusError> {
        let msg = BusMessage {
            subject: subject.to_string(),
            reply: reply.map(str::to_string),
            payload,
        };

        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }
        if state.published.len() == PUBLISH_LOG_CAPACITY {
            state.published.pop_front();
        }
        state.published.push_back(msg.clone());
        Ok(state.deliver(&msg))
    }

    /// Subscribes to every message on `subject` (no queue group).
    ///
    /// # Errors
    ///
    /// Returns `BusError::Closed` after [`BusConnection::close`].
    pub fn subscribe(&self, subject: &str) -> Result<InMemorySubscription, BusError> {
        self.register(subject, None)
    }

    /// The last [`PUBLISH_LOG_CAPACITY`] published messages, oldest first.
    #[must_use]
    pub fn published(&self) -> Vec<BusMessage> {
        self.state.lock().published.iter().cloned().collect()
    }

    /// Logged messages published on `subject`.
    #[must_use]
    pub fn published_to(&self, subject: &str) -> Vec<BusMessage> {
        self.state
            .lock()
            .published
            .iter()
            .filter(|m| m.subject == subject)
            .cloned()
            .collect()
    }

    /// Number of live subscriptions (plain and queue) on `subject`.
    #[must_use]
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.state.lock().topics.get(subject).map_or(0, |t| {
            t.plain.len() + t.groups.values().map(|g| g.members.len()).sum::<usize>()
        })
    }

    fn register(
        &self,
        subject: &str,
        queue_group: Option<&str>,
    ) -> Result<InMemorySubscription, BusError> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut state = self.state.lock();
        if state.closed {
            return Err(BusError::Closed);
        }

        state.next_sid += 1;
        let sid = state.next_sid;
        let topic = state.topics.entry(subject.to_string()).or_default();
        let member = Member { sid, tx };
        match queue_group {
            Some(name) => topic
                .groups
                .entry(name.to_string())
                .or_default()
                .members
                .push(member),
            None => topic.plain.push(member),
        }

        Ok(InMemorySubscription {
            sid,
            subject: subject.to_string(),
            queue_group: queue_group.map(str::to_string),
            rx,
            state: Arc::clone(&self.state),
            active: true,
        })
    }
}

#[async_trait]
impl BusConnection for InMemoryBus {
    fn broker(&self) -> &'static str {
        "memory"
    }

    fn is_connected(&self) -> bool {
        !self.state.lock().closed
    }

    async fn publish(&self, subject: &str, payload: Bytes) -> Result<(), BusError> {
        self.publish_with_reply(subject, None, payload).map(|_| ())
    }

    async fn request(&self, subject: &str, payload: Bytes) -> Result<BusMessage, BusError> {
        let inbox = format!("_INBOX.{}", Uuid::new_v4().simple());
        let mut replies = self.subscribe(&inbox)?;

        let delivered = self.publish_with_reply(subject, Some(&inbox), payload)?;
        if delivered == 0 {
            return Err(BusError::NoResponders {
                subject: subject.to_string(),
            });
        }

        replies.next().await.ok_or(BusError::Closed)
    }

    async fn queue_subscribe(
        &self,
        subject: &str,
        queue_group: &str,
    ) -> Result<Box<dyn Subscription>, BusError> {
        let sub = self.register(subject, Some(queue_group))?;
        Ok(Box::new(sub))
    }

    async fn close(&self) -> Result<(), BusError> {
        let mut state = self.state.lock();
        state.closed = true;
        // Dropping the senders ends every open subscription stream.
        state.topics.clear();
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// InMemorySubscription
// ---------------------------------------------------------------------------

/// Subscription handle returned by [`InMemoryBus`].
///
/// Dropping the handle unsubscribes.
pub struct InMemorySubscription {
    sid: u64,
    subject: String,
    queue_group: Option<String>,
    rx: mpsc::UnboundedReceiver<BusMessage>,
    state: Arc<Mutex<BusState>>,
    active: bool,
}

impl InMemorySubscription {
    fn detach(&mut self) {
        if self.active {
            self.active = false;
            self.state
                .lock()
                .remove(&self.subject, self.queue_group.as_deref(), self.sid);
            self.rx.close();
        }
    }
}

impl Stream for InMemorySubscription {
    type Item = BusMessage;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

#[async_trait]
impl Subscription for InMemorySubscription {
    async fn unsubscribe(&mut self) -> Result<(), BusError> {
        self.detach();
        Ok(())
    }
}

impl Drop for InMemorySubscription {
    fn drop(&mut self) {
        self.detach();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[tokio::test]
    async fn queue_group_delivers_to_one_member() {
        let bus = InMemoryBus::new();
        let mut a = bus.queue_subscribe("asset", "workers").await.unwrap();
        let mut b = bus.queue_subscribe("asset", "workers").await.unwrap();

        bus.publish("asset", Bytes::from_static(b"1")).await.unwrap();
        bus.publish("asset", Bytes::from_static(b"2")).await.unwrap();

        let first = a.next().await.unwrap();
        let second = b.next().await.unwrap();
        assert_eq!(first.payload, Bytes::from_static(b"1"));
        assert_eq!(second.payload, Bytes::from_static(b"2"));
    }

    #[tokio::test]
    async fn plain_subscribers_all_receive() {
        let bus = InMemoryBus::new();
        let mut a = bus.subscribe("R1").unwrap();
        let mut b = bus.subscribe("R1").unwrap();

        let delivered = bus
            .publish_with_reply("R1", None, Bytes::from_static(b"x"))
            .unwrap();
        assert_eq!(delivered, 2);
        assert!(a.next().await.is_some());
        assert!(b.next().await.is_some());
    }

    #[tokio::test]
    async fn request_receives_reply_on_inbox() {
        let bus = InMemoryBus::new();
        let mut server = bus.queue_subscribe("echo", "q").await.unwrap();

        let responder = bus.clone();
        let handle = tokio::spawn(async move {
            let msg = server.next().await.unwrap();
            let reply = msg.reply.unwrap();
            responder.publish(&reply, msg.payload).await.unwrap();
        });

        let reply = bus
            .request("echo", Bytes::from_static(b"ping"))
            .await
            .unwrap();
        assert_eq!(reply.payload, Bytes::from_static(b"ping"));
        assert!(reply.subject.starts_with("_INBOX."));
        handle.await.unwrap();
    }

    #[tokio::test]
    async fn request_without_responders_fails() {
        let bus = InMemoryBus::new();
        let err = bus
            .request("nobody", Bytes::from_static(b"ping"))
            .await
            .unwrap_err();
        assert!(matches!(err, BusError::NoResponders { .. }));
    }

    #[tokio::test]
    async fn unsubscribe_removes_member() {
        let bus = InMemoryBus::new();
        let mut sub = bus.queue_subscribe("asset", "workers").await.unwrap();
        assert_eq!(bus.subscriber_count("asset"), 1);

        sub.unsubscribe().await.unwrap();
        assert_eq!(bus.subscriber_count("asset"), 0);
        assert!(sub.next().await.is_none());
    }

    #[tokio::test]
    async fn close_ends_streams_and_rejects_publish() {
        let bus = InMemoryBus::new();
        let mut sub = bus.queue_subscribe("asset", "workers").await.unwrap();

        bus.close().await.unwrap();

        let next = tokio::time::timeout(Duration::from_secs(1), sub.next())
            .await
            .unwrap();
        assert!(next.is_none());
        assert!(!bus.is_connected());
        assert!(matches!(
            bus.publish("asset", Bytes::new()).await.unwrap_err(),
            BusError::Closed
        ));
        assert!(bus.queue_subscribe("asset", "workers").await.is_err());
    }

    #[tokio::test]
    async fn publish_log_records_reply_subject() {
        let bus = InMemoryBus::new();
        bus.publish_with_reply("asset", Some("R1"), Bytes::from_static(b"{}"))
            .unwrap();

        let log = bus.published_to("asset");
        assert_eq!(log.len(), 1);
        assert_eq!(log[0].reply.as_deref(), Some("R1"));
    }

    #[test]
    fn publish_log_keeps_only_recent_messages() {
        let bus = InMemoryBus::new();
        for i in 0..PUBLISH_LOG_CAPACITY + 5 {
            bus.publish_with_reply("asset", None, Bytes::from(i.to_string()))
                .unwrap();
        }

        let log = bus.published();
        assert_eq!(log.len(), PUBLISH_LOG_CAPACITY);
        assert_eq!(log[0].payload, Bytes::from("5"));
        assert_eq!(
            log.last().unwrap().payload,
            Bytes::from((PUBLISH_LOG_CAPACITY + 4).to_string())
        );
    }
}
