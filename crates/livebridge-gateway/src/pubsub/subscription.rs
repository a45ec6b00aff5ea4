//! Inbound topic subscriptions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::trace;

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::envelope::{InboundEnvelope, Payload};

use crate::dispatch::PacketHandler;

pub type MessageCallback = Arc<dyn Fn(&Payload) + Send + Sync + 'static>;

#[derive(Default)]
struct Subscribers {
    by_topic: DashMap<String, Vec<(u64, MessageCallback)>>,
    next_id: AtomicU64,
}

/// Fans inbound `ros2_message` envelopes out to subscribers by exact
/// `topicName`. Callbacks receive the whole envelope payload.
#[derive(Default)]
pub struct SubscriptionTable {
    inner: Arc<Subscribers>,
}

/// Dropping the handle unsubscribes.
#[must_use = "dropping a Subscription unsubscribes"]
pub struct Subscription {
    inner: Weak<Subscribers>,
    topic: String,
    id: u64,
}

impl Subscription {
    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn unsubscribe(self) {}
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let Some(inner) = self.inner.upgrade() else { return };
        let id = self.id;
        if let Some(mut subs) = inner.by_topic.get_mut(&self.topic) {
            subs.retain(|(sid, _)| *sid != id);
        }
        inner.by_topic.remove_if(&self.topic, |_, subs| subs.is_empty());
    }
}

impl SubscriptionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(
        &self,
        topic_name: impl Into<String>,
        callback: impl Fn(&Payload) + Send + Sync + 'static,
    ) -> Subscription {
        let topic = topic_name.into();
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        self.inner
            .by_topic
            .entry(topic.clone())
            .or_default()
            .push((id, Arc::new(callback)));
        Subscription {
            inner: Arc::downgrade(&self.inner),
            topic,
            id,
        }
    }

    pub fn subscriber_count(&self, topic_name: &str) -> usize {
        self.inner.by_topic.get(topic_name).map(|s| s.len()).unwrap_or(0)
    }
}

impl PacketHandler for SubscriptionTable {
    fn handle_packet(&self, env: InboundEnvelope) -> Result<()> {
        let topic = env
            .topic_name()
            .ok_or_else(|| BridgeError::MalformedEnvelope("message without topicName".into()))?;

        let callbacks: Vec<MessageCallback> = match self.inner.by_topic.get(topic) {
            Some(subs) => subs.iter().map(|(_, cb)| Arc::clone(cb)).collect(),
            None => {
                trace!(%topic, "no subscriber");
                return Ok(());
            }
        };

        for cb in callbacks {
            cb(env.body());
        }
        Ok(())
    }
}
