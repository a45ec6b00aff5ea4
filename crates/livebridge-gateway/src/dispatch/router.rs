use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use dashmap::DashMap;
use tracing::{trace, warn};

use livebridge_core::error::Result;
use livebridge_core::protocol::envelope::{decode_envelope, InboundEnvelope, PacketType};

use crate::obs::BridgeMetrics;
use crate::transport::TransportPacket;

/// Handler for raw packets on an exact topic string (no envelope).
pub trait TopicHandler: Send + Sync {
    fn handle_topic(&self, packet: &TransportPacket) -> Result<()>;
}

/// Handler for decoded envelopes of one packet type.
pub trait PacketHandler: Send + Sync {
    fn handle_packet(&self, env: InboundEnvelope) -> Result<()>;
}

/// Adapter turning a closure into a handler.
pub struct HandlerFn<F>(pub F);

impl<F> TopicHandler for HandlerFn<F>
where
    F: Fn(&TransportPacket) -> Result<()> + Send + Sync,
{
    fn handle_topic(&self, packet: &TransportPacket) -> Result<()> {
        (self.0)(packet)
    }
}

impl<F> PacketHandler for HandlerFn<F>
where
    F: Fn(InboundEnvelope) -> Result<()> + Send + Sync,
{
    fn handle_packet(&self, env: InboundEnvelope) -> Result<()> {
        (self.0)(env)
    }
}

/// What the router did with one inbound packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dispatch {
    /// Delivered raw to the handler for this topic.
    Topic(String),
    /// Decoded and delivered to the handler for this packet type.
    Packet(PacketType),
    /// Decoded, but no handler matched (or the packet type is unknown).
    Ignored,
    /// Could not be decoded as an envelope.
    Malformed,
    /// A handler ran and returned an error.
    HandlerFailed,
}

struct Route<H: ?Sized> {
    id: u64,
    handler: Arc<H>,
}

#[derive(Default)]
struct RouteTables {
    topics: DashMap<String, Route<dyn TopicHandler>>,
    packets: DashMap<PacketType, Route<dyn PacketHandler>>,
    next_id: AtomicU64,
}

impl RouteTables {
    fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[derive(Debug, Clone)]
enum RouteKey {
    Topic(String),
    Packet(PacketType),
}

/// Deregistration handle. Dropping it removes the handler it was issued for;
/// a later registration that replaced it is left alone.
#[must_use = "dropping a Registration removes the handler"]
pub struct Registration {
    tables: Weak<RouteTables>,
    key: RouteKey,
    id: u64,
}

impl Registration {
    /// Remove the handler now.
    pub fn cancel(self) {}
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(tables) = self.tables.upgrade() else { return };
        let id = self.id;
        match &self.key {
            RouteKey::Topic(t) => {
                tables.topics.remove_if(t, |_, r| r.id == id);
            }
            RouteKey::Packet(p) => {
                tables.packets.remove_if(p, |_, r| r.id == id);
            }
        }
    }
}

/// Routes inbound transport packets to exactly one handler.
///
/// Raw topic routes take precedence; everything else is decoded as an
/// envelope and routed by `packetType`. Failures are per-packet.
pub struct TopicRouter {
    tables: Arc<RouteTables>,
    metrics: Arc<BridgeMetrics>,
}

impl TopicRouter {
    pub fn new(metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            tables: Arc::new(RouteTables::default()),
            metrics,
        }
    }

    pub fn register_topic(&self, topic: impl Into<String>, handler: Arc<dyn TopicHandler>) -> Registration {
        let topic = topic.into();
        let id = self.tables.next_id();
        if self
            .tables
            .topics
            .insert(topic.clone(), Route { id, handler })
            .is_some()
        {
            warn!(%topic, "replacing existing topic handler");
        }
        Registration {
            tables: Arc::downgrade(&self.tables),
            key: RouteKey::Topic(topic),
            id,
        }
    }

    pub fn register_packet(&self, packet_type: PacketType, handler: Arc<dyn PacketHandler>) -> Registration {
        let id = self.tables.next_id();
        if self
            .tables
            .packets
            .insert(packet_type, Route { id, handler })
            .is_some()
        {
            warn!(packet_type = packet_type.as_str(), "replacing existing packet handler");
        }
        Registration {
            tables: Arc::downgrade(&self.tables),
            key: RouteKey::Packet(packet_type),
            id,
        }
    }

    pub fn registered_topics(&self) -> Vec<String> {
        self.tables.topics.iter().map(|e| e.key().clone()).collect()
    }

    pub fn registered_packets(&self) -> Vec<PacketType> {
        self.tables.packets.iter().map(|e| *e.key()).collect()
    }

    /// Deliver one inbound packet. Never fails; the outcome is reported for
    /// logging and tests.
    pub fn on_transport_message(&self, packet: &TransportPacket) -> Dispatch {
        if let Some(topic) = packet.topic.as_deref() {
            // Clone the handler out so no shard guard is held while it runs.
            let handler = self.tables.topics.get(topic).map(|r| Arc::clone(&r.handler));
            if let Some(handler) = handler {
                self.metrics.packets_routed.inc(&[("route", topic)]);
                if let Err(e) = handler.handle_topic(packet) {
                    warn!(%topic, sender = ?packet.sender, code = e.code().as_str(), error = %e, "topic handler failed");
                    self.metrics
                        .handler_errors
                        .inc(&[("route", topic), ("code", e.code().as_str())]);
                    return Dispatch::HandlerFailed;
                }
                return Dispatch::Topic(topic.to_owned());
            }
        }

        let env = match decode_envelope(&packet.payload) {
            Ok(env) => env,
            Err(e) => {
                warn!(topic = ?packet.topic, sender = ?packet.sender, len = packet.payload.len(), error = %e, "dropping undecodable packet");
                self.metrics.decode_errors.inc(&[("code", e.code().as_str())]);
                return Dispatch::Malformed;
            }
        };

        let Some(packet_type) = env.packet_type() else {
            trace!(packet_type = ?env.raw_packet_type(), "ignoring envelope with unknown packetType");
            return Dispatch::Ignored;
        };

        let handler = self
            .tables
            .packets
            .get(&packet_type)
            .map(|r| Arc::clone(&r.handler));
        let Some(handler) = handler else {
            trace!(packet_type = packet_type.as_str(), "no handler registered");
            return Dispatch::Ignored;
        };

        let route = packet_type.as_str();
        self.metrics.packets_routed.inc(&[("route", route)]);
        if let Err(e) = handler.handle_packet(env) {
            warn!(packet_type = route, sender = ?packet.sender, code = e.code().as_str(), error = %e, "packet handler failed");
            self.metrics
                .handler_errors
                .inc(&[("route", route), ("code", e.code().as_str())]);
            return Dispatch::HandlerFailed;
        }
        Dispatch::Packet(packet_type)
    }
}
