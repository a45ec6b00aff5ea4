//! Transport seam.
//!
//! The room/session layer is external. The bridge only needs to know whether a
//! session is up and how to hand it bytes; inbound traffic arrives as
//! [`TransportPacket`] values fed to the router by the host.

pub mod channel;

use bytes::Bytes;

use livebridge_core::error::Result;

pub use channel::ChannelTransport;

/// Delivery strategy for one send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Reliability {
    /// Ordered, retransmitted delivery. Control traffic.
    #[default]
    Reliable,
    /// Latency-critical: the transport may drop instead of queueing.
    Lossy,
}

/// One inbound data packet as delivered by the transport.
#[derive(Debug, Clone)]
pub struct TransportPacket {
    pub payload: Bytes,
    pub sender: Option<String>,
    pub reliability: Reliability,
    pub topic: Option<String>,
}

impl TransportPacket {
    pub fn new(payload: impl Into<Bytes>, reliability: Reliability, topic: Option<&str>) -> Self {
        Self {
            payload: payload.into(),
            sender: None,
            reliability,
            topic: topic.map(str::to_owned),
        }
    }

    pub fn with_sender(mut self, sender: impl Into<String>) -> Self {
        self.sender = Some(sender.into());
        self
    }
}

/// Outbound side of a room session.
pub trait Transport: Send + Sync {
    /// True while the session can carry data.
    fn is_connected(&self) -> bool;

    /// Send one payload. Errors surface as `BridgeError::SendFailure`.
    fn send(&self, payload: Bytes, reliability: Reliability, topic: Option<&str>) -> Result<()>;
}
