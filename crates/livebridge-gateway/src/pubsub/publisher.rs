//! Typed outbound topic publishers.

use std::marker::PhantomData;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tracing::{trace, warn};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::messages::RosMessage;
use livebridge_core::protocol::envelope::{encode, MessagePacket};

use crate::rpc::service::send_failure;
use crate::transport::{Reliability, Transport};

/// Typed publisher bound to one topic.
///
/// Each instance owns its sequence counter: ids start at 1 and are never
/// reused. A publish refused because the transport is down consumes no id.
pub struct Publisher<T: RosMessage> {
    transport: Arc<dyn Transport>,
    topic: String,
    message_type: String,
    reliability: Reliability,
    last_seq: AtomicU64,
    _msg: PhantomData<fn(&T)>,
}

impl<T: RosMessage> Publisher<T> {
    pub fn new(
        transport: Arc<dyn Transport>,
        topic: impl Into<String>,
        message_type: impl Into<String>,
        reliability: Reliability,
    ) -> Self {
        Self {
            transport,
            topic: topic.into(),
            message_type: message_type.into(),
            reliability,
            last_seq: AtomicU64::new(0),
            _msg: PhantomData,
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn reliability(&self) -> Reliability {
        self.reliability
    }

    /// Sequence id of the most recent publish; 0 before the first.
    pub fn last_sequence(&self) -> u64 {
        self.last_seq.load(Ordering::Relaxed)
    }

    pub fn publish(&self, msg: &T) -> Result<u64> {
        self.publish_with(msg, self.reliability)
    }

    /// Publish with a per-call reliability override. Returns the sequence id.
    pub fn publish_with(&self, msg: &T, reliability: Reliability) -> Result<u64> {
        if !self.transport.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let seq = self.last_seq.fetch_add(1, Ordering::Relaxed) + 1;
        let packet = MessagePacket::new(
            self.topic.as_str(),
            self.message_type.as_str(),
            msg.to_payload(),
            msg.timestamp(),
            seq,
        );
        let bytes = encode(&packet)?;

        if let Err(e) = self.transport.send(bytes, reliability, None) {
            warn!(topic = %self.topic, seq, error = %e, "publish failed");
            return Err(send_failure(e));
        }
        trace!(topic = %self.topic, seq, "published");
        Ok(seq)
    }
}
