//! Channel-backed transport.
//!
//! Outbound packets go into a bounded tokio mpsc queue drained by whatever
//! owns the real session (or by tests). Lossy sends drop when the queue is
//! full; reliable sends fail so the caller sees the back-pressure.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;

use livebridge_core::error::{BridgeError, Result};

use super::{Reliability, Transport, TransportPacket};

pub struct ChannelTransport {
    tx: mpsc::Sender<TransportPacket>,
    connected: AtomicBool,
    dropped: AtomicU64,
}

impl ChannelTransport {
    /// Create a connected transport and the receiving end of its queue.
    pub fn new(capacity: usize) -> (Arc<Self>, mpsc::Receiver<TransportPacket>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let transport = Arc::new(Self {
            tx,
            connected: AtomicBool::new(true),
            dropped: AtomicU64::new(0),
        });
        (transport, rx)
    }

    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::Relaxed);
    }

    /// Lossy packets dropped on a full queue.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

impl Transport for ChannelTransport {
    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Relaxed) && !self.tx.is_closed()
    }

    fn send(&self, payload: Bytes, reliability: Reliability, topic: Option<&str>) -> Result<()> {
        if !self.connected.load(Ordering::Relaxed) {
            return Err(BridgeError::NotConnected);
        }

        match self.tx.try_send(TransportPacket::new(payload, reliability, topic)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) if reliability == Reliability::Lossy => {
                self.dropped.fetch_add(1, Ordering::Relaxed);
                Ok(())
            }
            Err(TrySendError::Full(_)) => {
                Err(BridgeError::SendFailure("outbound queue full".into()))
            }
            Err(TrySendError::Closed(_)) => {
                Err(BridgeError::SendFailure("outbound channel closed".into()))
            }
        }
    }
}
