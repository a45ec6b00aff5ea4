//! Delivery of reassembled frames.

use bytes::Bytes;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{info, warn};

/// Consumer of completed frames.
pub trait FrameSink: Send + Sync {
    fn on_frame_ready(&self, buffer: Bytes, frame_id: u32);
}

impl<F> FrameSink for F
where
    F: Fn(Bytes, u32) + Send + Sync,
{
    fn on_frame_ready(&self, buffer: Bytes, frame_id: u32) {
        self(buffer, frame_id)
    }
}

/// A completed frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadyFrame {
    pub frame_id: u32,
    pub buffer: Bytes,
}

/// Hands frames to a bounded channel. A full channel drops the frame:
/// a newer one is on its way.
pub struct ChannelFrameSink {
    tx: mpsc::Sender<ReadyFrame>,
}

impl ChannelFrameSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<ReadyFrame>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (Self { tx }, rx)
    }
}

impl FrameSink for ChannelFrameSink {
    fn on_frame_ready(&self, buffer: Bytes, frame_id: u32) {
        match self.tx.try_send(ReadyFrame { frame_id, buffer }) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!(frame_id, "frame consumer lagging; frame dropped"),
            Err(TrySendError::Closed(_)) => warn!(frame_id, "frame consumer gone; frame dropped"),
        }
    }
}

/// Logs each frame and discards it.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogFrameSink;

impl FrameSink for LogFrameSink {
    fn on_frame_ready(&self, buffer: Bytes, frame_id: u32) {
        info!(frame_id, len = buffer.len(), "frame ready");
    }
}
