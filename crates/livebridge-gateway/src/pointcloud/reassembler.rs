//! Point-cloud frame reassembly.
//!
//! Three inbound shapes feed the same window:
//! - `meta` opens frames and finalizes a complete frame on its last chunk
//! - raw fragments are appended to the newest frame in arrival order
//! - indexed fragments carry their own frame id and slot
//!
//! Raw fragments assume in-order delivery; reordering on the data channel
//! corrupts the frame. Indexed fragments do not have that problem.
//!
//! A frame that outgrows `max_frame_bytes` stays in the window with its bytes
//! released until it completes or is evicted, so its remaining fragments are
//! never appended to another frame.

use std::sync::{Arc, Mutex};

use bytes::Bytes;
use tracing::{debug, trace, warn};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::pointcloud::{
    decode_indexed_fragment, decode_meta, FrameMeta, IndexedFragment,
};

use super::frame::FragmentSlot;
use super::sink::{FrameSink, ReadyFrame};
use super::window::FrameWindow;
use crate::config::PointCloudSection;
use crate::dispatch::TopicHandler;
use crate::obs::BridgeMetrics;
use crate::transport::TransportPacket;

pub struct FrameReassembler {
    window: FrameWindow,
    max_frame_bytes: usize,
    scratch: Option<Bytes>,
    metrics: Arc<BridgeMetrics>,
}

impl FrameReassembler {
    pub fn new(window_frames: usize, max_frame_bytes: usize, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            window: FrameWindow::new(window_frames),
            max_frame_bytes,
            scratch: None,
            metrics,
        }
    }

    pub fn window(&self) -> &FrameWindow {
        &self.window
    }

    /// Last raw fragment received while no frame was open.
    pub fn scratch(&self) -> Option<&Bytes> {
        self.scratch.as_ref()
    }

    pub fn ingest_metadata(&mut self, meta: FrameMeta) -> Result<Option<ReadyFrame>> {
        if !self.open_frame(meta.id, meta.total) {
            return Ok(None);
        }

        let ready = match self.window.get(meta.id) {
            Some(frame) => {
                if frame.total() != meta.total {
                    debug!(frame_id = meta.id, tracked = frame.total(), announced = meta.total, "frame total mismatch");
                }
                // Fragment storage finishes frames as they complete, so a
                // complete frame is rarely still tracked here.
                meta.is_last_chunk() && frame.is_complete() && !frame.is_oversized()
            }
            None => false,
        };

        let out = if ready { self.finish(meta.id) } else { None };
        self.update_gauge();
        Ok(out)
    }

    /// Append a raw fragment to the newest open frame at its next free index.
    pub fn ingest_fragment(&mut self, data: Bytes) -> Result<Option<ReadyFrame>> {
        let Some(frame_id) = self.window.newest_id() else {
            self.stash(data);
            return Ok(None);
        };

        let index = match self.window.get(frame_id) {
            Some(frame) => frame.received_count(),
            None => return Ok(None),
        };
        let out = self.store(frame_id, index, data);
        self.update_gauge();
        out
    }

    pub fn ingest_indexed(&mut self, frag: IndexedFragment) -> Result<Option<ReadyFrame>> {
        let frame_id = frag.frame_id;
        let total = u32::from(frag.total);

        if !self.open_frame(frame_id, total) {
            self.metrics.fragments_dropped.inc(&[("reason", "evicted")]);
            return Ok(None);
        }
        if let Some(frame) = self.window.get(frame_id) {
            if frame.total() != total {
                self.metrics.fragments_dropped.inc(&[("reason", "out_of_range")]);
                return Err(BridgeError::MalformedEnvelope(format!(
                    "fragment total {total} disagrees with frame {frame_id} total {}",
                    frame.total()
                )));
            }
        }

        let out = self.store(frame_id, u32::from(frag.index), frag.payload);
        self.update_gauge();
        out
    }

    /// Open `frame_id` if needed. False when the frame did not survive
    /// eviction.
    fn open_frame(&mut self, frame_id: u32, total: u32) -> bool {
        for old in self.window.open(frame_id, total) {
            debug!(frame_id = old, "frame evicted incomplete");
            self.metrics.frames_dropped.inc(&[("reason", "evicted")]);
        }
        self.window.contains(frame_id)
    }

    fn store(&mut self, frame_id: u32, index: u32, data: Bytes) -> Result<Option<ReadyFrame>> {
        let capacity = self.max_frame_bytes;
        let Some(frame) = self.window.get_mut(frame_id) else {
            return Ok(None);
        };

        let slot = frame.insert(index, data, capacity);
        match slot {
            FragmentSlot::Stored => {
                trace!(frame_id, index, total = frame.total(), "fragment stored");
            }
            FragmentSlot::Discarded => {
                trace!(frame_id, index, "fragment of oversized frame released");
            }
            FragmentSlot::Overflow => {
                warn!(frame_id, len = frame.received_bytes(), capacity, "pointcloud frame exceeds buffer");
            }
            FragmentSlot::Duplicate => {
                self.metrics.fragments_dropped.inc(&[("reason", "duplicate")]);
                trace!(frame_id, index, "duplicate fragment");
                return Ok(None);
            }
            FragmentSlot::OutOfRange => {
                self.metrics.fragments_dropped.inc(&[("reason", "out_of_range")]);
                debug!(frame_id, index, total = frame.total(), "fragment beyond frame total");
                return Ok(None);
            }
        }

        let complete = frame.is_complete();
        let oversized = frame.is_oversized();
        let len = frame.received_bytes();

        let out = match (complete, oversized) {
            (true, false) => self.finish(frame_id),
            (true, true) => {
                self.window.remove(frame_id);
                self.metrics.frames_dropped.inc(&[("reason", "oversized")]);
                debug!(frame_id, len, capacity, "oversized frame complete; dropped");
                None
            }
            (false, _) => None,
        };

        if slot == FragmentSlot::Overflow {
            return Err(BridgeError::OversizedAsset { frame_id, len, capacity });
        }
        Ok(out)
    }

    fn finish(&mut self, frame_id: u32) -> Option<ReadyFrame> {
        let frame = self.window.remove(frame_id)?;
        let buffer = frame.assemble();
        debug!(frame_id, len = buffer.len(), "frame complete");
        self.metrics.frames_completed.inc(&[]);
        Some(ReadyFrame { frame_id, buffer })
    }

    fn stash(&mut self, data: Bytes) {
        if data.len() > self.max_frame_bytes {
            warn!(len = data.len(), capacity = self.max_frame_bytes, "pointcloud fragment too large for buffer");
            self.metrics.fragments_dropped.inc(&[("reason", "overflow")]);
            return;
        }
        trace!(len = data.len(), "no open frame; fragment kept in scratch buffer");
        self.metrics.fragments_dropped.inc(&[("reason", "no_slot")]);
        self.scratch = Some(data);
    }

    fn update_gauge(&self) {
        self.metrics
            .frames_in_flight
            .set(&[], self.window.len() as i64);
    }
}

/// Topic handler for the three point-cloud topics.
pub struct PointCloudHandler {
    meta_topic: String,
    data_topic: String,
    indexed_topic: String,
    reassembler: Mutex<FrameReassembler>,
    sink: Arc<dyn FrameSink>,
}

impl PointCloudHandler {
    pub fn new(cfg: &PointCloudSection, sink: Arc<dyn FrameSink>, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            meta_topic: cfg.meta_topic.clone(),
            data_topic: cfg.data_topic.clone(),
            indexed_topic: cfg.indexed_topic.clone(),
            reassembler: Mutex::new(FrameReassembler::new(
                cfg.window_frames,
                cfg.max_frame_bytes,
                metrics,
            )),
            sink,
        }
    }

    pub fn topics(&self) -> [&str; 3] {
        [&self.meta_topic, &self.data_topic, &self.indexed_topic]
    }

    /// Ids of frames currently under reassembly.
    pub fn frames_in_flight(&self) -> Vec<u32> {
        self.reassembler
            .lock()
            .map(|r| r.window().ids())
            .unwrap_or_default()
    }
}

impl TopicHandler for PointCloudHandler {
    fn handle_topic(&self, packet: &TransportPacket) -> Result<()> {
        let Some(topic) = packet.topic.as_deref() else {
            return Ok(());
        };

        // Parse before taking the lock.
        enum Input {
            Meta(FrameMeta),
            Raw(Bytes),
            Indexed(IndexedFragment),
        }
        let input = if topic == self.meta_topic {
            Input::Meta(decode_meta(&packet.payload)?)
        } else if topic == self.indexed_topic {
            Input::Indexed(decode_indexed_fragment(packet.payload.clone())?)
        } else if topic == self.data_topic {
            Input::Raw(packet.payload.clone())
        } else {
            return Ok(());
        };

        let ready = {
            let mut r = self
                .reassembler
                .lock()
                .map_err(|_| BridgeError::Internal("pointcloud reassembler lock poisoned".into()))?;
            match input {
                Input::Meta(meta) => r.ingest_metadata(meta)?,
                Input::Raw(data) => r.ingest_fragment(data)?,
                Input::Indexed(frag) => r.ingest_indexed(frag)?,
            }
        };

        if let Some(frame) = ready {
            self.sink.on_frame_ready(frame.buffer, frame.frame_id);
        }
        Ok(())
    }
}
