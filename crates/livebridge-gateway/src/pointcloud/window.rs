//! Bounded window of frames under reassembly.

use std::collections::BTreeMap;

use super::frame::AssetFrame;

/// Bounded set of in-flight frames ordered by id.
///
/// When a new frame pushes the window past its limit, the lowest ids are
/// dropped, which may be the newcomer itself if it is older than every
/// tracked frame.
#[derive(Debug)]
pub struct FrameWindow {
    frames: BTreeMap<u32, AssetFrame>,
    max_frames: usize,
}

impl FrameWindow {
    pub fn new(max_frames: usize) -> Self {
        Self {
            frames: BTreeMap::new(),
            max_frames: max_frames.max(1),
        }
    }

    pub fn max_frames(&self) -> usize {
        self.max_frames
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn contains(&self, id: u32) -> bool {
        self.frames.contains_key(&id)
    }

    /// Tracked ids, ascending.
    pub fn ids(&self) -> Vec<u32> {
        self.frames.keys().copied().collect()
    }

    pub fn get(&self, id: u32) -> Option<&AssetFrame> {
        self.frames.get(&id)
    }

    pub fn get_mut(&mut self, id: u32) -> Option<&mut AssetFrame> {
        self.frames.get_mut(&id)
    }

    /// Highest tracked id.
    pub fn newest_id(&self) -> Option<u32> {
        self.frames.keys().next_back().copied()
    }

    pub fn remove(&mut self, id: u32) -> Option<AssetFrame> {
        self.frames.remove(&id)
    }

    /// Track frame `id` if it is new, then evict down to the limit.
    /// Returns the evicted ids; empty when `id` was already tracked.
    pub fn open(&mut self, id: u32, total: u32) -> Vec<u32> {
        if self.frames.contains_key(&id) {
            return Vec::new();
        }
        self.frames.insert(id, AssetFrame::new(id, total));

        let mut evicted = Vec::new();
        while self.frames.len() > self.max_frames {
            match self.frames.pop_first() {
                Some((old, _)) => evicted.push(old),
                None => break,
            }
        }
        evicted
    }
}
