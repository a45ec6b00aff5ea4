//! A single frame under reassembly.

use std::collections::BTreeMap;

use bytes::{Bytes, BytesMut};

/// Result of storing one fragment in a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentSlot {
    Stored,
    Duplicate,
    OutOfRange,
    /// This fragment pushed the frame past capacity. Held bytes were released.
    Overflow,
    /// Counted toward an already oversized frame; bytes not kept.
    Discarded,
}

/// One point-cloud frame under reassembly.
///
/// Once a frame exceeds its capacity it stays tracked as oversized: fragments
/// still count toward completion but their bytes are released.
#[derive(Debug)]
pub struct AssetFrame {
    id: u32,
    total: u32,
    fragments: BTreeMap<u32, Bytes>,
    byte_len: usize,
    received_bytes: usize,
    oversized: bool,
}

impl AssetFrame {
    pub fn new(id: u32, total: u32) -> Self {
        Self {
            id,
            total,
            fragments: BTreeMap::new(),
            byte_len: 0,
            received_bytes: 0,
            oversized: false,
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    /// Declared fragment count.
    pub fn total(&self) -> u32 {
        self.total
    }

    pub fn received_count(&self) -> u32 {
        self.fragments.len() as u32
    }

    /// Bytes held so far.
    pub fn byte_len(&self) -> usize {
        self.byte_len
    }

    /// Bytes of every distinct fragment received, including released ones.
    pub fn received_bytes(&self) -> usize {
        self.received_bytes
    }

    pub fn is_oversized(&self) -> bool {
        self.oversized
    }

    pub fn is_complete(&self) -> bool {
        self.received_count() == self.total
    }

    pub fn has(&self, index: u32) -> bool {
        self.fragments.contains_key(&index)
    }

    /// Store `data` at `index` within a `capacity` byte budget.
    /// Existing fragments are never overwritten and never count twice.
    pub fn insert(&mut self, index: u32, data: Bytes, capacity: usize) -> FragmentSlot {
        if index >= self.total {
            return FragmentSlot::OutOfRange;
        }
        if self.fragments.contains_key(&index) {
            return FragmentSlot::Duplicate;
        }
        self.received_bytes += data.len();

        if self.oversized {
            self.fragments.insert(index, Bytes::new());
            return FragmentSlot::Discarded;
        }
        if self.byte_len + data.len() > capacity {
            self.release();
            self.fragments.insert(index, Bytes::new());
            return FragmentSlot::Overflow;
        }

        self.byte_len += data.len();
        self.fragments.insert(index, data);
        FragmentSlot::Stored
    }

    fn release(&mut self) {
        self.oversized = true;
        self.byte_len = 0;
        for data in self.fragments.values_mut() {
            *data = Bytes::new();
        }
    }

    /// Concatenate fragments in ascending index order.
    pub fn assemble(self) -> Bytes {
        let mut out = BytesMut::with_capacity(self.byte_len);
        for data in self.fragments.into_values() {
            out.extend_from_slice(&data);
        }
        out.freeze()
    }
}
