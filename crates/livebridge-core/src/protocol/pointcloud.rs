//! Point-cloud fragment wire formats (panic-free).
//!
//! Three shapes share the point-cloud topics:
//! - metadata: JSON `{id, chunk, total}` announcing one fragment of a frame
//! - raw fragment: bare bytes, indexed implicitly by arrival order
//! - indexed fragment: binary header carrying frame id, index, and total
//!
//! Parsing rules:
//! - Never index (`buf[0]`); always use `Buf` and `remaining()` checks.
//! - Never `unwrap()` / `expect()` / `panic!()` in production paths.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use serde_json::Value;

use crate::error::{BridgeError, Result};

/// Indexed fragment wire version.
pub const INDEXED_FRAGMENT_VERSION: u8 = 1;

/// Indexed fragment header: v, frame_id (u32), index (u16), total (u16).
pub const INDEXED_FRAGMENT_HEADER_LEN: usize = 9;

/// Parsed `pointcloud:meta` message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameMeta {
    /// Frame id.
    pub id: u32,
    /// Fragment index this metadata announces.
    pub chunk: u32,
    /// Declared fragment count of the frame.
    pub total: u32,
}

impl FrameMeta {
    /// True when this metadata announces the final fragment of its frame.
    pub fn is_last_chunk(&self) -> bool {
        self.chunk + 1 == self.total
    }
}

/// Decode a metadata message.
///
/// Numbers may arrive as integers, integral floats, or numeric strings.
pub fn decode_meta(bytes: &[u8]) -> Result<FrameMeta> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| BridgeError::MalformedEnvelope(format!("invalid pointcloud meta json: {e}")))?;

    let id = meta_field(&value, "id")?;
    let chunk = meta_field(&value, "chunk")?;
    let total = meta_field(&value, "total")?;

    if total == 0 {
        return Err(BridgeError::MalformedEnvelope(
            "pointcloud meta total must be positive".into(),
        ));
    }
    if chunk >= total {
        return Err(BridgeError::MalformedEnvelope(format!(
            "pointcloud meta chunk {chunk} out of range for total {total}"
        )));
    }

    Ok(FrameMeta { id, chunk, total })
}

fn meta_field(value: &Value, key: &str) -> Result<u32> {
    let v = value
        .get(key)
        .ok_or_else(|| BridgeError::MalformedEnvelope(format!("pointcloud meta missing `{key}`")))?;

    let n = match v {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0 && *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };

    n.and_then(|n| u32::try_from(n).ok()).ok_or_else(|| {
        BridgeError::MalformedEnvelope(format!("pointcloud meta `{key}` is not a valid integer"))
    })
}

/// Parsed indexed fragment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexedFragment {
    pub frame_id: u32,
    pub index: u16,
    pub total: u16,
    /// Fragment bytes (zero-copy).
    pub payload: Bytes,
}

/// Decode an indexed fragment from bytes.
pub fn decode_indexed_fragment(mut buf: Bytes) -> Result<IndexedFragment> {
    if buf.remaining() < INDEXED_FRAGMENT_HEADER_LEN {
        return Err(BridgeError::MalformedEnvelope(
            "indexed fragment too short".into(),
        ));
    }

    let v = buf.get_u8();
    if v != INDEXED_FRAGMENT_VERSION {
        return Err(BridgeError::UnsupportedVersion);
    }

    let frame_id = buf.get_u32_le();
    let index = buf.get_u16_le();
    let total = buf.get_u16_le();

    if total == 0 || index >= total {
        return Err(BridgeError::MalformedEnvelope(format!(
            "indexed fragment index {index} out of range for total {total}"
        )));
    }

    // Remaining bytes are payload.
    let payload = buf.copy_to_bytes(buf.remaining());

    Ok(IndexedFragment {
        frame_id,
        index,
        total,
        payload,
    })
}

/// Encode an indexed fragment (used by senders and tests).
pub fn encode_indexed_fragment(frame_id: u32, index: u16, total: u16, payload: &[u8]) -> Bytes {
    let mut out = BytesMut::with_capacity(INDEXED_FRAGMENT_HEADER_LEN + payload.len());
    out.put_u8(INDEXED_FRAGMENT_VERSION);
    out.put_u32_le(frame_id);
    out.put_u16_le(index);
    out.put_u16_le(total);
    out.put_slice(payload);
    out.freeze()
}
