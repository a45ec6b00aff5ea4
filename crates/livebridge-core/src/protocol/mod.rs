//! Protocol modules (JSON envelope + point-cloud fragments).
//!
//! This module hosts the two wire formats sharing the data channel:
//! - Envelope: JSON objects discriminated by `packetType`.
//! - Point cloud: JSON metadata, raw fragments, and indexed binary fragments.
//!
//! All parsers are panic-free: malformed input is reported as `BridgeError`
//! instead of panicking or indexing raw buffers.

pub mod envelope;
pub mod pointcloud;
