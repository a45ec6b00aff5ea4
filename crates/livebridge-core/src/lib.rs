//! livebridge core: transport-agnostic wire contracts for the ROS 2 data bridge.
//!
//! This crate defines the envelope codec, point-cloud fragment formats, typed
//! ROS 2 messages, and the error surface shared by the gateway and tooling. It
//! carries no transport or runtime dependencies.
//!
//! # Defensive guarantees
//! Panics, `unwrap`, and `expect` are compile-denied here.
//! All fallible paths surface as `BridgeError`/`Result` so a malformed packet
//! from a peer never takes the process down.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod error;
pub mod messages;
pub mod protocol;

/// Shared result type.
pub use error::{BridgeError, ErrorCode, Result};
pub use protocol::envelope::{Payload, PacketType};
