//! livebridge gateway library entry.
//!
//! Wires the transport seam, router, publish/subscribe, service and action
//! correlation, and point-cloud reassembly into one [`bridge::Bridge`]. It is
//! consumed by the replay binary (`main.rs`), by integration tests, and by
//! hosts that own the real room session.

#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod obs;
pub mod pointcloud;
pub mod pubsub;
pub mod rpc;
pub mod teleop;
pub mod transport;

pub use bridge::Bridge;
