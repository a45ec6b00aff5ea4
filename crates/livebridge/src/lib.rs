//! Top-level facade crate for livebridge.
//!
//! Re-exports the wire contracts and the bridge runtime so users can depend on a single crate.

pub mod core {
    pub use livebridge_core::*;
}

pub mod gateway {
    pub use livebridge_gateway::*;
}

pub use livebridge_gateway::Bridge;
