//! Inbound routing.
//!
//! Re-exports the router and handler traits so downstream consumers can
//! depend on this module directly.

pub mod router;

pub use router::{Dispatch, HandlerFn, PacketHandler, Registration, TopicHandler, TopicRouter};
