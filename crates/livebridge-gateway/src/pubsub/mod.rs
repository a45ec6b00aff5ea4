//! Topic publish/subscribe over `ros2_message` envelopes.

pub mod publisher;
pub mod subscription;

pub use publisher::Publisher;
pub use subscription::{MessageCallback, Subscription, SubscriptionTable};
