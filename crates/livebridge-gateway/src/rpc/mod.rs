//! Correlated request/response traffic: service calls and actions.

pub mod action;
pub mod behavior;
pub mod pending;
pub mod service;

pub use action::{ActionCoordinator, GoalCallbacks, GoalStatus};
pub use behavior::{execute_behavior, execute_tree, BehaviorTree};
pub use pending::PendingTable;
pub use service::{ServiceCallback, ServiceCaller};

/// Fresh process-unique correlation id.
pub fn new_correlation_id() -> String {
    uuid::Uuid::new_v4().to_string()
}
