//! Behavior-tree execution on top of [`ActionCoordinator`].

use std::sync::{Arc, Mutex};

use serde_json::Value;
use tracing::{debug, info, warn};

use livebridge_core::error::Result;
use livebridge_core::protocol::envelope::{is_accepted, Payload};

use super::action::{ActionCoordinator, GoalCallbacks, GoalStatus};

pub const BEHAVIOR_SERVER: &str = "/behavior_server";
pub const EXECUTE_TREE_TYPE: &str = "btcpp_ros2_interfaces/action/ExecuteTree";

/// Trees installed on the robot's behavior server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorTree {
    EnterTeleopMode,
    ExitTeleopMode,
    EnterMovebaseMode,
    ExitMovebaseMode,
    ArmReadyPickPose,
    ArmReadyTapPose,
    ArmSleepPose,
}

impl BehaviorTree {
    pub const ALL: [BehaviorTree; 7] = [
        BehaviorTree::EnterTeleopMode,
        BehaviorTree::ExitTeleopMode,
        BehaviorTree::EnterMovebaseMode,
        BehaviorTree::ExitMovebaseMode,
        BehaviorTree::ArmReadyPickPose,
        BehaviorTree::ArmReadyTapPose,
        BehaviorTree::ArmSleepPose,
    ];

    /// `target_tree` name on the server.
    pub fn tree_name(self) -> &'static str {
        match self {
            BehaviorTree::EnterTeleopMode => "EnterTeleopModeBT",
            BehaviorTree::ExitTeleopMode => "ExitTeleopModeBT",
            BehaviorTree::EnterMovebaseMode => "EnterMovebaseModeBT",
            BehaviorTree::ExitMovebaseMode => "ExitMovebaseModeBT",
            BehaviorTree::ArmReadyPickPose => "ArmReadyPickPoseBT",
            BehaviorTree::ArmReadyTapPose => "ArmReadyTapPoseBT",
            BehaviorTree::ArmSleepPose => "ArmSleepPoseBT",
        }
    }

    /// Short label used in logs.
    pub fn label(self) -> &'static str {
        match self {
            BehaviorTree::EnterTeleopMode => "teleop_start",
            BehaviorTree::ExitTeleopMode => "teleop_stop",
            BehaviorTree::EnterMovebaseMode => "movebase_control_start",
            BehaviorTree::ExitMovebaseMode => "movebase_control_stop",
            BehaviorTree::ArmReadyPickPose => "goto_pick_pose",
            BehaviorTree::ArmReadyTapPose => "goto_tap_pose",
            BehaviorTree::ArmSleepPose => "goto_sleep_pose",
        }
    }
}

type CompleteFn = Box<dyn FnOnce(bool) + Send + 'static>;

/// Fires the completion callback at most once across goal response, result
/// and timeout paths.
#[derive(Clone)]
struct CompleteOnce(Arc<Mutex<Option<CompleteFn>>>);

impl CompleteOnce {
    fn new(f: Option<CompleteFn>) -> Self {
        Self(Arc::new(Mutex::new(f)))
    }

    fn fire(&self, success: bool) {
        let cb = match self.0.lock() {
            Ok(mut g) => g.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if let Some(cb) = cb {
            cb(success);
        }
    }
}

/// Run `tree` on the behavior server. See [`execute_tree`].
pub fn execute_behavior(
    actions: &ActionCoordinator,
    tree: BehaviorTree,
    on_complete: Option<Box<dyn FnOnce(bool) + Send + 'static>>,
) -> Result<String> {
    execute_tree(actions, tree.tree_name(), tree.label(), on_complete)
}

/// Send an `ExecuteTree` goal for `tree_name`.
///
/// `on_complete` receives `false` on rejection or timeout and otherwise the
/// success of the result status. It is not called when the goal cannot be
/// sent; the error is returned instead.
pub fn execute_tree(
    actions: &ActionCoordinator,
    tree_name: &str,
    label: &str,
    on_complete: Option<Box<dyn FnOnce(bool) + Send + 'static>>,
) -> Result<String> {
    let mut goal = Payload::new();
    goal.insert("target_tree".into(), Value::String(tree_name.to_owned()));

    let done = CompleteOnce::new(on_complete);
    let on_rejected = done.clone();
    let on_finished = done;
    let label_response = label.to_owned();
    let label_feedback = label.to_owned();
    let label_result = label.to_owned();

    let callbacks = GoalCallbacks::new()
        .on_goal_response(move |resp: &Payload| {
            let accepted = is_accepted(resp);
            info!(behavior = %label_response, accepted, "behavior goal response");
            if !accepted {
                on_rejected.fire(false);
            }
        })
        .on_feedback(move |_: &Payload| {
            debug!(behavior = %label_feedback, "behavior executing");
        })
        .on_result(move |result: Result<Payload>| {
            let success = match result {
                Ok(body) => {
                    let status = GoalStatus::from_result(&body);
                    info!(behavior = %label_result, ?status, "behavior finished");
                    status.is_success()
                }
                Err(e) => {
                    warn!(behavior = %label_result, error = %e, "behavior did not finish");
                    false
                }
            };
            on_finished.fire(success);
        });

    let goal_id = actions.send_goal(BEHAVIOR_SERVER, EXECUTE_TREE_TYPE, goal, callbacks)?;
    debug!(behavior = label, %goal_id, "behavior goal sent");
    Ok(goal_id)
}
