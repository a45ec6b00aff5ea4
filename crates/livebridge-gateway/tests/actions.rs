#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]


use std::sync::{Arc, Mutex};
use std::thread;
use std::time::{Duration, Instant};

use serde_json::{json, Value};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::envelope::{PacketType, Payload};
use livebridge_gateway::dispatch::Dispatch;
use livebridge_gateway::rpc::{BehaviorTree, GoalCallbacks, GoalStatus};

type Events = Arc<Mutex<Vec<String>>>;

/// Callbacks that append one line per event.
fn recording_callbacks(events: &Events) -> GoalCallbacks {
    let (r, f, d) = (Arc::clone(events), Arc::clone(events), Arc::clone(events));
    GoalCallbacks::new()
        .on_goal_response(move |p: &Payload| {
            r.lock().unwrap().push(format!("response:{}", p["accepted"]));
        })
        .on_feedback(move |p: &Payload| {
            f.lock().unwrap().push(format!("feedback:{}", p["progress"]));
        })
        .on_result(move |res: Result<Payload>| {
            let line = match res {
                Ok(p) => format!("result:{}", p["status"]),
                Err(e) => format!("error:{}", e.code().as_str()),
            };
            d.lock().unwrap().push(line);
        })
}

fn goal_response(goal_id: &str, accepted: Value) -> Value {
    json!({"packetType": "ros2_action_goal_response", "goalId": goal_id, "accepted": accepted})
}

fn feedback(goal_id: &str, progress: u32) -> Value {
    json!({"packetType": "ros2_action_feedback", "goalId": goal_id, "progress": progress})
}

fn result(goal_id: &str, status: Value) -> Value {
    json!({"packetType": "ros2_action_result", "goalId": goal_id, "status": status})
}

#[test]
fn accepted_goal_runs_to_result_in_order() {
    let mut h = harness::harness();
    let events: Events = Arc::default();

    let goal_id = h
        .bridge
        .send_goal(
            "/navigate",
            "nav2_msgs/action/NavigateToPose",
            json!({"x": 1.0}).as_object().cloned().unwrap(),
            recording_callbacks(&events),
        )
        .unwrap();

    let sent = h.sent();
    assert_eq!(sent[0]["packetType"], "ros2_action_send_goal");
    assert_eq!(sent[0]["actionName"], "/navigate");
    assert_eq!(sent[0]["actionType"], "nav2_msgs/action/NavigateToPose");
    assert_eq!(sent[0]["goal"], json!({"x": 1.0}));
    assert_eq!(sent[0]["goalId"], goal_id.as_str());

    assert_eq!(
        h.deliver(goal_response(&goal_id, json!(true))),
        Dispatch::Packet(PacketType::ActionGoalResponse)
    );
    assert!(h.bridge.actions().is_accepted(&goal_id));
    h.deliver(feedback(&goal_id, 1));
    h.deliver(feedback(&goal_id, 2));
    h.deliver(result(&goal_id, json!("succeeded")));
    h.deliver(result(&goal_id, json!("succeeded")));
    h.deliver(feedback(&goal_id, 3));

    assert_eq!(
        *events.lock().unwrap(),
        vec![
            "response:true",
            "feedback:1",
            "feedback:2",
            "result:\"succeeded\""
        ]
    );
    assert!(!h.bridge.actions().is_active(&goal_id));
}

#[test]
fn rejected_goal_gets_response_only() {
    let h = harness::harness();
    let events: Events = Arc::default();
    let goal_id = h
        .bridge
        .send_goal("/arm", "t/action/Move", Payload::new(), recording_callbacks(&events))
        .unwrap();

    h.deliver(goal_response(&goal_id, json!(false)));
    assert!(!h.bridge.actions().is_active(&goal_id));

    h.deliver(feedback(&goal_id, 1));
    h.deliver(result(&goal_id, json!(4)));
    assert_eq!(*events.lock().unwrap(), vec!["response:false"]);
}

#[test]
fn accepted_flag_as_string_and_missing() {
    let h = harness::harness();

    let events: Events = Arc::default();
    let a = h
        .bridge
        .send_goal("/a", "t/action/A", Payload::new(), recording_callbacks(&events))
        .unwrap();
    h.deliver(goal_response(&a, json!("TRUE")));
    assert!(h.bridge.actions().is_active(&a));
    assert!(h.bridge.actions().is_accepted(&a));

    let b = h
        .bridge
        .send_goal("/b", "t/action/B", Payload::new(), recording_callbacks(&events))
        .unwrap();
    h.deliver(json!({"packetType": "ros2_action_goal_response", "goalId": b}));
    assert!(!h.bridge.actions().is_active(&b));
}

#[test]
fn goal_without_callbacks_keeps_no_session() {
    let mut h = harness::harness();
    let goal_id = h
        .bridge
        .send_goal("/a", "t/action/A", Payload::new(), GoalCallbacks::new())
        .unwrap();
    assert_eq!(h.bridge.actions().active_goals(), 0);
    assert_eq!(h.sent()[0]["goalId"], goal_id.as_str());
}

#[test]
fn feedback_only_callbacks_still_track_the_goal() {
    let h = harness::harness();
    let seen = Arc::new(Mutex::new(0));
    let s = Arc::clone(&seen);
    let goal_id = h
        .bridge
        .send_goal(
            "/a",
            "t/action/A",
            Payload::new(),
            GoalCallbacks::new().on_feedback(move |_: &Payload| *s.lock().unwrap() += 1),
        )
        .unwrap();

    h.deliver(goal_response(&goal_id, json!(true)));
    h.deliver(feedback(&goal_id, 1));
    h.deliver(result(&goal_id, json!("succeeded")));
    assert_eq!(*seen.lock().unwrap(), 1);
    assert!(!h.bridge.actions().is_active(&goal_id));
}

#[test]
fn cancel_sends_request_and_keeps_callbacks() {
    let mut h = harness::harness();
    let events: Events = Arc::default();
    let goal_id = h
        .bridge
        .send_goal("/arm", "t/action/Move", Payload::new(), recording_callbacks(&events))
        .unwrap();
    h.sent();

    h.bridge.cancel_goal("/arm", &goal_id).unwrap();
    let sent = h.sent();
    assert_eq!(sent[0]["packetType"], "ros2_action_cancel_goal");
    assert_eq!(sent[0]["actionName"], "/arm");
    assert_eq!(sent[0]["goalId"], goal_id.as_str());
    assert!(h.bridge.actions().is_active(&goal_id));
    assert!(events.lock().unwrap().is_empty());

    h.deliver(result(&goal_id, json!(5)));
    assert_eq!(*events.lock().unwrap(), vec!["result:5"]);
}

#[test]
fn disconnected_send_and_cancel_fail() {
    let mut h = harness::harness();
    h.transport.set_connected(false);
    let events: Events = Arc::default();

    let err = h
        .bridge
        .send_goal("/a", "t/action/A", Payload::new(), recording_callbacks(&events))
        .unwrap_err();
    assert_eq!(err, BridgeError::NotConnected);
    assert_eq!(h.bridge.actions().active_goals(), 0);

    assert_eq!(
        h.bridge.cancel_goal("/a", "whatever").unwrap_err(),
        BridgeError::NotConnected
    );
    assert!(h.sent().is_empty());
}

#[test]
fn send_failure_rolls_back_session() {
    let h = harness::harness_with(Default::default(), 1);
    let events: Events = Arc::default();
    h.bridge
        .send_goal("/a", "t/action/A", Payload::new(), recording_callbacks(&events))
        .unwrap();
    let err = h
        .bridge
        .send_goal("/b", "t/action/B", Payload::new(), recording_callbacks(&events))
        .unwrap_err();
    assert_eq!(err.code().as_str(), "SEND_FAILURE");
    assert_eq!(h.bridge.actions().active_goals(), 1);
}

#[test]
fn idle_goal_times_out_with_result_error() {
    let h = harness::harness();
    let events: Events = Arc::default();
    let goal_id = h
        .bridge
        .actions()
        .send_goal_with_timeout(
            "/a",
            "t/action/A",
            Payload::new(),
            recording_callbacks(&events),
            Duration::from_millis(100),
        )
        .unwrap();

    assert_eq!(h.bridge.sweep_expired(Instant::now() + Duration::from_secs(1)), 1);
    h.deliver(result(&goal_id, json!("succeeded")));
    assert_eq!(*events.lock().unwrap(), vec!["error:TIMEOUT"]);
    assert_eq!(h.bridge.metrics().timeouts.get(&[("kind", "goal")]), 1);
}

#[test]
fn feedback_refreshes_idle_deadline() {
    let h = harness::harness();
    let events: Events = Arc::default();
    let goal_id = h
        .bridge
        .actions()
        .send_goal_with_timeout(
            "/a",
            "t/action/A",
            Payload::new(),
            recording_callbacks(&events),
            Duration::from_millis(200),
        )
        .unwrap();
    h.deliver(goal_response(&goal_id, json!(true)));

    thread::sleep(Duration::from_millis(120));
    h.deliver(feedback(&goal_id, 1));

    // Past the original deadline, inside the refreshed one.
    assert_eq!(h.bridge.sweep_expired(Instant::now() + Duration::from_millis(100)), 0);
    assert!(h.bridge.actions().is_active(&goal_id));
}

#[test]
fn action_packet_without_goal_id_is_a_handler_error() {
    let h = harness::harness();
    assert_eq!(
        h.deliver(json!({"packetType": "ros2_action_feedback", "progress": 1})),
        Dispatch::HandlerFailed
    );
}

#[test]
fn goal_status_interpretation() {
    let cases = [
        (json!("succeeded"), GoalStatus::Succeeded),
        (json!("SUCCESS"), GoalStatus::Succeeded),
        (json!(4), GoalStatus::Succeeded),
        (json!("4"), GoalStatus::Succeeded),
        (json!("aborted"), GoalStatus::Aborted),
        (json!(6), GoalStatus::Aborted),
        (json!("canceled"), GoalStatus::Canceled),
        (json!(5), GoalStatus::Canceled),
        (json!(2), GoalStatus::Executing),
        (json!("bogus"), GoalStatus::Unknown),
        (json!(null), GoalStatus::Unknown),
        (json!(4.5), GoalStatus::Unknown),
    ];
    for (value, expected) in cases {
        assert_eq!(GoalStatus::from_value(&value), expected, "{value}");
    }

    assert!(GoalStatus::from_result(json!({"status": 4}).as_object().unwrap()).is_success());
    assert!(!GoalStatus::from_result(&Payload::new()).is_success());
}

fn behavior_outcomes() -> (Arc<Mutex<Vec<bool>>>, impl FnOnce(bool) + Send + 'static) {
    let log = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&log);
    (log, move |ok: bool| sink.lock().unwrap().push(ok))
}

#[test]
fn behavior_goal_layout() {
    let mut h = harness::harness();
    h.bridge.trigger_behavior(BehaviorTree::ArmSleepPose).unwrap();

    let sent = h.sent();
    assert_eq!(sent[0]["actionName"], "/behavior_server");
    assert_eq!(sent[0]["actionType"], "btcpp_ros2_interfaces/action/ExecuteTree");
    assert_eq!(sent[0]["goal"], json!({"target_tree": "ArmSleepPoseBT"}));
}

#[test]
fn behavior_reports_success_per_status() {
    for (status, expected) in [
        (json!("SUCCEEDED"), true),
        (json!(4), true),
        (json!("aborted"), false),
        (json!(6), false),
    ] {
        let h = harness::harness();
        let (log, cb) = behavior_outcomes();
        let goal_id = h
            .bridge
            .execute_behavior(BehaviorTree::EnterTeleopMode, cb)
            .unwrap();
        h.deliver(goal_response(&goal_id, json!(true)));
        h.deliver(feedback(&goal_id, 1));
        h.deliver(result(&goal_id, status.clone()));
        assert_eq!(*log.lock().unwrap(), vec![expected], "status {status}");
    }
}

#[test]
fn behavior_rejection_and_timeout_report_false_once() {
    let h = harness::harness();

    let (rejected, cb) = behavior_outcomes();
    let goal_id = h
        .bridge
        .execute_behavior(BehaviorTree::EnterMovebaseMode, cb)
        .unwrap();
    h.deliver(goal_response(&goal_id, json!(false)));
    h.deliver(result(&goal_id, json!("succeeded")));
    assert_eq!(*rejected.lock().unwrap(), vec![false]);

    let (timed_out, cb) = behavior_outcomes();
    h.bridge
        .execute_behavior(BehaviorTree::ExitMovebaseMode, cb)
        .unwrap();
    h.bridge
        .sweep_expired(Instant::now() + Duration::from_secs(3600));
    assert_eq!(*timed_out.lock().unwrap(), vec![false]);
}

#[test]
fn behavior_send_error_skips_completion() {
    let h = harness::harness();
    h.transport.set_connected(false);
    let (log, cb) = behavior_outcomes();
    let err = h
        .bridge
        .execute_behavior(BehaviorTree::ArmReadyPickPose, cb)
        .unwrap_err();
    assert_eq!(err, BridgeError::NotConnected);
    assert!(log.lock().unwrap().is_empty());
}

#[test]
fn behavior_tree_names() {
    let names: Vec<(&str, &str)> = BehaviorTree::ALL
        .iter()
        .map(|t| (t.tree_name(), t.label()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("EnterTeleopModeBT", "teleop_start"),
            ("ExitTeleopModeBT", "teleop_stop"),
            ("EnterMovebaseModeBT", "movebase_control_start"),
            ("ExitMovebaseModeBT", "movebase_control_stop"),
            ("ArmReadyPickPoseBT", "goto_pick_pose"),
            ("ArmReadyTapPoseBT", "goto_tap_pose"),
            ("ArmSleepPoseBT", "goto_sleep_pose"),
        ]
    );
}
