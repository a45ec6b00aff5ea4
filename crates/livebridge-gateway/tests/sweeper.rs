#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::oneshot;

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::envelope::Payload;
use livebridge_gateway::config;
use livebridge_gateway::pointcloud::LogFrameSink;
use livebridge_gateway::rpc::GoalCallbacks;
use livebridge_gateway::transport::ChannelTransport;
use livebridge_gateway::Bridge;

const FAST: &str = r#"
version: 1
bridge:
  call_timeout_ms: 100
  goal_idle_timeout_ms: 1000
  sweep_interval_ms: 10
"#;

#[tokio::test]
async fn sweeper_times_out_stale_calls_and_goals() {
    let cfg = config::load_from_str(FAST).unwrap();
    let (transport, _outbound) = ChannelTransport::new(16);
    let bridge = Arc::new(Bridge::new(cfg, transport, Arc::new(LogFrameSink)).unwrap());
    let sweeper = bridge.spawn_sweeper();

    let (call_tx, call_rx) = oneshot::channel();
    bridge
        .call_service("slow", "t/srv/Slow", Payload::new(), move |r: Result<Payload>| {
            let _ = call_tx.send(r);
        })
        .unwrap();

    let (goal_tx, goal_rx) = oneshot::channel();
    bridge
        .send_goal(
            "/slow",
            "t/action/Slow",
            Payload::new(),
            GoalCallbacks::new().on_result(move |r: Result<Payload>| {
                let _ = goal_tx.send(r);
            }),
        )
        .unwrap();

    let call = tokio::time::timeout(Duration::from_secs(5), call_rx)
        .await
        .expect("call must time out")
        .unwrap();
    assert_eq!(call, Err(BridgeError::Timeout));

    let goal = tokio::time::timeout(Duration::from_secs(5), goal_rx)
        .await
        .expect("goal must time out")
        .unwrap();
    assert_eq!(goal, Err(BridgeError::Timeout));

    assert_eq!(bridge.services().pending_count(), 0);
    assert_eq!(bridge.actions().active_goals(), 0);

    // The sweeper holds only a weak reference and exits once the bridge is gone.
    drop(bridge);
    tokio::time::timeout(Duration::from_secs(5), sweeper)
        .await
        .expect("sweeper must stop")
        .unwrap();
}
