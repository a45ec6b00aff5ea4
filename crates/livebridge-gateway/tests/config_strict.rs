#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use livebridge_gateway::config;

#[test]
fn deny_unknown_fields_nested() {
    let bad = r#"
version: 1
pointcloud:
  window_frame: 4 # typo should fail
"#;

    let err = config::load_from_str(bad).expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}

#[test]
fn ok_minimal_config() {
    let cfg = config::load_from_str("version: 1\n").expect("must parse");
    assert_eq!(cfg.version, 1);
    assert_eq!(cfg.bridge.call_timeout_ms, 10_000);
    assert_eq!(cfg.bridge.goal_idle_timeout_ms, 120_000);
    assert_eq!(cfg.pointcloud.meta_topic, "pointcloud:meta");
    assert_eq!(cfg.pointcloud.data_topic, "pointcloud");
    assert_eq!(cfg.pointcloud.indexed_topic, "pointcloud:indexed");
    assert_eq!(cfg.pointcloud.window_frames, 3);
    assert_eq!(cfg.pointcloud.max_frame_bytes, 1024 * 1024);
    assert_eq!(cfg.teleop.publish_hz, 30);
    assert!(!cfg.teleop.lossy_velocity);
}

#[test]
fn full_config_overrides_defaults() {
    let ok = r#"
version: 1
bridge:
  call_timeout_ms: 2000
  goal_idle_timeout_ms: 5000
  sweep_interval_ms: 50
pointcloud:
  meta_topic: "pc:meta"
  data_topic: "pc"
  indexed_topic: "pc:idx"
  window_frames: 5
  max_frame_bytes: 4096
teleop:
  publish_hz: 60
  lossy_velocity: true
"#;
    let cfg = config::load_from_str(ok).expect("must parse");
    assert_eq!(cfg.bridge.call_timeout().as_millis(), 2000);
    assert_eq!(cfg.bridge.sweep_interval().as_millis(), 50);
    assert_eq!(cfg.pointcloud.window_frames, 5);
    assert_eq!(cfg.teleop.publish_hz, 60);
    assert!(cfg.teleop.lossy_velocity);
}

#[test]
fn unsupported_version_rejected() {
    let err = config::load_from_str("version: 2\n").expect_err("must fail");
    assert_eq!(err.code().as_str(), "UNSUPPORTED_VERSION");
}

#[test]
fn out_of_range_values_rejected() {
    let cases = [
        "version: 1\nbridge:\n  call_timeout_ms: 10\n",
        "version: 1\nbridge:\n  call_timeout_ms: 1000\n  sweep_interval_ms: 1000\n",
        "version: 1\npointcloud:\n  window_frames: 0\n",
        "version: 1\npointcloud:\n  max_frame_bytes: 10\n",
        "version: 1\nteleop:\n  publish_hz: 0\n",
    ];
    for yaml in cases {
        let err = config::load_from_str(yaml).expect_err(yaml);
        assert_eq!(err.code().as_str(), "BAD_CONFIG", "{yaml}");
    }
}

#[test]
fn pointcloud_topics_must_be_distinct_and_non_empty() {
    let same = "version: 1\npointcloud:\n  meta_topic: pointcloud\n";
    assert_eq!(
        config::load_from_str(same).expect_err("must fail").code().as_str(),
        "BAD_CONFIG"
    );

    let empty = "version: 1\npointcloud:\n  indexed_topic: \"\"\n";
    assert_eq!(
        config::load_from_str(empty).expect_err("must fail").code().as_str(),
        "BAD_CONFIG"
    );
}

#[test]
fn missing_file_is_bad_config() {
    let err = config::load_from_file("/nonexistent/livebridge.yaml").expect_err("must fail");
    assert_eq!(err.code().as_str(), "BAD_CONFIG");
}
