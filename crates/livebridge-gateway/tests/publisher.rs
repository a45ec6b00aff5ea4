#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]


use serde_json::json;

use livebridge_core::error::BridgeError;
use livebridge_core::messages::{
    CustomMessage, Float64, Header, StringMessage, Time, Twist, TwistStamped, Vector3,
};
use livebridge_gateway::transport::Reliability;

#[test]
fn sequence_ids_start_at_one_and_increase() {
    let mut h = harness::harness();
    let publisher = h.bridge.create_publisher::<StringMessage>("chatter");

    for expected in 1..=3u64 {
        let seq = publisher.publish(&StringMessage::new(format!("hello {expected}"))).unwrap();
        assert_eq!(seq, expected);
    }
    assert_eq!(publisher.last_sequence(), 3);

    let sent = h.sent();
    let seqs: Vec<u64> = sent.iter().map(|v| v["sequenceId"].as_u64().unwrap()).collect();
    assert_eq!(seqs, vec![1, 2, 3]);
    assert_eq!(sent[2]["data"]["data"], "hello 3");
}

#[test]
fn sequence_counters_are_per_publisher() {
    let h = harness::harness();
    let a = h.bridge.create_publisher::<Float64>("a");
    let b = h.bridge.create_publisher::<Float64>("b");

    assert_eq!(a.publish(&Float64 { data: 1.0 }).unwrap(), 1);
    assert_eq!(a.publish(&Float64 { data: 2.0 }).unwrap(), 2);
    assert_eq!(b.publish(&Float64 { data: 3.0 }).unwrap(), 1);
}

#[test]
fn disconnected_publish_fails_without_sending_or_consuming_an_id() {
    let mut h = harness::harness();
    let publisher = h.bridge.create_publisher::<Twist>("cmd_vel");
    assert_eq!(publisher.publish(&Twist::default()).unwrap(), 1);

    h.transport.set_connected(false);
    let err = publisher.publish(&Twist::default()).unwrap_err();
    assert_eq!(err, BridgeError::NotConnected);
    assert_eq!(err.code().as_str(), "NOT_CONNECTED");

    h.transport.set_connected(true);
    assert_eq!(publisher.publish(&Twist::default()).unwrap(), 2);
    assert_eq!(h.sent().len(), 2);
}

#[test]
fn envelope_layout_is_camel_case() {
    let mut h = harness::harness();
    let publisher = h.bridge.create_publisher::<Twist>("cmd_vel");
    let twist = Twist {
        linear: Vector3::new(0.5, 0.0, 0.0),
        angular: Vector3::new(0.0, 0.0, -0.25),
    };
    publisher.publish(&twist).unwrap();

    let packets = h.sent_packets();
    assert_eq!(packets.len(), 1);
    assert_eq!(packets[0].reliability, Reliability::Reliable);
    assert!(packets[0].topic.is_none());

    let v: serde_json::Value = serde_json::from_slice(&packets[0].payload).unwrap();
    assert_eq!(v["packetType"], "ros2_message");
    assert_eq!(v["topicName"], "cmd_vel");
    assert_eq!(v["messageType"], "geometry_msgs/msg/Twist");
    assert_eq!(v["data"]["linear"], json!({"x": 0.5, "y": 0.0, "z": 0.0}));
    assert_eq!(v["data"]["angular"]["z"], -0.25);
    assert_eq!(v["sequenceId"], 1);
    assert!(v["timestamp"].as_f64().unwrap() > 0.0);
}

#[test]
fn reliability_default_and_override() {
    let mut h = harness::harness();
    let lossy = h
        .bridge
        .create_publisher_with::<Twist>("cmd_vel", Reliability::Lossy);
    lossy.publish(&Twist::default()).unwrap();
    lossy.publish_with(&Twist::default(), Reliability::Reliable).unwrap();

    let packets = h.sent_packets();
    assert_eq!(packets[0].reliability, Reliability::Lossy);
    assert_eq!(packets[1].reliability, Reliability::Reliable);
}

#[test]
fn stamped_message_uses_header_stamp_as_timestamp() {
    let mut h = harness::harness();
    let publisher = h.bridge.create_publisher::<TwistStamped>("servo_node/delta_twist_cmds");
    let msg = TwistStamped {
        header: Header {
            frame_id: "link_grasp_center".into(),
            stamp: Time { sec: 100, nanosec: 500_000_000 },
        },
        twist: Twist::default(),
    };
    publisher.publish(&msg).unwrap();

    let v = &h.sent()[0];
    assert_eq!(v["timestamp"].as_f64().unwrap(), 100.5);
    assert_eq!(v["data"]["header"]["frame_id"], "link_grasp_center");
    assert_eq!(v["data"]["header"]["stamp"]["sec"], 100);
}

#[test]
fn custom_publisher_carries_declared_type_and_payload() {
    let mut h = harness::harness();
    let publisher = h
        .bridge
        .create_custom_publisher("/diagnostics", "diagnostic_msgs/msg/KeyValue");
    let mut data = serde_json::Map::new();
    data.insert("key".into(), json!("battery"));
    data.insert("value".into(), json!("87"));
    publisher
        .publish(&CustomMessage::new("diagnostic_msgs/msg/KeyValue", data))
        .unwrap();

    let v = &h.sent()[0];
    assert_eq!(v["messageType"], "diagnostic_msgs/msg/KeyValue");
    assert_eq!(v["data"], json!({"key": "battery", "value": "87"}));
}

#[test]
fn full_queue_surfaces_send_failure_for_reliable_publish() {
    let h = harness::harness_with(Default::default(), 1);
    let publisher = h.bridge.create_publisher::<Float64>("x");
    publisher.publish(&Float64 { data: 1.0 }).unwrap();

    let err = publisher.publish(&Float64 { data: 2.0 }).unwrap_err();
    assert_eq!(err.code().as_str(), "SEND_FAILURE");

    // Lossy sends drop silently instead.
    publisher
        .publish_with(&Float64 { data: 3.0 }, Reliability::Lossy)
        .unwrap();
    assert_eq!(h.transport.dropped(), 1);
}
