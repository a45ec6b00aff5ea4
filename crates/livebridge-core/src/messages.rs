//! Typed ROS 2 messages carried in `ros2_message` envelopes.
//!
//! Each message serializes to the field layout the ROS side expects
//! (`geometry_msgs`, `std_msgs`, `sensor_msgs`). [`CustomMessage`] covers any
//! other type with a free-form payload.

use serde::Serialize;
use serde_json::Value;

use crate::protocol::envelope::{unix_timestamp, Payload};

/// A message that can be published on a topic.
pub trait RosMessage: Send {
    /// Fully qualified ROS type, e.g. `geometry_msgs/msg/Twist`.
    fn message_type(&self) -> &str;

    /// Payload placed in the envelope's `data` field.
    fn to_payload(&self) -> Payload;

    /// Envelope timestamp (seconds since epoch).
    fn timestamp(&self) -> f64 {
        unix_timestamp()
    }
}

fn payload_of<T: Serialize>(msg: &T) -> Payload {
    match serde_json::to_value(msg) {
        Ok(Value::Object(map)) => map,
        _ => Payload::new(),
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Vector3 {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Vector3 {
    pub fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Quaternion {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub w: f64,
}

impl Default for Quaternion {
    fn default() -> Self {
        Self { x: 0.0, y: 0.0, z: 0.0, w: 1.0 }
    }
}

/// `builtin_interfaces/Time`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Time {
    pub sec: i32,
    pub nanosec: u32,
}

impl Time {
    pub fn from_secs_f64(t: f64) -> Self {
        let sec = t.trunc();
        let nanosec = ((t - sec) * 1e9) as u32;
        Self { sec: sec as i32, nanosec }
    }

    pub fn as_secs_f64(self) -> f64 {
        f64::from(self.sec) + f64::from(self.nanosec) / 1e9
    }

    pub fn is_zero(self) -> bool {
        self.sec == 0 && self.nanosec == 0
    }
}

/// `std_msgs/Header`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Header {
    pub frame_id: String,
    pub stamp: Time,
}

impl Header {
    /// Header stamped with the current time.
    pub fn now(frame_id: impl Into<String>) -> Self {
        Self {
            frame_id: frame_id.into(),
            stamp: Time::from_secs_f64(unix_timestamp()),
        }
    }

    fn timestamp(&self) -> f64 {
        if self.stamp.is_zero() {
            unix_timestamp()
        } else {
            self.stamp.as_secs_f64()
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub position: Vector3,
    pub orientation: Quaternion,
}

/// `geometry_msgs/msg/Twist`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Twist {
    pub linear: Vector3,
    pub angular: Vector3,
}

impl RosMessage for Twist {
    fn message_type(&self) -> &str {
        "geometry_msgs/msg/Twist"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
}

/// `geometry_msgs/msg/TwistStamped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TwistStamped {
    pub header: Header,
    pub twist: Twist,
}

impl RosMessage for TwistStamped {
    fn message_type(&self) -> &str {
        "geometry_msgs/msg/TwistStamped"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
    fn timestamp(&self) -> f64 {
        self.header.timestamp()
    }
}

/// `geometry_msgs/msg/PoseStamped`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PoseStamped {
    pub header: Header,
    pub pose: Pose,
}

impl RosMessage for PoseStamped {
    fn message_type(&self) -> &str {
        "geometry_msgs/msg/PoseStamped"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
    fn timestamp(&self) -> f64 {
        self.header.timestamp()
    }
}

/// `std_msgs/msg/String`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StringMessage {
    pub data: String,
}

impl StringMessage {
    pub fn new(data: impl Into<String>) -> Self {
        Self { data: data.into() }
    }
}

impl RosMessage for StringMessage {
    fn message_type(&self) -> &str {
        "std_msgs/msg/String"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
}

/// `std_msgs/msg/Float64`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Float64 {
    pub data: f64,
}

impl RosMessage for Float64 {
    fn message_type(&self) -> &str {
        "std_msgs/msg/Float64"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
}

/// `sensor_msgs/msg/JointState`.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct JointState {
    pub name: Vec<String>,
    pub position: Vec<f64>,
    pub velocity: Vec<f64>,
    pub effort: Vec<f64>,
}

impl RosMessage for JointState {
    fn message_type(&self) -> &str {
        "sensor_msgs/msg/JointState"
    }
    fn to_payload(&self) -> Payload {
        payload_of(self)
    }
}

/// Any message type with a free-form payload.
#[derive(Debug, Clone, PartialEq)]
pub struct CustomMessage {
    pub message_type: String,
    pub data: Payload,
    pub timestamp: f64,
}

impl CustomMessage {
    pub fn new(message_type: impl Into<String>, data: Payload) -> Self {
        Self {
            message_type: message_type.into(),
            data,
            timestamp: unix_timestamp(),
        }
    }
}

impl RosMessage for CustomMessage {
    fn message_type(&self) -> &str {
        &self.message_type
    }
    fn to_payload(&self) -> Payload {
        self.data.clone()
    }
    fn timestamp(&self) -> f64 {
        self.timestamp
    }
}
