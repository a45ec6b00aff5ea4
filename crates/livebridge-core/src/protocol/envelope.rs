//! JSON envelope for the message / service / action sub-protocols.
//!
//! Outbound packets are typed structs serialized with camelCase field names.
//! Inbound packets are decoded once into an [`InboundEnvelope`] that keeps the
//! whole object, since callbacks receive the full payload mapping.

use std::time::{SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{BridgeError, Result};

/// Schema-free key/value payload carried by envelopes.
pub type Payload = Map<String, Value>;

/// Discriminator selecting the sub-protocol an envelope belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PacketType {
    #[serde(rename = "ros2_message")]
    Message,
    #[serde(rename = "ros2_service_call")]
    ServiceCall,
    #[serde(rename = "ros2_service_response")]
    ServiceResponse,
    #[serde(rename = "ros2_action_send_goal")]
    ActionGoal,
    #[serde(rename = "ros2_action_goal_response")]
    ActionGoalResponse,
    #[serde(rename = "ros2_action_feedback")]
    ActionFeedback,
    #[serde(rename = "ros2_action_result")]
    ActionResult,
    #[serde(rename = "ros2_action_cancel_goal")]
    ActionCancel,
}

impl PacketType {
    pub const ALL: [PacketType; 8] = [
        PacketType::Message,
        PacketType::ServiceCall,
        PacketType::ServiceResponse,
        PacketType::ActionGoal,
        PacketType::ActionGoalResponse,
        PacketType::ActionFeedback,
        PacketType::ActionResult,
        PacketType::ActionCancel,
    ];

    /// Wire token for this packet type.
    pub fn as_str(self) -> &'static str {
        match self {
            PacketType::Message => "ros2_message",
            PacketType::ServiceCall => "ros2_service_call",
            PacketType::ServiceResponse => "ros2_service_response",
            PacketType::ActionGoal => "ros2_action_send_goal",
            PacketType::ActionGoalResponse => "ros2_action_goal_response",
            PacketType::ActionFeedback => "ros2_action_feedback",
            PacketType::ActionResult => "ros2_action_result",
            PacketType::ActionCancel => "ros2_action_cancel_goal",
        }
    }

    /// Parse a wire token. Unknown tokens yield `None`.
    pub fn from_wire(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|p| p.as_str() == s)
    }
}

/// Current wall-clock time as floating-point seconds since the Unix epoch.
pub fn unix_timestamp() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as f64 / 1000.0)
        .unwrap_or(0.0)
}

/// `ros2_message`: a published topic message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePacket {
    pub packet_type: PacketType,
    pub topic_name: String,
    pub message_type: String,
    pub data: Payload,
    pub timestamp: f64,
    pub sequence_id: u64,
}

impl MessagePacket {
    pub fn new(
        topic_name: impl Into<String>,
        message_type: impl Into<String>,
        data: Payload,
        timestamp: f64,
        sequence_id: u64,
    ) -> Self {
        Self {
            packet_type: PacketType::Message,
            topic_name: topic_name.into(),
            message_type: message_type.into(),
            data,
            timestamp,
            sequence_id,
        }
    }
}

/// `ros2_service_call`: a request correlated by `request_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceCallPacket {
    pub packet_type: PacketType,
    pub service_name: String,
    pub service_type: String,
    pub request: Payload,
    pub request_id: String,
    pub timestamp: f64,
}

impl ServiceCallPacket {
    pub fn new(
        service_name: impl Into<String>,
        service_type: impl Into<String>,
        request: Payload,
        request_id: impl Into<String>,
    ) -> Self {
        Self {
            packet_type: PacketType::ServiceCall,
            service_name: service_name.into(),
            service_type: service_type.into(),
            request,
            request_id: request_id.into(),
            timestamp: unix_timestamp(),
        }
    }
}

/// `ros2_action_send_goal`: a goal correlated by `goal_id`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionGoalPacket {
    pub packet_type: PacketType,
    pub action_name: String,
    pub action_type: String,
    pub goal: Payload,
    pub goal_id: String,
    pub timestamp: f64,
}

impl ActionGoalPacket {
    pub fn new(
        action_name: impl Into<String>,
        action_type: impl Into<String>,
        goal: Payload,
        goal_id: impl Into<String>,
    ) -> Self {
        Self {
            packet_type: PacketType::ActionGoal,
            action_name: action_name.into(),
            action_type: action_type.into(),
            goal,
            goal_id: goal_id.into(),
            timestamp: unix_timestamp(),
        }
    }
}

/// `ros2_action_cancel_goal`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionCancelPacket {
    pub packet_type: PacketType,
    pub action_name: String,
    pub goal_id: String,
    pub timestamp: f64,
}

impl ActionCancelPacket {
    pub fn new(action_name: impl Into<String>, goal_id: impl Into<String>) -> Self {
        Self {
            packet_type: PacketType::ActionCancel,
            action_name: action_name.into(),
            goal_id: goal_id.into(),
            timestamp: unix_timestamp(),
        }
    }
}

/// Serialize an outbound packet to UTF-8 JSON bytes.
pub fn encode<T: Serialize>(packet: &T) -> Result<Bytes> {
    serde_json::to_vec(packet)
        .map(Bytes::from)
        .map_err(|e| BridgeError::Internal(format!("envelope encode failed: {e}")))
}

/// Decoded inbound envelope.
#[derive(Debug, Clone)]
pub struct InboundEnvelope {
    packet_type: Option<PacketType>,
    body: Payload,
}

impl InboundEnvelope {
    /// Known packet type, or `None` when missing or unrecognized.
    pub fn packet_type(&self) -> Option<PacketType> {
        self.packet_type
    }

    /// The raw `packetType` token as sent by the peer.
    pub fn raw_packet_type(&self) -> Option<&str> {
        self.body.get("packetType").and_then(Value::as_str)
    }

    pub fn body(&self) -> &Payload {
        &self.body
    }

    pub fn into_body(self) -> Payload {
        self.body
    }

    pub fn request_id(&self) -> Option<String> {
        self.body.get("requestId").and_then(correlation_id)
    }

    pub fn goal_id(&self) -> Option<String> {
        self.body.get("goalId").and_then(correlation_id)
    }

    pub fn topic_name(&self) -> Option<&str> {
        self.body.get("topicName").and_then(Value::as_str)
    }

    /// `accepted` flag of a goal response. Missing or unreadable means rejected.
    pub fn accepted(&self) -> bool {
        is_accepted(&self.body)
    }
}

/// Read the `accepted` flag of a goal-response payload: a bool, or the
/// string "true" in any case. Anything else is a rejection.
pub fn is_accepted(body: &Payload) -> bool {
    match body.get("accepted") {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => s.trim().eq_ignore_ascii_case("true"),
        _ => false,
    }
}

/// Decode inbound bytes into an envelope.
///
/// Fails only when the bytes are not a JSON object. A missing or unknown
/// `packetType` is not an error; the router ignores such envelopes.
pub fn decode_envelope(bytes: &[u8]) -> Result<InboundEnvelope> {
    let value: Value = serde_json::from_slice(bytes)
        .map_err(|e| BridgeError::MalformedEnvelope(format!("invalid envelope json: {e}")))?;

    let Value::Object(body) = value else {
        return Err(BridgeError::MalformedEnvelope(
            "envelope must be a json object".into(),
        ));
    };

    let packet_type = body
        .get("packetType")
        .and_then(Value::as_str)
        .and_then(PacketType::from_wire);

    Ok(InboundEnvelope { packet_type, body })
}

/// Correlation ids are compared verbatim as text; numeric ids use their
/// decimal form.
fn correlation_id(v: &Value) -> Option<String> {
    match v {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
