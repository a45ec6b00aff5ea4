//! Goal-oriented actions.
//!
//! A goal is submitted, answered with accept/reject, streams feedback while
//! running and ends with exactly one result. Sessions are keyed by the
//! generated goal id and carry an idle deadline refreshed by every goal
//! response and feedback packet.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde_json::Value;
use tracing::{debug, info, warn};

use livebridge_core::error::{BridgeError, Result};
use livebridge_core::protocol::envelope::{
    encode, ActionCancelPacket, ActionGoalPacket, InboundEnvelope, PacketType, Payload,
};

use crate::dispatch::PacketHandler;
use crate::obs::BridgeMetrics;
use crate::rpc::service::send_failure;
use crate::rpc::{new_correlation_id, PendingTable};
use crate::transport::{Reliability, Transport};

pub type GoalResponseFn = Box<dyn FnOnce(&Payload) + Send + 'static>;
pub type FeedbackFn = Arc<dyn Fn(&Payload) + Send + Sync + 'static>;
pub type ResultFn = Box<dyn FnOnce(Result<Payload>) + Send + 'static>;

/// Callbacks for one goal. All optional; a goal with none is fire-and-forget.
#[derive(Default)]
pub struct GoalCallbacks {
    on_goal_response: Option<GoalResponseFn>,
    on_feedback: Option<FeedbackFn>,
    on_result: Option<ResultFn>,
}

impl GoalCallbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_goal_response(mut self, f: impl FnOnce(&Payload) + Send + 'static) -> Self {
        self.on_goal_response = Some(Box::new(f));
        self
    }

    pub fn on_feedback(mut self, f: impl Fn(&Payload) + Send + Sync + 'static) -> Self {
        self.on_feedback = Some(Arc::new(f));
        self
    }

    pub fn on_result(mut self, f: impl FnOnce(Result<Payload>) + Send + 'static) -> Self {
        self.on_result = Some(Box::new(f));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.on_goal_response.is_none() && self.on_feedback.is_none() && self.on_result.is_none()
    }
}

struct GoalSession {
    action_name: String,
    callbacks: GoalCallbacks,
    accepted: bool,
}

/// Terminal status reported in `ros2_action_result`.
///
/// Codes follow `action_msgs/GoalStatus`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GoalStatus {
    Unknown,
    Accepted,
    Executing,
    Canceling,
    Succeeded,
    Canceled,
    Aborted,
}

impl GoalStatus {
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => Self::Accepted,
            2 => Self::Executing,
            3 => Self::Canceling,
            4 => Self::Succeeded,
            5 => Self::Canceled,
            6 => Self::Aborted,
            _ => Self::Unknown,
        }
    }

    /// Interpret a `status` value: integer code, numeric string, or name.
    pub fn from_value(v: &Value) -> Self {
        match v {
            Value::Number(n) => n.as_i64().map(Self::from_code).unwrap_or(Self::Unknown),
            Value::String(s) => {
                let s = s.trim();
                if let Ok(code) = s.parse::<i64>() {
                    return Self::from_code(code);
                }
                match s.to_ascii_lowercase().as_str() {
                    "succeeded" | "success" => Self::Succeeded,
                    "accepted" => Self::Accepted,
                    "executing" => Self::Executing,
                    "canceling" | "cancelling" => Self::Canceling,
                    "canceled" | "cancelled" => Self::Canceled,
                    "aborted" => Self::Aborted,
                    _ => Self::Unknown,
                }
            }
            _ => Self::Unknown,
        }
    }

    /// Status of a result payload; missing `status` is `Unknown`.
    pub fn from_result(payload: &Payload) -> Self {
        payload.get("status").map(Self::from_value).unwrap_or(Self::Unknown)
    }

    pub fn is_success(self) -> bool {
        self == Self::Succeeded
    }
}

/// Owns every live goal session.
pub struct ActionCoordinator {
    transport: Arc<dyn Transport>,
    sessions: PendingTable<GoalSession>,
    idle_timeout: Duration,
    metrics: Arc<BridgeMetrics>,
}

impl ActionCoordinator {
    pub fn new(transport: Arc<dyn Transport>, idle_timeout: Duration, metrics: Arc<BridgeMetrics>) -> Self {
        Self {
            transport,
            sessions: PendingTable::new(),
            idle_timeout,
            metrics,
        }
    }

    /// Submit a goal. Returns the generated goal id as soon as the goal is sent.
    pub fn send_goal(
        &self,
        action_name: &str,
        action_type: &str,
        goal: Payload,
        callbacks: GoalCallbacks,
    ) -> Result<String> {
        self.send_goal_with_timeout(action_name, action_type, goal, callbacks, self.idle_timeout)
    }

    pub fn send_goal_with_timeout(
        &self,
        action_name: &str,
        action_type: &str,
        goal: Payload,
        callbacks: GoalCallbacks,
        idle_timeout: Duration,
    ) -> Result<String> {
        if !self.transport.is_connected() {
            return Err(BridgeError::NotConnected);
        }

        let goal_id = new_correlation_id();
        let bytes = encode(&ActionGoalPacket::new(action_name, action_type, goal, goal_id.clone()))?;

        let registered = !callbacks.is_empty();
        if registered {
            let session = GoalSession {
                action_name: action_name.to_owned(),
                callbacks,
                accepted: false,
            };
            self.sessions.insert(goal_id.clone(), session, idle_timeout);
        }

        if let Err(e) = self.transport.send(bytes, Reliability::Reliable, None) {
            if registered {
                self.sessions.take(&goal_id);
            }
            warn!(action = action_name, %goal_id, error = %e, "goal send failed");
            return Err(send_failure(e));
        }

        info!(action = action_name, %goal_id, "goal sent");
        Ok(goal_id)
    }

    /// Ask the server to cancel a goal. Local callbacks are untouched; the
    /// server's result (or the idle deadline) ends the session.
    pub fn cancel_goal(&self, action_name: &str, goal_id: &str) -> Result<()> {
        if !self.transport.is_connected() {
            return Err(BridgeError::NotConnected);
        }
        let bytes = encode(&ActionCancelPacket::new(action_name, goal_id))?;
        self.transport
            .send(bytes, Reliability::Reliable, None)
            .map_err(send_failure)?;
        info!(action = action_name, %goal_id, "goal cancel requested");
        Ok(())
    }

    pub fn is_active(&self, goal_id: &str) -> bool {
        self.sessions.contains(goal_id)
    }

    pub fn active_goals(&self) -> usize {
        self.sessions.len()
    }

    /// Whether the server has accepted the goal.
    pub fn is_accepted(&self, goal_id: &str) -> bool {
        self.sessions.with_entry(goal_id, |s| s.accepted).unwrap_or(false)
    }

    fn on_goal_response(&self, goal_id: &str, env: &InboundEnvelope) {
        let accepted = env.accepted();

        if !accepted {
            let Some(mut session) = self.sessions.take(goal_id) else {
                debug!(%goal_id, "goal response for unknown goal");
                return;
            };
            info!(action = %session.action_name, %goal_id, "goal rejected");
            if let Some(cb) = session.callbacks.on_goal_response.take() {
                cb(env.body());
            }
            return;
        }

        let cb = self.sessions.with_entry(goal_id, |s| {
            s.accepted = true;
            s.callbacks.on_goal_response.take()
        });
        let Some(cb) = cb else {
            debug!(%goal_id, "goal response for unknown goal");
            return;
        };
        self.sessions.touch(goal_id, self.idle_timeout);
        info!(%goal_id, "goal accepted");
        if let Some(cb) = cb {
            cb(env.body());
        }
    }

    fn on_feedback(&self, goal_id: &str, env: &InboundEnvelope) {
        let found = self
            .sessions
            .with_entry(goal_id, |s| (s.accepted, s.callbacks.on_feedback.clone()));
        let Some((accepted, cb)) = found else {
            debug!(%goal_id, "feedback for unknown goal");
            return;
        };
        if !accepted {
            debug!(%goal_id, "feedback before goal acceptance");
        }
        self.sessions.touch(goal_id, self.idle_timeout);
        if let Some(cb) = cb {
            cb(env.body());
        }
    }

    fn on_result(&self, goal_id: &str, env: InboundEnvelope) {
        let Some(session) = self.sessions.take(goal_id) else {
            debug!(%goal_id, "result for unknown or finished goal");
            return;
        };
        let body = env.into_body();
        info!(
            action = %session.action_name,
            %goal_id,
            status = ?GoalStatus::from_result(&body),
            "goal finished"
        );
        if let Some(cb) = session.callbacks.on_result {
            cb(Ok(body));
        }
    }

    /// End every session idle past its deadline with `Timeout`.
    pub fn sweep_expired(&self, now: Instant) -> usize {
        let expired = self.sessions.drain_expired(now);
        let n = expired.len();
        for (goal_id, session) in expired {
            warn!(action = %session.action_name, %goal_id, accepted = session.accepted, "goal timed out");
            self.metrics.timeouts.inc(&[("kind", "goal")]);
            if let Some(cb) = session.callbacks.on_result {
                cb(Err(BridgeError::Timeout));
            }
        }
        n
    }

    pub fn fail_all(&self, err: BridgeError) {
        for (_, session) in self.sessions.drain_all() {
            if let Some(cb) = session.callbacks.on_result {
                cb(Err(err.clone()));
            }
        }
    }
}

impl PacketHandler for ActionCoordinator {
    fn handle_packet(&self, env: InboundEnvelope) -> Result<()> {
        let goal_id = env
            .goal_id()
            .ok_or_else(|| BridgeError::MalformedEnvelope("action packet without goalId".into()))?;

        match env.packet_type() {
            Some(PacketType::ActionGoalResponse) => self.on_goal_response(&goal_id, &env),
            Some(PacketType::ActionFeedback) => self.on_feedback(&goal_id, &env),
            Some(PacketType::ActionResult) => self.on_result(&goal_id, env),
            other => debug!(packet_type = ?other, "not an action packet"),
        }
        Ok(())
    }
}
