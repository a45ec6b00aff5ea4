//! Teleoperation publishing: the standard publisher set behind a rate gate.

use std::time::{Duration, Instant};

use livebridge_core::error::Result;
use livebridge_core::messages::{Header, JointState, Pose, PoseStamped, Twist, TwistStamped, Vector3};

use crate::bridge::Bridge;
use crate::config::TeleopSection;
use crate::pubsub::Publisher;
use crate::transport::Reliability;

pub const CMD_VEL_TOPIC: &str = "cmd_vel";
pub const EE_POSE_TOPIC: &str = "servo_node/pose_target_cmds";
pub const EE_TWIST_TOPIC: &str = "servo_node/delta_twist_cmds";
pub const GRIPPER_TOPIC: &str = "main_gripper/gripper_command";

const EE_POSE_FRAME: &str = "ee_offset";
const EE_TWIST_FRAME: &str = "link_grasp_center";
const GRIPPER_JOINT: &str = "main_gripper";

/// Minimum-interval gate.
#[derive(Debug, Clone)]
pub struct RateGate {
    interval: Duration,
    last: Option<Instant>,
}

impl RateGate {
    pub fn new(hz: u32) -> Self {
        Self {
            interval: Duration::from_secs_f64(1.0 / f64::from(hz.max(1))),
            last: None,
        }
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    /// True (and arms the gate) when at least one interval has passed.
    pub fn ready(&mut self, now: Instant) -> bool {
        match self.last {
            Some(last) if now.saturating_duration_since(last) < self.interval => false,
            _ => {
                self.last = Some(now);
                true
            }
        }
    }
}

/// One controller reading, already in the robot frame.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct TeleopSample {
    /// Forward velocity (m/s).
    pub linear_x: f64,
    /// Yaw rate (rad/s).
    pub angular_z: f64,
    /// End-effector offset from the pose captured when teleop started.
    pub ee_pose: Pose,
    /// Gripper trigger, 0.0 open to 1.0 closed.
    pub gripper: f64,
}

impl TeleopSample {
    fn velocity(&self) -> Twist {
        Twist {
            linear: Vector3::new(self.linear_x, 0.0, 0.0),
            angular: Vector3::new(0.0, 0.0, self.angular_z),
        }
    }

    fn ee_pose(&self) -> PoseStamped {
        PoseStamped {
            header: Header::now(EE_POSE_FRAME),
            pose: self.ee_pose,
        }
    }

    fn gripper(&self) -> JointState {
        JointState {
            name: vec![GRIPPER_JOINT.to_owned()],
            position: vec![self.gripper],
            velocity: vec![0.0],
            effort: vec![0.0],
        }
    }
}

pub struct TeleopPublishers {
    cmd_vel: Publisher<Twist>,
    ee_pose: Publisher<PoseStamped>,
    ee_twist: Publisher<TwistStamped>,
    gripper: Publisher<JointState>,
    gate: RateGate,
}

impl TeleopPublishers {
    pub fn new(bridge: &Bridge, cfg: &TeleopSection) -> Self {
        let velocity = if cfg.lossy_velocity {
            Reliability::Lossy
        } else {
            Reliability::Reliable
        };
        Self {
            cmd_vel: bridge.create_publisher_with::<Twist>(CMD_VEL_TOPIC, velocity),
            ee_pose: bridge.create_publisher::<PoseStamped>(EE_POSE_TOPIC),
            ee_twist: bridge.create_publisher_with::<TwistStamped>(EE_TWIST_TOPIC, velocity),
            gripper: bridge.create_publisher::<JointState>(GRIPPER_TOPIC),
            gate: RateGate::new(cfg.publish_hz),
        }
    }

    /// Velocity, end-effector pose and gripper. Returns false when gated.
    pub fn publish_teleop(&mut self, sample: &TeleopSample, now: Instant) -> Result<bool> {
        if !self.gate.ready(now) {
            return Ok(false);
        }
        self.cmd_vel.publish(&sample.velocity())?;
        self.ee_pose.publish(&sample.ee_pose())?;
        self.gripper.publish(&sample.gripper())?;
        Ok(true)
    }

    /// Base velocity only. Returns false when gated.
    pub fn publish_movebase(&mut self, sample: &TeleopSample, now: Instant) -> Result<bool> {
        if !self.gate.ready(now) {
            return Ok(false);
        }
        self.cmd_vel.publish(&sample.velocity())?;
        Ok(true)
    }

    /// End-effector velocity command. Not gated.
    pub fn publish_ee_twist(&self, linear: Vector3, angular: Vector3) -> Result<u64> {
        let msg = TwistStamped {
            header: Header::now(EE_TWIST_FRAME),
            twist: Twist { linear, angular },
        };
        self.ee_twist.publish(&msg)
    }

    pub fn cmd_vel(&self) -> &Publisher<Twist> {
        &self.cmd_vel
    }

    pub fn ee_pose(&self) -> &Publisher<PoseStamped> {
        &self.ee_pose
    }

    pub fn gripper(&self) -> &Publisher<JointState> {
        &self.gripper
    }
}
