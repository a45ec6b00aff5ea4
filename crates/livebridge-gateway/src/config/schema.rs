use std::time::Duration;

use serde::Deserialize;
use livebridge_core::error::{BridgeError, Result};

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeConfig {
    pub version: u32,

    #[serde(default)]
    pub bridge: BridgeSection,

    #[serde(default)]
    pub pointcloud: PointCloudSection,

    #[serde(default)]
    pub teleop: TeleopSection,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            version: 1,
            bridge: BridgeSection::default(),
            pointcloud: PointCloudSection::default(),
            teleop: TeleopSection::default(),
        }
    }
}

impl BridgeConfig {
    pub fn validate(&self) -> Result<()> {
        if self.version != 1 {
            return Err(BridgeError::UnsupportedVersion);
        }

        self.bridge.validate()?;
        self.pointcloud.validate()?;
        self.teleop.validate()?;

        Ok(())
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BridgeSection {
    #[serde(default = "default_call_timeout_ms")]
    pub call_timeout_ms: u64,

    #[serde(default = "default_goal_idle_timeout_ms")]
    pub goal_idle_timeout_ms: u64,

    #[serde(default = "default_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            call_timeout_ms: default_call_timeout_ms(),
            goal_idle_timeout_ms: default_goal_idle_timeout_ms(),
            sweep_interval_ms: default_sweep_interval_ms(),
        }
    }
}

impl BridgeSection {
    pub fn validate(&self) -> Result<()> {
        if !(100..=600_000).contains(&self.call_timeout_ms) {
            return Err(BridgeError::BadConfig(
                "bridge.call_timeout_ms must be between 100 and 600000".into(),
            ));
        }
        if !(1_000..=3_600_000).contains(&self.goal_idle_timeout_ms) {
            return Err(BridgeError::BadConfig(
                "bridge.goal_idle_timeout_ms must be between 1000 and 3600000".into(),
            ));
        }
        if !(10..=60_000).contains(&self.sweep_interval_ms) {
            return Err(BridgeError::BadConfig(
                "bridge.sweep_interval_ms must be between 10 and 60000".into(),
            ));
        }
        if self.sweep_interval_ms >= self.call_timeout_ms {
            return Err(BridgeError::BadConfig(
                "bridge.sweep_interval_ms must be less than call_timeout_ms".into(),
            ));
        }
        Ok(())
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_millis(self.call_timeout_ms)
    }

    pub fn goal_idle_timeout(&self) -> Duration {
        Duration::from_millis(self.goal_idle_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }
}

fn default_call_timeout_ms() -> u64 {
    10_000
}
fn default_goal_idle_timeout_ms() -> u64 {
    120_000
}
fn default_sweep_interval_ms() -> u64 {
    500
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PointCloudSection {
    #[serde(default = "default_meta_topic")]
    pub meta_topic: String,

    #[serde(default = "default_data_topic")]
    pub data_topic: String,

    #[serde(default = "default_indexed_topic")]
    pub indexed_topic: String,

    #[serde(default = "default_window_frames")]
    pub window_frames: usize,

    #[serde(default = "default_max_frame_bytes")]
    pub max_frame_bytes: usize,
}

impl Default for PointCloudSection {
    fn default() -> Self {
        Self {
            meta_topic: default_meta_topic(),
            data_topic: default_data_topic(),
            indexed_topic: default_indexed_topic(),
            window_frames: default_window_frames(),
            max_frame_bytes: default_max_frame_bytes(),
        }
    }
}

impl PointCloudSection {
    pub fn validate(&self) -> Result<()> {
        let topics = [&self.meta_topic, &self.data_topic, &self.indexed_topic];
        if topics.iter().any(|t| t.is_empty()) {
            return Err(BridgeError::BadConfig(
                "pointcloud topics must not be empty".into(),
            ));
        }
        if self.meta_topic == self.data_topic
            || self.meta_topic == self.indexed_topic
            || self.data_topic == self.indexed_topic
        {
            return Err(BridgeError::BadConfig(
                "pointcloud topics must be distinct".into(),
            ));
        }
        if !(1..=64).contains(&self.window_frames) {
            return Err(BridgeError::BadConfig(
                "pointcloud.window_frames must be between 1 and 64".into(),
            ));
        }
        if !(1024..=256 * 1024 * 1024).contains(&self.max_frame_bytes) {
            return Err(BridgeError::BadConfig(
                "pointcloud.max_frame_bytes must be between 1024 and 268435456".into(),
            ));
        }
        Ok(())
    }
}

fn default_meta_topic() -> String {
    "pointcloud:meta".into()
}
fn default_data_topic() -> String {
    "pointcloud".into()
}
fn default_indexed_topic() -> String {
    "pointcloud:indexed".into()
}
fn default_window_frames() -> usize {
    3
}
fn default_max_frame_bytes() -> usize {
    1024 * 1024
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TeleopSection {
    #[serde(default = "default_publish_hz")]
    pub publish_hz: u32,

    /// Send velocity commands lossy to favour recency over completeness.
    #[serde(default)]
    pub lossy_velocity: bool,
}

impl Default for TeleopSection {
    fn default() -> Self {
        Self {
            publish_hz: default_publish_hz(),
            lossy_velocity: false,
        }
    }
}

impl TeleopSection {
    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.publish_hz) {
            return Err(BridgeError::BadConfig(
                "teleop.publish_hz must be between 1 and 1000".into(),
            ));
        }
        Ok(())
    }
}

fn default_publish_hz() -> u32 {
    30
}
