//! livebridge-replay
//!
//! Feeds a recorded capture through a bridge with no live session and prints
//! the resulting metrics.
//!
//! Usage: `livebridge-replay <config.yaml> <capture.jsonl>`
//!
//! Each capture line is one inbound transport packet:
//! `{"topic": "...", "sender": "...", "reliable": true, "frame": {"encoding": "utf8|hex|base64", "data": "..."}}`

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::process::ExitCode;
use std::sync::Arc;

use base64::Engine;
use serde::Deserialize;
use tracing::{info, warn};

use livebridge_core::error::{BridgeError, Result};
use livebridge_gateway::bridge::Bridge;
use livebridge_gateway::dispatch::Dispatch;
use livebridge_gateway::pointcloud::LogFrameSink;
use livebridge_gateway::transport::{ChannelTransport, Reliability, TransportPacket};
use livebridge_gateway::{config, obs};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureLine {
    #[serde(default)]
    topic: Option<String>,
    #[serde(default)]
    sender: Option<String>,
    #[serde(default = "default_reliable")]
    reliable: bool,
    frame: CaptureFrame,
}

fn default_reliable() -> bool {
    true
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CaptureFrame {
    encoding: String,
    data: String,
}

impl CaptureFrame {
    fn decode(&self) -> Result<Vec<u8>> {
        match self.encoding.as_str() {
            "utf8" => Ok(self.data.as_bytes().to_vec()),
            "hex" => hex::decode(&self.data)
                .map_err(|e| BridgeError::MalformedEnvelope(format!("bad hex frame: {e}"))),
            "base64" => base64::engine::general_purpose::STANDARD
                .decode(&self.data)
                .map_err(|e| BridgeError::MalformedEnvelope(format!("bad base64 frame: {e}"))),
            other => Err(BridgeError::MalformedEnvelope(format!(
                "unsupported frame encoding: {other}"
            ))),
        }
    }
}

impl CaptureLine {
    fn into_packet(self) -> Result<TransportPacket> {
        let reliability = if self.reliable {
            Reliability::Reliable
        } else {
            Reliability::Lossy
        };
        let mut packet = TransportPacket::new(self.frame.decode()?, reliability, self.topic.as_deref());
        if let Some(sender) = self.sender {
            packet = packet.with_sender(sender);
        }
        Ok(packet)
    }
}

#[derive(Debug, Default)]
struct ReplayStats {
    lines: u64,
    routed: u64,
    ignored: u64,
    failed: u64,
    skipped: u64,
}

fn replay(config_path: &str, capture_path: &str) -> Result<ReplayStats> {
    let cfg = config::load_from_file(config_path)?;

    // Nothing is sent during replay.
    let (transport, _outbound) = ChannelTransport::new(1);
    transport.set_connected(false);

    let bridge = Bridge::new(cfg, transport, Arc::new(LogFrameSink))?;

    let file = File::open(capture_path)
        .map_err(|e| BridgeError::BadConfig(format!("open capture {capture_path} failed: {e}")))?;

    let mut stats = ReplayStats::default();
    for (n, line) in BufReader::new(file).lines().enumerate() {
        let line = line.map_err(|e| BridgeError::Internal(format!("read capture failed: {e}")))?;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;

        let packet = match serde_json::from_str::<CaptureLine>(&line)
            .map_err(|e| BridgeError::MalformedEnvelope(e.to_string()))
            .and_then(CaptureLine::into_packet)
        {
            Ok(p) => p,
            Err(e) => {
                warn!(line = n + 1, error = %e, "skipping capture line");
                stats.skipped += 1;
                continue;
            }
        };

        match bridge.on_transport_message(&packet) {
            Dispatch::Topic(_) | Dispatch::Packet(_) => stats.routed += 1,
            Dispatch::Ignored => stats.ignored += 1,
            Dispatch::Malformed | Dispatch::HandlerFailed => stats.failed += 1,
        }
    }

    print!("{}", bridge.metrics().render());
    Ok(stats)
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    obs::init_tracing("info");

    let args: Vec<String> = std::env::args().collect();
    let (Some(config_path), Some(capture_path)) = (args.get(1), args.get(2)) else {
        eprintln!("usage: livebridge-replay <config.yaml> <capture.jsonl>");
        return ExitCode::from(2);
    };

    match replay(config_path, capture_path) {
        Ok(stats) => {
            info!(
                lines = stats.lines,
                routed = stats.routed,
                ignored = stats.ignored,
                failed = stats.failed,
                skipped = stats.skipped,
                "replay finished"
            );
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("livebridge-replay: {} ({})", e, e.code().as_str());
            ExitCode::FAILURE
        }
    }
}
