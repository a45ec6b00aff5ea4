//! In-process metrics registry for the bridge.
//!
//! Counter and gauge families with dynamic labels backed by `DashMap`. Label
//! sets are flattened into sorted key vectors so rendering is deterministic.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

type LabelKey = Vec<(String, String)>;

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn render_labels(key: &LabelKey) -> String {
    if key.is_empty() {
        return String::new();
    }
    let inner = key
        .iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",");
    format!("{{{inner}}}")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: u64) {
        let counter = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0));
        counter.fetch_add(v, Ordering::Relaxed);
    }

    /// Current value for an exact label set (0 when never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, render_labels(r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn set(&self, labels: &[(&str, &str)], v: i64) {
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.store(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{} {}", name, render_labels(r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct BridgeMetrics {
    /// Inbound packets dispatched, labelled by `route` (topic or packet type).
    pub packets_routed: CounterVec,
    /// Inbound packets that failed to decode, labelled by `code`.
    pub decode_errors: CounterVec,
    /// Handler failures, labelled by `route` and `code`.
    pub handler_errors: CounterVec,
    /// Frames handed to the frame sink.
    pub frames_completed: CounterVec,
    /// Frames dropped by `reason` (`evicted`, `oversized`).
    pub frames_dropped: CounterVec,
    /// Fragments discarded by `reason` (`duplicate`, `overflow`, `no_slot`).
    pub fragments_dropped: CounterVec,
    /// Frames currently being reassembled.
    pub frames_in_flight: GaugeVec,
    /// Calls and goals failed by the sweeper, labelled by `kind`.
    pub timeouts: CounterVec,
}

impl BridgeMetrics {
    /// Render all registered metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.packets_routed.render("livebridge_packets_routed_total", &mut out);
        self.decode_errors.render("livebridge_decode_errors_total", &mut out);
        self.handler_errors.render("livebridge_handler_errors_total", &mut out);
        self.frames_completed.render("livebridge_frames_completed_total", &mut out);
        self.frames_dropped.render("livebridge_frames_dropped_total", &mut out);
        self.fragments_dropped.render("livebridge_fragments_dropped_total", &mut out);
        self.frames_in_flight.render("livebridge_frames_in_flight", &mut out);
        self.timeouts.render("livebridge_timeouts_total", &mut out);
        out
    }
}
