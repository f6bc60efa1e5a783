//! Labelled counters and gauges backed by `DashMap`.
//!
//! Labels are flattened into sorted key vectors so rendering is deterministic
//! regardless of the order callers pass them in.

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
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicU64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} counter");
        let mut lines: Vec<String> = self
            .map
            .iter()
            .map(|r| format!("{}{} {}", name, render_labels(r.key()), r.value().load(Ordering::Relaxed)))
            .collect();
        lines.sort();
        for l in lines {
            let _ = writeln!(out, "{l}");
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    pub fn dec(&self, labels: &[(&str, &str)]) {
        self.add(labels, -1);
    }

    pub fn add(&self, labels: &[(&str, &str)], v: i64) {
        self.map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0))
            .fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {name} gauge");
        for r in self.map.iter() {
            let _ = writeln!(out, "{}{} {}", name, render_labels(r.key()), r.value().load(Ordering::Relaxed));
        }
    }
}

#[derive(Default)]
pub struct PulseMetrics {
    pub ws_sessions_active: GaugeVec,
    pub ws_upgrades: CounterVec,
    pub mutations: CounterVec,       // field=views|shares|clicks
    pub broadcasts: CounterVec,
    pub deliveries: CounterVec,      // outcome=ok|failed
    pub subscribers_pruned: CounterVec,
    pub malformed_messages: CounterVec,
    pub store_errors: CounterVec,
}

impl PulseMetrics {
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.ws_sessions_active.render("listpulse_ws_sessions_active", &mut out);
        self.ws_upgrades.render("listpulse_ws_upgrades_total", &mut out);
        self.mutations.render("listpulse_metric_mutations_total", &mut out);
        self.broadcasts.render("listpulse_broadcasts_total", &mut out);
        self.deliveries.render("listpulse_deliveries_total", &mut out);
        self.subscribers_pruned.render("listpulse_subscribers_pruned_total", &mut out);
        self.malformed_messages.render("listpulse_malformed_messages_total", &mut out);
        self.store_errors.render("listpulse_store_errors_total", &mut out);
        out
    }
}
