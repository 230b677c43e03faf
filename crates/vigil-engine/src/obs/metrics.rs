//! Minimal metrics registry for the engine.
//!
//! Counters, gauges and a microsecond histogram with dynamic labels backed by
//! `DashMap`. Labels are flattened into sorted key vectors to keep rendering
//! deterministic. Histogram buckets are fixed in microseconds to avoid floats.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

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

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

/// Sorted snapshot so repeated renders are byte-identical.
fn sorted<V, T>(map: &DashMap<LabelKey, V>, read: impl Fn(&V) -> T) -> Vec<(LabelKey, T)> {
    let mut rows: Vec<(LabelKey, T)> = map.iter().map(|r| (r.key().clone(), read(r.value()))).collect();
    rows.sort_by(|a, b| a.0.cmp(&b.0));
    rows
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

    /// Current value for an exact label set (0 if never touched).
    pub fn get(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|c| c.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} counter", name);
        for (key, val) in sorted(&self.map, |c| c.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(&key), val);
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
        let gauge = self
            .map
            .entry(label_key(labels))
            .or_insert_with(|| AtomicI64::new(0));
        gauge.fetch_add(v, Ordering::Relaxed);
    }

    pub fn get(&self, labels: &[(&str, &str)]) -> i64 {
        self.map
            .get(&label_key(labels))
            .map(|g| g.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} gauge", name);
        for (key, val) in sorted(&self.map, |g| g.load(Ordering::Relaxed)) {
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(&key), val);
        }
    }
}

// 10us, 50us, 100us, 500us, 1ms, 5ms, 10ms, 50ms, 250ms
const BUCKETS_MICROS: [u64; 9] = [10, 50, 100, 500, 1_000, 5_000, 10_000, 50_000, 250_000];

#[derive(Default)]
struct AtomicHistogram {
    count: AtomicU64,
    sum: AtomicU64,
    buckets: [AtomicU64; 9],
}

#[derive(Default)]
pub struct HistogramVec {
    map: DashMap<LabelKey, AtomicHistogram>,
}

impl HistogramVec {
    /// Observe a duration into cumulative microsecond buckets.
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let micros = duration.as_micros() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(micros, Ordering::Relaxed);
        for (i, &b) in BUCKETS_MICROS.iter().enumerate() {
            if micros <= b {
                hist.buckets[i].fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    pub fn count(&self, labels: &[(&str, &str)]) -> u64 {
        self.map
            .get(&label_key(labels))
            .map(|h| h.count.load(Ordering::Relaxed))
            .unwrap_or(0)
    }

    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        let rows = sorted(&self.map, |h| {
            let buckets: Vec<u64> = h.buckets.iter().map(|b| b.load(Ordering::Relaxed)).collect();
            (buckets, h.count.load(Ordering::Relaxed), h.sum.load(Ordering::Relaxed))
        });
        for (key, (buckets, count, sum)) in rows {
            let labels = label_str(&key);
            let prefix = if labels.is_empty() {
                String::new()
            } else {
                format!("{},", labels)
            };
            for (le, n) in BUCKETS_MICROS.iter().zip(buckets) {
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, n);
            }
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

#[derive(Default)]
pub struct EngineMetrics {
    pub checks: CounterVec,
    pub votes: CounterVec,
    pub policy_failures: CounterVec,
    pub trace_signals: CounterVec,
    pub bind_failures: CounterVec,
    pub extensions_registered: GaugeVec,
    pub invoke_duration: HistogramVec,
}

impl EngineMetrics {
    /// Render all metrics in Prometheus text exposition format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.checks.render("vigil_checks_total", &mut out);
        self.votes.render("vigil_votes_total", &mut out);
        self.policy_failures.render("vigil_policy_failures_total", &mut out);
        self.trace_signals.render("vigil_trace_signals_total", &mut out);
        self.bind_failures.render("vigil_bind_failures_total", &mut out);
        self.extensions_registered.render("vigil_extensions_registered", &mut out);
        self.invoke_duration.render("vigil_invoke_duration_micros", &mut out);
        out
    }
}
