//! Minimal metrics registry for the client.
//!
//! No metrics crate is used; counters, gauges, and histograms with dynamic
//! labels are backed by `DashMap`. Labels are flattened into sorted key vectors
//! to keep rendering deterministic. Histogram buckets are fixed in
//! milliseconds, which matches how long replies take on a Stark bus.

use dashmap::DashMap;
use std::fmt::Write;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;

type LabelKey = Vec<(String, String)>;

fn escape_label(v: &str) -> String {
    v.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
}

fn label_key(labels: &[(&str, &str)]) -> LabelKey {
    let mut key: LabelKey = labels
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    key.sort();
    key
}

fn label_str(key: &LabelKey) -> String {
    key.iter()
        .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Default)]
pub struct CounterVec {
    map: DashMap<LabelKey, AtomicU64>,
}

impl CounterVec {
    /// Increment by 1.
    pub fn inc(&self, labels: &[(&str, &str)]) {
        self.add(labels, 1);
    }

    /// Increment by an arbitrary value.
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
        for r in self.map.iter() {
            let val = r.value().load(Ordering::Relaxed);
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(r.key()), val);
        }
    }
}

#[derive(Default)]
pub struct GaugeVec {
    map: DashMap<LabelKey, AtomicI64>,
}

impl GaugeVec {
    /// Overwrite the value.
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
            let _ = writeln!(out, "{}{{{}}} {}", name, label_str(r.key()), val);
        }
    }
}

// 10ms, 50ms, 100ms, 500ms, 1s, 5s, 30s, 60s, 300s
const BUCKETS_MILLIS: [u64; 9] = [10, 50, 100, 500, 1_000, 5_000, 30_000, 60_000, 300_000];

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
    /// Observe a duration and increment cumulative buckets (millisecond scale).
    pub fn observe(&self, labels: &[(&str, &str)], duration: Duration) {
        let hist = self
            .map
            .entry(label_key(labels))
            .or_insert_with(AtomicHistogram::default);
        let millis = duration.as_millis() as u64;

        hist.count.fetch_add(1, Ordering::Relaxed);
        hist.sum.fetch_add(millis, Ordering::Relaxed);

        for (i, &b) in BUCKETS_MILLIS.iter().enumerate() {
            if millis <= b {
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

    /// Render in Prometheus text exposition format (unit: milliseconds).
    fn render(&self, name: &str, out: &mut String) {
        let _ = writeln!(out, "# TYPE {} histogram", name);
        for r in self.map.iter() {
            let hist = r.value();
            let labels = label_str(r.key());
            let prefix = if labels.is_empty() { String::new() } else { format!("{},", labels) };

            for (i, &le) in BUCKETS_MILLIS.iter().enumerate() {
                let count = hist.buckets[i].load(Ordering::Relaxed);
                let _ = writeln!(out, "{}_bucket{{{}le=\"{}\"}} {}", name, prefix, le, count);
            }
            let count = hist.count.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_bucket{{{}le=\"+Inf\"}} {}", name, prefix, count);

            let sum = hist.sum.load(Ordering::Relaxed);
            let _ = writeln!(out, "{}_sum{{{}}} {}", name, labels, sum);
            let _ = writeln!(out, "{}_count{{{}}} {}", name, labels, count);
        }
    }
}

/// Metrics shared between a client handle and its worker.
#[derive(Default)]
pub struct ClientMetrics {
    /// Envelopes written to the channel, by action.
    pub envelopes_sent: CounterVec,
    /// Envelopes parked in the outbound queue, by action.
    pub envelopes_queued: CounterVec,
    /// Queued envelopes written once the channel opened.
    pub queue_flushed: CounterVec,
    /// Inbound frames, by outcome (`message`, `reply`, `ping`, `malformed`, `expired_reply`).
    pub inbound: CounterVec,
    /// Requests dropped without a reply.
    pub requests_expired: CounterVec,
    /// Channel lifecycle transitions, by state.
    pub channel_transitions: CounterVec,
    pub pending_requests: GaugeVec,
    pub queue_depth: GaugeVec,
    /// Time from `request` to matching reply.
    pub reply_latency: HistogramVec,
}

impl ClientMetrics {
    /// Render all metrics in Prometheus text format.
    pub fn render(&self) -> String {
        let mut out = String::new();
        self.envelopes_sent.render("stark_envelopes_sent_total", &mut out);
        self.envelopes_queued.render("stark_envelopes_queued_total", &mut out);
        self.queue_flushed.render("stark_queue_flushed_total", &mut out);
        self.inbound.render("stark_inbound_total", &mut out);
        self.requests_expired.render("stark_requests_expired_total", &mut out);
        self.channel_transitions.render("stark_channel_transitions_total", &mut out);
        self.pending_requests.render("stark_pending_requests", &mut out);
        self.queue_depth.render("stark_outbound_queue_depth", &mut out);
        self.reply_latency.render("stark_reply_latency_millis", &mut out);
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn labels_are_order_insensitive() {
        let c = CounterVec::default();
        c.inc(&[("a", "1"), ("b", "2")]);
        c.inc(&[("b", "2"), ("a", "1")]);
        assert_eq!(c.get(&[("a", "1"), ("b", "2")]), 2);
    }

    #[test]
    fn gauge_set_overwrites() {
        let g = GaugeVec::default();
        g.set(&[], 3);
        g.set(&[], 1);
        assert_eq!(g.get(&[]), 1);
        assert_eq!(g.get(&[("x", "y")]), 0);
    }

    #[test]
    fn histogram_buckets_are_cumulative() {
        let h = HistogramVec::default();
        h.observe(&[], Duration::from_millis(40));
        let mut out = String::new();
        h.render("lat", &mut out);
        assert!(out.contains("lat_bucket{le=\"10\"} 0"));
        assert!(out.contains("lat_bucket{le=\"50\"} 1"));
        assert!(out.contains("lat_bucket{le=\"+Inf\"} 1"));
        assert!(out.contains("lat_sum{} 40"));
    }

    #[test]
    fn render_escapes_label_values() {
        let m = ClientMetrics::default();
        m.envelopes_sent.inc(&[("action", "a\"b")]);
        let out = m.render();
        assert!(out.contains("stark_envelopes_sent_total{action=\"a\\\"b\"} 1"));
    }
}
