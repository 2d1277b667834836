//! Lightweight in-process client metrics.
//!
//! Counters, gauges, and a reply latency histogram stored as atomics and
//! rendered in Prometheus text format on demand (`StarkClient::metrics`).

pub mod metrics;

pub use metrics::ClientMetrics;
