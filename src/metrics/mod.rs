//! Metrics module
//!
//! Prometheus counters for flush runs, exported as a node-exporter textfile.

mod recorder;

pub use recorder::FlushMetrics;
