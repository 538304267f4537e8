//! Cacheflush - Cache-Tier Flusher
//!
//! Periodically demotes files from fast cache drives to a slower backing
//! pool so that each cache drive regains a configured amount of free space.
//! Intended to run from a scheduler; one invocation is one run.
//!
//! # Architecture
//!
//! Each cache drive goes through a plan and three eviction phases:
//!
//! ```text
//! Walk (Eyes) → Classify (Brain) → Move (Hands)
//!   evictable: always moved
//!   young:     moved while free space is below target
//!   hot:       moved last, while free space is still below target
//! ```
//!
//! # Modules
//!
//! - [`adapters`] - Free-space probe and notification adapters
//! - [`config`] - YAML configuration and CLI overrides
//! - [`domain`] - Domain layer with ports and events
//! - [`error`] - Error types
//! - [`flusher`] - Walker, classifier, policies, mover and engine
//! - [`metrics`] - Prometheus counters and textfile export

pub mod adapters;
pub mod config;
pub mod domain;
pub mod error;
pub mod flusher;
pub mod metrics;

// Re-export commonly used types
pub use config::FlushConfig;
pub use domain::{FileRecord, FlushEvent, FreeSpaceProbe, Notifier, Population};
pub use error::{Error, ErrorKind, Result};
pub use flusher::{DriveReport, FlushPolicy, Flusher, RunContext, RunReport};
pub use metrics::FlushMetrics;
