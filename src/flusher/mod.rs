//! Cache Flusher
//!
//! Walks each cache drive, classifies its files and moves them to the
//! backing pool until the drive has enough free space.
//!
//! # Components
//!
//! - **Units** (`units.rs`) - Human duration and size strings
//! - **Context** (`context.rs`) - Immutable per-run configuration
//! - **Walker** (`walker.rs`) - Regular-file discovery with override pruning
//! - **Classifier** (`classifier.rs`) - evictable / young / hot assignment
//! - **Policy** (`policy.rs`) - Ordering of the young and hot populations
//! - **Mover** (`mover.rs`) - Copy, fsync, chown, unlink
//! - **Reaper** (`reaper.rs`) - Empty-directory cleanup
//! - **Engine** (`engine.rs`) - Three-phase planner and executor

pub mod classifier;
pub mod context;
pub mod engine;
pub mod mover;
pub mod policy;
pub mod reaper;
pub mod units;
pub mod walker;

mod proptest;

pub use classifier::Classifier;
pub use context::{Owner, RunContext};
pub use engine::{
    DriveFailure, DrivePlan, DriveReport, Flusher, MoveRecord, MoveStatus, PopulationCounts,
    Populations, RunReport,
};
pub use mover::{destination_for, MoveOutcome, SafeMover};
pub use policy::FlushPolicy;
pub use reaper::{reap_empty_dirs, ReapStats};
