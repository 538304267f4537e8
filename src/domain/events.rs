//! Domain Events
//!
//! Significant occurrences during a flush run. Each event is logged as
//! structured JSON and rendered to a short human-readable message for the
//! notification sink.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

const GIB: u64 = 1 << 30;

/// Domain event representing a significant occurrence in a run.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum FlushEvent {
    /// A run has started.
    RunStarted {
        run_id: Uuid,
        drives: usize,
        timestamp: DateTime<Utc>,
    },

    /// Processing of a cache drive has started.
    DriveStarted {
        run_id: Uuid,
        drive: PathBuf,
        timestamp: DateTime<Utc>,
    },

    /// A cache drive has been classified.
    DriveClassified {
        run_id: Uuid,
        drive: PathBuf,
        evictable: usize,
        young: usize,
        hot: usize,
    },

    /// Processing of a cache drive has finished.
    DriveCompleted {
        run_id: Uuid,
        drive: PathBuf,
        moved: u64,
        skipped: u64,
        failed: u64,
        free_before: u64,
        free_after: u64,
        target_met: bool,
        timestamp: DateTime<Utc>,
    },

    /// Processing of a cache drive was aborted.
    DriveAborted {
        run_id: Uuid,
        drive: PathBuf,
        reason: String,
        timestamp: DateTime<Utc>,
    },

    /// A run has finished.
    RunCompleted {
        run_id: Uuid,
        moved: u64,
        failed: u64,
        timestamp: DateTime<Utc>,
    },
}

impl FlushEvent {
    pub fn run_started(run_id: Uuid, drives: usize) -> Self {
        FlushEvent::RunStarted {
            run_id,
            drives,
            timestamp: Utc::now(),
        }
    }

    pub fn drive_started(run_id: Uuid, drive: impl Into<PathBuf>) -> Self {
        FlushEvent::DriveStarted {
            run_id,
            drive: drive.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn drive_aborted(run_id: Uuid, drive: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        FlushEvent::DriveAborted {
            run_id,
            drive: drive.into(),
            reason: reason.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn run_completed(run_id: Uuid, moved: u64, failed: u64) -> Self {
        FlushEvent::RunCompleted {
            run_id,
            moved,
            failed,
            timestamp: Utc::now(),
        }
    }

    /// Get the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            FlushEvent::RunStarted { .. } => "RunStarted",
            FlushEvent::DriveStarted { .. } => "DriveStarted",
            FlushEvent::DriveClassified { .. } => "DriveClassified",
            FlushEvent::DriveCompleted { .. } => "DriveCompleted",
            FlushEvent::DriveAborted { .. } => "DriveAborted",
            FlushEvent::RunCompleted { .. } => "RunCompleted",
        }
    }

    /// Render the event as a notification message.
    pub fn message(&self) -> String {
        match self {
            FlushEvent::RunStarted { drives, .. } => {
                format!("Starting cacheflush ({} cache drives)...", drives)
            }
            FlushEvent::DriveStarted { drive, .. } => {
                format!("Processing cache drive: {}", drive.display())
            }
            FlushEvent::DriveClassified {
                evictable,
                young,
                hot,
                ..
            } => format!(
                "evictable files: {}\nyoung files: {}\nhot files: {}",
                evictable, young, hot
            ),
            FlushEvent::DriveCompleted {
                drive,
                moved,
                skipped,
                failed,
                free_before,
                free_after,
                target_met,
                ..
            } => {
                let mut msg = format!(
                    "Done processing drive: {}\nMoved files: {}\nFree Space Before: {}GB\nFree Space After: {}GB",
                    drive.display(),
                    moved,
                    free_before / GIB,
                    free_after / GIB
                );
                if *skipped > 0 {
                    msg.push_str(&format!("\nSkipped moves (dry run): {}", skipped));
                }
                if *failed > 0 {
                    msg.push_str(&format!("\nFailed moves: {}", failed));
                }
                if !target_met {
                    msg.push_str("\nFree-space target not reached");
                }
                msg
            }
            FlushEvent::DriveAborted { drive, reason, .. } => {
                format!("Aborted drive {}: {}", drive.display(), reason)
            }
            FlushEvent::RunCompleted { failed, .. } if *failed > 0 => {
                format!("Cacheflush completed with {} failed moves", failed)
            }
            FlushEvent::RunCompleted { .. } => "Cacheflush completed successfully".to_string(),
        }
    }
}
