//! Domain Ports (Port/Adapter Pattern)
//!
//! This module defines the value objects the flusher works on and the
//! abstractions (ports) it depends on. Infrastructure adapters implement
//! these traits to provide concrete implementations.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      Domain Layer                            │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                    Ports (Traits)                    │    │
//! │  │          FreeSpaceProbe   │   Notifier               │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//!                              │
//!                              ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                   Infrastructure Layer                       │
//! │  ┌─────────────────────────────────────────────────────┐    │
//! │  │                  Adapters (Impls)                    │    │
//! │  │  StatvfsProbe │ PushoverNotifier │ LoggingNotifier  │    │
//! │  └─────────────────────────────────────────────────────┘    │
//! └─────────────────────────────────────────────────────────────┘
//! ```

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::Result;

// =============================================================================
// Value Objects
// =============================================================================

/// A regular file discovered on a cache drive.
///
/// Timestamps are captured once at discovery and never refreshed, so a
/// record keeps its classification even if the file changes mid-run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileRecord {
    /// Absolute path on the cache drive
    pub path: PathBuf,
    /// Basename
    pub name: String,
    /// Size in bytes
    pub size: u64,
    /// Last content modification
    pub mtime: DateTime<Utc>,
    /// Last access
    pub atime: DateTime<Utc>,
}

impl FileRecord {
    /// Build a record from its parts, deriving `name` from the path.
    pub fn new(path: impl Into<PathBuf>, size: u64, mtime: DateTime<Utc>, atime: DateTime<Utc>) -> Self {
        let path = path.into();
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path,
            name,
            size,
            mtime,
            atime,
        }
    }

    /// Seconds elapsed since the last modification, relative to `now`.
    pub fn age_secs(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.mtime.timestamp()
    }

    /// Seconds elapsed since the last access, relative to `now`.
    pub fn idle_secs(&self, now: DateTime<Utc>) -> i64 {
        now.timestamp() - self.atime.timestamp()
    }
}

/// Population a file is assigned to by the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Population {
    /// Moved unconditionally
    Evictable,
    /// Too newly modified; moved only under space pressure
    Young,
    /// Recently accessed; moved last, only under space pressure
    Hot,
}

impl Population {
    /// All populations in eviction order.
    pub const ALL: [Population; 3] = [Population::Evictable, Population::Young, Population::Hot];

    /// Label used in logs and metrics.
    pub fn as_str(&self) -> &'static str {
        match self {
            Population::Evictable => "evictable",
            Population::Young => "young",
            Population::Hot => "hot",
        }
    }
}

impl std::fmt::Display for Population {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// Free-Space Port
// =============================================================================

/// Port for reading the free capacity of a filesystem.
///
/// The planner calls this between moves, so implementations must not
/// cache results.
pub trait FreeSpaceProbe: Send + Sync {
    /// Bytes free on the filesystem hosting `path`.
    fn free_bytes(&self, path: &Path) -> Result<u64>;
}

// =============================================================================
// Notification Port
// =============================================================================

/// Port for human-facing notifications.
///
/// Delivery failures are reported to the caller, which logs them; they
/// never influence move outcomes.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver a single message.
    async fn notify(&self, message: &str) -> Result<()>;
}

#[async_trait]
impl<N: Notifier + ?Sized> Notifier for Arc<N> {
    async fn notify(&self, message: &str) -> Result<()> {
        (**self).notify(message).await
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).single().unwrap()
    }

    #[test]
    fn test_file_record_name_from_path() {
        let record = FileRecord::new("/cache/movies/a.mkv", 10, at(0), at(0));
        assert_eq!(record.name, "a.mkv");
        assert_eq!(record.path, PathBuf::from("/cache/movies/a.mkv"));
    }

    #[test]
    fn test_file_record_ages() {
        let now = at(1_000_000);
        let record = FileRecord::new("/c/f", 0, now - Duration::days(2), now - Duration::hours(3));

        assert_eq!(record.age_secs(now), 2 * 86400);
        assert_eq!(record.idle_secs(now), 3 * 3600);
    }

    #[test]
    fn test_population_display() {
        assert_eq!(Population::Evictable.to_string(), "evictable");
        assert_eq!(Population::Young.to_string(), "young");
        assert_eq!(Population::Hot.to_string(), "hot");
    }

    #[test]
    fn test_population_serializes_lowercase() {
        let json = serde_json::to_string(&Population::Hot).unwrap();
        assert_eq!(json, "\"hot\"");
    }
}
