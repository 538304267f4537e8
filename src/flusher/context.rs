//! Run Context
//!
//! Immutable per-run settings, resolved once from the configuration and
//! passed explicitly to the walker, classifier, planner and mover.

use std::path::{Path, PathBuf};

use serde::Serialize;

use super::policy::FlushPolicy;

/// Identity applied to files and directories created in the backing pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct Owner {
    pub uid: u32,
    pub gid: u32,
}

impl Owner {
    pub fn new(uid: u32, gid: u32) -> Self {
        Self { uid, gid }
    }
}

/// Settings for a single flush run
#[derive(Debug, Clone, Serialize)]
pub struct RunContext {
    /// Root of the slow tier
    pub backing_pool: PathBuf,

    /// Roots of the fast tier, processed in order
    pub cache_drives: Vec<PathBuf>,

    /// Path substrings that exclude a file from consideration
    pub override_directories: Vec<String>,

    /// Owner for destination files and created directories
    pub owner: Owner,

    /// Free-space target in bytes (0 disables phases 2 and 3)
    pub required_free: u64,

    /// Files modified within this many seconds are `young` (0 disables)
    pub minimum_age: i64,

    /// Files accessed within this many seconds are `hot` (0 disables)
    pub current_access_threshold: i64,

    /// Ordering for the `young` and `hot` populations
    pub policy: FlushPolicy,

    /// Remove empty directories under each cache root afterwards
    pub clear_empty_dirs: bool,

    /// Dry-run mode (classify and log, no filesystem changes)
    pub skip_move: bool,

    /// Classify every non-override file as evictable
    pub force: bool,
}

impl RunContext {
    /// Create a context with all thresholds disabled.
    ///
    /// Roots are normalised so that `/mnt/cache/` and `/mnt/cache` mirror
    /// into the backing pool identically.
    pub fn new(
        backing_pool: impl Into<PathBuf>,
        cache_drives: Vec<PathBuf>,
        policy: FlushPolicy,
    ) -> Self {
        Self {
            backing_pool: normalize_root(&backing_pool.into()),
            cache_drives: cache_drives.iter().map(|d| normalize_root(d)).collect(),
            override_directories: Vec::new(),
            owner: Owner::default(),
            required_free: 0,
            minimum_age: 0,
            current_access_threshold: 0,
            policy,
            clear_empty_dirs: false,
            skip_move: false,
            force: false,
        }
    }

    /// Check whether `path` contains any configured override substring.
    ///
    /// Matching is case-sensitive containment on the full path.
    pub fn is_overridden(&self, path: &Path) -> bool {
        if self.override_directories.is_empty() {
            return false;
        }
        let path = path.to_string_lossy();
        self.override_directories
            .iter()
            .any(|o| !o.is_empty() && path.contains(o.as_str()))
    }
}

/// Drop trailing separators and `.` components from a root path.
pub fn normalize_root(path: &Path) -> PathBuf {
    path.components().collect()
}
