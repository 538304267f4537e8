//! Flush Policies
//!
//! Ordering applied to the `young` and `hot` populations before they are
//! drained. The `evictable` population is never reordered.

use std::cmp::Ordering;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::FileRecord;
use crate::error::Error;

/// Sort key for the reluctant populations
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushPolicy {
    /// Ascending modification time
    OldestFirst,
    /// Ascending access time
    LeastAccessed,
    /// Descending size
    LargestFirst,
}

impl FlushPolicy {
    /// Compare two records; `Less` means `a` is evicted before `b`.
    pub fn compare(&self, a: &FileRecord, b: &FileRecord) -> Ordering {
        match self {
            FlushPolicy::OldestFirst => a.mtime.cmp(&b.mtime),
            FlushPolicy::LeastAccessed => a.atime.cmp(&b.atime),
            FlushPolicy::LargestFirst => b.size.cmp(&a.size),
        }
    }

    /// Order a population in eviction order. Ties keep their input order.
    pub fn sort(&self, files: &mut [FileRecord]) {
        files.sort_by(|a, b| self.compare(a, b));
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FlushPolicy::OldestFirst => "oldest-first",
            FlushPolicy::LeastAccessed => "least-accessed",
            FlushPolicy::LargestFirst => "largest-first",
        }
    }
}

impl std::fmt::Display for FlushPolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FlushPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "oldest-first" => Ok(FlushPolicy::OldestFirst),
            "least-accessed" => Ok(FlushPolicy::LeastAccessed),
            "largest-first" => Ok(FlushPolicy::LargestFirst),
            other => Err(Error::ConfigInvalid(format!(
                "{:?} is not a valid FlushPolicy (expected oldest-first, least-accessed or largest-first)",
                other
            ))),
        }
    }
}
