//! File Classifier
//!
//! Assigns each discovered file to exactly one population. The cascade is
//! evaluated top to bottom and the first matching rule wins:
//!
//! 1. force mode → `evictable`
//! 2. accessed within `current_access_threshold` → `hot`
//! 3. modified within `minimum_age` → `young`
//! 4. otherwise → `evictable`
//!
//! A threshold of 0 disables its rule. `hot` is tested before `young`, so a
//! file that is both new and in use stays on the cache as long as possible.

use chrono::{DateTime, Utc};

use super::context::RunContext;
use crate::domain::{FileRecord, Population};

/// Pure classification function over a fixed "now"
#[derive(Debug, Clone, Copy)]
pub struct Classifier {
    minimum_age: i64,
    current_access_threshold: i64,
    force: bool,
    now: DateTime<Utc>,
}

impl Classifier {
    pub fn new(minimum_age: i64, current_access_threshold: i64, force: bool, now: DateTime<Utc>) -> Self {
        Self {
            minimum_age,
            current_access_threshold,
            force,
            now,
        }
    }

    /// Build a classifier from run settings, capturing `now` for the drive.
    pub fn for_run(ctx: &RunContext, now: DateTime<Utc>) -> Self {
        Self::new(ctx.minimum_age, ctx.current_access_threshold, ctx.force, now)
    }

    pub fn classify(&self, file: &FileRecord) -> Population {
        if self.force {
            return Population::Evictable;
        }
        if self.current_access_threshold > 0 && file.idle_secs(self.now) <= self.current_access_threshold {
            return Population::Hot;
        }
        if self.minimum_age > 0 && file.age_secs(self.now) <= self.minimum_age {
            return Population::Young;
        }
        Population::Evictable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    const DAY: i64 = 86400;

    fn now() -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).single().unwrap()
    }

    fn file(age: i64, idle: i64) -> FileRecord {
        FileRecord::new(
            "/c/f",
            1,
            now() - Duration::seconds(age),
            now() - Duration::seconds(idle),
        )
    }

    // =========================================================================
    // Cascade Tests
    // =========================================================================

    #[test]
    fn test_old_idle_file_is_evictable() {
        let c = Classifier::new(7 * DAY, DAY, false, now());
        assert_eq!(c.classify(&file(10 * DAY, 10 * DAY)), Population::Evictable);
    }

    #[test]
    fn test_new_file_is_young() {
        let c = Classifier::new(7 * DAY, DAY, false, now());
        assert_eq!(c.classify(&file(DAY, 5 * DAY)), Population::Young);
    }

    #[test]
    fn test_recently_accessed_is_hot() {
        let c = Classifier::new(7 * DAY, DAY, false, now());
        assert_eq!(c.classify(&file(30 * DAY, 60)), Population::Hot);
    }

    #[test]
    fn test_hot_wins_over_young() {
        let c = Classifier::new(7 * DAY, DAY, false, now());
        assert_eq!(c.classify(&file(60, 60)), Population::Hot);
    }

    #[test]
    fn test_force_overrides_everything() {
        let c = Classifier::new(7 * DAY, DAY, true, now());
        assert_eq!(c.classify(&file(0, 0)), Population::Evictable);
        assert_eq!(c.classify(&file(DAY, 10 * DAY)), Population::Evictable);
    }

    // =========================================================================
    // Threshold Tests
    // =========================================================================

    #[test]
    fn test_zero_thresholds_disable_rules() {
        let c = Classifier::new(0, 0, false, now());
        assert_eq!(c.classify(&file(0, 0)), Population::Evictable);
    }

    #[test]
    fn test_access_boundary_is_inclusive() {
        let c = Classifier::new(0, DAY, false, now());
        assert_eq!(c.classify(&file(30 * DAY, DAY)), Population::Hot);
        assert_eq!(c.classify(&file(30 * DAY, DAY + 1)), Population::Evictable);
    }

    #[test]
    fn test_age_boundary_is_inclusive() {
        let c = Classifier::new(7 * DAY, 0, false, now());
        assert_eq!(c.classify(&file(7 * DAY, 30 * DAY)), Population::Young);
        assert_eq!(c.classify(&file(7 * DAY + 1, 30 * DAY)), Population::Evictable);
    }

    #[test]
    fn test_age_boundary_yields_to_hot() {
        let c = Classifier::new(7 * DAY, DAY, false, now());
        assert_eq!(c.classify(&file(7 * DAY, DAY)), Population::Hot);
    }

    #[test]
    fn test_future_timestamps_count_as_recent() {
        let c = Classifier::new(DAY, DAY, false, now());
        assert_eq!(c.classify(&file(30 * DAY, -3600)), Population::Hot);
        assert_eq!(c.classify(&file(-3600, 30 * DAY)), Population::Young);
    }
}
