//! Empty-Directory Reaper
//!
//! Post-order sweep of a cache root removing directories left empty by the
//! flush. The root itself is never removed, nor is anything under an
//! override directory. Errors are logged and never abort the drive.

use std::fs;
use std::io;
use std::path::Path;

use serde::Serialize;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::context::RunContext;

/// Outcome of a reaper sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ReapStats {
    /// Directories removed (or that would be removed in dry-run mode)
    pub removed: u64,
    /// Entries that could not be inspected or removed
    pub errors: u64,
}

/// Remove empty directories beneath `root`.
pub fn reap_empty_dirs(root: &Path, ctx: &RunContext) -> ReapStats {
    let mut stats = ReapStats::default();

    let walker = WalkDir::new(root)
        .follow_links(false)
        .contents_first(true)
        .min_depth(1);

    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, "Failed to inspect entry while clearing empty directories");
                stats.errors += 1;
                continue;
            }
        };

        if !entry.file_type().is_dir() || ctx.is_overridden(entry.path()) {
            continue;
        }

        match is_empty_dir(entry.path()) {
            Ok(false) => continue,
            Ok(true) => {}
            Err(err) => {
                warn!(dir = %entry.path().display(), error = %err, "Failed to read directory");
                stats.errors += 1;
                continue;
            }
        }

        if ctx.skip_move {
            debug!(dir = %entry.path().display(), "Skipping removal of empty directory");
            stats.removed += 1;
            continue;
        }

        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                debug!(dir = %entry.path().display(), "Removed empty directory");
                stats.removed += 1;
            }
            Err(err) => {
                warn!(dir = %entry.path().display(), error = %err, "Failed to remove empty directory");
                stats.errors += 1;
            }
        }
    }

    stats
}

fn is_empty_dir(dir: &Path) -> io::Result<bool> {
    Ok(fs::read_dir(dir)?.next().is_none())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher::policy::FlushPolicy;
    use tempfile::tempdir;

    fn ctx(root: &Path) -> RunContext {
        RunContext::new("/backing", vec![root.to_path_buf()], FlushPolicy::OldestFirst)
    }

    #[test]
    fn test_removes_nested_empty_dirs() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b/c")).unwrap();
        fs::create_dir_all(root.join("d")).unwrap();

        let stats = reap_empty_dirs(root, &ctx(root));

        assert_eq!(stats.removed, 4);
        assert_eq!(stats.errors, 0);
        assert!(root.exists());
        assert!(fs::read_dir(root).unwrap().next().is_none());
    }

    #[test]
    fn test_keeps_dirs_with_files() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("full/empty")).unwrap();
        fs::write(root.join("full/file"), b"x").unwrap();

        let stats = reap_empty_dirs(root, &ctx(root));

        assert_eq!(stats.removed, 1);
        assert!(root.join("full/file").exists());
        assert!(!root.join("full/empty").exists());
    }

    #[test]
    fn test_never_removes_root() {
        let dir = tempdir().unwrap();
        let stats = reap_empty_dirs(dir.path(), &ctx(dir.path()));

        assert_eq!(stats.removed, 0);
        assert!(dir.path().exists());
    }

    #[test]
    fn test_respects_overrides() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("keep/placeholder")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();

        let mut ctx = ctx(root);
        ctx.override_directories = vec!["/keep".to_string()];
        reap_empty_dirs(root, &ctx);

        assert!(root.join("keep/placeholder").exists());
        assert!(!root.join("other").exists());
    }

    #[test]
    fn test_dry_run_removes_nothing() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a")).unwrap();

        let mut ctx = ctx(root);
        ctx.skip_move = true;
        let stats = reap_empty_dirs(root, &ctx);

        assert_eq!(stats.removed, 1);
        assert!(root.join("a").exists());
    }
}
