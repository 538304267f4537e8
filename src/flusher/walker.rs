//! Cache Drive Walker
//!
//! Depth-unrestricted traversal of a cache-drive root yielding one
//! [`FileRecord`] per regular file. Directories are descended but never
//! yielded, symbolic links are neither followed nor yielded, and any path
//! containing an override substring is skipped (override directories are
//! pruned without being descended).
//!
//! Yield order is not guaranteed.

use std::fs::Metadata;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::context::RunContext;
use crate::domain::FileRecord;
use crate::error::{Error, Result};

/// Start walking `root`.
///
/// Fails with [`Error::Walk`] if the root is missing or not a directory.
pub fn walk<'a>(root: &Path, ctx: &'a RunContext) -> Result<CacheFiles<'a>> {
    let meta = std::fs::metadata(root).map_err(|e| Error::Walk {
        path: root.to_path_buf(),
        reason: e.to_string(),
    })?;
    if !meta.is_dir() {
        return Err(Error::Walk {
            path: root.to_path_buf(),
            reason: "not a directory".to_string(),
        });
    }

    Ok(CacheFiles {
        root: root.to_path_buf(),
        inner: WalkDir::new(root).follow_links(false).into_iter(),
        ctx,
        skipped_errors: 0,
        overridden: 0,
        done: false,
    })
}

/// Iterator over the regular files of a cache drive.
///
/// Per-entry traversal errors are logged and skipped. An error reading the
/// root itself is yielded once as `Err` and ends the iteration.
pub struct CacheFiles<'a> {
    root: PathBuf,
    inner: walkdir::IntoIter,
    ctx: &'a RunContext,
    skipped_errors: usize,
    overridden: usize,
    done: bool,
}

impl CacheFiles<'_> {
    /// Entries skipped because of traversal or metadata errors
    pub fn skipped_errors(&self) -> usize {
        self.skipped_errors
    }

    /// Files and directories skipped because they matched an override
    pub fn overridden(&self) -> usize {
        self.overridden
    }
}

impl Iterator for CacheFiles<'_> {
    type Item = Result<FileRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        loop {
            let entry = match self.inner.next()? {
                Ok(entry) => entry,
                Err(err) => {
                    if err.depth() == 0 {
                        self.done = true;
                        return Some(Err(Error::Walk {
                            path: self.root.clone(),
                            reason: err.to_string(),
                        }));
                    }
                    warn!(error = %err, "Encountered error walking files, skipping entry");
                    self.skipped_errors += 1;
                    continue;
                }
            };

            let file_type = entry.file_type();

            if file_type.is_dir() {
                if entry.depth() > 0 && self.ctx.is_overridden(entry.path()) {
                    debug!(path = %entry.path().display(), "Skipping override directory");
                    self.overridden += 1;
                    self.inner.skip_current_dir();
                }
                continue;
            }

            // Symlinks, sockets, fifos and devices are never candidates.
            if !file_type.is_file() {
                continue;
            }

            if self.ctx.is_overridden(entry.path()) {
                debug!(path = %entry.path().display(), "Skipping override file");
                self.overridden += 1;
                continue;
            }

            let metadata = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    warn!(path = %entry.path().display(), error = %err, "Failed to stat file, skipping");
                    self.skipped_errors += 1;
                    continue;
                }
            };

            match record_from_metadata(entry.into_path(), &metadata) {
                Ok(record) => return Some(Ok(record)),
                Err(err) => {
                    warn!(error = %err, "Failed to read file timestamps, skipping");
                    self.skipped_errors += 1;
                }
            }
        }
    }
}

/// Build a [`FileRecord`] from filesystem metadata.
pub fn record_from_metadata(path: PathBuf, metadata: &Metadata) -> std::io::Result<FileRecord> {
    let mtime: DateTime<Utc> = metadata.modified()?.into();
    let atime: DateTime<Utc> = metadata.accessed()?.into();
    Ok(FileRecord::new(path, metadata.len(), mtime, atime))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher::policy::FlushPolicy;
    use std::fs;
    use tempfile::tempdir;

    fn ctx(root: &Path, overrides: &[&str]) -> RunContext {
        let mut ctx = RunContext::new("/backing", vec![root.to_path_buf()], FlushPolicy::OldestFirst);
        ctx.override_directories = overrides.iter().map(|s| s.to_string()).collect();
        ctx
    }

    fn names(root: &Path, ctx: &RunContext) -> Vec<String> {
        let mut names: Vec<String> = walk(root, ctx)
            .unwrap()
            .map(|r| {
                r.unwrap()
                    .path
                    .strip_prefix(root)
                    .unwrap()
                    .to_string_lossy()
                    .into_owned()
            })
            .collect();
        names.sort();
        names
    }

    #[test]
    fn test_walk_yields_regular_files_only() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("a/b")).unwrap();
        fs::write(root.join("top.txt"), b"1").unwrap();
        fs::write(root.join("a/b/deep.txt"), b"22").unwrap();
        fs::create_dir_all(root.join("empty")).unwrap();

        let ctx = ctx(root, &[]);
        assert_eq!(names(root, &ctx), vec!["a/b/deep.txt", "top.txt"]);
    }

    #[test]
    fn test_walk_records_size_and_name() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("f.bin"), vec![0u8; 1234]).unwrap();

        let ctx = ctx(dir.path(), &[]);
        let records: Vec<FileRecord> = walk(dir.path(), &ctx).unwrap().map(|r| r.unwrap()).collect();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].name, "f.bin");
        assert_eq!(records[0].size, 1234);
        assert!(records[0].path.starts_with(dir.path()));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_skips_symlinks() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("real.txt"), b"x").unwrap();
        std::os::unix::fs::symlink(root.join("real.txt"), root.join("link.txt")).unwrap();
        fs::create_dir(root.join("sub")).unwrap();
        fs::write(root.join("sub/inner.txt"), b"y").unwrap();
        std::os::unix::fs::symlink(root.join("sub"), root.join("dirlink")).unwrap();

        let ctx = ctx(root, &[]);
        assert_eq!(names(root, &ctx), vec!["real.txt", "sub/inner.txt"]);
    }

    #[test]
    fn test_walk_skips_override_directories() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("keep")).unwrap();
        fs::create_dir_all(root.join("other")).unwrap();
        fs::write(root.join("keep/x"), b"x").unwrap();
        fs::write(root.join("other/y"), b"y").unwrap();

        let ctx = ctx(root, &["/keep"]);
        let mut files = walk(root, &ctx).unwrap();
        let found: Vec<_> = files.by_ref().map(|r| r.unwrap().name).collect();

        assert_eq!(found, vec!["y".to_string()]);
        assert_eq!(files.overridden(), 1);
    }

    #[test]
    fn test_walk_override_matches_file_names() {
        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::write(root.join("movie.partial"), b"x").unwrap();
        fs::write(root.join("movie.mkv"), b"y").unwrap();

        let ctx = ctx(root, &[".partial"]);
        assert_eq!(names(root, &ctx), vec!["movie.mkv"]);
    }

    #[test]
    fn test_walk_missing_root_is_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("nope");
        let ctx = ctx(&missing, &[]);

        assert!(matches!(walk(&missing, &ctx), Err(Error::Walk { .. })));
    }

    #[test]
    fn test_walk_file_root_is_error() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("file");
        fs::write(&file, b"x").unwrap();
        let ctx = ctx(&file, &[]);

        assert!(matches!(walk(&file, &ctx), Err(Error::Walk { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn test_walk_continues_past_unreadable_directory() {
        use std::os::unix::fs::PermissionsExt;

        // Permission bits do not stop root.
        if unsafe { libc::getuid() } == 0 {
            return;
        }

        let dir = tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("locked")).unwrap();
        fs::write(root.join("locked/hidden.txt"), b"x").unwrap();
        fs::create_dir_all(root.join("open")).unwrap();
        fs::write(root.join("open/visible.txt"), b"y").unwrap();
        fs::write(root.join("top.txt"), b"z").unwrap();
        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o000)).unwrap();

        let ctx = ctx(root, &[]);
        let mut files = walk(root, &ctx).unwrap();
        let results: Vec<Result<FileRecord>> = files.by_ref().collect();
        let skipped = files.skipped_errors();

        fs::set_permissions(root.join("locked"), fs::Permissions::from_mode(0o755)).unwrap();

        assert!(results.iter().all(|r| r.is_ok()));
        let mut found: Vec<String> = results.into_iter().map(|r| r.unwrap().name).collect();
        found.sort();
        assert_eq!(found, vec!["top.txt", "visible.txt"]);
        assert_eq!(skipped, 1);
    }
}
