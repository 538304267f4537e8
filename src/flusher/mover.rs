//! Safe Move Primitive
//!
//! Moves one file from a cache drive to the mirrored location in the
//! backing pool. The two sides live on different filesystems, so the move
//! is a copy followed by an unlink of the source.
//!
//! # Safety Guarantees
//!
//! 1. An existing destination is never overwritten
//! 2. The destination is fsynced before the source is touched
//! 3. The source is removed only after every earlier step succeeded
//! 4. A failed move leaves the source in place (the destination may hold a
//!    partial copy; it is not cleaned up)

use std::ffi::OsString;
use std::fs::{self, File, OpenOptions};
use std::io;
use std::os::unix::ffi::{OsStrExt, OsStringExt};
use std::os::unix::fs::{chown, PermissionsExt};
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, instrument};

use super::context::{Owner, RunContext};
use crate::domain::FileRecord;
use crate::error::{Error, Result};

/// Mode applied to moved files and created directories
pub const DESTINATION_MODE: u32 = 0o775;

/// Successful result of a single move
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "lowercase")]
pub enum MoveOutcome {
    /// File copied to the backing pool and removed from the cache
    Moved { destination: PathBuf, bytes: u64 },
    /// Dry run; nothing was touched
    Skipped { destination: PathBuf },
}

impl MoveOutcome {
    pub fn destination(&self) -> &Path {
        match self {
            MoveOutcome::Moved { destination, .. } | MoveOutcome::Skipped { destination } => destination,
        }
    }
}

/// Derive the backing-pool path for `source` by replacing every occurrence
/// of `cache_root` with `backing_pool`. The remainder is preserved byte for
/// byte.
pub fn destination_for(source: &Path, cache_root: &Path, backing_pool: &Path) -> PathBuf {
    let haystack = source.as_os_str().as_bytes();
    let from = cache_root.as_os_str().as_bytes();
    let to = backing_pool.as_os_str().as_bytes();

    if from.is_empty() {
        return source.to_path_buf();
    }

    let mut out = Vec::with_capacity(haystack.len() + to.len());
    let mut i = 0;
    while i < haystack.len() {
        if haystack[i..].starts_with(from) {
            out.extend_from_slice(to);
            i += from.len();
        } else {
            out.push(haystack[i]);
            i += 1;
        }
    }

    PathBuf::from(OsString::from_vec(out))
}

/// Copy-then-verify-then-unlink mover bound to a run's settings
#[derive(Debug, Clone, Copy)]
pub struct SafeMover<'a> {
    ctx: &'a RunContext,
}

impl<'a> SafeMover<'a> {
    pub fn new(ctx: &'a RunContext) -> Self {
        Self { ctx }
    }

    /// Move `file` from `cache_root` into the backing pool.
    #[instrument(skip(self, file, cache_root), fields(path = %file.path.display()))]
    pub fn move_file(&self, file: &FileRecord, cache_root: &Path) -> Result<MoveOutcome> {
        let destination = destination_for(&file.path, cache_root, &self.ctx.backing_pool);

        if self.ctx.skip_move {
            debug!(
                "Skipping move operation, would have moved: {} to {}",
                file.path.display(),
                destination.display()
            );
            return Ok(MoveOutcome::Skipped { destination });
        }

        if let Some(parent) = destination.parent() {
            ensure_dir(parent, self.ctx.owner)?;
        }

        if fs::symlink_metadata(&destination).is_ok() {
            return Err(Error::DestinationExists { path: destination });
        }

        debug!("Moving file {} to {}...", file.path.display(), destination.display());
        let bytes = copy_synced(&file.path, &destination)?;

        chown(&destination, Some(self.ctx.owner.uid), Some(self.ctx.owner.gid))
            .map_err(|e| Error::move_io("chown", &destination, e))?;
        fs::set_permissions(&destination, fs::Permissions::from_mode(DESTINATION_MODE))
            .map_err(|e| Error::move_io("chmod", &destination, e))?;

        // The source must still be there before we commit to the unlink.
        fs::metadata(&file.path).map_err(|e| Error::move_io("stat", &file.path, e))?;
        fs::remove_file(&file.path).map_err(|e| Error::move_io("unlink", &file.path, e))?;

        Ok(MoveOutcome::Moved { destination, bytes })
    }
}

/// Stream `source` into a newly created `destination` and fsync it.
fn copy_synced(source: &Path, destination: &Path) -> Result<u64> {
    let mut input = File::open(source).map_err(|e| Error::move_io("open", source, e))?;

    let mut output = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(destination)
        .map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => Error::DestinationExists {
                path: destination.to_path_buf(),
            },
            _ => Error::move_io("create", destination, e),
        })?;

    let bytes = io::copy(&mut input, &mut output).map_err(|e| Error::move_io("copy", destination, e))?;
    output
        .sync_all()
        .map_err(|e| Error::move_io("fsync", destination, e))?;

    Ok(bytes)
}

/// Create `dir` and any missing ancestors, applying `owner` and a
/// group-writable mode to every directory created here.
fn ensure_dir(dir: &Path, owner: Owner) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }

    let mut missing = Vec::new();
    let mut current = Some(dir);
    while let Some(d) = current {
        if d.as_os_str().is_empty() || d.exists() {
            break;
        }
        missing.push(d);
        current = d.parent();
    }

    for d in missing.into_iter().rev() {
        match fs::create_dir(d) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(e) => return Err(Error::move_io("mkdir", d, e)),
        }
        chown(d, Some(owner.uid), Some(owner.gid)).map_err(|e| Error::move_io("chown", d, e))?;
        fs::set_permissions(d, fs::Permissions::from_mode(DESTINATION_MODE))
            .map_err(|e| Error::move_io("chmod", d, e))?;
        debug!(dir = %d.display(), "Created backing directory");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flusher::policy::FlushPolicy;
    use assert_matches::assert_matches;
    use chrono::Utc;
    use std::os::unix::fs::MetadataExt;
    use tempfile::{tempdir, TempDir};

    struct Fixture {
        _dir: TempDir,
        cache: PathBuf,
        ctx: RunContext,
    }

    fn fixture() -> Fixture {
        let dir = tempdir().unwrap();
        let cache = dir.path().join("cache");
        let backing = dir.path().join("backing");
        fs::create_dir_all(&cache).unwrap();
        fs::create_dir_all(&backing).unwrap();

        let mut ctx = RunContext::new(&backing, vec![cache.clone()], FlushPolicy::OldestFirst);
        ctx.owner = Owner::new(unsafe { libc::getuid() }, unsafe { libc::getgid() });

        Fixture {
            _dir: dir,
            cache,
            ctx,
        }
    }

    fn cached_file(cache: &Path, rel: &str, contents: &[u8]) -> FileRecord {
        let path = cache.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, contents).unwrap();
        FileRecord::new(path, contents.len() as u64, Utc::now(), Utc::now())
    }

    // =========================================================================
    // destination_for Tests
    // =========================================================================

    #[test]
    fn test_destination_mirrors_relative_path() {
        let dst = destination_for(
            Path::new("/mnt/cache/movies/a/b.mkv"),
            Path::new("/mnt/cache"),
            Path::new("/mnt/pool"),
        );
        assert_eq!(dst, PathBuf::from("/mnt/pool/movies/a/b.mkv"));
    }

    #[test]
    fn test_destination_replaces_every_occurrence() {
        let dst = destination_for(
            Path::new("/c/x/c/y"),
            Path::new("/c"),
            Path::new("/b"),
        );
        assert_eq!(dst, PathBuf::from("/b/x/b/y"));
    }

    #[test]
    fn test_destination_preserves_non_utf8_bytes() {
        let source = PathBuf::from(OsString::from_vec(b"/c/\xff\xfe.bin".to_vec()));
        let dst = destination_for(&source, Path::new("/c"), Path::new("/b"));
        assert_eq!(dst.as_os_str().as_bytes(), b"/b/\xff\xfe.bin");
    }

    // =========================================================================
    // move_file Tests
    // =========================================================================

    #[test]
    fn test_move_copies_and_unlinks() {
        let f = fixture();
        let file = cached_file(&f.cache, "shows/s01/e01.mkv", b"episode data");

        let outcome = SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap();

        let expected = f.ctx.backing_pool.join("shows/s01/e01.mkv");
        assert_eq!(
            outcome,
            MoveOutcome::Moved {
                destination: expected.clone(),
                bytes: 12
            }
        );
        assert!(!file.path.exists());
        assert_eq!(fs::read(&expected).unwrap(), b"episode data");
    }

    #[test]
    fn test_move_sets_mode_and_owner() {
        let f = fixture();
        let file = cached_file(&f.cache, "a/b/f.txt", b"x");

        SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap();

        let dst = f.ctx.backing_pool.join("a/b/f.txt");
        let meta = fs::metadata(&dst).unwrap();
        assert_eq!(meta.permissions().mode() & 0o777, 0o775);
        assert_eq!(meta.uid(), f.ctx.owner.uid);
        assert_eq!(meta.gid(), f.ctx.owner.gid);

        for dir in [f.ctx.backing_pool.join("a"), f.ctx.backing_pool.join("a/b")] {
            let meta = fs::metadata(&dir).unwrap();
            assert_eq!(meta.permissions().mode() & 0o777, 0o775);
            assert_eq!(meta.uid(), f.ctx.owner.uid);
        }
    }

    #[test]
    fn test_move_refuses_existing_destination() {
        let f = fixture();
        let file = cached_file(&f.cache, "f", b"cache copy");
        fs::write(f.ctx.backing_pool.join("f"), b"pool copy").unwrap();

        let err = SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap_err();

        assert_matches!(err, Error::DestinationExists { .. });
        assert_eq!(fs::read(&file.path).unwrap(), b"cache copy");
        assert_eq!(fs::read(f.ctx.backing_pool.join("f")).unwrap(), b"pool copy");
    }

    #[test]
    fn test_skip_move_touches_nothing() {
        let mut f = fixture();
        f.ctx.skip_move = true;
        let file = cached_file(&f.cache, "deep/dir/f", b"data");

        let outcome = SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap();

        assert_matches!(outcome, MoveOutcome::Skipped { .. });
        assert_eq!(outcome.destination(), f.ctx.backing_pool.join("deep/dir/f"));
        assert!(file.path.exists());
        assert!(!f.ctx.backing_pool.join("deep").exists());
    }

    #[test]
    fn test_missing_source_fails_without_side_effects_on_cache() {
        let f = fixture();
        let file = FileRecord::new(f.cache.join("gone"), 0, Utc::now(), Utc::now());

        let err = SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap_err();

        assert_matches!(err, Error::MoveIo { op: "open", .. });
        assert!(!f.ctx.backing_pool.join("gone").exists());
    }

    #[test]
    fn test_existing_backing_directories_are_reused() {
        let f = fixture();
        fs::create_dir_all(f.ctx.backing_pool.join("shared")).unwrap();
        fs::write(f.ctx.backing_pool.join("shared/other"), b"o").unwrap();
        let file = cached_file(&f.cache, "shared/new", b"n");

        SafeMover::new(&f.ctx).move_file(&file, &f.cache).unwrap();

        assert!(f.ctx.backing_pool.join("shared/other").exists());
        assert!(f.ctx.backing_pool.join("shared/new").exists());
    }
}
