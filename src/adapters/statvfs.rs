//! Statvfs Free-Space Adapter
//!
//! Implements the `FreeSpaceProbe` port with `statvfs(3)`. Reports the
//! space available to unprivileged users (`f_bavail * f_frsize`), which is
//! what a subsequent copy onto the drive could actually use.

use std::ffi::CString;
use std::io;
use std::os::unix::ffi::OsStrExt;
use std::path::Path;

use tracing::trace;

use crate::domain::ports::FreeSpaceProbe;
use crate::error::{Error, Result};

/// Free-space probe backed by `statvfs`. Never caches.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatvfsProbe;

impl StatvfsProbe {
    pub fn new() -> Self {
        Self
    }
}

impl FreeSpaceProbe for StatvfsProbe {
    fn free_bytes(&self, path: &Path) -> Result<u64> {
        let probe_failed = |reason: String| Error::ProbeFailed {
            path: path.to_path_buf(),
            reason,
        };

        let c_path = CString::new(path.as_os_str().as_bytes())
            .map_err(|e| probe_failed(format!("invalid path: {}", e)))?;

        let mut stat: libc::statvfs = unsafe { std::mem::zeroed() };
        let result = unsafe { libc::statvfs(c_path.as_ptr(), &mut stat) };
        if result != 0 {
            return Err(probe_failed(io::Error::last_os_error().to_string()));
        }

        #[allow(clippy::unnecessary_cast)]
        let free = (stat.f_bavail as u64).saturating_mul(stat.f_frsize as u64);
        trace!(path = %path.display(), free, "statvfs");
        Ok(free)
    }
}
