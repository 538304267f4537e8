//! Flush Metrics Recorder
//!
//! Prometheus counters describing a run. A flush is a batch job, so
//! instead of serving `/metrics` the registry is rendered once at the end
//! of the run and written atomically to a textfile for node-exporter's
//! textfile collector.

use std::fs;
use std::path::Path;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

use crate::domain::Population;
use crate::error::{ErrorKind, Result};

/// Metrics for a single flush run
#[derive(Clone)]
pub struct FlushMetrics {
    registry: Registry,
    files_classified: IntCounterVec,
    moves: IntCounterVec,
    bytes_moved: IntCounter,
    drive_free_bytes: IntGaugeVec,
    drive_errors: IntCounterVec,
}

impl FlushMetrics {
    /// Create a recorder with its own registry.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let files_classified = IntCounterVec::new(
            Opts::new(
                "cacheflush_files_classified_total",
                "Files classified per population",
            ),
            &["population"],
        )?;
        let moves = IntCounterVec::new(
            Opts::new("cacheflush_moves_total", "File moves by outcome"),
            &["outcome"],
        )?;
        let bytes_moved = IntCounter::new(
            "cacheflush_bytes_moved_total",
            "Bytes copied to the backing pool",
        )?;
        let drive_free_bytes = IntGaugeVec::new(
            Opts::new(
                "cacheflush_drive_free_bytes",
                "Free bytes on each cache drive after processing",
            ),
            &["drive"],
        )?;
        let drive_errors = IntCounterVec::new(
            Opts::new("cacheflush_drive_errors_total", "Cache drives aborted by kind"),
            &["kind"],
        )?;

        registry.register(Box::new(files_classified.clone()))?;
        registry.register(Box::new(moves.clone()))?;
        registry.register(Box::new(bytes_moved.clone()))?;
        registry.register(Box::new(drive_free_bytes.clone()))?;
        registry.register(Box::new(drive_errors.clone()))?;

        Ok(Self {
            registry,
            files_classified,
            moves,
            bytes_moved,
            drive_free_bytes,
            drive_errors,
        })
    }

    pub fn record_classified(&self, population: Population, count: usize) {
        self.files_classified
            .with_label_values(&[population.as_str()])
            .inc_by(count as u64);
    }

    pub fn record_moved(&self, bytes: u64) {
        self.moves.with_label_values(&["moved"]).inc();
        self.bytes_moved.inc_by(bytes);
    }

    pub fn record_skipped(&self) {
        self.moves.with_label_values(&["skipped"]).inc();
    }

    pub fn record_failed(&self) {
        self.moves.with_label_values(&["failed"]).inc();
    }

    pub fn set_drive_free(&self, drive: &Path, free_bytes: u64) {
        self.drive_free_bytes
            .with_label_values(&[&drive.display().to_string()])
            .set(i64::try_from(free_bytes).unwrap_or(i64::MAX));
    }

    pub fn record_drive_error(&self, kind: ErrorKind) {
        self.drive_errors.with_label_values(&[&kind.to_string()]).inc();
    }

    /// Render the registry in the Prometheus text format.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let mut buffer = Vec::new();
        encoder.encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Write the rendered metrics to `path` via a temporary sibling and a
    /// rename, so collectors never read a half-written file.
    pub fn write_textfile(&self, path: &Path) -> Result<()> {
        let rendered = self.render()?;
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        fs::write(&tmp, rendered)?;
        fs::rename(&tmp, path)?;
        Ok(())
    }
}

impl std::fmt::Debug for FlushMetrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlushMetrics")
            .field("bytes_moved", &self.bytes_moved.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_render_contains_counters() {
        let metrics = FlushMetrics::new().unwrap();
        metrics.record_classified(Population::Evictable, 3);
        metrics.record_classified(Population::Hot, 1);
        metrics.record_moved(1024);
        metrics.record_moved(1024);
        metrics.record_failed();
        metrics.set_drive_free(Path::new("/mnt/cache"), 4096);

        let text = metrics.render().unwrap();

        assert!(text.contains("cacheflush_files_classified_total{population=\"evictable\"} 3"));
        assert!(text.contains("cacheflush_files_classified_total{population=\"hot\"} 1"));
        assert!(text.contains("cacheflush_moves_total{outcome=\"moved\"} 2"));
        assert!(text.contains("cacheflush_moves_total{outcome=\"failed\"} 1"));
        assert!(text.contains("cacheflush_bytes_moved_total 2048"));
        assert!(text.contains("cacheflush_drive_free_bytes{drive=\"/mnt/cache\"} 4096"));
    }

    #[test]
    fn test_recorders_are_independent() {
        let a = FlushMetrics::new().unwrap();
        let b = FlushMetrics::new().unwrap();
        a.record_moved(10);

        assert!(a.render().unwrap().contains("cacheflush_bytes_moved_total 10"));
        assert!(b.render().unwrap().contains("cacheflush_bytes_moved_total 0"));
    }

    #[test]
    fn test_write_textfile() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("cacheflush.prom");
        let metrics = FlushMetrics::new().unwrap();
        metrics.record_drive_error(ErrorKind::ProbeFailed);

        metrics.write_textfile(&path).unwrap();

        let text = fs::read_to_string(&path).unwrap();
        assert!(text.contains("cacheflush_drive_errors_total{kind=\"probe_failed\"} 1"));
        assert!(!dir.path().join("cacheflush.prom.tmp").exists());
    }
}
