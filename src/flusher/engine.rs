//! Flush Engine
//!
//! Plans and executes the eviction of one cache drive at a time.
//!
//! # Phases
//!
//! ```text
//! plan:     probe free ─▶ walk ─▶ classify ─▶ sort young/hot
//! phase 1:  move every evictable file (no free-space checks)
//! phase 2:  while free < target: move next young file
//! phase 3:  while free < target: move next hot file
//! cleanup:  optional empty-directory reaper
//! ```
//!
//! # Guarantees
//!
//! 1. All `evictable` moves finish before any `young` move, and all `young`
//!    moves before any `hot` move
//! 2. Free space is probed before every conditional move and the phase
//!    stops as soon as the target is met
//! 3. A failed move is logged and never retried; the run continues
//! 4. A drive that cannot reach its target completes normally

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, error, info, info_span, instrument, warn, Instrument};
use uuid::Uuid;

use super::classifier::Classifier;
use super::context::RunContext;
use super::mover::{MoveOutcome, SafeMover};
use super::reaper::{reap_empty_dirs, ReapStats};
use super::walker;
use crate::domain::{FileRecord, FlushEvent, FreeSpaceProbe, Notifier, Population};
use crate::error::{Error, ErrorKind, Result};
use crate::metrics::FlushMetrics;

const GIB: u64 = 1 << 30;

// =============================================================================
// Populations
// =============================================================================

/// The three populations of a drive, in eviction order
#[derive(Debug, Clone, Default)]
pub struct Populations {
    pub evictable: Vec<FileRecord>,
    pub young: Vec<FileRecord>,
    pub hot: Vec<FileRecord>,
}

impl Populations {
    pub fn push(&mut self, population: Population, file: FileRecord) {
        match population {
            Population::Evictable => self.evictable.push(file),
            Population::Young => self.young.push(file),
            Population::Hot => self.hot.push(file),
        }
    }

    pub fn get(&self, population: Population) -> &[FileRecord] {
        match population {
            Population::Evictable => &self.evictable,
            Population::Young => &self.young,
            Population::Hot => &self.hot,
        }
    }

    pub fn counts(&self) -> PopulationCounts {
        PopulationCounts {
            evictable: self.evictable.len(),
            young: self.young.len(),
            hot: self.hot.len(),
        }
    }

    pub fn total(&self) -> usize {
        self.evictable.len() + self.young.len() + self.hot.len()
    }
}

/// Number of files in each population
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PopulationCounts {
    pub evictable: usize,
    pub young: usize,
    pub hot: usize,
}

// =============================================================================
// Drive Plan & State
// =============================================================================

/// Classified and ordered contents of one cache drive
#[derive(Debug, Clone)]
pub struct DrivePlan {
    pub root: PathBuf,
    pub starting_free: u64,
    pub required_free: u64,
    pub populations: Populations,
}

/// Mutable per-drive state while a plan executes
#[derive(Debug, Clone)]
pub struct DriveContext {
    pub root: PathBuf,
    pub starting_free: u64,
    pub current_free: u64,
    pub required_free: u64,
    pub moved_count: u64,
}

impl DriveContext {
    fn from_plan(plan: &DrivePlan) -> Self {
        Self {
            root: plan.root.clone(),
            starting_free: plan.starting_free,
            current_free: plan.starting_free,
            required_free: plan.required_free,
            moved_count: 0,
        }
    }

    fn target_met(&self) -> bool {
        self.current_free >= self.required_free
    }
}

// =============================================================================
// Reports
// =============================================================================

/// Terminal state of a single file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum MoveStatus {
    Moved,
    Skipped,
    Failed,
}

impl std::fmt::Display for MoveStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MoveStatus::Moved => write!(f, "moved"),
            MoveStatus::Skipped => write!(f, "skipped"),
            MoveStatus::Failed => write!(f, "failed"),
        }
    }
}

/// One attempted move, in execution order
#[derive(Debug, Clone, Serialize)]
pub struct MoveRecord {
    pub source: PathBuf,
    pub destination: Option<PathBuf>,
    pub population: Population,
    pub status: MoveStatus,
    pub size: u64,
    pub error: Option<String>,
}

/// Result of processing one cache drive
#[derive(Debug, Clone, Serialize)]
pub struct DriveReport {
    pub root: PathBuf,
    pub counts: PopulationCounts,
    pub starting_free: u64,
    pub final_free: u64,
    pub required_free: u64,
    pub moved: u64,
    pub skipped: u64,
    pub failed: u64,
    pub bytes_moved: u64,
    pub target_met: bool,
    /// Bytes still missing from the free-space target
    pub shortfall: u64,
    pub reaped: Option<ReapStats>,
    /// Set when the drive was abandoned part-way (probe failure)
    pub aborted: Option<String>,
    pub moves: Vec<MoveRecord>,
}

impl DriveReport {
    fn new(plan: &DrivePlan) -> Self {
        Self {
            root: plan.root.clone(),
            counts: plan.populations.counts(),
            starting_free: plan.starting_free,
            final_free: plan.starting_free,
            required_free: plan.required_free,
            moved: 0,
            skipped: 0,
            failed: 0,
            bytes_moved: 0,
            target_met: plan.starting_free >= plan.required_free,
            shortfall: plan.required_free.saturating_sub(plan.starting_free),
            reaped: None,
            aborted: None,
            moves: Vec::new(),
        }
    }

    /// Sources of the attempted moves for `population`, in order
    pub fn attempted(&self, population: Population) -> Vec<&Path> {
        self.moves
            .iter()
            .filter(|m| m.population == population)
            .map(|m| m.source.as_path())
            .collect()
    }
}

/// A drive that could not be processed at all
#[derive(Debug, Clone, Serialize)]
pub struct DriveFailure {
    pub root: PathBuf,
    pub reason: String,
}

/// Result of a complete run across all cache drives
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub drives: Vec<DriveReport>,
    pub failures: Vec<DriveFailure>,
}

impl RunReport {
    fn new() -> Self {
        let now = Utc::now();
        Self {
            run_id: Uuid::new_v4(),
            started_at: now,
            finished_at: now,
            drives: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub fn total_moved(&self) -> u64 {
        self.drives.iter().map(|d| d.moved).sum()
    }

    pub fn total_failed(&self) -> u64 {
        self.drives.iter().map(|d| d.failed).sum()
    }
}

// =============================================================================
// Flusher
// =============================================================================

/// Sequential cache-tier flusher
pub struct Flusher {
    ctx: RunContext,
    probe: Arc<dyn FreeSpaceProbe>,
    notifier: Arc<dyn Notifier>,
    metrics: FlushMetrics,
}

impl Flusher {
    pub fn new(
        ctx: RunContext,
        probe: Arc<dyn FreeSpaceProbe>,
        notifier: Arc<dyn Notifier>,
        metrics: FlushMetrics,
    ) -> Self {
        Self {
            ctx,
            probe,
            notifier,
            metrics,
        }
    }

    pub fn metrics(&self) -> &FlushMetrics {
        &self.metrics
    }

    /// Process every cache drive in configuration order.
    pub async fn run(&self) -> RunReport {
        let mut report = RunReport::new();
        let run_id = report.run_id;

        async {
            info!("============= New CacheFlush Execution =============");
            info!(
                "Policy: {}, target free space: {}GB, skip move: {}, force: {}",
                self.ctx.policy,
                self.ctx.required_free / GIB,
                self.ctx.skip_move,
                self.ctx.force
            );
            self.publish(FlushEvent::run_started(run_id, self.ctx.cache_drives.len()))
                .await;

            for root in &self.ctx.cache_drives {
                let span = info_span!("drive", root = %root.display());
                match self.process_drive(run_id, root).instrument(span).await {
                    Ok(drive) => report.drives.push(drive),
                    Err(e) => report.failures.push(DriveFailure {
                        root: root.clone(),
                        reason: e.to_string(),
                    }),
                }
            }

            report.finished_at = Utc::now();
            info!(
                moved = report.total_moved(),
                failed = report.total_failed(),
                aborted_drives = report.failures.len(),
                "Cacheflush completed"
            );
            self.publish(FlushEvent::run_completed(
                run_id,
                report.total_moved(),
                report.total_failed(),
            ))
            .await;
        }
        .instrument(info_span!("flush_run", run_id = %run_id))
        .await;

        report
    }

    async fn process_drive(&self, run_id: Uuid, root: &Path) -> Result<DriveReport> {
        info!("Processing cache drive: {}", root.display());
        self.publish(FlushEvent::drive_started(run_id, root)).await;

        let plan = match self.plan_drive(root, Utc::now()) {
            Ok(plan) => plan,
            Err(e) => {
                error!(error = %e, kind = %e.kind(), "Aborting cache drive");
                self.metrics.record_drive_error(e.kind());
                self.publish(FlushEvent::drive_aborted(run_id, root, e.to_string()))
                    .await;
                return Err(e);
            }
        };

        let counts = plan.populations.counts();
        self.publish(FlushEvent::DriveClassified {
            run_id,
            drive: root.to_path_buf(),
            evictable: counts.evictable,
            young: counts.young,
            hot: counts.hot,
        })
        .await;

        let report = self.execute_plan(&plan);

        if let Some(reason) = &report.aborted {
            self.publish(FlushEvent::drive_aborted(run_id, root, reason.clone()))
                .await;
        }
        self.publish(FlushEvent::DriveCompleted {
            run_id,
            drive: root.to_path_buf(),
            moved: report.moved,
            skipped: report.skipped,
            failed: report.failed,
            free_before: report.starting_free,
            free_after: report.final_free,
            target_met: report.target_met,
            timestamp: Utc::now(),
        })
        .await;

        Ok(report)
    }

    /// Plan and execute one drive without notifications.
    pub fn flush_drive(&self, root: &Path) -> Result<DriveReport> {
        let plan = self.plan_drive(root, Utc::now())?;
        Ok(self.execute_plan(&plan))
    }

    /// Probe, walk, classify and order one drive.
    ///
    /// Fails with `ProbeFailed` or `Walk` if the drive cannot be inspected.
    #[instrument(skip_all, fields(root = %root.display()))]
    pub fn plan_drive(&self, root: &Path, now: DateTime<Utc>) -> Result<DrivePlan> {
        let starting_free = self.probe.free_bytes(root)?;
        info!("Starting disk free space: {}GB", starting_free / GIB);

        let classifier = Classifier::for_run(&self.ctx, now);
        let mut populations = Populations::default();

        let mut files = walker::walk(root, &self.ctx)?;
        for file in files.by_ref() {
            let file = file?;
            let population = classifier.classify(&file);
            debug!(path = %file.path.display(), %population, "Classified file");
            populations.push(population, file);
        }
        if files.skipped_errors() > 0 {
            warn!(
                skipped = files.skipped_errors(),
                "Some entries could not be read and were skipped"
            );
        }

        if !self.ctx.force {
            self.ctx.policy.sort(&mut populations.young);
            self.ctx.policy.sort(&mut populations.hot);
        }

        let counts = populations.counts();
        info!("evictable files: {}", counts.evictable);
        info!("young files: {}", counts.young);
        info!("hot files: {}", counts.hot);
        for population in Population::ALL {
            self.metrics
                .record_classified(population, populations.get(population).len());
        }

        Ok(DrivePlan {
            root: root.to_path_buf(),
            starting_free,
            required_free: self.ctx.required_free,
            populations,
        })
    }

    /// Run the three eviction phases for a plan, then the reaper.
    pub fn execute_plan(&self, plan: &DrivePlan) -> DriveReport {
        let mut drive = DriveContext::from_plan(plan);
        let mut report = DriveReport::new(plan);
        let mover = SafeMover::new(&self.ctx);

        for file in &plan.populations.evictable {
            self.execute_move(&mover, &mut drive, &mut report, file, Population::Evictable);
        }

        let phases = [Population::Young, Population::Hot];
        let drained = phases.iter().try_for_each(|&population| {
            self.drain_until_target(
                &mover,
                &mut drive,
                &mut report,
                plan.populations.get(population),
                population,
            )
        });

        match drained {
            Ok(()) => {
                if self.ctx.clear_empty_dirs {
                    report.reaped = Some(reap_empty_dirs(&drive.root, &self.ctx));
                }
                match self.probe.free_bytes(&drive.root) {
                    Ok(free) => drive.current_free = free,
                    Err(e) => warn!(error = %e, "Failed to probe final free space"),
                }
            }
            Err(e) => {
                error!(error = %e, "Aborting cache drive");
                self.metrics.record_drive_error(e.kind());
                report.aborted = Some(e.to_string());
            }
        }

        report.final_free = drive.current_free;
        report.target_met = drive.target_met();
        report.shortfall = drive.required_free.saturating_sub(drive.current_free);
        self.metrics.set_drive_free(&drive.root, drive.current_free);

        if !report.target_met {
            warn!(
                "Free-space target not reached on {}: {}GB free of {}GB required",
                drive.root.display(),
                drive.current_free / GIB,
                drive.required_free / GIB
            );
        }
        info!(
            "Done processing drive {}, moved {} files, free space before: {} GB, free space after: {} GB",
            drive.root.display(),
            drive.moved_count,
            drive.starting_free / GIB,
            drive.current_free / GIB
        );

        report
    }

    /// Move files in order until the free-space target is met.
    fn drain_until_target(
        &self,
        mover: &SafeMover<'_>,
        drive: &mut DriveContext,
        report: &mut DriveReport,
        files: &[FileRecord],
        population: Population,
    ) -> Result<()> {
        for file in files {
            drive.current_free = self.probe.free_bytes(&drive.root)?;
            if drive.target_met() {
                debug!(
                    "Disk free space of {}GB is >= target of {}GB, skipping further movement of {} files.",
                    drive.current_free / GIB,
                    drive.required_free / GIB,
                    population
                );
                break;
            }
            debug!(
                "Disk free space of {}GB is lower than target of {}GB, moving additional {} file.",
                drive.current_free / GIB,
                drive.required_free / GIB,
                population
            );
            self.execute_move(mover, drive, report, file, population);
        }
        Ok(())
    }

    fn execute_move(
        &self,
        mover: &SafeMover<'_>,
        drive: &mut DriveContext,
        report: &mut DriveReport,
        file: &FileRecord,
        population: Population,
    ) {
        let (status, destination, error) = match mover.move_file(file, &drive.root) {
            Ok(MoveOutcome::Moved { destination, bytes }) => {
                drive.moved_count += 1;
                report.moved += 1;
                report.bytes_moved += bytes;
                self.metrics.record_moved(bytes);
                (MoveStatus::Moved, Some(destination), None)
            }
            Ok(MoveOutcome::Skipped { destination }) => {
                report.skipped += 1;
                self.metrics.record_skipped();
                (MoveStatus::Skipped, Some(destination), None)
            }
            Err(e) => {
                log_move_failure(file, &e);
                report.failed += 1;
                self.metrics.record_failed();
                let destination = match &e {
                    Error::DestinationExists { path } => Some(path.clone()),
                    _ => None,
                };
                (MoveStatus::Failed, destination, Some(e.to_string()))
            }
        };

        report.moves.push(MoveRecord {
            source: file.path.clone(),
            destination,
            population,
            status,
            size: file.size,
            error,
        });
    }

    async fn publish(&self, event: FlushEvent) {
        let json = serde_json::to_string(&event).unwrap_or_else(|_| format!("{:?}", event));
        debug!(event_type = %event.event_type(), event = %json, "Flush event");

        if let Err(e) = self.notifier.notify(&event.message()).await {
            error!(error = %e, "Failed to send notification");
        }
    }
}

impl std::fmt::Debug for Flusher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Flusher").field("ctx", &self.ctx).finish()
    }
}

fn log_move_failure(file: &FileRecord, e: &Error) {
    match e.kind() {
        ErrorKind::DestinationExists => error!(
            "Failed to move {}, file already exists at {}",
            file.path.display(),
            e
        ),
        kind => error!(
            path = %file.path.display(),
            %kind,
            "Failed to move file with error: {}",
            e
        ),
    }
}
