//! Batch conversion of a source directory
//!
//! One run walks `source_dir` in file-name order and converts every matching
//! input into `dest_dir`. The run is built to be re-executed unattended:
//!
//! - An existing output is proof of earlier work; that input is skipped
//!   without invoking the engine.
//! - One failing item is recorded and counted; the loop moves on.
//! - A [`StopSignal`] is honored between items only, never while the engine
//!   is writing an output.
//! - Items run strictly one after another.
//!
//! ```text
//! source_dir/deck.html  ──engine──▶  dest_dir/deck_converted.html
//! source_dir/memo.html  ──(exists)─▶ skipped
//! ```

mod lock;
mod naming;

pub use lock::{DestinationLock, LOCK_FILE_NAME};
pub use naming::NamingRule;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::job::{InputSource, JobStatus, TransformationJob};
use crate::renderer::Renderer;

/// Failures that prevent a run from starting
///
/// Individual item failures are never reported here; they end up in
/// [`BatchRun::items`].
#[derive(Error, Debug)]
pub enum BatchError {
    #[error("Destination {} is the source directory; outputs would be read back as inputs", .0.display())]
    SameDirectory(PathBuf),

    #[error("Destination {} is locked by another run (remove {} if stale)", .0.display(), LOCK_FILE_NAME)]
    DestinationLocked(PathBuf),

    #[error("Failed to create destination {}: {source}", .path.display())]
    CreateDestination {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to lock destination {}: {source}", .path.display())]
    Lock {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read source directory {}: {source}", .path.display())]
    ReadSource {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Cooperative stop request shared with a signal handler
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Item tallies for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchCounts {
    pub total: usize,
    pub success: usize,
    pub error: usize,
    pub skipped: usize,
    /// Items never reached because the run was stopped
    pub remaining: usize,
}

impl BatchCounts {
    /// `total == success + error + skipped + remaining`
    pub fn is_balanced(&self) -> bool {
        self.total == self.success + self.error + self.skipped + self.remaining
    }
}

/// Bookkeeping for one pass over a source directory
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchRun {
    pub source_dir: PathBuf,
    pub dest_dir: PathBuf,
    /// False when `source_dir` did not exist
    pub source_found: bool,
    pub items: Vec<TransformationJob>,
    pub counts: BatchCounts,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub duration_ms: u64,
    /// Set when a stop signal ended the run early
    pub interrupted: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl BatchRun {
    fn begin(source_dir: &Path, dest_dir: &Path) -> Self {
        Self {
            source_dir: source_dir.to_path_buf(),
            dest_dir: dest_dir.to_path_buf(),
            source_found: false,
            items: Vec::new(),
            counts: BatchCounts::default(),
            started_at: Utc::now(),
            ended_at: None,
            duration_ms: 0,
            interrupted: false,
            message: None,
        }
    }

    fn record(&mut self, job: TransformationJob) {
        match job.status {
            JobStatus::Succeeded => self.counts.success += 1,
            JobStatus::Failed => self.counts.error += 1,
            JobStatus::Skipped => self.counts.skipped += 1,
            JobStatus::Pending | JobStatus::Running => {
                // process_one always returns a terminal job
                error!(item = %job.name(), status = ?job.status, "Job recorded without terminal status");
                self.counts.error += 1;
            }
        }
        self.items.push(job);
    }

    fn end(&mut self, started: Instant) {
        self.ended_at = Some(Utc::now());
        self.duration_ms = started.elapsed().as_millis() as u64;
    }

    /// Outputs present in `dest_dir` after the run, in processing order
    pub fn outputs(&self) -> Vec<PathBuf> {
        self.items
            .iter()
            .filter(|job| matches!(job.status, JobStatus::Succeeded | JobStatus::Skipped))
            .map(|job| job.output_path.clone())
            .collect()
    }

    pub fn failures(&self) -> impl Iterator<Item = &TransformationJob> {
        self.items
            .iter()
            .filter(|job| job.status == JobStatus::Failed)
    }
}

/// Drives a [`Renderer`] over a directory
pub struct BatchRunner<R> {
    renderer: R,
    naming: NamingRule,
}

impl<R: Renderer> BatchRunner<R> {
    pub fn new(renderer: R, naming: NamingRule) -> Self {
        Self { renderer, naming }
    }

    pub fn naming(&self) -> &NamingRule {
        &self.naming
    }

    /// Convert every pending input of `source_dir` into `dest_dir`
    #[instrument(skip(self, stop), fields(source = %source_dir.display(), dest = %dest_dir.display()))]
    pub async fn run(
        &self,
        source_dir: &Path,
        dest_dir: &Path,
        stop: &StopSignal,
    ) -> Result<BatchRun, BatchError> {
        let started = Instant::now();
        let mut run = BatchRun::begin(source_dir, dest_dir);

        if !source_dir.is_dir() {
            let message = format!(
                "Source directory {} does not exist; nothing to convert",
                source_dir.display()
            );
            info!("{}", message);
            run.message = Some(message);
            run.end(started);
            return Ok(run);
        }
        run.source_found = true;

        if same_directory(source_dir, dest_dir) {
            return Err(BatchError::SameDirectory(dest_dir.to_path_buf()));
        }
        fs::create_dir_all(dest_dir).map_err(|source| BatchError::CreateDestination {
            path: dest_dir.to_path_buf(),
            source,
        })?;
        let _lock = DestinationLock::acquire(dest_dir).map_err(|source| {
            if source.kind() == std::io::ErrorKind::AlreadyExists {
                BatchError::DestinationLocked(dest_dir.to_path_buf())
            } else {
                BatchError::Lock {
                    path: dest_dir.to_path_buf(),
                    source,
                }
            }
        })?;

        let inputs = self.discover(source_dir)?;
        run.counts.total = inputs.len();
        info!(total = inputs.len(), "Starting batch");

        for (index, input) in inputs.into_iter().enumerate() {
            if stop.is_raised() {
                run.counts.remaining = run.counts.total - index;
                run.interrupted = true;
                warn!(remaining = run.counts.remaining, "Stop requested, ending run");
                break;
            }

            let job = self.prepare(input, dest_dir);
            let job = if job.output_path.exists() {
                let mut job = job;
                job.skip();
                job
            } else {
                self.process_one(job).await
            };

            info!(
                "[{}/{}] {:?} {}",
                index + 1,
                run.counts.total,
                job.status,
                job.name()
            );
            run.record(job);
        }

        run.end(started);
        info!(
            success = run.counts.success,
            error = run.counts.error,
            skipped = run.counts.skipped,
            remaining = run.counts.remaining,
            duration_ms = run.duration_ms,
            "Batch finished"
        );
        Ok(run)
    }

    /// Invoke the engine for one job; always returns the job in a terminal status
    ///
    /// A failed job never leaves an output behind, so the next run retries it
    /// instead of skipping a partial file.
    pub async fn process_one(&self, mut job: TransformationJob) -> TransformationJob {
        job.start();
        let started = Instant::now();
        let outcome = self
            .renderer
            .invoke(&job.input_path, &job.output_path)
            .await;
        if let Err(e) = &outcome {
            warn!(item = %job.name(), kind = ?e.kind(), error = %e, "Conversion failed");
            discard_partial(&job.output_path).await;
        }
        job.finish(&outcome, started.elapsed());
        job
    }

    fn prepare(&self, input: PathBuf, dest_dir: &Path) -> TransformationJob {
        // discover() only yields inputs with a usable stem
        let output_name = self.naming.output_name_for(&input).unwrap_or_default();
        let output_path = dest_dir.join(output_name);
        TransformationJob::new(InputSource::Filesystem, input, output_path)
    }

    /// Matching regular files of `source_dir`, sorted by file name
    fn discover(&self, source_dir: &Path) -> Result<Vec<PathBuf>, BatchError> {
        let read_error = |source| BatchError::ReadSource {
            path: source_dir.to_path_buf(),
            source,
        };

        let mut inputs = Vec::new();
        for entry in fs::read_dir(source_dir).map_err(read_error)? {
            let path = entry.map_err(read_error)?.path();
            if !path.is_file() || !self.naming.matches(&path) {
                continue;
            }
            if self.naming.output_name_for(&path).is_none() {
                warn!(input = %path.display(), "Skipping input without a UTF-8 file stem");
                continue;
            }
            inputs.push(path);
        }
        inputs.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
        Ok(inputs)
    }
}

async fn discard_partial(output: &Path) {
    match tokio::fs::remove_file(output).await {
        Ok(()) => warn!(output = %output.display(), "Removed partial output"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => error!(output = %output.display(), error = %e, "Failed to remove partial output"),
    }
}

fn same_directory(a: &Path, b: &Path) -> bool {
    match (fs::canonicalize(a), fs::canonicalize(b)) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}
