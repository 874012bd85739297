//! Per-document bookkeeping
//!
//! A [`TransformationJob`] starts `Pending`, moves to `Running` while the
//! engine works, and ends in exactly one terminal status. Once terminal,
//! further transitions are ignored.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RenderError};
use crate::renderer::{duration_ms, InvocationResult};

/// Where the input document came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InputSource {
    Inline,
    Upload,
    RemoteUrl,
    Filesystem,
}

impl std::fmt::Display for InputSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            InputSource::Inline => "inline",
            InputSource::Upload => "upload",
            InputSource::RemoteUrl => "remote_url",
            InputSource::Filesystem => "filesystem",
        };
        f.write_str(name)
    }
}

/// Lifecycle status of a job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Running,
    Succeeded,
    Failed,
    /// Batch only: the output already existed, so the engine was not run
    Skipped,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Skipped
        )
    }
}

/// One input document carried through the engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransformationJob {
    pub source: InputSource,
    pub input_path: PathBuf,
    pub output_path: PathBuf,
    pub status: JobStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stderr: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

impl TransformationJob {
    pub fn new(source: InputSource, input_path: PathBuf, output_path: PathBuf) -> Self {
        Self {
            source,
            input_path,
            output_path,
            status: JobStatus::Pending,
            exit_code: None,
            stderr: None,
            error: None,
            error_kind: None,
            duration: Duration::ZERO,
        }
    }

    pub fn start(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Running;
        }
    }

    pub fn skip(&mut self) {
        if self.status == JobStatus::Pending {
            self.status = JobStatus::Skipped;
        }
    }

    pub fn succeed(&mut self, result: &InvocationResult) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Succeeded;
        self.exit_code = Some(result.exit_code);
        self.stderr = non_empty(&result.stderr);
        self.duration = result.duration;
    }

    pub fn fail(&mut self, error: &RenderError, duration: Duration) {
        if self.status.is_terminal() {
            return;
        }
        self.status = JobStatus::Failed;
        self.exit_code = error.exit_code();
        self.stderr = error.stderr().and_then(non_empty);
        self.error = Some(error.to_string());
        self.error_kind = Some(error.kind());
        self.duration = duration;
    }

    /// Record the outcome of an engine invocation
    pub fn finish(&mut self, outcome: &Result<InvocationResult, RenderError>, elapsed: Duration) {
        match outcome {
            Ok(result) => self.succeed(result),
            Err(error) => self.fail(error, elapsed),
        }
    }

    /// File name of the input, for logs and reports
    pub fn name(&self) -> String {
        self.input_path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.input_path.display().to_string())
    }
}

fn non_empty(text: &str) -> Option<String> {
    (!text.is_empty()).then(|| text.to_string())
}
