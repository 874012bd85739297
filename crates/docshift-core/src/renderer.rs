//! External engine invocation
//!
//! The engine is called as `<engine> <input> <output>`. Exit code zero is
//! necessary but not sufficient: an invocation only succeeds when the output
//! file exists afterwards.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::{debug, instrument, warn};

use crate::config::EngineConfig;
use crate::error::RenderError;

/// Outcome of a successful engine run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvocationResult {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
    #[serde(with = "duration_ms")]
    pub duration: Duration,
}

/// Something that turns one input document into one output document
///
/// Gateway and batch runner only talk to this trait, so tests can swap the
/// real engine for a fake.
#[async_trait]
pub trait Renderer: Send + Sync {
    async fn invoke(&self, input: &Path, output: &Path) -> Result<InvocationResult, RenderError>;
}

#[async_trait]
impl<R: Renderer + ?Sized> Renderer for std::sync::Arc<R> {
    async fn invoke(&self, input: &Path, output: &Path) -> Result<InvocationResult, RenderError> {
        (**self).invoke(input, output).await
    }
}

/// Runs the engine as a child process
#[derive(Debug, Clone)]
pub struct ProcessRenderer {
    engine_path: PathBuf,
    timeout: Option<Duration>,
}

impl ProcessRenderer {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            engine_path: config.path.clone(),
            timeout: config.timeout(),
        }
    }

    pub fn engine_path(&self) -> &Path {
        &self.engine_path
    }

    /// Fail fast when the configured engine does not exist
    pub fn check_engine(&self) -> Result<(), RenderError> {
        if self.engine_path.is_file() {
            Ok(())
        } else {
            Err(RenderError::ExecutableNotFound(self.engine_path.clone()))
        }
    }
}

#[async_trait]
impl Renderer for ProcessRenderer {
    #[instrument(skip(self), fields(engine = %self.engine_path.display(), input = %input.display()))]
    async fn invoke(&self, input: &Path, output: &Path) -> Result<InvocationResult, RenderError> {
        self.check_engine()?;
        if !input.is_file() {
            return Err(RenderError::InputNotFound(input.to_path_buf()));
        }

        let started = Instant::now();
        let mut command = Command::new(&self.engine_path);
        command
            .arg(input)
            .arg(output)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        // Own process group: a terminal Ctrl-C reaches the caller only, which
        // lets the current invocation finish.
        #[cfg(unix)]
        command.process_group(0);
        let child = command
            .spawn()
            .map_err(|source| RenderError::Spawn {
                engine: self.engine_path.clone(),
                source,
            })?;
        debug!(pid = child.id(), "Engine spawned");

        // Dropping the future on timeout drops the child, which kills it.
        let finished = match self.timeout {
            Some(limit) => tokio::time::timeout(limit, child.wait_with_output())
                .await
                .map_err(|_| {
                    warn!(timeout_ms = limit.as_millis() as u64, "Engine timed out");
                    RenderError::Timeout(limit.as_millis() as u64)
                })??,
            None => child.wait_with_output().await?,
        };
        let duration = started.elapsed();

        let stdout = capture(&finished.stdout);
        let stderr = capture(&finished.stderr);

        match finished.status.code() {
            Some(0) => {}
            code => {
                warn!(?code, %stderr, "Engine failed");
                return Err(RenderError::EngineNonZeroExit { code, stderr });
            }
        }

        if !tokio::fs::try_exists(output).await? {
            warn!(output = %output.display(), "Engine exited cleanly without output");
            return Err(RenderError::OutputMissing(output.to_path_buf()));
        }

        debug!(duration_ms = duration.as_millis() as u64, "Engine finished");
        Ok(InvocationResult {
            exit_code: 0,
            stdout,
            stderr,
            duration,
        })
    }
}

fn capture(bytes: &[u8]) -> String {
    String::from_utf8_lossy(bytes).trim().to_string()
}

pub(crate) mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn stub_engine(dir: &Path, script: &str) -> PathBuf {
        let path = dir.join("engine.sh");
        fs::write(&path, format!("#!/bin/sh\n{}\n", script)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn renderer(engine: PathBuf, timeout_ms: u64) -> ProcessRenderer {
        ProcessRenderer::new(&EngineConfig {
            path: engine,
            timeout_ms,
        })
    }

    #[tokio::test]
    async fn copies_through_stub_engine() {
        let dir = TempDir::new().unwrap();
        let engine = stub_engine(dir.path(), r#"echo converting; cp "$1" "$2""#);
        let input = dir.path().join("in.html");
        let output = dir.path().join("out.html");
        fs::write(&input, "<p>x</p>").unwrap();

        let result = renderer(engine, 5_000).invoke(&input, &output).await.unwrap();

        assert_eq!(result.exit_code, 0);
        assert_eq!(result.stdout, "converting");
        assert_eq!(fs::read_to_string(&output).unwrap(), "<p>x</p>");
        assert!(input.exists(), "input must never be deleted");
    }

    #[tokio::test]
    async fn missing_engine_fails_before_spawn() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("in.html");
        fs::write(&input, "<p>x</p>").unwrap();

        let err = renderer(dir.path().join("nope"), 5_000)
            .invoke(&input, &dir.path().join("out.html"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::ExecutableNotFound(_)));
        assert_eq!(err.kind(), ErrorKind::Configuration);
    }

    #[tokio::test]
    async fn missing_input_is_input_error() {
        let dir = TempDir::new().unwrap();
        let engine = stub_engine(dir.path(), r#"cp "$1" "$2""#);

        let err = renderer(engine, 5_000)
            .invoke(&dir.path().join("absent.html"), &dir.path().join("out.html"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::InputNotFound(_)));
    }

    #[tokio::test]
    async fn non_zero_exit_carries_stderr() {
        let dir = TempDir::new().unwrap();
        let engine = stub_engine(dir.path(), "echo 'unclosed <div>' >&2; exit 4");
        let input = dir.path().join("in.html");
        fs::write(&input, "<div>").unwrap();

        let err = renderer(engine, 5_000)
            .invoke(&input, &dir.path().join("out.html"))
            .await
            .unwrap_err();

        assert_eq!(err.exit_code(), Some(4));
        assert_eq!(err.stderr(), Some("unclosed <div>"));
        assert_eq!(err.kind(), ErrorKind::Engine);
    }

    #[tokio::test]
    async fn zero_exit_without_output_is_not_success() {
        let dir = TempDir::new().unwrap();
        let engine = stub_engine(dir.path(), "exit 0");
        let input = dir.path().join("in.html");
        fs::write(&input, "<p>x</p>").unwrap();

        let err = renderer(engine, 5_000)
            .invoke(&input, &dir.path().join("out.html"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::OutputMissing(_)));
    }

    #[tokio::test]
    async fn hung_engine_times_out() {
        let dir = TempDir::new().unwrap();
        let engine = stub_engine(dir.path(), "sleep 10");
        let input = dir.path().join("in.html");
        fs::write(&input, "<p>x</p>").unwrap();

        let started = Instant::now();
        let err = renderer(engine, 200)
            .invoke(&input, &dir.path().join("out.html"))
            .await
            .unwrap_err();

        assert!(matches!(err, RenderError::Timeout(200)));
        assert!(started.elapsed() < Duration::from_secs(5));
    }
}
