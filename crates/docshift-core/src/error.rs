//! Error types for engine invocation

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use thiserror::Error;

/// Broad category of a failure, used to pick a status code or a log level
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// The engine is missing or cannot be started
    Configuration,
    /// The input file, field or URL is missing or unusable
    Input,
    /// The engine ran and reported failure
    Engine,
    /// The output could not be written or read back
    Io,
}

/// Failure of a single engine invocation
#[derive(Error, Debug)]
pub enum RenderError {
    #[error("Engine executable not found: {}", .0.display())]
    ExecutableNotFound(PathBuf),

    #[error("Input not found: {}", .0.display())]
    InputNotFound(PathBuf),

    #[error("Engine exited with {}: {stderr}", exit_label(.code))]
    EngineNonZeroExit { code: Option<i32>, stderr: String },

    #[error("Engine timed out after {0}ms")]
    Timeout(u64),

    #[error("Engine reported success but produced no output at {}", .0.display())]
    OutputMissing(PathBuf),

    #[error("Failed to start engine {}: {source}", .engine.display())]
    Spawn {
        engine: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

fn exit_label(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {}", code),
        None => "no exit code (terminated by signal)".to_string(),
    }
}

impl RenderError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            RenderError::ExecutableNotFound(_) | RenderError::Spawn { .. } => {
                ErrorKind::Configuration
            }
            RenderError::InputNotFound(_) => ErrorKind::Input,
            RenderError::EngineNonZeroExit { .. } | RenderError::Timeout(_) => ErrorKind::Engine,
            RenderError::OutputMissing(_) | RenderError::Io(_) => ErrorKind::Io,
        }
    }

    /// Exit code reported by the engine, when it got far enough to exit
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            RenderError::EngineNonZeroExit { code, .. } => *code,
            _ => None,
        }
    }

    /// Diagnostics the engine wrote to stderr
    pub fn stderr(&self) -> Option<&str> {
        match self {
            RenderError::EngineNonZeroExit { stderr, .. } => Some(stderr.as_str()),
            _ => None,
        }
    }
}
