//! Configuration loading
//!
//! One TOML file drives both binaries. Every field has a default so an
//! empty file (or no file at all) is a valid configuration:
//!
//! ```toml
//! [engine]
//! path = "/opt/engine/bin/transform"
//! timeout_ms = 120000
//!
//! [server]
//! host = "0.0.0.0"
//! port = 3000
//! workspace_root = "/var/tmp/docshift"
//!
//! [batch]
//! source_dir = "input"
//! dest_dir = "output"
//! extension = "html"
//! ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// External engine settings
    #[serde(default)]
    pub engine: EngineConfig,
    /// HTTP gateway settings
    #[serde(default)]
    pub server: ServerConfig,
    /// Batch runner settings
    #[serde(default)]
    pub batch: BatchConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the TOML is malformed.
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        Self::from_str(&content)
    }

    /// Parse configuration from a TOML string
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> anyhow::Result<Self> {
        toml::from_str(s).context("Failed to parse TOML configuration")
    }

    /// Load `path` when given, otherwise fall back to defaults
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }
}

/// How to reach the external engine
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Path to the engine executable
    #[serde(default = "default_engine_path")]
    pub path: PathBuf,
    /// Kill the engine after this many milliseconds (0 disables the limit)
    #[serde(default = "default_engine_timeout_ms")]
    pub timeout_ms: u64,
}

impl EngineConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            timeout_ms: default_engine_timeout_ms(),
        }
    }

    /// The invocation time limit, if any
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_ms > 0).then(|| Duration::from_millis(self.timeout_ms))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::new(default_engine_path())
    }
}

fn default_engine_path() -> PathBuf {
    PathBuf::from("./engine/transform")
}

fn default_engine_timeout_ms() -> u64 {
    120_000
}

/// HTTP gateway settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Parent directory for per-request workspaces
    #[serde(default = "default_workspace_root")]
    pub workspace_root: PathBuf,
    /// Timeout for fetching remote documents
    #[serde(default = "default_fetch_timeout_ms")]
    pub fetch_timeout_ms: u64,
    /// Extra attempts after a transient fetch failure
    #[serde(default = "default_fetch_retries")]
    pub fetch_retries: u32,
    /// Upper bound for request bodies and fetched documents
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
    /// Requests per second per client IP
    #[serde(default = "default_rate_limit")]
    pub rate_limit: u32,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            workspace_root: default_workspace_root(),
            fetch_timeout_ms: default_fetch_timeout_ms(),
            fetch_retries: default_fetch_retries(),
            max_body_bytes: default_max_body_bytes(),
            rate_limit: default_rate_limit(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

fn default_workspace_root() -> PathBuf {
    std::env::temp_dir().join("docshift")
}

fn default_fetch_timeout_ms() -> u64 {
    10_000
}

fn default_fetch_retries() -> u32 {
    2
}

fn default_max_body_bytes() -> usize {
    10 * 1024 * 1024
}

fn default_rate_limit() -> u32 {
    10
}

/// Batch runner settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    #[serde(default = "default_source_dir")]
    pub source_dir: PathBuf,
    #[serde(default = "default_dest_dir")]
    pub dest_dir: PathBuf,
    /// Only files with this extension are picked up (case-insensitive)
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Appended to the input stem to name the output
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// File name of the summary index written into `dest_dir`
    #[serde(default = "default_index_file")]
    pub index_file: String,
    #[serde(default = "default_index_title")]
    pub index_title: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            source_dir: default_source_dir(),
            dest_dir: default_dest_dir(),
            extension: default_extension(),
            suffix: default_suffix(),
            index_file: default_index_file(),
            index_title: default_index_title(),
        }
    }
}

fn default_source_dir() -> PathBuf {
    PathBuf::from("input")
}

fn default_dest_dir() -> PathBuf {
    PathBuf::from("output")
}

fn default_extension() -> String {
    "html".to_string()
}

pub(crate) fn default_suffix() -> String {
    "_converted".to_string()
}

fn default_index_file() -> String {
    "index.html".to_string()
}

fn default_index_title() -> String {
    "Converted documents".to_string()
}
