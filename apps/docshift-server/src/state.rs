//! Application state for the docshift gateway

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use docshift_core::batch::NamingRule;
use docshift_core::config::Config;
use docshift_core::{ProcessRenderer, Renderer};

use crate::fetch::{FetchError, RemoteFetcher};

/// Shared, read-only per-request dependencies
#[derive(Clone)]
pub struct AppState {
    pub renderer: Arc<dyn Renderer>,
    /// Parent of the per-request workspaces
    pub workspace_root: PathBuf,
    pub fetcher: RemoteFetcher,
    /// Names the document returned to the client
    pub naming: NamingRule,
    pub max_body_bytes: usize,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self, FetchError> {
        let fetcher = RemoteFetcher::new(
            Duration::from_millis(config.server.fetch_timeout_ms),
            config.server.fetch_retries,
            config.server.max_body_bytes,
        )?;
        Ok(Self {
            renderer: Arc::new(ProcessRenderer::new(&config.engine)),
            workspace_root: config.server.workspace_root.clone(),
            fetcher,
            naming: NamingRule::new("html", &config.batch.suffix),
            max_body_bytes: config.server.max_body_bytes,
        })
    }
}
