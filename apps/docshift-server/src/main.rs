//! docshift HTTP gateway
//!
//! Converts one HTML document per request through the external engine:
//!
//! - `POST /convert/upload`: multipart file upload (field `file`)
//! - `POST /convert/html`: inline HTML in a JSON body
//! - `POST /convert/url`: a document fetched from a URL
//!
//! ## Architecture
//!
//! Every request gets an isolated temp workspace under the configured root.
//! The input is written there, the engine is run against it, the output is
//! sent back, and the workspace is removed on every exit path. Requests share
//! nothing but the read-only engine configuration and the HTTP client.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use docshift_core::config::Config;
use docshift_core::ProcessRenderer;
use tower_governor::{governor::GovernorConfigBuilder, GovernorLayer};
use tracing::{error, info, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod error;
mod fetch;
mod pipeline;
mod source;
mod state;
mod workspace;

use state::AppState;

/// Command-line arguments for the docshift gateway
#[derive(Parser, Debug)]
#[command(name = "docshift-server")]
#[command(about = "HTTP gateway for single-document conversion")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    port: Option<u16>,

    /// Host address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Path to the engine executable
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Directory holding per-request workspaces
    #[arg(long)]
    workspace_root: Option<PathBuf>,

    /// Engine timeout in milliseconds (0 disables)
    #[arg(long)]
    timeout_ms: Option<u64>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(host) = &self.host {
            config.server.host = host.clone();
        }
        if let Some(engine) = &self.engine {
            config.engine.path = engine.clone();
        }
        if let Some(root) = &self.workspace_root {
            config.server.workspace_root = root.clone();
        }
        if let Some(timeout_ms) = self.timeout_ms {
            config.engine.timeout_ms = timeout_ms;
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    // Initialize logging
    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    // A missing engine would fail every request; refuse to start instead
    if let Err(e) = ProcessRenderer::new(&config.engine).check_engine() {
        error!("Configuration error: {}", e);
        return Err(e.into());
    }

    info!(
        "Starting docshift gateway on {}:{}",
        config.server.host, config.server.port
    );

    let governor_conf = Arc::new(
        GovernorConfigBuilder::default()
            .per_second(config.server.rate_limit.max(1).into())
            .burst_size(config.server.rate_limit.max(1) * 2)
            .finish()
            .context("Failed to create rate limiter config")?,
    );

    let state = AppState::from_config(&config)?;
    let app = api::router(state).layer(GovernorLayer {
        config: governor_conf,
    });

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("Server listening on http://{}", addr);
    info!("Engine: {}", config.engine.path.display());
    info!("Workspace root: {}", config.server.workspace_root.display());
    info!("Rate limit: {} requests/second per IP", config.server.rate_limit);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
