//! docshift batch runner
//!
//! Converts every matching document of a source directory into a
//! destination directory, then writes a summary index linking the outputs.
//! Safe to re-run: finished outputs are skipped. Ctrl-C stops the run after
//! the current item.
//!
//! Exit status: 0 when every item converted or was skipped, 1 when at least
//! one item failed, 2 when the run was interrupted.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use docshift_core::batch::{BatchRun, BatchRunner, NamingRule, StopSignal};
use docshift_core::config::Config;
use docshift_core::index::write_index;
use docshift_core::report::{OutputFormat, Reporter};
use docshift_core::ProcessRenderer;
use tracing::{error, info, warn, Level};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Command-line arguments for the batch runner
#[derive(Parser, Debug)]
#[command(name = "docshift-batch")]
#[command(about = "Convert a directory of documents through the docshift engine")]
struct Args {
    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory to read inputs from
    #[arg(long)]
    source: Option<PathBuf>,

    /// Directory to write outputs and the index to
    #[arg(long)]
    dest: Option<PathBuf>,

    /// Path to the engine executable
    #[arg(long)]
    engine: Option<PathBuf>,

    /// Input extension filter
    #[arg(long)]
    extension: Option<String>,

    /// Suffix appended to output stems
    #[arg(long)]
    suffix: Option<String>,

    /// Skip writing the summary index
    #[arg(long)]
    no_index: bool,

    /// Report format: console, json or json-pretty
    #[arg(long, default_value = "console")]
    format: OutputFormat,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

impl Args {
    fn apply(&self, config: &mut Config) {
        if let Some(source) = &self.source {
            config.batch.source_dir = source.clone();
        }
        if let Some(dest) = &self.dest {
            config.batch.dest_dir = dest.clone();
        }
        if let Some(engine) = &self.engine {
            config.engine.path = engine.clone();
        }
        if let Some(extension) = &self.extension {
            config.batch.extension = extension.clone();
        }
        if let Some(suffix) = &self.suffix {
            config.batch.suffix = suffix.clone();
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    let args = Args::parse();

    let log_level = if args.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // Logs go to stderr so JSON reports on stdout stay parseable
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(log_level.into()))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::load(args.config.as_deref())?;
    args.apply(&mut config);

    let renderer = ProcessRenderer::new(&config.engine);
    if let Err(e) = renderer.check_engine() {
        error!("Configuration error: {}", e);
        return Err(e.into());
    }

    let stop = StopSignal::new();
    let handler_stop = stop.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping after the current item");
            handler_stop.raise();
        }
    });

    let runner = BatchRunner::new(renderer, NamingRule::from_config(&config.batch));
    let run = runner
        .run(&config.batch.source_dir, &config.batch.dest_dir, &stop)
        .await?;

    if !args.no_index && run.source_found {
        write_summary_index(&config, &run)?;
    }

    Reporter::new(args.format).report(&run)?;
    Ok(exit_code(&run))
}

fn write_summary_index(config: &Config, run: &BatchRun) -> anyhow::Result<()> {
    let path = write_index(
        &config.batch.dest_dir,
        &config.batch.index_file,
        &config.batch.index_title,
        &run.outputs(),
        Utc::now(),
    )
    .with_context(|| {
        format!(
            "Failed to write index into {}",
            config.batch.dest_dir.display()
        )
    })?;
    info!("Index written to {}", path.display());
    Ok(())
}

fn exit_code(run: &BatchRun) -> ExitCode {
    if run.interrupted {
        ExitCode::from(2)
    } else if run.counts.error > 0 {
        ExitCode::from(1)
    } else {
        ExitCode::SUCCESS
    }
}
