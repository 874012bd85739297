//! Core orchestration for the docshift document transformation engine
//!
//! The engine itself is an external executable invoked as
//! `<engine> <input> <output>`. This crate owns everything around it:
//!
//! - **Renderer invocation**: spawn the engine, capture diagnostics, verify output
//! - **Jobs**: per-document bookkeeping from `Pending` to a terminal status
//! - **Batch runner**: idempotent, fault-isolated passes over a directory
//! - **Index builder**: a summary HTML document linking every output
//! - **Reporting**: console and JSON summaries of a batch run
//!
//! # Example
//!
//! ```no_run
//! use docshift_core::batch::{BatchRunner, NamingRule, StopSignal};
//! use docshift_core::renderer::ProcessRenderer;
//! use docshift_core::Config;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = Config::from_file("docshift.toml")?;
//! let renderer = ProcessRenderer::new(&config.engine);
//! let runner = BatchRunner::new(renderer, NamingRule::from_config(&config.batch));
//!
//! let run = runner
//!     .run(&config.batch.source_dir, &config.batch.dest_dir, &StopSignal::new())
//!     .await?;
//! println!("{} converted, {} skipped", run.counts.success, run.counts.skipped);
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod error;
pub mod index;
pub mod job;
pub mod renderer;
pub mod report;

// Re-export main types for convenience
pub use config::Config;
pub use error::{ErrorKind, RenderError};
pub use job::{InputSource, JobStatus, TransformationJob};
pub use renderer::{InvocationResult, ProcessRenderer, Renderer};
