//! Batch run reporting
//!
//! Formats a finished [`BatchRun`] for an operator (console) or for
//! machines (JSON).

use anyhow::Result;
use std::fmt::Write;
use std::io::{self, Write as _};

use crate::batch::BatchRun;

/// Output format for batch reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Console,
    /// Compact JSON
    Json,
    /// Pretty-printed JSON
    JsonPretty,
}

impl std::str::FromStr for OutputFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "console" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            "json-pretty" | "json_pretty" => Ok(OutputFormat::JsonPretty),
            other => Err(format!(
                "Invalid format '{}'. Must be 'console', 'json' or 'json-pretty'",
                other
            )),
        }
    }
}

/// Reporter for batch runs
pub struct Reporter {
    format: OutputFormat,
}

impl Reporter {
    pub fn new(format: OutputFormat) -> Self {
        Self { format }
    }

    /// Report to stdout
    pub fn report(&self, run: &BatchRun) -> Result<()> {
        let output = self.format(run)?;
        print!("{}", output);
        io::stdout().flush()?;
        Ok(())
    }

    pub fn format(&self, run: &BatchRun) -> Result<String> {
        match self.format {
            OutputFormat::Console => format_console(run),
            OutputFormat::Json => Ok(serde_json::to_string(run)? + "\n"),
            OutputFormat::JsonPretty => Ok(serde_json::to_string_pretty(run)? + "\n"),
        }
    }
}

fn format_console(run: &BatchRun) -> Result<String> {
    let mut output = String::new();
    let counts = &run.counts;

    writeln!(output)?;
    writeln!(output, "Source:       {}", run.source_dir.display())?;
    writeln!(output, "Destination:  {}", run.dest_dir.display())?;
    writeln!(output, "Started:      {}", run.started_at.to_rfc3339())?;
    writeln!(output, "Duration:     {}ms", run.duration_ms)?;
    if let Some(message) = &run.message {
        writeln!(output, "Note:         {}", message)?;
    }
    writeln!(output)?;

    writeln!(output, "  Total:      {}", counts.total)?;
    writeln!(output, "  Converted:  {}", counts.success)?;
    writeln!(output, "  Skipped:    {}", counts.skipped)?;
    writeln!(output, "  Failed:     {}", counts.error)?;
    if run.interrupted {
        writeln!(output, "  Remaining:  {} (run interrupted)", counts.remaining)?;
    }

    let failures: Vec<_> = run.failures().collect();
    if !failures.is_empty() {
        writeln!(output)?;
        writeln!(output, "Failures:")?;
        for job in failures {
            writeln!(
                output,
                "  ✗ {}: {}",
                job.name(),
                job.error.as_deref().unwrap_or("unknown error")
            )?;
        }
    }

    writeln!(output)?;
    let status = if run.interrupted {
        "INTERRUPTED"
    } else if counts.error > 0 {
        "COMPLETED WITH ERRORS"
    } else {
        "OK"
    };
    writeln!(output, "Status: {}", status)?;
    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::batch::{BatchCounts, BatchRun};
    use crate::error::RenderError;
    use crate::job::{InputSource, TransformationJob};
    use chrono::Utc;
    use std::path::PathBuf;
    use std::time::Duration;

    fn sample_run() -> BatchRun {
        let mut failed = TransformationJob::new(
            InputSource::Filesystem,
            PathBuf::from("in/broken.html"),
            PathBuf::from("out/broken_converted.html"),
        );
        failed.start();
        failed.fail(
            &RenderError::EngineNonZeroExit {
                code: Some(2),
                stderr: "bad table".to_string(),
            },
            Duration::from_millis(3),
        );

        BatchRun {
            source_dir: PathBuf::from("in"),
            dest_dir: PathBuf::from("out"),
            source_found: true,
            items: vec![failed],
            counts: BatchCounts {
                total: 3,
                success: 1,
                error: 1,
                skipped: 1,
                remaining: 0,
            },
            started_at: Utc::now(),
            ended_at: Some(Utc::now()),
            duration_ms: 42,
            interrupted: false,
            message: None,
        }
    }

    #[test]
    fn console_lists_counts_and_failures() {
        let output = Reporter::new(OutputFormat::Console)
            .format(&sample_run())
            .unwrap();

        assert!(output.contains("Converted:  1"));
        assert!(output.contains("Failed:     1"));
        assert!(output.contains("broken.html: Engine exited with code 2: bad table"));
        assert!(output.contains("COMPLETED WITH ERRORS"));
        assert!(!output.contains("Remaining"));
    }

    #[test]
    fn json_round_trips_counts() {
        let output = Reporter::new(OutputFormat::Json)
            .format(&sample_run())
            .unwrap();
        let value: serde_json::Value = serde_json::from_str(&output).unwrap();

        assert_eq!(value["counts"]["total"], 3);
        assert_eq!(value["items"][0]["status"], "failed");
        assert_eq!(value["items"][0]["stderr"], "bad table");
    }

    #[test]
    fn parses_format_names() {
        assert_eq!("JSON".parse::<OutputFormat>(), Ok(OutputFormat::Json));
        assert_eq!(
            "json-pretty".parse::<OutputFormat>(),
            Ok(OutputFormat::JsonPretty)
        );
        assert!("xml".parse::<OutputFormat>().is_err());
    }
}
