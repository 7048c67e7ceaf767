//! Scanner CLI surface (spec.md §6, component J).
//!
//! Generalizes the teacher's `clap`-derive pattern to the contracted flags:
//! `--project-path`, `--config-file`, `--output-format`, `--output-file`,
//! `--fail-on-critical`, `--quiet`.

use std::path::PathBuf;

use clap::{Parser, ValueEnum};

/// Audit a source tree for dangerous and wasteful SQL patterns.
#[derive(Parser, Debug)]
#[command(name = "sql-audit")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the source tree to scan.
    #[arg(long)]
    pub project_path: PathBuf,

    /// Override the default checker config path.
    #[arg(long)]
    pub config_file: Option<PathBuf>,

    /// Rendering format for the finding list.
    #[arg(long, value_enum, default_value = "console")]
    pub output_format: OutputFormat,

    /// Write the rendered report here instead of stdout.
    #[arg(long)]
    pub output_file: Option<PathBuf>,

    /// Exit 1 when any finding is CRITICAL, even if the scan otherwise
    /// completed without error.
    #[arg(long)]
    pub fail_on_critical: bool,

    /// Suppress the per-file finding list; only the summary line and exit
    /// code are affected by the scan result.
    #[arg(long)]
    pub quiet: bool
}

/// Output format for the scanner CLI. `Html` renders the same structured
/// text the console path produces — HTML report rendering is out of scope
/// (spec.md §1) — so the flag is accepted, not a silent no-op, but the
/// output itself is plain text either way (documented in DESIGN.md).
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Console,
    Html
}
