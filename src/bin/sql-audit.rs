//! Thin scanner entry point (spec.md §6, component J).
//!
//! Parses arguments, loads config, walks the project path via
//! [`sql_audit_core::scan::scan_project`], and renders the result. All of
//! the actual work lives in the library so it stays testable without
//! spawning a process.

use std::{fs, process};

use clap::Parser;
use sql_audit_core::{
    cli::Cli,
    config::{FileConfig, RuntimeConfig},
    dialect::DialectId,
    output,
    scan::scan_project
};

fn main() {
    tracing_subscriber::fmt::init();
    process::exit(run());
}

/// Exit codes per spec.md §6: 0 clean (or non-critical with the flag off),
/// 1 CRITICAL or error, 2 invalid arguments.
fn run() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            eprintln!("{e}");
            return 2;
        }
    };

    let runtime_config = match load_config(cli.config_file.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("config error: {e}");
            return 1;
        }
    };

    let report = match scan_project(&cli.project_path, DialectId::Generic, &runtime_config) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("scan error: {e}");
            return 1;
        }
    };

    if !cli.quiet {
        let rendered = output::render(&report, cli.output_format, cli.output_file.is_none());
        match &cli.output_file {
            Some(path) => {
                if let Err(e) = fs::write(path, &rendered) {
                    eprintln!("failed to write output file '{}': {e}", path.display());
                    return 1;
                }
            }
            None => print!("{rendered}")
        }
    }

    if cli.fail_on_critical && report.has_critical() { 1 } else { 0 }
}

fn load_config(path: Option<&std::path::Path>) -> Result<RuntimeConfig, sql_audit_core::error::AppError> {
    match path {
        Some(path) => Ok(RuntimeConfig::from_file(FileConfig::load_from_path(path)?)),
        None => Ok(RuntimeConfig::default())
    }
}
