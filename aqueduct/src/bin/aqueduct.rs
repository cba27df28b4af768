//! Aqueduct command line
//!
//! Runs the tests of one or more configuration files and writes the requested
//! reports. Exits with 0 when every check passed, 1 when any check failed and
//! 2 when the run could not be set up.

use anyhow::{Context, Result};
use aqueduct::config::PlaceholderTable;
use aqueduct::extensions;
use aqueduct::logging::{init_logging, LoggingConfig};
use aqueduct::registry::Registries;
use aqueduct::runner::{RunnerOptions, TestRunner};
use aqueduct::AqueductError;
use clap::builder::PossibleValuesParser;
use clap::{CommandFactory, FromArgMatches, Parser};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{error, info, Level};

const EXIT_FAILED: u8 = 1;
const EXIT_SETUP: u8 = 2;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Test definition files, merged in order
    #[arg(required = true, value_name = "CONFIG_FILE")]
    config_files: Vec<PathBuf>,

    /// Report format; repeat to produce several reports
    #[arg(short, long, value_name = "FORMAT", default_value = "console")]
    format: Vec<String>,

    /// Log level for aqueduct diagnostics on stderr
    #[arg(long, default_value = "warn")]
    log_level: Level,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Parses the command line, accepting every registered reporter format.
    fn parse_with_formats(formats: Vec<String>) -> Self {
        let matches = Self::command()
            .mut_arg("format", |arg| {
                arg.value_parser(PossibleValuesParser::new(formats))
            })
            .get_matches();
        Self::from_arg_matches(&matches).unwrap_or_else(|e| e.exit())
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let options = RunnerOptions::default();

    // Aliases must exist before the command line validates format names.
    let mut registries = Registries::with_builtins();
    if let Err(err) = extensions::load(&options.extensions_file, &mut registries) {
        eprintln!("Error: {err}");
        return ExitCode::from(EXIT_SETUP);
    }

    let cli = Cli::parse_with_formats(registries.reporters.available());

    let logging = LoggingConfig::default()
        .with_aqueduct_level(cli.log_level)
        .with_json_format(cli.log_json);
    if let Err(err) = init_logging(&logging) {
        eprintln!("Warning: failed to initialize logging: {err}");
    }

    match run(&cli, &registries, &options).await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::from(EXIT_FAILED),
        Err(err) => {
            error!(error = %err, "Run aborted");
            eprintln!("Error: {err:#}");
            ExitCode::from(exit_code(&err))
        }
    }
}

/// Returns whether every check passed.
async fn run(cli: &Cli, registries: &Registries, options: &RunnerOptions) -> Result<bool> {
    let placeholders = PlaceholderTable::load(&options.placeholders_file)
        .context("Failed to load placeholders")?;

    let runner = TestRunner::from_files(&cli.config_files, registries, placeholders).await?;
    let results = runner.run_all().await;

    // Every reporter runs even when an earlier one fails.
    let mut failures = Vec::new();
    for format in &cli.format {
        let written = registries
            .reporters
            .create(format)
            .and_then(|reporter| reporter.generate_report(&results))
            .with_context(|| format!("Failed to write {format} report"));
        if let Err(err) = written {
            error!(format = %format, error = %err, "Report failed");
            failures.push(err);
        }
    }

    let (total, failed) = results.totals();
    info!(tests = results.len(), checks = total, failed, "Done");

    let mut failures = failures.into_iter();
    match failures.next() {
        Some(first) => {
            for other in failures {
                eprintln!("Error: {other:#}");
            }
            Err(first)
        }
        None => Ok(results.all_passed()),
    }
}

fn exit_code(err: &anyhow::Error) -> u8 {
    match err.downcast_ref::<AqueductError>() {
        Some(e) if !e.is_configuration_error() => EXIT_FAILED,
        _ => EXIT_SETUP,
    }
}
