//! octa-e2e binary
//!
//! Runs the bundled CLI test suite against a network and exits with the
//! report's exit code.

mod cli;

use anyhow::{Context, Result};
use cli::Cli;
use octa_e2e::{cases, HarnessConfig, Report, Runner, TestHarness};
use std::process::ExitCode;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Exit code for setup failures, distinct from test failures (1)
const SETUP_FAILURE: u8 = 2;

fn main() -> ExitCode {
    // Parse CLI arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("setup failed: {:#}", e);
            eprintln!("error: {:#}", e);
            ExitCode::from(SETUP_FAILURE)
        }
    }
}

fn run(cli: Cli) -> Result<u8> {
    let mut config = match &cli.config {
        Some(path) => HarnessConfig::load(path)?,
        None => HarnessConfig::default(),
    };
    cli.apply(&mut config);

    let mut registry = cases::registry()?;
    if !config.tests.is_empty() {
        registry.retain_named(config.tests.as_slice())?;
    }

    if cli.list {
        for name in registry.names() {
            println!("{}", name);
        }
        return Ok(0);
    }

    tracing::info!(
        network = %config.network,
        tests = registry.len(),
        working_dir = %config.working_dir.display(),
        "octa-e2e starting"
    );

    let harness = TestHarness::connect(config.clone()).context("connecting to network")?;
    harness.prepare().context("preparing test environment")?;

    let mut runner = Runner::new();
    if let Some(timeout) = config.run_timeout() {
        runner = runner.with_run_timeout(timeout);
    }
    let outcomes = runner.run(&registry, &harness);

    let report = Report::from_outcomes(&outcomes);
    let code = report.publish(&mut std::io::stdout().lock(), config.report_path.as_deref());

    tracing::info!(
        passed = report.passed,
        failed = report.failed,
        errored = report.errored,
        cancelled = report.cancelled,
        "octa-e2e finished"
    );

    // Exit code is 0 or 1
    Ok(code as u8)
}
