// SPDX-License-Identifier: AGPL-3.0-only

//! Time a contact kernel on a step file and validate its output.
//!
//! stdout carries the machine-readable part (validation lines when flagged
//! or verbose, then the summary line); logs go to stderr.
//!
//! Exit code 0 = run completed, 1 = usage/configuration error or a
//! flagged value with `-x`, 2 = malformed input or any other failure.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use log::{debug, error, info, warn};

use hertz_bench::bench::{now_iso8601, peak_rss_mb, save_raw_samples, Harness, RunReport};
use hertz_bench::config::{BenchConfig, Cli};
use hertz_bench::snapshot::SimulationState;
use hertz_bench::validation::{ReportSink, ValidationReport, Validator};
use hertz_bench::HertzError;

fn init_logging(debug: bool) {
    let level = if debug { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

fn validate(harness: &Harness, config: &BenchConfig) -> hertz_bench::Result<ValidationReport> {
    let mut validator = Validator::new(config.threshold, config.verbose, config.die_on_flag);
    match &config.errfile {
        Some(path) => {
            let mut sink = ReportSink::error_file(path)?;
            harness.validate(&mut validator, &mut sink)
        }
        None => harness.validate(&mut validator, &mut ReportSink::stdout()),
    }
}

fn run(config: &BenchConfig) -> anyhow::Result<()> {
    let program = std::env::args().next().unwrap_or_else(|| "hertz_bench".to_string());
    let state = SimulationState::load(&config.step_file)
        .with_context(|| format!("loading step file {}", config.step_file.display()))?;
    let (nnode, nedge) = (state.nnode, state.nedge);

    let mut harness = Harness::new(state, config.pages, config.num_iter)?;
    if config.debug {
        harness.list().verify_against(harness.state())?;
        debug!("neighbor list holds every edge of the step file");
    }
    let mut kernel = config.kernel.build();
    harness
        .run(kernel.as_mut())
        .with_context(|| format!("running kernel `{}`", kernel.name()))?;

    let validation = if config.check {
        let report = validate(&harness, config)?;
        if report.passed() {
            info!("validation passed: {} values within {}%", report.compared, config.threshold);
        } else {
            warn!("validation: {} of {} values flagged", report.flagged, report.compared);
        }
        Some(report)
    } else {
        None
    };

    let summary = harness.summary()?;
    if config.verbose {
        println!("{}", summary.header(&program));
    }
    println!("{}", summary.line());

    if let Some(path) = &config.rawfile {
        save_raw_samples(harness.timing(), config.num_iter, path)?;
        info!("raw samples written to {}", path.display());
    }
    if let Some(path) = &config.json {
        let report = RunReport {
            timestamp: now_iso8601(),
            program,
            kernel: kernel.name().to_string(),
            config: config.clone(),
            nnode,
            nedge,
            peak_rss_mb: peak_rss_mb(),
            summary,
            validation,
        };
        report.save_json(path)?;
        info!("run report written to {}", path.display());
    }
    Ok(())
}

fn main() -> ExitCode {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = u8::from(e.use_stderr());
            let _ = e.print();
            return ExitCode::from(code);
        }
    };
    init_logging(cli.debug);

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(e) => {
            error!("{e}");
            return ExitCode::from(1);
        }
    };

    match run(&config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e:#}");
            let code = e.downcast_ref::<HertzError>().map_or(2, HertzError::exit_code);
            ExitCode::from(u8::try_from(code).unwrap_or(2))
        }
    }
}
