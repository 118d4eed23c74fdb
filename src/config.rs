// SPDX-License-Identifier: AGPL-3.0-only

//! Run configuration and its command-line front end.

use std::path::PathBuf;

use clap::Parser;
use serde::Serialize;

use crate::error::HertzError;
use crate::kernel::KernelSelector;
use crate::neighbor::{PageConfig, DEFAULT_MAX_PAGES, DEFAULT_ONEATOM, DEFAULT_PGSIZE, PGDELTA};
use crate::tolerances::DEFAULT_THRESHOLD_PERCENT;
use crate::Result;

/// Default number of timed iterations.
pub const DEFAULT_NUM_ITER: usize = 100;

/// Everything that parameterizes one `hertz_bench` run.
#[derive(Clone, Debug, Serialize)]
#[must_use]
pub struct BenchConfig {
    pub step_file: PathBuf,
    pub num_iter: usize,
    /// Validate the last iteration against the expected arrays.
    pub check: bool,
    pub debug: bool,
    pub verbose: bool,
    /// Write every comparison here instead of flagged ones to stdout.
    pub errfile: Option<PathBuf>,
    /// Per-iteration samples, one row per iteration.
    pub rawfile: Option<PathBuf>,
    pub json: Option<PathBuf>,
    pub kernel: KernelSelector,
    /// Flagging threshold in percent.
    pub threshold: f64,
    /// Stop at the first flagged comparison.
    pub die_on_flag: bool,
    pub pages: PageConfig,
}

impl BenchConfig {
    /// Reject values no run can use.
    ///
    /// # Errors
    ///
    /// `Config` naming the offending value.
    pub fn validate(&self) -> Result<()> {
        if self.num_iter == 0 {
            return Err(HertzError::Config("number of runs must be at least 1".into()));
        }
        if self.threshold.is_nan() || self.threshold < 0.0 {
            return Err(HertzError::Config(format!(
                "threshold must be a non-negative percentage, got {}",
                self.threshold
            )));
        }
        self.pages.validate()
    }
}

/// Command line of `hertz_bench`.
#[derive(Parser, Debug)]
#[command(name = "hertz_bench", version)]
#[command(about = "Time a Hertz/history contact kernel on a step file and check its output")]
pub struct Cli {
    /// Binary step file
    pub stepfile: PathBuf,

    /// Number of runs
    #[arg(short = 'n', value_name = "N", default_value_t = DEFAULT_NUM_ITER)]
    pub num_iter: usize,

    /// Checks off
    #[arg(short = 'c')]
    pub no_check: bool,

    /// Debug logging
    #[arg(short = 'd')]
    pub debug: bool,

    /// Be verbose
    #[arg(short = 'v')]
    pub verbose: bool,

    /// Error output (every comparison, uncommented)
    #[arg(short = 'a', value_name = "ERRFILE")]
    pub errfile: Option<PathBuf>,

    /// Raw sample output
    #[arg(short = 'b', value_name = "RAWFILE")]
    pub rawfile: Option<PathBuf>,

    /// Kernel to run
    #[arg(short = 'k', value_enum, default_value_t = KernelSelector::Serial)]
    pub kernel: KernelSelector,

    /// Flagging threshold (percent)
    #[arg(short = 't', value_name = "PERCENT", default_value_t = DEFAULT_THRESHOLD_PERCENT)]
    pub threshold: f64,

    /// Exit at the first flagged value
    #[arg(short = 'x')]
    pub die_on_flag: bool,

    /// JSON run report
    #[arg(long, value_name = "PATH")]
    pub json: Option<PathBuf>,

    /// Neighbor pairs per page
    #[arg(long, default_value_t = DEFAULT_PGSIZE)]
    pub pgsize: usize,

    /// Free slots required before placing a particle
    #[arg(long, default_value_t = DEFAULT_ONEATOM)]
    pub oneatom: usize,

    /// Page budget
    #[arg(long, default_value_t = DEFAULT_MAX_PAGES)]
    pub max_pages: usize,
}

impl Cli {
    /// Convert to a validated [`BenchConfig`].
    ///
    /// # Errors
    ///
    /// See [`BenchConfig::validate`].
    pub fn into_config(self) -> Result<BenchConfig> {
        let config = BenchConfig {
            step_file: self.stepfile,
            num_iter: self.num_iter,
            check: !self.no_check,
            debug: self.debug,
            verbose: self.verbose,
            errfile: self.errfile,
            rawfile: self.rawfile,
            json: self.json,
            kernel: self.kernel,
            threshold: self.threshold,
            die_on_flag: self.die_on_flag,
            pages: PageConfig {
                pgsize: self.pgsize,
                oneatom: self.oneatom,
                max_pages: self.max_pages,
                pgdelta: PGDELTA,
            },
        };
        config.validate()?;
        Ok(config)
    }
}
