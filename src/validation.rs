// SPDX-License-Identifier: AGPL-3.0-only

//! Comparison of kernel output against the expected arrays of a step file.
//!
//! Every compared scalar yields a percentage error. Values above the
//! threshold are flagged and counted on the [`Validator`]; a flagged value
//! is written to the report sink, and with `die_on_flag` the first one ends
//! the check with [`HertzError::ValidationMismatch`]. Exiting the process
//! is left to the caller.

use std::fs::File;
use std::io::{BufWriter, Stdout, Write};
use std::path::Path;

use log::{debug, warn};
use serde::Serialize;

use crate::bench::format_general;
use crate::error::HertzError;
use crate::neighbor::NeighborList;
use crate::snapshot::SimulationState;
use crate::tolerances::{DEFAULT_THRESHOLD_PERCENT, REPORT_DIGITS, ZERO_EXPECTED_SENTINEL};
use crate::Result;

/// Relative error of `computed` against `expected`, in percent.
///
/// Exactly equal values give 0. A zero `expected` with a different
/// `computed` gives [`ZERO_EXPECTED_SENTINEL`].
#[must_use]
pub fn percentage_error(expected: f64, computed: f64) -> f64 {
    if expected == computed {
        return 0.0;
    }
    if expected == 0.0 {
        return ZERO_EXPECTED_SENTINEL;
    }
    100.0 * ((computed - expected) / expected).abs()
}

/// Destination of validation lines.
///
/// Stdout lines are commented (`# ` before the tag); error-file lines are
/// bare and every comparison is written, flagged or not.
#[derive(Debug)]
pub struct ReportSink<W: Write> {
    out: W,
    prefix: &'static str,
    force_verbose: bool,
}

impl ReportSink<Stdout> {
    #[must_use]
    pub fn stdout() -> Self {
        Self::commented(std::io::stdout())
    }
}

impl ReportSink<BufWriter<File>> {
    /// Create (truncate) an error file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be created.
    pub fn error_file(path: &Path) -> Result<Self> {
        let file = File::create(path).map_err(|e| HertzError::io(path, e))?;
        Ok(Self::uncommented(BufWriter::new(file)))
    }
}

impl<W: Write> ReportSink<W> {
    /// Stdout-style sink: `# ` tag prefix, lines only for flagged values
    /// unless the validator is verbose.
    pub const fn commented(out: W) -> Self {
        Self {
            out,
            prefix: "# ",
            force_verbose: false,
        }
    }

    /// Error-file-style sink: bare tags, every comparison written.
    pub const fn uncommented(out: W) -> Self {
        Self {
            out,
            prefix: "",
            force_verbose: true,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, tag: &str, expected: f64, computed: f64, error: f64) -> std::io::Result<()> {
        writeln!(
            self.out,
            "{}{tag}, {}, {}, {}",
            self.prefix,
            format_general(expected, REPORT_DIGITS),
            format_general(computed, REPORT_DIGITS),
            format_general(error, REPORT_DIGITS),
        )
    }
}

/// Outcome of a full [`check_result`] pass.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ValidationReport {
    pub compared: usize,
    pub flagged: usize,
    pub max_error: f64,
}

impl ValidationReport {
    #[must_use]
    pub const fn passed(&self) -> bool {
        self.flagged == 0
    }
}

/// Threshold policy plus the run's mismatch count.
#[derive(Debug, Clone)]
pub struct Validator {
    pub threshold: f64,
    pub verbose: bool,
    pub die_on_flag: bool,
    num_bad: usize,
    compared: usize,
    max_error: f64,
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD_PERCENT, false, false)
    }
}

impl Validator {
    #[must_use]
    pub const fn new(threshold: f64, verbose: bool, die_on_flag: bool) -> Self {
        Self {
            threshold,
            verbose,
            die_on_flag,
            num_bad: 0,
            compared: 0,
            max_error: 0.0,
        }
    }

    /// Flagged comparisons so far in this run.
    #[must_use]
    pub const fn num_bad(&self) -> usize {
        self.num_bad
    }

    #[must_use]
    pub const fn compared(&self) -> usize {
        self.compared
    }

    #[must_use]
    pub const fn max_error(&self) -> f64 {
        self.max_error
    }

    /// Compare one scalar and return its percentage error.
    ///
    /// A NaN error counts as flagged.
    ///
    /// # Errors
    ///
    /// `Io` if the line cannot be written, `ValidationMismatch` if the value
    /// is flagged and `die_on_flag` is set.
    pub fn compare<W: Write>(
        &mut self,
        tag: &str,
        expected: f64,
        computed: f64,
        sink: &mut ReportSink<W>,
    ) -> Result<f64> {
        let error = percentage_error(expected, computed);
        let flag = error > self.threshold || error.is_nan();
        self.compared += 1;
        if error > self.max_error || error.is_nan() {
            self.max_error = error;
        }
        if flag {
            self.num_bad += 1;
        }
        if flag || self.verbose || sink.force_verbose {
            sink.line(tag, expected, computed, error)
                .map_err(|e| HertzError::io("<validation output>", e))?;
        }
        if flag && self.die_on_flag {
            return Err(HertzError::ValidationMismatch {
                tag: tag.to_string(),
                expected,
                computed,
                error,
                threshold: self.threshold,
            });
        }
        Ok(error)
    }
}

/// Compare every force, torque, and shear component of a run.
///
/// Shear is read from `list` in `ilist`/`numneigh` order, the order in which
/// kernels write it, and compared against `state.expected_shear`.
///
/// # Errors
///
/// `Format` if the output buffers or the list do not match the state's
/// sizes, otherwise any error of [`Validator::compare`].
pub fn check_result<W: Write>(
    state: &SimulationState,
    list: &NeighborList,
    force: &[f64],
    torque: &[f64],
    validator: &mut Validator,
    sink: &mut ReportSink<W>,
) -> Result<ValidationReport> {
    let n3 = state.nnode * 3;
    if force.len() != n3 || torque.len() != n3 {
        return Err(HertzError::Format(format!(
            "output buffers hold {}/{} values for nnode*3={n3}",
            force.len(),
            torque.len()
        )));
    }
    let shear = list.gather_shear();
    if shear.len() != state.expected_shear.len() {
        return Err(HertzError::Format(format!(
            "neighbor list holds {} shear values, step file expects {}",
            shear.len(),
            state.expected_shear.len()
        )));
    }

    let bad_before = validator.num_bad();
    let mut compared = 0;
    let mut max_error = 0.0f64;
    let sections: [(&str, &[f64], &[f64]); 3] = [
        ("force", &state.expected_force, force),
        ("torque", &state.expected_torque, torque),
        ("shear", &state.expected_shear, &shear),
    ];
    for (name, expected, computed) in sections {
        for (k, (&e, &c)) in expected.iter().zip(computed).enumerate() {
            let error = validator.compare(&format!("{name}[{k}]"), e, c, sink)?;
            if error > max_error || error.is_nan() {
                max_error = error;
            }
            compared += 1;
        }
    }
    sink.out
        .flush()
        .map_err(|e| HertzError::io("<validation output>", e))?;

    let report = ValidationReport {
        compared,
        flagged: validator.num_bad() - bad_before,
        max_error,
    };
    if report.passed() {
        debug!("validation: {} values within {}%", report.compared, validator.threshold);
    } else {
        warn!(
            "validation: {} of {} values exceed {}% (max error {})",
            report.flagged,
            report.compared,
            validator.threshold,
            format_general(report.max_error, REPORT_DIGITS)
        );
    }
    Ok(report)
}
