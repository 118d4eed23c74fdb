// SPDX-License-Identifier: AGPL-3.0-only

//! Run summary line, raw sample dump, and JSON run report.

use std::fmt::Write as _;
use std::io::Write;
use std::path::Path;

use serde::Serialize;

use super::timer::{Bucket, TimingContext};
use crate::config::BenchConfig;
use crate::error::HertzError;
use crate::tolerances::RAW_SAMPLE_DIGITS;
use crate::validation::ValidationReport;
use crate::Result;

/// Total of a one-time or refresh phase.
#[derive(Debug, Clone, Serialize)]
pub struct PhaseTotal {
    pub name: String,
    pub total_ms: f64,
}

/// Statistics of a per-iteration phase.
#[derive(Debug, Clone, Serialize)]
pub struct PerIterPhase {
    pub name: String,
    pub total_ms: f64,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
}

/// Aggregated timings of a finished run.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub nedge: usize,
    pub num_iter: usize,
    pub one_time_total_ms: f64,
    pub per_iter_total_ms: f64,
    pub time_per_iteration_ms: f64,
    pub one_time: Vec<PhaseTotal>,
    pub nl_refresh: Vec<PhaseTotal>,
    pub per_iter: Vec<PerIterPhase>,
}

impl RunSummary {
    /// Aggregate `timing` for a run of `num_iter` iterations.
    ///
    /// # Errors
    ///
    /// `Timing` if `num_iter` is zero or a per-iteration phase does not
    /// have exactly `num_iter` samples.
    pub fn from_timing(timing: &TimingContext, nedge: usize, num_iter: usize) -> Result<Self> {
        if num_iter == 0 {
            return Err(HertzError::Timing("summary of a run with zero iterations".into()));
        }
        timing.check_samples(num_iter)?;
        let totals = |bucket| {
            timing
                .timers(bucket)
                .iter()
                .map(|t| PhaseTotal {
                    name: t.name().to_string(),
                    total_ms: t.total_time(),
                })
                .collect::<Vec<_>>()
        };
        let per_iter: Vec<PerIterPhase> = timing
            .timers(Bucket::PerIter)
            .iter()
            .zip(timing.samples())
            .map(|(t, series)| {
                let total_ms: f64 = series.iter().sum();
                PerIterPhase {
                    name: t.name().to_string(),
                    total_ms,
                    avg_ms: total_ms / num_iter as f64,
                    min_ms: series.iter().copied().fold(f64::INFINITY, f64::min),
                    max_ms: series.iter().copied().fold(f64::NEG_INFINITY, f64::max),
                }
            })
            .collect();
        let per_iter_total_ms: f64 = per_iter.iter().map(|p| p.total_ms).sum();
        Ok(Self {
            nedge,
            num_iter,
            one_time_total_ms: timing.bucket_total(Bucket::OneTime),
            per_iter_total_ms,
            time_per_iteration_ms: per_iter_total_ms / num_iter as f64,
            one_time: totals(Bucket::OneTime),
            nl_refresh: totals(Bucket::NlRefresh),
            per_iter,
        })
    }

    /// Commented header printed before the summary line in verbose mode.
    #[must_use]
    pub fn header(&self, program: &str) -> String {
        let mut s = String::new();
        let _ = writeln!(s, "# Program: {program}");
        let _ = writeln!(s, "# Num Iterations: {}", self.num_iter);
        s.push_str("# nedge, total_one_time_cost (milliseconds), time_per_iteration");
        for p in &self.one_time {
            let _ = write!(s, ", [{}]", p.name);
        }
        for p in &self.nl_refresh {
            let _ = write!(s, ", ({})", p.name);
        }
        for p in &self.per_iter {
            let _ = write!(s, ", {}, min, max", p.name);
        }
        s
    }

    /// The single machine-readable summary line (no trailing newline).
    #[must_use]
    pub fn line(&self) -> String {
        let mut s = format!(
            "{}, {:.6}, {:.6}",
            self.nedge, self.one_time_total_ms, self.time_per_iteration_ms
        );
        for p in self.one_time.iter().chain(&self.nl_refresh) {
            let _ = write!(s, ", {:.6}", p.total_ms);
        }
        for p in &self.per_iter {
            let _ = write!(s, ", {:.6}, {:.6}, {:.6}", p.avg_ms, p.min_ms, p.max_ms);
        }
        s
    }
}

impl TimingContext {
    /// Shorthand for [`RunSummary::from_timing`].
    ///
    /// # Errors
    ///
    /// See [`RunSummary::from_timing`].
    pub fn summary(&self, nedge: usize, num_iter: usize) -> Result<RunSummary> {
        RunSummary::from_timing(self, nedge, num_iter)
    }
}

/// Write one row per iteration with one column per per-iteration phase.
///
/// # Errors
///
/// Propagates write failures.
pub fn write_raw_samples(timing: &TimingContext, num_iter: usize, out: &mut impl Write) -> std::io::Result<()> {
    write!(out, "# run")?;
    for t in timing.timers(Bucket::PerIter) {
        write!(out, ", {}", t.name())?;
    }
    writeln!(out)?;
    for run in 0..num_iter {
        write!(out, "{run}")?;
        for series in timing.samples() {
            let v = series.get(run).copied().unwrap_or(f64::NAN);
            write!(out, ", {}", format_general(v, RAW_SAMPLE_DIGITS))?;
        }
        writeln!(out)?;
    }
    Ok(())
}

/// [`write_raw_samples`] into a file.
///
/// # Errors
///
/// `Io` if the file cannot be created or written.
pub fn save_raw_samples(timing: &TimingContext, num_iter: usize, path: &Path) -> Result<()> {
    let file = std::fs::File::create(path).map_err(|e| HertzError::io(path, e))?;
    let mut out = std::io::BufWriter::new(file);
    write_raw_samples(timing, num_iter, &mut out)
        .and_then(|()| out.flush())
        .map_err(|e| HertzError::io(path, e))
}

/// Everything known about a finished run, for JSON export.
#[derive(Debug, Clone, Serialize)]
pub struct RunReport {
    pub timestamp: String,
    pub program: String,
    pub kernel: String,
    pub config: BenchConfig,
    pub nnode: usize,
    pub nedge: usize,
    pub peak_rss_mb: f64,
    pub summary: RunSummary,
    pub validation: Option<ValidationReport>,
}

impl RunReport {
    /// Save as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// `Io` if serialization or the write fails.
    pub fn save_json(&self, path: &Path) -> Result<()> {
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| HertzError::io(path, std::io::Error::other(e)))?;
        std::fs::write(path, json).map_err(|e| HertzError::io(path, e))
    }
}

/// Format like C's `%.<digits>g`: shortest of fixed or scientific notation
/// with `digits` significant digits and trailing zeros removed.
#[must_use]
pub fn format_general(value: f64, digits: usize) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    if value == 0.0 {
        return if value.is_sign_negative() { "-0" } else { "0" }.to_string();
    }
    let p = digits.max(1);
    let sci = format!("{:.*e}", p - 1, value);
    let (mantissa, exp) = sci.split_once('e').unwrap_or((&sci, "0"));
    let exp: i32 = exp.parse().unwrap_or(0);
    if exp < -4 || exp >= p as i32 {
        let sign = if exp < 0 { '-' } else { '+' };
        format!("{}e{sign}{:02}", trim_fraction(mantissa), exp.abs())
    } else {
        let decimals = (p as i32 - 1 - exp).max(0) as usize;
        trim_fraction(&format!("{value:.decimals$}")).to_string()
    }
}

fn trim_fraction(s: &str) -> &str {
    if s.contains('.') {
        s.trim_end_matches('0').trim_end_matches('.')
    } else {
        s
    }
}

/// Read peak resident set size (`VmHWM`) in MB; 0 where unavailable.
#[must_use]
pub fn peak_rss_mb() -> f64 {
    let status = std::fs::read_to_string("/proc/self/status").unwrap_or_default();
    status
        .lines()
        .find(|l| l.starts_with("VmHWM:"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<f64>().ok())
        .map_or(0.0, |kb| kb / 1024.0)
}

/// Format a duration in milliseconds for log output.
#[must_use]
pub fn format_duration_ms(ms: f64) -> String {
    if ms < 1.0 {
        format!("{:.1} us", ms * 1e3)
    } else if ms < 1000.0 {
        format!("{ms:.2} ms")
    } else {
        format!("{:.2} s", ms / 1e3)
    }
}

/// Current UTC time as `YYYY-MM-DDTHH:MM:SSZ`.
#[must_use]
pub fn now_iso8601() -> String {
    use std::time::{SystemTime, UNIX_EPOCH};
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_secs());
    let (days, rem) = (secs / 86_400, secs % 86_400);
    let (year, month, day) = civil_date(days);
    format!(
        "{year:04}-{month:02}-{day:02}T{:02}:{:02}:{:02}Z",
        rem / 3600,
        rem % 3600 / 60,
        rem % 60
    )
}

/// Gregorian `(year, month, day)` of a day count since 1970-01-01.
///
/// Works in 400-year eras counted from 0000-03-01 so the leap day falls
/// at the end of each shifted year.
fn civil_date(days_since_epoch: u64) -> (u64, u64, u64) {
    const DAYS_PER_ERA: u64 = 146_097;
    const EPOCH_SHIFT: u64 = 719_468;
    let shifted = days_since_epoch + EPOCH_SHIFT;
    let era = shifted / DAYS_PER_ERA;
    let day_of_era = shifted % DAYS_PER_ERA;
    let year_of_era =
        (day_of_era - day_of_era / 1460 + day_of_era / 36_524 - day_of_era / 146_096) / 365;
    let day_of_year = day_of_era - (365 * year_of_era + year_of_era / 4 - year_of_era / 100);
    // months counted from March
    let shifted_month = (5 * day_of_year + 2) / 153;
    let day = day_of_year - (153 * shifted_month + 2) / 5 + 1;
    let month = if shifted_month < 10 {
        shifted_month + 3
    } else {
        shifted_month - 9
    };
    let year = era * 400 + year_of_era + u64::from(month <= 2);
    (year, month, day)
}
