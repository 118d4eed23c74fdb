// SPDX-License-Identifier: AGPL-3.0-only

//! Benchmark harness for contact-force kernels.
//!
//! Costs are split into three buckets: one-time setup, neighbor-list
//! refresh, and per-iteration work. Per-iteration phases also keep one
//! sample per iteration so min/max and the raw sample file can be produced.
//! Produces the summary line printed by `hertz_bench`, an optional raw
//! sample file, and a JSON run report.

mod harness;
mod report;
mod timer;

pub use harness::{Harness, OutputBuffers};
pub use report::{
    format_duration_ms, format_general, now_iso8601, peak_rss_mb, save_raw_samples,
    write_raw_samples, PerIterPhase, PhaseTotal, RunReport, RunSummary,
};
pub use timer::{Bucket, PhaseScope, Timer, TimingContext};
