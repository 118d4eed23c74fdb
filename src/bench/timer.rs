// SPDX-License-Identifier: AGPL-3.0-only

//! Millisecond stopwatches and the three cost buckets of a run.

use std::time::Instant;

use serde::Serialize;

use crate::error::HertzError;
use crate::Result;

/// A stopwatch that accumulates milliseconds over start/stop spans.
///
/// ```
/// use hertz_bench::bench::Timer;
/// let mut t = Timer::new("kernel");
/// for _ in 0..3 {
///     t.start();
///     std::hint::black_box((0..100).sum::<u64>());
///     t.stop_and_add_to_total();
/// }
/// assert!(t.total_time() >= 0.0);
/// ```
#[derive(Debug, Clone)]
pub struct Timer {
    name: String,
    total_ms: f64,
    started: Option<Instant>,
    stopped: Option<Instant>,
}

impl Timer {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            total_ms: 0.0,
            started: None,
            stopped: None,
        }
    }

    pub fn start(&mut self) {
        self.started = Some(Instant::now());
        self.stopped = None;
    }

    pub fn stop(&mut self) {
        self.stopped = Some(Instant::now());
    }

    /// Add the last start→stop span to the total and return it (ms).
    ///
    /// Returns 0 if no complete span was recorded.
    pub fn add_to_total(&mut self) -> f64 {
        let delta = match (self.started, self.stopped) {
            (Some(s), Some(e)) => e.duration_since(s).as_secs_f64() * 1.0e3,
            _ => 0.0,
        };
        self.total_ms += delta;
        delta
    }

    pub fn stop_and_add_to_total(&mut self) -> f64 {
        self.stop();
        self.add_to_total()
    }

    #[must_use]
    pub const fn total_time(&self) -> f64 {
        self.total_ms
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn reset(&mut self) {
        self.total_ms = 0.0;
    }

    pub fn set_total_time(&mut self, ms: f64) {
        self.total_ms = ms;
    }
}

/// Cost category of a timed phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Bucket {
    /// Setup paid once per run.
    OneTime,
    /// Neighbor-list rebuild or upload.
    NlRefresh,
    /// Paid on every iteration; also sampled per iteration.
    PerIter,
}

/// Timers for one run, grouped by bucket in first-use order.
#[derive(Debug, Default)]
pub struct TimingContext {
    one_time: Vec<Timer>,
    nl_refresh: Vec<Timer>,
    per_iter: Vec<Timer>,
    per_iter_timings: Vec<Vec<f64>>,
}

impl TimingContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Scope for recording one-time or refresh phases.
    pub fn scope(&mut self, bucket: Bucket) -> PhaseScope<'_> {
        PhaseScope {
            ctx: self,
            bucket,
            iteration: 0,
        }
    }

    /// Scope for recording per-iteration phases of iteration `it`.
    pub fn iteration(&mut self, it: usize) -> PhaseScope<'_> {
        PhaseScope {
            ctx: self,
            bucket: Bucket::PerIter,
            iteration: it,
        }
    }

    #[must_use]
    pub fn timers(&self, bucket: Bucket) -> &[Timer] {
        match bucket {
            Bucket::OneTime => &self.one_time,
            Bucket::NlRefresh => &self.nl_refresh,
            Bucket::PerIter => &self.per_iter,
        }
    }

    /// Per-iteration samples (ms) of each per-iteration phase, in the order
    /// of [`TimingContext::timers`] for [`Bucket::PerIter`].
    #[must_use]
    pub fn samples(&self) -> &[Vec<f64>] {
        &self.per_iter_timings
    }

    #[cfg(test)]
    pub(crate) fn samples_mut(&mut self) -> &mut [Vec<f64>] {
        &mut self.per_iter_timings
    }

    /// Sum of the totals of every timer in `bucket`.
    #[must_use]
    pub fn bucket_total(&self, bucket: Bucket) -> f64 {
        self.timers(bucket).iter().map(Timer::total_time).sum()
    }

    fn timer_index(&mut self, bucket: Bucket, name: &str) -> usize {
        let timers = match bucket {
            Bucket::OneTime => &mut self.one_time,
            Bucket::NlRefresh => &mut self.nl_refresh,
            Bucket::PerIter => &mut self.per_iter,
        };
        if let Some(k) = timers.iter().position(|t| t.name() == name) {
            return k;
        }
        timers.push(Timer::new(name));
        if bucket == Bucket::PerIter {
            self.per_iter_timings.push(Vec::new());
        }
        timers.len() - 1
    }

    fn record_sample(&mut self, k: usize, it: usize, delta: f64) -> Result<()> {
        let series = &mut self.per_iter_timings[k];
        if series.len() == it + 1 {
            series[it] += delta;
        } else if series.len() == it {
            series.push(delta);
        } else {
            return Err(HertzError::Timing(format!(
                "phase `{}` recorded at iteration {it} but has {} samples",
                self.per_iter[k].name(),
                series.len()
            )));
        }
        Ok(())
    }

    /// Check every per-iteration phase has exactly `num_iter` samples.
    ///
    /// # Errors
    ///
    /// `Timing` naming the first phase with a different sample count.
    pub fn check_samples(&self, num_iter: usize) -> Result<()> {
        for (timer, series) in self.per_iter.iter().zip(&self.per_iter_timings) {
            if series.len() != num_iter {
                return Err(HertzError::Timing(format!(
                    "phase `{}` has {} samples for {num_iter} iterations",
                    timer.name(),
                    series.len()
                )));
            }
        }
        Ok(())
    }
}

/// Handle given to kernels to time their phases into one bucket.
#[derive(Debug)]
pub struct PhaseScope<'a> {
    ctx: &'a mut TimingContext,
    bucket: Bucket,
    iteration: usize,
}

impl PhaseScope<'_> {
    /// Run `f` inside a start/stop span added to phase `name`.
    ///
    /// Timing the same phase twice in one iteration adds both spans to the
    /// same sample.
    ///
    /// # Errors
    ///
    /// `Timing` if a per-iteration phase skipped an earlier iteration.
    pub fn time<R>(&mut self, name: &str, f: impl FnOnce() -> R) -> Result<R> {
        let k = self.ctx.timer_index(self.bucket, name);
        let timers = match self.bucket {
            Bucket::OneTime => &mut self.ctx.one_time,
            Bucket::NlRefresh => &mut self.ctx.nl_refresh,
            Bucket::PerIter => &mut self.ctx.per_iter,
        };
        timers[k].start();
        let out = f();
        let delta = timers[k].stop_and_add_to_total();
        if self.bucket == Bucket::PerIter {
            self.ctx.record_sample(k, self.iteration, delta)?;
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timer_accumulates_spans() {
        let mut t = Timer::new("x");
        t.start();
        let first = t.stop_and_add_to_total();
        t.start();
        let second = t.stop_and_add_to_total();
        assert!(first >= 0.0 && second >= 0.0);
        assert!((t.total_time() - (first + second)).abs() < 1e-12);
        t.reset();
        assert_eq!(t.total_time(), 0.0);
        t.set_total_time(4.5);
        assert_eq!(t.total_time(), 4.5);
    }

    #[test]
    fn add_without_span_adds_nothing() {
        let mut t = Timer::new("idle");
        assert_eq!(t.add_to_total(), 0.0);
        t.start();
        assert_eq!(t.add_to_total(), 0.0);
    }

    #[test]
    fn phases_are_kept_in_first_use_order() {
        let mut ctx = TimingContext::new();
        let mut s = ctx.scope(Bucket::OneTime);
        s.time("b", || ()).unwrap();
        s.time("a", || ()).unwrap();
        s.time("b", || ()).unwrap();
        let names: Vec<&str> = ctx.timers(Bucket::OneTime).iter().map(Timer::name).collect();
        assert_eq!(names, vec!["b", "a"]);
        assert!(ctx.timers(Bucket::PerIter).is_empty());
        assert!(ctx.samples().is_empty());
    }

    #[test]
    fn per_iter_phase_records_one_sample_per_iteration() {
        let mut ctx = TimingContext::new();
        for it in 0..5 {
            let mut s = ctx.iteration(it);
            s.time("compute", || std::hint::black_box(it * 2)).unwrap();
        }
        assert_eq!(ctx.samples().len(), 1);
        assert_eq!(ctx.samples()[0].len(), 5);
        let sum: f64 = ctx.samples()[0].iter().sum();
        assert!((sum - ctx.bucket_total(Bucket::PerIter)).abs() < 1e-9);
        ctx.check_samples(5).unwrap();
        assert!(ctx.check_samples(4).is_err());
    }

    #[test]
    fn repeated_phase_in_iteration_shares_sample() {
        let mut ctx = TimingContext::new();
        let mut s = ctx.iteration(0);
        s.time("copy", || ()).unwrap();
        s.time("copy", || ()).unwrap();
        assert_eq!(ctx.samples()[0].len(), 1);
    }

    #[test]
    fn skipped_iteration_is_timing_error() {
        let mut ctx = TimingContext::new();
        ctx.iteration(0).time("compute", || ()).unwrap();
        let err = ctx.iteration(2).time("compute", || ()).unwrap_err();
        assert!(matches!(err, HertzError::Timing(_)));
    }

    #[test]
    fn time_returns_closure_value() {
        let mut ctx = TimingContext::new();
        let v = ctx.scope(Bucket::NlRefresh).time("upload", || 41 + 1).unwrap();
        assert_eq!(v, 42);
        assert_eq!(ctx.timers(Bucket::NlRefresh).len(), 1);
    }
}
