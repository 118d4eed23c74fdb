// SPDX-License-Identifier: AGPL-3.0-only

//! Iteration driver: owns the state, the neighbor list and the timers.

use std::io::Write;
use std::time::Instant;

use log::{debug, info};

use super::report::{format_duration_ms, RunSummary};
use super::timer::{Bucket, TimingContext};
use crate::error::HertzError;
use crate::kernel::{ContactKernel, KernelArgs};
use crate::neighbor::{NeighborList, PageConfig};
use crate::snapshot::SimulationState;
use crate::validation::{check_result, ReportSink, ValidationReport, Validator};
use crate::Result;

/// Force and torque buffers written by the kernel.
#[derive(Debug, Clone, Default)]
pub struct OutputBuffers {
    pub force: Vec<f64>,
    pub torque: Vec<f64>,
}

impl OutputBuffers {
    /// Overwrite with the pre-kernel force and torque of `state`.
    pub fn reset_from(&mut self, state: &SimulationState) {
        self.force.clone_from(&state.force);
        self.torque.clone_from(&state.torque);
    }
}

/// One benchmark run over a decoded step file.
#[derive(Debug)]
pub struct Harness {
    state: SimulationState,
    list: NeighborList,
    timing: TimingContext,
    outputs: OutputBuffers,
    num_iter: usize,
    completed: usize,
}

impl Harness {
    /// Build the neighbor list for `state`.
    ///
    /// # Errors
    ///
    /// `Config` if `num_iter` is zero, otherwise any error of
    /// [`NeighborList::build`].
    pub fn new(state: SimulationState, pages: PageConfig, num_iter: usize) -> Result<Self> {
        if num_iter == 0 {
            return Err(HertzError::Config("number of runs must be at least 1".into()));
        }
        state.check_lengths()?;
        let t0 = Instant::now();
        let list = NeighborList::build(&state, pages)?;
        info!(
            "neighbor list: {} particles with contacts, {} pairs on {} page(s) in {}",
            list.inum(),
            list.pair_count(),
            list.page_count(),
            format_duration_ms(t0.elapsed().as_secs_f64() * 1e3)
        );
        let mut outputs = OutputBuffers::default();
        outputs.reset_from(&state);
        Ok(Self {
            state,
            list,
            timing: TimingContext::new(),
            outputs,
            num_iter,
            completed: 0,
        })
    }

    /// Drive `kernel` through setup, refresh and `num_iter` force passes.
    ///
    /// Every pass starts from the step file's force, torque and shear
    /// history. The kernel's first error ends the run. Calling `run` again
    /// starts a fresh run: timers and the completed count are cleared.
    ///
    /// # Errors
    ///
    /// Whatever the kernel returns, or `Timing` for inconsistent samples.
    pub fn run(&mut self, kernel: &mut dyn ContactKernel) -> Result<()> {
        info!("running kernel `{}` for {} iteration(s)", kernel.name(), self.num_iter);
        self.timing = TimingContext::new();
        self.completed = 0;
        kernel.setup(&self.state, &mut self.timing.scope(Bucket::OneTime))?;
        kernel.refresh(&self.list, &mut self.timing.scope(Bucket::NlRefresh))?;
        self.list.backup();

        for it in 0..self.num_iter {
            self.list.restore();
            self.outputs.reset_from(&self.state);
            let args = KernelArgs {
                state: &self.state,
                force: &mut self.outputs.force,
                torque: &mut self.outputs.torque,
                rows: self.list.copy_into(),
            };
            kernel.compute(args, &mut self.timing.iteration(it))?;
            self.completed = it + 1;
        }
        self.timing.check_samples(self.num_iter)?;
        debug!(
            "kernel `{}` done: one-time {:.3} ms, per-iteration total {:.3} ms",
            kernel.name(),
            self.timing.bucket_total(Bucket::OneTime),
            self.timing.bucket_total(Bucket::PerIter)
        );
        Ok(())
    }

    /// Compare the last iteration's output with the expected arrays.
    ///
    /// # Errors
    ///
    /// See [`check_result`].
    pub fn validate<W: Write>(
        &self,
        validator: &mut Validator,
        sink: &mut ReportSink<W>,
    ) -> Result<ValidationReport> {
        check_result(
            &self.state,
            &self.list,
            &self.outputs.force,
            &self.outputs.torque,
            validator,
            sink,
        )
    }

    /// Timing summary of a finished run.
    ///
    /// # Errors
    ///
    /// `Timing` if [`Harness::run`] did not complete.
    pub fn summary(&self) -> Result<RunSummary> {
        if self.completed != self.num_iter {
            return Err(HertzError::Timing(format!(
                "run completed {} of {} iterations",
                self.completed, self.num_iter
            )));
        }
        self.timing.summary(self.state.nedge, self.num_iter)
    }

    #[must_use]
    pub const fn state(&self) -> &SimulationState {
        &self.state
    }

    #[must_use]
    pub const fn list(&self) -> &NeighborList {
        &self.list
    }

    #[must_use]
    pub const fn timing(&self) -> &TimingContext {
        &self.timing
    }

    #[must_use]
    pub const fn outputs(&self) -> &OutputBuffers {
        &self.outputs
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::{FnKernel, HertzSerial};
    use crate::snapshot::{Material, MaterialTables};

    fn state() -> SimulationState {
        let mat = Material {
            yeff: 1.0e6,
            geff: 4.0e5,
            betaeff: 0.2,
            coeff_frict: 0.5,
        };
        let mut s = SimulationState::with_particles(1e-5, 1.0, MaterialTables::uniform(1, mat), 3);
        s.radius = vec![0.5; 3];
        s.mass = vec![1.0; 3];
        s.x = vec![0.0, 0.0, 0.0, 0.99, 0.0, 0.0, 1.98, 0.0, 0.0];
        s.v = vec![0.0, 0.1, 0.0, 0.0, 0.0, 0.0, 0.0, -0.1, 0.0];
        s.force = vec![0.5; 9];
        s.add_edge(0, 1, [0.0, 1e-4, 0.0]);
        s.add_edge(1, 2, [0.0; 3]);
        s
    }

    #[test]
    fn zero_iterations_rejected() {
        let err = Harness::new(state(), PageConfig::default(), 0).unwrap_err();
        assert_eq!(err.exit_code(), 1);
    }

    #[test]
    fn every_iteration_starts_from_step_state() {
        let mut harness = Harness::new(state(), PageConfig::default(), 4).unwrap();
        let mut seen = Vec::new();
        let mut kernel = FnKernel::new("recorder", |args: KernelArgs<'_>| {
            seen.push((args.force.to_vec(), args.rows[0].shear.to_vec()));
            args.force.iter_mut().for_each(|f| *f += 1.0);
            args.rows.into_iter().for_each(|row| row.shear.fill(7.0));
            Ok(())
        });
        harness.run(&mut kernel).unwrap();
        drop(kernel);
        assert_eq!(seen.len(), 4);
        assert!(seen.iter().all(|s| s == &seen[0]));
        assert_eq!(seen[0].0, vec![0.5; 9]);
        assert_eq!(seen[0].1, vec![0.0, 1e-4, 0.0]);
        // the last pass's output is kept for validation
        assert_eq!(harness.outputs().force, vec![1.5; 9]);
    }

    #[test]
    fn summary_counts_iterations() {
        let mut harness = Harness::new(state(), PageConfig::default(), 3).unwrap();
        assert!(harness.summary().is_err());
        harness.run(&mut HertzSerial::new()).unwrap();
        let summary = harness.summary().unwrap();
        assert_eq!(summary.num_iter, 3);
        assert_eq!(summary.nedge, 2);
        assert_eq!(summary.one_time.len(), 1);
        assert_eq!(summary.per_iter[0].name, "compute");
    }

    #[test]
    fn second_run_starts_fresh() {
        let mut harness = Harness::new(state(), PageConfig::default(), 3).unwrap();
        harness.run(&mut HertzSerial::new()).unwrap();
        harness.run(&mut HertzSerial::new()).unwrap();

        let timing = harness.timing();
        assert_eq!(timing.timers(Bucket::OneTime).len(), 1);
        assert!(timing.samples().iter().all(|s| s.len() == 3));
        let compute = &timing.timers(Bucket::PerIter)[0];
        let sampled: f64 = timing.samples()[0].iter().sum();
        approx::assert_relative_eq!(compute.total_time(), sampled, max_relative = 1e-9);
        assert_eq!(harness.summary().unwrap().num_iter, 3);

        let mut failing = FnKernel::new("fails", |_args: KernelArgs<'_>| {
            Err(HertzError::kernel("fails", "device lost"))
        });
        assert!(harness.run(&mut failing).is_err());
        assert!(harness.summary().is_err());
    }

    #[test]
    fn kernel_error_stops_run() {
        let mut harness = Harness::new(state(), PageConfig::default(), 5).unwrap();
        let mut calls = 0;
        let mut kernel = FnKernel::new("fails", |_args: KernelArgs<'_>| {
            calls += 1;
            if calls == 2 {
                Err(HertzError::kernel("fails", "device lost"))
            } else {
                Ok(())
            }
        });
        let err = harness.run(&mut kernel).unwrap_err();
        drop(kernel);
        assert_eq!(calls, 2);
        assert!(matches!(err, HertzError::Kernel { .. }));
        assert!(harness.summary().is_err());
    }

    #[test]
    fn validate_against_self_generated_expectations() {
        let mut harness = Harness::new(state(), PageConfig::default(), 1).unwrap();
        harness.run(&mut HertzSerial::new()).unwrap();
        let mut expected = harness.state().clone();
        expected.expected_force.clone_from(&harness.outputs().force);
        expected.expected_torque.clone_from(&harness.outputs().torque);
        expected.expected_shear = harness.list().gather_shear();

        let mut again = Harness::new(expected, PageConfig::default(), 2).unwrap();
        again.run(&mut HertzSerial::new()).unwrap();
        let mut validator = Validator::new(1e-9, false, true);
        let mut sink = ReportSink::commented(Vec::new());
        let report = again.validate(&mut validator, &mut sink).unwrap();
        assert_eq!(report.flagged, 0);
        assert_eq!(report.compared, 9 + 9 + 6);
        assert!(sink.into_inner().is_empty());
    }
}
