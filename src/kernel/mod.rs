// SPDX-License-Identifier: AGPL-3.0-only

//! Contact kernels driven by the harness.
//!
//! A kernel sees the step state read-only, writes forces and torques into
//! the harness buffers, and updates the shear history and touch flags in the
//! neighbor rows. Every phase it wants measured goes through the
//! [`PhaseScope`] it is handed:
//!   - `setup`: one-time costs (constant tables, device buffers)
//!   - `refresh`: neighbor list upload or re-layout
//!   - `compute`: the per-iteration force pass

mod hertz;
mod parallel;

pub use hertz::{hertz_pair, HertzSerial, PairForce, SQRT_FIVE_OVER_SIX};
pub use parallel::HertzParallel;

use clap::ValueEnum;
use serde::Serialize;

use crate::bench::PhaseScope;
use crate::error::HertzError;
use crate::neighbor::{NeighborList, NeighborRow};
use crate::snapshot::SimulationState;
use crate::Result;

/// Buffers and rows handed to [`ContactKernel::compute`] for one iteration.
#[derive(Debug)]
pub struct KernelArgs<'a> {
    pub state: &'a SimulationState,
    /// `3 * nnode` forces, reset from the step file before every call.
    pub force: &'a mut [f64],
    /// `3 * nnode` torques, reset from the step file before every call.
    pub torque: &'a mut [f64],
    /// One row per `ilist` entry, shear and touch restored before every call.
    pub rows: Vec<NeighborRow<'a>>,
}

/// A force kernel under benchmark.
pub trait ContactKernel {
    fn name(&self) -> &str;

    /// One-time preparation from the step state.
    ///
    /// # Errors
    ///
    /// Kernel-specific; the run stops on the first error.
    fn setup(&mut self, _state: &SimulationState, _timing: &mut PhaseScope<'_>) -> Result<()> {
        Ok(())
    }

    /// Neighbor list preparation, run once after setup.
    ///
    /// # Errors
    ///
    /// Kernel-specific; the run stops on the first error.
    fn refresh(&mut self, _list: &NeighborList, _timing: &mut PhaseScope<'_>) -> Result<()> {
        Ok(())
    }

    /// One force pass.
    ///
    /// # Errors
    ///
    /// Kernel-specific; the run stops on the first error.
    fn compute(&mut self, args: KernelArgs<'_>, timing: &mut PhaseScope<'_>) -> Result<()>;
}

/// Kernel backed by a closure, timed as a single `kernel` phase.
pub struct FnKernel<F> {
    name: String,
    f: F,
}

impl<F> FnKernel<F>
where
    F: FnMut(KernelArgs<'_>) -> Result<()>,
{
    pub fn new(name: impl Into<String>, f: F) -> Self {
        Self {
            name: name.into(),
            f,
        }
    }
}

impl<F> std::fmt::Debug for FnKernel<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnKernel").field("name", &self.name).finish()
    }
}

impl<F> ContactKernel for FnKernel<F>
where
    F: FnMut(KernelArgs<'_>) -> Result<()>,
{
    fn name(&self) -> &str {
        &self.name
    }

    fn compute(&mut self, args: KernelArgs<'_>, timing: &mut PhaseScope<'_>) -> Result<()> {
        timing.time("kernel", || (self.f)(args))?
    }
}

/// Built-in kernels selectable from the command line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum KernelSelector {
    /// Single-threaded reference pass.
    #[default]
    Serial,
    /// Rayon pass over neighbor rows with a serial scatter.
    Parallel,
}

impl KernelSelector {
    #[must_use]
    pub fn build(self) -> Box<dyn ContactKernel> {
        match self {
            Self::Serial => Box::new(HertzSerial::new()),
            Self::Parallel => Box::new(HertzParallel::new()),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Serial => "serial",
            Self::Parallel => "parallel",
        }
    }
}

impl std::fmt::Display for KernelSelector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Check every particle type indexes the material tables.
pub(crate) fn check_types(kernel: &str, state: &SimulationState) -> Result<()> {
    let ntype = state.materials.ntype;
    match state
        .kind
        .iter()
        .enumerate()
        .find(|(_, &t)| usize::try_from(t).map_or(true, |t| t >= ntype))
    {
        Some((i, t)) => Err(HertzError::kernel(
            kernel,
            format!("particle {i} has type {t}, material tables cover 0..{ntype}"),
        )),
        None => Ok(()),
    }
}
