// SPDX-License-Identifier: AGPL-3.0-only

//! Rayon variant of the Hertz kernel.
//!
//! Rows own disjoint shear and touch slices, so pair results can be computed
//! in parallel. Forces are then scattered serially in `ilist` order, which
//! keeps the summation order, and therefore the result, identical to the
//! serial kernel.

use rayon::prelude::*;

use crate::bench::PhaseScope;
use crate::neighbor::{NeighborList, SHEAR_WIDTH};
use crate::snapshot::SimulationState;
use crate::Result;

use super::hertz::{hertz_pair, pair_material, scatter, PairForce};
use super::{check_types, ContactKernel, KernelArgs};

#[derive(Debug, Default)]
pub struct HertzParallel {
    /// Per-row pair results, reused across iterations.
    pairs: Vec<Vec<(usize, PairForce)>>,
}

impl HertzParallel {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl ContactKernel for HertzParallel {
    fn name(&self) -> &str {
        "parallel"
    }

    fn setup(&mut self, state: &SimulationState, timing: &mut PhaseScope<'_>) -> Result<()> {
        timing.time("constants", || check_types("parallel", state))?
    }

    fn refresh(&mut self, list: &NeighborList, timing: &mut PhaseScope<'_>) -> Result<()> {
        let pairs = &mut self.pairs;
        timing.time("layout", || {
            *pairs = list
                .ilist()
                .iter()
                .map(|&i| Vec::with_capacity(list.numneigh()[i]))
                .collect();
        })
    }

    fn compute(&mut self, args: KernelArgs<'_>, timing: &mut PhaseScope<'_>) -> Result<()> {
        let KernelArgs {
            state,
            force,
            torque,
            mut rows,
        } = args;
        if self.pairs.len() != rows.len() {
            self.pairs.resize_with(rows.len(), Vec::new);
        }
        let pairs = &mut self.pairs;

        timing.time("compute", || -> Result<()> {
            rows.par_iter_mut()
                .zip(pairs.par_iter_mut())
                .try_for_each(|(row, out)| -> Result<()> {
                    out.clear();
                    for (jj, &j) in row.neighbors.iter().enumerate() {
                        let j = j as usize;
                        let mat = pair_material("parallel", state, row.i, j)?;
                        let shear = &mut row.shear[jj * SHEAR_WIDTH..(jj + 1) * SHEAR_WIDTH];
                        out.push((j, hertz_pair(state, &mat, row.i, j, shear, &mut row.touch[jj])));
                    }
                    Ok(())
                })
        })??;

        timing.time("scatter", || {
            for (row, out) in rows.iter().zip(pairs.iter()) {
                for (j, pair) in out {
                    scatter(force, torque, row.i, *j, pair);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bench::{Bucket, TimingContext};
    use crate::kernel::HertzSerial;
    use crate::neighbor::PageConfig;
    use crate::snapshot::{Material, MaterialTables};

    /// Small cluster: a 3x3 grid of slightly overlapping spheres with
    /// mixed velocities and spins.
    fn cluster() -> SimulationState {
        let mat = Material {
            yeff: 1.0e6,
            geff: 4.0e5,
            betaeff: 0.3,
            coeff_frict: 0.4,
        };
        let n = 9;
        let mut s = SimulationState::with_particles(1e-5, 1.0, MaterialTables::uniform(1, mat), n);
        for p in 0..n {
            let (gx, gy) = ((p % 3) as f64, (p / 3) as f64);
            s.x[3 * p] = gx * 0.98;
            s.x[3 * p + 1] = gy * 0.98;
            s.v[3 * p] = 0.1 * (p as f64) - 0.4;
            s.v[3 * p + 2] = 0.05 * (p % 2) as f64;
            s.omega[3 * p + 1] = 0.3 * ((p % 3) as f64 - 1.0);
            s.radius[p] = 0.5;
            s.mass[p] = 1.0 + 0.1 * p as f64;
        }
        for p in 0..n {
            if p % 3 != 2 {
                s.add_edge(p as i32, (p + 1) as i32, [1e-4, 0.0, 2e-4]);
            }
            if p + 3 < n {
                s.add_edge(p as i32, (p + 3) as i32, [0.0, -1e-4, 0.0]);
            }
        }
        s
    }

    fn run(kernel: &mut dyn ContactKernel, state: &SimulationState) -> (Vec<f64>, Vec<f64>, Vec<f64>) {
        let mut list = NeighborList::build(state, PageConfig::default()).unwrap();
        let mut ctx = TimingContext::new();
        kernel.setup(state, &mut ctx.scope(Bucket::OneTime)).unwrap();
        kernel.refresh(&list, &mut ctx.scope(Bucket::NlRefresh)).unwrap();
        let mut force = state.force.clone();
        let mut torque = state.torque.clone();
        let args = KernelArgs {
            state,
            force: &mut force,
            torque: &mut torque,
            rows: list.copy_into(),
        };
        kernel.compute(args, &mut ctx.iteration(0)).unwrap();
        (force, torque, list.gather_shear())
    }

    #[test]
    fn matches_serial_kernel_exactly() {
        let state = cluster();
        let serial = run(&mut HertzSerial::new(), &state);
        let parallel = run(&mut HertzParallel::new(), &state);
        assert_eq!(serial, parallel);
        assert!(serial.0.iter().any(|&f| f != 0.0));
    }

    #[test]
    fn records_compute_and_scatter_phases() {
        let state = cluster();
        let mut list = NeighborList::build(&state, PageConfig::default()).unwrap();
        let mut kernel = HertzParallel::new();
        let mut ctx = TimingContext::new();
        kernel.refresh(&list, &mut ctx.scope(Bucket::NlRefresh)).unwrap();
        for it in 0..2 {
            list.restore();
            let mut force = vec![0.0; 27];
            let mut torque = vec![0.0; 27];
            let args = KernelArgs {
                state: &state,
                force: &mut force,
                torque: &mut torque,
                rows: list.copy_into(),
            };
            kernel.compute(args, &mut ctx.iteration(it)).unwrap();
        }
        let names: Vec<&str> = ctx.timers(Bucket::PerIter).iter().map(|t| t.name()).collect();
        assert_eq!(names, vec!["compute", "scatter"]);
        ctx.check_samples(2).unwrap();
        assert_eq!(ctx.timers(Bucket::NlRefresh)[0].name(), "layout");
    }
}
