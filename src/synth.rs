// SPDX-License-Identifier: AGPL-3.0-only

//! Synthetic step files for exercising the harness without a DEM run.
//!
//! Builds a chain of slightly overlapping spheres of two particle types with
//! reproducible velocities, spins and shear history, then fills the expected
//! arrays from one pass of the serial reference kernel.

use std::f64::consts::PI;

use log::debug;

use crate::bench::Harness;
use crate::error::HertzError;
use crate::kernel::HertzSerial;
use crate::neighbor::PageConfig;
use crate::snapshot::{Material, MaterialTables, SimulationState};
use crate::Result;

/// Particle density used to derive masses from radii.
const DENSITY: f64 = 2500.0;

/// LCG uniform in `[0, 1)`.
fn lcg_uniform(state: &mut u64) -> f64 {
    *state = state
        .wrapping_mul(6_364_136_223_846_793_005)
        .wrapping_add(1_442_695_040_888_963_407);
    (*state >> 33) as f64 / (1u64 << 31) as f64
}

/// LCG uniform in `[lo, hi)`.
fn lcg_range(state: &mut u64, lo: f64, hi: f64) -> f64 {
    (hi - lo).mul_add(lcg_uniform(state), lo)
}

/// Two-type material tables (symmetric mixing).
#[must_use]
pub fn two_type_materials() -> MaterialTables {
    let a = Material {
        yeff: 5.0e6,
        geff: 1.9e6,
        betaeff: 0.35,
        coeff_frict: 0.5,
    };
    let b = Material {
        yeff: 3.0e6,
        geff: 1.1e6,
        betaeff: 0.25,
        coeff_frict: 0.3,
    };
    let mix = Material {
        yeff: 3.8e6,
        geff: 1.4e6,
        betaeff: 0.3,
        coeff_frict: 0.4,
    };
    let mut t = MaterialTables::uniform(2, mix);
    for (k, m) in [(0, a), (3, b)] {
        t.yeff[k] = m.yeff;
        t.geff[k] = m.geff;
        t.betaeff[k] = m.betaeff;
        t.coeff_frict[k] = m.coeff_frict;
    }
    t
}

/// Chain of `nnode` spheres along x with self-consistent expected arrays.
///
/// Neighbors along the chain overlap by 0.5–2 % of their radius sum. Every
/// third particle also gets an edge to its second neighbor, which is out of
/// contact and exercises the separation branch of the kernel.
///
/// # Errors
///
/// `Config` if `nnode < 2`; otherwise whatever building or running the
/// reference pass returns.
pub fn chain(nnode: usize, seed: u64) -> Result<SimulationState> {
    if nnode < 2 {
        return Err(HertzError::Config(format!(
            "a chain needs at least 2 particles, got {nnode}"
        )));
    }
    let mut rng = seed;
    let mut s = SimulationState::with_particles(1.0e-5, 1.0, two_type_materials(), nnode);

    let mut x = 0.0;
    for p in 0..nnode {
        let r = lcg_range(&mut rng, 0.0045, 0.0055);
        if p > 0 {
            let radsum = s.radius[p - 1] + r;
            x += radsum * (1.0 - lcg_range(&mut rng, 0.005, 0.02));
        }
        s.radius[p] = r;
        s.mass[p] = DENSITY * 4.0 / 3.0 * PI * r * r * r;
        s.kind[p] = (p % 2) as i32;
        s.x[3 * p] = x;
        for k in 0..3 {
            s.v[3 * p + k] = lcg_range(&mut rng, -0.05, 0.05);
            s.omega[3 * p + k] = lcg_range(&mut rng, -2.0, 2.0);
            s.force[3 * p + k] = lcg_range(&mut rng, -1e-3, 1e-3);
        }
        // gravity only, as a DEM step would carry it
        s.force[3 * p + 2] -= 9.81 * s.mass[p];
    }

    for p in 0..nnode - 1 {
        let shear = [0, 1, 2].map(|_| lcg_range(&mut rng, -1e-6, 1e-6));
        s.add_edge(p as i32, (p + 1) as i32, shear);
        if p % 3 == 0 && p + 2 < nnode {
            s.add_edge(p as i32, (p + 2) as i32, [1e-7, 0.0, -1e-7]);
        }
    }

    let mut harness = Harness::new(s.clone(), PageConfig::default(), 1)?;
    harness.run(&mut HertzSerial::new())?;
    s.expected_force.clone_from(&harness.outputs().force);
    s.expected_torque.clone_from(&harness.outputs().torque);
    s.expected_shear = harness.list().gather_shear();
    debug!("synthetic chain: nnode={nnode} nedge={} seed={seed}", s.nedge);
    Ok(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lcg_is_reproducible_and_bounded() {
        let (mut a, mut b) = (42, 42);
        for _ in 0..1000 {
            let u = lcg_uniform(&mut a);
            assert_eq!(u, lcg_uniform(&mut b));
            assert!((0.0..1.0).contains(&u));
        }
    }

    #[test]
    fn chain_is_self_consistent() {
        let s = chain(10, 7).unwrap();
        s.check_lengths().unwrap();
        assert_eq!(s.nnode, 10);
        // 9 chain edges + second-neighbor edges from particles 0, 3, 6
        assert_eq!(s.nedge, 12);
        assert!(s.expected_force.iter().zip(&s.force).any(|(e, f)| e != f));
        assert_eq!(chain(10, 7).unwrap(), s);
        assert_ne!(chain(10, 8).unwrap().x, s.x);
    }

    #[test]
    fn second_neighbor_edges_are_out_of_contact() {
        let s = chain(4, 1).unwrap();
        // edge (0, 2) is listed second in particle 0's slice
        assert_eq!(s.endpoints(1), (0, 2));
        assert_eq!(&s.expected_shear[3..6], &[0.0; 3]);
    }

    #[test]
    fn too_short_chain_rejected() {
        assert!(matches!(chain(1, 0), Err(HertzError::Config(_))));
    }
}
