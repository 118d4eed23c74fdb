// SPDX-License-Identifier: AGPL-3.0-only

//! Hertz contact with tangential shear history, serial CPU reference.
//!
//! Normal force: Hertzian spring `kn = 4/3 Y* sqrt(R* δ)` with viscous
//! damping. Tangential force: incremental shear spring `kt = 8 G* sqrt(R* δ)`
//! with damping, the stored shear rotated onto the current tangent plane and
//! capped by Coulomb friction `|Ft| ≤ μ |Fn|`.

use crate::bench::PhaseScope;
use crate::error::HertzError;
use crate::neighbor::SHEAR_WIDTH;
use crate::snapshot::{Material, SimulationState};
use crate::Result;

use super::{check_types, ContactKernel, KernelArgs};

/// `sqrt(5/6)`, the damping prefactor of the Hertz model.
pub const SQRT_FIVE_OVER_SIX: f64 = 0.912_870_929_175_276_9;

/// Result of one pair interaction, applied as `+force` on `i`, `-force` on
/// `j`, plus the two torques.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PairForce {
    pub force: [f64; 3],
    pub torque_i: [f64; 3],
    pub torque_j: [f64; 3],
}

fn vec3(a: &[f64], i: usize) -> [f64; 3] {
    [a[3 * i], a[3 * i + 1], a[3 * i + 2]]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(a: [f64; 3]) -> f64 {
    dot(a, a).sqrt()
}

/// Evaluate the contact between `i` and `j`, updating its shear history.
///
/// Pairs that are not overlapping get their touch flag and shear cleared and
/// return a zero force.
#[must_use]
pub fn hertz_pair(
    state: &SimulationState,
    mat: &Material,
    i: usize,
    j: usize,
    shear: &mut [f64],
    touch: &mut i32,
) -> PairForce {
    let xi = vec3(&state.x, i);
    let xj = vec3(&state.x, j);
    let del = [xi[0] - xj[0], xi[1] - xj[1], xi[2] - xj[2]];
    let rsq = dot(del, del);
    let radi = state.radius[i];
    let radj = state.radius[j];
    let radsum = radi + radj;

    if rsq >= radsum * radsum {
        *touch = 0;
        shear[..SHEAR_WIDTH].fill(0.0);
        return PairForce::default();
    }

    let r = rsq.sqrt();
    let rinv = 1.0 / r;
    let rsqinv = 1.0 / rsq;

    // relative translational velocity, normal and tangential parts
    let vi = vec3(&state.v, i);
    let vj = vec3(&state.v, j);
    let vr = [vi[0] - vj[0], vi[1] - vj[1], vi[2] - vj[2]];
    let vnnr = dot(vr, del);
    let vn = del.map(|d| d * vnnr * rsqinv);
    let vt = [vr[0] - vn[0], vr[1] - vn[1], vr[2] - vn[2]];

    // relative rotational velocity
    let wi = vec3(&state.omega, i);
    let wj = vec3(&state.omega, j);
    let wr = [0, 1, 2].map(|k| (radi * wi[k] + radj * wj[k]) * rinv);

    let mi = state.mass[i];
    let mj = state.mass[j];
    let meff = mi * mj / (mi + mj);

    let deltan = radsum - r;
    let reff = radi * radj / radsum;
    let sqrtval = (reff * deltan).sqrt();
    let sn = 2.0 * mat.yeff * sqrtval;
    let st = 8.0 * mat.geff * sqrtval;
    let kn = 4.0 / 3.0 * mat.yeff * sqrtval / state.nktv2p;
    let kt = st / state.nktv2p;
    let gamman = -2.0 * SQRT_FIVE_OVER_SIX * mat.betaeff * (sn * meff).sqrt();
    let gammat = -2.0 * SQRT_FIVE_OVER_SIX * mat.betaeff * (st * meff).sqrt();

    // normal force = Hertzian contact + normal velocity damping
    let damp = gamman * vnnr * rsqinv;
    let ccel = kn * (radsum - r) * rinv - damp;

    // relative velocity at the contact point
    let vtr = [
        vt[0] - (del[2] * wr[1] - del[1] * wr[2]),
        vt[1] - (del[0] * wr[2] - del[2] * wr[0]),
        vt[2] - (del[1] * wr[0] - del[0] * wr[1]),
    ];

    *touch = 1;
    for k in 0..3 {
        shear[k] += vtr[k] * state.dt;
    }
    let shrmag = norm([shear[0], shear[1], shear[2]]);

    // rotate shear displacement onto the tangent plane
    let rsht = dot([shear[0], shear[1], shear[2]], del) * rsqinv;
    for k in 0..3 {
        shear[k] -= rsht * del[k];
    }

    let mut fs = [0, 1, 2].map(|k| -(kt * shear[k] + gammat * vtr[k]));

    // Coulomb limit: rescale shear so |fs| = fn
    let fs_mag = norm(fs);
    let fn_max = mat.coeff_frict * (ccel * r).abs();
    if fs_mag > fn_max {
        if shrmag == 0.0 {
            fs = [0.0; 3];
        } else {
            let ratio = fn_max / fs_mag;
            for k in 0..3 {
                let damped = gammat * vtr[k] / kt;
                shear[k] = ratio * (shear[k] + damped) - damped;
                fs[k] *= ratio;
            }
        }
    }

    let force = [0, 1, 2].map(|k| del[k] * ccel + fs[k]);
    let tor = [
        rinv * (del[1] * fs[2] - del[2] * fs[1]),
        rinv * (del[2] * fs[0] - del[0] * fs[2]),
        rinv * (del[0] * fs[1] - del[1] * fs[0]),
    ];
    PairForce {
        force,
        torque_i: tor.map(|t| -radi * t),
        torque_j: tor.map(|t| -radj * t),
    }
}

/// Apply one pair result to the force and torque buffers.
pub(crate) fn scatter(force: &mut [f64], torque: &mut [f64], i: usize, j: usize, pair: &PairForce) {
    for k in 0..3 {
        force[3 * i + k] += pair.force[k];
        force[3 * j + k] -= pair.force[k];
        torque[3 * i + k] += pair.torque_i[k];
        torque[3 * j + k] += pair.torque_j[k];
    }
}

/// Material of the `(i, j)` pair, as a kernel error if a type is unknown.
pub(crate) fn pair_material(kernel: &str, state: &SimulationState, i: usize, j: usize) -> Result<Material> {
    state
        .materials
        .at(state.kind[i], state.kind[j])
        .ok_or_else(|| HertzError::kernel(kernel, format!("no material for pair ({i}, {j})")))
}

/// Single-threaded pass over the rows in `ilist` order.
#[derive(Debug, Default)]
pub struct HertzSerial;

impl HertzSerial {
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl ContactKernel for HertzSerial {
    fn name(&self) -> &str {
        "serial"
    }

    fn setup(&mut self, state: &SimulationState, timing: &mut PhaseScope<'_>) -> Result<()> {
        timing.time("constants", || check_types(self.name(), state))?
    }

    fn compute(&mut self, args: KernelArgs<'_>, timing: &mut PhaseScope<'_>) -> Result<()> {
        let KernelArgs {
            state,
            force,
            torque,
            mut rows,
        } = args;
        timing.time("compute", || -> Result<()> {
            for row in &mut rows {
                for (jj, &j) in row.neighbors.iter().enumerate() {
                    let j = j as usize;
                    let mat = pair_material("serial", state, row.i, j)?;
                    let shear = &mut row.shear[jj * SHEAR_WIDTH..(jj + 1) * SHEAR_WIDTH];
                    let pair = hertz_pair(state, &mat, row.i, j, shear, &mut row.touch[jj]);
                    scatter(force, torque, row.i, j, &pair);
                }
            }
            Ok(())
        })?
    }
}
