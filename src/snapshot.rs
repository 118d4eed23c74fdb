// SPDX-License-Identifier: AGPL-3.0-only

//! Binary step-file decoder and encoder.
//!
//! A step file is a flat dump of one timestep of a granular simulation:
//! material tables, per-particle arrays, the contact edge list with its
//! shear history, and the expected kernel outputs. There is no padding and
//! numbers use the native byte order of the machine that wrote the file.
//!
//! ```text
//! u32   magic (0xDEADBEEF)
//! f64   dt, nktv2p
//! i32   ntype      f64[ntype²] × 4   yeff, geff, betaeff, coeffFrict
//! i32   nnode      f64[3n] x, v, omega   f64[n] radius, mass   i32[n] type
//!                  f64[3n] force, torque
//! i32   nedge      i32[2e] edge   f64[3e] shear
//!                  f64[3n] expected force, torque   f64[3e] expected shear
//! ```
//!
//! The decoder checks the magic number, count signs, and stream length.
//! It does not check edge endpoints; the neighbor list builder does.

use std::path::Path;

use log::{debug, info, warn};

use crate::error::HertzError;
use crate::Result;

/// Magic number at offset 0 of every step file.
pub const MAGIC_NUMBER: u32 = 0xDEAD_BEEF;

/// Contact parameters for one pair of particle types.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Material {
    /// Effective Young's modulus.
    pub yeff: f64,
    /// Effective shear modulus.
    pub geff: f64,
    /// Effective damping coefficient.
    pub betaeff: f64,
    /// Coulomb friction coefficient.
    pub coeff_frict: f64,
}

/// Row-major `ntype × ntype` material property tables.
#[derive(Debug, Clone, PartialEq)]
pub struct MaterialTables {
    pub ntype: usize,
    pub yeff: Vec<f64>,
    pub geff: Vec<f64>,
    pub betaeff: Vec<f64>,
    pub coeff_frict: Vec<f64>,
}

impl MaterialTables {
    /// Tables where every type pair shares the same material.
    #[must_use]
    pub fn uniform(ntype: usize, material: Material) -> Self {
        let n = ntype * ntype;
        Self {
            ntype,
            yeff: vec![material.yeff; n],
            geff: vec![material.geff; n],
            betaeff: vec![material.betaeff; n],
            coeff_frict: vec![material.coeff_frict; n],
        }
    }

    /// Flat index of the `(type_i, type_j)` entry, if both types are in range.
    #[must_use]
    pub fn index(&self, type_i: i32, type_j: i32) -> Option<usize> {
        let ti = usize::try_from(type_i).ok()?;
        let tj = usize::try_from(type_j).ok()?;
        (ti < self.ntype && tj < self.ntype).then_some(ti * self.ntype + tj)
    }

    /// Material for a pair of particle types.
    #[must_use]
    pub fn at(&self, type_i: i32, type_j: i32) -> Option<Material> {
        let k = self.index(type_i, type_j)?;
        Some(Material {
            yeff: self.yeff[k],
            geff: self.geff[k],
            betaeff: self.betaeff[k],
            coeff_frict: self.coeff_frict[k],
        })
    }
}

/// One decoded step file.
///
/// `force`, `torque`, and `shear` hold the state before the kernel runs;
/// the harness copies them into its working buffers every iteration and
/// never writes them back.
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub dt: f64,
    /// Force-to-pressure unit conversion factor.
    pub nktv2p: f64,
    pub materials: MaterialTables,

    pub nnode: usize,
    pub x: Vec<f64>,
    pub v: Vec<f64>,
    pub omega: Vec<f64>,
    pub radius: Vec<f64>,
    pub mass: Vec<f64>,
    pub kind: Vec<i32>,
    pub force: Vec<f64>,
    pub torque: Vec<f64>,

    pub nedge: usize,
    pub edge: Vec<i32>,
    pub shear: Vec<f64>,

    pub expected_force: Vec<f64>,
    pub expected_torque: Vec<f64>,
    pub expected_shear: Vec<f64>,
}

impl SimulationState {
    /// Zero-filled state with `nnode` particles of type 0 and no edges.
    #[must_use]
    pub fn with_particles(dt: f64, nktv2p: f64, materials: MaterialTables, nnode: usize) -> Self {
        Self {
            dt,
            nktv2p,
            materials,
            nnode,
            x: vec![0.0; nnode * 3],
            v: vec![0.0; nnode * 3],
            omega: vec![0.0; nnode * 3],
            radius: vec![0.0; nnode],
            mass: vec![0.0; nnode],
            kind: vec![0; nnode],
            force: vec![0.0; nnode * 3],
            torque: vec![0.0; nnode * 3],
            nedge: 0,
            edge: Vec::new(),
            shear: Vec::new(),
            expected_force: vec![0.0; nnode * 3],
            expected_torque: vec![0.0; nnode * 3],
            expected_shear: Vec::new(),
        }
    }

    /// Append a contact edge with its initial shear history.
    pub fn add_edge(&mut self, a: i32, b: i32, shear: [f64; 3]) {
        self.edge.extend_from_slice(&[a, b]);
        self.shear.extend_from_slice(&shear);
        self.expected_shear.extend_from_slice(&[0.0; 3]);
        self.nedge += 1;
    }

    /// Endpoints of edge `e`.
    #[must_use]
    pub fn endpoints(&self, e: usize) -> (i32, i32) {
        (self.edge[2 * e], self.edge[2 * e + 1])
    }

    /// Load and decode a step file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read, otherwise any error of [`decode`].
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path).map_err(|e| HertzError::io(path, e))?;
        let state = decode(&bytes)?;
        info!(
            "loaded step file [{}]: ntype={} nnode={} nedge={}",
            path.display(),
            state.materials.ntype,
            state.nnode,
            state.nedge
        );
        Ok(state)
    }

    /// Encode and write this state to `path`.
    ///
    /// # Errors
    ///
    /// Any error of [`encode`], or `Io` if the file cannot be written.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let bytes = encode(self)?;
        std::fs::write(path, bytes).map_err(|e| HertzError::io(path, e))
    }

    /// Verify every array length against `ntype`, `nnode`, and `nedge`.
    ///
    /// # Errors
    ///
    /// `Format` naming the first array with the wrong length.
    pub fn check_lengths(&self) -> Result<()> {
        let nt2 = self.materials.ntype * self.materials.ntype;
        let n = self.nnode;
        let e = self.nedge;
        let expected: [(&str, usize, usize); 17] = [
            ("yeff", self.materials.yeff.len(), nt2),
            ("geff", self.materials.geff.len(), nt2),
            ("betaeff", self.materials.betaeff.len(), nt2),
            ("coeffFrict", self.materials.coeff_frict.len(), nt2),
            ("x", self.x.len(), 3 * n),
            ("v", self.v.len(), 3 * n),
            ("omega", self.omega.len(), 3 * n),
            ("radius", self.radius.len(), n),
            ("mass", self.mass.len(), n),
            ("type", self.kind.len(), n),
            ("force", self.force.len(), 3 * n),
            ("torque", self.torque.len(), 3 * n),
            ("edge", self.edge.len(), 2 * e),
            ("shear", self.shear.len(), 3 * e),
            ("expected_force", self.expected_force.len(), 3 * n),
            ("expected_torque", self.expected_torque.len(), 3 * n),
            ("expected_shear", self.expected_shear.len(), 3 * e),
        ];
        for (name, got, want) in expected {
            if got != want {
                return Err(HertzError::Format(format!(
                    "array `{name}` has {got} entries, expected {want}"
                )));
            }
        }
        Ok(())
    }
}

/// Cursor over an in-memory step file.
struct StepReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> StepReader<'a> {
    const fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    fn take(&mut self, field: &'static str, needed: usize) -> Result<&'a [u8]> {
        let available = self.buf.len() - self.pos;
        if needed > available {
            return Err(HertzError::Truncated {
                field,
                offset: self.pos,
                needed,
                available,
            });
        }
        let bytes = &self.buf[self.pos..self.pos + needed];
        self.pos += needed;
        Ok(bytes)
    }

    fn u32(&mut self, field: &'static str) -> Result<u32> {
        Ok(bytemuck::pod_read_unaligned(self.take(field, 4)?))
    }

    fn f64(&mut self, field: &'static str) -> Result<f64> {
        Ok(bytemuck::pod_read_unaligned(self.take(field, 8)?))
    }

    /// A count field: `i32` on disk, must be non-negative.
    fn count(&mut self, field: &'static str) -> Result<usize> {
        let raw: i32 = bytemuck::pod_read_unaligned(self.take(field, 4)?);
        usize::try_from(raw)
            .map_err(|_| HertzError::Format(format!("count `{field}` is negative ({raw})")))
    }

    fn f64s(&mut self, field: &'static str, len: usize) -> Result<Vec<f64>> {
        let bytes = self.take(field, byte_len::<f64>(len))?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    fn i32s(&mut self, field: &'static str, len: usize) -> Result<Vec<i32>> {
        let bytes = self.take(field, byte_len::<i32>(len))?;
        Ok(bytemuck::pod_collect_to_vec(bytes))
    }

    const fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }
}

// Saturates so an absurd count reaches `take` and reports truncation.
const fn byte_len<T>(len: usize) -> usize {
    len.saturating_mul(std::mem::size_of::<T>())
}

/// Decode a step file held in memory.
///
/// # Errors
///
/// `Format` for a wrong magic number or a negative count, `Truncated` if
/// the buffer ends before the last field, including counts whose arrays
/// could never fit in it.
pub fn decode(bytes: &[u8]) -> Result<SimulationState> {
    let mut r = StepReader::new(bytes);

    let magic = r.u32("magic")?;
    if magic != MAGIC_NUMBER {
        return Err(HertzError::Format(format!(
            "magic number is [{magic:x}]; expecting [{MAGIC_NUMBER:x}]"
        )));
    }

    let dt = r.f64("dt")?;
    let nktv2p = r.f64("nktv2p")?;

    let ntype = r.count("ntype")?;
    let nt2 = ntype.saturating_mul(ntype);
    let materials = MaterialTables {
        ntype,
        yeff: r.f64s("yeff", nt2)?,
        geff: r.f64s("geff", nt2)?,
        betaeff: r.f64s("betaeff", nt2)?,
        coeff_frict: r.f64s("coeffFrict", nt2)?,
    };

    let nnode = r.count("nnode")?;
    let n3 = nnode.saturating_mul(3);
    let x = r.f64s("x", n3)?;
    let v = r.f64s("v", n3)?;
    let omega = r.f64s("omega", n3)?;
    let radius = r.f64s("radius", nnode)?;
    let mass = r.f64s("mass", nnode)?;
    let kind = r.i32s("type", nnode)?;
    let force = r.f64s("force", n3)?;
    let torque = r.f64s("torque", n3)?;

    let nedge = r.count("nedge")?;
    let edge = r.i32s("edge", nedge.saturating_mul(2))?;
    let e3 = nedge.saturating_mul(3);
    let shear = r.f64s("shear", e3)?;

    let expected_force = r.f64s("expected_force", n3)?;
    let expected_torque = r.f64s("expected_torque", n3)?;
    let expected_shear = r.f64s("expected_shear", e3)?;

    debug!("decoded step: ntype={ntype} nnode={nnode} nedge={nedge}");
    if r.remaining() > 0 {
        warn!("ignoring {} trailing bytes after expected_shear", r.remaining());
    }

    Ok(SimulationState {
        dt,
        nktv2p,
        materials,
        nnode,
        x,
        v,
        omega,
        radius,
        mass,
        kind,
        force,
        torque,
        nedge,
        edge,
        shear,
        expected_force,
        expected_torque,
        expected_shear,
    })
}

fn put_count(out: &mut Vec<u8>, field: &str, n: usize) -> Result<()> {
    let n = i32::try_from(n)
        .map_err(|_| HertzError::Format(format!("count `{field}` = {n} does not fit in i32")))?;
    out.extend_from_slice(bytemuck::bytes_of(&n));
    Ok(())
}

/// Encode a state into the step-file layout.
///
/// # Errors
///
/// `Format` if an array length disagrees with its count or a count does
/// not fit the on-disk `i32`.
pub fn encode(state: &SimulationState) -> Result<Vec<u8>> {
    state.check_lengths()?;

    let mut out = Vec::new();
    out.extend_from_slice(bytemuck::bytes_of(&MAGIC_NUMBER));
    out.extend_from_slice(bytemuck::bytes_of(&state.dt));
    out.extend_from_slice(bytemuck::bytes_of(&state.nktv2p));

    let m = &state.materials;
    put_count(&mut out, "ntype", m.ntype)?;
    for table in [&m.yeff, &m.geff, &m.betaeff, &m.coeff_frict] {
        out.extend_from_slice(bytemuck::cast_slice(table));
    }

    put_count(&mut out, "nnode", state.nnode)?;
    for arr in [&state.x, &state.v, &state.omega, &state.radius, &state.mass] {
        out.extend_from_slice(bytemuck::cast_slice(arr));
    }
    out.extend_from_slice(bytemuck::cast_slice(&state.kind));
    out.extend_from_slice(bytemuck::cast_slice(&state.force));
    out.extend_from_slice(bytemuck::cast_slice(&state.torque));

    put_count(&mut out, "nedge", state.nedge)?;
    out.extend_from_slice(bytemuck::cast_slice(&state.edge));
    out.extend_from_slice(bytemuck::cast_slice(&state.shear));

    for arr in [
        &state.expected_force,
        &state.expected_torque,
        &state.expected_shear,
    ] {
        out.extend_from_slice(bytemuck::cast_slice(arr));
    }
    Ok(out)
}
