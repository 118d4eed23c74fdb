// SPDX-License-Identifier: AGPL-3.0-only

//! Paged half neighbor list built from the step file's contact edges.
//!
//! Each edge `(a, b)` is stored once, as `b` in particle `a`'s slice, in
//! input edge order. Kernels apply the pair force to both particles.
//!
//! Storage follows the LAMMPS page scheme: neighbor indices, shear history
//! (3 doubles per pair), and touch flags live in three parallel sets of
//! fixed-size pages. Before a particle is placed the current page must have
//! `oneatom` free slots, otherwise placement moves to the next page, so a
//! slice never straddles two pages and a particle's pairs stay contiguous.
//! Slices are addressed by `(page, offset, len)` rather than pointers.
//!
//! The shear and touch pages can be snapshotted with [`NeighborList::backup`]
//! and reinstated with [`NeighborList::restore`], so every timed iteration
//! starts from the same contact history.

mod pages;

pub use pages::{PageConfig, Slot, DEFAULT_MAX_PAGES, DEFAULT_ONEATOM, DEFAULT_PGSIZE, PGDELTA};

use log::{debug, warn};

use crate::error::HertzError;
use crate::snapshot::SimulationState;
use crate::Result;

/// Values per pair in the shear pages.
pub const SHEAR_WIDTH: usize = 3;

/// One particle's neighbors as handed to a kernel.
///
/// `shear` holds `3 * neighbors.len()` doubles and `touch` one flag per
/// neighbor; both are written by the kernel.
#[derive(Debug)]
pub struct NeighborRow<'a> {
    pub i: usize,
    pub neighbors: &'a [u32],
    pub shear: &'a mut [f64],
    pub touch: &'a mut [i32],
}

#[derive(Debug, Clone, Default)]
struct AuxSnapshot {
    dpages: Vec<Vec<f64>>,
    tpages: Vec<Vec<i32>>,
}

/// Paged neighbor list with shear-history checkpointing.
#[derive(Debug)]
pub struct NeighborList {
    config: PageConfig,
    ilist: Vec<usize>,
    numneigh: Vec<usize>,
    slots: Vec<Slot>,
    pages: Vec<Vec<u32>>,
    dpages: Vec<Vec<f64>>,
    tpages: Vec<Vec<i32>>,
    saved: Option<AuxSnapshot>,
}

impl NeighborList {
    /// Build the list from `state.edge` and take the initial backup.
    ///
    /// # Errors
    ///
    /// `Config` for unusable page sizes, `Index` for an endpoint outside
    /// `[0, nnode)`, `CapacityExceeded` if a particle has more than
    /// `oneatom` neighbors or the list needs more than `max_pages` pages.
    pub fn build(state: &SimulationState, config: PageConfig) -> Result<Self> {
        config.validate()?;
        let nnode = state.nnode;

        let mut numneigh = vec![0usize; nnode];
        for e in 0..state.nedge {
            let (a, b) = state.endpoints(e);
            let a = endpoint(e, a, nnode)?;
            endpoint(e, b, nnode)?;
            numneigh[a] += 1;
        }
        if let Some((i, &n)) = numneigh
            .iter()
            .enumerate()
            .find(|(_, &n)| n > config.oneatom)
        {
            return Err(HertzError::CapacityExceeded(format!(
                "particle {i} has {n} neighbors, more than oneatom={}",
                config.oneatom
            )));
        }

        let mut list = Self {
            config,
            ilist: Vec::new(),
            numneigh,
            slots: vec![Slot::default(); nnode],
            pages: Vec::new(),
            dpages: Vec::new(),
            tpages: Vec::new(),
            saved: None,
        };
        list.add_pages()?;
        list.place()?;
        list.fill(state);
        debug!(
            "neighbor list: inum={} pairs={} pages={} (pgsize={}, oneatom={})",
            list.inum(),
            list.pair_count(),
            list.page_count(),
            config.pgsize,
            config.oneatom
        );
        list.backup();
        Ok(list)
    }

    /// Append up to `pgdelta` zeroed pages, bounded by `max_pages`.
    fn add_pages(&mut self) -> Result<()> {
        let room = self.config.max_pages.saturating_sub(self.pages.len());
        if room == 0 {
            return Err(HertzError::CapacityExceeded(format!(
                "all {} pages of {} pairs are in use",
                self.config.max_pages, self.config.pgsize
            )));
        }
        let pgsize = self.config.pgsize;
        for _ in 0..self.config.pgdelta.min(room) {
            self.pages.push(vec![0; pgsize]);
            self.dpages.push(vec![0.0; pgsize * SHEAR_WIDTH]);
            self.tpages.push(vec![0; pgsize]);
        }
        Ok(())
    }

    /// Assign every particle with neighbors a slot, in ascending order.
    fn place(&mut self) -> Result<()> {
        let PageConfig {
            pgsize, oneatom, ..
        } = self.config;
        let mut npage = 0;
        let mut npnt = 0;
        for i in 0..self.numneigh.len() {
            let n = self.numneigh[i];
            if n == 0 {
                continue;
            }
            if pgsize - npnt < oneatom {
                npnt = 0;
                npage += 1;
                if npage == self.pages.len() {
                    self.add_pages()?;
                }
            }
            self.slots[i] = Slot {
                page: npage,
                offset: npnt,
                len: n,
            };
            self.ilist.push(i);
            npnt += n;
        }
        Ok(())
    }

    /// Copy neighbor indices and initial shear into the placed slots.
    fn fill(&mut self, state: &SimulationState) {
        let mut cursor = vec![0usize; self.numneigh.len()];
        for e in 0..state.nedge {
            let (a, b) = state.endpoints(e);
            let a = a as usize;
            let slot = self.slots[a];
            let k = slot.offset + cursor[a];
            cursor[a] += 1;

            self.pages[slot.page][k] = b as u32;
            self.dpages[slot.page][k * SHEAR_WIDTH..(k + 1) * SHEAR_WIDTH]
                .copy_from_slice(&state.shear[e * SHEAR_WIDTH..(e + 1) * SHEAR_WIDTH]);
            self.tpages[slot.page][k] = 1;
        }
    }

    /// Snapshot the shear and touch pages.
    pub fn backup(&mut self) {
        let snap = self.saved.get_or_insert_with(AuxSnapshot::default);
        snap.dpages.clone_from(&self.dpages);
        snap.tpages.clone_from(&self.tpages);
    }

    /// Copy the last snapshot back over the shear and touch pages.
    pub fn restore(&mut self) {
        let Some(snap) = &self.saved else {
            warn!("neighbor list restore() without a backup; pages left as is");
            return;
        };
        for (dst, src) in self.dpages.iter_mut().zip(&snap.dpages) {
            dst.copy_from_slice(src);
        }
        for (dst, src) in self.tpages.iter_mut().zip(&snap.tpages) {
            dst.copy_from_slice(src);
        }
    }

    /// Drop the snapshot; `restore` becomes a no-op until the next backup.
    pub fn clear_backup(&mut self) {
        self.saved = None;
    }

    /// Kernel view: one row per `ilist` entry with disjoint mutable slices.
    pub fn copy_into(&mut self) -> Vec<NeighborRow<'_>> {
        let slots: Vec<Slot> = self.ilist.iter().map(|&i| self.slots[i]).collect();
        let shear = pages::carve_mut(&mut self.dpages, &slots, SHEAR_WIDTH);
        let touch = pages::carve_mut(&mut self.tpages, &slots, 1);
        let pages = &self.pages;
        self.ilist
            .iter()
            .zip(slots)
            .zip(shear.into_iter().zip(touch))
            .map(|((&i, s), (shear, touch))| NeighborRow {
                i,
                neighbors: &pages[s.page][s.offset..s.offset + s.len],
                shear,
                touch,
            })
            .collect()
    }

    /// Shear history in `ilist`/`numneigh` traversal order.
    #[must_use]
    pub fn gather_shear(&self) -> Vec<f64> {
        let mut out = Vec::with_capacity(self.pair_count() * SHEAR_WIDTH);
        for &i in &self.ilist {
            out.extend_from_slice(self.shear(i));
        }
        out
    }

    /// Check the list reproduces the edge list of `state`.
    ///
    /// # Errors
    ///
    /// `Format` naming the first edge that is missing or out of place.
    pub fn verify_against(&self, state: &SimulationState) -> Result<()> {
        if self.pair_count() != state.nedge {
            return Err(HertzError::Format(format!(
                "neighbor list holds {} pairs for {} edges",
                self.pair_count(),
                state.nedge
            )));
        }
        let mut cursor = vec![0usize; self.numneigh.len()];
        for e in 0..state.nedge {
            let (a, b) = state.endpoints(e);
            let a = endpoint(e, a, self.numneigh.len())?;
            let listed = self.neighbors(a).get(cursor[a]).copied();
            if listed.map(i64::from) != Some(i64::from(b)) {
                return Err(HertzError::Format(format!(
                    "edge {e} ({a}, {b}) not found in slice of particle {a}"
                )));
            }
            cursor[a] += 1;
        }
        Ok(())
    }

    #[must_use]
    pub fn inum(&self) -> usize {
        self.ilist.len()
    }

    #[must_use]
    pub fn ilist(&self) -> &[usize] {
        &self.ilist
    }

    #[must_use]
    pub fn numneigh(&self) -> &[usize] {
        &self.numneigh
    }

    #[must_use]
    pub fn slot(&self, i: usize) -> Slot {
        self.slots[i]
    }

    #[must_use]
    pub fn neighbors(&self, i: usize) -> &[u32] {
        let s = self.slots[i];
        &self.pages[s.page][s.offset..s.offset + s.len]
    }

    #[must_use]
    pub fn shear(&self, i: usize) -> &[f64] {
        let s = self.slots[i];
        &self.dpages[s.page][s.offset * SHEAR_WIDTH..(s.offset + s.len) * SHEAR_WIDTH]
    }

    pub fn shear_mut(&mut self, i: usize) -> &mut [f64] {
        let s = self.slots[i];
        &mut self.dpages[s.page][s.offset * SHEAR_WIDTH..(s.offset + s.len) * SHEAR_WIDTH]
    }

    #[must_use]
    pub fn touch(&self, i: usize) -> &[i32] {
        let s = self.slots[i];
        &self.tpages[s.page][s.offset..s.offset + s.len]
    }

    /// Total listed pairs.
    #[must_use]
    pub fn pair_count(&self) -> usize {
        self.numneigh.iter().sum()
    }

    #[must_use]
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

fn endpoint(edge: usize, raw: i32, nnode: usize) -> Result<usize> {
    usize::try_from(raw)
        .ok()
        .filter(|&p| p < nnode)
        .ok_or(HertzError::Index {
            edge,
            endpoint: i64::from(raw),
            nnode,
        })
}
