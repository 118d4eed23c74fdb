// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::unwrap_used)]

//! Integration tests: paged neighbor list over decoded step files.

use hertz_bench::neighbor::{NeighborList, PageConfig};
use hertz_bench::snapshot::{Material, MaterialTables, SimulationState};
use hertz_bench::{synth, HertzError};

fn star(nnode: usize) -> SimulationState {
    let mat = Material {
        yeff: 1.0,
        geff: 1.0,
        betaeff: 0.0,
        coeff_frict: 0.0,
    };
    let mut s = SimulationState::with_particles(1e-5, 1.0, MaterialTables::uniform(1, mat), nnode);
    for b in 1..nnode {
        s.add_edge(0, b as i32, [b as f64, 0.0, 0.0]);
    }
    s
}

#[test]
fn list_reproduces_synthetic_edges() {
    let state = synth::chain(200, 11).unwrap();
    let list = NeighborList::build(&state, PageConfig::default()).unwrap();
    list.verify_against(&state).unwrap();
    assert_eq!(list.pair_count(), state.nedge);
    assert_eq!(list.page_count(), 1);
    assert_eq!(list.gather_shear(), state.shear);
    assert!(list.touch(0).iter().all(|&t| t == 1));
}

#[test]
fn small_pages_spread_particles_without_straddling() {
    let state = synth::chain(200, 11).unwrap();
    let config = PageConfig {
        pgsize: 16,
        oneatom: 4,
        ..PageConfig::default()
    };
    let list = NeighborList::build(&state, config).unwrap();
    list.verify_against(&state).unwrap();
    assert!(list.page_count() > 1);
    for &i in list.ilist() {
        let slot = list.slot(i);
        assert!(slot.offset + slot.len <= config.pgsize);
    }
}

#[test]
fn page_budget_exhaustion_is_capacity_error() {
    let state = synth::chain(200, 11).unwrap();
    let config = PageConfig {
        pgsize: 16,
        oneatom: 4,
        max_pages: 2,
        ..PageConfig::default()
    };
    let err = NeighborList::build(&state, config).unwrap_err();
    assert!(matches!(err, HertzError::CapacityExceeded(_)));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn hub_particle_over_oneatom_is_capacity_error() {
    let state = star(10);
    let config = PageConfig {
        pgsize: 64,
        oneatom: 8,
        ..PageConfig::default()
    };
    assert!(matches!(
        NeighborList::build(&state, config),
        Err(HertzError::CapacityExceeded(_))
    ));
    let ok = PageConfig {
        oneatom: 9,
        ..config
    };
    let list = NeighborList::build(&state, ok).unwrap();
    assert_eq!(list.inum(), 1);
    assert_eq!(list.numneigh()[0], 9);
}

#[test]
fn restore_undoes_kernel_writes_every_time() {
    let state = star(5);
    let mut list = NeighborList::build(&state, PageConfig::default()).unwrap();
    let original = list.gather_shear();
    for round in 0..3 {
        for row in list.copy_into() {
            row.shear.fill(f64::from(round) + 0.5);
            row.touch.fill(0);
        }
        assert_ne!(list.gather_shear(), original);
        list.restore();
        assert_eq!(list.gather_shear(), original);
        assert!(list.touch(0).iter().all(|&t| t == 1));
    }
}

#[test]
fn empty_edge_set_builds_one_empty_page() {
    let state = star(1);
    let list = NeighborList::build(&state, PageConfig::default()).unwrap();
    assert_eq!(list.inum(), 0);
    assert_eq!(list.pair_count(), 0);
    assert_eq!(list.page_count(), 1);
    assert!(list.gather_shear().is_empty());
}
