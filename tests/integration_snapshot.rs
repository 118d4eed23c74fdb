// SPDX-License-Identifier: AGPL-3.0-only
#![allow(clippy::unwrap_used)]

//! Integration tests: step file decode/encode through the public API.
//!
//! Files on disk round-trip bit-for-bit, damaged files fail with the typed
//! error that names the problem, and nothing past decoding is attempted on
//! a truncated file.

use hertz_bench::neighbor::{NeighborList, PageConfig};
use hertz_bench::snapshot::{decode, encode, SimulationState, MAGIC_NUMBER};
use hertz_bench::{synth, HertzError};

#[test]
fn synthetic_step_round_trips_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("chain.step");
    let state = synth::chain(25, 3).unwrap();
    state.save(&path).unwrap();
    let loaded = SimulationState::load(&path).unwrap();
    assert_eq!(loaded, state);
    for (a, b) in loaded.expected_force.iter().zip(&state.expected_force) {
        assert_eq!(a.to_bits(), b.to_bits());
    }
}

#[test]
fn missing_file_is_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = SimulationState::load(dir.path().join("absent.step")).unwrap_err();
    assert!(matches!(err, HertzError::Io { .. }));
    assert_eq!(err.exit_code(), 2);
}

#[test]
fn wrong_magic_is_format_error() {
    let mut bytes = encode(&synth::chain(3, 1).unwrap()).unwrap();
    bytes[..4].copy_from_slice(&0xCAFE_BABE_u32.to_ne_bytes());
    let err = decode(&bytes).unwrap_err();
    assert!(matches!(err, HertzError::Format(_)));
    assert!(err.to_string().contains(&format!("{MAGIC_NUMBER:x}")));
}

#[test]
fn truncation_inside_edges_fails_before_build() {
    let state = synth::chain(6, 9).unwrap();
    let bytes = encode(&state).unwrap();
    // header, material tables, node arrays, nedge, then the first edge index
    let nt2 = state.materials.ntype * state.materials.ntype;
    let n = state.nnode;
    let header = 4 + 8 + 8 + 4;
    let tables = 4 * 8 * nt2;
    let nodes = 4 + (3 * 3 + 2) * 8 * n + 4 * n + 2 * 3 * 8 * n;
    let edge_start = header + tables + nodes + 4;
    let cut = edge_start + 4;
    match decode(&bytes[..cut]) {
        Err(HertzError::Truncated { field, .. }) => assert_eq!(field, "edge"),
        other => panic!("expected truncation in `edge`, got {other:?}"),
    }
}

#[test]
fn every_prefix_of_a_file_is_rejected() {
    let bytes = encode(&synth::chain(2, 5).unwrap()).unwrap();
    for len in [0, 3, 4, 19, 20, bytes.len() / 2, bytes.len() - 1] {
        let err = decode(&bytes[..len]).unwrap_err();
        assert!(matches!(err, HertzError::Truncated { .. }), "len {len}: {err}");
    }
    decode(&bytes).unwrap();
}

#[test]
fn out_of_range_edge_decodes_but_fails_to_build() {
    let mut state = synth::chain(4, 2).unwrap();
    state.edge[1] = 4;
    let decoded = decode(&encode(&state).unwrap()).unwrap();
    let err = NeighborList::build(&decoded, PageConfig::default()).unwrap_err();
    match err {
        HertzError::Index { edge, endpoint, nnode } => {
            assert_eq!((edge, endpoint, nnode), (0, 4, 4));
        }
        other => panic!("expected index error, got {other:?}"),
    }
}
