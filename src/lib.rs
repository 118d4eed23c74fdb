// SPDX-License-Identifier: AGPL-3.0-only

//! hertz-bench: contact-force kernel micro-benchmark
//!
//! Loads a binary step snapshot of a granular (DEM) simulation, builds a
//! paged half neighbor list over the contact edges, drives a Hertz/history
//! contact kernel for a fixed number of iterations while timing one-time,
//! neighbor-list refresh, and per-iteration costs, then validates forces,
//! torques, and shear history against the expected arrays in the snapshot.
//!
//! ## Modules
//!   - `snapshot`: binary step-file decoder/encoder (`SimulationState`)
//!   - `neighbor`: paged neighbor list with shear backup/restore
//!   - `bench`: timers, timing context, iteration driver, reports
//!   - `validation`: percentage-error comparison against expected results
//!   - `kernel`: kernel trait plus serial and rayon CPU reference kernels
//!   - `config`: run configuration shared by the binaries
//!   - `synth`: reproducible synthetic step files
//!
//! ## Binaries
//!   - `hertz_bench`: run a kernel against a step file
//!   - `synth_step`: write a synthetic, self-consistent step file

pub mod bench;
pub mod config;
pub mod error;
pub mod kernel;
pub mod neighbor;
pub mod snapshot;
pub mod synth;
pub mod tolerances;
pub mod validation;

pub use error::HertzError;

/// Crate-wide result alias.
pub type Result<T> = std::result::Result<T, HertzError>;
