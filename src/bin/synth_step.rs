// SPDX-License-Identifier: AGPL-3.0-only

//! Write a synthetic step file whose expected arrays come from the serial
//! reference kernel, so `hertz_bench` can be run without a DEM data set.

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use log::info;

use hertz_bench::synth;

#[derive(Parser, Debug)]
#[command(name = "synth_step", version)]
#[command(about = "Generate a self-consistent synthetic step file")]
struct Args {
    /// Output step file
    out: PathBuf,

    /// Number of particles in the chain
    #[arg(long, default_value_t = 1000)]
    nnode: usize,

    /// LCG seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp(None)
        .init();
    let args = Args::parse();

    let state = synth::chain(args.nnode, args.seed)
        .with_context(|| format!("generating a chain of {} particles", args.nnode))?;
    state
        .save(&args.out)
        .with_context(|| format!("writing {}", args.out.display()))?;
    info!(
        "wrote {} (nnode={}, nedge={}, seed={})",
        args.out.display(),
        state.nnode,
        state.nedge,
        args.seed
    );
    Ok(())
}
