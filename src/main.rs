use std::io;

use anyhow::Context;
use runner::Runner;
use tracing_subscriber::FmtSubscriber;

mod hydro_data;
mod map_data;
mod merge;
mod network;
mod osm_data;
mod runner;
mod tagging;
#[cfg(test)]
mod test_utils;

fn main() -> anyhow::Result<()> {
    let runner = Runner::init().context("invalid arguments")?;

    let subscriber = FmtSubscriber::builder()
        .with_writer(io::stderr)
        .with_file(true)
        .with_line_number(true)
        .with_max_level(runner.log_level())
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    runner.run().context("bdhydro-osm failed")?;
    Ok(())
}
