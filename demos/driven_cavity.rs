//! Lid-driven cavity on the unit square.
//!
//! Usage: `cargo run --release --example driven_cavity [config.json]`
//!
//! After the run the minimum of the stream function, the usual benchmark figure for this
//! problem, is printed.
//!
//! Without a configuration file the preset parameters are used and the trajectory is written
//! to `data/driven_cavity`.
use fenris_flow::config::ExperimentConfig;
use fenris_flow::experiments::{driven_cavity, driven_cavity_config};
use fenris_flow::postprocess::streamfunction;
use std::path::PathBuf;

fn main() -> eyre::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => {
            let mut config = driven_cavity_config();
            config.output.directory = Some(PathBuf::from("data/driven_cavity"));
            config
        }
    };

    let mut simulation = driven_cavity(&config)?.build()?;
    let summary = simulation.run()?;
    println!(
        "{}: {} steps, t = {}, max |u| = {:.6}",
        config.name, summary.num_steps, summary.final_time, summary.max_velocity
    );

    let psi = streamfunction(simulation.domain(), simulation.state())?;
    println!("min of stream function = {:.6}", psi.min());
    Ok(())
}
