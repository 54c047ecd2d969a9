//! Channel flow with an oscillating upper wall on a moving mesh.
//!
//! Usage: `cargo run --release --example ale_channel [config.json]`
//!
//! Without a configuration file the preset parameters are used and the trajectory is written
//! to `data/ale_channel`.
use fenris_flow::config::ExperimentConfig;
use fenris_flow::experiments::{ale_channel, ale_channel_config};
use std::path::PathBuf;

fn main() -> eyre::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => ExperimentConfig::from_json_file(path)?,
        None => {
            let mut config = ale_channel_config();
            config.output.directory = Some(PathBuf::from("data/ale_channel"));
            config.output.every = 5;
            config
        }
    };

    let mut simulation = ale_channel(&config)?.build()?;
    let summary = simulation.run()?;
    println!(
        "{}: {} steps, t = {}, max |u| = {:.6}, max |X| = {:.6}",
        config.name,
        summary.num_steps,
        summary.final_time,
        summary.max_velocity,
        summary.max_displacement.unwrap_or(0.0)
    );
    Ok(())
}
