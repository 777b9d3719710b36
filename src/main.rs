//! robosim command line entry point.
//!
//! Loads a world file, runs it for a number of ticks and optionally saves the
//! final scene, lists the exported interfaces or prints a JSON pose report.
//!
//! # Running
//!
//! ```sh
//! cargo run --release -- worlds/pioneer.world --ticks 1000 --report
//! ```
//!
//! Runtime settings (step time, gravity, worker pool) come from an INI file,
//! `./robosim.ini` unless `--config` says otherwise. A missing file keeps the
//! defaults.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use log::{info, warn};
use serde::Serialize;

use robosim::physics::iterative::IterativeEngine;
use robosim::resources::simconfig::SimConfig;
use robosim::simulation::Simulation;

/// robosim multi-robot simulator
#[derive(Parser)]
#[command(version, about = "Runs a robosim world file headless.")]
struct Cli {
    /// World file to load.
    world: PathBuf,

    /// Runtime configuration file.
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Number of ticks to simulate.
    #[arg(long, default_value_t = 100)]
    ticks: u64,

    /// Write the final scene to this path.
    #[arg(long, value_name = "PATH")]
    save: Option<PathBuf>,

    /// Print every exported interface name.
    #[arg(long)]
    interfaces: bool,

    /// Print a JSON report of the final model poses.
    #[arg(long)]
    report: bool,
}

#[derive(Serialize)]
struct ModelReport {
    name: String,
    position: [f64; 3],
    /// w x y z
    orientation: [f64; 4],
}

#[derive(Serialize)]
struct Report {
    sim_time: f64,
    iterations: u64,
    models: Vec<ModelReport>,
}

fn report(sim: &Simulation) -> Report {
    let time = sim.sim_time();
    let models = sim
        .model_names()
        .into_iter()
        .filter_map(|name| {
            let pose = sim.model_pose(&name)?;
            Some(ModelReport {
                name,
                position: pose.pos.to_array(),
                orientation: [pose.rot.w, pose.rot.x, pose.rot.y, pose.rot.z],
            })
        })
        .collect();
    Report {
        sim_time: time.elapsed,
        iterations: time.iterations,
        models,
    }
}

fn run(cli: Cli) -> robosim::error::Result<()> {
    let mut config = match &cli.config {
        Some(path) => SimConfig::with_path(path),
        None => SimConfig::new(),
    };
    if let Err(e) = config.load_from_file() {
        warn!("Using default configuration: {}", e);
    }

    let mut sim = Simulation::with_config(Arc::new(IterativeEngine::new()), config);
    let loaded = sim.load_world_file(&cli.world)?;
    info!("Loaded {} root models", loaded.len());

    sim.init();
    let mut published = 0;
    for _ in 0..cli.ticks {
        sim.step();
        published += sim.drain_interfaces().len();
    }
    info!("Ran {} ticks, {} interface samples published", cli.ticks, published);

    if cli.interfaces {
        for name in sim.interface_names() {
            println!("{name}");
        }
    }
    if cli.report {
        match serde_json::to_string_pretty(&report(&sim)) {
            Ok(json) => println!("{json}"),
            Err(e) => warn!("Failed to encode report: {}", e),
        }
    }
    if let Some(path) = &cli.save {
        sim.save_to_file(path)?;
    }
    sim.fini();
    Ok(())
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}
