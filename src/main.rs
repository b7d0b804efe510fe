//! Gravity Sandbox
//!
//! Headless driver for planets and particles: runs the symplectic gravity
//! step and the BVH broad-phase every tick, on the CPU or the GPU.

mod driver;
mod scene;
mod tree_builder;

use anyhow::Context;
use clap::Parser;
use driver::{run_cpu, run_gpu, RunOptions, RunSummary};
use glam::{DVec2, Vec2};
use particle_physics::{Precision, SimulationConfig};
use particle_simulation::{GpuContext, SimulationError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use scene::{spawn_scene, SceneOptions};

#[derive(Parser, Debug)]
#[command(
    name = "gravity-sandbox",
    about = "Planets, particles, a 4th-order symplectic step and a BVH broad-phase"
)]
struct Args {
    /// Number of ticks to simulate
    #[arg(long, default_value_t = 600)]
    ticks: u64,

    /// Log progress every N ticks (0 = only the summary)
    #[arg(long, default_value_t = 60)]
    report_every: u64,

    #[arg(long, default_value_t = 2)]
    planets: usize,

    #[arg(long, default_value_t = 2000)]
    particles: usize,

    /// Scene seed (random when omitted)
    #[arg(long)]
    seed: Option<u64>,

    /// Timestep in seconds
    #[arg(long)]
    dt: Option<f64>,

    /// Vertical component of the uniform field
    #[arg(long, allow_negative_numbers = true)]
    gravity_y: Option<f64>,

    /// Candidate slots per object
    #[arg(long)]
    max_candidates: Option<u32>,

    /// Integrate in double precision (CPU only)
    #[arg(long, conflicts_with = "gpu")]
    double: bool,

    /// Run both kernels on the GPU (falls back to the CPU without an adapter)
    #[arg(long)]
    gpu: bool,
}

impl Args {
    fn config(&self) -> SimulationConfig {
        let defaults = SimulationConfig::default();
        SimulationConfig {
            dt: self.dt.unwrap_or(defaults.dt),
            global_gravity: match self.gravity_y {
                Some(y) => [defaults.global_gravity[0], y],
                None => defaults.global_gravity,
            },
            max_candidates: self.max_candidates.unwrap_or(defaults.max_candidates),
            precision: if self.double {
                Precision::Double
            } else {
                Precision::Single
            },
            ..defaults
        }
    }

    fn scene(&self, config: &SimulationConfig) -> SceneOptions {
        SceneOptions {
            planets: self.planets,
            particles: self.particles,
            gravitational_constant: config.gravitational_constant,
            ..Default::default()
        }
    }
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = args.config();
    config.validate().context("invalid simulation parameters")?;

    let seed = args.seed.unwrap_or_else(rand::random);
    log::info!("Scene seed: {seed}");
    let mut rng = StdRng::seed_from_u64(seed);
    let scene = args.scene(&config);
    let options = RunOptions {
        ticks: args.ticks,
        report_every: args.report_every,
    };

    let summary = if args.gpu {
        run_on_gpu(&config, &scene, &mut rng, &options)?
    } else if config.precision == Precision::Double {
        let objects = spawn_scene::<DVec2>(&scene, &mut rng)?;
        run_cpu(objects, &config, &options)?
    } else {
        let objects = spawn_scene::<Vec2>(&scene, &mut rng)?;
        run_cpu(objects, &config, &options)?
    };

    log::info!(
        "✓ {} ticks, {} candidate pairs, {} incomplete broad-phase ticks, max energy drift {:.3e}",
        summary.ticks,
        summary.total_pairs,
        summary.incomplete_ticks,
        summary.max_energy_drift
    );
    Ok(())
}

fn run_on_gpu(
    config: &SimulationConfig,
    scene: &SceneOptions,
    rng: &mut StdRng,
    options: &RunOptions,
) -> anyhow::Result<RunSummary> {
    let objects = spawn_scene::<Vec2>(scene, rng)?;
    match GpuContext::new_blocking() {
        Ok(context) => Ok(run_gpu(context, objects, config, options)?),
        Err(SimulationError::NoAdapter(err)) => {
            log::warn!("No GPU adapter ({err}), running on the CPU instead");
            Ok(run_cpu(objects, config, options)?)
        }
        Err(err) => Err(err).context("failed to initialise the GPU"),
    }
}
