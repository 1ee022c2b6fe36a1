//! Config in, finished replicates out.

use std::fs;
use std::io;
use std::path::PathBuf;

use glam::DVec3;
use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;
use trajgen_config::{Config, ConfigError, PotentialConfig};
use trajgen_core::{Geometry, Region, Scenario, ScenarioBuilder, ScenarioError};
use trajgen_output::{OutputError, TrajectoryHandle};
use trajgen_simulation::{
    sample_initial_conditions, BrownianDriver, RunRequest, SamplingError, SimulationError,
    Simulator, SpeciesPlan,
};

use crate::postprocess::{PostProcessOutcome, PostProcessor, RunInfo};

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Scenario error: {0}")]
    Scenario(#[from] ScenarioError),

    #[error("Sampling error: {0}")]
    Sampling(#[from] SamplingError),

    #[error("Simulation error: {0}")]
    Simulation(#[from] SimulationError),

    #[error("Output error: {0}")]
    Output(#[from] OutputError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("Failed to write run manifest: {0}")]
    Manifest(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Serialize)]
struct SpeciesSummary {
    name: String,
    diffusion_constant: f64,
    count: usize,
}

/// Everything needed to find and reproduce one replicate.
#[derive(Debug, Clone, Serialize)]
struct RunManifest {
    label: String,
    replicate: u32,
    seed: u64,
    species: Vec<SpeciesSummary>,
    dt: f64,
    n_steps: u64,
    stride: u64,
    frames: usize,
    trajectory: PathBuf,
    archive: PathBuf,
    plot: Option<PathBuf>,
    plot_svg: Option<PathBuf>,
    xyz: Option<PathBuf>,
    vmd_script: Option<PathBuf>,
}

#[derive(Debug)]
pub struct RunOutcome {
    pub label: String,
    pub seed: u64,
    pub trajectory: TrajectoryHandle,
    pub post: PostProcessOutcome,
    pub manifest: Option<PathBuf>,
}

fn vec3(v: [f64; 3]) -> DVec3 {
    DVec3::from_array(v)
}

pub fn build_scenario(config: &Config) -> Result<Scenario, ScenarioError> {
    let domain = &config.domain;
    let geometry = Geometry {
        box_size: vec3(domain.box_size),
        periodic: domain.periodic,
    };
    let confinement = Region::new(vec3(domain.origin), vec3(domain.extent));

    let mut builder = ScenarioBuilder::new(geometry, confinement);
    for species in &config.species {
        builder = builder.species(species.name.clone(), species.diffusion_constant);
    }
    builder = builder.confine_all(domain.box_force_constant);

    for potential in &config.potentials {
        builder = match potential {
            PotentialConfig::ExclusionSphere { species, force_constant, origin, radius } => {
                builder.exclusion_sphere(species.clone(), *force_constant, vec3(*origin), *radius)
            }
            PotentialConfig::SphericalBarrier { species, height, width, origin, radius } => {
                builder.spherical_barrier(species.clone(), *height, *width, vec3(*origin), *radius)
            }
        };
    }
    builder.build()
}

pub fn species_plans(config: &Config) -> Vec<SpeciesPlan> {
    config
        .species
        .iter()
        .map(|s| SpeciesPlan {
            name: s.name.clone(),
            count: s.count,
            policy: s.sampling,
        })
        .collect()
}

/// Runs replicate `replicate` (0-based) of `config` on `simulator` and
/// post-processes it.
pub fn make_sims<S: Simulator + ?Sized>(
    config: &Config,
    replicate: u32,
    seed: u64,
    simulator: &mut S,
) -> Result<RunOutcome, PipelineError> {
    config.validate()?;
    let label = config.label(replicate + 1);
    let output_dir = &config.output.directory;

    let scenario = build_scenario(config)?;
    let initial = sample_initial_conditions(&species_plans(config), &scenario.confinement, seed)?;
    fs::create_dir_all(output_dir)?;
    info!(
        "Replicate {} ('{}'): {} particles, seed {}",
        replicate + 1,
        label,
        initial.total_particles(),
        seed
    );

    simulator.configure(&scenario)?;
    simulator.seed(&initial)?;
    let request = RunRequest {
        dt: config.run.dt,
        n_steps: config.run.n_steps,
        stride: config.run.stride,
        output: output_dir.join(format!("{}.traj", label)),
    };
    let trajectory = simulator.run(&request)?;
    if trajectory.frames != request.expected_frames() {
        warn!(
            "Expected {} frames in {}, found {}",
            request.expected_frames(),
            trajectory.path.display(),
            trajectory.frames
        );
    }

    let run_info = RunInfo::new(config, &label);
    let post = PostProcessor::from_config(config).process(&*simulator, &trajectory, &run_info)?;

    let manifest = if config.output.manifest {
        let path = output_dir.join(format!("{}.json", label));
        let record = RunManifest {
            label: label.clone(),
            replicate: replicate + 1,
            seed,
            species: config
                .species
                .iter()
                .map(|s| SpeciesSummary {
                    name: s.name.clone(),
                    diffusion_constant: s.diffusion_constant,
                    count: s.count,
                })
                .collect(),
            dt: config.run.dt,
            n_steps: config.run.n_steps,
            stride: config.run.stride,
            frames: trajectory.frames,
            trajectory: trajectory.path.clone(),
            archive: post.archive_path.clone(),
            plot: post.plot.as_ref().map(|p| p.pdf.clone()),
            plot_svg: post.plot.as_ref().map(|p| p.svg.clone()),
            xyz: post.visualization.as_ref().map(|v| v.xyz.clone()),
            vmd_script: post.visualization.as_ref().map(|v| v.script.clone()),
        };
        fs::write(&path, serde_json::to_vec_pretty(&record)?)?;
        Some(path)
    } else {
        None
    };

    Ok(RunOutcome {
        label,
        seed,
        trajectory,
        post,
        manifest,
    })
}

/// Seed of replicate 0. Later replicates add their index.
pub fn base_seed(config: &Config) -> u64 {
    match config.run.seed {
        Some(seed) => seed,
        None => {
            let seed = rand::random();
            info!("No seed configured, drawn base seed {}", seed);
            seed
        }
    }
}

/// Runs every replicate with a fresh simulator from `factory`, which is
/// handed the replicate's seed. Stops at the first failure.
pub fn run_batch<S, F>(config: &Config, factory: F) -> Result<Vec<RunOutcome>, PipelineError>
where
    S: Simulator,
    F: Fn(u64) -> S + Sync,
{
    config.validate()?;
    let base = base_seed(config);
    let replicate = |index: u32| {
        let seed = base.wrapping_add(u64::from(index));
        let mut simulator = factory(seed);
        make_sims(config, index, seed, &mut simulator)
    };

    let outcomes = if config.run.parallel {
        info!("Running {} replicates in parallel", config.run.replicates);
        (0..config.run.replicates)
            .into_par_iter()
            .map(replicate)
            .collect::<Result<Vec<_>, _>>()?
    } else {
        (0..config.run.replicates)
            .map(replicate)
            .collect::<Result<Vec<_>, _>>()?
    };
    info!("Finished {} replicates", outcomes.len());
    Ok(outcomes)
}

/// `run_batch` on the bundled Brownian driver.
pub fn run_reference_batch(config: &Config) -> Result<Vec<RunOutcome>, PipelineError> {
    let kbt = config.run.kbt;
    run_batch(config, |seed| BrownianDriver::new(kbt, seed))
}
