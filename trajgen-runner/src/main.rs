use clap::{Parser, ValueEnum};
use log::{error, info};
use std::error::Error;
use std::path::PathBuf;
use std::process;
use trajgen_config::{load_config, Config};
use trajgen_runner::run_reference_batch;

#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
enum Preset {
    /// One species, 100 particles
    Single,
    /// Brownian, ring-confined, immobile and directed species
    Multi,
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Generate reaction-diffusion trajectories", long_about = None)]
struct Args {
    /// Path to a JSON or TOML configuration file
    #[arg(short, long, conflicts_with = "preset")]
    config: Option<PathBuf>,

    /// Built-in scenario to run when no config file is given
    #[arg(short, long, value_enum, default_value_t = Preset::Single)]
    preset: Preset,

    /// Number of replicates
    #[arg(short, long)]
    replicates: Option<u32>,

    /// Base seed; replicate i uses seed + i
    #[arg(short, long)]
    seed: Option<u64>,

    /// Directory for trajectories, plots and archives
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Run replicates on the thread pool
    #[arg(long)]
    parallel: bool,
}

fn resolve_config(args: &Args) -> Result<Config, Box<dyn Error>> {
    let mut config = match &args.config {
        Some(path) => {
            info!("Using configuration from {}", path.display());
            load_config(path)?
        }
        None => {
            info!("Using the {:?} preset", args.preset);
            match args.preset {
                Preset::Single => Config::single_species(),
                Preset::Multi => Config::multi_species(),
            }
        }
    };

    if let Some(replicates) = args.replicates {
        config.run.replicates = replicates;
    }
    if let Some(seed) = args.seed {
        config.run.seed = Some(seed);
    }
    if let Some(dir) = &args.output_dir {
        config.output.directory = dir.clone();
    }
    if args.parallel {
        config.run.parallel = true;
    }
    config.validate()?;
    Ok(config)
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let config = match resolve_config(&args) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            process::exit(1);
        }
    };

    match run_reference_batch(&config) {
        Ok(outcomes) => {
            for outcome in &outcomes {
                info!(
                    "{}: {} frames, archive {}",
                    outcome.label,
                    outcome.trajectory.frames,
                    outcome.post.archive_path.display()
                );
            }
        }
        Err(e) => {
            error!("Run failed: {}", e);
            let mut source = e.source();
            while let Some(cause) = source {
                error!("  caused by: {}", cause);
                source = cause.source();
            }
            process::exit(1);
        }
    }
}
