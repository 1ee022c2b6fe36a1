//! Turns a finished trajectory into the run's deliverables: the VMD export,
//! the trajectory plot and the `{X, Y}` archive.

use std::collections::BTreeMap;
use std::path::PathBuf;

use log::{debug, info};
use trajgen_config::{ArchiveFormat, Config};
use trajgen_core::TimeSeries;
use trajgen_output::{
    plot_trajectories, svg_to_pdf, BinarySerializer, JsonSerializer, PickleSerializer, PositionArchive,
    Serializer, TrajectoryHandle, VisualizationFiles,
};
use trajgen_simulation::{SimulationError, Simulator};

/// What a single replicate is, as far as post-processing cares.
#[derive(Debug, Clone, PartialEq)]
pub struct RunInfo {
    pub label: String,
    pub species: Vec<String>,
    pub diffusion_constants: Vec<f64>,
    pub dt: f64,
    pub n_steps: u64,
    pub interaction_distance: f64,
}

impl RunInfo {
    pub fn new(config: &Config, label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            species: config.species_names(),
            diffusion_constants: config.species.iter().map(|s| s.diffusion_constant).collect(),
            dt: config.run.dt,
            n_steps: config.run.n_steps,
            interaction_distance: config.run.interaction_distance,
        }
    }

    pub fn plot_title(&self) -> String {
        format!(
            "Simulated Trajectories| particle_names {:?} | diff Coeff {:?} | dt {:.6} | n_steps {}",
            self.species, self.diffusion_constants, self.dt, self.n_steps
        )
    }
}

/// `True_Trajecs_<label>.pdf` and the SVG it was rendered from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlotFiles {
    pub pdf: PathBuf,
    pub svg: PathBuf,
}

#[derive(Debug)]
pub struct PostProcessOutcome {
    pub visualization: Option<VisualizationFiles>,
    pub plot: Option<PlotFiles>,
    pub archive_path: PathBuf,
    pub series: TimeSeries,
    pub archive: PositionArchive,
}

pub fn create_serializer(format: ArchiveFormat) -> Box<dyn Serializer> {
    match format {
        ArchiveFormat::Pickle => Box::new(PickleSerializer),
        ArchiveFormat::Json => Box::new(JsonSerializer),
        ArchiveFormat::Binary => Box::new(BinarySerializer),
    }
}

pub struct PostProcessor {
    output_dir: PathBuf,
    serializer: Box<dyn Serializer>,
    plot: bool,
    visualization: bool,
}

impl PostProcessor {
    pub fn new(output_dir: impl Into<PathBuf>, serializer: Box<dyn Serializer>) -> Self {
        Self {
            output_dir: output_dir.into(),
            serializer,
            plot: true,
            visualization: true,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self {
            output_dir: config.output.directory.clone(),
            serializer: create_serializer(config.output.archive_format),
            plot: config.output.plot,
            visualization: config.output.visualization,
        }
    }

    pub fn plot_paths(&self, label: &str) -> PlotFiles {
        let stem = format!("True_Trajecs_{}", label);
        PlotFiles {
            pdf: self.output_dir.join(format!("{}.pdf", stem)),
            svg: self.output_dir.join(format!("{}.svg", stem)),
        }
    }

    /// Runs every post-processing step in order. The first failure aborts
    /// the rest.
    pub fn process<S: Simulator + ?Sized>(
        &self,
        simulator: &S,
        handle: &TrajectoryHandle,
        run: &RunInfo,
    ) -> Result<PostProcessOutcome, SimulationError> {
        let visualization = if self.visualization {
            let radius = run.interaction_distance / 2.0;
            let radii: BTreeMap<String, f64> =
                run.species.iter().map(|name| (name.clone(), radius)).collect();
            Some(simulator.export_visualization(handle, &radii, true)?)
        } else {
            None
        };

        let series = simulator.read_positions(handle, &run.species)?;
        debug!(
            "Read {} frames of {} particles for '{}'",
            series.len(),
            series.particle_count(),
            run.label
        );

        let plot = if self.plot {
            let files = self.plot_paths(&run.label);
            plot_trajectories(&files.svg, &run.plot_title(), &series)?;
            svg_to_pdf(&files.svg, &files.pdf)?;
            info!("Saved trajectory plot to {}", files.pdf.display());
            Some(files)
        } else {
            None
        };

        let archive = PositionArchive::from_series(&series);
        let archive_path = self
            .serializer
            .write_archive(&archive, &self.output_dir.join(&run.label))?;

        Ok(PostProcessOutcome {
            visualization,
            plot,
            archive_path,
            series,
            archive,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;
    use trajgen_core::{Region, SamplingPolicy, ScenarioBuilder};
    use trajgen_simulation::{
        sample_initial_conditions, BrownianDriver, RunRequest, SpeciesPlan, DEFAULT_KBT,
    };

    fn finished_run(dir: &std::path::Path) -> (BrownianDriver, TrajectoryHandle) {
        let scenario = ScenarioBuilder::default()
            .species("A", 0.5)
            .species("B", 0.1)
            .confine_all(50.0)
            .build()
            .unwrap();
        let plans = vec![
            SpeciesPlan { name: "A".into(), count: 4, policy: SamplingPolicy::Domain },
            SpeciesPlan { name: "B".into(), count: 2, policy: SamplingPolicy::Domain },
        ];
        let initial = sample_initial_conditions(&plans, &Region::default(), 21).unwrap();

        let mut driver = BrownianDriver::new(DEFAULT_KBT, 21);
        driver.configure(&scenario).unwrap();
        driver.seed(&initial).unwrap();
        let handle = driver
            .run(&RunRequest { dt: 0.01, n_steps: 30, stride: 1, output: dir.join("run.traj") })
            .unwrap();
        (driver, handle)
    }

    fn info(label: &str, species: &[&str]) -> RunInfo {
        RunInfo {
            label: label.to_string(),
            species: species.iter().map(|s| s.to_string()).collect(),
            diffusion_constants: vec![0.5; species.len()],
            dt: 0.01,
            n_steps: 30,
            interaction_distance: 1.0,
        }
    }

    #[test]
    fn writes_every_artifact() {
        let dir = tempdir().unwrap();
        let (driver, handle) = finished_run(dir.path());
        let processor = PostProcessor::new(dir.path(), Box::new(PickleSerializer));

        let outcome = processor.process(&driver, &handle, &info("Sims_run_1_", &["A", "B"])).unwrap();

        let files = outcome.visualization.unwrap();
        assert!(files.xyz.exists());
        assert!(std::fs::read_to_string(&files.script).unwrap().contains("mol representation VDW 0.500000 16.0"));
        let plot = outcome.plot.unwrap();
        assert_eq!(plot.pdf, dir.path().join("True_Trajecs_Sims_run_1_.pdf"));
        assert!(std::fs::read(&plot.pdf).unwrap().starts_with(b"%PDF"));
        assert!(std::fs::metadata(&plot.svg).unwrap().len() > 0);
        assert_eq!(outcome.archive_path, dir.path().join("Sims_run_1_.pck"));

        assert_eq!(outcome.archive.frames(), 31);
        assert!(outcome.archive.x.iter().all(|row| row.len() == 6));
        let reloaded = PickleSerializer.read_archive(&outcome.archive_path).unwrap();
        assert_eq!(reloaded, outcome.archive);
    }

    #[test]
    fn species_filter_restricts_archive() {
        let dir = tempdir().unwrap();
        let (driver, handle) = finished_run(dir.path());
        let mut processor = PostProcessor::new(dir.path(), Box::new(JsonSerializer));
        processor.plot = false;
        processor.visualization = false;

        let outcome = processor.process(&driver, &handle, &info("only_b", &["B"])).unwrap();
        assert!(outcome.plot.is_none());
        assert!(outcome.visualization.is_none());
        assert!(!processor.plot_paths("only_b").pdf.exists());
        assert_eq!(outcome.series.particle_count(), 2);
        assert!(outcome.archive.y.iter().all(|row| row.len() == 2));
        assert_eq!(outcome.archive_path.extension().unwrap(), "json");
    }

    #[test]
    fn missing_trajectory_is_fatal() {
        let dir = tempdir().unwrap();
        let (driver, mut handle) = finished_run(dir.path());
        handle.path = dir.path().join("gone.traj");
        let processor = PostProcessor::new(dir.path(), Box::new(PickleSerializer));
        let result = processor.process(&driver, &handle, &info("gone", &["A"]));
        assert!(matches!(result, Err(SimulationError::Output(_))));
        assert!(!dir.path().join("gone.pck").exists());
    }

    #[test]
    fn title_lists_species_and_run_parameters() {
        let mut run = info("x", &["Brown", "Confined"]);
        run.n_steps = 999;
        assert_eq!(
            run.plot_title(),
            "Simulated Trajectories| particle_names [\"Brown\", \"Confined\"] | diff Coeff [0.5, 0.5] | dt 0.010000 | n_steps 999"
        );
    }
}
