//! The narrow interface every simulation engine is driven through.

use std::collections::BTreeMap;
use std::path::PathBuf;

use thiserror::Error;
use trajgen_core::{InitialConditions, Scenario, TimeSeries};
use trajgen_output::{export_xyz, OutputError, TrajectoryHandle, TrajectoryReader, VisualizationFiles};

#[derive(Error, Debug)]
pub enum SimulationError {
    #[error("Simulator is not ready: {0}")]
    NotReady(&'static str),

    #[error("Scenario has {0} species, at most 65535 are supported")]
    TooManySpecies(usize),

    #[error("Initial conditions reference unknown species '{0}'")]
    UnknownSpecies(String),

    #[error("Invalid run request: {0}")]
    InvalidRequest(String),

    #[error("Simulation diverged at step {step}: particle {particle} has a non-finite position")]
    Diverged { step: u64, particle: u64 },

    #[error(transparent)]
    Output(#[from] OutputError),
}

/// How long to run and where the trajectory goes.
#[derive(Debug, Clone, PartialEq)]
pub struct RunRequest {
    pub dt: f64,
    pub n_steps: u64,
    /// Record every `stride`-th step, starting with step 0.
    pub stride: u64,
    pub output: PathBuf,
}

impl RunRequest {
    pub fn validate(&self) -> Result<(), SimulationError> {
        if !(self.dt.is_finite() && self.dt > 0.0) {
            return Err(SimulationError::InvalidRequest(format!("timestep {} is not positive", self.dt)));
        }
        if self.stride == 0 {
            return Err(SimulationError::InvalidRequest("stride cannot be zero".to_string()));
        }
        Ok(())
    }

    /// Number of frames a complete run records.
    pub fn expected_frames(&self) -> usize {
        (self.n_steps / self.stride.max(1)) as usize + 1
    }
}

/// A simulation engine treated as a black box.
///
/// Call order is `configure`, `seed`, `run`. `run` blocks until the engine
/// finishes. It must remove any file already at `RunRequest::output` before
/// writing, so a rerun never appends to stale output.
pub trait Simulator {
    fn configure(&mut self, scenario: &Scenario) -> Result<(), SimulationError>;

    fn seed(&mut self, initial: &InitialConditions) -> Result<(), SimulationError>;

    fn run(&mut self, request: &RunRequest) -> Result<TrajectoryHandle, SimulationError>;

    /// Recorded positions of the listed species (all species when empty).
    fn read_positions(
        &self,
        handle: &TrajectoryHandle,
        filter: &[String],
    ) -> Result<TimeSeries, SimulationError> {
        let reader = TrajectoryReader::open(&handle.path)?;
        Ok(reader.read_positions(filter)?)
    }

    fn export_visualization(
        &self,
        handle: &TrajectoryHandle,
        radii: &BTreeMap<String, f64>,
        draw_box: bool,
    ) -> Result<VisualizationFiles, SimulationError> {
        let reader = TrajectoryReader::open(&handle.path)?;
        Ok(export_xyz(&reader, radii, draw_box)?)
    }
}
