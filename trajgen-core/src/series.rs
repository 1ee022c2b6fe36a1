//! Position time series as read back from a finished run.

use glam::DVec3;
use serde::{Deserialize, Serialize};

/// One particle at one recorded step. `species` indexes the owning
/// series' species table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ParticleRecord {
    pub id: u64,
    pub species: u16,
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl ParticleRecord {
    pub fn new(id: u64, species: u16, position: DVec3) -> Self {
        Self {
            id,
            species,
            x: position.x,
            y: position.y,
            z: position.z,
        }
    }

    pub fn position(&self) -> DVec3 {
        DVec3::new(self.x, self.y, self.z)
    }
}

/// `frames[t][i]` is particle `i` at step `steps[t]`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TimeSeries {
    pub steps: Vec<u64>,
    pub dt: f64,
    pub species: Vec<String>,
    pub frames: Vec<Vec<ParticleRecord>>,
}

impl TimeSeries {
    /// Simulation time of every recorded frame.
    pub fn times(&self) -> Vec<f64> {
        self.steps.iter().map(|&step| step as f64 * self.dt).collect()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Particle count of the first frame. Frames never change size.
    pub fn particle_count(&self) -> usize {
        self.frames.first().map_or(0, Vec::len)
    }

    /// Path of particle `index` through every frame, projected on x/y.
    pub fn trace_xy(&self, index: usize) -> Vec<(f64, f64)> {
        self.frames
            .iter()
            .filter_map(|frame| frame.get(index))
            .map(|record| (record.x, record.y))
            .collect()
    }
}
