//! Core data model for reaction-diffusion scenarios and the trajectories
//! produced from them.
//!
//! Nothing in this crate advances particles. It describes what a simulation
//! engine is asked to do (`Scenario`, `InitialConditions`) and what it hands
//! back (`TimeSeries`).

use glam::DVec3;
use serde::{Deserialize, Serialize};

pub mod initial;
pub mod potential;
pub mod scenario;
pub mod series;

pub use initial::{InitialConditions, SamplingPolicy};
pub use potential::{Potential, PotentialBinding};
pub use scenario::{Scenario, ScenarioBuilder, ScenarioError};
pub use series::{ParticleRecord, TimeSeries};

/// A named particle category with its own diffusion coefficient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Species {
    pub name: String,
    pub diffusion_constant: f64,
}

/// Axis-aligned box given by its lower corner and edge lengths.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Region {
    pub origin: DVec3,
    pub extent: DVec3,
}

impl Region {
    pub fn new(origin: DVec3, extent: DVec3) -> Self {
        Self { origin, extent }
    }

    /// Upper corner of the box.
    pub fn max(&self) -> DVec3 {
        self.origin + self.extent
    }

    /// Inclusive containment test.
    pub fn contains(&self, p: DVec3) -> bool {
        let max = self.max();
        p.cmpge(self.origin).all() && p.cmple(max).all()
    }
}

/// Confinement region used by both reference scenarios.
impl Default for Region {
    fn default() -> Self {
        Self {
            origin: DVec3::new(-23.0, -23.0, -0.001),
            extent: DVec3::new(46.0, 46.0, 0.002),
        }
    }
}

/// Simulation box, centred on the coordinate origin.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Geometry {
    pub box_size: DVec3,
    pub periodic: [bool; 3],
}

impl Geometry {
    pub fn half_extent(&self) -> DVec3 {
        self.box_size * 0.5
    }
}

// Quasi-2D 50 x 50 x 5 box, closed on every axis.
impl Default for Geometry {
    fn default() -> Self {
        Self {
            box_size: DVec3::new(50.0, 50.0, 5.0),
            periodic: [false, false, false],
        }
    }
}
