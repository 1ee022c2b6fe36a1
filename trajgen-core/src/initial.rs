use glam::DVec3;
use serde::{Deserialize, Serialize};

/// How a species' starting coordinates are drawn.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SamplingPolicy {
    /// Uniform over the whole confinement region.
    Domain,
    /// Uniform in a box of `fraction` times the confinement extent, centred
    /// on the coordinate origin.
    SubBox {
        #[serde(default = "default_fraction")]
        fraction: f64,
    },
    /// Jittered circle of radius `radius` in the z = 0 plane.
    Ring {
        #[serde(default = "default_ring_radius")]
        radius: f64,
        #[serde(default = "default_ring_noise")]
        noise: f64,
    },
}

fn default_fraction() -> f64 { 0.25 }
fn default_ring_radius() -> f64 { 10.0 }
fn default_ring_noise() -> f64 { 1.0 }

impl Default for SamplingPolicy {
    fn default() -> Self {
        SamplingPolicy::Domain
    }
}

impl SamplingPolicy {
    pub fn sub_box() -> Self {
        SamplingPolicy::SubBox { fraction: default_fraction() }
    }

    pub fn ring() -> Self {
        SamplingPolicy::Ring {
            radius: default_ring_radius(),
            noise: default_ring_noise(),
        }
    }
}

/// Starting coordinates per species, kept in insertion order so particle
/// indices are stable from seeding through post-processing.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InitialConditions {
    entries: Vec<(String, Vec<DVec3>)>,
}

impl InitialConditions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the positions for `species`, replacing any earlier entry.
    pub fn insert(&mut self, species: impl Into<String>, positions: Vec<DVec3>) {
        let species = species.into();
        match self.entries.iter_mut().find(|(name, _)| *name == species) {
            Some(entry) => entry.1 = positions,
            None => self.entries.push((species, positions)),
        }
    }

    pub fn get(&self, species: &str) -> Option<&[DVec3]> {
        self.entries
            .iter()
            .find(|(name, _)| name == species)
            .map(|(_, positions)| positions.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[DVec3])> {
        self.entries
            .iter()
            .map(|(name, positions)| (name.as_str(), positions.as_slice()))
    }

    pub fn total_particles(&self) -> usize {
        self.entries.iter().map(|(_, positions)| positions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.total_particles() == 0
    }
}
