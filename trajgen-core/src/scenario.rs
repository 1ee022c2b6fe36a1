//! Scenario assembly and validation.

use glam::DVec3;
use log::debug;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{Geometry, Potential, PotentialBinding, Region, Species};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ScenarioError {
    #[error("Scenario has no species")]
    EmptyScenario,

    #[error("Species '{0}' registered more than once")]
    DuplicateSpecies(String),

    #[error("Potential '{potential}' references unknown species '{species}'")]
    UnknownSpecies { species: String, potential: &'static str },

    #[error("Diffusion constant of '{species}' must be finite and non-negative, got {value}")]
    InvalidDiffusion { species: String, value: f64 },

    #[error("{what} must be finite and positive, got {value}")]
    NonPositive { what: String, value: f64 },

    #[error("{what} must be finite and non-negative, got {value}")]
    NegativeForceConstant { what: String, value: f64 },

    #[error("{what} must be finite, got {value}")]
    NonFinite { what: String, value: f64 },
}

/// A fully validated simulation scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    pub geometry: Geometry,
    pub confinement: Region,
    pub species: Vec<Species>,
    pub potentials: Vec<PotentialBinding>,
}

impl Scenario {
    pub fn species_index(&self, name: &str) -> Option<usize> {
        self.species.iter().position(|s| s.name == name)
    }

    pub fn species_names(&self) -> Vec<String> {
        self.species.iter().map(|s| s.name.clone()).collect()
    }

    /// Potentials bound to the given species, in registration order.
    pub fn potentials_for<'a>(&'a self, species: &'a str) -> impl Iterator<Item = &'a Potential> + 'a {
        self.potentials
            .iter()
            .filter(move |binding| binding.species == species)
            .map(|binding| &binding.potential)
    }
}

/// Collects species and potentials, then validates them all at once in
/// [`ScenarioBuilder::build`].
#[derive(Debug, Clone)]
pub struct ScenarioBuilder {
    geometry: Geometry,
    confinement: Region,
    species: Vec<Species>,
    potentials: Vec<PotentialBinding>,
    confine_all: Option<f64>,
}

impl Default for ScenarioBuilder {
    fn default() -> Self {
        Self::new(Geometry::default(), Region::default())
    }
}

impl ScenarioBuilder {
    pub fn new(geometry: Geometry, confinement: Region) -> Self {
        Self {
            geometry,
            confinement,
            species: Vec::new(),
            potentials: Vec::new(),
            confine_all: None,
        }
    }

    pub fn species(mut self, name: impl Into<String>, diffusion_constant: f64) -> Self {
        self.species.push(Species {
            name: name.into(),
            diffusion_constant,
        });
        self
    }

    /// Confines every species, including ones registered after this call,
    /// to the confinement region.
    pub fn confine_all(mut self, force_constant: f64) -> Self {
        self.confine_all = Some(force_constant);
        self
    }

    pub fn exclusion_sphere(
        mut self,
        species: impl Into<String>,
        force_constant: f64,
        origin: DVec3,
        radius: f64,
    ) -> Self {
        self.potentials.push(PotentialBinding {
            species: species.into(),
            potential: Potential::ExclusionSphere {
                origin,
                radius,
                force_constant,
            },
        });
        self
    }

    pub fn spherical_barrier(
        mut self,
        species: impl Into<String>,
        height: f64,
        width: f64,
        origin: DVec3,
        radius: f64,
    ) -> Self {
        self.potentials.push(PotentialBinding {
            species: species.into(),
            potential: Potential::SphericalBarrier {
                origin,
                radius,
                height,
                width,
            },
        });
        self
    }

    pub fn build(self) -> Result<Scenario, ScenarioError> {
        if self.species.is_empty() {
            return Err(ScenarioError::EmptyScenario);
        }

        for (i, axis) in ["x", "y", "z"].iter().enumerate() {
            positive(&format!("Box size along {axis}"), self.geometry.box_size[i])?;
            positive(&format!("Confinement extent along {axis}"), self.confinement.extent[i])?;
        }
        finite_origin("Confinement origin", self.confinement.origin)?;

        for (i, species) in self.species.iter().enumerate() {
            if self.species[..i].iter().any(|s| s.name == species.name) {
                return Err(ScenarioError::DuplicateSpecies(species.name.clone()));
            }
            let d = species.diffusion_constant;
            if !d.is_finite() || d < 0.0 {
                return Err(ScenarioError::InvalidDiffusion {
                    species: species.name.clone(),
                    value: d,
                });
            }
        }

        let mut potentials = Vec::with_capacity(self.potentials.len() + self.species.len());
        if let Some(force_constant) = self.confine_all {
            for species in &self.species {
                potentials.push(PotentialBinding {
                    species: species.name.clone(),
                    potential: Potential::BoxConfinement {
                        region: self.confinement,
                        force_constant,
                    },
                });
            }
        }
        potentials.extend(self.potentials);

        for binding in &potentials {
            if !self.species.iter().any(|s| s.name == binding.species) {
                return Err(ScenarioError::UnknownSpecies {
                    species: binding.species.clone(),
                    potential: binding.potential.kind(),
                });
            }
            validate_potential(&binding.potential)?;
            debug!("Attached {} to species '{}'", binding.potential.kind(), binding.species);
        }

        Ok(Scenario {
            geometry: self.geometry,
            confinement: self.confinement,
            species: self.species,
            potentials,
        })
    }
}

fn validate_potential(potential: &Potential) -> Result<(), ScenarioError> {
    match potential {
        Potential::BoxConfinement { region, force_constant } => {
            non_negative("Box force constant", *force_constant)?;
            for i in 0..3 {
                positive("Box potential extent", region.extent[i])?;
            }
        }
        Potential::ExclusionSphere { origin, radius, force_constant } => {
            non_negative("Exclusion sphere force constant", *force_constant)?;
            positive("Exclusion sphere radius", *radius)?;
            finite_origin("Exclusion sphere origin", *origin)?;
        }
        Potential::SphericalBarrier { origin, radius, height, width } => {
            positive("Spherical barrier radius", *radius)?;
            positive("Spherical barrier width", *width)?;
            finite_origin("Spherical barrier origin", *origin)?;
            finite("Spherical barrier height", *height)?;
        }
    }
    Ok(())
}

fn positive(what: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::NonPositive {
            what: what.to_string(),
            value,
        })
    }
}

fn non_negative(what: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() && value >= 0.0 {
        Ok(())
    } else {
        Err(ScenarioError::NegativeForceConstant {
            what: what.to_string(),
            value,
        })
    }
}

fn finite(what: &str, value: f64) -> Result<(), ScenarioError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ScenarioError::NonFinite {
            what: what.to_string(),
            value,
        })
    }
}

fn finite_origin(what: &str, origin: DVec3) -> Result<(), ScenarioError> {
    for (axis, value) in ["x", "y", "z"].iter().zip(origin.to_array()) {
        finite(&format!("{what} {axis}"), value)?;
    }
    Ok(())
}
