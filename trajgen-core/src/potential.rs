//! External potentials acting on single particles.

use glam::DVec3;
use serde::{Deserialize, Serialize};

use crate::Region;

/// A spatial energy field. Energies are in the engine's energy unit, forces
/// are the negative gradient.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Potential {
    /// Harmonic walls keeping particles inside `region`.
    BoxConfinement { region: Region, force_constant: f64 },
    /// Harmonic push out of a sphere. Particles outside feel nothing.
    ExclusionSphere {
        origin: DVec3,
        radius: f64,
        force_constant: f64,
    },
    /// Quartic shell of half-width `width` around `radius`. Negative
    /// `height` makes a trench, positive a barrier.
    SphericalBarrier {
        origin: DVec3,
        radius: f64,
        height: f64,
        width: f64,
    },
}

/// A potential attached to one species by name.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PotentialBinding {
    pub species: String,
    pub potential: Potential,
}

impl Potential {
    pub fn kind(&self) -> &'static str {
        match self {
            Potential::BoxConfinement { .. } => "box_confinement",
            Potential::ExclusionSphere { .. } => "exclusion_sphere",
            Potential::SphericalBarrier { .. } => "spherical_barrier",
        }
    }

    pub fn energy(&self, p: DVec3) -> f64 {
        match *self {
            Potential::BoxConfinement { region, force_constant } => {
                let d = box_overshoot(&region, p);
                0.5 * force_constant * d.length_squared()
            }
            Potential::ExclusionSphere { origin, radius, force_constant } => {
                let distance = (p - origin).length();
                if distance < radius {
                    0.5 * force_constant * (radius - distance).powi(2)
                } else {
                    0.0
                }
            }
            Potential::SphericalBarrier { origin, radius, height, width } => {
                let d = (p - origin).length() - radius;
                if d.abs() < width {
                    let (r4, r2) = barrier_coefficients(height, width);
                    r4 * d.powi(4) + r2 * d.powi(2) + height
                } else {
                    0.0
                }
            }
        }
    }

    pub fn force(&self, p: DVec3) -> DVec3 {
        match *self {
            Potential::BoxConfinement { region, force_constant } => {
                -force_constant * box_overshoot(&region, p)
            }
            Potential::ExclusionSphere { origin, radius, force_constant } => {
                let delta = p - origin;
                let distance = delta.length();
                // The centre has no outward direction.
                if distance < radius && distance > 0.0 {
                    delta / distance * force_constant * (radius - distance)
                } else {
                    DVec3::ZERO
                }
            }
            Potential::SphericalBarrier { origin, radius, height, width } => {
                let delta = p - origin;
                let distance = delta.length();
                let d = distance - radius;
                if d.abs() < width && distance > 0.0 {
                    let (r4, r2) = barrier_coefficients(height, width);
                    let de_dr = 4.0 * r4 * d.powi(3) + 2.0 * r2 * d;
                    -de_dr * delta / distance
                } else {
                    DVec3::ZERO
                }
            }
        }
    }
}

/// Signed distance past each face of the box, zero inside.
fn box_overshoot(region: &Region, p: DVec3) -> DVec3 {
    let below = (p - region.origin).min(DVec3::ZERO);
    let above = (p - region.max()).max(DVec3::ZERO);
    below + above
}

fn barrier_coefficients(height: f64, width: f64) -> (f64, f64) {
    (height / width.powi(4), -2.0 * height / width.powi(2))
}
