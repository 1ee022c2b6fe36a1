//! Initial particle placement.

use std::f64::consts::TAU;

use glam::DVec3;
use log::debug;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use thiserror::Error;
use trajgen_core::{InitialConditions, Region, SamplingPolicy};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum SamplingError {
    #[error("Invalid sampling policy for '{species}': {reason}")]
    InvalidPolicy { species: String, reason: String },
}

/// Requested particles of one species.
#[derive(Debug, Clone, PartialEq)]
pub struct SpeciesPlan {
    pub name: String,
    pub count: usize,
    pub policy: SamplingPolicy,
}

fn unit<R: Rng + ?Sized>(rng: &mut R) -> DVec3 {
    DVec3::new(rng.gen(), rng.gen(), rng.gen())
}

/// Draws `count` positions under `policy`. `region` is the confinement
/// region that `Domain` and `SubBox` are defined against.
pub fn sample<R: Rng + ?Sized>(
    policy: &SamplingPolicy,
    count: usize,
    region: &Region,
    rng: &mut R,
) -> Vec<DVec3> {
    match *policy {
        SamplingPolicy::Domain => (0..count)
            .map(|_| unit(rng) * region.extent + region.origin)
            .collect(),
        SamplingPolicy::SubBox { fraction } => {
            let size = region.extent * fraction;
            (0..count).map(|_| unit(rng) * size - size / 2.0).collect()
        }
        SamplingPolicy::Ring { radius, noise } => (0..count)
            .map(|_| {
                let u = unit(rng);
                let angle = u.x * TAU;
                DVec3::new(
                    (radius + noise * u.y) * angle.sin(),
                    (radius + noise * u.z) * angle.cos(),
                    0.0,
                )
            })
            .collect(),
    }
}

pub fn validate_policy(species: &str, policy: &SamplingPolicy) -> Result<(), SamplingError> {
    let invalid = |reason: &str| SamplingError::InvalidPolicy {
        species: species.to_string(),
        reason: reason.to_string(),
    };
    match *policy {
        SamplingPolicy::Domain => Ok(()),
        SamplingPolicy::SubBox { fraction } if !(fraction.is_finite() && fraction > 0.0) => {
            Err(invalid("sub-box fraction must be positive"))
        }
        SamplingPolicy::SubBox { .. } => Ok(()),
        SamplingPolicy::Ring { radius, .. } if !(radius.is_finite() && radius > 0.0) => {
            Err(invalid("ring radius must be positive"))
        }
        SamplingPolicy::Ring { noise, .. } if !(noise.is_finite() && noise >= 0.0) => {
            Err(invalid("ring noise must be non-negative"))
        }
        SamplingPolicy::Ring { .. } => Ok(()),
    }
}

/// Samples every species in plan order from one RNG seeded with `seed`.
pub fn sample_initial_conditions(
    plans: &[SpeciesPlan],
    region: &Region,
    seed: u64,
) -> Result<InitialConditions, SamplingError> {
    for plan in plans {
        validate_policy(&plan.name, &plan.policy)?;
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut initial = InitialConditions::new();
    for plan in plans {
        debug!("Sampling {} '{}' particles with {:?}", plan.count, plan.name, plan.policy);
        initial.insert(plan.name.clone(), sample(&plan.policy, plan.count, region, &mut rng));
    }
    Ok(initial)
}
