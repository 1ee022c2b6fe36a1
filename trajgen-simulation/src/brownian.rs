//! Reference engine: overdamped Brownian motion under the scenario's
//! external potentials. No reactions and no particle-particle forces.

use glam::DVec3;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;
use trajgen_core::{Geometry, InitialConditions, ParticleRecord, Potential, Scenario};
use trajgen_output::{TrajectoryHandle, TrajectoryHeader, TrajectoryWriter};

use crate::driver::{RunRequest, SimulationError, Simulator};

/// Thermal energy at room temperature in kJ/mol.
pub const DEFAULT_KBT: f64 = 2.437;

// Keeps the noise stream distinct from the sampler's for the same seed.
const NOISE_STREAM: u64 = 0x9E37_79B9_7F4A_7C15;

#[derive(Debug, Clone)]
struct SpeciesKind {
    diffusion: f64,
    potentials: Vec<Potential>,
}

#[derive(Debug, Clone)]
struct Particle {
    id: u64,
    species: u16,
    position: DVec3,
}

#[derive(Debug)]
struct Configured {
    geometry: Geometry,
    names: Vec<String>,
    kinds: Vec<SpeciesKind>,
}

/// Euler-Maruyama integration of `dx = D/kT F dt + sqrt(2 D dt) N(0, 1)`.
pub struct BrownianDriver {
    kbt: f64,
    rng: StdRng,
    configured: Option<Configured>,
    particles: Option<Vec<Particle>>,
}

impl BrownianDriver {
    pub fn new(kbt: f64, seed: u64) -> Self {
        Self {
            kbt,
            rng: StdRng::seed_from_u64(seed ^ NOISE_STREAM),
            configured: None,
            particles: None,
        }
    }

    pub fn particle_count(&self) -> usize {
        self.particles.as_ref().map_or(0, Vec::len)
    }

    fn snapshot(particles: &[Particle]) -> Vec<ParticleRecord> {
        particles
            .iter()
            .map(|p| ParticleRecord::new(p.id, p.species, p.position))
            .collect()
    }
}

impl Simulator for BrownianDriver {
    fn configure(&mut self, scenario: &Scenario) -> Result<(), SimulationError> {
        if scenario.species.len() > usize::from(u16::MAX) {
            return Err(SimulationError::TooManySpecies(scenario.species.len()));
        }
        let kinds = scenario
            .species
            .iter()
            .map(|species| SpeciesKind {
                diffusion: species.diffusion_constant,
                potentials: scenario.potentials_for(&species.name).cloned().collect(),
            })
            .collect();
        self.configured = Some(Configured {
            geometry: scenario.geometry,
            names: scenario.species_names(),
            kinds,
        });
        self.particles = None;
        debug!("Configured Brownian driver with {} species", scenario.species.len());
        Ok(())
    }

    fn seed(&mut self, initial: &InitialConditions) -> Result<(), SimulationError> {
        let configured = self
            .configured
            .as_ref()
            .ok_or(SimulationError::NotReady("configure must be called before seed"))?;

        let mut particles = Vec::with_capacity(initial.total_particles());
        for (name, positions) in initial.iter() {
            let species = configured
                .names
                .iter()
                .position(|n| n == name)
                .ok_or_else(|| SimulationError::UnknownSpecies(name.to_string()))?;
            let species = u16::try_from(species)
                .map_err(|_| SimulationError::TooManySpecies(configured.names.len()))?;
            for position in positions {
                particles.push(Particle {
                    id: particles.len() as u64,
                    species,
                    position: *position,
                });
            }
        }
        if particles.is_empty() {
            warn!("Seeding an empty system");
        }
        self.particles = Some(particles);
        Ok(())
    }

    fn run(&mut self, request: &RunRequest) -> Result<TrajectoryHandle, SimulationError> {
        request.validate()?;
        let configured = self
            .configured
            .as_ref()
            .ok_or(SimulationError::NotReady("configure must be called before run"))?;
        let particles = self
            .particles
            .as_mut()
            .ok_or(SimulationError::NotReady("seed must be called before run"))?;

        let header = TrajectoryHeader {
            species: configured.names.clone(),
            geometry: configured.geometry,
            dt: request.dt,
            stride: request.stride,
        };
        let mut writer = TrajectoryWriter::create(&request.output, header)?;
        writer.push_frame(0, Self::snapshot(particles))?;

        info!(
            "Running {} particles for {} steps (dt = {})",
            particles.len(),
            request.n_steps,
            request.dt
        );
        for step in 1..=request.n_steps {
            for particle in particles.iter_mut() {
                let kind = &configured.kinds[particle.species as usize];
                if kind.diffusion == 0.0 {
                    continue;
                }
                let force = kind
                    .potentials
                    .iter()
                    .fold(DVec3::ZERO, |acc, potential| acc + potential.force(particle.position));
                let noise = DVec3::new(
                    self.rng.sample(StandardNormal),
                    self.rng.sample(StandardNormal),
                    self.rng.sample(StandardNormal),
                );
                let drift = kind.diffusion / self.kbt * force * request.dt;
                let kick = (2.0 * kind.diffusion * request.dt).sqrt() * noise;
                let moved = particle.position + drift + kick;
                if !moved.is_finite() {
                    return Err(SimulationError::Diverged {
                        step,
                        particle: particle.id,
                    });
                }
                particle.position = apply_boundaries(moved, &configured.geometry);
            }
            if step % request.stride == 0 {
                writer.push_frame(step, Self::snapshot(particles))?;
            }
        }

        let handle = writer.finish()?;
        info!("Trajectory written to {}", handle.path.display());
        Ok(handle)
    }
}

/// Wraps periodic axes and reflects closed ones at the box faces.
fn apply_boundaries(p: DVec3, geometry: &Geometry) -> DVec3 {
    let half = geometry.half_extent();
    let mut out = p;
    for axis in 0..3 {
        let h = half[axis];
        let size = geometry.box_size[axis];
        let mut v = out[axis];
        if geometry.periodic[axis] {
            v -= size * ((v + h) / size).floor();
        } else {
            if v > h {
                v = 2.0 * h - v;
            } else if v < -h {
                v = -2.0 * h - v;
            }
            v = v.clamp(-h, h);
        }
        out[axis] = v;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sampling::{sample_initial_conditions, SpeciesPlan};
    use tempfile::tempdir;
    use trajgen_core::{Region, SamplingPolicy, ScenarioBuilder};
    use trajgen_output::TrajectoryReader;

    fn scenario() -> Scenario {
        ScenarioBuilder::default()
            .species("A", 0.5)
            .species("Frozen", 0.0)
            .confine_all(50.0)
            .build()
            .unwrap()
    }

    fn initial() -> InitialConditions {
        let plans = vec![
            SpeciesPlan { name: "A".into(), count: 20, policy: SamplingPolicy::Domain },
            SpeciesPlan { name: "Frozen".into(), count: 3, policy: SamplingPolicy::sub_box() },
        ];
        sample_initial_conditions(&plans, &Region::default(), 5).unwrap()
    }

    #[test]
    fn records_every_stride_including_step_zero() {
        let dir = tempdir().unwrap();
        let mut driver = BrownianDriver::new(DEFAULT_KBT, 1);
        driver.configure(&scenario()).unwrap();
        driver.seed(&initial()).unwrap();
        let request = RunRequest {
            dt: 0.01,
            n_steps: 50,
            stride: 5,
            output: dir.path().join("run.traj"),
        };
        let handle = driver.run(&request).unwrap();
        assert_eq!(handle.frames, request.expected_frames());
        assert_eq!(handle.particles, 23);

        let series = driver.read_positions(&handle, &[]).unwrap();
        assert_eq!(series.steps, (0..=50).step_by(5).collect::<Vec<u64>>());
        // Zero diffusion never moves.
        let first = &series.frames[0];
        let last = series.frames.last().unwrap();
        for i in 20..23 {
            assert_eq!(first[i], last[i]);
        }
        assert!(series.frames.iter().flatten().all(|r| r.x.abs() <= 25.0 && r.y.abs() <= 25.0));
    }

    #[test]
    fn same_seed_reproduces_trajectory() {
        let dir = tempdir().unwrap();
        let mut series = Vec::new();
        for run in 0..2 {
            let mut driver = BrownianDriver::new(DEFAULT_KBT, 99);
            driver.configure(&scenario()).unwrap();
            driver.seed(&initial()).unwrap();
            let request = RunRequest {
                dt: 0.01,
                n_steps: 20,
                stride: 1,
                output: dir.path().join(format!("run{}.traj", run)),
            };
            let handle = driver.run(&request).unwrap();
            series.push(driver.read_positions(&handle, &["A".to_string()]).unwrap());
        }
        assert_eq!(series[0], series[1]);
        assert_eq!(series[0].particle_count(), 20);
    }

    #[test]
    fn rerun_over_existing_output_succeeds() {
        let dir = tempdir().unwrap();
        let output = dir.path().join("Sims.traj");
        std::fs::write(&output, b"stale").unwrap();
        for _ in 0..2 {
            let mut driver = BrownianDriver::new(DEFAULT_KBT, 3);
            driver.configure(&scenario()).unwrap();
            driver.seed(&initial()).unwrap();
            let request = RunRequest { dt: 0.01, n_steps: 4, stride: 1, output: output.clone() };
            driver.run(&request).unwrap();
        }
        assert_eq!(TrajectoryReader::open(&output).unwrap().frames().len(), 5);
    }

    #[test]
    fn enforces_call_order_and_known_species() {
        let dir = tempdir().unwrap();
        let request = RunRequest {
            dt: 0.01,
            n_steps: 1,
            stride: 1,
            output: dir.path().join("x.traj"),
        };
        let mut driver = BrownianDriver::new(DEFAULT_KBT, 0);
        assert!(matches!(driver.seed(&initial()), Err(SimulationError::NotReady(_))));
        driver.configure(&scenario()).unwrap();
        assert!(matches!(driver.run(&request), Err(SimulationError::NotReady(_))));

        let mut stray = InitialConditions::new();
        stray.insert("B", vec![DVec3::ZERO]);
        assert!(matches!(driver.seed(&stray), Err(SimulationError::UnknownSpecies(_))));
    }

    #[test]
    fn boundaries_wrap_or_reflect() {
        let closed = Geometry::default();
        let reflected = apply_boundaries(DVec3::new(26.0, -27.0, 0.0), &closed);
        assert!((reflected - DVec3::new(24.0, -23.0, 0.0)).length() < 1e-12);

        let open = Geometry {
            box_size: DVec3::new(50.0, 50.0, 5.0),
            periodic: [true; 3],
        };
        let wrapped = apply_boundaries(DVec3::new(26.0, -27.0, 3.0), &open);
        assert!((wrapped - DVec3::new(-24.0, 23.0, -2.0)).length() < 1e-12);
    }

    #[test]
    fn barrier_holds_particles_near_the_ring() {
        let scenario = ScenarioBuilder::default()
            .species("Confined", 0.5)
            .confine_all(1.0)
            .spherical_barrier("Confined", -15.0, 5.0, DVec3::ZERO, 10.0)
            .build()
            .unwrap();
        let plans = vec![SpeciesPlan {
            name: "Confined".into(),
            count: 15,
            policy: SamplingPolicy::ring(),
        }];
        let initial = sample_initial_conditions(&plans, &Region::default(), 8).unwrap();

        let dir = tempdir().unwrap();
        let mut driver = BrownianDriver::new(DEFAULT_KBT, 8);
        driver.configure(&scenario).unwrap();
        driver.seed(&initial).unwrap();
        let request = RunRequest { dt: 0.01, n_steps: 200, stride: 200, output: dir.path().join("ring.traj") };
        let handle = driver.run(&request).unwrap();
        let series = driver.read_positions(&handle, &[]).unwrap();

        let last = series.frames.last().unwrap();
        let mean_radius: f64 =
            last.iter().map(|r| (r.x * r.x + r.y * r.y).sqrt()).sum::<f64>() / last.len() as f64;
        assert!((5.0..16.0).contains(&mean_radius), "mean radius {}", mean_radius);
    }

    #[test]
    fn first_kick_is_independent_of_starting_side() {
        let scenario = ScenarioBuilder::default().species("A", 0.5).build().unwrap();
        let plans = vec![SpeciesPlan { name: "A".into(), count: 1, policy: SamplingPolicy::Domain }];
        let dir = tempdir().unwrap();

        let mut same_side = 0;
        for seed in 0..300u64 {
            let initial = sample_initial_conditions(&plans, &Region::default(), seed).unwrap();
            let mut driver = BrownianDriver::new(DEFAULT_KBT, seed);
            driver.configure(&scenario).unwrap();
            driver.seed(&initial).unwrap();
            let request = RunRequest { dt: 0.01, n_steps: 1, stride: 1, output: dir.path().join("kick.traj") };
            let handle = driver.run(&request).unwrap();
            let series = driver.read_positions(&handle, &[]).unwrap();
            let (start, end) = (series.frames[0][0].x, series.frames[1][0].x);
            if (end - start).signum() == start.signum() {
                same_side += 1;
            }
        }
        assert!((100..=200).contains(&same_side), "kick matched starting side in {}/300 runs", same_side);
    }

    #[test]
    fn divergence_is_reported_even_inside_closed_walls() {
        let scenario = ScenarioBuilder::default()
            .species("A", 0.5)
            .confine_all(f64::MAX)
            .build()
            .unwrap();
        let mut initial = InitialConditions::new();
        initial.insert("A", vec![DVec3::new(24.9, 0.0, 0.0)]);

        let dir = tempdir().unwrap();
        let mut driver = BrownianDriver::new(DEFAULT_KBT, 4);
        driver.configure(&scenario).unwrap();
        driver.seed(&initial).unwrap();
        let request = RunRequest { dt: 0.01, n_steps: 3, stride: 1, output: dir.path().join("blowup.traj") };
        assert!(matches!(
            driver.run(&request),
            Err(SimulationError::Diverged { step: 1, particle: 0 })
        ));
    }

    #[test]
    fn species_table_must_fit_record_index() {
        let species = (0..=usize::from(u16::MAX))
            .map(|i| trajgen_core::Species { name: format!("S{}", i), diffusion_constant: 0.1 })
            .collect();
        let scenario = Scenario {
            geometry: Geometry::default(),
            confinement: Region::default(),
            species,
            potentials: Vec::new(),
        };
        let mut driver = BrownianDriver::new(DEFAULT_KBT, 0);
        assert!(matches!(
            driver.configure(&scenario),
            Err(SimulationError::TooManySpecies(65536))
        ));
    }
}
