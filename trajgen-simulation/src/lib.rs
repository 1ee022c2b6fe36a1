//! Initial-condition sampling and the simulation engine interface.
//!
//! Engines implement [`Simulator`]. [`BrownianDriver`] is a small reference
//! implementation used by the runner and the tests.

pub mod brownian;
pub mod driver;
pub mod sampling;

pub use brownian::{BrownianDriver, DEFAULT_KBT};
pub use driver::{RunRequest, SimulationError, Simulator};
pub use sampling::{sample, sample_initial_conditions, validate_policy, SamplingError, SpeciesPlan};
