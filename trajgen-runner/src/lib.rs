//! Scenario orchestration: config to scenario, sampling, driving the
//! simulator and post-processing each replicate.

pub mod pipeline;
pub mod postprocess;

pub use pipeline::{
    base_seed, build_scenario, make_sims, run_batch, run_reference_batch, species_plans,
    PipelineError, RunOutcome,
};
pub use postprocess::{create_serializer, PostProcessOutcome, PostProcessor, RunInfo};
