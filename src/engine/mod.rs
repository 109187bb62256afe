//! Inference invocation.
//!
//! The inference engine is a black box behind one call: noisy data +
//! forward model + [`RunConfig`] in, per-location parameter estimates and a
//! model fit out. Two implementations:
//!
//! - [`BuiltinEngine`]: in-process separable least squares (no external
//!   software needed)
//! - [`CommandEngine`]: runs an external executable and reads its outputs
//!
//! Any failure is an `Inference` error and terminates the run.

use std::time::Duration;

use crate::domain::{ParameterField, RunConfig, Schedule, SignalSet};
use crate::error::AppError;
use crate::models::ForwardModel;

pub mod builtin;
pub mod command;

pub use builtin::BuiltinEngine;
pub use command::CommandEngine;

/// Noisy observations and the schedule they were sampled on.
#[derive(Debug, Clone, Copy)]
pub struct Dataset<'a> {
    pub data: &'a SignalSet,
    pub schedule: &'a Schedule,
    /// Seed for engines with their own stochastic optimiser.
    pub seed: u64,
}

/// What an engine hands back.
#[derive(Debug, Clone)]
pub struct InferenceOutput {
    pub engine: String,
    /// Posterior means (or point estimates) per location.
    pub means: ParameterField,
    /// Model prediction at the estimates, per location.
    pub model_fit: SignalSet,
    pub runtime: Duration,
}

pub trait InferenceEngine {
    fn name(&self) -> &str;

    fn run(
        &self,
        model: &dyn ForwardModel,
        dataset: Dataset<'_>,
        config: &RunConfig,
    ) -> Result<InferenceOutput, AppError>;
}
