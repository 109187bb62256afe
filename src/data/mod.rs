//! Synthetic data generation: ground truth, spatial modulation, projection
//! and noise.

pub mod noise;
pub mod projection;
pub mod sampler;
pub mod spatial;

pub use noise::{NoiseInjector, RandomStreams};
pub use projection::{ProjectionEntry, Projector};
pub use sampler::{ParameterSampler, SpatialTruth};
pub use spatial::{SpatialField, SpatialModulator};
