//! Domain types used throughout the pipeline.
//!
//! This module defines:
//!
//! - parameters, time grids, signal traces and the noise spec (`types`)
//! - the typed inference configuration and its builder (`run_config`)

pub mod run_config;
pub mod types;

pub use run_config::*;
pub use types::*;
