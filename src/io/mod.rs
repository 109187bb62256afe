//! Input/output helpers.
//!
//! - trace/value CSV and JSON artifacts (`export`)
//! - geometry JSON for the hybrid flow (`geometry`)

pub mod export;
pub mod geometry;

pub use export::*;
pub use geometry::*;
