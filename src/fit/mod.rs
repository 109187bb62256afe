//! In-process separable least squares estimator.
//!
//! Pipeline (per trace):
//! - coarse grid over nonlinear parameters (parallel)
//! - OLS for linear parameters at every grid point
//! - local refinement around the best candidate
//!
//! `batch` runs that per location across a whole data set.

pub mod batch;
pub mod fitter;

pub use batch::*;
pub use fitter::*;
