//! Mathematical utilities: search grids, least squares and interpolation.

pub mod grid;
pub mod interp;
pub mod ols;

pub use grid::*;
pub use interp::*;
pub use ols::*;
