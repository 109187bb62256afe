//! `vbsim` library crate.
//!
//! The binary (`vbsim`) is a thin wrapper around this library so that:
//!
//! - the generation pipeline is testable without spawning processes
//! - the inference engine stays swappable behind one trait
//! - code stays easy to navigate as the project grows

pub mod app;
pub mod cli;
pub mod compare;
pub mod config;
pub mod data;
pub mod debug;
pub mod domain;
pub mod engine;
pub mod error;
pub mod fit;
pub mod io;
pub mod logging;
pub mod math;
pub mod models;
pub mod plot;
pub mod report;
