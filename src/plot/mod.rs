//! Plotting: terminal ASCII output and SVG export.

pub mod ascii;
pub mod svg;

pub use ascii::{Series, Style, render_ascii_plot, trace_points};
pub use svg::write_svg_chart;
