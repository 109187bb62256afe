//! Command-line parsing for the synthetic-data drivers.
//!
//! The goal of this module is to keep **argument parsing** separate from the
//! simulation and inference code. Every flag has a default; no flag is
//! required.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::domain::Method;
use crate::error::AppError;

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(
    name = "vbsim",
    version,
    about = "Synthetic data generation and parameter recovery for VB forward models"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Infer a single biexponential decay from noisy synthetic data.
    Biexp(BiexpArgs),
    /// Hybrid cortex + white matter structure with simulated multi-PLD ASL
    /// and spatially varying cortical CBF.
    Asl(AslArgs),
}

/// Flags shared by both drivers.
#[derive(Debug, Args, Clone)]
pub struct CommonArgs {
    /// Ground truth noise amplitude (std dev).
    #[arg(long, default_value_t = 5.0)]
    pub noise: f64,

    /// Random number seed to give reproducible results.
    #[arg(long)]
    pub rseed: Option<u64>,

    /// Debug logging (and write a debug bundle to the output directory).
    #[arg(long)]
    pub debug: bool,

    /// Render an ASCII plot of truth against the fit.
    #[arg(long)]
    pub plot: bool,

    /// Also write the plot as an SVG chart.
    #[arg(long = "plot-svg", value_name = "SVG")]
    pub plot_svg: Option<PathBuf>,

    /// Plot width (columns).
    #[arg(long, default_value_t = 80)]
    pub width: usize,

    /// Plot height (rows).
    #[arg(long, default_value_t = 20)]
    pub height: usize,

    /// External inference executable (overrides VBSIM_ENGINE_CMD).
    #[arg(long = "engine-cmd", value_name = "CMD")]
    pub engine_cmd: Option<String>,
}

#[derive(Debug, Args, Clone)]
pub struct BiexpArgs {
    /// Inference method.
    #[arg(long, value_enum, default_value_t = Method::Avb)]
    pub method: Method,

    /// Ground truth amplitude 1.
    #[arg(long, default_value_t = 42.0)]
    pub amp1: f64,

    /// Ground truth decay rate 1.
    #[arg(long, default_value_t = 1.0)]
    pub rate1: f64,

    /// Ground truth amplitude 2.
    #[arg(long, default_value_t = 42.0)]
    pub amp2: f64,

    /// Ground truth decay rate 2.
    #[arg(long, default_value_t = 0.1)]
    pub rate2: f64,

    /// Time resolution.
    #[arg(long, default_value_t = 0.1)]
    pub dt: f64,

    /// Number of time points.
    #[arg(long, default_value_t = 100)]
    pub nt: usize,

    /// Run the reference tool as a comparison.
    #[arg(long)]
    pub reference: bool,

    /// Reference tool command (overrides VBSIM_REFERENCE_CMD).
    #[arg(long = "reference-cmd", value_name = "CMD")]
    pub reference_cmd: Option<String>,

    /// Output directory.
    #[arg(long, default_value = "biexp_example_out")]
    pub output: PathBuf,

    #[command(flatten)]
    pub common: CommonArgs,
}

#[derive(Debug, Args, Clone)]
pub struct AslArgs {
    /// Inference method.
    #[arg(long, value_enum, default_value_t = Method::Svb)]
    pub method: Method,

    /// Ground truth WM CBF.
    #[arg(long = "wm-cbf", default_value_t = 20.0)]
    pub wm_cbf: f64,

    /// Ground truth cortical mean CBF.
    #[arg(long = "gm-cbf", default_value_t = 60.0)]
    pub gm_cbf: f64,

    /// Variation in cortical CBF.
    #[arg(long = "gm-cbf-var", default_value_t = 60.0)]
    pub gm_cbf_var: f64,

    /// Ground truth WM ATT.
    #[arg(long = "wm-att", default_value_t = 1.6)]
    pub wm_att: f64,

    /// Ground truth cortical ATT.
    #[arg(long = "gm-att", default_value_t = 1.3)]
    pub gm_att: f64,

    /// Comma-separated PLDs (seconds).
    #[arg(long, default_value = "0.75, 1.0, 1.25, 1.5, 1.75, 2.0")]
    pub plds: String,

    /// Number of repeats.
    #[arg(long, default_value_t = 1)]
    pub repeats: usize,

    /// Cortex inner surface (passed through to the engine).
    #[arg(long = "cort-inner", default_value = "tk/103818.L.mid.32k_fs_LR.surf.gii")]
    pub cort_inner: PathBuf,

    /// Cortex outer surface (passed through to the engine).
    #[arg(long = "cort-outer", default_value = "tk/103818.L.very_inflated.32k_fs_LR.surf.gii")]
    pub cort_outer: PathBuf,

    /// Cortex inflated surface. Its coordinates come in through --geometry.
    #[arg(long = "cort-inflated", default_value = "tk/103818.L.very_inflated.32k_fs_LR.surf.gii")]
    pub cort_inflated: PathBuf,

    /// Pre-computed projection file (passed through to the engine).
    #[arg(long, default_value = "tk/103818_L_hemi.h5")]
    pub projector: PathBuf,

    /// WM partial volumes (passed through to the engine).
    #[arg(long = "wm-pvs", default_value = "tk/wm_pv.nii.gz")]
    pub wm_pvs: PathBuf,

    /// Analysis mask (passed through to the engine).
    #[arg(long, default_value = "tk/mask.nii.gz")]
    pub mask: PathBuf,

    /// Geometry JSON (volume shape, affine, inflated vertices, WM size, projection).
    #[arg(long, value_name = "JSON", conflicts_with = "demo_geometry")]
    pub geometry: Option<PathBuf>,

    /// Use a built-in spherical cortex in a small volume instead of --geometry.
    #[arg(long = "demo-geometry")]
    pub demo_geometry: bool,

    /// Use a spatial prior on CBF.
    #[arg(long)]
    pub spatial: bool,

    /// Number of epochs for SVB.
    #[arg(long, default_value_t = 300)]
    pub epochs: u32,

    /// Sample size for SVB.
    #[arg(long = "sample-size", default_value_t = 20)]
    pub sample_size: u32,

    /// Learning rate for SVB.
    #[arg(long = "learning-rate", default_value_t = 0.2)]
    pub learning_rate: f64,

    /// Number of iterations for AVB.
    #[arg(long, default_value_t = 50)]
    pub iterations: u32,

    /// Output directory (default: hybrid_asl_example_<method>_<spatial|nonspatial>_out).
    #[arg(long)]
    pub output: Option<PathBuf>,

    #[command(flatten)]
    pub common: CommonArgs,
}

impl AslArgs {
    pub fn output_dir(&self) -> PathBuf {
        self.output.clone().unwrap_or_else(|| {
            let kind = if self.spatial { "spatial" } else { "nonspatial" };
            PathBuf::from(format!("hybrid_asl_example_{}_{kind}_out", self.method.as_str()))
        })
    }
}

/// Parse a comma-separated list of delays.
pub fn parse_plds(raw: &str) -> Result<Vec<f64>, AppError> {
    raw.split(',')
        .map(|s| {
            let s = s.trim();
            s.parse::<f64>()
                .map_err(|e| AppError::config(format!("Invalid PLD '{s}': {e}")))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_flag_is_required() {
        let cli = Cli::try_parse_from(["vbsim", "biexp"]).unwrap();
        let Command::Biexp(args) = cli.command else {
            panic!("expected biexp");
        };
        assert_eq!(args.method, Method::Avb);
        assert_eq!(args.nt, 100);
        assert_eq!(args.common.noise, 5.0);
        assert_eq!(args.common.rseed, None);
        assert_eq!(args.output, PathBuf::from("biexp_example_out"));

        let cli = Cli::try_parse_from(["vbsim", "asl"]).unwrap();
        let Command::Asl(args) = cli.command else {
            panic!("expected asl");
        };
        assert_eq!(args.method, Method::Svb);
        assert_eq!(args.output_dir(), PathBuf::from("hybrid_asl_example_svb_nonspatial_out"));
    }

    #[test]
    fn spatial_flag_changes_default_output() {
        let cli = Cli::try_parse_from(["vbsim", "asl", "--spatial", "--method", "avb"]).unwrap();
        let Command::Asl(args) = cli.command else {
            panic!("expected asl");
        };
        assert_eq!(args.output_dir(), PathBuf::from("hybrid_asl_example_avb_spatial_out"));
    }

    #[test]
    fn plds_parse_with_spaces() {
        assert_eq!(parse_plds("0.75, 1.0,1.25").unwrap(), vec![0.75, 1.0, 1.25]);
        assert!(parse_plds("0.75, x").is_err());
    }

    #[test]
    fn geometry_sources_conflict() {
        let argv = ["vbsim", "asl", "--geometry", "g.json", "--demo-geometry"];
        assert!(Cli::try_parse_from(argv).is_err());
    }
}
