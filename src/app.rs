//! Top-level application orchestration.
//!
//! `src/main.rs` is intentionally tiny; this module is the "real main" that:
//! - parses CLI arguments and environment defaults
//! - sets up logging
//! - builds the typed run configuration
//! - runs the synthetic-data pipeline
//! - prints reports/plots and writes the optional debug bundle

use clap::Parser;
use tracing::{debug, error, info, warn};

use crate::cli::{AslArgs, BiexpArgs, Cli, Command, CommonArgs, parse_plds};
use crate::compare::ReferenceTool;
use crate::config::EnvSettings;
use crate::debug::{DebugInputs, write_debug_bundle};
use crate::domain::{
    Method, MethodOptions, ModelStructure, NoiseSpec, ParameterVector, RunConfig, SaveFlags,
};
use crate::engine::{BuiltinEngine, CommandEngine, InferenceEngine};
use crate::error::{AppError, ErrorKind};
use crate::models::ModelRegistry;
use crate::plot::{Series, Style, render_ascii_plot, trace_points, write_svg_chart};
use crate::report::{
    AslTruthSummary, FitSummary, format_asl_truth, format_biexp_truth, format_fit_summary,
};

pub mod pipeline;

use pipeline::{AslRequest, BiexpRequest, GeometrySource, RunOutput};

/// Entry point for the `vbsim` binary.
pub fn run() -> Result<(), AppError> {
    let cli = Cli::parse();
    let settings = EnvSettings::load();

    let common = match &cli.command {
        Command::Biexp(args) => &args.common,
        Command::Asl(args) => &args.common,
    };
    crate::logging::init(common.debug, settings.log.as_deref())?;

    let result = match cli.command {
        Command::Biexp(args) => handle_biexp(args, &settings),
        Command::Asl(args) => handle_asl(args, &settings),
    };
    if let Err(err) = &result {
        match err.kind() {
            ErrorKind::Inference => {
                error!(kind = "inference", "inference failed: {}", err.message())
            }
            _ => error!(kind = err.kind().label(), "{}", err.message()),
        }
    }
    result
}

/// Hyperparameters of the biexponential example.
pub fn biexp_method(method: Method) -> MethodOptions {
    match method {
        Method::Avb => MethodOptions::Avb { max_iterations: 200 },
        Method::Svb => MethodOptions::Svb {
            epochs: 300,
            learning_rate: 0.1,
            sample_size: 5,
            batch_size: 10,
        },
    }
}

fn select_engine(
    common: &CommonArgs,
    settings: &EnvSettings,
) -> Result<Box<dyn InferenceEngine>, AppError> {
    match common.engine_cmd.as_deref().or(settings.engine_cmd.as_deref()) {
        Some(cmd) => {
            info!(command = cmd, "using external inference engine");
            Ok(Box::new(CommandEngine::parse(cmd)?))
        }
        None => Ok(Box::new(BuiltinEngine::default())),
    }
}

fn handle_biexp(args: BiexpArgs, settings: &EnvSettings) -> Result<(), AppError> {
    let noise = NoiseSpec::new(args.common.noise, args.common.rseed)?;
    let truth = ParameterVector::from_pairs(&[
        ("amp1", args.amp1),
        ("rate1", args.rate1),
        ("amp2", args.amp2),
        ("rate2", args.rate2),
    ])?;
    let config = RunConfig::builder("biexp", biexp_method(args.method))
        .dt(args.dt)
        .output(&args.output)
        .debug(args.common.debug)
        .build()?;

    let reference = if args.reference {
        let cmd = args.reference_cmd.as_deref().or(settings.reference_cmd.as_deref());
        match ReferenceTool::new(cmd) {
            Ok(tool) => Some(tool),
            Err(e) => {
                warn!(error = %e, "reference comparison disabled");
                None
            }
        }
    } else {
        None
    };

    println!("{}", format_biexp_truth(&truth, &noise));

    let engine = select_engine(&args.common, settings)?;
    let request = BiexpRequest {
        truth,
        nt: args.nt,
        noise,
        config,
        reference,
    };
    let run = pipeline::run_biexp(&ModelRegistry::builtin(), engine.as_ref(), &request)?;
    print_summary(&run);

    let times = run.grid.times();
    let clean = run.clean.get(0).map(|t| trace_points(times, t.values())).unwrap_or_default();
    let noisy = run.noisy.get(0).map(|t| trace_points(times, t.values())).unwrap_or_default();
    let fit = run
        .inference
        .model_fit
        .get(0)
        .map(|t| trace_points(times, t.values()))
        .unwrap_or_default();
    let reference_fit = run
        .reference
        .as_ref()
        .and_then(|r| r.model_fit.get(0))
        .map(|t| trace_points(times, t.values()));

    let mut series = vec![
        Series {
            label: "Ground truth",
            points: &clean,
            glyph: '-',
            style: Style::Line,
        },
        Series {
            label: "Noisy samples",
            points: &noisy,
            glyph: 'x',
            style: Style::Points,
        },
        Series {
            label: "Model fit",
            points: &fit,
            glyph: '=',
            style: Style::Line,
        },
    ];
    if let Some(points) = &reference_fit {
        series.push(Series {
            label: "Reference model fit",
            points,
            glyph: '+',
            style: Style::Line,
        });
    }
    show_plots(
        &args.common,
        "Example inference of biexponential",
        "t",
        "signal",
        &series,
    );

    write_bundle(&args.common, engine.name(), noise.std_dev(), &run)
}

fn handle_asl(args: AslArgs, settings: &EnvSettings) -> Result<(), AppError> {
    let noise = NoiseSpec::new(args.common.noise, args.common.rseed)?;
    let plds = parse_plds(&args.plds)?;
    let method = match args.method {
        Method::Avb => MethodOptions::Avb {
            max_iterations: args.iterations,
        },
        Method::Svb => MethodOptions::Svb {
            epochs: args.epochs,
            learning_rate: args.learning_rate,
            sample_size: args.sample_size,
            batch_size: plds.len() as u32,
        },
    };

    let mut builder = RunConfig::builder("aslrest", method)
        .multi_delay(plds, args.repeats, true)
        .output(args.output_dir())
        .debug(args.common.debug)
        .mask(&args.mask)
        .save(SaveFlags {
            log: true,
            ..SaveFlags::default()
        })
        .structure(ModelStructure::CorticalSurface {
            name: "L".into(),
            white: args.cort_inner.clone(),
            pial: args.cort_outer.clone(),
            projector: args.projector.clone(),
        })
        .structure(ModelStructure::PartialVolumes {
            name: "WM".into(),
            vol_data: args.wm_pvs.clone(),
            mask: Some(args.mask.clone()),
        });
    if args.spatial {
        builder = builder.prior_override("ftiss", "M");
    }
    let config = builder.build()?;

    let geometry = match (&args.geometry, args.demo_geometry) {
        (Some(path), _) => GeometrySource::File(path.clone()),
        (None, true) => GeometrySource::Demo,
        (None, false) => GeometrySource::None,
    };
    debug!(
        inflated = %args.cort_inflated.display(),
        "cortical coordinates are read from the geometry source"
    );

    let summary = AslTruthSummary {
        gm_cbf: args.gm_cbf,
        gm_cbf_var: args.gm_cbf_var,
        gm_att: args.gm_att,
        wm_cbf: args.wm_cbf,
        wm_att: args.wm_att,
    };
    let request = AslRequest {
        truth: crate::data::SpatialTruth {
            modulated: "ftiss".into(),
            base: args.gm_cbf,
            variation: args.gm_cbf_var,
            cortex: ParameterVector::from_pairs(&[("delttiss", args.gm_att)])?,
            white_matter: ParameterVector::from_pairs(&[
                ("ftiss", args.wm_cbf),
                ("delttiss", args.wm_att),
            ])?,
        },
        geometry,
        noise,
        config,
    };

    println!("{}", format_asl_truth(&summary, &noise));

    let engine = select_engine(&args.common, settings)?;
    let run = pipeline::run_asl(&ModelRegistry::builtin(), engine.as_ref(), &request)?;
    print_summary(&run);

    let columns = (run.truth.column("ftiss"), run.inference.means.column("ftiss"));
    let scatter: Vec<(f64, f64)> = match columns {
        (Some(t), Some(e)) => t.iter().copied().zip(e.iter().copied()).collect(),
        _ => Vec::new(),
    };
    let (lo, hi) = scatter
        .iter()
        .filter(|(t, _)| t.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &(t, _)| (lo.min(t), hi.max(t)));
    let identity = if lo.is_finite() { vec![(lo, lo), (hi, hi)] } else { Vec::new() };
    show_plots(
        &args.common,
        "True vs estimated CBF",
        "true ftiss",
        "estimated ftiss",
        &[
            Series {
                label: "Identity",
                points: &identity,
                glyph: '.',
                style: Style::Line,
            },
            Series {
                label: "Locations",
                points: &scatter,
                glyph: 'o',
                style: Style::Points,
            },
        ],
    );

    write_bundle(&args.common, engine.name(), noise.std_dev(), &run)
}

fn print_summary(run: &RunOutput) {
    let reference_rmse_clean = run
        .reference
        .as_ref()
        .and_then(|r| crate::report::rmse(&r.model_fit, &run.clean).ok());
    println!(
        "{}",
        format_fit_summary(&FitSummary {
            model: &run.config.model,
            method: run.config.method_name(),
            engine: &run.inference.engine,
            runtime_secs: run.inference.runtime.as_secs_f64(),
            seed: run.seed,
            recovery: &run.recovery,
            rmse_noisy: run.rmse_noisy,
            rmse_clean: run.rmse_clean,
            reference_rmse_clean,
        })
    );
    if let Some(cortex) = &run.true_cortex {
        info!(
            vertices = cortex.len(),
            output = %run.config.output.display(),
            "saved cortical ground truth"
        );
    }
}

fn show_plots(
    common: &CommonArgs,
    title: &str,
    x_label: &str,
    y_label: &str,
    series: &[Series<'_>],
) {
    if common.plot {
        println!("{title}");
        println!("{}", render_ascii_plot(series, x_label, common.width, common.height));
    }
    if let Some(path) = &common.plot_svg {
        match write_svg_chart(path, title, x_label, y_label, series) {
            Ok(()) => info!(path = %path.display(), "wrote SVG chart"),
            Err(e) => warn!(error = %e, "plot skipped"),
        }
    }
}

fn write_bundle(
    common: &CommonArgs,
    engine: &str,
    noise_std: f64,
    run: &RunOutput,
) -> Result<(), AppError> {
    if !common.debug {
        return Ok(());
    }
    let path = write_debug_bundle(
        &run.config.output,
        &DebugInputs {
            config: &run.config,
            seed: run.seed,
            engine,
            noise_std,
            grid: &run.grid,
            truth: &run.truth,
            estimates: &run.inference.means,
            clean: &run.clean,
            noisy: &run.noisy,
            model_fit: &run.inference.model_fit,
        },
    )?;
    info!(path = %path.display(), "wrote debug bundle");
    Ok(())
}
