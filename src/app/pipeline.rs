//! Shared driver pipeline used by both subcommands.
//!
//! Keeping this in one place avoids duplicating the core workflow:
//! ground truth -> clean signal -> (projection) -> noise -> inference -> report
//!
//! Everything here is independent of clap, so integration tests drive the
//! flows directly with [`BiexpRequest`] / [`AslRequest`].

use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};
use serde::Serialize;
use tracing::{debug, info, warn};

use crate::compare::{ReferenceRun, ReferenceTool};
use crate::data::spatial::DEFAULT_SCALE;
use crate::data::{NoiseInjector, ParameterSampler, RandomStreams, SpatialTruth};
use crate::domain::{
    NoiseSpec, ParameterField, ParameterVector, RunConfig, Schedule, SignalSet, TimeGrid,
};
use crate::engine::{Dataset, InferenceEngine, InferenceOutput};
use crate::error::AppError;
use crate::io::export::{ensure_dir, write_json, write_signal_csv, write_values_csv};
use crate::io::geometry::{Geometry, read_geometry_json};
use crate::models::{AslRestModel, ForwardModel, ModelRegistry, evaluate_field};
use crate::report::{self, ParamRecovery};

/// Demo geometry: volume shape, cortical vertices, white-matter nodes.
pub const DEMO_SHAPE: [usize; 3] = [20, 20, 20];
pub const DEMO_VERTICES: usize = 400;
pub const DEMO_WM_SIZE: usize = 200;

/// Where the hybrid flow gets its locations from.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometrySource {
    File(PathBuf),
    Demo,
    None,
}

#[derive(Debug, Clone)]
pub struct BiexpRequest {
    /// Ground truth (any order; reordered to the model's).
    pub truth: ParameterVector,
    pub nt: usize,
    pub noise: NoiseSpec,
    pub config: RunConfig,
    /// Reference tool to compare against, if requested.
    pub reference: Option<ReferenceTool>,
}

#[derive(Debug, Clone)]
pub struct AslRequest {
    pub truth: SpatialTruth,
    pub geometry: GeometrySource,
    pub noise: NoiseSpec,
    pub config: RunConfig,
}

/// Everything one run computed.
#[derive(Debug, Clone)]
pub struct RunOutput {
    pub config: RunConfig,
    pub seed: u64,
    pub grid: TimeGrid,
    /// Ground truth per data location.
    pub truth: ParameterField,
    pub clean: SignalSet,
    pub noisy: SignalSet,
    pub inference: InferenceOutput,
    pub reference: Option<ReferenceRun>,
    pub recovery: Vec<ParamRecovery>,
    pub rmse_noisy: Option<f64>,
    pub rmse_clean: Option<f64>,
    /// Cortical ground truth of the modulated parameter (hybrid flow only).
    pub true_cortex: Option<Vec<f64>>,
}

#[derive(Debug, Serialize)]
struct TruthManifest<'a> {
    generated: DateTime<Local>,
    model: &'a str,
    seed: u64,
    noise_std: f64,
    time_points: &'a [f64],
    params: &'a ParameterField,
    #[serde(skip_serializing_if = "Option::is_none")]
    spatial: Option<SpatialManifest<'a>>,
}

#[derive(Debug, Serialize)]
struct SpatialManifest<'a> {
    modulated: &'a str,
    base: f64,
    variation: f64,
    scale: f64,
    volume_shape: [usize; 3],
    n_cortex: usize,
    n_white_matter: usize,
}

/// Biexponential decay at a single location on a uniform grid.
pub fn run_biexp(
    registry: &ModelRegistry,
    engine: &dyn InferenceEngine,
    request: &BiexpRequest,
) -> Result<RunOutput, AppError> {
    let model = registry.resolve(&request.config.model)?;
    let dt = match request.config.acquisition {
        crate::domain::Acquisition::Uniform { dt } => dt,
        crate::domain::Acquisition::MultiDelay { .. } => {
            return Err(AppError::config("The biexponential flow needs a uniform time grid."));
        }
    };

    let mut streams = open_streams(request.noise.seed());
    let truth = ParameterSampler::new(model.as_ref()).simple(&request.truth)?;
    let grid = TimeGrid::uniform(dt, request.nt)?;
    let clean = SignalSet::single(model.evaluate(&truth, &grid)?);

    let engine_seed = streams.engine_seed();
    let injector = NoiseInjector::new(request.noise)?;
    let noisy = injector.inject_set(&clean, streams.noise());

    let truth_field = ParameterField::new(
        truth.names().to_vec(),
        truth.values().iter().map(|&v| vec![v]).collect(),
    )?;

    let out_dir = request.config.output.clone();
    write_inputs(&request.config, &grid, &clean, &noisy)?;
    write_json(
        &out_dir.join("truth.json"),
        &TruthManifest {
            generated: Local::now(),
            model: model.name(),
            seed: streams.seed(),
            noise_std: request.noise.std_dev(),
            time_points: grid.times(),
            params: &truth_field,
            spatial: None,
        },
    )?;

    let inference = infer(engine, model.as_ref(), &noisy, &grid, engine_seed, &request.config)?;
    write_estimates(&out_dir, &grid, &inference)?;

    let reference = request.reference.as_ref().and_then(|tool| {
        let reference_dir = out_dir.join("reference");
        let args = ReferenceTool::biexp_args(&out_dir.join("data_noisy.csv"), &reference_dir, dt);
        best_effort(tool.run(&reference_dir, &args, request.config.debug))
    });

    let recovery =
        best_effort(report::recover_vector(&truth, &inference.means)).unwrap_or_default();
    Ok(finish(
        request.config.clone(),
        streams.seed(),
        grid,
        truth_field,
        clean,
        noisy,
        inference,
        reference,
        recovery,
        None,
    ))
}

/// Hybrid cortex + white matter ASL with spatially modulated cortical CBF.
pub fn run_asl(
    registry: &ModelRegistry,
    engine: &dyn InferenceEngine,
    request: &AslRequest,
) -> Result<RunOutput, AppError> {
    let model = registry.resolve(&request.config.model)?;
    let (plds, repeats, casl) = match &request.config.acquisition {
        crate::domain::Acquisition::MultiDelay { plds, repeats, casl } => {
            (plds.clone(), *repeats, *casl)
        }
        crate::domain::Acquisition::Uniform { .. } => {
            return Err(AppError::config("The ASL flow needs a multi-delay acquisition."));
        }
    };
    if !casl {
        return Err(AppError::config("The hybrid flow simulates (p)CASL labelling only."));
    }

    let mut streams = open_streams(request.noise.seed());
    let geometry = resolve_geometry(&request.geometry)?;
    let nodes_truth = ParameterSampler::new(model.as_ref()).spatial(
        &request.truth,
        geometry.as_ref(),
        DEFAULT_SCALE,
    )?;
    let Some(geometry) = geometry else {
        return Err(AppError::config("Geometry is required for the hybrid flow."));
    };
    let n_ctx = geometry.n_cortex();
    let true_cortex: Vec<f64> = nodes_truth
        .column(&request.truth.modulated)
        .map(|c| c[..n_ctx].to_vec())
        .unwrap_or_default();

    let grid = TimeGrid::multi_delay(&plds, repeats, AslRestModel::default().tau, casl)?;
    let schedule = Schedule::Shared(grid.clone());
    let nodes_clean = evaluate_field(model.as_ref(), &nodes_truth, &schedule)?;

    // Noise is added in acquisition (data) space, after partial-volume projection.
    let clean = geometry.projector.model_to_data(&nodes_clean)?;
    let engine_seed = streams.engine_seed();
    let noisy = NoiseInjector::new(request.noise)?.inject_set(&clean, streams.noise());
    debug!(nodes = geometry.n_nodes(), voxels = clean.n_locations(), "projected to data space");

    let truth = data_space_truth(&geometry, &nodes_truth)?;

    let out_dir = request.config.output.clone();
    write_inputs(&request.config, &grid, &clean, &noisy)?;
    // Clean signal per model node, before projection.
    write_signal_csv(&out_dir.join("data_clean_model.csv"), grid.times(), &nodes_clean)?;
    write_json(
        &out_dir.join("truth.json"),
        &TruthManifest {
            generated: Local::now(),
            model: model.name(),
            seed: streams.seed(),
            noise_std: request.noise.std_dev(),
            time_points: grid.times(),
            params: &nodes_truth,
            spatial: Some(SpatialManifest {
                modulated: &request.truth.modulated,
                base: request.truth.base,
                variation: request.truth.variation,
                scale: DEFAULT_SCALE,
                volume_shape: geometry.volume_shape,
                n_cortex: n_ctx,
                n_white_matter: geometry.white_matter.size,
            }),
        },
    )?;
    write_values_csv(
        &out_dir.join(format!("true_{}.csv", request.truth.modulated)),
        &request.truth.modulated,
        &true_cortex,
    )?;

    let inference = infer(engine, model.as_ref(), &noisy, &grid, engine_seed, &request.config)?;
    write_estimates(&out_dir, &grid, &inference)?;

    let recovery: Vec<ParamRecovery> = truth
        .names()
        .iter()
        .filter_map(|name| {
            let t = truth.column(name)?;
            let e = inference.means.column(name)?;
            best_effort(report::recover_param(name, t, e))
        })
        .collect();

    Ok(finish(
        request.config.clone(),
        streams.seed(),
        grid,
        truth,
        clean,
        noisy,
        inference,
        None,
        recovery,
        Some(true_cortex),
    ))
}

fn open_streams(seed: Option<u64>) -> RandomStreams {
    let streams = RandomStreams::new(seed);
    if seed.is_none() {
        info!(seed = streams.seed(), "no --rseed given, drew a fresh seed");
    }
    streams
}

pub fn resolve_geometry(source: &GeometrySource) -> Result<Option<Geometry>, AppError> {
    match source {
        GeometrySource::File(path) => read_geometry_json(path).map(Some),
        GeometrySource::Demo => Geometry::demo(DEMO_SHAPE, DEMO_VERTICES, DEMO_WM_SIZE).map(Some),
        GeometrySource::None => Ok(None),
    }
}

/// Project per-node truth into data space (weighted mean per voxel).
fn data_space_truth(
    geometry: &Geometry,
    nodes: &ParameterField,
) -> Result<ParameterField, AppError> {
    let columns = nodes
        .names()
        .iter()
        .map(|name| {
            let column = nodes
                .column(name)
                .ok_or_else(|| AppError::config(format!("No ground truth for '{name}'.")))?;
            geometry.projector.node_values_to_data(column)
        })
        .collect::<Result<Vec<_>, _>>()?;
    ParameterField::new(nodes.names().to_vec(), columns)
}

fn write_inputs(
    config: &RunConfig,
    grid: &TimeGrid,
    clean: &SignalSet,
    noisy: &SignalSet,
) -> Result<(), AppError> {
    let dir = &config.output;
    ensure_dir(dir)?;
    write_json(&dir.join("run_config.json"), config)?;
    write_signal_csv(&dir.join("data_clean.csv"), grid.times(), clean)?;
    write_signal_csv(&dir.join("data_noisy.csv"), grid.times(), noisy)
}

fn write_estimates(
    dir: &Path,
    grid: &TimeGrid,
    inference: &InferenceOutput,
) -> Result<(), AppError> {
    write_signal_csv(&dir.join("modelfit.csv"), grid.times(), &inference.model_fit)?;
    for name in inference.means.names() {
        if let Some(column) = inference.means.column(name) {
            write_values_csv(&dir.join(format!("mean_{name}.csv")), name, column)?;
        }
    }
    Ok(())
}

fn infer(
    engine: &dyn InferenceEngine,
    model: &dyn ForwardModel,
    noisy: &SignalSet,
    grid: &TimeGrid,
    seed: u64,
    config: &RunConfig,
) -> Result<InferenceOutput, AppError> {
    let schedule = Schedule::Shared(grid.clone());
    info!(
        engine = engine.name(),
        model = model.name(),
        method = config.method_name(),
        "running inference"
    );
    engine.run(
        model,
        Dataset {
            data: noisy,
            schedule: &schedule,
            seed,
        },
        config,
    )
}

/// Comparison-stage results: a failure is logged at warn and the run goes on.
fn best_effort<T>(result: Result<T, AppError>) -> Option<T> {
    match result {
        Ok(v) => Some(v),
        Err(e) => {
            warn!(error = %e, "comparison skipped");
            None
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn finish(
    config: RunConfig,
    seed: u64,
    grid: TimeGrid,
    truth: ParameterField,
    clean: SignalSet,
    noisy: SignalSet,
    inference: InferenceOutput,
    reference: Option<ReferenceRun>,
    recovery: Vec<ParamRecovery>,
    true_cortex: Option<Vec<f64>>,
) -> RunOutput {
    let rmse_noisy = best_effort(report::rmse(&inference.model_fit, &noisy));
    let rmse_clean = best_effort(report::rmse(&inference.model_fit, &clean));
    RunOutput {
        config,
        seed,
        grid,
        truth,
        clean,
        noisy,
        inference,
        reference,
        recovery,
        rmse_noisy,
        rmse_clean,
        true_cortex,
    }
}
