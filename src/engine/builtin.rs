//! In-process engine backed by the separable least squares fitter.
//!
//! It honours the model, the acquisition schedule and the output settings of
//! a `RunConfig`. Method hyperparameters (AVB iterations, SVB epochs, ...)
//! only mean something to a variational engine; they are logged and left to
//! external engines.

use std::time::Instant;

use tracing::{debug, info};

use crate::domain::{MethodOptions, ParameterField, RunConfig, SignalSet};
use crate::engine::{Dataset, InferenceEngine, InferenceOutput};
use crate::error::AppError;
use crate::fit::{FitOptions, fit_set};
use crate::models::ForwardModel;

#[derive(Debug, Clone, Default)]
pub struct BuiltinEngine {
    pub options: FitOptions,
}

impl InferenceEngine for BuiltinEngine {
    fn name(&self) -> &str {
        "builtin-lsq"
    }

    fn run(
        &self,
        model: &dyn ForwardModel,
        dataset: Dataset<'_>,
        config: &RunConfig,
    ) -> Result<InferenceOutput, AppError> {
        if config.model != model.name() {
            return Err(AppError::inference(format!(
                "Run config names model '{}' but '{}' was supplied.",
                config.model,
                model.name()
            )));
        }
        match &config.method {
            MethodOptions::Avb { max_iterations } => {
                debug!(max_iterations, "avb hyperparameters not used by builtin engine");
            }
            MethodOptions::Svb {
                epochs,
                learning_rate,
                sample_size,
                batch_size,
            } => {
                debug!(
                    epochs,
                    learning_rate,
                    sample_size,
                    batch_size,
                    "svb hyperparameters not used by builtin engine"
                );
            }
        }

        let started = Instant::now();
        let fits = fit_set(model, dataset.schedule, dataset.data, &self.options)
            .map_err(|e| AppError::inference(e.message().to_string()))?;

        let names = model.param_names();
        let mut columns = vec![Vec::with_capacity(fits.len()); names.len()];
        let mut model_fit = Vec::with_capacity(fits.len());
        for (loc, fit) in fits.iter().enumerate() {
            for (col, &v) in columns.iter_mut().zip(fit.params.values()) {
                col.push(v);
            }
            let grid = dataset
                .schedule
                .grid(loc)
                .ok_or_else(|| AppError::inference(format!("No time grid for location {loc}.")))?;
            model_fit.push(model.evaluate(&fit.params, grid)?);
        }

        let runtime = started.elapsed();
        info!(
            engine = self.name(),
            method = config.method_name(),
            locations = fits.len(),
            runtime_ms = runtime.as_millis() as u64,
            "inference complete"
        );

        Ok(InferenceOutput {
            engine: self.name().to_string(),
            means: ParameterField::new(names, columns)
                .map_err(|e| AppError::inference(e.message().to_string()))?,
            model_fit: SignalSet::new(model_fit),
            runtime,
        })
    }
}
