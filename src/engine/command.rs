//! External inference executable.
//!
//! The engine is called as
//!
//! ```text
//! <program> [args..] --data <csv> --model <name> --options <json> --output <dir> --seed <n>
//! ```
//!
//! and must leave `modelfit.csv` and one `mean_<param>.csv` per model
//! parameter in `<dir>`, in the layouts written by `io::export`.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Instant;

use tracing::{debug, info};

use crate::domain::{ParameterField, RunConfig, Schedule};
use crate::engine::{Dataset, InferenceEngine, InferenceOutput};
use crate::error::AppError;
use crate::io::export::{ensure_dir, read_signal_csv, read_values_csv, write_json, write_signal_csv};
use crate::models::ForwardModel;

/// Scratch directory for engine inputs and outputs, under the run output.
const WORK_DIR: &str = "engine";

#[derive(Debug, Clone)]
pub struct CommandEngine {
    program: String,
    args: Vec<String>,
}

impl CommandEngine {
    /// Parse a whitespace-separated command line (`"python run_vb.py"`).
    pub fn parse(command_line: &str) -> Result<Self, AppError> {
        let mut parts = command_line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::config("Engine command is empty."))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    fn invoke(
        &self,
        work: &Path,
        data: &Path,
        options: &Path,
        model: &str,
        seed: u64,
    ) -> Result<(), AppError> {
        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args)
            .arg("--data")
            .arg(data)
            .arg("--model")
            .arg(model)
            .arg("--options")
            .arg(options)
            .arg("--output")
            .arg(work)
            .arg("--seed")
            .arg(seed.to_string());
        debug!(command = ?cmd, "launching inference engine");

        let output = cmd
            .output()
            .map_err(|e| AppError::inference(format!("Failed to start '{}': {e}", self.program)))?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(AppError::inference(format!(
                "'{}' exited with {}: {}",
                self.program,
                output.status,
                stderr.trim()
            )));
        }
        Ok(())
    }
}

impl InferenceEngine for CommandEngine {
    fn name(&self) -> &str {
        &self.program
    }

    fn run(
        &self,
        model: &dyn ForwardModel,
        dataset: Dataset<'_>,
        config: &RunConfig,
    ) -> Result<InferenceOutput, AppError> {
        let Schedule::Shared(grid) = dataset.schedule else {
            return Err(AppError::inference(
                "External engines accept a single shared time grid only.",
            ));
        };

        let work: PathBuf = config.output.join(WORK_DIR);
        let data_path = work.join("data.csv");
        let options_path = work.join("options.json");
        // Staging failures are reported as inference failures: the engine
        // never ran.
        let staged = ensure_dir(&work)
            .and_then(|_| write_signal_csv(&data_path, grid.times(), dataset.data))
            .and_then(|_| write_json(&options_path, config));
        staged.map_err(|e| AppError::inference(e.message().to_string()))?;

        let started = Instant::now();
        self.invoke(&work, &data_path, &options_path, model.name(), dataset.seed)?;
        let runtime = started.elapsed();

        let read =
            |e: AppError| AppError::inference(format!("Engine output unusable: {}", e.message()));
        let (_, model_fit) = read_signal_csv(&work.join("modelfit.csv")).map_err(read)?;
        if model_fit.n_locations() != dataset.data.n_locations() {
            return Err(AppError::inference(format!(
                "Engine returned {} model fit traces for {} locations.",
                model_fit.n_locations(),
                dataset.data.n_locations()
            )));
        }

        let names = model.param_names();
        let mut columns = Vec::with_capacity(names.len());
        for name in &names {
            let column = read_values_csv(&work.join(format!("mean_{name}.csv"))).map_err(read)?;
            if column.len() != dataset.data.n_locations() {
                return Err(AppError::inference(format!(
                    "Engine returned {} values of '{name}' for {} locations.",
                    column.len(),
                    dataset.data.n_locations()
                )));
            }
            columns.push(column);
        }

        info!(
            engine = %self.program,
            method = config.method_name(),
            runtime_ms = runtime.as_millis() as u64,
            "inference complete"
        );
        Ok(InferenceOutput {
            engine: self.program.clone(),
            means: ParameterField::new(names, columns)
                .map_err(|e| AppError::inference(e.message().to_string()))?,
            model_fit,
            runtime,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MethodOptions, SignalSet, SignalTrace, TimeGrid};
    use crate::error::ErrorKind;
    use crate::models::BiexpModel;

    fn config(output: &Path) -> RunConfig {
        RunConfig::builder("biexp", MethodOptions::Avb { max_iterations: 200 })
            .dt(0.1)
            .output(output)
            .build()
            .unwrap()
    }

    #[test]
    fn parse_splits_program_and_arguments() {
        let engine = CommandEngine::parse("python3  run_vb.py --quiet").unwrap();
        assert_eq!(engine.program(), "python3");
        assert_eq!(engine.args, vec!["run_vb.py", "--quiet"]);
        assert!(CommandEngine::parse("   ").is_err());
    }

    #[test]
    fn missing_executable_is_an_inference_failure() {
        let dir = tempfile::tempdir().unwrap();
        let grid = TimeGrid::uniform(0.1, 5).unwrap();
        let data = SignalSet::single(SignalTrace::new(vec![1.0; 5]));
        let schedule = Schedule::Shared(grid);
        let engine = CommandEngine::parse("vbsim-engine-that-does-not-exist").unwrap();

        let err = engine
            .run(
                &BiexpModel,
                Dataset {
                    data: &data,
                    schedule: &schedule,
                    seed: 0,
                },
                &config(dir.path()),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
        // Inputs were staged before the launch attempt.
        assert!(dir.path().join("engine/data.csv").exists());
        assert!(dir.path().join("engine/options.json").exists());
    }

    #[test]
    fn per_location_schedules_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let data = SignalSet::single(SignalTrace::new(vec![1.0; 5]));
        let schedule = Schedule::PerLocation(vec![TimeGrid::uniform(0.1, 5).unwrap()]);
        let err = CommandEngine::parse("true")
            .unwrap()
            .run(
                &BiexpModel,
                Dataset {
                    data: &data,
                    schedule: &schedule,
                    seed: 0,
                },
                &config(dir.path()),
            )
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Inference);
    }
}
