//! Optional comparison against a reference fitting tool.
//!
//! The reference tool is run on the same noisy data file the engine saw,
//! with a fabber-style argument list. Everything here is best effort: any
//! failure comes back as a `Comparison` error, which the caller logs and
//! then carries on without the overlay.

use std::path::{Path, PathBuf};
use std::process::Command;

use tracing::{debug, info};

use crate::domain::SignalSet;
use crate::error::AppError;
use crate::io::export::{ensure_dir, read_signal_csv};

/// Used when neither `--reference-cmd` nor `VBSIM_REFERENCE_CMD` is set.
pub const DEFAULT_REFERENCE_CMD: &str = "fabber_exp";

#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRun {
    pub output: PathBuf,
    pub model_fit: SignalSet,
}

#[derive(Debug, Clone)]
pub struct ReferenceTool {
    program: String,
    args: Vec<String>,
}

impl ReferenceTool {
    pub fn new(command_line: Option<&str>) -> Result<Self, AppError> {
        let line = command_line.unwrap_or(DEFAULT_REFERENCE_CMD);
        let mut parts = line.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| AppError::comparison("Reference command is empty."))?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Arguments for a two-exponential fit of uniformly sampled data.
    pub fn biexp_args(data: &Path, output: &Path, dt: f64) -> Vec<String> {
        vec![
            format!("--data={}", data.display()),
            "--print-free-energy".into(),
            "--save-model-fit".into(),
            format!("--output={}", output.display()),
            format!("--dt={dt:.3}"),
            "--model=exp".into(),
            "--num-exps=2".into(),
            "--method=vb".into(),
            "--max-iterations=50".into(),
            "--noise=white".into(),
            "--overwrite".into(),
        ]
    }

    /// Run the tool and read `<output>/modelfit.csv`.
    pub fn run(
        &self,
        output: &Path,
        tool_args: &[String],
        debug: bool,
    ) -> Result<ReferenceRun, AppError> {
        ensure_dir(output).map_err(AppError::into_comparison)?;

        let mut cmd = Command::new(&self.program);
        cmd.args(&self.args).args(tool_args);
        if debug {
            cmd.arg("--debug");
        }
        debug!(command = ?cmd, "launching reference tool");

        let result = cmd
            .output()
            .map_err(|e| AppError::comparison(format!("Failed to start '{}': {e}", self.program)))?;
        if !result.status.success() {
            return Err(AppError::comparison(format!(
                "'{}' exited with {}: {}",
                self.program,
                result.status,
                String::from_utf8_lossy(&result.stderr).trim()
            )));
        }

        let (_, model_fit) =
            read_signal_csv(&output.join("modelfit.csv")).map_err(AppError::into_comparison)?;
        info!(tool = %self.program, locations = model_fit.n_locations(), "reference fit loaded");
        Ok(ReferenceRun {
            output: output.to_path_buf(),
            model_fit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn biexp_args_carry_time_resolution() {
        let args = ReferenceTool::biexp_args(Path::new("d.csv"), Path::new("out"), 0.1);
        assert!(args.contains(&"--dt=0.100".to_string()));
        assert!(args.contains(&"--num-exps=2".to_string()));
        assert_eq!(args[0], "--data=d.csv");
    }

    #[test]
    fn missing_tool_is_a_comparison_failure() {
        let dir = tempfile::tempdir().unwrap();
        let tool = ReferenceTool::new(Some("vbsim-reference-that-does-not-exist")).unwrap();
        let err = tool.run(&dir.path().join("ref"), &[], false).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Comparison);
    }

    #[test]
    fn default_command_is_used_when_unset() {
        assert_eq!(ReferenceTool::new(None).unwrap().program(), DEFAULT_REFERENCE_CMD);
    }
}
