//! Debug bundle writer for inspecting one run end to end.
//!
//! Written as `<output>/debug_bundle.md` when `--debug` is given: run
//! settings, ground truth, per-location data and estimates.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::domain::{ParameterField, RunConfig, SignalSet, TimeGrid};
use crate::error::AppError;

/// Locations listed in the per-location tables before truncating.
pub const MAX_ROWS: usize = 50;

pub struct DebugInputs<'a> {
    pub config: &'a RunConfig,
    pub seed: u64,
    pub engine: &'a str,
    pub noise_std: f64,
    pub grid: &'a TimeGrid,
    pub truth: &'a ParameterField,
    pub estimates: &'a ParameterField,
    pub clean: &'a SignalSet,
    pub noisy: &'a SignalSet,
    pub model_fit: &'a SignalSet,
}

pub fn write_debug_bundle(dir: &Path, inputs: &DebugInputs<'_>) -> Result<PathBuf, AppError> {
    let path = dir.join("debug_bundle.md");
    let file = File::create(&path)
        .map_err(|e| AppError::io(format!("Failed to create debug file: {e}")))?;
    let mut file = BufWriter::new(file);
    write_bundle(&mut file, inputs)
        .and_then(|_| file.flush())
        .map_err(|e| AppError::io(format!("Failed to write debug bundle: {e}")))?;
    Ok(path)
}

fn write_bundle(w: &mut impl Write, d: &DebugInputs<'_>) -> std::io::Result<()> {
    writeln!(w, "# vbsim debug bundle")?;
    writeln!(w, "- generated: {}", Local::now().to_rfc3339())?;
    writeln!(w, "- model: {}", d.config.model)?;
    writeln!(w, "- method: {}", d.config.method_name())?;
    writeln!(w, "- engine: {}", d.engine)?;
    writeln!(w, "- seed: {}", d.seed)?;
    writeln!(w, "- noise_std: {:.6}", d.noise_std)?;
    writeln!(w, "- time_points: {}", fmt_vec(d.grid.times(), 3))?;
    writeln!(w, "- output: {}", d.config.output.display())?;

    writeln!(w, "\n## Run config")?;
    writeln!(w, "```json")?;
    writeln!(w, "{}", serde_json::to_string_pretty(d.config).map_err(std::io::Error::other)?)?;
    writeln!(w, "```")?;

    writeln!(w, "\n## Parameters (truth vs estimate)")?;
    let mut header = String::from("| location |");
    let mut rule = String::from("| - |");
    for name in d.truth.names() {
        header.push_str(&format!(" true {name} | est {name} |"));
        rule.push_str(" - | - |");
    }
    writeln!(w, "{header}")?;
    writeln!(w, "{rule}")?;
    let n_param_rows = d.truth.n_locations().min(d.estimates.n_locations());
    for loc in 0..n_param_rows.min(MAX_ROWS) {
        let mut row = format!("| {loc} |");
        for name in d.truth.names() {
            let t = d.truth.column(name).map(|c| c[loc]);
            let e = d.estimates.column(name).map(|c| c[loc]);
            row.push_str(&format!(" {} | {} |", fmt_opt(t), fmt_opt(e)));
        }
        writeln!(w, "{row}")?;
    }
    if n_param_rows > MAX_ROWS {
        writeln!(w, "\n({} more locations not shown)", n_param_rows - MAX_ROWS)?;
    }

    writeln!(w, "\n## Signals")?;
    writeln!(w, "| location | clean | noisy | model fit |")?;
    writeln!(w, "| - | - | - | - |")?;
    for loc in 0..d.noisy.n_locations().min(MAX_ROWS) {
        let fmt_trace = |set: &SignalSet| {
            set.get(loc)
                .map_or_else(|| "-".to_string(), |t| fmt_vec(t.values(), 3))
        };
        writeln!(
            w,
            "| {loc} | {} | {} | {} |",
            fmt_trace(d.clean),
            fmt_trace(d.noisy),
            fmt_trace(d.model_fit)
        )?;
    }
    Ok(())
}

fn fmt_vec(values: &[f64], digits: usize) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.digits$}")).collect();
    format!("[{}]", parts.join(", "))
}

fn fmt_opt(value: Option<f64>) -> String {
    match value {
        Some(v) if v.is_finite() => format!("{v:.4}"),
        _ => "-".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{MethodOptions, SignalTrace};

    #[test]
    fn bundle_lists_truth_and_estimates() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfig::builder("biexp", MethodOptions::Avb { max_iterations: 200 })
            .dt(0.1)
            .output(dir.path())
            .build()
            .unwrap();
        let names = vec!["amp1".to_string(), "rate1".to_string()];
        let truth = ParameterField::new(names.clone(), vec![vec![42.0], vec![1.0]]).unwrap();
        let est = ParameterField::new(names, vec![vec![41.5], vec![1.02]]).unwrap();
        let grid = TimeGrid::uniform(0.1, 2).unwrap();
        let clean = SignalSet::single(SignalTrace::new(vec![42.0, 38.0]));
        let noisy = SignalSet::single(SignalTrace::new(vec![43.0, 37.0]));

        let path = write_debug_bundle(
            dir.path(),
            &DebugInputs {
                config: &config,
                seed: 1234,
                engine: "builtin-lsq",
                noise_std: 5.0,
                grid: &grid,
                truth: &truth,
                estimates: &est,
                clean: &clean,
                noisy: &noisy,
                model_fit: &clean,
            },
        )
        .unwrap();
        let text = std::fs::read_to_string(path).unwrap();
        assert!(text.starts_with("# vbsim debug bundle"));
        assert!(text.contains("- seed: 1234"));
        assert!(text.contains("| 0 | 42.0000 | 41.5000 | 1.0000 | 1.0200 |"));
    }
}
