//! Formatted terminal output.
//!
//! We keep formatting code in one place so output changes stay localized.

use crate::domain::{NoiseSpec, ParameterVector};
use crate::report::ParamRecovery;

/// Python-style float list: `[42.0, 0.1]`.
fn py_list(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:?}")).collect();
    format!("[{}]", parts.join(", "))
}

/// One-line ground-truth summary for the biexponential run.
///
/// Amplitudes are the even entries and rates the odd entries of the
/// canonical parameter order.
pub fn format_biexp_truth(truth: &ParameterVector, noise: &NoiseSpec) -> String {
    let amps: Vec<f64> = truth.values().iter().step_by(2).copied().collect();
    let rates: Vec<f64> = truth.values().iter().skip(1).step_by(2).copied().collect();
    format!(
        "Ground truth: a={}, r={}, noise={:.6} (std.dev.)",
        py_list(&amps),
        py_list(&rates),
        noise.std_dev()
    )
}

/// Per-region ground truth of the hybrid ASL run.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AslTruthSummary {
    pub gm_cbf: f64,
    pub gm_cbf_var: f64,
    pub gm_att: f64,
    pub wm_cbf: f64,
    pub wm_att: f64,
}

pub fn format_asl_truth(t: &AslTruthSummary, noise: &NoiseSpec) -> String {
    format!(
        concat!(
            "Ground truth: cbf=[{:?} +/- {:?} (GM), {:?} (WM)], ",
            "att=[{:?} (GM), {:?} (WM)], noise={:.6} (std.dev.)"
        ),
        t.gm_cbf,
        t.gm_cbf_var,
        t.wm_cbf,
        t.gm_att,
        t.wm_att,
        noise.std_dev()
    )
}

/// Inputs of the fit summary block.
#[derive(Debug, Clone)]
pub struct FitSummary<'a> {
    pub model: &'a str,
    pub method: &'a str,
    pub engine: &'a str,
    pub runtime_secs: f64,
    pub seed: u64,
    pub recovery: &'a [ParamRecovery],
    pub rmse_noisy: Option<f64>,
    pub rmse_clean: Option<f64>,
    pub reference_rmse_clean: Option<f64>,
}

pub fn format_fit_summary(s: &FitSummary<'_>) -> String {
    let mut out = String::new();

    out.push_str(&format!("=== vbsim - {} ({}) ===\n", s.model, s.method));
    out.push_str(&format!(
        "Engine: {} | runtime={:.3}s | seed={}\n",
        s.engine, s.runtime_secs, s.seed
    ));

    out.push_str("\nParameter recovery:\n");
    out.push_str(
        format!(
            "{:<12} {:>12} {:>12} {:>12} {:>8} {:>8}\n",
            "param", "true_mean", "est_mean", "mae", "corr", "n"
        )
        .trim_end(),
    );
    out.push('\n');
    out.push_str(
        format!(
            "{:-<12} {:-<12} {:-<12} {:-<12} {:-<8} {:-<8}\n",
            "", "", "", "", "", ""
        )
        .trim_end(),
    );
    out.push('\n');
    for r in s.recovery {
        let corr = r.correlation.map_or_else(|| "-".to_string(), |c| format!("{c:.3}"));
        out.push_str(
            format!(
                "{:<12} {:>12.4} {:>12.4} {:>12.4} {:>8} {:>8}\n",
                truncate(&r.name, 12),
                r.true_mean,
                r.est_mean,
                r.mean_abs_error,
                corr,
                r.n
            )
            .trim_end(),
        );
        out.push('\n');
    }

    out.push_str(&format!(
        "\nModel fit RMSE: vs noisy={} vs clean={}\n",
        fmt_opt(s.rmse_noisy),
        fmt_opt(s.rmse_clean)
    ));
    if let Some(r) = s.reference_rmse_clean {
        out.push_str(&format!("Reference fit RMSE: vs clean={r:.4}\n"));
    }

    out
}

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |v| format!("{v:.4}"))
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        return s.to_string();
    }
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('.');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn biexp_truth_line_matches_driver_output() {
        let truth = ParameterVector::from_pairs(&[
            ("amp1", 42.0),
            ("rate1", 1.0),
            ("amp2", 42.0),
            ("rate2", 0.1),
        ])
        .unwrap();
        let noise = NoiseSpec::new(5.0, None).unwrap();
        assert_eq!(
            format_biexp_truth(&truth, &noise),
            "Ground truth: a=[42.0, 42.0], r=[1.0, 0.1], noise=5.000000 (std.dev.)"
        );
    }

    #[test]
    fn fit_summary_lists_every_parameter() {
        let recovery = vec![
            ParamRecovery {
                name: "ftiss".into(),
                true_mean: 60.0,
                est_mean: 58.5,
                mean_abs_error: 4.25,
                correlation: Some(0.91),
                n: 140,
            },
            ParamRecovery {
                name: "delttiss".into(),
                true_mean: 1.3,
                est_mean: 1.31,
                mean_abs_error: 0.05,
                correlation: None,
                n: 140,
            },
        ];
        let txt = format_fit_summary(&FitSummary {
            model: "aslrest",
            method: "svb",
            engine: "builtin-lsq",
            runtime_secs: 0.5,
            seed: 1234,
            recovery: &recovery,
            rmse_noisy: Some(5.0),
            rmse_clean: None,
            reference_rmse_clean: None,
        });
        assert!(txt.starts_with("=== vbsim - aslrest (svb) ===\n"));
        assert!(txt.contains("ftiss"));
        assert!(txt.contains("0.910"));
        assert!(txt.contains("delttiss"));
        assert!(txt.contains("vs noisy=5.0000 vs clean=-"));
        assert!(!txt.contains("Reference fit"));
    }

    #[test]
    fn long_names_are_truncated() {
        assert_eq!(truncate("abcdefghijklmnop", 5), "abcd.");
        assert_eq!(truncate("abc", 5), "abc");
    }
}
