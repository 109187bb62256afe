//! Reporting utilities: truth-vs-recovered metrics.
//!
//! Formatting lives in [`format`]; this module only computes numbers.

use crate::domain::{ParameterField, ParameterVector, SignalSet};
use crate::error::AppError;

pub mod format;

pub use format::*;

/// Root-mean-square difference over all samples of two equally shaped sets.
pub fn rmse(a: &SignalSet, b: &SignalSet) -> Result<f64, AppError> {
    if a.n_locations() != b.n_locations() {
        return Err(AppError::comparison(format!(
            "Cannot compare {} traces with {}.",
            a.n_locations(),
            b.n_locations()
        )));
    }
    let mut sse = 0.0;
    let mut n = 0usize;
    for (ta, tb) in a.traces().iter().zip(b.traces()) {
        if ta.len() != tb.len() {
            return Err(AppError::comparison("Trace lengths differ."));
        }
        for (x, y) in ta.values().iter().zip(tb.values()) {
            sse += (x - y) * (x - y);
            n += 1;
        }
    }
    if n == 0 {
        return Err(AppError::comparison("Nothing to compare."));
    }
    Ok((sse / n as f64).sqrt())
}

/// Recovery of one parameter across locations.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRecovery {
    pub name: String,
    pub true_mean: f64,
    pub est_mean: f64,
    pub mean_abs_error: f64,
    /// Pearson correlation; `None` when either side is constant.
    pub correlation: Option<f64>,
    /// Locations with a finite truth and estimate.
    pub n: usize,
}

/// Compare per-location truth and estimates of one parameter.
///
/// Pairs where either value is not finite (e.g. voxels no node projects
/// into) are skipped.
pub fn recover_param(
    name: &str,
    truth: &[f64],
    estimate: &[f64],
) -> Result<ParamRecovery, AppError> {
    if truth.len() != estimate.len() {
        return Err(AppError::comparison(format!(
            "'{name}': {} true values but {} estimates.",
            truth.len(),
            estimate.len()
        )));
    }
    let pairs: Vec<(f64, f64)> = truth
        .iter()
        .zip(estimate)
        .map(|(&t, &e)| (t, e))
        .filter(|(t, e)| t.is_finite() && e.is_finite())
        .collect();
    if pairs.is_empty() {
        return Err(AppError::comparison(format!("'{name}': no finite pairs to compare.")));
    }

    let n = pairs.len() as f64;
    let true_mean = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let est_mean = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let mean_abs_error = pairs.iter().map(|(t, e)| (t - e).abs()).sum::<f64>() / n;

    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (t, e) in &pairs {
        let dx = t - true_mean;
        let dy = e - est_mean;
        sxy += dx * dy;
        sxx += dx * dx;
        syy += dy * dy;
    }
    let correlation = if sxx > 0.0 && syy > 0.0 {
        Some(sxy / (sxx * syy).sqrt())
    } else {
        None
    };

    Ok(ParamRecovery {
        name: name.to_string(),
        true_mean,
        est_mean,
        mean_abs_error,
        correlation,
        n: pairs.len(),
    })
}

/// Single-location recovery, parameter by parameter in canonical order.
pub fn recover_vector(
    truth: &ParameterVector,
    estimate: &ParameterField,
) -> Result<Vec<ParamRecovery>, AppError> {
    truth
        .names()
        .iter()
        .zip(truth.values())
        .map(|(name, &t)| {
            let est = estimate
                .column(name)
                .ok_or_else(|| AppError::comparison(format!("No estimate for '{name}'.")))?;
            recover_param(name, &vec![t; est.len()], est)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::SignalTrace;

    #[test]
    fn rmse_over_all_samples() {
        let a = SignalSet::new(vec![SignalTrace::new(vec![0.0, 0.0]); 2]);
        let b = SignalSet::new(vec![SignalTrace::new(vec![1.0, 1.0]); 2]);
        assert!((rmse(&a, &b).unwrap() - 1.0).abs() < 1e-15);
        assert!(rmse(&a, &SignalSet::new(vec![])).is_err());
    }

    #[test]
    fn recovery_skips_non_finite_pairs() {
        let r = recover_param("ftiss", &[10.0, 20.0, 30.0], &[12.0, f64::NAN, 28.0]).unwrap();
        assert_eq!(r.n, 2);
        assert!((r.mean_abs_error - 2.0).abs() < 1e-12);
        assert!((r.correlation.unwrap() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn constant_truth_has_no_correlation() {
        let r = recover_param("delttiss", &[1.3, 1.3], &[1.2, 1.4]).unwrap();
        assert_eq!(r.correlation, None);
    }
}
