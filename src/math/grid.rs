//! Search grids over nonlinear model parameters.
//!
//! The in-process estimator fits separable models by a deterministic grid
//! search over the nonlinear parameters (rates, transit times), solving the
//! linear parameters exactly at each grid point. With one or two nonlinear
//! parameters a modest grid is cheap and sidesteps local minima.

use crate::error::AppError;

/// Generate `steps` log-spaced points between `min` and `max` (inclusive).
pub fn log_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && min > 0.0 && max > 0.0 && max > min) {
        return Err(AppError::config(format!(
            "Invalid log grid range: min={min}, max={max} (must be finite, >0, and max>min)."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Grid steps must be >= 2."));
    }

    let ln_min = min.ln();
    let ln_max = max.ln();
    let step = (ln_max - ln_min) / (steps as f64 - 1.0);

    Ok((0..steps).map(|i| (ln_min + step * i as f64).exp()).collect())
}

/// Generate `steps` evenly spaced points between `min` and `max` (inclusive).
pub fn lin_space(min: f64, max: f64, steps: usize) -> Result<Vec<f64>, AppError> {
    if !(min.is_finite() && max.is_finite() && max > min) {
        return Err(AppError::config(format!(
            "Invalid linear grid range: min={min}, max={max}."
        )));
    }
    if steps < 2 {
        return Err(AppError::config("Grid steps must be >= 2."));
    }
    let step = (max - min) / (steps as f64 - 1.0);
    Ok((0..steps).map(|i| min + step * i as f64).collect())
}

/// Cartesian product of per-axis values.
///
/// With `strictly_decreasing`, only tuples `v0 > v1 > ...` are kept.
pub fn product_grid(axes: &[Vec<f64>], strictly_decreasing: bool) -> Vec<Vec<f64>> {
    let mut out: Vec<Vec<f64>> = vec![Vec::new()];
    for axis in axes {
        let mut next = Vec::with_capacity(out.len() * axis.len());
        for prefix in &out {
            for &v in axis {
                if strictly_decreasing {
                    if let Some(&last) = prefix.last() {
                        if v >= last {
                            continue;
                        }
                    }
                }
                let mut tuple = prefix.clone();
                tuple.push(v);
                next.push(tuple);
            }
        }
        out = next;
    }
    if axes.is_empty() { Vec::new() } else { out }
}

/// Local grid of `steps` points spanning `center ± half_width`, clipped to
/// `[min, max]`.
pub fn refine_axis(center: f64, half_width: f64, steps: usize, min: f64, max: f64) -> Vec<f64> {
    let lo = (center - half_width).max(min);
    let hi = (center + half_width).min(max);
    if !(hi > lo) || steps < 2 {
        return vec![center];
    }
    lin_space(lo, hi, steps).unwrap_or_else(|_| vec![center])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn log_space_includes_endpoints() {
        let v = log_space(0.1, 10.0, 5).unwrap();
        assert!((v[0] - 0.1).abs() < 1e-12);
        assert!((v[v.len() - 1] - 10.0).abs() < 1e-12);
    }

    #[test]
    fn lin_space_is_even() {
        let v = lin_space(0.2, 3.0, 57).unwrap();
        assert_eq!(v.len(), 57);
        assert!((v[1] - v[0] - 0.05).abs() < 1e-12);
        assert!((v[56] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn product_grid_enforces_order() {
        let axis = log_space(0.1, 10.0, 6).unwrap();
        let grid = product_grid(&[axis.clone(), axis], true);
        assert_eq!(grid.len(), 15);
        for tuple in grid {
            assert!(tuple[0] > tuple[1]);
        }
    }

    #[test]
    fn product_grid_single_axis_is_identity() {
        let grid = product_grid(&[vec![1.0, 2.0, 3.0]], false);
        assert_eq!(grid, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[test]
    fn refine_axis_clips_to_bounds() {
        let v = refine_axis(0.25, 0.1, 5, 0.2, 3.0);
        assert!((v[0] - 0.2).abs() < 1e-12);
        assert!((v[4] - 0.35).abs() < 1e-12);
    }
}
