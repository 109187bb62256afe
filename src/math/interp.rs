//! Multilinear interpolation on a regular 3D grid.
//!
//! Grid nodes sit at integer voxel coordinates `0..n` along each axis, so the
//! valid domain is `[0, n-1]` per axis. Queries outside that box are errors:
//! an out-of-volume coordinate means the surface and the volume are not
//! aligned, and clamping would hide that.

use crate::error::AppError;

/// Per-axis bracketing: lower index and fractional offset towards `index + 1`.
fn bracket(coord: f64, n: usize) -> Option<(usize, f64)> {
    let upper = (n as f64) - 1.0;
    if !coord.is_finite() || coord < 0.0 || coord > upper {
        return None;
    }
    if n == 1 {
        return Some((0, 0.0));
    }
    let i0 = (coord.floor() as usize).min(n - 2);
    Some((i0, coord - i0 as f64))
}

/// Interpolate `values` (C order, shape `[nx, ny, nz]`) at voxel `point`.
pub fn trilinear(values: &[f64], shape: [usize; 3], point: [f64; 3]) -> Result<f64, AppError> {
    let [nx, ny, nz] = shape;
    if values.len() != nx * ny * nz || values.is_empty() {
        return Err(AppError::config(format!(
            "Volume data has {} values, expected {}x{}x{}.",
            values.len(),
            nx,
            ny,
            nz
        )));
    }

    let out_of_bounds = || {
        AppError::out_of_bounds(format!(
            "Point ({:.4}, {:.4}, {:.4}) lies outside volume extent [0, {}] x [0, {}] x [0, {}].",
            point[0],
            point[1],
            point[2],
            nx - 1,
            ny - 1,
            nz - 1
        ))
    };
    let (i0, fx) = bracket(point[0], nx).ok_or_else(out_of_bounds)?;
    let (j0, fy) = bracket(point[1], ny).ok_or_else(out_of_bounds)?;
    let (k0, fz) = bracket(point[2], nz).ok_or_else(out_of_bounds)?;

    let idx = |i: usize, j: usize, k: usize| (i * ny + j) * nz + k;
    let i1 = (i0 + 1).min(nx - 1);
    let j1 = (j0 + 1).min(ny - 1);
    let k1 = (k0 + 1).min(nz - 1);

    let mut acc = 0.0;
    for (i, wx) in [(i0, 1.0 - fx), (i1, fx)] {
        if wx == 0.0 {
            continue;
        }
        for (j, wy) in [(j0, 1.0 - fy), (j1, fy)] {
            if wy == 0.0 {
                continue;
            }
            for (k, wz) in [(k0, 1.0 - fz), (k1, fz)] {
                if wz == 0.0 {
                    continue;
                }
                acc += wx * wy * wz * values[idx(i, j, k)];
            }
        }
    }
    Ok(acc)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    fn linear_volume(shape: [usize; 3]) -> Vec<f64> {
        let mut out = Vec::new();
        for i in 0..shape[0] {
            for j in 0..shape[1] {
                for k in 0..shape[2] {
                    out.push(i as f64 + 2.0 * j as f64 - 0.5 * k as f64);
                }
            }
        }
        out
    }

    #[test]
    fn reproduces_grid_nodes_exactly() {
        let shape = [3, 4, 5];
        let v = linear_volume(shape);
        let got = trilinear(&v, shape, [2.0, 3.0, 4.0]).unwrap();
        assert_eq!(got, 2.0 + 6.0 - 2.0);
    }

    #[test]
    fn linear_functions_are_interpolated_exactly() {
        let shape = [3, 4, 5];
        let v = linear_volume(shape);
        let got = trilinear(&v, shape, [0.5, 1.25, 3.75]).unwrap();
        let expected = 0.5 + 2.0 * 1.25 - 0.5 * 3.75;
        assert!((got - expected).abs() < 1e-12);
    }

    #[test]
    fn outside_extent_is_an_error_not_a_clamp() {
        let shape = [3, 3, 3];
        let v = linear_volume(shape);
        for p in [[-0.01, 1.0, 1.0], [1.0, 2.0001, 1.0], [1.0, 1.0, f64::NAN]] {
            let err = trilinear(&v, shape, p).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        }
    }

    #[test]
    fn singleton_axis_accepts_only_zero() {
        let shape = [2, 2, 1];
        let v = vec![0.0, 1.0, 2.0, 3.0];
        assert!((trilinear(&v, shape, [0.5, 0.5, 0.0]).unwrap() - 1.5).abs() < 1e-12);
        assert!(trilinear(&v, shape, [0.5, 0.5, 0.1]).is_err());
    }
}
