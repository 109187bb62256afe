//! Smooth 3D modulation fields.
//!
//! The field used to vary cortical perfusion is a sum of three sinusoids, one
//! per voxel axis:
//!
//! ```text
//! f(i, j, k) = sin(i / s) + sin(j / s) + sin(k / s)
//! ```
//!
//! normalized by its largest absolute value so it spans at most `[-1, 1]`,
//! then sampled at surface vertex coordinates by multilinear interpolation.

use nalgebra::{Matrix4, Point3};
use rayon::prelude::*;

use crate::error::AppError;
use crate::math::trilinear;

/// Default spatial scale factor (voxels per radian).
pub const DEFAULT_SCALE: f64 = 2.0;

/// Scalar field on a regular voxel grid (C order).
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialField {
    shape: [usize; 3],
    values: Vec<f64>,
}

impl SpatialField {
    pub fn new(shape: [usize; 3], values: Vec<f64>) -> Result<Self, AppError> {
        if shape.iter().any(|&n| n == 0) {
            return Err(AppError::config(format!("Volume shape must be non-empty, got {shape:?}.")));
        }
        if values.len() != shape.iter().product::<usize>() {
            return Err(AppError::config(format!(
                "Field has {} values but shape {shape:?} needs {}.",
                values.len(),
                shape.iter().product::<usize>()
            )));
        }
        Ok(Self { shape, values })
    }

    /// Sum of three axis-aligned sinusoids over voxel indices.
    pub fn sinusoidal(shape: [usize; 3], scale: f64) -> Result<Self, AppError> {
        if !(scale.is_finite() && scale > 0.0) {
            return Err(AppError::config(format!("Spatial scale must be > 0, got {scale}.")));
        }
        let [nx, ny, nz] = shape;
        let mut values = Vec::with_capacity(nx * ny * nz);
        for i in 0..nx {
            for j in 0..ny {
                for k in 0..nz {
                    let (x, y, z) = (i as f64 / scale, j as f64 / scale, k as f64 / scale);
                    values.push(y.sin() + x.sin() + z.sin());
                }
            }
        }
        Self::new(shape, values)
    }

    pub fn constant(shape: [usize; 3], value: f64) -> Result<Self, AppError> {
        Self::new(shape, vec![value; shape.iter().product()])
    }

    pub fn shape(&self) -> [usize; 3] {
        self.shape
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    /// Divide by the largest absolute value.
    ///
    /// A field with no spatial variation (constant, including all zeros)
    /// carries no modulation and normalizes to all zeros.
    pub fn normalized(&self) -> Self {
        let (min, max) = self
            .values
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
        let peak = self.values.iter().fold(0.0_f64, |acc, v| acc.max(v.abs()));

        let values = if max - min <= 0.0 || peak <= 0.0 || !peak.is_finite() {
            vec![0.0; self.values.len()]
        } else {
            self.values.iter().map(|v| (v / peak).clamp(-1.0, 1.0)).collect()
        };
        Self {
            shape: self.shape,
            values,
        }
    }

    /// Interpolate at one voxel-space point.
    pub fn sample(&self, point: [f64; 3]) -> Result<f64, AppError> {
        trilinear(&self.values, self.shape, point)
    }

    /// Interpolate at many voxel-space points (in parallel).
    ///
    /// On failure, the error names the first offending point by index.
    pub fn sample_many(&self, points: &[[f64; 3]]) -> Result<Vec<f64>, AppError> {
        let results: Vec<Result<f64, AppError>> =
            points.par_iter().map(|&p| self.sample(p)).collect();

        let mut out = Vec::with_capacity(points.len());
        for (idx, r) in results.into_iter().enumerate() {
            match r {
                Ok(v) => out.push(v),
                Err(e) => {
                    return Err(AppError::new(e.kind(), format!("Vertex {idx}: {}", e.message())));
                }
            }
        }
        Ok(out)
    }
}

/// Builds the normalized modulation field and samples it at vertices.
#[derive(Debug, Clone)]
pub struct SpatialModulator {
    field: SpatialField,
    world_to_voxel: Matrix4<f64>,
}

impl SpatialModulator {
    /// Normalized sinusoidal field over a volume of `shape`.
    pub fn sinusoidal(
        shape: [usize; 3],
        scale: f64,
        world_to_voxel: Matrix4<f64>,
    ) -> Result<Self, AppError> {
        Ok(Self {
            field: SpatialField::sinusoidal(shape, scale)?.normalized(),
            world_to_voxel,
        })
    }

    /// Use an arbitrary field; it is normalized here.
    pub fn from_field(field: &SpatialField, world_to_voxel: Matrix4<f64>) -> Self {
        Self {
            field: field.normalized(),
            world_to_voxel,
        }
    }

    pub fn field(&self) -> &SpatialField {
        &self.field
    }

    /// Normalized field value at each world-space vertex.
    pub fn modulate(&self, vertices: &[[f64; 3]]) -> Result<Vec<f64>, AppError> {
        let voxel_points: Vec<[f64; 3]> = vertices
            .iter()
            .map(|v| {
                let p = self
                    .world_to_voxel
                    .transform_point(&Point3::new(v[0], v[1], v[2]));
                [p.x, p.y, p.z]
            })
            .collect();
        self.field.sample_many(&voxel_points)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn normalized_sinusoid_stays_in_unit_range() {
        for shape in [[4, 5, 6], [10, 10, 10], [1, 7, 3]] {
            let field = SpatialField::sinusoidal(shape, DEFAULT_SCALE).unwrap().normalized();
            let peak = field.values().iter().fold(0.0_f64, |a, v| a.max(v.abs()));
            assert!(field.values().iter().all(|v| (-1.0..=1.0).contains(v)));
            assert!((peak - 1.0).abs() < 1e-12, "{shape:?}: peak {peak}");
        }
    }

    #[test]
    fn negative_dominated_field_still_normalizes_into_range() {
        let field = SpatialField::new([1, 1, 3], vec![-4.0, 1.0, 2.0]).unwrap().normalized();
        assert_eq!(field.values(), &[-1.0, 0.25, 0.5]);
    }

    #[test]
    fn constant_field_normalizes_to_zero() {
        for value in [0.0, 3.5] {
            let field = SpatialField::constant([3, 3, 3], value).unwrap().normalized();
            assert!(field.values().iter().all(|&v| v == 0.0));
        }
    }

    #[test]
    fn modulator_is_deterministic_and_applies_affine() {
        let shape = [8, 8, 8];
        // World coordinates are voxel coordinates shifted by +10 on x.
        let mut w2v = Matrix4::identity();
        w2v[(0, 3)] = -10.0;
        let modulator = SpatialModulator::sinusoidal(shape, DEFAULT_SCALE, w2v).unwrap();
        let direct =
            SpatialModulator::sinusoidal(shape, DEFAULT_SCALE, Matrix4::identity()).unwrap();

        let world = [[13.0, 2.0, 5.0], [10.5, 0.5, 0.5]];
        let voxel = [[3.0, 2.0, 5.0], [0.5, 0.5, 0.5]];
        let a = modulator.modulate(&world).unwrap();
        let b = direct.modulate(&voxel).unwrap();
        assert_eq!(a, b);
        assert_eq!(a, modulator.modulate(&world).unwrap());
    }

    #[test]
    fn vertex_outside_volume_is_reported_by_index() {
        let modulator =
            SpatialModulator::sinusoidal([4, 4, 4], DEFAULT_SCALE, Matrix4::identity()).unwrap();
        let err = modulator
            .modulate(&[[1.0, 1.0, 1.0], [1.0, 1.0, 1.0], [1.0, 4.5, 1.0]])
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::OutOfBounds);
        assert!(err.message().starts_with("Vertex 2:"), "{}", err.message());
    }
}
