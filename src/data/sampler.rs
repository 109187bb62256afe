//! Ground-truth parameter construction.
//!
//! Two cases:
//! - simple: the caller's values, verbatim, in the model's canonical order
//! - spatial: per-location values for a hybrid cortex + white matter model,
//!   with one cortical parameter modulated by a normalized spatial field:
//!
//! ```text
//! value(vertex) = base + variation * field(vertex)
//! ```
//!
//! Neither case draws random numbers. The parameter stream of
//! `RandomStreams` is derived ahead of the noise stream, so random sampling
//! can be added here without disturbing reproducible noise.

use tracing::debug;

use crate::data::spatial::SpatialModulator;
use crate::domain::{ParameterField, ParameterVector};
use crate::error::AppError;
use crate::io::geometry::Geometry;
use crate::models::ForwardModel;

/// Spatially varying ground truth.
#[derive(Debug, Clone)]
pub struct SpatialTruth {
    /// Name of the modulated cortical parameter (e.g. `ftiss`).
    pub modulated: String,
    pub base: f64,
    pub variation: f64,
    /// Constant cortical values of every other parameter.
    pub cortex: ParameterVector,
    /// Constant white-matter values of every parameter.
    pub white_matter: ParameterVector,
}

pub struct ParameterSampler<'m> {
    model: &'m dyn ForwardModel,
}

impl<'m> ParameterSampler<'m> {
    pub fn new(model: &'m dyn ForwardModel) -> Self {
        Self { model }
    }

    /// Caller-supplied values, checked against the model and reordered into
    /// canonical order.
    pub fn simple(&self, truth: &ParameterVector) -> Result<ParameterVector, AppError> {
        let mut values = Vec::with_capacity(self.model.params().len());
        for spec in self.model.params() {
            let v = truth.get(spec.name).ok_or_else(|| {
                AppError::config(format!(
                    "Ground truth for model '{}' is missing parameter '{}'.",
                    self.model.name(),
                    spec.name
                ))
            })?;
            values.push(v);
        }
        ParameterVector::new(self.model.param_names(), values)
    }

    /// Per-location ground truth, cortex vertices first, then white matter,
    /// modulated by the normalized sinusoidal field over the geometry volume.
    ///
    /// Fails with a configuration error when no geometry is available to
    /// resolve locations.
    pub fn spatial(
        &self,
        truth: &SpatialTruth,
        geometry: Option<&Geometry>,
        scale: f64,
    ) -> Result<ParameterField, AppError> {
        let geometry = geometry.ok_or_else(|| {
            AppError::config(concat!(
                "Spatially varying ground truth requires geometry ",
                "(surface vertices and volume shape)."
            ))
        })?;
        let modulator =
            SpatialModulator::sinusoidal(geometry.volume_shape, scale, geometry.world_to_voxel)?;
        self.spatial_with(truth, geometry, &modulator)
    }

    /// As [`Self::spatial`], with a caller-supplied modulation field.
    pub fn spatial_with(
        &self,
        truth: &SpatialTruth,
        geometry: &Geometry,
        modulator: &SpatialModulator,
    ) -> Result<ParameterField, AppError> {
        if !self.model.params().iter().any(|p| p.name == truth.modulated) {
            return Err(AppError::config(format!(
                "Model '{}' has no parameter '{}' to modulate.",
                self.model.name(),
                truth.modulated
            )));
        }
        if !(truth.base.is_finite() && truth.variation.is_finite()) {
            return Err(AppError::config("Spatial base value and variation must be finite."));
        }
        if modulator.field().shape() != geometry.volume_shape {
            return Err(AppError::config(format!(
                "Modulation field shape {:?} does not match geometry volume {:?}.",
                modulator.field().shape(),
                geometry.volume_shape
            )));
        }

        let field = modulator.modulate(&geometry.cortex.vertices)?;
        let n_ctx = geometry.n_cortex();
        let n_wm = geometry.white_matter.size;
        debug!(
            cortex = n_ctx,
            white_matter = n_wm,
            param = %truth.modulated,
            "resolved spatial ground truth locations"
        );

        let mut columns = Vec::with_capacity(self.model.params().len());
        for spec in self.model.params() {
            let mut column = Vec::with_capacity(n_ctx + n_wm);
            if spec.name == truth.modulated {
                column.extend(field.iter().map(|f| truth.base + truth.variation * f));
            } else {
                let v = truth.cortex.get(spec.name).ok_or_else(|| {
                    let name = spec.name;
                    AppError::config(format!("Missing cortical value for parameter '{name}'."))
                })?;
                column.extend(std::iter::repeat_n(v, n_ctx));
            }
            let wm = truth.white_matter.get(spec.name).ok_or_else(|| {
                AppError::config(format!(
                    "Missing {} value for parameter '{}'.",
                    geometry.white_matter.name, spec.name
                ))
            })?;
            column.extend(std::iter::repeat_n(wm, n_wm));
            columns.push(column);
        }

        ParameterField::new(self.model.param_names(), columns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::spatial::{DEFAULT_SCALE, SpatialField};
    use crate::models::{AslRestModel, BiexpModel};
    use nalgebra::Matrix4;

    fn truth(variation: f64) -> SpatialTruth {
        SpatialTruth {
            modulated: "ftiss".into(),
            base: 60.0,
            variation,
            cortex: ParameterVector::from_pairs(&[("delttiss", 1.3)]).unwrap(),
            white_matter: ParameterVector::from_pairs(&[("ftiss", 20.0), ("delttiss", 1.6)])
                .unwrap(),
        }
    }

    #[test]
    fn simple_case_is_verbatim_in_canonical_order() {
        let input = ParameterVector::from_pairs(&[
            ("rate2", 0.1),
            ("amp2", 42.0),
            ("rate1", 1.0),
            ("amp1", 42.0),
        ])
        .unwrap();
        let out = ParameterSampler::new(&BiexpModel).simple(&input).unwrap();
        assert_eq!(out.names(), &["amp1", "rate1", "amp2", "rate2"]);
        assert_eq!(out.values(), &[42.0, 1.0, 42.0, 0.1]);
    }

    #[test]
    fn composite_length_is_total_locations() {
        let model = AslRestModel::default();
        let geom = Geometry::demo([12, 12, 12], 100, 40).unwrap();
        let field = ParameterSampler::new(&model)
            .spatial(&truth(60.0), Some(&geom), DEFAULT_SCALE)
            .unwrap();
        assert_eq!(field.n_locations(), 140);

        let ftiss = field.column("ftiss").unwrap();
        assert!(ftiss[..100].iter().all(|v| (0.0..=120.0).contains(v)));
        assert!(ftiss[100..].iter().all(|&v| v == 20.0));
        let att = field.column("delttiss").unwrap();
        assert!(att[..100].iter().all(|&v| v == 1.3));
        assert!(att[100..].iter().all(|&v| v == 1.6));
    }

    #[test]
    fn constant_field_gives_base_value_everywhere_on_cortex() {
        let model = AslRestModel::default();
        let geom = Geometry::demo([10, 10, 10], 64, 8).unwrap();
        let flat = SpatialField::constant(geom.volume_shape, 0.0).unwrap();
        let modulator = SpatialModulator::from_field(&flat, Matrix4::identity());
        let field = ParameterSampler::new(&model)
            .spatial_with(&truth(60.0), &geom, &modulator)
            .unwrap();
        assert!(field.column("ftiss").unwrap()[..64].iter().all(|&v| v == 60.0));
    }

    #[test]
    fn missing_geometry_is_a_configuration_error() {
        let model = AslRestModel::default();
        let err = ParameterSampler::new(&model)
            .spatial(&truth(1.0), None, DEFAULT_SCALE)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn misaligned_vertices_surface_out_of_bounds() {
        let model = AslRestModel::default();
        let geom = Geometry::demo([8, 8, 8], 20, 2).unwrap();
        let mut shift = Matrix4::identity();
        shift[(0, 3)] = 100.0;
        let modulator =
            SpatialModulator::sinusoidal(geom.volume_shape, DEFAULT_SCALE, shift).unwrap();
        let err = ParameterSampler::new(&model)
            .spatial_with(&truth(1.0), &geom, &modulator)
            .unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::OutOfBounds);
    }
}
