//! Forward models: parameters + time grid -> noiseless signal.
//!
//! Every model here is *separable*: its signal is a sum of linear
//! (amplitude-like) parameters times basis functions that depend only on the
//! nonlinear (rate/time-like) parameters:
//!
//! ```text
//! s(t) = Σ_i linear_i * basis_i(t; nonlinear)
//! ```
//!
//! Models therefore only implement `fill_design_row`; evaluation and the
//! in-process least squares engine are generic over that one primitive.
//! Models are resolved by name once at startup through [`ModelRegistry`].

use std::collections::BTreeMap;
use std::sync::Arc;

use rayon::prelude::*;

use crate::domain::{ParameterField, ParameterVector, Schedule, SignalSet, SignalTrace, TimeGrid};
use crate::error::AppError;

pub mod aslrest;
pub mod biexp;

pub use aslrest::AslRestModel;
pub use biexp::BiexpModel;

/// Spacing of a nonlinear parameter's search grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    Linear,
    Log,
}

/// How a parameter enters the signal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ParamRole {
    /// Multiplies one basis function.
    Linear,
    /// Shapes the basis functions; searched over `[min, max]`.
    Nonlinear {
        min: f64,
        max: f64,
        steps: usize,
        spacing: Spacing,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ParamSpec {
    pub name: &'static str,
    pub role: ParamRole,
}

impl ParamSpec {
    pub const fn linear(name: &'static str) -> Self {
        Self {
            name,
            role: ParamRole::Linear,
        }
    }

    pub const fn nonlinear(
        name: &'static str,
        min: f64,
        max: f64,
        steps: usize,
        spacing: Spacing,
    ) -> Self {
        Self {
            name,
            role: ParamRole::Nonlinear {
                min,
                max,
                steps,
                spacing,
            },
        }
    }

    pub fn is_linear(&self) -> bool {
        matches!(self.role, ParamRole::Linear)
    }
}

pub trait ForwardModel: Send + Sync {
    fn name(&self) -> &'static str;

    /// Parameters in canonical order.
    fn params(&self) -> &[ParamSpec];

    /// Fill one design row: the basis value multiplying each linear
    /// parameter, in canonical order, at time `t`.
    ///
    /// `out` has one entry per linear parameter and `nonlinear` one entry per
    /// nonlinear parameter.
    fn fill_design_row(&self, t: f64, nonlinear: &[f64], out: &mut [f64]);

    /// Nonlinear parameters must be strictly decreasing (e.g. fast rate
    /// before slow rate) to remove label switching during fitting.
    fn ordered_nonlinear(&self) -> bool {
        false
    }

    fn param_names(&self) -> Vec<String> {
        self.params().iter().map(|p| p.name.to_string()).collect()
    }

    fn n_linear(&self) -> usize {
        self.params().iter().filter(|p| p.is_linear()).count()
    }

    /// Evaluate the noiseless signal on a time grid.
    fn evaluate(&self, params: &ParameterVector, grid: &TimeGrid) -> Result<SignalTrace, AppError> {
        let (linear, nonlinear) = split_params(self.params(), params)?;
        let mut row = vec![0.0; linear.len()];
        let values = grid
            .times()
            .iter()
            .map(|&t| {
                self.fill_design_row(t, &nonlinear, &mut row);
                row.iter().zip(linear.iter()).map(|(b, a)| b * a).sum()
            })
            .collect();
        Ok(SignalTrace::new(values))
    }
}

/// Evaluate every location of a parameter field on its own time grid.
///
/// Locations are evaluated in parallel; the result keeps location order.
pub fn evaluate_field(
    model: &dyn ForwardModel,
    field: &ParameterField,
    schedule: &Schedule,
) -> Result<SignalSet, AppError> {
    let traces: Vec<Result<SignalTrace, AppError>> = (0..field.n_locations())
        .into_par_iter()
        .map(|loc| {
            let grid = schedule
                .grid(loc)
                .ok_or_else(|| AppError::config(format!("No time grid for location {loc}.")))?;
            let params = field
                .at(loc)
                .ok_or_else(|| AppError::config(format!("No parameters for location {loc}.")))?;
            model.evaluate(&params, grid)
        })
        .collect();
    traces.into_iter().collect::<Result<Vec<_>, _>>().map(SignalSet::new)
}

/// Split a parameter vector into (linear, nonlinear) values, in canonical order.
///
/// Parameters are looked up by name so callers may supply them in any order.
pub fn split_params(
    specs: &[ParamSpec],
    params: &ParameterVector,
) -> Result<(Vec<f64>, Vec<f64>), AppError> {
    let mut linear = Vec::new();
    let mut nonlinear = Vec::new();
    for spec in specs {
        let value = params.get(spec.name).ok_or_else(|| {
            AppError::config(format!("Missing model parameter '{}'.", spec.name))
        })?;
        if spec.is_linear() {
            linear.push(value);
        } else {
            nonlinear.push(value);
        }
    }
    Ok((linear, nonlinear))
}

/// Inverse of [`split_params`]: interleave values back into canonical order.
pub fn merge_params(specs: &[ParamSpec], linear: &[f64], nonlinear: &[f64]) -> Vec<f64> {
    let mut lin = linear.iter();
    let mut non = nonlinear.iter();
    specs
        .iter()
        .map(|spec| {
            let next = if spec.is_linear() { lin.next() } else { non.next() };
            next.copied().unwrap_or(f64::NAN)
        })
        .collect()
}

/// Named forward models, resolved once at startup.
#[derive(Clone, Default)]
pub struct ModelRegistry {
    models: BTreeMap<&'static str, Arc<dyn ForwardModel>>,
}

impl ModelRegistry {
    /// Registry with the built-in models in their default configuration.
    pub fn builtin() -> Self {
        let mut registry = Self::default();
        registry.register(Arc::new(BiexpModel));
        registry.register(Arc::new(AslRestModel::default()));
        registry
    }

    /// Register (or replace) a model under its own name.
    pub fn register(&mut self, model: Arc<dyn ForwardModel>) {
        self.models.insert(model.name(), model);
    }

    pub fn resolve(&self, name: &str) -> Result<Arc<dyn ForwardModel>, AppError> {
        self.models.get(name).cloned().ok_or_else(|| {
            AppError::config(format!(
                "Unknown forward model '{name}' (available: {}).",
                self.names().join(", ")
            ))
        })
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.models.keys().copied().collect()
    }
}

impl std::fmt::Debug for ModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelRegistry")
            .field("models", &self.names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registry_resolves_builtin_names() {
        let registry = ModelRegistry::builtin();
        assert_eq!(registry.names(), vec!["aslrest", "biexp"]);
        assert_eq!(registry.resolve("biexp").unwrap().name(), "biexp");
        let err = registry.resolve("triexp").err().unwrap();
        assert_eq!(err.kind(), crate::error::ErrorKind::Configuration);
    }

    #[test]
    fn split_and_merge_are_inverse_in_canonical_order() {
        let model = BiexpModel;
        // Supplied out of order on purpose.
        let params = ParameterVector::from_pairs(&[
            ("rate2", 0.1),
            ("amp1", 42.0),
            ("rate1", 1.0),
            ("amp2", 40.0),
        ])
        .unwrap();
        let (linear, nonlinear) = split_params(model.params(), &params).unwrap();
        assert_eq!(linear, vec![42.0, 40.0]);
        assert_eq!(nonlinear, vec![1.0, 0.1]);
        assert_eq!(
            merge_params(model.params(), &linear, &nonlinear),
            vec![42.0, 1.0, 40.0, 0.1]
        );
    }

    #[test]
    fn evaluate_reports_missing_parameter() {
        let model = BiexpModel;
        let params = ParameterVector::from_pairs(&[("amp1", 1.0)]).unwrap();
        let grid = TimeGrid::uniform(0.1, 3).unwrap();
        assert!(model.evaluate(&params, &grid).is_err());
    }

    #[test]
    fn per_location_grids_may_differ() {
        let field = ParameterField::new(
            vec!["amp1".into(), "rate1".into(), "amp2".into(), "rate2".into()],
            vec![vec![1.0, 2.0], vec![1.0, 1.0], vec![0.0, 0.0], vec![0.1, 0.1]],
        )
        .unwrap();
        let schedule = Schedule::PerLocation(vec![
            TimeGrid::uniform(0.1, 3).unwrap(),
            TimeGrid::explicit(vec![0.0, 0.5]).unwrap(),
        ]);
        let set = evaluate_field(&BiexpModel, &field, &schedule).unwrap();
        assert_eq!(set.get(0).unwrap().len(), 3);
        assert_eq!(set.get(1).unwrap().values()[0], 2.0);
        assert_eq!(set.get(1).unwrap().len(), 2);
    }
}
