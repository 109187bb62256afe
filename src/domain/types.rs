//! Shared domain types.
//!
//! Everything here is created once per run and never mutated afterwards:
//! operations that "change" a value (noise injection, projection) return a
//! new one. The types are serializable so they can be exported as run
//! artifacts.

use clap::ValueEnum;
use serde::{Deserialize, Serialize};

use crate::error::AppError;

/// Inference method handed to the inference invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Method {
    /// Analytic variational Bayes.
    Avb,
    /// Stochastic variational Bayes.
    Svb,
}

impl Method {
    pub fn as_str(self) -> &'static str {
        match self {
            Method::Avb => "avb",
            Method::Svb => "svb",
        }
    }
}

/// Ordered named scalar parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterVector {
    names: Vec<String>,
    values: Vec<f64>,
}

impl ParameterVector {
    pub fn new(names: Vec<String>, values: Vec<f64>) -> Result<Self, AppError> {
        if names.len() != values.len() {
            return Err(AppError::config(format!(
                "Parameter vector has {} names but {} values.",
                names.len(),
                values.len()
            )));
        }
        if let Some((name, value)) = names
            .iter()
            .zip(values.iter())
            .find(|(_, v)| !v.is_finite())
        {
            return Err(AppError::config(format!("Parameter '{name}' is not finite: {value}.")));
        }
        Ok(Self { names, values })
    }

    /// Build from `(name, value)` pairs.
    pub fn from_pairs(pairs: &[(&str, f64)]) -> Result<Self, AppError> {
        Self::new(
            pairs.iter().map(|(n, _)| n.to_string()).collect(),
            pairs.iter().map(|(_, v)| *v).collect(),
        )
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<f64> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.values[i])
    }
}

/// One parameter vector per location, stored column-wise.
///
/// Column `i` holds the values of parameter `names[i]` for every location,
/// cortex vertices first, then the remaining regions in declaration order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterField {
    names: Vec<String>,
    columns: Vec<Vec<f64>>,
}

impl ParameterField {
    pub fn new(names: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self, AppError> {
        if names.len() != columns.len() {
            return Err(AppError::config(format!(
                "Parameter field has {} names but {} columns.",
                names.len(),
                columns.len()
            )));
        }
        if let Some(first) = columns.first() {
            if columns.iter().any(|c| c.len() != first.len()) {
                return Err(AppError::config("Parameter field columns differ in length."));
            }
        }
        Ok(Self { names, columns })
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn n_locations(&self) -> usize {
        self.columns.first().map_or(0, Vec::len)
    }

    pub fn column(&self, name: &str) -> Option<&[f64]> {
        self.names
            .iter()
            .position(|n| n == name)
            .map(|i| self.columns[i].as_slice())
    }

    /// Parameter vector at one location.
    pub fn at(&self, location: usize) -> Option<ParameterVector> {
        if location >= self.n_locations() {
            return None;
        }
        Some(ParameterVector {
            names: self.names.clone(),
            values: self.columns.iter().map(|c| c[location]).collect(),
        })
    }
}

/// Ordered sample timestamps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeGrid {
    times: Vec<f64>,
}

impl TimeGrid {
    /// `nt` samples spaced `dt` apart, starting at zero.
    pub fn uniform(dt: f64, nt: usize) -> Result<Self, AppError> {
        if !(dt.is_finite() && dt > 0.0) {
            return Err(AppError::config(format!("Time resolution must be > 0, got {dt}.")));
        }
        if nt == 0 {
            return Err(AppError::config("Number of time points must be > 0."));
        }
        Ok(Self {
            times: (0..nt).map(|t| t as f64 * dt).collect(),
        })
    }

    /// Multi-delay acquisition: every delay once, repeated `repeats` times.
    ///
    /// For (p)CASL the effective time since labelling starts is
    /// `pld + label_duration`; for pulsed labelling it is the delay itself.
    pub fn multi_delay(
        plds: &[f64],
        repeats: usize,
        label_duration: f64,
        casl: bool,
    ) -> Result<Self, AppError> {
        if plds.is_empty() {
            return Err(AppError::config("At least one PLD is required."));
        }
        if repeats == 0 {
            return Err(AppError::config("Number of repeats must be > 0."));
        }
        if plds.iter().any(|p| !p.is_finite() || *p < 0.0) {
            return Err(AppError::config("PLDs must be finite and >= 0."));
        }
        let offset = if casl { label_duration } else { 0.0 };
        let mut times = Vec::with_capacity(plds.len() * repeats);
        for _ in 0..repeats {
            times.extend(plds.iter().map(|p| p + offset));
        }
        Ok(Self { times })
    }

    pub fn explicit(times: Vec<f64>) -> Result<Self, AppError> {
        if times.is_empty() {
            return Err(AppError::config("Time grid must not be empty."));
        }
        if times.iter().any(|t| !t.is_finite()) {
            return Err(AppError::config("Time grid entries must be finite."));
        }
        Ok(Self { times })
    }

    pub fn times(&self) -> &[f64] {
        &self.times
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }
}

/// Sampling schedule: one grid shared by every location, or one per location.
#[derive(Debug, Clone, PartialEq)]
pub enum Schedule {
    Shared(TimeGrid),
    PerLocation(Vec<TimeGrid>),
}

impl Schedule {
    pub fn grid(&self, location: usize) -> Option<&TimeGrid> {
        match self {
            Schedule::Shared(grid) => Some(grid),
            Schedule::PerLocation(grids) => grids.get(location),
        }
    }
}

/// Signal values aligned to one time grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalTrace {
    values: Vec<f64>,
}

impl SignalTrace {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// One trace per location (model nodes or data voxels).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalSet {
    traces: Vec<SignalTrace>,
}

impl SignalSet {
    pub fn new(traces: Vec<SignalTrace>) -> Self {
        Self { traces }
    }

    pub fn single(trace: SignalTrace) -> Self {
        Self { traces: vec![trace] }
    }

    pub fn traces(&self) -> &[SignalTrace] {
        &self.traces
    }

    pub fn n_locations(&self) -> usize {
        self.traces.len()
    }

    pub fn get(&self, location: usize) -> Option<&SignalTrace> {
        self.traces.get(location)
    }
}

/// Gaussian noise specification (mean is always zero).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoiseSpec {
    std_dev: f64,
    seed: Option<u64>,
}

impl NoiseSpec {
    /// `std_dev == 0` is allowed and means "no noise".
    pub fn new(std_dev: f64, seed: Option<u64>) -> Result<Self, AppError> {
        if !(std_dev.is_finite() && std_dev >= 0.0) {
            return Err(AppError::config(format!(
                "Noise standard deviation must be finite and >= 0, got {std_dev}."
            )));
        }
        Ok(Self { std_dev, seed })
    }

    pub fn std_dev(&self) -> f64 {
        self.std_dev
    }

    pub fn variance(&self) -> f64 {
        self.std_dev * self.std_dev
    }

    /// Noise precision (`1 / variance`); infinite for noiseless data.
    pub fn precision(&self) -> f64 {
        1.0 / self.variance()
    }

    pub fn seed(&self) -> Option<u64> {
        self.seed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_grid_entries_are_multiples_of_dt() {
        let grid = TimeGrid::uniform(0.1, 100).unwrap();
        assert_eq!(grid.len(), 100);
        for (t, &v) in grid.times().iter().enumerate() {
            assert_eq!(v, 0.1 * t as f64);
        }
    }

    #[test]
    fn uniform_grid_rejects_bad_inputs() {
        assert!(TimeGrid::uniform(0.0, 10).is_err());
        assert!(TimeGrid::uniform(-0.1, 10).is_err());
        assert!(TimeGrid::uniform(0.1, 0).is_err());
    }

    #[test]
    fn multi_delay_tiles_plds_and_adds_label_duration() {
        let grid = TimeGrid::multi_delay(&[0.5, 1.0], 2, 1.8, true).unwrap();
        let expected = [2.3, 2.8, 2.3, 2.8];
        for (a, b) in grid.times().iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-12);
        }

        let pulsed = TimeGrid::multi_delay(&[0.5, 1.0], 1, 1.8, false).unwrap();
        assert_eq!(pulsed.times(), &[0.5, 1.0]);
    }

    #[test]
    fn parameter_field_rows_follow_columns() {
        let field = ParameterField::new(
            vec!["ftiss".into(), "delttiss".into()],
            vec![vec![60.0, 20.0], vec![1.3, 1.6]],
        )
        .unwrap();
        assert_eq!(field.n_locations(), 2);
        let wm = field.at(1).unwrap();
        assert_eq!(wm.get("ftiss"), Some(20.0));
        assert_eq!(wm.get("delttiss"), Some(1.6));
        assert!(field.at(2).is_none());
    }

    #[test]
    fn noise_spec_accepts_zero_and_rejects_negative() {
        assert!(NoiseSpec::new(0.0, None).is_ok());
        assert!(NoiseSpec::new(-1.0, None).is_err());
        assert!(NoiseSpec::new(f64::NAN, Some(1)).is_err());
        let spec = NoiseSpec::new(5.0, Some(1234)).unwrap();
        assert_eq!(spec.variance(), 25.0);
        assert!((spec.precision() - 0.04).abs() < 1e-15);
    }
}
