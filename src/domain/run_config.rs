//! Typed options for the inference invocation.
//!
//! A `RunConfig` is assembled once through [`RunConfigBuilder`] and is
//! immutable afterwards. The builder validates option combinations up front
//! (exactly one acquisition kind, method hyperparameters in range, an output
//! directory) so the inference invocation never sees a half-formed
//! configuration.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::domain::Method;
use crate::error::AppError;

/// Method-specific hyperparameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "lowercase")]
pub enum MethodOptions {
    Avb {
        max_iterations: u32,
    },
    Svb {
        epochs: u32,
        learning_rate: f64,
        sample_size: u32,
        batch_size: u32,
    },
}

impl MethodOptions {
    pub fn method(&self) -> Method {
        match self {
            MethodOptions::Avb { .. } => Method::Avb,
            MethodOptions::Svb { .. } => Method::Svb,
        }
    }

    fn validate(&self) -> Result<(), AppError> {
        match *self {
            MethodOptions::Avb { max_iterations } => {
                if max_iterations == 0 {
                    return Err(AppError::config("AVB max_iterations must be > 0."));
                }
            }
            MethodOptions::Svb {
                epochs,
                learning_rate,
                sample_size,
                batch_size,
            } => {
                if epochs == 0 || sample_size == 0 || batch_size == 0 {
                    return Err(AppError::config(
                        "SVB epochs, sample_size and batch_size must be > 0.",
                    ));
                }
                if !(learning_rate.is_finite() && learning_rate > 0.0) {
                    return Err(AppError::config(format!(
                        "SVB learning_rate must be > 0, got {learning_rate}."
                    )));
                }
            }
        }
        Ok(())
    }
}

/// How the acquisition samples time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Acquisition {
    Uniform { dt: f64 },
    MultiDelay { plds: Vec<f64>, repeats: usize, casl: bool },
}

/// Which outputs the inference invocation should write.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SaveFlags {
    pub mean: bool,
    pub model_fit: bool,
    pub input_data: bool,
    pub total_pv: bool,
    pub native: bool,
    pub model: bool,
    pub log: bool,
}

impl Default for SaveFlags {
    fn default() -> Self {
        Self {
            mean: true,
            model_fit: true,
            input_data: true,
            total_pv: true,
            native: true,
            model: true,
            log: false,
        }
    }
}

/// A model-space structure handed through to the inference engine.
///
/// Paths are passed through unchanged; this crate never opens them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ModelStructure {
    CorticalSurface {
        name: String,
        white: PathBuf,
        pial: PathBuf,
        projector: PathBuf,
    },
    PartialVolumes {
        name: String,
        vol_data: PathBuf,
        mask: Option<PathBuf>,
    },
}

/// Per-parameter prior override.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParamOverride {
    pub prior_type: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunConfig {
    pub model: String,
    #[serde(flatten)]
    pub method: MethodOptions,
    pub acquisition: Acquisition,
    pub output: PathBuf,
    pub save: SaveFlags,
    pub debug: bool,
    pub mask: Option<PathBuf>,
    pub model_structures: Vec<ModelStructure>,
    pub param_overrides: BTreeMap<String, ParamOverride>,
}

impl RunConfig {
    pub fn builder(model: impl Into<String>, method: MethodOptions) -> RunConfigBuilder {
        RunConfigBuilder::new(model, method)
    }

    pub fn method_name(&self) -> &'static str {
        self.method.method().as_str()
    }

    pub fn to_json(&self) -> Result<String, AppError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| AppError::io(format!("Failed to serialize run config: {e}")))
    }
}

#[derive(Debug, Clone)]
pub struct RunConfigBuilder {
    model: String,
    method: MethodOptions,
    dt: Option<f64>,
    multi_delay: Option<(Vec<f64>, usize, bool)>,
    output: Option<PathBuf>,
    save: SaveFlags,
    debug: bool,
    mask: Option<PathBuf>,
    model_structures: Vec<ModelStructure>,
    param_overrides: BTreeMap<String, ParamOverride>,
}

impl RunConfigBuilder {
    fn new(model: impl Into<String>, method: MethodOptions) -> Self {
        Self {
            model: model.into(),
            method,
            dt: None,
            multi_delay: None,
            output: None,
            save: SaveFlags::default(),
            debug: false,
            mask: None,
            model_structures: Vec::new(),
            param_overrides: BTreeMap::new(),
        }
    }

    pub fn dt(mut self, dt: f64) -> Self {
        self.dt = Some(dt);
        self
    }

    pub fn multi_delay(mut self, plds: Vec<f64>, repeats: usize, casl: bool) -> Self {
        self.multi_delay = Some((plds, repeats, casl));
        self
    }

    pub fn output(mut self, output: impl Into<PathBuf>) -> Self {
        self.output = Some(output.into());
        self
    }

    pub fn save(mut self, save: SaveFlags) -> Self {
        self.save = save;
        self
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn mask(mut self, mask: impl Into<PathBuf>) -> Self {
        self.mask = Some(mask.into());
        self
    }

    pub fn structure(mut self, structure: ModelStructure) -> Self {
        self.model_structures.push(structure);
        self
    }

    pub fn prior_override(
        mut self,
        param: impl Into<String>,
        prior_type: impl Into<String>,
    ) -> Self {
        self.param_overrides.insert(
            param.into(),
            ParamOverride {
                prior_type: prior_type.into(),
            },
        );
        self
    }

    pub fn build(self) -> Result<RunConfig, AppError> {
        if self.model.trim().is_empty() {
            return Err(AppError::config("Run config requires a model name."));
        }
        self.method.validate()?;

        let acquisition = match (self.dt, self.multi_delay) {
            (Some(_), Some(_)) => {
                return Err(AppError::config(
                    "Uniform time resolution and multi-delay acquisition are mutually exclusive.",
                ));
            }
            (None, None) => {
                return Err(AppError::config(
                    "Run config requires either a time resolution or a PLD list.",
                ));
            }
            (Some(dt), None) => {
                if !(dt.is_finite() && dt > 0.0) {
                    return Err(AppError::config(format!("Time resolution must be > 0, got {dt}.")));
                }
                Acquisition::Uniform { dt }
            }
            (None, Some((plds, repeats, casl))) => {
                if plds.is_empty() {
                    return Err(AppError::config("At least one PLD is required."));
                }
                if repeats == 0 {
                    return Err(AppError::config("Number of repeats must be > 0."));
                }
                Acquisition::MultiDelay { plds, repeats, casl }
            }
        };

        let output = self
            .output
            .ok_or_else(|| AppError::config("Run config requires an output directory."))?;

        Ok(RunConfig {
            model: self.model,
            method: self.method,
            acquisition,
            output,
            save: self.save,
            debug: self.debug,
            mask: self.mask,
            model_structures: self.model_structures,
            param_overrides: self.param_overrides,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn avb() -> MethodOptions {
        MethodOptions::Avb { max_iterations: 200 }
    }

    #[test]
    fn builder_requires_exactly_one_acquisition() {
        let both = RunConfig::builder("biexp", avb())
            .dt(0.1)
            .multi_delay(vec![1.0], 1, true)
            .output("out")
            .build();
        assert!(both.is_err());

        let neither = RunConfig::builder("biexp", avb()).output("out").build();
        assert!(neither.is_err());
    }

    #[test]
    fn builder_requires_output() {
        let err = RunConfig::builder("biexp", avb()).dt(0.1).build().unwrap_err();
        assert!(err.message().contains("output"));
    }

    #[test]
    fn builder_rejects_bad_svb_hyperparameters() {
        let method = MethodOptions::Svb {
            epochs: 300,
            learning_rate: 0.0,
            sample_size: 5,
            batch_size: 10,
        };
        assert!(RunConfig::builder("biexp", method).dt(0.1).output("o").build().is_err());
    }

    #[test]
    fn serialized_config_carries_method_fields() {
        let cfg = RunConfig::builder(
            "aslrest",
            MethodOptions::Svb {
                epochs: 300,
                learning_rate: 0.2,
                sample_size: 20,
                batch_size: 6,
            },
        )
        .multi_delay(vec![0.75, 1.0], 1, true)
        .output("hybrid_out")
        .prior_override("ftiss", "M")
        .build()
        .unwrap();

        let json: serde_json::Value = serde_json::from_str(&cfg.to_json().unwrap()).unwrap();
        assert_eq!(json["method"], "svb");
        assert_eq!(json["epochs"], 300);
        assert_eq!(json["acquisition"]["kind"], "multi_delay");
        assert_eq!(json["param_overrides"]["ftiss"]["prior_type"], "M");
        assert_eq!(cfg.method_name(), "svb");
    }
}
