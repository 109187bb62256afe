//! Biexponential decay: `s(t) = amp1 exp(-rate1 t) + amp2 exp(-rate2 t)`.

use super::{ForwardModel, ParamSpec, Spacing};

const PARAMS: [ParamSpec; 4] = [
    ParamSpec::linear("amp1"),
    ParamSpec::nonlinear("rate1", 0.01, 10.0, 60, Spacing::Log),
    ParamSpec::linear("amp2"),
    ParamSpec::nonlinear("rate2", 0.01, 10.0, 60, Spacing::Log),
];

#[derive(Debug, Clone, Copy, Default)]
pub struct BiexpModel;

impl ForwardModel for BiexpModel {
    fn name(&self) -> &'static str {
        "biexp"
    }

    fn params(&self) -> &[ParamSpec] {
        &PARAMS
    }

    fn fill_design_row(&self, t: f64, nonlinear: &[f64], out: &mut [f64]) {
        out[0] = (-nonlinear[0] * t).exp();
        out[1] = (-nonlinear[1] * t).exp();
    }

    fn ordered_nonlinear(&self) -> bool {
        true
    }
}
