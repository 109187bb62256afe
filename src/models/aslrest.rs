//! Resting-state ASL kinetic model (well-mixed single compartment).
//!
//! Parameters:
//! - `ftiss`: tissue perfusion (CBF), linear
//! - `delttiss`: arterial transit time (ATT, seconds), nonlinear
//!
//! Time points are the time since labelling started: `pld + tau` for (p)CASL,
//! the inversion time for pulsed ASL (see `TimeGrid::multi_delay`).

use super::{ForwardModel, ParamSpec, Spacing};

const PARAMS: [ParamSpec; 2] = [
    ParamSpec::linear("ftiss"),
    ParamSpec::nonlinear("delttiss", 0.2, 3.0, 57, Spacing::Linear),
];

/// Perfusion used to derive the apparent T1 (ml/g/s).
const CALIB_FLOW: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AslRestModel {
    /// Continuous (pCASL) rather than pulsed labelling.
    pub casl: bool,
    /// Bolus duration (s).
    pub tau: f64,
    /// Tissue T1 (s).
    pub t1: f64,
    /// Blood T1 (s).
    pub t1b: f64,
    /// Blood/tissue partition coefficient.
    pub pc: f64,
}

impl Default for AslRestModel {
    fn default() -> Self {
        Self {
            casl: true,
            tau: 1.8,
            t1: 1.3,
            t1b: 1.65,
            pc: 0.9,
        }
    }
}

impl AslRestModel {
    pub fn with_casl(casl: bool) -> Self {
        Self {
            casl,
            ..Self::default()
        }
    }

    fn t1_app(&self) -> f64 {
        1.0 / (1.0 / self.t1 + CALIB_FLOW / self.pc)
    }

    /// Kinetic curve for unit perfusion.
    pub fn kinetic_curve(&self, t: f64, att: f64) -> f64 {
        if t < att {
            return 0.0;
        }
        let tau = self.tau;
        if self.casl {
            let t1_app = self.t1_app();
            let arrival = 2.0 * t1_app * (-att / self.t1b).exp();
            if t <= att + tau {
                arrival * (1.0 - (-(t - att) / t1_app).exp())
            } else {
                arrival * (-(t - tau - att) / t1_app).exp() * (1.0 - (-tau / t1_app).exp())
            }
        } else {
            let decay = 2.0 * (-t / self.t1b).exp();
            if t <= att + tau {
                decay * (t - att)
            } else {
                decay * tau
            }
        }
    }
}

impl ForwardModel for AslRestModel {
    fn name(&self) -> &'static str {
        "aslrest"
    }

    fn params(&self) -> &[ParamSpec] {
        &PARAMS
    }

    fn fill_design_row(&self, t: f64, nonlinear: &[f64], out: &mut [f64]) {
        out[0] = self.kinetic_curve(t, nonlinear[0]);
    }
}
