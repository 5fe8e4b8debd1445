//! Diode models.
//!
//! Uses the Shockley diode equation:
//!   I = Is * (exp(V / (n * Vt)) - 1)
//!
//! Above a critical voltage the exponential is replaced by its tangent, which
//! keeps the wave-domain Newton solve away from overflow.

use super::linear::require_positive;
use crate::dsl::ModelDef;
use crate::error::Result;
use crate::THERMAL_VOLTAGE;

/// Bias current used to pick the port resistance of a nonlinear leaf that
/// is not at the root.
pub const SMALL_SIGNAL_BIAS: f64 = 1e-3;

/// Shockley parameters of a diode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiodeModel {
    /// Saturation current (Is), typically 1e-14 to 1e-9 A
    pub is: f64,
    /// Ideality factor (n), typically 1.0 to 2.0
    pub n: f64,
    /// Voltage above which the exponential is linearised
    pub v_crit: f64,
}

impl Default for DiodeModel {
    fn default() -> Self {
        Self::silicon()
    }
}

impl DiodeModel {
    /// Generic small-signal silicon diode.
    pub fn silicon() -> Self {
        Self {
            is: 1e-14,
            n: 1.0,
            v_crit: 0.7,
        }
    }

    /// Germanium diode (lower forward voltage).
    pub fn germanium() -> Self {
        Self {
            is: 1e-9,
            n: 1.5,
            v_crit: 0.5,
        }
    }

    /// Build from a `.model NAME D (...)` definition. Missing parameters keep
    /// the silicon defaults.
    pub fn from_model(model: &ModelDef) -> Result<Self> {
        let mut params = Self::silicon();
        if let Some(&is) = model.params.get("is") {
            params.is = is;
        }
        if let Some(&n) = model.params.get("n") {
            params.n = n;
        }
        if let Some(&vf) = model.params.get("vf") {
            params.v_crit = vf;
        }
        params.validate(&model.name)?;
        Ok(params)
    }

    /// Thermal voltage times ideality factor.
    pub fn n_vt(&self) -> f64 {
        self.n * THERMAL_VOLTAGE
    }

    /// Diode current at voltage `v` (anode to cathode).
    pub fn current(&self, v: f64) -> f64 {
        let n_vt = self.n_vt();
        if v > self.v_crit {
            let e = (self.v_crit / n_vt).exp();
            let i_crit = self.is * (e - 1.0);
            let g_crit = self.is / n_vt * e;
            i_crit + g_crit * (v - self.v_crit)
        } else {
            self.is * ((v / n_vt).exp() - 1.0)
        }
    }

    /// Small-signal conductance dI/dV at voltage `v`.
    pub fn conductance(&self, v: f64) -> f64 {
        let n_vt = self.n_vt();
        let g = self.is / n_vt * (v.min(self.v_crit) / n_vt).exp();
        g.max(1e-12)
    }

    /// Limit a Newton voltage step.
    pub fn limit_voltage_step(&self, v_old: f64, v_new: f64) -> f64 {
        let max_step = self.v_crit.max(0.5);
        if (v_new - v_old).abs() > max_step {
            if v_new > v_old {
                v_old + max_step
            } else {
                v_old - max_step
            }
        } else {
            v_new
        }
    }

    /// Incremental resistance at [`SMALL_SIGNAL_BIAS`].
    pub fn small_signal_resistance(&self) -> f64 {
        self.n_vt() / SMALL_SIGNAL_BIAS
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        require_positive(name, "saturation current", self.is)?;
        require_positive(name, "ideality factor", self.n)?;
        require_positive(name, "critical voltage", self.v_crit)
    }
}

/// A single diode, anode on the edge's first vertex.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Diode {
    pub model: DiodeModel,
}

impl Diode {
    pub fn new(model: DiodeModel) -> Self {
        Self { model }
    }

    pub fn current(&self, v: f64) -> f64 {
        self.model.current(v)
    }

    pub fn conductance(&self, v: f64) -> f64 {
        self.model.conductance(v)
    }
}

/// Two identical diodes in anti-parallel, the classic symmetric clipper.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DiodePair {
    pub model: DiodeModel,
}

impl DiodePair {
    pub fn new(model: DiodeModel) -> Self {
        Self { model }
    }

    /// Net current: forward diode minus reverse diode.
    pub fn current(&self, v: f64) -> f64 {
        self.model.current(v) - self.model.current(-v)
    }

    pub fn conductance(&self, v: f64) -> f64 {
        self.model.conductance(v) + self.model.conductance(-v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_diode_forward_bias() {
        let d = Diode::default();

        // At 0V, current should be approximately 0
        assert!(d.current(0.0).abs() < 1e-10);

        // At forward bias, current should increase exponentially
        let i_small = d.current(0.3);
        let i_large = d.current(0.6);
        assert!(i_large > i_small * 100.0);
    }

    #[test]
    fn test_diode_reverse_bias() {
        let d = Diode::default();

        // In reverse bias, current should approach -Is
        let i_rev = d.current(-1.0);
        assert!(i_rev < 0.0);
        assert!(i_rev > -2.0 * d.model.is);
    }

    #[test]
    fn test_linear_extrapolation_is_continuous() {
        let m = DiodeModel::silicon();
        let below = m.current(m.v_crit - 1e-9);
        let above = m.current(m.v_crit + 1e-9);
        assert_relative_eq!(below, above, max_relative = 1e-6);
        // Far above v_crit the current stays finite
        assert!(m.current(50.0).is_finite());
    }

    #[test]
    fn test_pair_is_odd() {
        let p = DiodePair::new(DiodeModel::germanium());
        for v in [0.05, 0.2, 0.4, 1.5] {
            assert_relative_eq!(p.current(v), -p.current(-v), max_relative = 1e-12);
        }
        assert_relative_eq!(p.conductance(0.3), p.conductance(-0.3));
    }

    #[test]
    fn test_step_limit() {
        let m = DiodeModel::silicon();
        assert_relative_eq!(m.limit_voltage_step(0.0, 5.0), 0.7);
        assert_relative_eq!(m.limit_voltage_step(0.0, -5.0), -0.7);
        assert_relative_eq!(m.limit_voltage_step(0.1, 0.3), 0.3);
    }
}
