//! Linear passive components: Resistor, Capacitor, Inductor.
//!
//! Reactive elements are discretised with the bilinear transform, which in
//! the wave domain turns them into one-sample delays with a port resistance
//! that depends on the sampling period.

use crate::error::{Result, WdfError};

/// A resistor component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Resistor {
    /// Resistance in ohms
    pub resistance: f64,
}

impl Resistor {
    /// Create a new resistor.
    pub fn new(resistance: f64) -> Self {
        Self { resistance }
    }

    /// Port resistance of the matched wave element.
    pub fn port_resistance(&self) -> f64 {
        self.resistance
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        require_positive(name, "resistance", self.resistance)
    }
}

/// A capacitor component.
///
/// Bilinear discretisation gives `R = T / (2C)` and `b[n] = a[n-1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Capacitor {
    /// Capacitance in farads
    pub capacitance: f64,
    /// Voltage across the capacitor before the first sample
    pub initial_voltage: f64,
}

impl Capacitor {
    /// Create a new, uncharged capacitor.
    pub fn new(capacitance: f64) -> Self {
        Self {
            capacitance,
            initial_voltage: 0.0,
        }
    }

    /// Set the initial voltage.
    pub fn with_initial_voltage(mut self, volts: f64) -> Self {
        self.initial_voltage = volts;
        self
    }

    /// Port resistance for sampling period `t`.
    pub fn port_resistance(&self, t: f64) -> f64 {
        t / (2.0 * self.capacitance)
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        require_positive(name, "capacitance", self.capacitance)?;
        require_finite(name, "initial voltage", self.initial_voltage)
    }
}

/// An inductor component.
///
/// Bilinear discretisation gives `R = 2L / T` and `b[n] = -a[n-1]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Inductor {
    /// Inductance in henries
    pub inductance: f64,
}

impl Inductor {
    /// Create a new inductor.
    pub fn new(inductance: f64) -> Self {
        Self { inductance }
    }

    /// Port resistance for sampling period `t`.
    pub fn port_resistance(&self, t: f64) -> f64 {
        2.0 * self.inductance / t
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        require_positive(name, "inductance", self.inductance)
    }
}

pub(crate) fn require_positive(name: &str, what: &str, value: f64) -> Result<()> {
    if value.is_finite() && value > 0.0 {
        Ok(())
    } else {
        Err(WdfError::invalid_component(
            name,
            format!("{what} must be finite and positive, got {value}"),
        ))
    }
}

pub(crate) fn require_finite(name: &str, what: &str, value: f64) -> Result<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(WdfError::invalid_component(
            name,
            format!("{what} must be finite, got {value}"),
        ))
    }
}
