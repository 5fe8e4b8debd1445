//! Voltage and current sources.

use super::linear::{require_finite, require_positive};
use crate::error::{Result, WdfError};

/// Default series resistance of a voltage source, in ohms.
pub const DEFAULT_SOURCE_RESISTANCE: f64 = 1.0;

/// What drives a voltage source.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceWaveform {
    /// Sinusoid. When the source is the audio input, the incoming samples
    /// replace the sinusoid and `amplitude` scales them.
    Ac { frequency: f64, amplitude: f64 },
    /// Constant voltage
    Dc { voltage: f64 },
}

/// A voltage source with series resistance (resistive voltage source).
///
/// A series resistance of zero describes an ideal source, which can only be
/// placed at the root of a WDF tree.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VoltageSource {
    pub waveform: SourceWaveform,
    /// Series resistance in ohms
    pub resistance: f64,
}

impl VoltageSource {
    /// AC source with the default series resistance.
    pub fn ac(frequency: f64, amplitude: f64) -> Self {
        Self {
            waveform: SourceWaveform::Ac {
                frequency,
                amplitude,
            },
            resistance: DEFAULT_SOURCE_RESISTANCE,
        }
    }

    /// DC source with the default series resistance.
    pub fn dc(voltage: f64) -> Self {
        Self {
            waveform: SourceWaveform::Dc { voltage },
            resistance: DEFAULT_SOURCE_RESISTANCE,
        }
    }

    /// Set the series resistance.
    pub fn with_resistance(mut self, resistance: f64) -> Self {
        self.resistance = resistance;
        self
    }

    /// Whether the source is ideal (no series resistance).
    pub fn is_ideal(&self) -> bool {
        self.resistance == 0.0
    }

    /// Voltage at time `t` seconds when running free.
    pub fn voltage_at(&self, t: f64) -> f64 {
        match self.waveform {
            SourceWaveform::Ac {
                frequency,
                amplitude,
            } => amplitude * (std::f64::consts::TAU * frequency * t).sin(),
            SourceWaveform::Dc { voltage } => voltage,
        }
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        match self.waveform {
            SourceWaveform::Ac {
                frequency,
                amplitude,
            } => {
                require_finite(name, "amplitude", amplitude)?;
                if !frequency.is_finite() || frequency < 0.0 {
                    return Err(WdfError::invalid_component(
                        name,
                        format!("frequency must be finite and non-negative, got {frequency}"),
                    ));
                }
            }
            SourceWaveform::Dc { voltage } => require_finite(name, "voltage", voltage)?,
        }
        if !self.resistance.is_finite() || self.resistance < 0.0 {
            return Err(WdfError::invalid_component(
                name,
                format!(
                    "source resistance must be finite and non-negative, got {}",
                    self.resistance
                ),
            ));
        }
        Ok(())
    }
}

/// A current source with parallel resistance (Norton form).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CurrentSource {
    /// Source current in amperes, flowing through the source from the
    /// positive to the negative terminal
    pub current: f64,
    /// Parallel resistance in ohms
    pub resistance: f64,
}

impl CurrentSource {
    /// Create a new current source.
    pub fn new(current: f64, resistance: f64) -> Self {
        Self {
            current,
            resistance,
        }
    }

    /// Equivalent Thevenin voltage `-I * R` across the positive and
    /// negative terminals.
    pub fn thevenin_voltage(&self) -> f64 {
        -self.current * self.resistance
    }

    pub(crate) fn validate(&self, name: &str) -> Result<()> {
        require_finite(name, "current", self.current)?;
        require_positive(name, "parallel resistance", self.resistance)
    }
}
