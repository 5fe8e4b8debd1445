//! Component models for circuit simulation.
//!
//! This module provides the typed values for every supported component:
//! - Linear: Resistor, Capacitor, Inductor
//! - Sources: Voltage Source (AC or DC), Current Source
//! - Nonlinear: Diode, anti-parallel Diode Pair
//!
//! Components are plain values. Their wave-domain state lives in the leaves
//! of a [`WdfTree`](crate::wdf::WdfTree).

mod diode;
mod linear;
mod sources;

pub use diode::{Diode, DiodeModel, DiodePair, SMALL_SIGNAL_BIAS};
pub use linear::{Capacitor, Inductor, Resistor};
pub use sources::{CurrentSource, SourceWaveform, VoltageSource, DEFAULT_SOURCE_RESISTANCE};

use crate::dsl::{ComponentDef, ComponentType, ModelDef, SourceType};
use crate::error::{Result, WdfError};

/// Frequency given to an AC source that does not specify one.
pub const DEFAULT_AC_FREQUENCY: f64 = 440.0;

/// Parallel resistance given to a current source that does not specify one.
pub const DEFAULT_NORTON_RESISTANCE: f64 = 1e6;

/// A circuit component.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Component {
    Resistor(Resistor),
    Capacitor(Capacitor),
    Inductor(Inductor),
    VoltageSource(VoltageSource),
    CurrentSource(CurrentSource),
    Diode(Diode),
    DiodePair(DiodePair),
}

impl Component {
    /// Create a component from a DSL definition.
    pub fn from_def(
        def: &ComponentDef,
        model: Option<&ModelDef>,
        default_source_resistance: f64,
    ) -> Result<Self> {
        let required = |what: &str| {
            def.value.ok_or_else(|| {
                WdfError::parse(def.line, format!("{} requires a {what}", def.name))
            })
        };

        let component = match def.component_type {
            ComponentType::Resistor => Component::Resistor(Resistor::new(required("resistance")?)),

            ComponentType::Capacitor => {
                let c = Capacitor::new(required("capacitance")?);
                let ic = def.params.get("ic").copied().unwrap_or(0.0);
                Component::Capacitor(c.with_initial_voltage(ic))
            }

            ComponentType::Inductor => Component::Inductor(Inductor::new(required("inductance")?)),

            ComponentType::VoltageSource => {
                let rs = def
                    .params
                    .get("rs")
                    .copied()
                    .unwrap_or(default_source_resistance);
                let source = match def.source {
                    Some(SourceType::Ac(amplitude)) => {
                        let freq = def
                            .params
                            .get("freq")
                            .copied()
                            .unwrap_or(DEFAULT_AC_FREQUENCY);
                        VoltageSource::ac(freq, amplitude)
                    }
                    Some(SourceType::Dc(voltage)) => VoltageSource::dc(voltage),
                    None => VoltageSource::dc(def.value.unwrap_or(0.0)),
                };
                Component::VoltageSource(source.with_resistance(rs))
            }

            ComponentType::CurrentSource => {
                let current = match def.source {
                    Some(SourceType::Dc(i)) | Some(SourceType::Ac(i)) => i,
                    None => def.value.unwrap_or(0.0),
                };
                let rp = def
                    .params
                    .get("rs")
                    .copied()
                    .unwrap_or(DEFAULT_NORTON_RESISTANCE);
                Component::CurrentSource(CurrentSource::new(current, rp))
            }

            ComponentType::Diode => Component::Diode(Diode::new(diode_model(model)?)),

            ComponentType::DiodePair => Component::DiodePair(DiodePair::new(diode_model(model)?)),
        };

        Ok(component)
    }

    /// Short human-readable kind name.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Component::Resistor(_) => "resistor",
            Component::Capacitor(_) => "capacitor",
            Component::Inductor(_) => "inductor",
            Component::VoltageSource(_) => "voltage source",
            Component::CurrentSource(_) => "current source",
            Component::Diode(_) => "diode",
            Component::DiodePair(_) => "diode pair",
        }
    }

    /// Check that all values are in their physical range.
    pub fn validate(&self, name: &str) -> Result<()> {
        match self {
            Component::Resistor(r) => r.validate(name),
            Component::Capacitor(c) => c.validate(name),
            Component::Inductor(l) => l.validate(name),
            Component::VoltageSource(v) => v.validate(name),
            Component::CurrentSource(i) => i.validate(name),
            Component::Diode(d) => d.model.validate(name),
            Component::DiodePair(p) => p.model.validate(name),
        }
    }

    /// Check if this component is nonlinear (requires Newton-Raphson iteration).
    pub fn is_nonlinear(&self) -> bool {
        matches!(self, Component::Diode(_) | Component::DiodePair(_))
    }

    /// Check if this component is a voltage or current source.
    pub fn is_source(&self) -> bool {
        matches!(
            self,
            Component::VoltageSource(_) | Component::CurrentSource(_)
        )
    }

    /// Check if this component holds one sample of state.
    pub fn is_reactive(&self) -> bool {
        matches!(self, Component::Capacitor(_) | Component::Inductor(_))
    }
}

fn diode_model(model: Option<&ModelDef>) -> Result<DiodeModel> {
    match model {
        Some(m) => DiodeModel::from_model(m),
        None => Ok(DiodeModel::silicon()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::circuit::ComponentOptions;
    use std::collections::HashMap;

    fn def(component_type: ComponentType, value: Option<f64>) -> ComponentDef {
        ComponentDef {
            component_type,
            name: "X1".to_string(),
            nodes: vec!["a".to_string(), "b".to_string()],
            value,
            source: None,
            model_ref: None,
            params: HashMap::new(),
            options: ComponentOptions::default(),
            line: 1,
        }
    }

    #[test]
    fn test_from_def_requires_values() {
        assert!(Component::from_def(&def(ComponentType::Resistor, None), None, 1.0).is_err());
        let c = Component::from_def(&def(ComponentType::Capacitor, Some(1e-9)), None, 1.0).unwrap();
        assert!(c.is_reactive());
    }

    #[test]
    fn test_from_def_voltage_source() {
        let mut d = def(ComponentType::VoltageSource, None);
        d.source = Some(SourceType::Ac(0.5));
        d.params.insert("freq".to_string(), 1000.0);
        let c = Component::from_def(&d, None, 10.0).unwrap();
        match c {
            Component::VoltageSource(v) => {
                assert_eq!(v.resistance, 10.0);
                assert_eq!(
                    v.waveform,
                    SourceWaveform::Ac {
                        frequency: 1000.0,
                        amplitude: 0.5
                    }
                );
            }
            other => panic!("expected voltage source, got {other:?}"),
        }
    }

    #[test]
    fn test_classification() {
        let d = Component::DiodePair(DiodePair::default());
        assert!(d.is_nonlinear());
        assert!(!d.is_source());
        assert_eq!(d.kind_name(), "diode pair");
        assert!(Component::CurrentSource(CurrentSource::new(1e-3, 1e3)).is_source());
    }
}
