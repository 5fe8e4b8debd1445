//! Syntax tree of a parsed netlist.

use std::collections::HashMap;

use crate::circuit::ComponentOptions;

/// A parsed netlist, before it is assembled into a circuit graph.
#[derive(Debug, Clone, Default)]
pub struct CircuitAst {
    /// `.title` text
    pub title: Option<String>,
    /// `.samplerate` in Hz
    pub sample_rate: Option<f64>,
    /// Components in source order
    pub components: Vec<ComponentDef>,
    /// `.model` definitions by name
    pub models: HashMap<String, ModelDef>,
}

impl CircuitAst {
    pub fn new() -> Self {
        Self::default()
    }

    /// Node names in order of first use. Ground is spelled `0`.
    pub fn nodes(&self) -> Vec<&str> {
        let mut nodes: Vec<&str> = Vec::new();
        for node in self.components.iter().flat_map(|c| c.nodes.iter()) {
            if !nodes.contains(&node.as_str()) {
                nodes.push(node);
            }
        }
        nodes
    }
}

/// One component line.
#[derive(Debug, Clone)]
pub struct ComponentDef {
    pub component_type: ComponentType,
    pub name: String,
    /// Positive node first
    pub nodes: Vec<String>,
    /// Bare numeric value (resistance, capacitance, ...)
    pub value: Option<f64>,
    /// `AC amp` / `DC v` for sources
    pub source: Option<SourceType>,
    pub model_ref: Option<String>,
    /// `key=value` parameters, keys lowercased
    pub params: HashMap<String, f64>,
    pub options: ComponentOptions,
    pub line: usize,
}

/// Component kinds, selected by name prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentType {
    Resistor,
    Capacitor,
    Inductor,
    VoltageSource,
    CurrentSource,
    Diode,
    /// Anti-parallel diode pair (`DP` prefix)
    DiodePair,
}

impl ComponentType {
    /// Classify a component by its name, e.g. `R1` or `DP2`.
    pub fn from_name(name: &str) -> Option<Self> {
        let upper = name.to_ascii_uppercase();
        if upper.starts_with("DP") {
            return Some(Self::DiodePair);
        }
        match upper.chars().next()? {
            'R' => Some(Self::Resistor),
            'C' => Some(Self::Capacitor),
            'L' => Some(Self::Inductor),
            'V' => Some(Self::VoltageSource),
            'I' => Some(Self::CurrentSource),
            'D' => Some(Self::Diode),
            _ => None,
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, Self::VoltageSource | Self::CurrentSource)
    }

    /// Whether a trailing identifier names a `.model`.
    pub fn takes_model(&self) -> bool {
        matches!(self, Self::Diode | Self::DiodePair)
    }
}

/// A `.model` definition.
#[derive(Debug, Clone)]
pub struct ModelDef {
    pub name: String,
    pub model_type: ModelType,
    /// Parameters, keys lowercased
    pub params: HashMap<String, f64>,
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelType {
    Diode,
}

impl ModelType {
    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "D" | "DIODE" => Some(Self::Diode),
            _ => None,
        }
    }
}

/// Source waveform keyword.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SourceType {
    /// `AC amplitude`
    Ac(f64),
    /// `DC value`
    Dc(f64),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefixes() {
        assert_eq!(ComponentType::from_name("r12"), Some(ComponentType::Resistor));
        assert_eq!(ComponentType::from_name("DP1"), Some(ComponentType::DiodePair));
        assert_eq!(ComponentType::from_name("D1"), Some(ComponentType::Diode));
        assert_eq!(ComponentType::from_name("Q1"), None);
    }
}
