//! Netlist language for circuit descriptions.
//!
//! A small SPICE-like, line-oriented format. Each component line names a
//! two-terminal element, its positive and negative node, and its value.
//!
//! # Grammar Overview
//!
//! ```text
//! netlist    = { line }
//! line       = comment | directive | component | empty
//! comment    = ('#' | ';') { any_char }
//! directive  = ".title" text | ".samplerate" number
//!            | ".model" name type '(' { key '=' number } ')'
//! component  = name node node { value | source | key '=' number | model | flag }
//! source     = ("AC" | "DC") number
//! flag       = "input" | "output"
//! node       = identifier | number | "GND"
//! number     = ['-'|'+'] digit+ ['.' digit*] [('e'|'E') ['-'|'+'] digit+] [suffix]
//! suffix     = 'p' | 'n' | 'u' | 'm' | 'k' | 'M' | 'G'
//! ```
//!
//! # Components
//!
//! | Prefix | Component | Parameters |
//! |--------|-----------|------------|
//! | R | Resistor | value |
//! | C | Capacitor | value, `ic=` initial voltage |
//! | L | Inductor | value |
//! | V | Voltage source | `AC amp` with `freq=`, or `DC v`; `rs=` |
//! | I | Current source | `DC i`; `rs=` parallel resistance |
//! | D | Diode | optional model name |
//! | DP | Anti-parallel diode pair | optional model name |
//!
//! Ground is `0` (or `GND`).
//!
//! # Example
//!
//! ```text
//! .title RC low-pass
//! .samplerate 48000
//! V1  in  0   AC 1.0 freq=440 input
//! R1  in  out 1k
//! C1  out 0   100n output
//! ```

mod ast;
mod lexer;
mod parser;

pub use ast::*;
pub use lexer::{parse_value, Lexer, Token, TokenKind};
pub use parser::Parser;

use std::path::Path;

use crate::circuit::CircuitGraph;
use crate::components::Component;
use crate::error::{Result, WdfError};

/// Parse netlist text into an AST.
pub fn parse(input: &str) -> Result<CircuitAst> {
    let mut parser = Parser::new(Lexer::new(input))?;
    parser.parse()
}

/// Read and parse a netlist file.
pub fn parse_file(path: &Path) -> Result<CircuitAst> {
    let content = std::fs::read_to_string(path).map_err(|e| WdfError::FileReadError {
        path: path.display().to_string(),
        source: e,
    })?;
    parse(&content)
}

/// Assemble the circuit graph described by `ast`.
///
/// Voltage sources without `rs=` get `default_source_resistance`.
pub fn build_graph(ast: &CircuitAst, default_source_resistance: f64) -> Result<CircuitGraph> {
    let mut graph = CircuitGraph::new();

    for def in &ast.components {
        let model = match &def.model_ref {
            Some(name) => Some(ast.models.get(name).ok_or_else(|| WdfError::UndefinedModel {
                model: name.clone(),
                component: def.name.clone(),
            })?),
            None => None,
        };

        let component = Component::from_def(def, model, default_source_resistance)?;
        graph.create_edge(&def.name, component, def.options)?;
        graph.connect(&def.nodes[0], &def.nodes[1], &def.name)?;
        tracing::debug!(
            "netlist: {} {} between {} and {}",
            component.kind_name(),
            def.name,
            def.nodes[0],
            def.nodes[1]
        );
    }

    tracing::info!(
        vertices = graph.vertex_count(),
        edges = graph.edge_count(),
        "circuit graph assembled"
    );
    Ok(graph)
}
