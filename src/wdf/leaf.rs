//! One-port wave elements at the leaves of a WDF tree.
//!
//! Port conventions: `a = v + R i` is the wave incident on the element and
//! `b = v - R i` the wave it reflects, with `i` flowing into the element's
//! positive terminal. Every linear element is a Thevenin pair `(e, R)`, so a
//! matched leaf simply reflects `b = e`.

use std::f64::consts::TAU;

use crate::circuit::EdgeId;
use crate::components::{Component, Diode, DiodeModel, DiodePair, SourceWaveform};
use crate::solver::{NewtonOutcome, NewtonRaphson};

/// How a voltage source is driven.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Drive {
    /// Audio input sample times `amplitude`
    Input { amplitude: f64, sample: f64 },
    /// Free-running sinusoid
    Sine { amplitude: f64, phase: f64, step: f64 },
    /// Constant voltage
    Dc(f64),
}

impl Drive {
    fn voltage(&self) -> f64 {
        match *self {
            Drive::Input { amplitude, sample } => amplitude * sample,
            Drive::Sine {
                amplitude, phase, ..
            } => amplitude * phase.sin(),
            Drive::Dc(v) => v,
        }
    }
}

/// Shockley junction of a nonlinear leaf.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Junction {
    Single(Diode),
    Pair(DiodePair),
}

impl Junction {
    fn model(&self) -> &DiodeModel {
        match self {
            Junction::Single(d) => &d.model,
            Junction::Pair(p) => &p.model,
        }
    }

    fn current(&self, v: f64) -> f64 {
        match self {
            Junction::Single(d) => d.current(v),
            Junction::Pair(p) => p.current(v),
        }
    }

    fn conductance(&self, v: f64) -> f64 {
        match self {
            Junction::Single(d) => d.conductance(v),
            Junction::Pair(p) => p.conductance(v),
        }
    }

    /// Solve `v + R i(v) = a` for the port voltage, warm-started at `v0`.
    fn solve(&self, a: f64, r: f64, v0: f64, newton: &NewtonRaphson) -> NewtonOutcome {
        let model = *self.model();
        newton.solve(
            v0,
            |v| (v + r * self.current(v) - a, 1.0 + r * self.conductance(v)),
            |old, new| model.limit_voltage_step(old, new),
        )
    }
}

/// Wave-domain element state.
#[derive(Debug, Clone, PartialEq)]
pub enum Element {
    Resistor,
    Capacitor { state: f64, initial: f64 },
    Inductor { state: f64 },
    VoltageSource { drive: Drive },
    CurrentSource { voltage: f64 },
    Nonlinear {
        junction: Junction,
        /// Newton warm start
        v_op: f64,
        /// Incident wave from the previous sample (non-root use)
        a_prev: f64,
    },
}

/// A component placed at a leaf of the tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Leaf {
    pub edge: EdgeId,
    pub name: String,
    pub element: Element,
    /// Port resistance of the element itself
    resistance: f64,
}

impl Leaf {
    /// Create a leaf for `component` at sampling period `t`.
    ///
    /// `is_input` switches a voltage source from its own waveform to the
    /// audio input. Nonlinear leaves get the small-signal resistance of
    /// their junction; this only matters when they are not at the root.
    pub fn new(edge: EdgeId, name: &str, component: &Component, t: f64, is_input: bool) -> Self {
        let (element, resistance) = match *component {
            Component::Resistor(r) => (Element::Resistor, r.port_resistance()),
            Component::Capacitor(c) => (
                Element::Capacitor {
                    state: c.initial_voltage,
                    initial: c.initial_voltage,
                },
                c.port_resistance(t),
            ),
            Component::Inductor(l) => (Element::Inductor { state: 0.0 }, l.port_resistance(t)),
            Component::VoltageSource(v) => {
                let drive = match v.waveform {
                    SourceWaveform::Ac { amplitude, .. } if is_input => Drive::Input {
                        amplitude,
                        sample: 0.0,
                    },
                    SourceWaveform::Ac {
                        frequency,
                        amplitude,
                    } => Drive::Sine {
                        amplitude,
                        phase: 0.0,
                        step: TAU * frequency * t,
                    },
                    SourceWaveform::Dc { voltage } if is_input => Drive::Input {
                        amplitude: voltage,
                        sample: 0.0,
                    },
                    SourceWaveform::Dc { voltage } => Drive::Dc(voltage),
                };
                (Element::VoltageSource { drive }, v.resistance)
            }
            Component::CurrentSource(i) => (
                Element::CurrentSource {
                    voltage: i.thevenin_voltage(),
                },
                i.resistance,
            ),
            Component::Diode(d) => (
                Element::Nonlinear {
                    junction: Junction::Single(d),
                    v_op: 0.0,
                    a_prev: 0.0,
                },
                d.model.small_signal_resistance(),
            ),
            Component::DiodePair(p) => (
                Element::Nonlinear {
                    junction: Junction::Pair(p),
                    v_op: 0.0,
                    a_prev: 0.0,
                },
                p.model.small_signal_resistance() / 2.0,
            ),
        };

        Self {
            edge,
            name: name.to_string(),
            element,
            resistance,
        }
    }

    /// Port resistance of the element.
    pub fn port_resistance(&self) -> f64 {
        self.resistance
    }

    /// Whether the leaf is nonlinear.
    pub fn is_nonlinear(&self) -> bool {
        matches!(self.element, Element::Nonlinear { .. })
    }

    /// Thevenin voltage of a linear element.
    fn thevenin(&self) -> f64 {
        match &self.element {
            Element::Resistor | Element::Nonlinear { .. } => 0.0,
            Element::Capacitor { state, .. } => *state,
            Element::Inductor { state } => -*state,
            Element::VoltageSource { drive } => drive.voltage(),
            Element::CurrentSource { voltage } => *voltage,
        }
    }

    /// Reflected wave of a matched leaf.
    ///
    /// A nonlinear leaf solves its law against the previous sample's
    /// incident wave. The outcome is returned when that solve failed.
    pub fn reflect(&mut self, newton: &NewtonRaphson) -> (f64, Option<NewtonOutcome>) {
        let r = self.resistance;
        match &mut self.element {
            Element::Nonlinear {
                junction,
                v_op,
                a_prev,
            } => {
                let out = junction.solve(*a_prev, r, *v_op, newton);
                *v_op = out.x;
                let b = 2.0 * out.x - *a_prev;
                (b, (!out.converged).then_some(out))
            }
            _ => (self.thevenin(), None),
        }
    }

    /// Latch the incident wave of a matched leaf.
    pub fn incident(&mut self, a: f64) {
        match &mut self.element {
            Element::Capacitor { state, .. } | Element::Inductor { state } => *state = a,
            Element::Nonlinear { a_prev, .. } => *a_prev = a,
            _ => {}
        }
    }

    /// Resolve the leaf as the tree root, connected to a network of port
    /// resistance `link` that sends the incident wave `a`. Returns the
    /// reflected wave in the link's wave variables and latches state.
    pub fn resolve_root(
        &mut self,
        a: f64,
        link: f64,
        newton: &NewtonRaphson,
    ) -> (f64, Option<NewtonOutcome>) {
        if let Element::Nonlinear { junction, v_op, .. } = &mut self.element {
            let out = junction.solve(a, link, *v_op, newton);
            *v_op = out.x;
            return (2.0 * out.x - a, (!out.converged).then_some(out));
        }

        let e = self.thevenin();
        let r = self.resistance;
        let b = (2.0 * link * e + (r - link) * a) / (link + r);

        // Incident wave in the element's own port resistance
        let v = 0.5 * (a + b);
        let i = (a - b) / (2.0 * link);
        self.incident(v + r * i);
        (b, None)
    }

    /// Set the audio input sample of an input source.
    pub fn set_input(&mut self, x: f64) {
        if let Element::VoltageSource {
            drive: Drive::Input { sample, .. },
        } = &mut self.element
        {
            *sample = x;
        }
    }

    /// Change frequency and amplitude of a source.
    pub fn set_waveform(&mut self, frequency: f64, amplitude: f64, t: f64) {
        if let Element::VoltageSource { drive } = &mut self.element {
            match drive {
                Drive::Input { amplitude: a, .. } => *a = amplitude,
                Drive::Sine {
                    amplitude: a, step, ..
                } => {
                    *a = amplitude;
                    *step = TAU * frequency * t;
                }
                Drive::Dc(_) => {}
            }
        }
    }

    /// Advance free-running sources by one sample.
    pub fn tick(&mut self) {
        if let Element::VoltageSource {
            drive: Drive::Sine { phase, step, .. },
        } = &mut self.element
        {
            *phase = (*phase + *step) % TAU;
        }
    }

    /// Pseudo-energy `state² / R` held by a reactive element.
    pub fn stored_energy(&self) -> f64 {
        match &self.element {
            Element::Capacitor { state, .. } | Element::Inductor { state } => {
                state * state / self.resistance
            }
            _ => 0.0,
        }
    }

    /// Return to the initial state.
    pub fn reset(&mut self) {
        match &mut self.element {
            Element::Capacitor { state, initial } => *state = *initial,
            Element::Inductor { state } => *state = 0.0,
            Element::Nonlinear { v_op, a_prev, .. } => {
                *v_op = 0.0;
                *a_prev = 0.0;
            }
            Element::VoltageSource { drive } => match drive {
                Drive::Input { sample, .. } => *sample = 0.0,
                Drive::Sine { phase, .. } => *phase = 0.0,
                Drive::Dc(_) => {}
            },
            Element::Resistor | Element::CurrentSource { .. } => {}
        }
    }
}
