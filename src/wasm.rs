//! WASM bindings for Electree Core.
//!
//! JavaScript-friendly wrapper for use in an AudioWorklet.
//!
//! ## Usage (JavaScript)
//!
//! ```javascript
//! import init, { WasmWdfFilter } from 'electree_core';
//!
//! await init();
//!
//! const netlist = `
//!   V1 in  0   AC 1 input
//!   R1 in  out 10k
//!   C1 out 0   10n output
//! `;
//!
//! const filter = new WasmWdfFilter(netlist, 48000);
//!
//! // In AudioWorkletProcessor.process():
//! filter.process_block(inputs[0][0], outputs[0][0]);
//! ```

use wasm_bindgen::prelude::*;

use crate::dsl;
use crate::realtime::{self, RealtimeProcessor, TreePublisher};
use crate::simulation::{Simulation, SimulationConfig};
use crate::WdfError;

/// Initialize panic hook for better error messages in browser console.
#[wasm_bindgen(start)]
pub fn init_panic_hook() {
    console_error_panic_hook::set_once();
}

fn js_error(e: WdfError) -> JsValue {
    JsValue::from_str(&e.to_string())
}

/// A circuit filter for Web Audio.
#[wasm_bindgen]
pub struct WasmWdfFilter {
    publisher: TreePublisher,
    processor: RealtimeProcessor,
    sample_rate: f64,
}

#[wasm_bindgen]
impl WasmWdfFilter {
    /// Build a filter from netlist text.
    ///
    /// `sample_rate` overrides any `.samplerate` directive.
    #[wasm_bindgen(constructor)]
    pub fn new(netlist: &str, sample_rate: f64) -> Result<WasmWdfFilter, JsValue> {
        let mut ast = dsl::parse(netlist).map_err(js_error)?;
        ast.sample_rate = Some(sample_rate);

        let mut sim = Simulation::from_ast(&ast, SimulationConfig::new()).map_err(js_error)?;
        sim.build().map_err(js_error)?;
        let tree = sim.take_audio_tree().map_err(js_error)?;

        let (publisher, processor) = realtime::channel(Some(tree));
        Ok(WasmWdfFilter {
            publisher,
            processor,
            sample_rate,
        })
    }

    /// Filter one block of mono samples into `output`.
    #[wasm_bindgen]
    pub fn process_block(&mut self, input: &[f32], output: &mut [f32]) {
        let len = input.len().min(output.len());
        self.processor.process_block(&input[..len], &mut output[..len]);
    }

    /// Enable or bypass the filter.
    #[wasm_bindgen]
    pub fn set_filter_enabled(&self, enabled: bool) {
        self.publisher.set_filter_enabled(enabled);
    }

    /// Set the output gain.
    #[wasm_bindgen]
    pub fn set_volume(&self, volume: f32) {
        self.publisher.set_volume(volume);
    }

    /// Samples that held their previous output after a nonlinear fault.
    #[wasm_bindgen(getter)]
    pub fn faults(&self) -> f64 {
        self.publisher.faults() as f64
    }

    #[wasm_bindgen(getter)]
    pub fn sample_rate(&self) -> f64 {
        self.sample_rate
    }
}

/// Get the library version.
#[wasm_bindgen]
pub fn version() -> String {
    env!("CARGO_PKG_VERSION").to_string()
}
