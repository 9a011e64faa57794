//! Ordered layer stacks composited into a single frame.

use std::collections::HashSet;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::audio::AudioRegistry;
use crate::layer::{Layer, LayerContext, LayerRegistry};
use crate::topology::{Frame, LedTopology};

/// Serialized form of a single layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LayerDoc {
    pub class: String,
    pub name: String,
    pub enabled: bool,
    pub params: serde_json::Map<String, Value>,
}

/// Serialized form of an effect: the document shape handed to the
/// persistence collaborator. List order is significant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EffectDoc {
    pub layers: Vec<LayerDoc>,
}

/// An ordered, mutable stack of layers plus the enabled/opacity pair the
/// compositor uses when mixing this effect with its siblings.
pub struct Effect {
    pub enabled: bool,
    pub opacity: f32,
    layers: Vec<Box<dyn Layer>>,
    active_keys: HashSet<u32>,
}

impl Default for Effect {
    fn default() -> Self {
        Self::new()
    }
}

impl Effect {
    pub fn new() -> Self {
        Self {
            enabled: true,
            opacity: 1.0,
            layers: Vec::new(),
            active_keys: HashSet::new(),
        }
    }

    pub fn add_layer(&mut self, layer: Box<dyn Layer>) {
        self.layers.push(layer);
    }

    pub fn clear_layers(&mut self) {
        self.layers.clear();
    }

    pub fn layers(&self) -> &[Box<dyn Layer>] {
        &self.layers
    }

    pub fn layers_mut(&mut self) -> &mut Vec<Box<dyn Layer>> {
        &mut self.layers
    }

    /// Moves a layer to a new position in the stack. Order is the only
    /// determinant of composition order.
    pub fn move_layer(&mut self, from: usize, to: usize) {
        if from < self.layers.len() && to < self.layers.len() && from != to {
            let layer = self.layers.remove(from);
            self.layers.insert(to, layer);
        }
    }

    pub fn remove_layer(&mut self, index: usize) -> Option<Box<dyn Layer>> {
        if index < self.layers.len() {
            Some(self.layers.remove(index))
        } else {
            None
        }
    }

    /// Tracks held input keys for interactive layers.
    pub fn handle_key_event(&mut self, key: u32, pressed: bool) {
        if pressed {
            self.active_keys.insert(key);
        } else {
            self.active_keys.remove(&key);
        }
    }

    pub fn active_keys(&self) -> &HashSet<u32> {
        &self.active_keys
    }

    /// Composites the stack into one frame: a black buffer sized to the
    /// topology folded through every enabled layer in order. A panicking
    /// layer is isolated; its input buffer passes through unchanged and the
    /// rest of the stack still runs.
    pub fn render(&mut self, leds: &LedTopology, t: f32, audio: &Arc<AudioRegistry>) -> Frame {
        let mut buffer = leds.black_frame();
        let ctx = LayerContext {
            t,
            count: leds.len(),
            keys: &self.active_keys,
            audio,
        };

        for layer in &mut self.layers {
            if !layer.enabled() {
                continue;
            }
            let input = buffer.clone();
            match panic::catch_unwind(AssertUnwindSafe(|| layer.process(input, &ctx))) {
                Ok(next) => buffer = next,
                Err(_) => {
                    tracing::warn!(layer = layer.name(), "layer panicked; passing buffer through");
                }
            }
        }

        buffer
    }

    /// Serializes the stack into the persistence document shape.
    pub fn to_doc(&self) -> EffectDoc {
        EffectDoc {
            layers: self
                .layers
                .iter()
                .map(|layer| LayerDoc {
                    class: layer.type_tag().to_string(),
                    name: layer.name().to_string(),
                    enabled: layer.enabled(),
                    params: layer.params().to_json_map(),
                })
                .collect(),
        }
    }

    /// Rebuilds the stack from a document. Unknown type tags are skipped,
    /// unknown parameters dropped, and incompatible values replaced by the
    /// layer's defaults.
    pub fn load_doc(&mut self, doc: &EffectDoc, registry: &LayerRegistry) {
        self.clear_layers();
        for layer_doc in &doc.layers {
            let Some(mut layer) = registry.create(&layer_doc.class) else {
                tracing::debug!(class = %layer_doc.class, "skipping unknown layer type");
                continue;
            };
            layer.set_name(&layer_doc.name);
            layer.set_enabled(layer_doc.enabled);

            let mut params = layer_doc.params.clone();
            layer.migrate_params(&mut params);
            layer.params_mut().apply_json(&params);

            self.add_layer(layer);
        }
    }

    /// Convenience constructor used by profile loading.
    pub fn from_doc(doc: &EffectDoc, registry: &LayerRegistry) -> Self {
        let mut effect = Self::new();
        effect.load_doc(doc, registry);
        effect
    }
}

impl std::fmt::Debug for Effect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Effect")
            .field("enabled", &self.enabled)
            .field("opacity", &self.opacity)
            .field("layers", &self.layers.len())
            .finish()
    }
}
