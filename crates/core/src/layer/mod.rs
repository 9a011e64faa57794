//! The polymorphic unit of the compositing pipeline.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde_json::Value;

use crate::audio::AudioRegistry;
use crate::param::ParamMap;
use crate::topology::Frame;

/// Per-frame inputs handed to every layer.
pub struct LayerContext<'a> {
    /// Seconds since the session started. Monotonic, never wall-clock.
    pub t: f32,
    /// Number of LEDs in the frame being rendered.
    pub count: usize,
    /// Input-event codes currently held down, for interactive layers.
    pub keys: &'a HashSet<u32>,
    /// Registry the audio-reactive layers bind capture devices through.
    pub audio: &'a Arc<AudioRegistry>,
}

/// One entry in an effect's layer stack.
///
/// `process` takes the buffer produced by the layer below and returns the
/// next buffer; callers pipe output to input in stack order. Implementations
/// own a [`ParamMap`] whose defaults fix the parameter set and value types.
pub trait Layer: Send {
    /// Stable tag used for serialization and registry lookup.
    fn type_tag(&self) -> &'static str;

    fn name(&self) -> &str;
    fn set_name(&mut self, name: &str);

    fn enabled(&self) -> bool;
    fn set_enabled(&mut self, enabled: bool);

    fn params(&self) -> &ParamMap;
    fn params_mut(&mut self) -> &mut ParamMap;

    fn process(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame;

    /// Hook for rewriting legacy persisted parameter shapes before the
    /// typed coercion pass runs. The default keeps the data untouched.
    fn migrate_params(&self, _data: &mut serde_json::Map<String, Value>) {}
}

/// Name, enabled flag, and parameter map shared by every layer variant.
#[derive(Debug, Clone)]
pub struct LayerBase {
    pub name: String,
    pub enabled: bool,
    pub params: ParamMap,
}

impl LayerBase {
    pub fn new(name: &str, params: ParamMap) -> Self {
        Self {
            name: name.to_string(),
            enabled: true,
            params,
        }
    }
}

type LayerCtor = fn() -> Box<dyn Layer>;

/// Maps stable type tags to constructors. Used identically for UI-driven
/// instantiation and for deserializing persisted effects.
#[derive(Default)]
pub struct LayerRegistry {
    ctors: HashMap<&'static str, LayerCtor>,
}

impl LayerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tag: &'static str, ctor: LayerCtor) {
        self.ctors.insert(tag, ctor);
    }

    /// Instantiates a fresh layer for the tag, or `None` for unknown tags.
    pub fn create(&self, tag: &str) -> Option<Box<dyn Layer>> {
        self.ctors.get(tag).map(|ctor| ctor())
    }

    pub fn contains(&self, tag: &str) -> bool {
        self.ctors.contains_key(tag)
    }

    pub fn tags(&self) -> Vec<&'static str> {
        let mut tags: Vec<&'static str> = self.ctors.keys().copied().collect();
        tags.sort_unstable();
        tags
    }
}

impl std::fmt::Debug for LayerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LayerRegistry")
            .field("tags", &self.tags())
            .finish()
    }
}
