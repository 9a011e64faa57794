//! Concrete layer implementations: generators, animators, and the
//! audio-reactive visualizer.

mod audio_viz;
mod breathing;
mod checkerboard;
mod gradient;
mod noise_gen;
mod solid;
mod strobe;
mod wave;

pub use audio_viz::AudioVisualizerLayer;
pub use breathing::BreathingLayer;
pub use checkerboard::CheckerboardLayer;
pub use gradient::GradientLayer;
pub use noise_gen::NoiseLayer;
pub use solid::SolidColorLayer;
pub use strobe::StrobeLayer;
pub use wave::WaveLayer;

use crate::color::BlendMode;
use crate::layer::LayerRegistry;
use crate::param::{ParamMap, ParamValue};

/// Registry with every built-in layer type registered under its stable tag.
pub fn builtin_registry() -> LayerRegistry {
    let mut registry = LayerRegistry::new();
    registry.register("SolidColorLayer", SolidColorLayer::boxed);
    registry.register("GradientLayer", GradientLayer::boxed);
    registry.register("CheckerboardLayer", CheckerboardLayer::boxed);
    registry.register("BreathingLayer", BreathingLayer::boxed);
    registry.register("StrobeLayer", StrobeLayer::boxed);
    registry.register("WaveLayer", WaveLayer::boxed);
    registry.register("NoiseLayer", NoiseLayer::boxed);
    registry.register("AudioVisualizerLayer", AudioVisualizerLayer::boxed);
    registry
}

/// Type tags grouped the way a layer picker presents them.
pub fn categories() -> [(&'static str, &'static [&'static str]); 3] {
    [
        (
            "Generators",
            &["SolidColorLayer", "GradientLayer", "CheckerboardLayer"][..],
        ),
        (
            "Animations",
            &["BreathingLayer", "StrobeLayer", "WaveLayer", "NoiseLayer"][..],
        ),
        ("Audio", &["AudioVisualizerLayer"][..]),
    ]
}

/// Adds the `blend_mode` + `opacity` pair every variant carries.
pub(crate) fn insert_blend_params(params: &mut ParamMap) {
    params.insert(
        "blend_mode",
        ParamValue::choice("Normal", BlendMode::option_names()),
    );
    params.insert("opacity", ParamValue::Float(1.0));
}

/// Reads the shared blend settings back out of a parameter map.
pub(crate) fn blend_settings(params: &ParamMap) -> (BlendMode, f32) {
    let mode = BlendMode::from_name(params.choice_or("blend_mode", "Normal")).unwrap_or_default();
    let opacity = params.float_or("opacity", 1.0);
    (mode, opacity)
}

/// Generates the accessor half of a [`crate::layer::Layer`] impl; the
/// per-pixel work stays in the variant's inherent `run` method.
macro_rules! impl_layer_common {
    ($ty:ty, $tag:literal) => {
        impl crate::layer::Layer for $ty {
            fn type_tag(&self) -> &'static str {
                $tag
            }
            fn name(&self) -> &str {
                &self.base.name
            }
            fn set_name(&mut self, name: &str) {
                self.base.name = name.to_string();
            }
            fn enabled(&self) -> bool {
                self.base.enabled
            }
            fn set_enabled(&mut self, enabled: bool) {
                self.base.enabled = enabled;
            }
            fn params(&self) -> &crate::param::ParamMap {
                &self.base.params
            }
            fn params_mut(&mut self) -> &mut crate::param::ParamMap {
                &mut self.base.params
            }
            fn process(
                &mut self,
                buffer: crate::topology::Frame,
                ctx: &crate::layer::LayerContext<'_>,
            ) -> crate::topology::Frame {
                self.run(buffer, ctx)
            }
        }
    };
}

pub(crate) use impl_layer_common;

#[cfg(test)]
pub(crate) mod testutil {
    use std::collections::HashSet;
    use std::sync::Arc;

    use crate::audio::AudioRegistry;
    use crate::layer::LayerContext;

    /// Builds a context for driving a single layer in tests.
    pub struct TestCtx {
        pub keys: HashSet<u32>,
        pub audio: Arc<AudioRegistry>,
    }

    impl TestCtx {
        pub fn new() -> Self {
            Self {
                keys: HashSet::new(),
                audio: Arc::new(AudioRegistry::new()),
            }
        }

        pub fn at(&self, t: f32, count: usize) -> LayerContext<'_> {
            LayerContext {
                t,
                count,
                keys: &self.keys,
                audio: &self.audio,
            }
        }
    }

    #[test]
    fn registry_has_every_builtin() {
        let registry = super::builtin_registry();
        for (_, tags) in super::categories() {
            for tag in tags {
                assert!(registry.contains(tag), "missing {tag}");
            }
        }
        assert_eq!(registry.tags().len(), 8);
    }
}
