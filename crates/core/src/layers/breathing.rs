use std::f32::consts::TAU;

use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

/// Sinusoidal brightness pulse applied uniformly to every pixel.
pub struct BreathingLayer {
    base: LayerBase,
}

impl BreathingLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("color", ParamValue::Color(Rgb(255, 0, 0)));
        params.insert("speed", ParamValue::Float(1.0));
        params.insert("min_brightness", ParamValue::Float(0.0));
        params.insert("max_brightness", ParamValue::Float(1.0));
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Breathing", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        let params = &self.base.params;
        let color = params.color_or("color", Rgb(255, 0, 0));
        let speed = params.float_or("speed", 1.0);
        let min_b = params.float_or("min_brightness", 0.0);
        let max_b = params.float_or("max_brightness", 1.0);
        let (mode, opacity) = blend_settings(params);

        let phase = ((ctx.t * speed * TAU).sin() + 1.0) / 2.0;
        let brightness = min_b + phase * (max_b - min_b);
        let scaled = color.scaled(brightness);

        buffer
            .into_iter()
            .map(|base| blend(base, scaled, mode, opacity))
            .collect()
    }
}

impl Default for BreathingLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(BreathingLayer, "BreathingLayer");
