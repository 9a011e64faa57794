use std::f32::consts::TAU;

use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

/// Travelling waveform scaling a fixed color along the strip.
pub struct WaveLayer {
    base: LayerBase,
}

impl WaveLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("speed", ParamValue::Float(1.0));
        params.insert("freq", ParamValue::Float(1.0));
        params.insert(
            "type",
            ParamValue::choice(
                "sine",
                vec!["sine".into(), "triangle".into(), "saw".into(), "square".into()],
            ),
        );
        params.insert("color", ParamValue::Color(Rgb(0, 255, 0)));
        params.insert(
            "direction",
            ParamValue::choice("Forward", vec!["Forward".into(), "Backward".into()]),
        );
        params.insert("offset", ParamValue::Float(0.0));
        // Square-wave pulse width.
        params.insert("width", ParamValue::Float(0.5));
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Wave Generator", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        let params = &self.base.params;
        let speed = params.float_or("speed", 1.0);
        let freq = params.float_or("freq", 1.0);
        let offset = params.float_or("offset", 0.0);
        let width = params.float_or("width", 0.5);
        let wave_type = params.choice_or("type", "sine").to_string();
        let dir_mult = if params.choice_or("direction", "Forward") == "Backward" {
            -1.0
        } else {
            1.0
        };
        let color = params.color_or("color", Rgb(0, 255, 0));
        let (mode, opacity) = blend_settings(params);

        let count = ctx.count.max(1);
        buffer
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                let pos = i as f32 / count as f32;
                let phase = ctx.t * speed * dir_mult + pos * freq + offset;
                let val = waveform(&wave_type, phase, width);
                blend(base, color.scaled(val), mode, opacity)
            })
            .collect()
    }
}

fn waveform(wave_type: &str, phase: f32, width: f32) -> f32 {
    match wave_type {
        "sine" => ((phase * TAU).sin() + 1.0) / 2.0,
        "saw" => phase.rem_euclid(1.0),
        "triangle" => (phase.rem_euclid(1.0) * 2.0 - 1.0).abs(),
        "square" => {
            if phase.rem_euclid(1.0) < width {
                1.0
            } else {
                0.0
            }
        }
        _ => 0.0,
    }
}

impl Default for WaveLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(WaveLayer, "WaveLayer");
