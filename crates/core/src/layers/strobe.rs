use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

/// On/off gate driven by frequency and duty cycle. While the gate is off
/// the buffer passes through untouched; no blend call happens at all, which
/// is different from blending with zero effect.
pub struct StrobeLayer {
    base: LayerBase,
}

impl StrobeLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("color", ParamValue::Color(Rgb(255, 255, 255)));
        params.insert("frequency", ParamValue::Float(5.0));
        params.insert("duty_cycle", ParamValue::Float(0.5));
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Strobe", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        let params = &self.base.params;
        let color = params.color_or("color", Rgb(255, 255, 255));
        let frequency = params.float_or("frequency", 5.0);
        let duty = params.float_or("duty_cycle", 0.5);
        let (mode, opacity) = blend_settings(params);

        let cycle = (ctx.t * frequency).rem_euclid(1.0);
        if cycle >= duty {
            return buffer;
        }

        buffer
            .into_iter()
            .map(|base| blend(base, color, mode, opacity))
            .collect()
    }
}

impl Default for StrobeLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(StrobeLayer, "StrobeLayer");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testutil::TestCtx;

    #[test]
    fn gate_follows_frequency_and_duty() {
        let ctx = TestCtx::new();
        let mut layer = StrobeLayer::new();

        // frequency=5, duty=0.5: t=0 is ON.
        let on = layer.process(vec![Rgb::BLACK; 3], &ctx.at(0.0, 3));
        assert_eq!(on, vec![Rgb::WHITE; 3]);

        // t=0.11 puts the cycle at 0.55, past the duty window: OFF.
        let input = vec![Rgb(1, 2, 3); 3];
        let off = layer.process(input.clone(), &ctx.at(0.11, 3));
        assert_eq!(off, input);
    }

    #[test]
    fn off_state_passes_through_even_at_full_opacity() {
        let ctx = TestCtx::new();
        let mut layer = StrobeLayer::new();
        layer.params_mut().set("duty_cycle", ParamValue::Float(0.0));

        let input = vec![Rgb(40, 50, 60); 2];
        let out = layer.process(input.clone(), &ctx.at(0.2, 2));
        assert_eq!(out, input);
    }
}
