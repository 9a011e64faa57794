use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

/// Two-color gradient across the strip, wrapped or mirrored.
pub struct GradientLayer {
    base: LayerBase,
}

impl GradientLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("color_start", ParamValue::Color(Rgb(255, 0, 0)));
        params.insert("color_end", ParamValue::Color(Rgb(0, 0, 255)));
        params.insert("offset", ParamValue::Float(0.0));
        params.insert("scale", ParamValue::Float(1.0));
        params.insert(
            "type",
            ParamValue::choice("Linear", vec!["Linear".into(), "Mirror".into()]),
        );
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Gradient", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        let params = &self.base.params;
        let c1 = params.color_or("color_start", Rgb(255, 0, 0));
        let c2 = params.color_or("color_end", Rgb(0, 0, 255));
        let offset = params.float_or("offset", 0.0);
        let scale = params.float_or("scale", 1.0);
        let mirror = params.choice_or("type", "Linear") == "Mirror";
        let (mode, opacity) = blend_settings(params);

        let count = ctx.count.max(1);
        buffer
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                let raw = (i as f32 / count as f32) * scale + offset;
                let pos = if mirror {
                    (raw.rem_euclid(2.0) - 1.0).abs()
                } else {
                    raw.rem_euclid(1.0)
                };
                blend(base, Rgb::lerp(c1, c2, pos), mode, opacity)
            })
            .collect()
    }
}

impl Default for GradientLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(GradientLayer, "GradientLayer");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testutil::TestCtx;

    #[test]
    fn linear_black_to_white_over_ten_pixels() {
        let ctx = TestCtx::new();
        let mut layer = GradientLayer::new();
        layer
            .params_mut()
            .set("color_start", ParamValue::Color(Rgb::BLACK));
        layer
            .params_mut()
            .set("color_end", ParamValue::Color(Rgb::WHITE));

        let out = layer.process(vec![Rgb::BLACK; 10], &ctx.at(0.0, 10));
        assert_eq!(out[0], Rgb(0, 0, 0));
        // Pixel 9 sits at pos 0.9 before the wrap, and truncation lands on 229.
        assert_eq!(out[9], Rgb(229, 229, 229));
    }

    #[test]
    fn mirror_reflects_around_the_midpoint() {
        let ctx = TestCtx::new();
        let mut layer = GradientLayer::new();
        layer
            .params_mut()
            .set("color_start", ParamValue::Color(Rgb::BLACK));
        layer
            .params_mut()
            .set("color_end", ParamValue::Color(Rgb::WHITE));
        layer.params_mut().set("scale", ParamValue::Float(2.0));
        layer
            .params_mut()
            .set("type", ParamValue::Text("Mirror".into()));

        let out = layer.process(vec![Rgb::BLACK; 4], &ctx.at(0.0, 4));
        // Positions 0, 0.5, 1.0, 1.5 mirror to 1.0, 0.5, 0.0, 0.5.
        assert_eq!(out[0], Rgb(255, 255, 255));
        assert_eq!(out[2], Rgb(0, 0, 0));
        assert_eq!(out[1], out[3]);
    }

    #[test]
    fn linear_wraps_past_one() {
        let ctx = TestCtx::new();
        let mut layer = GradientLayer::new();
        layer.params_mut().set("offset", ParamValue::Float(1.25));

        let mut reference = GradientLayer::new();
        reference.params_mut().set("offset", ParamValue::Float(0.25));

        let a = layer.process(vec![Rgb::BLACK; 4], &ctx.at(0.0, 4));
        let b = reference.process(vec![Rgb::BLACK; 4], &ctx.at(0.0, 4));
        assert_eq!(a, b);
    }
}
