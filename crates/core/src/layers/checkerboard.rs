use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

/// Alternating blocks of two colors, optionally scrolling over time.
pub struct CheckerboardLayer {
    base: LayerBase,
}

impl CheckerboardLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("color_1", ParamValue::Color(Rgb(255, 255, 255)));
        params.insert("color_2", ParamValue::Color(Rgb(0, 0, 0)));
        params.insert("size", ParamValue::Int(5));
        params.insert("speed", ParamValue::Float(0.0));
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Checkerboard", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        let params = &self.base.params;
        let c1 = params.color_or("color_1", Rgb(255, 255, 255));
        let c2 = params.color_or("color_2", Rgb(0, 0, 0));
        let size = params.int_or("size", 5).max(1);
        let speed = params.float_or("speed", 0.0);
        let (mode, opacity) = blend_settings(params);

        // Integer scroll offset; i64 plus euclidean wrap keeps long-running
        // sessions from overflowing.
        let offset = (ctx.t * speed * 10.0) as i64;

        buffer
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                let pos = i as i64 + offset;
                let is_c1 = pos.div_euclid(size).rem_euclid(2) == 0;
                blend(base, if is_c1 { c1 } else { c2 }, mode, opacity)
            })
            .collect()
    }
}

impl Default for CheckerboardLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(CheckerboardLayer, "CheckerboardLayer");
