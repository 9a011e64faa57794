use serde_json::Value;

use crate::color::{blend, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, insert_blend_params};

/// Fills the strip with a single color, blended onto whatever is below.
pub struct SolidColorLayer {
    base: LayerBase,
}

impl SolidColorLayer {
    pub fn new() -> Self {
        let mut params = ParamMap::new();
        params.insert("color", ParamValue::Color(Rgb(255, 0, 0)));
        insert_blend_params(&mut params);
        Self {
            base: LayerBase::new("Solid Color", params),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    fn run(&mut self, buffer: Frame, _ctx: &LayerContext<'_>) -> Frame {
        let color = self.base.params.color_or("color", Rgb(255, 0, 0));
        let (mode, opacity) = blend_settings(&self.base.params);
        buffer
            .into_iter()
            .map(|base| blend(base, color, mode, opacity))
            .collect()
    }
}

impl Default for SolidColorLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl Layer for SolidColorLayer {
    fn type_tag(&self) -> &'static str {
        "SolidColorLayer"
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
    fn params(&self) -> &ParamMap {
        &self.base.params
    }
    fn params_mut(&mut self) -> &mut ParamMap {
        &mut self.base.params
    }
    fn process(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        self.run(buffer, ctx)
    }

    /// Early profiles stored separate `r`/`g`/`b` integers; fold them into
    /// the `color` triple before the typed coercion pass.
    fn migrate_params(&self, data: &mut serde_json::Map<String, Value>) {
        if data.contains_key("color") {
            return;
        }
        let channel = |key: &str| data.get(key).and_then(Value::as_i64);
        if let (Some(r), Some(g), Some(b)) = (channel("r"), channel("g"), channel("b")) {
            data.insert("color".to_string(), Value::from(vec![r, g, b]));
        }
        data.remove("r");
        data.remove("g");
        data.remove("b");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testutil::TestCtx;
    use serde_json::json;

    #[test]
    fn fills_buffer_with_its_color() {
        let ctx = TestCtx::new();
        let mut layer = SolidColorLayer::new();
        layer
            .params_mut()
            .set("color", ParamValue::Color(Rgb(10, 20, 30)));

        let out = layer.process(vec![Rgb::BLACK; 4], &ctx.at(0.0, 4));
        assert_eq!(out, vec![Rgb(10, 20, 30); 4]);
    }

    #[test]
    fn respects_blend_opacity() {
        let ctx = TestCtx::new();
        let mut layer = SolidColorLayer::new();
        layer
            .params_mut()
            .set("color", ParamValue::Color(Rgb::WHITE));
        layer.params_mut().set("opacity", ParamValue::Float(0.0));

        let out = layer.process(vec![Rgb(5, 5, 5); 2], &ctx.at(0.0, 2));
        assert_eq!(out, vec![Rgb(5, 5, 5); 2]);
    }

    #[test]
    fn migrates_legacy_rgb_params() {
        let layer = SolidColorLayer::new();
        let mut data = json!({ "r": 1, "g": 2, "b": 3 })
            .as_object()
            .unwrap()
            .clone();
        layer.migrate_params(&mut data);

        assert_eq!(data.get("color"), Some(&json!([1, 2, 3])));
        assert!(!data.contains_key("r"));
    }

    #[test]
    fn migration_keeps_existing_color() {
        let layer = SolidColorLayer::new();
        let mut data = json!({ "color": [9, 9, 9], "r": 1 })
            .as_object()
            .unwrap()
            .clone();
        layer.migrate_params(&mut data);
        assert_eq!(data.get("color"), Some(&json!([9, 9, 9])));
    }
}
