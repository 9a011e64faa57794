use std::sync::Arc;

use crate::audio::{list_input_devices, AudioDriver, AudioRegistry};
use crate::color::{blend, hsv_to_rgb, Rgb};
use crate::layer::{Layer, LayerBase, LayerContext};
use crate::param::{ParamMap, ParamValue};
use crate::topology::Frame;

use super::{blend_settings, impl_layer_common, insert_blend_params};

// Sub-range of the magnitude spectrum mapped across the strip.
const SPECTRUM_LOW_BIN: usize = 2;
const SPECTRUM_HIGH_BIN: usize = 100;
// Bins averaged for the bass pulse.
const BASS_LOW_BIN: usize = 2;
const BASS_HIGH_BIN: usize = 10;

struct Binding {
    device: String,
    driver: Arc<AudioDriver>,
    registry: Arc<AudioRegistry>,
}

/// Maps live capture data onto the strip: per-bin spectrum, a volume pulse,
/// a uniform bass pulse, or a hue-rotating rainbow spectrum.
pub struct AudioVisualizerLayer {
    base: LayerBase,
    binding: Option<Binding>,
    // Exponential smoothing history, re-sized when the LED count changes.
    prev_vals: Vec<f32>,
}

impl AudioVisualizerLayer {
    pub fn new() -> Self {
        let mut devices = list_input_devices();
        if devices.is_empty() {
            devices.push("Default".to_string());
        }
        let default_device = devices[0].clone();

        let mut params = ParamMap::new();
        params.insert("device", ParamValue::choice(&default_device, devices));
        params.insert(
            "mode",
            ParamValue::choice(
                "Spectrum",
                vec![
                    "Spectrum".into(),
                    "Volume".into(),
                    "Bass Pulse".into(),
                    "Rainbow Spectrum".into(),
                ],
            ),
        );
        params.insert("sensitivity", ParamValue::Float(1.0));
        params.insert("smoothing", ParamValue::Float(0.5));
        params.insert("threshold", ParamValue::Float(0.0));
        params.insert("speed", ParamValue::Float(1.0));
        params.insert("color_low", ParamValue::Color(Rgb(0, 0, 255)));
        params.insert("color_high", ParamValue::Color(Rgb(255, 0, 0)));
        insert_blend_params(&mut params);

        Self {
            base: LayerBase::new("Audio Visualizer", params),
            binding: None,
            prev_vals: Vec::new(),
        }
    }

    pub fn boxed() -> Box<dyn Layer> {
        Box::new(Self::new())
    }

    /// Rebinds the driver when the device parameter changes. All count
    /// mutation goes through the registry's lock, so rebinding races
    /// cleanly with other layers acquiring the same device.
    fn update_driver(&mut self, ctx: &LayerContext<'_>) {
        let wanted = self.base.params.choice_or("device", "").to_string();
        if let Some(binding) = &self.binding {
            if binding.device == wanted {
                return;
            }
        }

        if let Some(old) = self.binding.take() {
            old.registry.release(&old.device);
        }

        if !wanted.is_empty() {
            let registry = ctx.audio.clone();
            let driver = registry.acquire(&wanted);
            self.binding = Some(Binding {
                device: wanted,
                driver,
                registry,
            });
        }
    }

    fn run(&mut self, buffer: Frame, ctx: &LayerContext<'_>) -> Frame {
        self.update_driver(ctx);

        let Some(binding) = &self.binding else {
            return buffer;
        };
        let data = binding.driver.get_data();
        let count = ctx.count;
        if count == 0 {
            return buffer;
        }

        let params = &self.base.params;
        let mode = params.choice_or("mode", "Spectrum").to_string();
        let sensitivity = params.float_or("sensitivity", 1.0);
        let smoothing = params.float_or("smoothing", 0.5);
        let threshold = params.float_or("threshold", 0.0);
        let speed = params.float_or("speed", 1.0);
        let color_low = params.color_or("color_low", Rgb(0, 0, 255));
        let color_high = params.color_or("color_high", Rgb(255, 0, 0));
        let (blend_mode, opacity) = blend_settings(params);

        let target = match mode.as_str() {
            "Volume" => {
                let vol = (data.volume * sensitivity * 5.0).clamp(0.0, 1.0);
                let center = count as f32 / 2.0;
                let width = vol * count as f32 / 2.0;
                (0..count)
                    .map(|i| {
                        let dist = (i as f32 - center).abs();
                        if dist < width {
                            1.0
                        } else if dist < width + 1.0 {
                            1.0 - (dist - width)
                        } else {
                            0.0
                        }
                    })
                    .collect()
            }
            "Bass Pulse" => {
                let hi = BASS_HIGH_BIN.min(data.spectrum.len());
                let bins = &data.spectrum[BASS_LOW_BIN.min(hi)..hi];
                let mean = if bins.is_empty() {
                    0.0
                } else {
                    bins.iter().sum::<f32>() / bins.len() as f32
                };
                let bass = (mean * sensitivity / 5.0).clamp(0.0, 1.0);
                vec![bass; count]
            }
            // Spectrum and Rainbow Spectrum share the resampled bins.
            _ => {
                let hi = SPECTRUM_HIGH_BIN.min(data.spectrum.len());
                let bins = &data.spectrum[SPECTRUM_LOW_BIN.min(hi)..hi];
                resample(bins, count)
                    .into_iter()
                    .map(|v| v * sensitivity / 10.0)
                    .collect()
            }
        };

        if self.prev_vals.len() != count {
            self.prev_vals = vec![0.0; count];
        }

        let vals: Vec<f32> = self
            .prev_vals
            .iter_mut()
            .zip(target.iter())
            .map(|(prev, tgt)| smooth_and_gate(prev, *tgt, smoothing, threshold))
            .collect();

        buffer
            .into_iter()
            .enumerate()
            .map(|(i, base)| {
                // A buffer longer than the context's count gets black past
                // the end instead of a panic.
                let val = vals.get(i).copied().unwrap_or(0.0);
                let color = if mode == "Rainbow Spectrum" {
                    let hue = (i as f32 / count as f32 + ctx.t * speed * 0.1).rem_euclid(1.0);
                    hsv_to_rgb(hue, 1.0, 1.0)
                } else {
                    Rgb::lerp(color_low, color_high, val)
                };
                blend(base, color.scaled(val), blend_mode, opacity)
            })
            .collect()
    }
}

/// One pixel's exponential smoothing followed by the threshold gate.
/// `prev` carries the history between frames. The effective threshold is
/// clamped below 1.0 so the renormalisation divide cannot blow up.
fn smooth_and_gate(prev: &mut f32, target: f32, smoothing: f32, threshold: f32) -> f32 {
    *prev = *prev * smoothing + target * (1.0 - smoothing);
    let threshold = threshold.min(0.999);
    let v = prev.clamp(0.0, 1.0);
    let v = if v < threshold { 0.0 } else { v };
    ((v - threshold) / (1.0 - threshold)).max(0.0)
}

/// Linear resampling of the spectrum sub-range onto the LED count, matching
/// interpolation over evenly spaced source positions.
fn resample(src: &[f32], count: usize) -> Vec<f32> {
    if count == 0 {
        return Vec::new();
    }
    if src.is_empty() {
        return vec![0.0; count];
    }
    if src.len() == 1 || count == 1 {
        return vec![src[0]; count];
    }

    let step = (src.len() - 1) as f32 / (count - 1) as f32;
    (0..count)
        .map(|k| {
            let pos = k as f32 * step;
            let i = (pos.floor() as usize).min(src.len() - 1);
            let frac = pos - i as f32;
            if i + 1 < src.len() {
                src[i] * (1.0 - frac) + src[i + 1] * frac
            } else {
                src[i]
            }
        })
        .collect()
}

impl Drop for AudioVisualizerLayer {
    fn drop(&mut self) {
        if let Some(binding) = self.binding.take() {
            binding.registry.release(&binding.device);
        }
    }
}

impl Default for AudioVisualizerLayer {
    fn default() -> Self {
        Self::new()
    }
}

impl_layer_common!(AudioVisualizerLayer, "AudioVisualizerLayer");

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::testutil::TestCtx;

    #[test]
    fn resample_preserves_endpoints() {
        let src = [1.0, 2.0, 3.0, 4.0, 5.0];
        let out = resample(&src, 9);
        assert_eq!(out.len(), 9);
        assert!((out[0] - 1.0).abs() < 1e-6);
        assert!((out[8] - 5.0).abs() < 1e-6);
        assert!((out[4] - 3.0).abs() < 1e-6);
    }

    #[test]
    fn resample_degenerate_shapes() {
        assert_eq!(resample(&[], 4), vec![0.0; 4]);
        assert_eq!(resample(&[7.0], 3), vec![7.0; 3]);
        assert!(resample(&[1.0, 2.0], 0).is_empty());
    }

    #[test]
    fn smoothing_mixes_history_toward_target() {
        let mut prev = 0.0;
        assert!((smooth_and_gate(&mut prev, 1.0, 0.5, 0.0) - 0.5).abs() < 1e-6);
        assert!((smooth_and_gate(&mut prev, 1.0, 0.5, 0.0) - 0.75).abs() < 1e-6);
        // smoothing = 0 tracks the target immediately.
        assert!((smooth_and_gate(&mut prev, 0.2, 0.0, 0.0) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn values_below_threshold_gate_to_zero() {
        let mut prev = 0.0;
        assert_eq!(smooth_and_gate(&mut prev, 0.4, 0.0, 0.5), 0.0);
        // The history still advanced even though the output was gated.
        assert!((prev - 0.4).abs() < 1e-6);
    }

    #[test]
    fn threshold_renormalizes_the_surviving_range() {
        let mut prev = 0.0;
        let out = smooth_and_gate(&mut prev, 0.75, 0.0, 0.5);
        assert!((out - 0.5).abs() < 1e-6);

        let mut prev = 0.0;
        assert!((smooth_and_gate(&mut prev, 1.0, 0.0, 0.5) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn full_threshold_stays_finite() {
        let mut prev = 0.0;
        let out = smooth_and_gate(&mut prev, 1.0, 0.0, 1.0);
        assert!(out.is_finite());
        assert!((0.0..=1.001).contains(&out));
    }

    #[test]
    fn oversized_buffer_renders_without_panicking() {
        let ctx = TestCtx::new();
        let mut layer = AudioVisualizerLayer::new();
        layer
            .params_mut()
            .set("device", ParamValue::Text("dev-long".into()));

        // Six pixels against a four-pixel context: extra pixels go dark.
        let out = layer.process(vec![Rgb(3, 3, 3); 6], &ctx.at(0.0, 4));
        assert_eq!(out.len(), 6);
    }

    #[test]
    fn empty_device_param_passes_through() {
        let ctx = TestCtx::new();
        let mut layer = AudioVisualizerLayer::new();
        layer.params_mut().set("device", ParamValue::Text("".into()));

        let input = vec![Rgb(9, 9, 9); 4];
        let out = layer.process(input.clone(), &ctx.at(0.0, 4));
        assert_eq!(out, input);
        assert!(ctx.audio.is_empty());
    }

    #[test]
    fn binding_acquires_and_rebinds_through_the_registry() {
        let ctx = TestCtx::new();
        let mut layer = AudioVisualizerLayer::new();
        layer
            .params_mut()
            .set("device", ParamValue::Text("dev-a".into()));
        let _ = layer.process(vec![Rgb::BLACK; 4], &ctx.at(0.0, 4));
        assert_eq!(ctx.audio.ref_count("dev-a"), Some(1));

        layer
            .params_mut()
            .set("device", ParamValue::Text("dev-b".into()));
        let _ = layer.process(vec![Rgb::BLACK; 4], &ctx.at(0.1, 4));
        assert_eq!(ctx.audio.ref_count("dev-a"), None);
        assert_eq!(ctx.audio.ref_count("dev-b"), Some(1));
    }

    #[test]
    fn dropping_the_layer_releases_its_device() {
        let ctx = TestCtx::new();
        let mut layer = AudioVisualizerLayer::new();
        layer
            .params_mut()
            .set("device", ParamValue::Text("dev-c".into()));
        let _ = layer.process(vec![Rgb::BLACK; 2], &ctx.at(0.0, 2));
        assert_eq!(ctx.audio.ref_count("dev-c"), Some(1));

        drop(layer);
        assert_eq!(ctx.audio.ref_count("dev-c"), None);
    }

    #[test]
    fn frame_length_is_preserved_in_every_mode() {
        let ctx = TestCtx::new();
        for mode in ["Spectrum", "Volume", "Bass Pulse", "Rainbow Spectrum"] {
            let mut layer = AudioVisualizerLayer::new();
            layer
                .params_mut()
                .set("device", ParamValue::Text("dev-test".into()));
            layer.params_mut().set("mode", ParamValue::Text(mode.into()));

            let out = layer.process(vec![Rgb::BLACK; 10], &ctx.at(0.5, 10));
            assert_eq!(out.len(), 10, "mode {mode}");
        }
    }
}
