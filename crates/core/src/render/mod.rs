//! Fixed-rate render loop compositing every active effect into one frame.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crate::audio::AudioRegistry;
use crate::effect::Effect;
use crate::error::Result;
use crate::topology::{Frame, LedTopology};

/// Sink the finished frame is handed to; the device backend implements this.
/// `push_frame` is assumed non-blocking or bounded-latency — a slow sink
/// degrades the frame rate for everything.
pub trait FrameSink: Send {
    fn push_frame(&mut self, frame: &Frame) -> Result<()>;
}

/// Runtime-tunable settings read fresh on every iteration. Mutations from
/// the control plane are last-writer-wins; there is no transactional
/// guarantee across a render tick.
#[derive(Debug, Clone)]
pub struct GlobalSettings {
    /// Multiplier applied to every channel of the finished frame.
    pub brightness: f32,
    /// Target frames per second; floored to 1 when read.
    pub fps_limit: f32,
    /// Device index to flash white/black at 4 Hz, overriding layer output
    /// for that device's pixels only.
    pub identify_device: Option<usize>,
}

impl Default for GlobalSettings {
    fn default() -> Self {
        Self {
            brightness: 1.0,
            fps_limit: 60.0,
            identify_device: None,
        }
    }
}

/// Composites all enabled effects at time `t` and applies the global
/// overrides. This is one scheduler iteration minus pacing and the sink.
pub fn compose_frame(
    leds: &LedTopology,
    effects: &mut [Effect],
    settings: &GlobalSettings,
    t: f32,
    audio: &Arc<AudioRegistry>,
) -> Frame {
    let mut frame = leds.black_frame();

    for effect in effects.iter_mut() {
        if !effect.enabled {
            continue;
        }
        let rendered = effect.render(leds, t, audio);
        let opacity = effect.opacity;
        for (acc, src) in frame.iter_mut().zip(rendered.iter()) {
            *acc = crate::color::Rgb::lerp(*acc, *src, opacity);
        }
    }

    if let Some(identify) = settings.identify_device {
        // 4 Hz square wave: toggles every eighth of a second.
        let flash = (t * 8.0) as i64 % 2 == 0;
        let color = if flash {
            crate::color::Rgb::WHITE
        } else {
            crate::color::Rgb::BLACK
        };
        for (pixel, led) in frame.iter_mut().zip(leds.leds()) {
            if led.device_index == identify {
                *pixel = color;
            }
        }
    }

    if settings.brightness != 1.0 {
        for pixel in frame.iter_mut() {
            *pixel = pixel.scaled(settings.brightness);
        }
    }

    frame
}

/// Owns the render thread. Effects and settings stay shared with the
/// control plane; the loop locks them briefly once per frame.
pub struct RenderScheduler {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RenderScheduler {
    /// Spawns the render loop. `t` handed to effects is the elapsed time
    /// since this call, monotonic and never reset mid-run.
    pub fn spawn(
        leds: LedTopology,
        effects: Arc<Mutex<Vec<Effect>>>,
        settings: Arc<Mutex<GlobalSettings>>,
        audio: Arc<AudioRegistry>,
        mut sink: Box<dyn FrameSink>,
    ) -> Self {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = stop.clone();

        let handle = thread::spawn(move || {
            let start = Instant::now();
            tracing::debug!(leds = leds.len(), "render loop started");

            while !stop_flag.load(Ordering::SeqCst) {
                let frame_start = Instant::now();
                let t = start.elapsed().as_secs_f32();

                let (frame, fps) = {
                    let current = settings.lock().unwrap_or_else(|e| e.into_inner()).clone();
                    let mut effects = effects.lock().unwrap_or_else(|e| e.into_inner());
                    let frame = compose_frame(&leds, &mut effects, &current, t, &audio);
                    (frame, current.fps_limit.max(1.0))
                };

                if let Err(err) = sink.push_frame(&frame) {
                    tracing::warn!(%err, "frame sink rejected frame");
                }

                let budget = Duration::from_secs_f32(1.0 / fps);
                let elapsed = frame_start.elapsed();
                if elapsed < budget {
                    thread::sleep(budget - elapsed);
                }
            }

            tracing::debug!("render loop stopped");
        });

        Self {
            stop,
            handle: Some(handle),
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle
            .as_ref()
            .map(|h| !h.is_finished())
            .unwrap_or(false)
    }

    /// Cooperative shutdown: the loop observes the flag at its next
    /// iteration boundary.
    pub fn stop(mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl Drop for RenderScheduler {
    fn drop(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

impl std::fmt::Debug for RenderScheduler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenderScheduler")
            .field("running", &self.is_running())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgb;
    use crate::layers;
    use crate::param::ParamValue;

    struct CollectSink {
        frames: Arc<Mutex<Vec<Frame>>>,
    }

    impl FrameSink for CollectSink {
        fn push_frame(&mut self, frame: &Frame) -> Result<()> {
            self.frames
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(frame.clone());
            Ok(())
        }
    }

    fn audio() -> Arc<AudioRegistry> {
        Arc::new(AudioRegistry::new())
    }

    fn solid_effect(color: Rgb) -> Effect {
        let registry = layers::builtin_registry();
        let mut effect = Effect::new();
        let mut layer = registry.create("SolidColorLayer").unwrap();
        layer.params_mut().set("color", ParamValue::Color(color));
        effect.add_layer(layer);
        effect
    }

    #[test]
    fn compose_respects_effect_opacity() {
        let leds = LedTopology::from_devices([("Strip", 4)]);
        let mut effects = vec![solid_effect(Rgb(200, 100, 0))];
        effects[0].opacity = 0.5;

        let frame = compose_frame(&leds, &mut effects, &GlobalSettings::default(), 0.0, &audio());
        assert_eq!(frame[0], Rgb(100, 50, 0));
    }

    #[test]
    fn disabled_effects_do_not_contribute() {
        let leds = LedTopology::from_devices([("Strip", 3)]);
        let mut effects = vec![solid_effect(Rgb::WHITE)];
        effects[0].enabled = false;

        let frame = compose_frame(&leds, &mut effects, &GlobalSettings::default(), 0.0, &audio());
        assert!(frame.iter().all(|c| *c == Rgb::BLACK));
    }

    #[test]
    fn identify_override_flashes_only_the_target_device() {
        let leds = LedTopology::from_devices([("Keyboard", 2), ("Strip", 2)]);
        let mut effects = vec![solid_effect(Rgb(10, 10, 10))];
        let settings = GlobalSettings {
            identify_device: Some(1),
            ..Default::default()
        };

        // t=0 -> flash phase ON.
        let frame = compose_frame(&leds, &mut effects, &settings, 0.0, &audio());
        assert_eq!(frame[0], Rgb(10, 10, 10));
        assert_eq!(frame[2], Rgb::WHITE);
        assert_eq!(frame[3], Rgb::WHITE);

        // t=0.125 lands in the dark half of the 4 Hz square wave.
        let frame = compose_frame(&leds, &mut effects, &settings, 0.125, &audio());
        assert_eq!(frame[2], Rgb::BLACK);
        assert_eq!(frame[0], Rgb(10, 10, 10));
    }

    #[test]
    fn brightness_scales_every_channel() {
        let leds = LedTopology::from_devices([("Strip", 2)]);
        let mut effects = vec![solid_effect(Rgb(100, 200, 40))];
        let settings = GlobalSettings {
            brightness: 0.5,
            ..Default::default()
        };

        let frame = compose_frame(&leds, &mut effects, &settings, 0.0, &audio());
        assert_eq!(frame[0], Rgb(50, 100, 20));
    }

    #[test]
    fn scheduler_pushes_frames_and_stops() {
        let leds = LedTopology::from_devices([("Strip", 3)]);
        let effects = Arc::new(Mutex::new(vec![solid_effect(Rgb(1, 2, 3))]));
        let settings = Arc::new(Mutex::new(GlobalSettings {
            fps_limit: 200.0,
            ..Default::default()
        }));
        let frames = Arc::new(Mutex::new(Vec::new()));
        let sink = Box::new(CollectSink {
            frames: frames.clone(),
        });

        let scheduler =
            RenderScheduler::spawn(leds, effects, settings, audio(), sink);
        thread::sleep(Duration::from_millis(100));
        assert!(scheduler.is_running());
        scheduler.stop();

        let captured = frames.lock().unwrap();
        assert!(!captured.is_empty());
        assert!(captured.iter().all(|f| f.len() == 3 && f[0] == Rgb(1, 2, 3)));
    }
}
