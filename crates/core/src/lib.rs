//! Core library for the LED Weaver lighting engine.
//!
//! The crate turns an ordered stack of procedural layers into per-LED color
//! frames and ships them to a device backend at a controlled rate. Each
//! module owns a distinct subsystem: color/noise math, the layer and effect
//! framework, the concrete layer implementations, the audio capture
//! subsystem feeding the visualizer layers, the render scheduler, and
//! profile persistence.

pub mod audio;
pub mod color;
pub mod config;
pub mod effect;
pub mod error;
pub mod layer;
pub mod layers;
pub mod noise;
pub mod param;
pub mod profile;
pub mod render;
pub mod topology;

pub use audio::{list_input_devices, AudioData, AudioDriver, AudioRegistry};
pub use color::{blend, hsv_to_rgb, BlendMode, Rgb};
pub use config::{AppConfig, AudioConfig, RenderConfig};
pub use effect::{Effect, EffectDoc, LayerDoc};
pub use error::{LedWeaverError, Result};
pub use layer::{Layer, LayerContext, LayerRegistry};
pub use param::{ParamMap, ParamValue};
pub use profile::ProfileStore;
pub use render::{compose_frame, FrameSink, GlobalSettings, RenderScheduler};
pub use topology::{Frame, LedInfo, LedTopology};
