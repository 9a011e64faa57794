use serde::{Deserialize, Serialize};

/// Top-level configuration structure for the application.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    pub audio: AudioConfig,
    pub render: RenderConfig,
}

/// Configuration specific to the audio capture subsystem.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioConfig {
    pub sample_rate: u32,
    pub block_size: usize,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44_100,
            block_size: crate::audio::FFT_BLOCK,
        }
    }
}

/// Configuration for the render scheduler.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenderConfig {
    pub fps_limit: f32,
    pub brightness: f32,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            fps_limit: 60.0,
            brightness: 1.0,
        }
    }
}

impl RenderConfig {
    pub fn to_settings(&self) -> crate::render::GlobalSettings {
        crate::render::GlobalSettings {
            brightness: self.brightness,
            fps_limit: self.fps_limit,
            identify_device: None,
        }
    }
}
