use serde::{Deserialize, Serialize};

use crate::color::Rgb;

/// One finished frame of per-LED colors. Always the same length as the
/// topology it was rendered against.
pub type Frame = Vec<Rgb>;

/// Metadata for a single addressable LED as reported by the device backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedInfo {
    pub global_index: usize,
    pub device_index: usize,
    pub device_name: String,
    pub local_index: usize,
    pub device_total: usize,
}

/// Ordered list of every addressable LED across all devices. Immutable once
/// acquired from the backend; its length defines the frame size for the
/// whole pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedTopology {
    leds: Vec<LedInfo>,
}

impl LedTopology {
    pub fn new(leds: Vec<LedInfo>) -> Self {
        Self { leds }
    }

    /// Builds a topology from `(device name, led count)` pairs, assigning
    /// global indices in device order.
    pub fn from_devices<'a, I>(devices: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, usize)>,
    {
        let mut leds = Vec::new();
        let mut global_index = 0;
        for (device_index, (name, count)) in devices.into_iter().enumerate() {
            for local_index in 0..count {
                leds.push(LedInfo {
                    global_index,
                    device_index,
                    device_name: name.to_string(),
                    local_index,
                    device_total: count,
                });
                global_index += 1;
            }
        }
        Self { leds }
    }

    pub fn len(&self) -> usize {
        self.leds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.leds.is_empty()
    }

    pub fn leds(&self) -> &[LedInfo] {
        &self.leds
    }

    /// Allocates an all-black frame sized to this topology.
    pub fn black_frame(&self) -> Frame {
        vec![Rgb::BLACK; self.leds.len()]
    }
}
