//! Blend-mode arithmetic shared by every layer.
//!
//! All of the per-channel math happens in unit-interval floats; conversion
//! back to 8-bit channels truncates rather than rounds. Downstream golden
//! outputs depend on that truncation, so keep the casts as they are.

use serde::{Deserialize, Serialize};

/// 8-bit RGB triple, the pixel type of every [`crate::Frame`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const BLACK: Rgb = Rgb(0, 0, 0);
    pub const WHITE: Rgb = Rgb(255, 255, 255);

    /// Scales every channel by `factor` (truncating).
    pub fn scaled(self, factor: f32) -> Rgb {
        Rgb(
            (self.0 as f32 * factor) as u8,
            (self.1 as f32 * factor) as u8,
            (self.2 as f32 * factor) as u8,
        )
    }

    /// Truncating linear interpolation between two colors.
    pub fn lerp(a: Rgb, b: Rgb, t: f32) -> Rgb {
        Rgb(
            (a.0 as f32 * (1.0 - t) + b.0 as f32 * t) as u8,
            (a.1 as f32 * (1.0 - t) + b.1 as f32 * t) as u8,
            (a.2 as f32 * (1.0 - t) + b.2 as f32 * t) as u8,
        )
    }
}

impl From<(u8, u8, u8)> for Rgb {
    fn from(value: (u8, u8, u8)) -> Self {
        Rgb(value.0, value.1, value.2)
    }
}

/// How a layer's output combines with the pixels underneath it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BlendMode {
    #[default]
    Normal,
    Add,
    Multiply,
    Screen,
    Overlay,
    ColorDodge,
    Subtract,
}

impl BlendMode {
    /// All modes in the order they appear in choice parameters.
    pub const ALL: [BlendMode; 7] = [
        BlendMode::Normal,
        BlendMode::Add,
        BlendMode::Multiply,
        BlendMode::Screen,
        BlendMode::Overlay,
        BlendMode::ColorDodge,
        BlendMode::Subtract,
    ];

    /// Stable display name, also the value stored in serialized profiles.
    pub fn name(self) -> &'static str {
        match self {
            BlendMode::Normal => "Normal",
            BlendMode::Add => "Add",
            BlendMode::Multiply => "Multiply",
            BlendMode::Screen => "Screen",
            BlendMode::Overlay => "Overlay",
            BlendMode::ColorDodge => "Color Dodge",
            BlendMode::Subtract => "Subtract",
        }
    }

    pub fn from_name(name: &str) -> Option<BlendMode> {
        Self::ALL.iter().copied().find(|mode| mode.name() == name)
    }

    /// Option list for the shared `blend_mode` choice parameter.
    pub fn option_names() -> Vec<String> {
        Self::ALL.iter().map(|mode| mode.name().to_string()).collect()
    }
}

fn blend_channel(b: f32, a: f32, mode: BlendMode) -> f32 {
    match mode {
        BlendMode::Normal => a,
        BlendMode::Add => (b + a).min(1.0),
        BlendMode::Multiply => b * a,
        BlendMode::Screen => 1.0 - (1.0 - b) * (1.0 - a),
        BlendMode::Overlay => {
            if b < 0.5 {
                2.0 * b * a
            } else {
                1.0 - 2.0 * (1.0 - b) * (1.0 - a)
            }
        }
        BlendMode::ColorDodge => {
            if a == 1.0 {
                1.0
            } else {
                (b / (1.0 - a)).min(1.0)
            }
        }
        BlendMode::Subtract => (b - a).max(0.0),
    }
}

/// Blends `source` onto `base` and mixes the result back towards `base` by
/// `opacity`. An opacity at or below zero returns `base` untouched; values
/// above one are the caller's responsibility and are not clamped.
pub fn blend(base: Rgb, source: Rgb, mode: BlendMode, opacity: f32) -> Rgb {
    if opacity <= 0.0 {
        return base;
    }

    let (br, bg, bb) = (
        base.0 as f32 / 255.0,
        base.1 as f32 / 255.0,
        base.2 as f32 / 255.0,
    );
    let (ar, ag, ab) = (
        source.0 as f32 / 255.0,
        source.1 as f32 / 255.0,
        source.2 as f32 / 255.0,
    );

    let out_r = blend_channel(br, ar, mode);
    let out_g = blend_channel(bg, ag, mode);
    let out_b = blend_channel(bb, ab, mode);

    let final_r = br * (1.0 - opacity) + out_r * opacity;
    let final_g = bg * (1.0 - opacity) + out_g * opacity;
    let final_b = bb * (1.0 - opacity) + out_b * opacity;

    Rgb(
        (final_r * 255.0) as u8,
        (final_g * 255.0) as u8,
        (final_b * 255.0) as u8,
    )
}

/// Converts a hue/saturation/value triple (all in [0, 1]) to RGB. Used by
/// the rainbow spectrum visualizer.
pub fn hsv_to_rgb(h: f32, s: f32, v: f32) -> Rgb {
    let h = h.rem_euclid(1.0) * 6.0;
    let sector = h.floor() as i32 % 6;
    let f = h - h.floor();
    let p = v * (1.0 - s);
    let q = v * (1.0 - s * f);
    let t = v * (1.0 - s * (1.0 - f));

    let (r, g, b) = match sector {
        0 => (v, t, p),
        1 => (q, v, p),
        2 => (p, v, t),
        3 => (p, q, v),
        4 => (t, p, v),
        _ => (v, p, q),
    };

    Rgb((r * 255.0) as u8, (g * 255.0) as u8, (b * 255.0) as u8)
}

#[cfg(test)]
mod tests {
    use super::*;

    const BASE: Rgb = Rgb(100, 150, 200);
    const SRC: Rgb = Rgb(50, 200, 10);

    #[test]
    fn zero_opacity_returns_base_for_every_mode() {
        for mode in BlendMode::ALL {
            assert_eq!(blend(BASE, SRC, mode, 0.0), BASE);
            assert_eq!(blend(BASE, SRC, mode, -1.0), BASE);
        }
    }

    #[test]
    fn normal_at_full_opacity_is_source() {
        assert_eq!(blend(BASE, SRC, BlendMode::Normal, 1.0), SRC);
    }

    #[test]
    fn add_saturates_at_white() {
        assert_eq!(
            blend(Rgb(200, 200, 200), Rgb(200, 200, 200), BlendMode::Add, 1.0),
            Rgb(255, 255, 255)
        );
    }

    #[test]
    fn multiply_of_black_is_black() {
        assert_eq!(blend(BASE, Rgb::BLACK, BlendMode::Multiply, 1.0), Rgb::BLACK);
    }

    #[test]
    fn screen_with_white_is_white() {
        assert_eq!(blend(BASE, Rgb::WHITE, BlendMode::Screen, 1.0), Rgb::WHITE);
    }

    #[test]
    fn overlay_splits_on_half_base() {
        // Base channel below 0.5 doubles-and-multiplies, above it screens.
        let dark = blend(Rgb(64, 64, 64), Rgb(128, 128, 128), BlendMode::Overlay, 1.0);
        let expected = ((2.0 * (64.0 / 255.0) * (128.0 / 255.0)) * 255.0) as u8;
        assert_eq!(dark.0, expected);
    }

    #[test]
    fn color_dodge_handles_full_source() {
        assert_eq!(blend(BASE, Rgb::WHITE, BlendMode::ColorDodge, 1.0), Rgb::WHITE);
    }

    #[test]
    fn subtract_floors_at_black() {
        assert_eq!(blend(Rgb(10, 10, 10), Rgb(200, 200, 200), BlendMode::Subtract, 1.0), Rgb::BLACK);
    }

    #[test]
    fn conversion_truncates_instead_of_rounding() {
        // 0.5 opacity between 0 and 255 lands on 127.5, which truncates to 127.
        let mixed = blend(Rgb::BLACK, Rgb::WHITE, BlendMode::Normal, 0.5);
        assert_eq!(mixed, Rgb(127, 127, 127));
    }

    #[test]
    fn blend_mode_names_round_trip() {
        for mode in BlendMode::ALL {
            assert_eq!(BlendMode::from_name(mode.name()), Some(mode));
        }
        assert_eq!(BlendMode::from_name("Burn"), None);
    }

    #[test]
    fn hsv_primaries() {
        assert_eq!(hsv_to_rgb(0.0, 1.0, 1.0), Rgb(255, 0, 0));
        assert_eq!(hsv_to_rgb(1.0 / 3.0, 1.0, 1.0), Rgb(0, 255, 0));
        assert_eq!(hsv_to_rgb(2.0 / 3.0, 1.0, 1.0), Rgb(0, 0, 255));
    }
}
