//! RGBA color values and channel-wise blending.

use serde::{Deserialize, Serialize};

/// An RGBA color with components in [0, 1].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const TRANSPARENT: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 0.0,
    };
    pub const BLACK: Color = Color {
        r: 0.0,
        g: 0.0,
        b: 0.0,
        a: 1.0,
    };
    pub const WHITE: Color = Color {
        r: 1.0,
        g: 1.0,
        b: 1.0,
        a: 1.0,
    };

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b, a: 1.0 }
    }

    /// Interpolate toward `to`, clamping each channel to the representable
    /// range so extrapolated progress cannot produce out-of-gamut values.
    pub fn blend(&self, to: &Color, progress: f64) -> Color {
        let lerp = |from: f32, to: f32| -> f32 {
            (from as f64 + (to as f64 - from as f64) * progress).clamp(0.0, 1.0) as f32
        };
        Color {
            r: lerp(self.r, to.r),
            g: lerp(self.g, to.g),
            b: lerp(self.b, to.b),
            a: lerp(self.a, to.a),
        }
    }
}
