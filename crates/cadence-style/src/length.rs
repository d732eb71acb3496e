//! Length values for geometry properties.

use serde::{Deserialize, Serialize};

/// A length as used by box geometry: automatic, absolute pixels, or a
/// percentage of the containing block.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "unit", rename_all = "snake_case")]
pub enum Length {
    Auto,
    Px { value: f64 },
    Percent { value: f64 },
}

impl Default for Length {
    fn default() -> Self {
        Self::Auto
    }
}

impl Length {
    pub const fn px(value: f64) -> Self {
        Self::Px { value }
    }

    pub const fn percent(value: f64) -> Self {
        Self::Percent { value }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }

    /// Interpolate toward `to`. Like-unit lengths lerp; mismatched units
    /// (including `Auto` on either side) cannot interpolate and snap to the
    /// target value.
    pub fn blend(from: Length, to: Length, progress: f64) -> Length {
        match (from, to) {
            (Length::Px { value: a }, Length::Px { value: b }) => Length::Px {
                value: a + (b - a) * progress,
            },
            (Length::Percent { value: a }, Length::Percent { value: b }) => Length::Percent {
                value: a + (b - a) * progress,
            },
            (_, to) => to,
        }
    }
}
