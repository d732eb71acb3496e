//! Immutable style snapshots.
//!
//! A `StyleSnapshot` is the resolved set of property values for one render
//! target at one instant. Snapshots are published behind `Arc` and never
//! mutated afterwards; the engine holds shared references to the snapshots a
//! transition blends between, and drops them when the animation retires.

use serde::{Deserialize, Serialize};

use crate::animation::{AnimationSpec, TransitionSpec};
use crate::color::Color;
use crate::length::Length;
use crate::transform::TransformList;

/// Element visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    #[default]
    Visible,
    Hidden,
    Collapse,
}

/// Stacking order: automatic, or an explicit integer level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ZIndex {
    Auto,
    Index { value: i32 },
}

impl Default for ZIndex {
    fn default() -> Self {
        Self::Auto
    }
}

impl ZIndex {
    pub const fn index(value: i32) -> Self {
        Self::Index { value }
    }

    pub fn is_auto(&self) -> bool {
        matches!(self, Self::Auto)
    }
}

/// A box shadow.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct BoxShadow {
    pub x: f64,
    pub y: f64,
    pub blur: f64,
    pub color: Color,
}

impl BoxShadow {
    pub fn new(x: f64, y: f64, blur: f64, color: Color) -> Self {
        Self { x, y, blur, color }
    }

    /// The shadow an unset side blends against.
    pub fn none() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            blur: 0.0,
            color: Color::TRANSPARENT,
        }
    }

    pub fn blend(&self, to: &BoxShadow, progress: f64) -> BoxShadow {
        let lerp = |a: f64, b: f64| a + (b - a) * progress;
        BoxShadow {
            x: lerp(self.x, to.x),
            y: lerp(self.y, to.y),
            blur: lerp(self.blur, to.blur),
            color: self.color.blend(&to.color, progress),
        }
    }
}

/// Resolved property values for one render target.
#[derive(Debug, Clone, PartialEq)]
pub struct StyleSnapshot {
    // Geometry
    pub left: Length,
    pub top: Length,
    pub width: Length,
    pub height: Length,
    pub margin_left: Length,
    pub margin_right: Length,
    pub margin_top: Length,
    pub margin_bottom: Length,

    // Visual
    pub opacity: f32,
    pub visibility: Visibility,
    pub z_index: ZIndex,
    pub transform: TransformList,
    pub box_shadow: Option<BoxShadow>,

    // Color. `border_color` and `outline_color` are "maybe unset": when
    // `None` they resolve to the base `color` before comparison or blending.
    pub color: Color,
    pub background_color: Color,
    pub border_color: Option<Color>,
    pub outline_color: Option<Color>,

    // Text
    pub font_size: f64,
    pub letter_spacing: f64,

    // Declarations
    pub transitions: Vec<TransitionSpec>,
    pub animations: Vec<AnimationSpec>,
}

impl Default for StyleSnapshot {
    fn default() -> Self {
        Self {
            left: Length::Auto,
            top: Length::Auto,
            width: Length::Auto,
            height: Length::Auto,
            margin_left: Length::px(0.0),
            margin_right: Length::px(0.0),
            margin_top: Length::px(0.0),
            margin_bottom: Length::px(0.0),
            opacity: 1.0,
            visibility: Visibility::Visible,
            z_index: ZIndex::Auto,
            transform: TransformList::new(),
            box_shadow: None,
            color: Color::BLACK,
            background_color: Color::TRANSPARENT,
            border_color: None,
            outline_color: None,
            font_size: 16.0,
            letter_spacing: 0.0,
            transitions: Vec::new(),
            animations: Vec::new(),
        }
    }
}

impl StyleSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn has_transitions(&self) -> bool {
        !self.transitions.is_empty()
    }

    pub fn has_animations(&self) -> bool {
        !self.animations.is_empty()
    }

    pub fn has_transform(&self) -> bool {
        !self.transform.is_empty()
    }

    pub fn has_auto_z_index(&self) -> bool {
        self.z_index.is_auto()
    }

    /// Border color with the maybe-unset fallback applied.
    pub fn resolved_border_color(&self) -> Color {
        self.border_color.unwrap_or(self.color)
    }

    /// Outline color with the maybe-unset fallback applied.
    pub fn resolved_outline_color(&self) -> Color {
        self.outline_color.unwrap_or(self.color)
    }

    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    pub fn with_width(mut self, width: Length) -> Self {
        self.width = width;
        self
    }

    pub fn with_left(mut self, left: Length) -> Self {
        self.left = left;
        self
    }

    pub fn with_background(mut self, color: Color) -> Self {
        self.background_color = color;
        self
    }

    pub fn with_transform(mut self, transform: TransformList) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_visibility(mut self, visibility: Visibility) -> Self {
        self.visibility = visibility;
        self
    }

    pub fn with_transition(mut self, spec: TransitionSpec) -> Self {
        self.transitions.push(spec);
        self
    }

    pub fn with_animation(mut self, spec: AnimationSpec) -> Self {
        self.animations.push(spec);
        self
    }
}
