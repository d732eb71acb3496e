//! Animatable property identifiers.
//!
//! Every property the engine can interpolate has an entry here. The blend
//! registry in `cadence-engine` maps each identifier to the accessor pair and
//! blend rule for the corresponding `StyleSnapshot` field.

use serde::{Deserialize, Serialize};

/// Identifies a single animatable style property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimatableProperty {
    // Geometry
    Left,
    Top,
    Width,
    Height,

    // Spacing
    MarginLeft,
    MarginRight,
    MarginTop,
    MarginBottom,

    // Visual
    Opacity,
    Visibility,
    ZIndex,
    Transform,
    BoxShadow,

    // Color
    Color,
    BackgroundColor,
    BorderColor,
    OutlineColor,

    // Text
    FontSize,
    LetterSpacing,
}

/// Value category a property interpolates in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    Length,
    Number,
    Integer,
    Color,
    Visibility,
    Transform,
    Shadow,
}

impl AnimatableProperty {
    /// The value category this property blends as.
    pub fn value_kind(&self) -> ValueKind {
        match self {
            Self::Left
            | Self::Top
            | Self::Width
            | Self::Height
            | Self::MarginLeft
            | Self::MarginRight
            | Self::MarginTop
            | Self::MarginBottom => ValueKind::Length,

            Self::Opacity | Self::FontSize | Self::LetterSpacing => ValueKind::Number,
            Self::ZIndex => ValueKind::Integer,

            Self::Color | Self::BackgroundColor | Self::BorderColor | Self::OutlineColor => {
                ValueKind::Color
            }

            Self::Visibility => ValueKind::Visibility,
            Self::Transform => ValueKind::Transform,
            Self::BoxShadow => ValueKind::Shadow,
        }
    }

    /// True if animating this property invalidates layout, not just paint.
    pub fn affects_layout(&self) -> bool {
        matches!(
            self,
            Self::Left
                | Self::Top
                | Self::Width
                | Self::Height
                | Self::MarginLeft
                | Self::MarginRight
                | Self::MarginTop
                | Self::MarginBottom
                | Self::FontSize
                | Self::LetterSpacing
                | Self::Visibility
        )
    }
}
