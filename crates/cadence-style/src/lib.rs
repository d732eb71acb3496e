//! Style and value model for the cadence animation engine.
//!
//! This crate defines everything the engine interpolates over:
//! - **Style snapshots**: immutable, `Arc`-shared resolved property sets
//! - **Value types**: lengths, colors, transforms, shadows, visibility
//! - **Declarations**: transition and keyframe-animation specifications as
//!   they appear on a style
//! - **Timing functions**: CSS pacing curves with a duration-aware bezier
//!   solver
//!
//! The runtime that reconciles and executes declarations lives in
//! `cadence-engine`; this crate stays free of engine state so hosts can build
//! and compare styles without pulling in the machinery.

pub mod animation;
pub mod color;
pub mod easing;
pub mod length;
pub mod property;
pub mod style;
pub mod transform;

pub use animation::{
    AnimationDirection, AnimationSpec, IterationCount, Keyframe, KeyframeList, PlayState,
    TransitionSpec, TransitionTarget,
};
pub use color::Color;
pub use easing::{StepPosition, TimingFunction};
pub use length::Length;
pub use property::{AnimatableProperty, ValueKind};
pub use style::{BoxShadow, StyleSnapshot, Visibility, ZIndex};
pub use transform::{TransformList, TransformOperation};
