//! CSS-style animation and transition engine.
//!
//! This crate drives property interpolation over time for a host
//! layout/rendering pipeline:
//! - **Blend registry**: process-wide table mapping each animatable property
//!   to its equality and blend rule
//! - **State machine**: per-animation lifecycle with timer-driven
//!   transitions, shared by transitions and keyframe animations
//! - **Composite animations**: per-render-target collections reconciled
//!   against each freshly resolved style
//! - **Controller**: the per-context registry, timer queue, and shared
//!   animation heartbeat
//!
//! # Architecture
//!
//! ```text
//! AnimationController
//!   ├── TimerQueue (deferred machine timers, event dispatch, heartbeat)
//!   └── CompositeAnimation (one per render target)
//!         ├── transitions: property → ActiveAnimation
//!         └── keyframe animations: name → ActiveAnimation
//! ```
//!
//! All mutation happens on the single rendering sequence. The host calls
//! [`AnimationController::update_animations`] from its style pass,
//! [`AnimationController::style_available`] after styles commit, and
//! [`AnimationController::tick`] when [`AnimationController::next_fire_time`]
//! comes due; destructive state transitions and host-visible event dispatch
//! only ever run from `tick`/`style_available`, never inside the style pass.

pub mod blend;
mod composite;
pub mod controller;
pub mod events;
mod keyframe;
pub mod machine;
pub mod scheduler;
mod transition;

pub use controller::{AnimationController, DocumentId};
pub use events::{AnimationHost, LifecycleEvent, ListenerKind};
pub use machine::{AnimationInput, AnimationPhase};
pub use scheduler::{TimerId, TimerQueue};
