//! Animation and transition declarations as they appear on a style.
//!
//! These types are the declarative side of the engine: a style snapshot
//! carries a list of `TransitionSpec`s (implicit animations, one per property
//! or `all`) and a list of `AnimationSpec`s (named keyframe animations). The
//! runtime state that executes them lives in `cadence-engine`.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::easing::TimingFunction;
use crate::property::AnimatableProperty;
use crate::style::StyleSnapshot;

/// Which property or properties a transition declaration applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TransitionTarget {
    /// Transition every registered animatable property (CSS `transition: all`).
    All,
    /// Transition a single property.
    Property { property: AnimatableProperty },
}

impl Default for TransitionTarget {
    fn default() -> Self {
        Self::All
    }
}

/// A single transition declaration: which property, how long, after what
/// delay, and with which pacing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionSpec {
    pub target: TransitionTarget,
    /// Duration of the transition in seconds.
    pub duration: f64,
    /// Delay before the transition starts in seconds.
    pub delay: f64,
    pub timing: TimingFunction,
}

impl Default for TransitionSpec {
    fn default() -> Self {
        Self {
            target: TransitionTarget::All,
            duration: 0.3,
            delay: 0.0,
            timing: TimingFunction::Ease,
        }
    }
}

impl TransitionSpec {
    /// Transition a specific property over `duration` seconds.
    pub fn property(property: AnimatableProperty, duration: f64) -> Self {
        Self {
            target: TransitionTarget::Property { property },
            duration,
            delay: 0.0,
            timing: TimingFunction::Ease,
        }
    }

    /// Transition all animatable properties over `duration` seconds.
    pub fn all(duration: f64) -> Self {
        Self {
            target: TransitionTarget::All,
            duration,
            delay: 0.0,
            timing: TimingFunction::Ease,
        }
    }

    pub fn with_delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_timing(mut self, timing: TimingFunction) -> Self {
        self.timing = timing;
        self
    }

    pub fn applies_to(&self, property: AnimatableProperty) -> bool {
        match self.target {
            TransitionTarget::All => true,
            TransitionTarget::Property { property: p } => p == property,
        }
    }
}

/// How many times a keyframe animation repeats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IterationCount {
    Count { count: f64 },
    Infinite,
}

impl Default for IterationCount {
    fn default() -> Self {
        Self::Count { count: 1.0 }
    }
}

impl IterationCount {
    pub const ONE: IterationCount = IterationCount::Count { count: 1.0 };

    pub fn count(count: f64) -> Self {
        Self::Count { count }
    }

    pub fn is_zero(&self) -> bool {
        matches!(self, Self::Count { count } if *count == 0.0)
    }

    /// Total running time over all iterations of a `cycle`-second animation.
    /// `None` means unbounded: either declared infinite or a non-positive
    /// count, which the engine treats the same way.
    pub fn total_duration(&self, cycle: f64) -> Option<f64> {
        match self {
            Self::Infinite => None,
            Self::Count { count } if *count > 0.0 => Some(cycle * count),
            Self::Count { .. } => None,
        }
    }
}

/// Direction of keyframe playback across iterations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnimationDirection {
    /// Every iteration plays forward.
    #[default]
    Normal,
    /// Odd iterations play reversed.
    Alternate,
}

/// Declared play state of a keyframe animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    #[default]
    Running,
    Paused,
}

/// A single keyframe: a style snapshot pinned at a fractional position in
/// the animation timeline.
#[derive(Debug, Clone, PartialEq)]
pub struct Keyframe {
    /// Position in [0, 1].
    pub key: f64,
    pub style: Arc<StyleSnapshot>,
}

/// An ordered keyframe list plus the union of properties the animation
/// declares. Every keyframe carries a full style snapshot, so any declared
/// property has a defined value at every key.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct KeyframeList {
    keyframes: Vec<Keyframe>,
    properties: BTreeSet<AnimatableProperty>,
}

impl KeyframeList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a keyframe, keeping the list ordered by key.
    pub fn keyframe(mut self, key: f64, style: Arc<StyleSnapshot>) -> Self {
        let key = key.clamp(0.0, 1.0);
        let at = self
            .keyframes
            .iter()
            .position(|kf| kf.key > key)
            .unwrap_or(self.keyframes.len());
        self.keyframes.insert(at, Keyframe { key, style });
        self
    }

    /// Declare a property as animated by this list.
    pub fn declare(mut self, property: AnimatableProperty) -> Self {
        self.properties.insert(property);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.keyframes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.keyframes.len()
    }

    pub fn keyframes(&self) -> &[Keyframe] {
        &self.keyframes
    }

    pub fn properties(&self) -> impl Iterator<Item = AnimatableProperty> + '_ {
        self.properties.iter().copied()
    }

    pub fn declares(&self, property: AnimatableProperty) -> bool {
        self.properties.contains(&property)
    }
}

/// A named keyframe animation declaration.
#[derive(Debug, Clone, PartialEq)]
pub struct AnimationSpec {
    pub name: String,
    pub keyframes: Arc<KeyframeList>,
    /// Duration of one iteration in seconds.
    pub duration: f64,
    /// Delay before the first iteration in seconds.
    pub delay: f64,
    pub iterations: IterationCount,
    pub direction: AnimationDirection,
    pub timing: TimingFunction,
    pub play_state: PlayState,
}

impl AnimationSpec {
    pub fn new(name: impl Into<String>, keyframes: Arc<KeyframeList>) -> Self {
        Self {
            name: name.into(),
            keyframes,
            duration: 0.0,
            delay: 0.0,
            iterations: IterationCount::ONE,
            direction: AnimationDirection::Normal,
            timing: TimingFunction::Ease,
            play_state: PlayState::Running,
        }
    }

    pub fn duration(mut self, duration: f64) -> Self {
        self.duration = duration;
        self
    }

    pub fn delay(mut self, delay: f64) -> Self {
        self.delay = delay;
        self
    }

    pub fn iterations(mut self, iterations: IterationCount) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn direction(mut self, direction: AnimationDirection) -> Self {
        self.direction = direction;
        self
    }

    pub fn timing(mut self, timing: TimingFunction) -> Self {
        self.timing = timing;
        self
    }

    pub fn play_state(mut self, play_state: PlayState) -> Self {
        self.play_state = play_state;
        self
    }

    /// A declaration is usable when it is named and has keyframes.
    pub fn is_valid(&self) -> bool {
        !self.name.is_empty() && !self.keyframes.is_empty()
    }

    /// True when every defining parameter matches, ignoring the play state.
    /// A declaration whose only difference is play state is the same
    /// animation, updated in place rather than restarted.
    pub fn matches(&self, other: &AnimationSpec) -> bool {
        self.name == other.name
            && self.keyframes == other.keyframes
            && self.duration == other.duration
            && self.delay == other.delay
            && self.iterations == other.iterations
            && self.direction == other.direction
            && self.timing == other.timing
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transition_spec_defaults() {
        let spec = TransitionSpec::default();
        assert_eq!(spec.target, TransitionTarget::All);
        assert_eq!(spec.duration, 0.3);
        assert_eq!(spec.delay, 0.0);
        assert_eq!(spec.timing, TimingFunction::Ease);
    }

    #[test]
    fn test_transition_spec_builders() {
        let spec = TransitionSpec::property(AnimatableProperty::Opacity, 0.5)
            .with_delay(0.1)
            .with_timing(TimingFunction::EaseOut);

        assert!(spec.applies_to(AnimatableProperty::Opacity));
        assert!(!spec.applies_to(AnimatableProperty::Width));
        assert_eq!(spec.duration, 0.5);
        assert_eq!(spec.delay, 0.1);
    }

    #[test]
    fn test_all_transition_applies_everywhere() {
        let spec = TransitionSpec::all(0.3);
        assert!(spec.applies_to(AnimatableProperty::Opacity));
        assert!(spec.applies_to(AnimatableProperty::Width));
    }

    #[test]
    fn test_iteration_count_total_duration() {
        assert_eq!(IterationCount::count(3.0).total_duration(1.0), Some(3.0));
        assert_eq!(IterationCount::Infinite.total_duration(1.0), None);
        assert_eq!(IterationCount::count(-1.0).total_duration(1.0), None);
        assert!(IterationCount::count(0.0).is_zero());
    }

    #[test]
    fn test_keyframe_list_stays_sorted() {
        let style = Arc::new(StyleSnapshot::default());
        let list = KeyframeList::new()
            .keyframe(1.0, style.clone())
            .keyframe(0.0, style.clone())
            .keyframe(0.5, style.clone());

        let keys: Vec<f64> = list.keyframes().iter().map(|kf| kf.key).collect();
        assert_eq!(keys, vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_keyframe_list_declared_properties() {
        let list = KeyframeList::new()
            .declare(AnimatableProperty::Opacity)
            .declare(AnimatableProperty::Width)
            .declare(AnimatableProperty::Opacity);

        assert!(list.declares(AnimatableProperty::Opacity));
        assert!(list.declares(AnimatableProperty::Width));
        assert!(!list.declares(AnimatableProperty::Height));
        assert_eq!(list.properties().count(), 2);
    }

    #[test]
    fn test_animation_spec_validity() {
        let empty = Arc::new(KeyframeList::new());
        let style = Arc::new(StyleSnapshot::default());
        let filled = Arc::new(
            KeyframeList::new()
                .keyframe(0.0, style.clone())
                .keyframe(1.0, style),
        );

        assert!(!AnimationSpec::new("fade", empty).is_valid());
        assert!(!AnimationSpec::new("", filled.clone()).is_valid());
        assert!(AnimationSpec::new("fade", filled).is_valid());
    }

    #[test]
    fn test_animation_spec_matches_ignores_play_state() {
        let style = Arc::new(StyleSnapshot::default());
        let list = Arc::new(
            KeyframeList::new()
                .keyframe(0.0, style.clone())
                .keyframe(1.0, style),
        );
        let a = AnimationSpec::new("pulse", list.clone()).duration(1.0);
        let paused = a.clone().play_state(PlayState::Paused);
        let longer = a.clone().duration(2.0);

        assert!(a.matches(&paused));
        assert!(!a.matches(&longer));
        assert_ne!(a, paused); // full equality still sees the play state
    }
}
