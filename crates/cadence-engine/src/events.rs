//! Lifecycle events and the host interface.
//!
//! The engine talks to its embedder through `AnimationHost`: dirty-marking a
//! node's style, asking for a rendering update, and delivering lifecycle
//! events. Dispatch is always deferred: an event scheduled during a state
//! transition reaches the host from a later `tick`, never from inside the
//! style pass that produced it.

use serde::{Deserialize, Serialize};

use cadence_style::AnimatableProperty;

/// A lifecycle event delivered to the host element tree.
///
/// Transitions only report their end; keyframe animations report start,
/// per-iteration, and end. `elapsed` is the animation-local elapsed time in
/// seconds at the point the event fired.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LifecycleEvent {
    TransitionEnded {
        property: AnimatableProperty,
        elapsed: f64,
    },
    AnimationStarted {
        name: String,
        elapsed: f64,
    },
    AnimationIteration {
        name: String,
        elapsed: f64,
    },
    AnimationEnded {
        name: String,
        elapsed: f64,
    },
}

impl LifecycleEvent {
    pub fn elapsed(&self) -> f64 {
        match self {
            Self::TransitionEnded { elapsed, .. }
            | Self::AnimationStarted { elapsed, .. }
            | Self::AnimationIteration { elapsed, .. }
            | Self::AnimationEnded { elapsed, .. } => *elapsed,
        }
    }

    /// The listener category a host would register for this event.
    pub fn listener_kind(&self) -> ListenerKind {
        match self {
            Self::TransitionEnded { .. } => ListenerKind::TransitionEnd,
            Self::AnimationStarted { .. } => ListenerKind::AnimationStart,
            Self::AnimationIteration { .. } => ListenerKind::AnimationIteration,
            Self::AnimationEnded { .. } => ListenerKind::AnimationEnd,
        }
    }

    pub fn is_end(&self) -> bool {
        matches!(
            self,
            Self::TransitionEnded { .. } | Self::AnimationEnded { .. }
        )
    }
}

/// Listener categories the host can filter dispatch by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListenerKind {
    TransitionEnd,
    AnimationStart,
    AnimationIteration,
    AnimationEnd,
}

/// The narrow interface the engine consumes from its embedder.
///
/// All methods are invoked on the single rendering sequence, from
/// `AnimationController` entry points, most of them only from `tick` and
/// `style_available`, after the style pass that caused them has unwound.
pub trait AnimationHost {
    /// Mark a node's style as needing re-resolution.
    fn mark_style_dirty(&mut self, node: &str);

    /// Run a rendering update now. Called from the deferred render-update
    /// dispatcher and from the shared animation heartbeat. The host is
    /// expected to re-resolve dirty styles (calling back into
    /// `update_animations`) and then call `style_available`.
    fn update_rendering(&mut self);

    /// Deliver a lifecycle event to the node's element.
    fn dispatch_event(&mut self, node: &str, event: LifecycleEvent);

    /// Whether anything listens for the given event category on this node.
    /// Dispatch is skipped entirely when this returns false.
    fn has_listener(&self, node: &str, kind: ListenerKind) -> bool {
        let _ = (node, kind);
        true
    }

    /// Try to hand the animation to an externally driven (e.g. composited)
    /// implementation starting at `begin_time`. Returning true means the
    /// host owns playback and will confirm the actual start time through
    /// `set_animation_start_time`/`set_transition_start_time`; the default
    /// declines and the engine synthesizes an immediate start.
    fn start_accelerated(&mut self, node: &str, begin_time: f64) -> bool {
        let _ = (node, begin_time);
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_listener_kinds() {
        let end = LifecycleEvent::TransitionEnded {
            property: AnimatableProperty::Opacity,
            elapsed: 0.3,
        };
        assert_eq!(end.listener_kind(), ListenerKind::TransitionEnd);
        assert!(end.is_end());

        let start = LifecycleEvent::AnimationStarted {
            name: "fade".into(),
            elapsed: 0.0,
        };
        assert_eq!(start.listener_kind(), ListenerKind::AnimationStart);
        assert!(!start.is_end());
    }

    #[test]
    fn test_elapsed_accessor() {
        let event = LifecycleEvent::AnimationIteration {
            name: "pulse".into(),
            elapsed: 2.0,
        };
        assert_eq!(event.elapsed(), 2.0);
    }

    #[test]
    fn test_event_serialization() {
        let event = LifecycleEvent::AnimationIteration {
            name: "pulse".into(),
            elapsed: 1.0,
        };

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("animation_iteration"));
        assert!(json.contains("pulse"));

        let parsed: LifecycleEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(event, parsed);
    }
}
