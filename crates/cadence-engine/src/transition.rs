//! Transition (implicit animation) variant state.
//!
//! A transition interpolates one property from the snapshot that was current
//! when the target value changed to the snapshot that declared the new
//! value. Both snapshots are held for the whole lifetime of the state, so a
//! running or paused transition can never observe a missing endpoint.

use std::sync::Arc;

use cadence_style::{AnimatableProperty, StyleSnapshot, TransitionTarget};

use crate::blend;
use crate::machine::{ActiveAnimation, ActiveKind};

/// Variant data for a running transition.
#[derive(Debug)]
pub(crate) struct ActiveTransition {
    /// The transition target as declared on the style; may be `All`.
    pub declared_target: TransitionTarget,
    /// The concrete property this state animates.
    pub property: AnimatableProperty,
    /// True while a keyframe animation claims the same property.
    pub overridden: bool,
    pub from_style: Arc<StyleSnapshot>,
    pub to_style: Arc<StyleSnapshot>,
}

impl ActiveTransition {
    pub(crate) fn new(
        declared_target: TransitionTarget,
        property: AnimatableProperty,
        from_style: Arc<StyleSnapshot>,
        to_style: Arc<StyleSnapshot>,
    ) -> Self {
        Self {
            declared_target,
            property,
            overridden: false,
            from_style,
            to_style,
        }
    }
}

impl ActiveAnimation {
    /// Whether the recorded target value for this transition still matches
    /// the newly resolved style.
    pub(crate) fn transition_target_equal(&self, target_style: &StyleSnapshot) -> bool {
        match &self.kind {
            ActiveKind::Transition(tr) => {
                blend::property_equal(tr.property, &tr.to_style, target_style)
            }
            ActiveKind::Keyframes(_) => false,
        }
    }

    /// Blend this transition's property into the output style at the
    /// current progress. Paused and finished states contribute nothing.
    pub(crate) fn blend_transition(
        &mut self,
        target_style: &Arc<StyleSnapshot>,
        output: &mut Option<StyleSnapshot>,
        now: f64,
    ) {
        if self.paused() || self.postactive() {
            return;
        }

        let progress = self.progress(now, 1.0, 0.0);
        let needs_timer = {
            let ActiveKind::Transition(tr) = &self.kind else {
                return;
            };
            let dst = output.get_or_insert_with(|| (**target_style).clone());
            blend::blend_property(tr.property, dst, &tr.from_style, &tr.to_style, progress)
        };
        if needs_timer {
            self.animating = true;
        }
    }
}
