//! Per-target animation collection.
//!
//! A `CompositeAnimation` owns every running transition (at most one per
//! property) and keyframe animation (at most one per name) for one render
//! target. Each style pass reconciles the declared transitions/animations on
//! the freshly resolved style against this set, then blends the live states
//! into the output.

use std::collections::HashMap;
use std::sync::Arc;

use cadence_style::{AnimatableProperty, PlayState, StyleSnapshot, TransitionTarget};
use tracing::debug;

use crate::blend;
use crate::machine::{
    ActiveAnimation, AnimationInput, AnimationKey, CompositeEffect, EngineCtx, MachineFx,
    MachineTimerKind, TimerTask,
};
use crate::scheduler::TimerQueue;

/// All animations currently attached to one render target.
#[derive(Debug, Default)]
pub(crate) struct CompositeAnimation {
    transitions: HashMap<AnimatableProperty, ActiveAnimation>,
    keyframes: HashMap<String, ActiveAnimation>,
    suspended: bool,
    /// Number of contained animations waiting for the next style pass.
    style_waiters: u32,
}

impl CompositeAnimation {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn suspended(&self) -> bool {
        self.suspended
    }

    pub(crate) fn style_waiters(&self) -> u32 {
        self.style_waiters
    }

    /// Apply the out-params of a dispatch: waiter bookkeeping plus override
    /// propagation onto sibling transitions.
    fn absorb(&mut self, fx: MachineFx, engine: &mut EngineCtx, node: &str) {
        self.style_waiters = (self.style_waiters as i32 + fx.waiter_delta).max(0) as u32;
        for effect in fx.effects {
            match effect {
                CompositeEffect::OverrideProperty(property) => {
                    self.set_transitions_overridden(property, true, engine, node);
                }
                CompositeEffect::ResumeOverridden(property) => {
                    self.set_transitions_overridden(property, false, engine, node);
                }
            }
        }
    }

    fn set_transitions_overridden(
        &mut self,
        property: AnimatableProperty,
        overridden: bool,
        engine: &mut EngineCtx,
        node: &str,
    ) {
        let props: Vec<AnimatableProperty> = self.transitions.keys().copied().collect();
        for prop in props {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.transitions.get_mut(&prop) {
                if anim.affects_property(property) {
                    anim.set_overridden(overridden, engine, node, &mut fx);
                }
            }
            self.absorb(fx, engine, node);
        }
    }

    /// Reconcile declarations and blend all live states.
    ///
    /// Returns the blended style, or `None` when no animation produced
    /// output (the caller then uses the target style unchanged).
    pub(crate) fn animate(
        &mut self,
        node: &str,
        current: Option<&Arc<StyleSnapshot>>,
        target: &Arc<StyleSnapshot>,
        engine: &mut EngineCtx,
    ) -> Option<StyleSnapshot> {
        let mut output: Option<StyleSnapshot> = None;

        self.update_transitions(node, current, target, engine);

        if current.is_some() {
            let props: Vec<AnimatableProperty> = self.transitions.keys().copied().collect();
            for prop in props {
                if let Some(anim) = self.transitions.get_mut(&prop) {
                    anim.blend_transition(target, &mut output, engine.now);
                }
            }
        }

        self.update_keyframe_animations(node, current, target, engine);

        // Keyframe animations blend in declaration order.
        for spec in &target.animations {
            if !spec.is_valid() {
                continue;
            }
            let mut fx = MachineFx::default();
            if let Some(anim) = self.keyframes.get_mut(&spec.name) {
                anim.blend_keyframes(target, &mut output, engine, node, &mut fx);
            }
            self.absorb(fx, engine, node);
        }

        self.cleanup_finished(engine);

        output
    }

    fn update_transitions(
        &mut self,
        node: &str,
        current: Option<&Arc<StyleSnapshot>>,
        target: &Arc<StyleSnapshot>,
        engine: &mut EngineCtx,
    ) {
        // The first resolution for a target has nothing to transition from.
        let Some(current) = current else {
            return;
        };
        if !target.has_transitions() {
            return;
        }

        for spec in &target.transitions {
            // An empty transition cannot run.
            if spec.duration == 0.0 && spec.delay <= 0.0 {
                continue;
            }

            let props: Vec<AnimatableProperty> = match spec.target {
                TransitionTarget::All => blend::registered_properties().collect(),
                TransitionTarget::Property { property } => vec![property],
            };

            for prop in props {
                let mut equal = true;

                if self.transitions.contains_key(&prop) {
                    let stale = !self.transitions[&prop].transition_target_equal(target);
                    if stale {
                        // The destination moved; retire the old state and
                        // start over from wherever the style is now.
                        let mut anim = self.transitions.remove(&prop).expect("checked above");
                        let mut fx = MachineFx::default();
                        anim.dispatch(AnimationInput::EndAnimation, engine, node, &mut fx);
                        self.absorb(fx, engine, node);
                        debug!(node, property = ?prop, "transition retargeted");
                        equal = false;
                    }
                } else {
                    equal = blend::property_equal(prop, current, target);
                }

                if !equal {
                    let mut anim = ActiveAnimation::new_transition(
                        spec,
                        prop,
                        current.clone(),
                        target.clone(),
                    );
                    let mut fx = MachineFx::default();
                    anim.dispatch(AnimationInput::StartAnimation, engine, node, &mut fx);
                    self.transitions.insert(prop, anim);
                    self.absorb(fx, engine, node);
                    debug!(node, property = ?prop, duration = spec.duration, "transition started");
                }
            }
        }
    }

    fn update_keyframe_animations(
        &mut self,
        node: &str,
        current: Option<&Arc<StyleSnapshot>>,
        target: &Arc<StyleSnapshot>,
        engine: &mut EngineCtx,
    ) {
        if self.keyframes.is_empty() && !target.has_animations() {
            return;
        }

        // Unchanged declaration lists leave the running set alone.
        if let Some(current) = current {
            if current.has_animations()
                && target.has_animations()
                && current.animations == target.animations
            {
                return;
            }
        }

        let mut count = 0;
        let mut changed = false;
        let mut pending: Vec<MachineFx> = Vec::new();
        for spec in &target.animations {
            if !spec.is_valid() {
                changed = true;
            } else {
                match self.keyframes.get_mut(&spec.name) {
                    Some(existing) if existing.animation_matches(spec) => {
                        // Same animation; only the play state may differ.
                        let mut fx = MachineFx::default();
                        existing.update_play_state(
                            spec.play_state == PlayState::Running,
                            engine,
                            node,
                            &mut fx,
                        );
                        existing.set_declared_play_state(spec.play_state);
                        pending.push(fx);
                    }
                    _ => changed = true,
                }
            }
            count += 1;
        }
        for fx in pending {
            self.absorb(fx, engine, node);
        }

        if !changed && self.keyframes.len() != count {
            changed = true;
        }
        if !changed {
            return;
        }

        // The composition changed: rebuild the whole set in declaration
        // order so ordinal indices stay meaningful.
        self.reset_keyframe_animations(node, engine);
        debug!(node, "keyframe animation set rebuilt");

        let mut index = 0;
        for spec in &target.animations {
            if !spec.is_valid() {
                continue;
            }
            let runnable = (spec.duration > 0.0 || spec.delay > 0.0)
                && !spec.iterations.is_zero()
                && !spec.keyframes.is_empty();
            if runnable {
                self.keyframes
                    .insert(spec.name.clone(), ActiveAnimation::new_keyframes(spec, index));
                index += 1;
            }
        }
    }

    fn reset_keyframe_animations(&mut self, node: &str, engine: &mut EngineCtx) {
        let mut retired: Vec<ActiveAnimation> =
            self.keyframes.drain().map(|(_, anim)| anim).collect();
        for anim in &mut retired {
            if !anim.postactive() {
                let mut fx = MachineFx::default();
                anim.dispatch(AnimationInput::EndAnimation, engine, node, &mut fx);
                self.absorb(fx, engine, node);
            }
        }
    }

    /// Retire finished states whose pending event dispatch (if any) has
    /// already been delivered.
    fn cleanup_finished(&mut self, engine: &mut EngineCtx) {
        if self.suspended {
            return;
        }
        self.transitions.retain(|_, anim| {
            if anim.postactive() && !anim.waiting_for_event {
                anim.cancel_timers(engine.scheduler);
                false
            } else {
                true
            }
        });
        self.keyframes.retain(|_, anim| {
            if anim.postactive() && !anim.waiting_for_event {
                anim.cancel_timers(engine.scheduler);
                false
            } else {
                true
            }
        });
    }

    /// A machine timer belonging to one contained animation fired.
    pub(crate) fn machine_timer_fired(
        &mut self,
        node: &str,
        key: &AnimationKey,
        kind: MachineTimerKind,
        elapsed: f64,
        engine: &mut EngineCtx,
    ) {
        let input = match kind {
            MachineTimerKind::Start => AnimationInput::StartTimerFired(elapsed),
            MachineTimerKind::Loop => AnimationInput::LoopTimerFired(elapsed),
            MachineTimerKind::End => AnimationInput::EndTimerFired(elapsed),
        };
        let mut fx = MachineFx::default();
        match key {
            AnimationKey::Transition(prop) => {
                if let Some(anim) = self.transitions.get_mut(prop) {
                    anim.machine_timer_fired();
                    anim.dispatch(input, engine, node, &mut fx);
                }
            }
            AnimationKey::Keyframes(name) => {
                if let Some(anim) = self.keyframes.get_mut(name) {
                    anim.machine_timer_fired();
                    anim.dispatch(input, engine, node, &mut fx);
                }
            }
        }
        self.absorb(fx, engine, node);
    }

    /// The deferred event dispatch for one animation was delivered.
    pub(crate) fn event_dispatch_fired(&mut self, key: &AnimationKey) {
        match key {
            AnimationKey::Transition(prop) => {
                if let Some(anim) = self.transitions.get_mut(prop) {
                    anim.event_dispatch_fired();
                }
            }
            AnimationKey::Keyframes(name) => {
                if let Some(anim) = self.keyframes.get_mut(name) {
                    anim.event_dispatch_fired();
                }
            }
        }
    }

    /// Flush style-available waiters. Keyframe animations go first, in
    /// declaration-ordinal order (order matters for additive blending),
    /// then transitions.
    pub(crate) fn style_available(&mut self, node: &str, engine: &mut EngineCtx) {
        if self.style_waiters == 0 {
            return;
        }

        let mut names: Vec<(usize, String)> = self
            .keyframes
            .iter()
            .map(|(name, anim)| (anim.keyframe_index(), name.clone()))
            .collect();
        names.sort();
        for (_, name) in names {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.keyframes.get_mut(&name) {
                if anim.waiting_for_style_available() {
                    anim.dispatch(AnimationInput::StyleAvailable, engine, node, &mut fx);
                }
            }
            self.absorb(fx, engine, node);
        }

        let props: Vec<AnimatableProperty> = self.transitions.keys().copied().collect();
        for prop in props {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.transitions.get_mut(&prop) {
                if anim.waiting_for_style_available() {
                    anim.dispatch(AnimationInput::StyleAvailable, engine, node, &mut fx);
                }
            }
            self.absorb(fx, engine, node);
        }
    }

    /// Pause everything. Idempotent.
    pub(crate) fn suspend(&mut self, node: &str, engine: &mut EngineCtx) {
        if self.suspended {
            return;
        }
        self.suspended = true;
        debug!(node, "animations suspended");

        let names: Vec<String> = self.keyframes.keys().cloned().collect();
        for name in names {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.keyframes.get_mut(&name) {
                anim.update_play_state(false, engine, node, &mut fx);
            }
            self.absorb(fx, engine, node);
        }

        let props: Vec<AnimatableProperty> = self.transitions.keys().copied().collect();
        for prop in props {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.transitions.get_mut(&prop) {
                anim.update_play_state(false, engine, node, &mut fx);
            }
            self.absorb(fx, engine, node);
        }
    }

    /// Unpause. Keyframe animations whose declaration says paused stay
    /// paused. Idempotent.
    pub(crate) fn resume(&mut self, node: &str, engine: &mut EngineCtx) {
        if !self.suspended {
            return;
        }
        self.suspended = false;
        debug!(node, "animations resumed");

        let names: Vec<String> = self.keyframes.keys().cloned().collect();
        for name in names {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.keyframes.get_mut(&name) {
                if anim.play_state_playing() {
                    anim.update_play_state(true, engine, node, &mut fx);
                }
            }
            self.absorb(fx, engine, node);
        }

        let props: Vec<AnimatableProperty> = self.transitions.keys().copied().collect();
        for prop in props {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.transitions.get_mut(&prop) {
                anim.update_play_state(true, engine, node, &mut fx);
            }
            self.absorb(fx, engine, node);
        }
    }

    /// Set the start time on keyframe animations awaiting their response.
    pub(crate) fn set_animation_start_time(
        &mut self,
        node: &str,
        time: f64,
        engine: &mut EngineCtx,
    ) {
        let names: Vec<String> = self.keyframes.keys().cloned().collect();
        for name in names {
            let mut fx = MachineFx::default();
            if let Some(anim) = self.keyframes.get_mut(&name) {
                if anim.waiting_for_start_time() {
                    anim.dispatch(AnimationInput::StartTimeSet(time), engine, node, &mut fx);
                }
            }
            self.absorb(fx, engine, node);
        }
    }

    /// Set the start time on the transition for `property` if it is waiting.
    pub(crate) fn set_transition_start_time(
        &mut self,
        node: &str,
        property: AnimatableProperty,
        time: f64,
        engine: &mut EngineCtx,
    ) {
        let mut fx = MachineFx::default();
        if let Some(anim) = self.transitions.get_mut(&property) {
            if anim.waiting_for_start_time() {
                anim.dispatch(AnimationInput::StartTimeSet(time), engine, node, &mut fx);
            }
        }
        self.absorb(fx, engine, node);
    }

    /// True when some contained state needs the shared timer to keep firing.
    pub(crate) fn animating(&self) -> bool {
        self.transitions
            .values()
            .any(|anim| anim.animating && anim.running())
            || self
                .keyframes
                .values()
                .any(|anim| !anim.paused() && anim.animating && anim.active())
    }

    /// Clear or set every contained state's "needs timer" flag.
    pub(crate) fn set_animating(&mut self, animating: bool) {
        for anim in self.transitions.values_mut() {
            anim.animating = animating;
        }
        for anim in self.keyframes.values_mut() {
            anim.animating = animating;
        }
    }

    pub(crate) fn is_animating_property(
        &self,
        property: AnimatableProperty,
        running_now: bool,
    ) -> bool {
        self.keyframes
            .values()
            .any(|anim| anim.is_animating_property(property, running_now))
            || self
                .transitions
                .values()
                .any(|anim| anim.is_animating_property(property, running_now))
    }

    /// Drop every contained state, cancelling its timers synchronously.
    /// Nothing is animated to completion and no further events fire.
    pub(crate) fn clear(&mut self, scheduler: &mut TimerQueue<TimerTask>) {
        for (_, mut anim) in self.transitions.drain() {
            anim.cancel_timers(scheduler);
        }
        for (_, mut anim) in self.keyframes.drain() {
            anim.cancel_timers(scheduler);
        }
        self.style_waiters = 0;
    }
}
