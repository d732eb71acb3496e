//! The per-rendering-context animation controller.
//!
//! Owns the render-target → composite map, the timer queue, and the shared
//! animation heartbeat. Hosts call `update_animations` from their style
//! pass, `style_available` once styles are committed, and `tick` from their
//! run loop whenever `next_fire_time` comes due.
//!
//! ```text
//! style pass ──▶ update_animations ──▶ CompositeAnimation::animate
//!                                         │ timers staged, never fired
//! run loop ───▶ tick ────────────────▶ state machines / event dispatch
//!                                         │ mark_style_dirty
//! host ───────▶ update_rendering ───▶ style pass ... style_available
//! ```

use std::collections::HashMap;
use std::sync::Arc;

use cadence_style::{AnimatableProperty, StyleSnapshot, ZIndex};
use tracing::{debug, trace};

use crate::composite::CompositeAnimation;
use crate::events::{AnimationHost, LifecycleEvent};
use crate::machine::{EngineCtx, TimerTask};
use crate::scheduler::{TimerId, TimerQueue};

/// Interval of the shared repeating animation timer, in seconds.
const ANIMATION_TICK_INTERVAL: f64 = 0.025;

/// Identifies the document scope a render target belongs to, for scoped
/// suspend/resume.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId(pub u64);

/// Process-wide (per rendering context) animation driver.
#[derive(Debug, Default)]
pub struct AnimationController {
    composites: HashMap<String, CompositeAnimation>,
    /// Target registration order; style-available flushing follows it.
    order: Vec<String>,
    documents: HashMap<String, DocumentId>,
    scheduler: TimerQueue<TimerTask>,
    heartbeat: Option<TimerId>,
    render_update: Option<TimerId>,
}

impl AnimationController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reconcile a freshly resolved style against the target's running
    /// animations and return the style to render: the blended style while
    /// anything animates, the target style untouched otherwise.
    ///
    /// `current` is the previously rendered style, `None` on the first
    /// resolution for this target (no transitions start then).
    pub fn update_animations(
        &mut self,
        node: &str,
        document: DocumentId,
        current: Option<&Arc<StyleSnapshot>>,
        target: &Arc<StyleSnapshot>,
        now: f64,
        host: &mut dyn AnimationHost,
    ) -> Arc<StyleSnapshot> {
        let current_declares = current
            .is_some_and(|style| style.has_animations() || style.has_transitions());
        if !current_declares && !target.has_animations() && !target.has_transitions() {
            return target.clone();
        }

        if !self.composites.contains_key(node) {
            self.composites
                .insert(node.to_string(), CompositeAnimation::new());
            self.order.push(node.to_string());
            debug!(node, "composite animation created");
        }
        self.documents.insert(node.to_string(), document);

        let blended = {
            let Self {
                composites,
                scheduler,
                render_update,
                ..
            } = self;
            let composite = composites.get_mut(node).expect("inserted above");
            let mut engine = EngineCtx {
                now,
                scheduler,
                host,
                render_update,
            };
            composite.animate(node, current, target, &mut engine)
        };

        self.update_animation_timer(now);

        match blended {
            Some(mut style) => {
                // An animated transform or sub-1 opacity forces a stacking
                // context, mirroring the cascade's compositing rule.
                if style.has_auto_z_index() && (style.opacity < 1.0 || style.has_transform()) {
                    style.z_index = ZIndex::index(0);
                }
                Arc::new(style)
            }
            None => target.clone(),
        }
    }

    /// Drop every animation attached to the target. Timers are cancelled
    /// synchronously; the previously animated state is treated as reset, not
    /// animated to completion, and no further lifecycle events fire.
    pub fn cancel_animations(&mut self, node: &str, host: &mut dyn AnimationHost) {
        if self.composites.is_empty() {
            return;
        }
        let Some(mut composite) = self.composites.remove(node) else {
            return;
        };
        self.order.retain(|n| n != node);
        self.documents.remove(node);
        composite.clear(&mut self.scheduler);
        debug!(node, "animations cancelled");
        if !composite.suspended() {
            host.mark_style_dirty(node);
        }
    }

    /// Whether any animation on the target currently affects the property,
    /// optionally restricted to actively running states.
    pub fn is_animating_property(
        &self,
        node: &str,
        property: AnimatableProperty,
        running_now: bool,
    ) -> bool {
        self.composites
            .get(node)
            .is_some_and(|composite| composite.is_animating_property(property, running_now))
    }

    /// Pause every animation on targets belonging to the document.
    pub fn suspend_animations(
        &mut self,
        document: DocumentId,
        now: f64,
        host: &mut dyn AnimationHost,
    ) {
        {
            let Self {
                composites,
                order,
                documents,
                scheduler,
                render_update,
                ..
            } = self;
            for node in order.iter() {
                if documents.get(node) != Some(&document) {
                    continue;
                }
                if let Some(composite) = composites.get_mut(node) {
                    let mut engine = EngineCtx {
                        now,
                        scheduler: &mut *scheduler,
                        host: &mut *host,
                        render_update: &mut *render_update,
                    };
                    composite.suspend(node, &mut engine);
                }
            }
        }
        self.update_animation_timer(now);
    }

    /// Resume animations previously suspended for the document.
    pub fn resume_animations(
        &mut self,
        document: DocumentId,
        now: f64,
        host: &mut dyn AnimationHost,
    ) {
        {
            let Self {
                composites,
                order,
                documents,
                scheduler,
                render_update,
                ..
            } = self;
            for node in order.iter() {
                if documents.get(node) != Some(&document) {
                    continue;
                }
                if let Some(composite) = composites.get_mut(node) {
                    let mut engine = EngineCtx {
                        now,
                        scheduler: &mut *scheduler,
                        host: &mut *host,
                        render_update: &mut *render_update,
                    };
                    composite.resume(node, &mut engine);
                }
            }
        }
        self.update_animation_timer(now);
    }

    /// The host's style pass has committed; flush every composite's pending
    /// style-available waiters, in target registration order.
    pub fn style_available(&mut self, now: f64, host: &mut dyn AnimationHost) {
        if !self
            .composites
            .values()
            .any(|composite| composite.style_waiters() > 0)
        {
            return;
        }
        let Self {
            composites,
            order,
            scheduler,
            render_update,
            ..
        } = self;
        for node in order.iter() {
            if let Some(composite) = composites.get_mut(node) {
                let mut engine = EngineCtx {
                    now,
                    scheduler: &mut *scheduler,
                    host: &mut *host,
                    render_update: &mut *render_update,
                };
                composite.style_available(node, &mut engine);
            }
        }
    }

    /// The host confirmed when the target's keyframe animations actually
    /// began (externally driven playback).
    pub fn set_animation_start_time(
        &mut self,
        node: &str,
        time: f64,
        now: f64,
        host: &mut dyn AnimationHost,
    ) {
        let Self {
            composites,
            scheduler,
            render_update,
            ..
        } = self;
        if let Some(composite) = composites.get_mut(node) {
            let mut engine = EngineCtx {
                now,
                scheduler,
                host,
                render_update,
            };
            composite.set_animation_start_time(node, time, &mut engine);
        }
    }

    /// The host confirmed when the target's transition on `property`
    /// actually began.
    pub fn set_transition_start_time(
        &mut self,
        node: &str,
        property: AnimatableProperty,
        time: f64,
        now: f64,
        host: &mut dyn AnimationHost,
    ) {
        let Self {
            composites,
            scheduler,
            render_update,
            ..
        } = self;
        if let Some(composite) = composites.get_mut(node) {
            let mut engine = EngineCtx {
                now,
                scheduler,
                host,
                render_update,
            };
            composite.set_transition_start_time(node, property, time, &mut engine);
        }
    }

    /// Fire every timer due at or before `now`, in order. This is the only
    /// place state machines advance on time and the only place host-visible
    /// dispatch happens.
    pub fn tick(&mut self, now: f64, host: &mut dyn AnimationHost) {
        while let Some((id, task)) = self.scheduler.pop_due(now) {
            match task {
                TimerTask::Machine {
                    node,
                    key,
                    kind,
                    elapsed,
                } => {
                    let Self {
                        composites,
                        scheduler,
                        render_update,
                        ..
                    } = self;
                    if let Some(composite) = composites.get_mut(&node) {
                        let mut engine = EngineCtx {
                            now,
                            scheduler,
                            host: &mut *host,
                            render_update,
                        };
                        composite.machine_timer_fired(&node, &key, kind, elapsed, &mut engine);
                    }
                }
                TimerTask::EventDispatch { node, key, event } => {
                    if let Some(composite) = self.composites.get_mut(&node) {
                        composite.event_dispatch_fired(&key);
                    }
                    let is_animation_end =
                        matches!(event, LifecycleEvent::AnimationEnded { .. });
                    host.dispatch_event(&node, event);
                    // The ended animation no longer applies; restore the
                    // unanimated style.
                    if is_animation_end {
                        host.mark_style_dirty(&node);
                    }
                }
                TimerTask::RenderUpdate => {
                    if self.render_update == Some(id) {
                        self.render_update = None;
                    }
                    host.update_rendering();
                }
                TimerTask::Heartbeat => {
                    for (node, composite) in self.composites.iter_mut() {
                        if !composite.suspended() && composite.animating() {
                            composite.set_animating(false);
                            host.mark_style_dirty(node);
                        }
                    }
                    host.update_rendering();
                    self.update_animation_timer(now);
                }
            }
        }
    }

    /// Earliest pending timer, for integrating with the host's run loop.
    pub fn next_fire_time(&mut self) -> Option<f64> {
        self.scheduler.next_fire_time()
    }

    pub fn has_pending_timers(&mut self) -> bool {
        self.next_fire_time().is_some()
    }

    /// Start or stop the shared repeating timer: it runs iff some
    /// non-suspended composite has an actively animating state.
    fn update_animation_timer(&mut self, now: f64) {
        let animating = self
            .composites
            .values()
            .any(|composite| !composite.suspended() && composite.animating());
        let active = self
            .heartbeat
            .is_some_and(|id| self.scheduler.is_active(id));
        if animating && !active {
            self.heartbeat = Some(self.scheduler.schedule_repeating(
                now,
                ANIMATION_TICK_INTERVAL,
                TimerTask::Heartbeat,
            ));
            trace!("animation timer started");
        } else if !animating && active {
            if let Some(id) = self.heartbeat.take() {
                self.scheduler.cancel(id);
            }
            trace!("animation timer stopped");
        }
    }
}

static_assertions::assert_impl_all!(AnimationController: Send);
