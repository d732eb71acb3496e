//! The per-animation lifecycle state machine.
//!
//! One `ActiveAnimation` exists per running transition property or named
//! keyframe animation on a render target. Both variants share the same
//! machine; variant-specific behavior (lifecycle events, override
//! propagation, what "end the underlying animation" means) is dispatched on
//! the `ActiveKind` payload.
//!
//! The machine is driven exclusively through `dispatch`. Timer-shaped inputs
//! arrive from the controller's queue; reconciliation-shaped inputs
//! (`StartAnimation`, `EndAnimation`, play-state changes) arrive from the
//! owning composite. A dispatch never destroys the animation it runs on;
//! retirement happens in the composite's cleanup pass, after any pending
//! event dispatch has fired.

use std::sync::Arc;

use cadence_style::{
    AnimatableProperty, AnimationDirection, AnimationSpec, IterationCount, PlayState,
    StyleSnapshot, TimingFunction, TransitionSpec, TransitionTarget,
};

use crate::events::{AnimationHost, LifecycleEvent};
use crate::keyframe::ActiveKeyframeAnimation;
use crate::scheduler::{TimerId, TimerQueue};
use crate::transition::ActiveTransition;

/// Lifecycle phase of an animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnimationPhase {
    /// Just created, nothing running yet.
    New,
    /// Start timer armed for the declared delay, waiting for it to fire.
    StartWaitTimer,
    /// Waiting for the host's style pass so the animation can begin.
    StartWaitStyleAvailable,
    /// Underlying animation asked to start, waiting for its start time.
    StartWaitResponse,
    /// Running with a loop timer armed for the next iteration boundary.
    Looping,
    /// Running the final cycle with the end timer armed.
    Ending,
    /// Paused while waiting for the start timer.
    PausedWaitTimer,
    /// Paused while waiting for the start-time response.
    PausedWaitResponse,
    /// Paused while looping or ending.
    PausedRun,
    /// Finished and awaiting retirement.
    Done,
}

/// Inputs accepted by the state machine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum AnimationInput {
    /// Hard reset to `New` from any state.
    MakeNew,
    /// Begin the start sequence.
    StartAnimation,
    /// Cancel timers, reset, and start again unless paused.
    RestartAnimation,
    /// The start-delay timer fired.
    StartTimerFired(f64),
    /// The host's style pass has run; styles are usable.
    StyleAvailable,
    /// The start time is known.
    StartTimeSet(f64),
    /// The loop timer fired at an iteration boundary.
    LoopTimerFired(f64),
    /// The end timer fired.
    EndTimerFired(f64),
    /// A keyframe animation claimed this transition's property.
    PauseOverride,
    /// The claiming keyframe animation ended.
    ResumeOverride,
    /// Declared play state flipped to running.
    PlayStateRunning,
    /// Declared play state flipped to paused.
    PlayStatePaused,
    /// Force the terminal state from any state.
    EndAnimation,
}

/// Which machine timer fired.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum MachineTimerKind {
    Start,
    Loop,
    End,
}

/// Identity of an animation within its composite.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum AnimationKey {
    Transition(AnimatableProperty),
    Keyframes(String),
}

/// Tasks carried by the controller's timer queue.
#[derive(Debug, Clone)]
pub(crate) enum TimerTask {
    /// A machine timer for one animation.
    Machine {
        node: String,
        key: AnimationKey,
        kind: MachineTimerKind,
        elapsed: f64,
    },
    /// Deferred delivery of a lifecycle event to the host.
    EventDispatch {
        node: String,
        key: AnimationKey,
        event: LifecycleEvent,
    },
    /// Deferred "apply rendering update" dispatch.
    RenderUpdate,
    /// The shared repeating animation heartbeat.
    Heartbeat,
}

/// Composite-level side effects produced by a dispatch. Applied by the
/// owning composite after the dispatch returns, so a keyframe animation can
/// act on sibling transitions without aliasing the maps.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) enum CompositeEffect {
    OverrideProperty(AnimatableProperty),
    ResumeOverridden(AnimatableProperty),
}

/// Out-params of a dispatch.
#[derive(Debug, Default)]
pub(crate) struct MachineFx {
    pub effects: Vec<CompositeEffect>,
    /// Net change to the composite's style-available waiter count.
    pub waiter_delta: i32,
}

/// Controller-owned collaborators threaded through every dispatch.
pub(crate) struct EngineCtx<'a> {
    pub now: f64,
    pub scheduler: &'a mut TimerQueue<TimerTask>,
    pub host: &'a mut dyn AnimationHost,
    /// Shared deferred render-update dispatcher; armed at most once.
    pub render_update: &'a mut Option<TimerId>,
}

impl EngineCtx<'_> {
    /// Arm the deferred rendering-update dispatch unless one is pending.
    pub fn request_render_update(&mut self) {
        let pending = self
            .render_update
            .is_some_and(|id| self.scheduler.is_active(id));
        if !pending {
            *self.render_update =
                Some(self.scheduler.schedule(self.now, 0.0, TimerTask::RenderUpdate));
        }
    }
}

/// Declared timing parameters, normalized across both variants.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct TimingInput {
    pub duration: f64,
    pub delay: f64,
    pub iterations: IterationCount,
    pub direction: AnimationDirection,
    pub curve: TimingFunction,
    pub play_state: PlayState,
}

impl TimingInput {
    fn from_transition(spec: &TransitionSpec) -> Self {
        Self {
            duration: spec.duration,
            delay: spec.delay,
            iterations: IterationCount::ONE,
            direction: AnimationDirection::Normal,
            curve: spec.timing,
            play_state: PlayState::Running,
        }
    }

    fn from_animation(spec: &AnimationSpec) -> Self {
        Self {
            duration: spec.duration,
            delay: spec.delay,
            iterations: spec.iterations,
            direction: spec.direction,
            curve: spec.timing,
            play_state: spec.play_state,
        }
    }
}

/// Variant payload.
#[derive(Debug)]
pub(crate) enum ActiveKind {
    Transition(ActiveTransition),
    Keyframes(ActiveKeyframeAnimation),
}

/// One running transition or keyframe animation.
#[derive(Debug)]
pub(crate) struct ActiveAnimation {
    pub(crate) phase: AnimationPhase,
    pub(crate) timing: TimingInput,
    pub(crate) kind: ActiveKind,
    /// Set while blending produces values that need the shared timer to
    /// keep firing; cleared by each heartbeat.
    pub(crate) animating: bool,
    pub(crate) start_time: Option<f64>,
    /// `Some` exactly while paused.
    pub(crate) pause_time: Option<f64>,
    /// Guards retirement while an event dispatch is in flight.
    pub(crate) waiting_for_event: bool,
    pub(crate) machine_timer: Option<TimerId>,
    pub(crate) event_timer: Option<TimerId>,
}

impl ActiveAnimation {
    pub(crate) fn new_transition(
        spec: &TransitionSpec,
        property: AnimatableProperty,
        from_style: Arc<StyleSnapshot>,
        to_style: Arc<StyleSnapshot>,
    ) -> Self {
        Self {
            phase: AnimationPhase::New,
            timing: TimingInput::from_transition(spec),
            kind: ActiveKind::Transition(ActiveTransition::new(
                spec.target,
                property,
                from_style,
                to_style,
            )),
            animating: false,
            start_time: None,
            pause_time: None,
            waiting_for_event: false,
            machine_timer: None,
            event_timer: None,
        }
    }

    pub(crate) fn new_keyframes(spec: &AnimationSpec, index: usize) -> Self {
        Self {
            phase: AnimationPhase::New,
            timing: TimingInput::from_animation(spec),
            kind: ActiveKind::Keyframes(ActiveKeyframeAnimation::new(
                spec.name.clone(),
                index,
                spec.keyframes.clone(),
            )),
            animating: false,
            start_time: None,
            pause_time: None,
            waiting_for_event: false,
            machine_timer: None,
            event_timer: None,
        }
    }

    pub(crate) fn key(&self) -> AnimationKey {
        match &self.kind {
            ActiveKind::Transition(tr) => AnimationKey::Transition(tr.property),
            ActiveKind::Keyframes(kf) => AnimationKey::Keyframes(kf.name.clone()),
        }
    }

    // Phase predicates.

    pub(crate) fn is_new(&self) -> bool {
        self.phase == AnimationPhase::New
    }

    pub(crate) fn waiting_to_start(&self) -> bool {
        matches!(
            self.phase,
            AnimationPhase::New | AnimationPhase::StartWaitTimer
        )
    }

    pub(crate) fn preactive(&self) -> bool {
        matches!(
            self.phase,
            AnimationPhase::New
                | AnimationPhase::StartWaitTimer
                | AnimationPhase::StartWaitStyleAvailable
                | AnimationPhase::StartWaitResponse
        )
    }

    pub(crate) fn postactive(&self) -> bool {
        self.phase == AnimationPhase::Done
    }

    pub(crate) fn active(&self) -> bool {
        !self.preactive() && !self.postactive()
    }

    pub(crate) fn running(&self) -> bool {
        !self.is_new() && !self.postactive()
    }

    pub(crate) fn paused(&self) -> bool {
        self.pause_time.is_some()
    }

    pub(crate) fn waiting_for_start_time(&self) -> bool {
        self.phase == AnimationPhase::StartWaitResponse
    }

    pub(crate) fn waiting_for_style_available(&self) -> bool {
        self.phase == AnimationPhase::StartWaitStyleAvailable
    }

    pub(crate) fn overridden(&self) -> bool {
        match &self.kind {
            ActiveKind::Transition(tr) => tr.overridden,
            ActiveKind::Keyframes(_) => false,
        }
    }

    pub(crate) fn affects_property(&self, property: AnimatableProperty) -> bool {
        match &self.kind {
            ActiveKind::Transition(tr) => tr.property == property,
            ActiveKind::Keyframes(kf) => kf.keyframes.declares(property),
        }
    }

    pub(crate) fn is_animating_property(
        &self,
        property: AnimatableProperty,
        running_now: bool,
    ) -> bool {
        if running_now {
            !self.waiting_to_start() && !self.postactive() && self.affects_property(property)
        } else {
            !self.postactive() && self.affects_property(property)
        }
    }

    /// Whether the declared play state wants this animation running.
    pub(crate) fn play_state_playing(&self) -> bool {
        self.timing.play_state == PlayState::Running
    }

    /// Update the stored declared play state (keyframe animations whose
    /// declaration changed only in play state are updated in place).
    pub(crate) fn set_declared_play_state(&mut self, play_state: PlayState) {
        self.timing.play_state = play_state;
    }

    /// True when this keyframe animation's defining parameters match the
    /// declaration (play state excluded).
    pub(crate) fn animation_matches(&self, spec: &AnimationSpec) -> bool {
        match &self.kind {
            ActiveKind::Keyframes(kf) => {
                kf.name == spec.name
                    && kf.keyframes == spec.keyframes
                    && self.timing.duration == spec.duration
                    && self.timing.delay == spec.delay
                    && self.timing.iterations == spec.iterations
                    && self.timing.direction == spec.direction
                    && self.timing.curve == spec.timing
            }
            ActiveKind::Transition(_) => false,
        }
    }

    /// Flip play state through the machine, mirroring the declared-state
    /// guard: only a real change (or a brand-new animation) dispatches.
    pub(crate) fn update_play_state(
        &mut self,
        running: bool,
        engine: &mut EngineCtx,
        node: &str,
        fx: &mut MachineFx,
    ) {
        if self.paused() == running || self.is_new() {
            let input = if running {
                AnimationInput::PlayStateRunning
            } else {
                AnimationInput::PlayStatePaused
            };
            self.dispatch(input, engine, node, fx);
        }
    }

    /// Flip the override flag on a transition, pausing or resuming the
    /// underlying animation accordingly.
    pub(crate) fn set_overridden(
        &mut self,
        overridden: bool,
        engine: &mut EngineCtx,
        node: &str,
        fx: &mut MachineFx,
    ) {
        let changed = match &mut self.kind {
            ActiveKind::Transition(tr) if tr.overridden != overridden => {
                tr.overridden = overridden;
                true
            }
            _ => false,
        };
        if changed {
            let input = if overridden {
                AnimationInput::PauseOverride
            } else {
                AnimationInput::ResumeOverride
            };
            self.dispatch(input, engine, node, fx);
        }
    }

    /// Cancel both pending timers. A cancelled event dispatch will never
    /// fire, so the retirement guard is cleared with it.
    pub(crate) fn cancel_timers(&mut self, scheduler: &mut TimerQueue<TimerTask>) {
        if let Some(id) = self.machine_timer.take() {
            scheduler.cancel(id);
        }
        if let Some(id) = self.event_timer.take() {
            scheduler.cancel(id);
        }
        self.waiting_for_event = false;
    }

    /// The pending event dispatch fired; allow retirement.
    pub(crate) fn event_dispatch_fired(&mut self) {
        self.waiting_for_event = false;
        self.event_timer = None;
    }

    /// The machine timer fired; clear the handle before dispatching.
    pub(crate) fn machine_timer_fired(&mut self) {
        self.machine_timer = None;
    }

    /// Run one state machine input.
    pub(crate) fn dispatch(
        &mut self,
        input: AnimationInput,
        engine: &mut EngineCtx,
        node: &str,
        fx: &mut MachineFx,
    ) {
        use AnimationInput as In;
        use AnimationPhase as Phase;

        // Global inputs override normal per-phase dispatch.
        match input {
            In::MakeNew => {
                if self.phase == Phase::StartWaitStyleAvailable {
                    fx.waiter_delta -= 1;
                }
                self.phase = Phase::New;
                self.start_time = None;
                self.pause_time = None;
                self.end_underlying(false, engine, node);
                return;
            }
            In::RestartAnimation => {
                self.cancel_timers(engine.scheduler);
                if self.phase == Phase::StartWaitStyleAvailable {
                    fx.waiter_delta -= 1;
                }
                let was_paused = self.paused();
                self.phase = Phase::New;
                self.start_time = None;
                self.pause_time = None;
                self.end_underlying(false, engine, node);
                // A paused animation resets but stays parked in New; the
                // next play-state flip to running starts it.
                if !was_paused {
                    self.dispatch(In::StartAnimation, engine, node, fx);
                }
                return;
            }
            In::EndAnimation => {
                self.cancel_timers(engine.scheduler);
                if self.phase == Phase::StartWaitStyleAvailable {
                    fx.waiter_delta -= 1;
                }
                self.phase = Phase::Done;
                self.end_underlying(true, engine, node);
                return;
            }
            In::PauseOverride => {
                if self.phase == Phase::StartWaitResponse {
                    // The underlying animation is being cancelled before its
                    // start-time response can arrive; synthesize it.
                    self.end_underlying(false, engine, node);
                    self.dispatch(In::StartTimeSet(engine.now), engine, node, fx);
                }
                return;
            }
            In::ResumeOverride => {
                if matches!(self.phase, Phase::Looping | Phase::Ending) {
                    let begin = self.start_time.unwrap_or(0.0);
                    self.start_underlying(begin, engine, node);
                }
                return;
            }
            _ => {}
        }

        match self.phase {
            Phase::New => {
                debug_assert!(matches!(
                    input,
                    In::StartAnimation | In::PlayStateRunning | In::PlayStatePaused
                ));
                if matches!(input, In::StartAnimation | In::PlayStateRunning) {
                    self.phase = Phase::StartWaitTimer;
                    let delay = self.timing.delay.max(0.0);
                    self.arm_machine_timer(engine, node, MachineTimerKind::Start, delay, delay);
                }
            }
            Phase::StartWaitTimer => match input {
                In::StartTimerFired(elapsed) => {
                    debug_assert!(elapsed >= 0.0);
                    self.phase = Phase::StartWaitStyleAvailable;
                    fx.waiter_delta += 1;
                    // Trigger a style pass so the animation can begin.
                    engine.host.mark_style_dirty(node);
                    engine.request_render_update();
                }
                In::PlayStatePaused => {
                    debug_assert!(self.running());
                    self.pause_time = Some(engine.now);
                    self.cancel_timers(engine.scheduler);
                    self.phase = Phase::PausedWaitTimer;
                }
                _ => debug_assert!(false, "unexpected input in StartWaitTimer"),
            },
            Phase::StartWaitStyleAvailable => match input {
                In::StyleAvailable | In::PlayStatePaused => {
                    fx.waiter_delta -= 1;
                    if input == In::StyleAvailable {
                        self.phase = Phase::StartWaitResponse;
                        self.override_siblings(fx);
                        self.on_start(0.0, engine, node);
                        if self.overridden() || !self.start_underlying(0.0, engine, node) {
                            // No start-time response will arrive; fire it now.
                            self.dispatch(In::StartTimeSet(engine.now), engine, node, fx);
                        }
                    } else {
                        // The style pass has already run by the time a pause
                        // arrives here; wait for the response as if started.
                        debug_assert!(self.running());
                        self.pause_time = Some(0.0);
                        self.phase = Phase::StartWaitResponse;
                    }
                }
                _ => debug_assert!(false, "unexpected input in StartWaitStyleAvailable"),
            },
            Phase::StartWaitResponse => match input {
                In::StartTimeSet(t) => {
                    debug_assert!(t >= 0.0);
                    // Keep an explicitly confirmed start time.
                    if self.start_time.is_none() {
                        self.start_time = Some(t);
                    }
                    self.prime_event_timers(engine, node);
                    engine.host.mark_style_dirty(node);
                    engine.request_render_update();
                }
                In::PlayStatePaused => {
                    self.pause_time = Some(0.0);
                    self.end_underlying(false, engine, node);
                    self.phase = Phase::PausedWaitResponse;
                }
                _ => debug_assert!(false, "unexpected input in StartWaitResponse"),
            },
            Phase::Looping => match input {
                In::LoopTimerFired(elapsed) => {
                    debug_assert!(elapsed >= 0.0);
                    self.on_iteration(elapsed, engine, node);
                    self.prime_event_timers(engine, node);
                }
                In::PlayStatePaused => {
                    self.pause_time = Some(engine.now);
                    self.cancel_timers(engine.scheduler);
                    self.end_underlying(false, engine, node);
                    self.phase = Phase::PausedRun;
                }
                _ => debug_assert!(false, "unexpected input in Looping"),
            },
            Phase::Ending => match input {
                In::EndTimerFired(elapsed) => {
                    debug_assert!(elapsed >= 0.0);
                    self.on_end(elapsed, engine, node);
                    self.resume_overridden_siblings(fx);
                    // One more style pass to land on the final values.
                    engine.host.mark_style_dirty(node);
                    self.phase = Phase::Done;
                    engine.request_render_update();
                }
                In::PlayStatePaused => {
                    self.pause_time = Some(engine.now);
                    self.cancel_timers(engine.scheduler);
                    self.end_underlying(false, engine, node);
                    self.phase = Phase::PausedRun;
                }
                _ => debug_assert!(false, "unexpected input in Ending"),
            },
            Phase::PausedWaitTimer => {
                debug_assert!(input == In::PlayStateRunning);
                debug_assert!(!self.running());
                if input == In::PlayStateRunning {
                    // Shift the start time forward by the paused duration,
                    // then wait for the start timer again.
                    let pause = self.pause_time.take().unwrap_or(engine.now);
                    self.start_time = Some(self.start_time.unwrap_or(0.0) + engine.now - pause);
                    self.phase = Phase::New;
                    self.dispatch(In::StartAnimation, engine, node, fx);
                }
            }
            Phase::PausedWaitResponse | Phase::PausedRun => {
                // The two cases differ only in whether a start time exists:
                // resuming from PausedRun shifts it by the paused duration,
                // resuming from PausedWaitResponse starts over and lets the
                // synthesized (or confirmed) response set it.
                debug_assert!(input == In::PlayStateRunning);
                debug_assert!(!self.running());
                if input == In::PlayStateRunning {
                    if self.phase == Phase::PausedRun {
                        let pause = self.pause_time.take().unwrap_or(engine.now);
                        self.start_time =
                            Some(self.start_time.unwrap_or(0.0) + engine.now - pause);
                    } else {
                        self.pause_time = None;
                        self.start_time = None;
                    }
                    self.phase = Phase::StartWaitResponse;
                    let begin = self.start_time.unwrap_or(0.0);
                    if self.overridden() || !self.start_underlying(begin, engine, node) {
                        self.dispatch(In::StartTimeSet(engine.now), engine, node, fx);
                    }
                }
            }
            Phase::Done => {
                // Terminal; retirement happens in the composite.
            }
        }
    }

    /// Arm the next loop or end timer based on elapsed and total duration.
    /// The timer is always armed, even at zero remaining delay, so the
    /// follow-up runs from the queue rather than inside the caller.
    fn prime_event_timers(&mut self, engine: &mut EngineCtx, node: &str) {
        let start = self.start_time.unwrap_or(engine.now);
        let elapsed = engine.now - start;
        debug_assert!(elapsed >= 0.0);

        let total = self.timing.iterations.total_duration(self.timing.duration);

        let mut duration_left = 0.0;
        let mut next_iteration_time = total.unwrap_or(0.0);
        let in_cycle = total.is_none_or(|t| elapsed < t);
        if in_cycle && self.timing.duration > 0.0 {
            duration_left = self.timing.duration - elapsed % self.timing.duration;
            next_iteration_time = elapsed + duration_left;
        }

        let loops_again = match total {
            None => true,
            Some(total) => next_iteration_time < total,
        };
        if loops_again {
            self.phase = AnimationPhase::Looping;
            self.arm_machine_timer(
                engine,
                node,
                MachineTimerKind::Loop,
                duration_left,
                next_iteration_time,
            );
        } else {
            self.phase = AnimationPhase::Ending;
            self.arm_machine_timer(
                engine,
                node,
                MachineTimerKind::End,
                duration_left,
                next_iteration_time,
            );
        }
    }

    fn arm_machine_timer(
        &mut self,
        engine: &mut EngineCtx,
        node: &str,
        kind: MachineTimerKind,
        delay: f64,
        elapsed: f64,
    ) {
        if let Some(id) = self.machine_timer.take() {
            engine.scheduler.cancel(id);
        }
        self.machine_timer = Some(engine.scheduler.schedule(
            engine.now,
            delay,
            TimerTask::Machine {
                node: node.to_string(),
                key: self.key(),
                kind,
                elapsed,
            },
        ));
    }

    /// Progress through the current cycle at `now`, after the optional
    /// keyframe sub-range remap and the timing curve.
    pub(crate) fn progress(&self, now: f64, scale: f64, offset: f64) -> f64 {
        if self.preactive() {
            return 0.0;
        }

        let start = self.start_time.unwrap_or(0.0);
        let elapsed = match self.pause_time {
            Some(pause) => pause - start,
            None => now - start,
        };
        if self.pause_time.is_none() && elapsed < 0.0 {
            return 0.0;
        }

        let duration = self.timing.duration;
        let total = self.timing.iterations.total_duration(duration);
        if self.postactive() || duration == 0.0 || total.is_some_and(|t| elapsed >= t) {
            return 1.0;
        }

        let mut fractional = elapsed / duration;
        let integral = fractional.floor();
        fractional -= integral;
        if self.timing.direction == AnimationDirection::Alternate && (integral as i64) & 1 == 1 {
            fractional = 1.0 - fractional;
        }

        if scale != 1.0 || offset != 0.0 {
            fractional = (fractional - offset) * scale;
        }

        self.timing.curve.evaluate(fractional, duration)
    }

    // Variant hooks.

    fn on_start(&mut self, elapsed: f64, engine: &mut EngineCtx, node: &str) {
        if let ActiveKind::Keyframes(kf) = &self.kind {
            let event = LifecycleEvent::AnimationStarted {
                name: kf.name.clone(),
                elapsed,
            };
            self.schedule_event(engine, node, event);
        }
    }

    fn on_iteration(&mut self, elapsed: f64, engine: &mut EngineCtx, node: &str) {
        if let ActiveKind::Keyframes(kf) = &self.kind {
            let event = LifecycleEvent::AnimationIteration {
                name: kf.name.clone(),
                elapsed,
            };
            self.schedule_event(engine, node, event);
        }
    }

    fn on_end(&mut self, elapsed: f64, engine: &mut EngineCtx, node: &str) {
        let event = match &self.kind {
            // The event names the property as declared; an `all` transition
            // reports the concrete property this state animated.
            ActiveKind::Transition(tr) => LifecycleEvent::TransitionEnded {
                property: match tr.declared_target {
                    TransitionTarget::Property { property } => property,
                    TransitionTarget::All => tr.property,
                },
                elapsed,
            },
            ActiveKind::Keyframes(kf) => LifecycleEvent::AnimationEnded {
                name: kf.name.clone(),
                elapsed,
            },
        };
        if !self.schedule_event(engine, node, event) {
            // Nothing listens, so the dispatch path will not run
            // end-underlying for us.
            self.end_underlying(true, engine, node);
        }
    }

    fn start_underlying(&mut self, begin_time: f64, engine: &mut EngineCtx, node: &str) -> bool {
        engine.host.start_accelerated(node, begin_time)
    }

    fn end_underlying(&mut self, _reset: bool, engine: &mut EngineCtx, node: &str) {
        if let ActiveKind::Keyframes(_) = &self.kind {
            // Restore the unanimated style.
            engine.host.mark_style_dirty(node);
        }
    }

    fn override_siblings(&self, fx: &mut MachineFx) {
        if let ActiveKind::Keyframes(kf) = &self.kind {
            for property in kf.keyframes.properties() {
                fx.effects.push(CompositeEffect::OverrideProperty(property));
            }
        }
    }

    fn resume_overridden_siblings(&self, fx: &mut MachineFx) {
        if let ActiveKind::Keyframes(kf) = &self.kind {
            for property in kf.keyframes.properties() {
                fx.effects.push(CompositeEffect::ResumeOverridden(property));
            }
        }
    }

    /// Stage a deferred event dispatch. Returns false when the host has no
    /// listener and nothing was scheduled.
    fn schedule_event(
        &mut self,
        engine: &mut EngineCtx,
        node: &str,
        event: LifecycleEvent,
    ) -> bool {
        if !engine.host.has_listener(node, event.listener_kind()) {
            return false;
        }
        if let Some(id) = self.event_timer.take() {
            engine.scheduler.cancel(id);
        }
        self.waiting_for_event = true;
        self.event_timer = Some(engine.scheduler.schedule(
            engine.now,
            0.0,
            TimerTask::EventDispatch {
                node: node.to_string(),
                key: self.key(),
                event,
            },
        ));
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::ListenerKind;
    use cadence_style::{Length, TransitionSpec};

    /// Host that records every callback.
    #[derive(Default)]
    struct RecordingHost {
        dirty: Vec<String>,
        rendering_updates: usize,
        events: Vec<(String, LifecycleEvent)>,
        accelerated: bool,
    }

    impl AnimationHost for RecordingHost {
        fn mark_style_dirty(&mut self, node: &str) {
            self.dirty.push(node.to_string());
        }

        fn update_rendering(&mut self) {
            self.rendering_updates += 1;
        }

        fn dispatch_event(&mut self, node: &str, event: LifecycleEvent) {
            self.events.push((node.to_string(), event));
        }

        fn has_listener(&self, _node: &str, _kind: ListenerKind) -> bool {
            true
        }

        fn start_accelerated(&mut self, _node: &str, _begin_time: f64) -> bool {
            self.accelerated
        }
    }

    struct Rig {
        scheduler: TimerQueue<TimerTask>,
        host: RecordingHost,
        render_update: Option<TimerId>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                scheduler: TimerQueue::new(),
                host: RecordingHost::default(),
                render_update: None,
            }
        }

        fn dispatch(
            &mut self,
            anim: &mut ActiveAnimation,
            input: AnimationInput,
            now: f64,
        ) -> MachineFx {
            let mut fx = MachineFx::default();
            let mut engine = EngineCtx {
                now,
                scheduler: &mut self.scheduler,
                host: &mut self.host,
                render_update: &mut self.render_update,
            };
            anim.dispatch(input, &mut engine, "node", &mut fx);
            fx
        }
    }

    fn transition_anim(duration: f64, delay: f64) -> ActiveAnimation {
        let spec = TransitionSpec::property(AnimatableProperty::Opacity, duration)
            .with_delay(delay)
            .with_timing(TimingFunction::Linear);
        let from = Arc::new(StyleSnapshot::default().with_opacity(0.0));
        let to = Arc::new(StyleSnapshot::default().with_opacity(1.0));
        ActiveAnimation::new_transition(&spec, AnimatableProperty::Opacity, from, to)
    }

    #[test]
    fn test_new_animation_arms_start_timer_for_declared_delay() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.2);

        assert_eq!(anim.phase, AnimationPhase::New);
        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);

        assert_eq!(anim.phase, AnimationPhase::StartWaitTimer);
        assert_eq!(rig.scheduler.next_fire_time(), Some(0.2));
    }

    #[test]
    fn test_zero_delay_still_goes_through_timer() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        assert_eq!(anim.phase, AnimationPhase::StartWaitTimer);
        // Armed at zero delay rather than run inline.
        assert_eq!(rig.scheduler.next_fire_time(), Some(0.0));
    }

    #[test]
    fn test_start_sequence_reaches_looping_then_ending() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        assert_eq!(anim.phase, AnimationPhase::StartWaitStyleAvailable);

        let fx = rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        // waiter registered on timer fire, released on style-available
        assert_eq!(fx.waiter_delta, -1);

        // A single iteration: the synthesized start time takes it straight
        // to Ending with the end timer at the full duration.
        assert_eq!(anim.phase, AnimationPhase::Ending);
        assert_eq!(anim.start_time, Some(0.0));
        assert_eq!(rig.scheduler.next_fire_time(), Some(0.0));
        // Machine timer pending for the end at t=1.
        assert!(anim.machine_timer.is_some());
    }

    #[test]
    fn test_three_iterations_loop_twice_then_end() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);
        anim.timing.iterations = IterationCount::count(3.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        assert_eq!(anim.phase, AnimationPhase::Looping);

        rig.dispatch(&mut anim, AnimationInput::LoopTimerFired(1.0), 1.0);
        assert_eq!(anim.phase, AnimationPhase::Looping);

        rig.dispatch(&mut anim, AnimationInput::LoopTimerFired(2.0), 2.0);
        assert_eq!(anim.phase, AnimationPhase::Ending);

        rig.dispatch(&mut anim, AnimationInput::EndTimerFired(3.0), 3.0);
        assert_eq!(anim.phase, AnimationPhase::Done);
    }

    #[test]
    fn test_pause_and_resume_shift_start_time_by_paused_duration() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(10.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        assert_eq!(anim.start_time, Some(0.0));
        assert_eq!(anim.phase, AnimationPhase::Ending);

        // Pause at t=4: progress frozen at 0.4.
        rig.dispatch(&mut anim, AnimationInput::PlayStatePaused, 4.0);
        assert_eq!(anim.phase, AnimationPhase::PausedRun);
        assert!(anim.paused());
        assert!((anim.progress(100.0, 1.0, 0.0) - 0.4).abs() < 1e-9);

        // Resume at t=9: start time shifts by the 5 paused seconds.
        rig.dispatch(&mut anim, AnimationInput::PlayStateRunning, 9.0);
        assert!(!anim.paused());
        assert_eq!(anim.start_time, Some(5.0));
        assert!((anim.progress(9.0, 1.0, 0.0) - 0.4).abs() < 1e-9);
    }

    #[test]
    fn test_resume_without_elapsed_time_restores_state() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(10.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        rig.dispatch(&mut anim, AnimationInput::PlayStatePaused, 4.0);
        let frozen = anim.progress(4.0, 1.0, 0.0);
        rig.dispatch(&mut anim, AnimationInput::PlayStateRunning, 4.0);

        assert_eq!(anim.start_time, Some(0.0));
        assert_eq!(anim.phase, AnimationPhase::Ending);
        assert!((anim.progress(4.0, 1.0, 0.0) - frozen).abs() < 1e-9);
    }

    #[test]
    fn test_pause_while_waiting_for_start_timer() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.5);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::PlayStatePaused, 0.1);
        assert_eq!(anim.phase, AnimationPhase::PausedWaitTimer);
        // Timer cancelled while paused.
        assert_eq!(rig.scheduler.next_fire_time(), None);

        rig.dispatch(&mut anim, AnimationInput::PlayStateRunning, 0.3);
        // Start sequence begins again with the full delay.
        assert_eq!(anim.phase, AnimationPhase::StartWaitTimer);
        assert_eq!(rig.scheduler.next_fire_time(), Some(0.8));
    }

    #[test]
    fn test_make_new_hard_resets() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        assert!(anim.start_time.is_some());

        rig.dispatch(&mut anim, AnimationInput::MakeNew, 0.5);
        assert_eq!(anim.phase, AnimationPhase::New);
        assert_eq!(anim.start_time, None);
        assert!(!anim.paused());
        // Back at zero progress until restarted.
        assert_eq!(anim.progress(0.5, 1.0, 0.0), 0.0);
    }

    #[test]
    fn test_restart_cancels_and_starts_over() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        assert_eq!(anim.phase, AnimationPhase::Ending);

        rig.dispatch(&mut anim, AnimationInput::RestartAnimation, 0.4);
        // Restart runs the start sequence again immediately.
        assert_eq!(anim.phase, AnimationPhase::StartWaitTimer);
        assert_eq!(anim.start_time, None);
    }

    #[test]
    fn test_restart_while_paused_stays_new() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        rig.dispatch(&mut anim, AnimationInput::PlayStatePaused, 0.2);
        assert_eq!(anim.phase, AnimationPhase::PausedRun);

        rig.dispatch(&mut anim, AnimationInput::RestartAnimation, 0.3);
        // A paused animation resets but does not start running.
        assert_eq!(anim.phase, AnimationPhase::New);
    }

    #[test]
    fn test_end_animation_is_terminal() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::EndAnimation, 0.5);
        assert_eq!(anim.phase, AnimationPhase::Done);
        assert!(anim.postactive());
        // Timers gone.
        assert_eq!(rig.scheduler.next_fire_time(), None);
    }

    #[test]
    fn test_progress_before_start_is_zero_and_after_total_is_one() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        assert_eq!(anim.progress(100.0, 1.0, 0.0), 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        assert!((anim.progress(0.5, 1.0, 0.0) - 0.5).abs() < 1e-9);
        assert_eq!(anim.progress(2.0, 1.0, 0.0), 1.0);
    }

    #[test]
    fn test_alternate_direction_reverses_odd_cycles() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);
        anim.timing.iterations = IterationCount::count(4.0);
        anim.timing.direction = AnimationDirection::Alternate;

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        // Cycle 0 runs forward, cycle 1 runs reversed.
        assert!((anim.progress(0.25, 1.0, 0.0) - 0.25).abs() < 1e-9);
        assert!((anim.progress(1.25, 1.0, 0.0) - 0.75).abs() < 1e-9);
        assert!((anim.progress(2.25, 1.0, 0.0) - 0.25).abs() < 1e-9);
    }

    #[test]
    fn test_scale_offset_remap() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        // Remap the [0.5, 1.0] keyframe segment: at t=0.75 the segment-local
        // progress is 0.5.
        let p = anim.progress(0.75, 2.0, 0.5);
        assert!((p - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_keyframe_animation_emits_deferred_start_event() {
        let mut rig = Rig::new();
        let style = Arc::new(StyleSnapshot::default());
        let list = Arc::new(
            cadence_style::KeyframeList::new()
                .keyframe(0.0, style.clone())
                .keyframe(1.0, style)
                .declare(AnimatableProperty::Opacity),
        );
        let spec = AnimationSpec::new("fade", list).duration(1.0);
        let mut anim = ActiveAnimation::new_keyframes(&spec, 0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        // The event is staged, not delivered inline.
        assert!(anim.waiting_for_event);
        assert!(rig.host.events.is_empty());
        assert!(anim.event_timer.is_some());
    }

    #[test]
    fn test_keyframe_override_effects_target_declared_properties() {
        let mut rig = Rig::new();
        let style = Arc::new(StyleSnapshot::default());
        let list = Arc::new(
            cadence_style::KeyframeList::new()
                .keyframe(0.0, style.clone())
                .keyframe(1.0, style)
                .declare(AnimatableProperty::Opacity)
                .declare(AnimatableProperty::Width),
        );
        let spec = AnimationSpec::new("grow", list).duration(1.0);
        let mut anim = ActiveAnimation::new_keyframes(&spec, 0);

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        let fx = rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        assert!(fx
            .effects
            .contains(&CompositeEffect::OverrideProperty(AnimatableProperty::Opacity)));
        assert!(fx
            .effects
            .contains(&CompositeEffect::OverrideProperty(AnimatableProperty::Width)));
    }

    #[test]
    fn test_pause_override_synthesizes_start_time() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);
        // Keep the machine in StartWaitResponse by accepting acceleration.
        rig.host.accelerated = true;

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);
        assert_eq!(anim.phase, AnimationPhase::StartWaitResponse);

        if let ActiveKind::Transition(tr) = &mut anim.kind {
            tr.overridden = true;
        }
        rig.dispatch(&mut anim, AnimationInput::PauseOverride, 0.5);
        assert_eq!(anim.start_time, Some(0.5));
        assert!(matches!(
            anim.phase,
            AnimationPhase::Looping | AnimationPhase::Ending
        ));
    }

    #[test]
    fn test_accelerated_start_waits_for_response() {
        let mut rig = Rig::new();
        let mut anim = transition_anim(1.0, 0.0);
        rig.host.accelerated = true;

        rig.dispatch(&mut anim, AnimationInput::StartAnimation, 0.0);
        rig.dispatch(&mut anim, AnimationInput::StartTimerFired(0.0), 0.0);
        rig.dispatch(&mut anim, AnimationInput::StyleAvailable, 0.0);

        assert_eq!(anim.phase, AnimationPhase::StartWaitResponse);
        assert!(anim.waiting_for_start_time());

        // The host confirms the real start time later.
        rig.dispatch(&mut anim, AnimationInput::StartTimeSet(0.3), 0.35);
        assert_eq!(anim.start_time, Some(0.3));
        assert_eq!(anim.phase, AnimationPhase::Ending);
    }

    #[test]
    fn test_transition_identity() {
        let anim = transition_anim(1.0, 0.0);
        assert_eq!(
            anim.key(),
            AnimationKey::Transition(AnimatableProperty::Opacity)
        );
        assert!(anim.affects_property(AnimatableProperty::Opacity));
        assert!(!anim.affects_property(AnimatableProperty::Width));
        // Waiting to start: not "running now".
        assert!(!anim.is_animating_property(AnimatableProperty::Opacity, true));
        assert!(anim.is_animating_property(AnimatableProperty::Opacity, false));
    }

    #[test]
    fn test_length_transition_snapshot_invariant() {
        // Snapshots are owned by construction for the whole lifetime.
        let spec = TransitionSpec::property(AnimatableProperty::Width, 1.0);
        let from = Arc::new(StyleSnapshot::default().with_width(Length::px(10.0)));
        let to = Arc::new(StyleSnapshot::default().with_width(Length::px(20.0)));
        let anim =
            ActiveAnimation::new_transition(&spec, AnimatableProperty::Width, from.clone(), to);
        match &anim.kind {
            ActiveKind::Transition(tr) => {
                assert_eq!(tr.from_style.width, Length::px(10.0));
                assert_eq!(tr.to_style.width, Length::px(20.0));
            }
            _ => unreachable!(),
        }
        // The source Arc is shared, not copied.
        assert_eq!(Arc::strong_count(&from), 2);
    }
}
