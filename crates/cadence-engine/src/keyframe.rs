//! Keyframe animation variant state.
//!
//! A keyframe animation blends every property its keyframe list declares,
//! between the pair of keyframes bounding the current cycle position, with
//! progress remapped into that segment. An animation that cannot find a
//! bounding pair has nothing to interpolate and retires itself.

use std::sync::Arc;

use cadence_style::{AnimationDirection, KeyframeList, PlayState, StyleSnapshot};

use crate::blend;
use crate::machine::{
    ActiveAnimation, ActiveKind, AnimationInput, EngineCtx, MachineFx,
};

/// Variant data for a running keyframe animation.
#[derive(Debug)]
pub(crate) struct ActiveKeyframeAnimation {
    pub name: String,
    /// Position in the declaration's animation list; preserved so
    /// style-available flushing keeps additive blending order.
    pub index: usize,
    pub keyframes: Arc<KeyframeList>,
}

impl ActiveKeyframeAnimation {
    pub(crate) fn new(name: String, index: usize, keyframes: Arc<KeyframeList>) -> Self {
        Self {
            name,
            index,
            keyframes,
        }
    }
}

impl ActiveAnimation {
    pub(crate) fn keyframe_index(&self) -> usize {
        match &self.kind {
            ActiveKind::Keyframes(kf) => kf.index,
            ActiveKind::Transition(_) => 0,
        }
    }

    /// Blend this animation's declared properties into the output style.
    ///
    /// Starts the machine on first sight when the declaration is playing,
    /// forwards the target style while winding down, and holds the first
    /// frame during a zero-delay start so the animation shows no flash.
    pub(crate) fn blend_keyframes(
        &mut self,
        target_style: &Arc<StyleSnapshot>,
        output: &mut Option<StyleSnapshot>,
        engine: &mut EngineCtx,
        node: &str,
        fx: &mut MachineFx,
    ) {
        if self.is_new() && self.timing.play_state == PlayState::Running {
            self.dispatch(AnimationInput::StartAnimation, engine, node, fx);
        }

        // A finished animation being cleaned up reports the target style so
        // the final pass lands on unanimated values.
        if self.postactive() {
            if output.is_none() {
                *output = Some((**target_style).clone());
            }
            return;
        }

        // Before the start timer fires the style must not change. With no
        // delay the first frame applies immediately instead, so the start
        // shows no flash.
        if self.waiting_to_start() && self.timing.delay > 0.0 {
            return;
        }

        let keyframes = match &self.kind {
            ActiveKind::Keyframes(kf) => kf.keyframes.clone(),
            ActiveKind::Transition(_) => return,
        };

        let elapsed = self.local_elapsed(engine.now);
        let mut t = if self.timing.duration > 0.0 {
            elapsed / self.timing.duration
        } else {
            1.0
        };
        let cycle = t.floor();
        t -= cycle;
        if self.timing.direction == AnimationDirection::Alternate && (cycle as i64) & 1 == 1 {
            t = 1.0 - t;
        }

        // Find the bounding keyframe pair: the last keyframe at or below t
        // and the first one above it. The sub-range [offset, key] remaps to
        // [0, 1] through scale/offset.
        let mut from = None;
        let mut to = None;
        let mut scale = 1.0;
        let mut offset = 0.0;
        for keyframe in keyframes.keyframes() {
            if t < keyframe.key {
                // The first key is expected to be 0; a miss here means the
                // list has no frame at or before t.
                if from.is_none() {
                    break;
                }
                scale = 1.0 / (keyframe.key - offset);
                to = Some(keyframe.clone());
                break;
            }
            offset = keyframe.key;
            from = Some(keyframe.clone());
        }

        let (Some(from), Some(to)) = (from, to) else {
            // No bounding pair: nothing this animation can interpolate.
            self.dispatch(AnimationInput::EndAnimation, engine, node, fx);
            return;
        };

        let dst = output.get_or_insert_with(|| (**target_style).clone());
        let progress = self.progress(engine.now, scale, offset);
        let mut needs_timer = false;
        for property in keyframes.properties() {
            if blend::blend_property(property, dst, &from.style, &to.style, progress) {
                needs_timer = true;
            }
        }
        if needs_timer {
            self.animating = true;
        }
    }

    /// Elapsed time within the animation, frozen while paused.
    fn local_elapsed(&self, now: f64) -> f64 {
        match self.start_time {
            Some(start) => {
                let reference = match self.pause_time {
                    Some(pause) => pause,
                    None => now,
                };
                (reference - start).max(0.0)
            }
            None => 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::machine::TimerTask;
    use crate::scheduler::{TimerId, TimerQueue};
    use cadence_style::{
        AnimatableProperty, AnimationSpec, IterationCount, Length, TimingFunction,
    };

    struct NullHost;

    impl crate::events::AnimationHost for NullHost {
        fn mark_style_dirty(&mut self, _node: &str) {}
        fn update_rendering(&mut self) {}
        fn dispatch_event(&mut self, _node: &str, _event: crate::events::LifecycleEvent) {}
    }

    struct Rig {
        scheduler: TimerQueue<TimerTask>,
        host: NullHost,
        render_update: Option<TimerId>,
    }

    impl Rig {
        fn new() -> Self {
            Self {
                scheduler: TimerQueue::new(),
                host: NullHost,
                render_update: None,
            }
        }

        fn engine(&mut self, now: f64) -> EngineCtx<'_> {
            EngineCtx {
                now,
                scheduler: &mut self.scheduler,
                host: &mut self.host,
                render_update: &mut self.render_update,
            }
        }
    }

    fn fade_list() -> Arc<KeyframeList> {
        let from = Arc::new(StyleSnapshot::default().with_opacity(0.0));
        let to = Arc::new(StyleSnapshot::default().with_opacity(1.0));
        Arc::new(
            KeyframeList::new()
                .keyframe(0.0, from)
                .keyframe(1.0, to)
                .declare(AnimatableProperty::Opacity),
        )
    }

    fn started(spec: &AnimationSpec) -> (ActiveAnimation, Rig) {
        let mut anim = ActiveAnimation::new_keyframes(spec, 0);
        let mut rig = Rig::new();
        let mut fx = MachineFx::default();
        {
            let mut engine = rig.engine(0.0);
            anim.dispatch(AnimationInput::StartAnimation, &mut engine, "n", &mut fx);
            anim.dispatch(
                AnimationInput::StartTimerFired(0.0),
                &mut engine,
                "n",
                &mut fx,
            );
            anim.dispatch(AnimationInput::StyleAvailable, &mut engine, "n", &mut fx);
        }
        (anim, rig)
    }

    #[test]
    fn test_blend_midway_through_segment() {
        let spec = AnimationSpec::new("fade", fade_list())
            .duration(1.0)
            .timing(TimingFunction::Linear);
        let (mut anim, mut rig) = started(&spec);

        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(0.5);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);

        let blended = output.expect("output allocated");
        assert!((blended.opacity - 0.5).abs() < 1e-6);
        assert!(anim.animating);
    }

    #[test]
    fn test_multi_segment_remap() {
        // 0% -> 50% moves opacity 0 to 1; 50% -> 100% holds width change.
        let a = Arc::new(StyleSnapshot::default().with_opacity(0.0));
        let b = Arc::new(
            StyleSnapshot::default()
                .with_opacity(1.0)
                .with_width(Length::px(0.0)),
        );
        let c = Arc::new(
            StyleSnapshot::default()
                .with_opacity(1.0)
                .with_width(Length::px(100.0)),
        );
        let list = Arc::new(
            KeyframeList::new()
                .keyframe(0.0, a)
                .keyframe(0.5, b)
                .keyframe(1.0, c)
                .declare(AnimatableProperty::Opacity)
                .declare(AnimatableProperty::Width),
        );
        let spec = AnimationSpec::new("multi", list)
            .duration(1.0)
            .timing(TimingFunction::Linear);
        let (mut anim, mut rig) = started(&spec);

        // t = 0.25 sits in the first segment at segment-local 0.5.
        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(0.25);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);
        let blended = output.unwrap();
        assert!((blended.opacity - 0.5).abs() < 1e-6);

        // t = 0.75 sits in the second segment at segment-local 0.5.
        let mut output = None;
        let mut engine = rig.engine(0.75);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);
        let blended = output.unwrap();
        assert_eq!(blended.width, Length::px(50.0));
    }

    #[test]
    fn test_delay_holds_style_untouched() {
        let spec = AnimationSpec::new("fade", fade_list())
            .duration(1.0)
            .delay(0.5);
        let mut anim = ActiveAnimation::new_keyframes(&spec, 0);
        let mut rig = Rig::new();

        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(0.0);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);

        // Machine started (waiting on the delay timer) but no output yet.
        assert!(anim.waiting_to_start());
        assert!(output.is_none());
    }

    #[test]
    fn test_zero_delay_applies_first_frame_immediately() {
        let spec = AnimationSpec::new("fade", fade_list())
            .duration(1.0)
            .timing(TimingFunction::Linear);
        let mut anim = ActiveAnimation::new_keyframes(&spec, 0);
        let mut rig = Rig::new();

        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(0.0);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);

        // Still waiting on the zero-delay start timer, but the first frame
        // is already visible.
        let blended = output.expect("first frame applied");
        assert!((blended.opacity - 0.0).abs() < 1e-6);
    }

    #[test]
    fn test_missing_bounding_pair_self_terminates() {
        // Single keyframe at 0: no pair brackets any t.
        let only = Arc::new(StyleSnapshot::default().with_opacity(0.0));
        let list = Arc::new(
            KeyframeList::new()
                .keyframe(0.0, only)
                .declare(AnimatableProperty::Opacity),
        );
        let spec = AnimationSpec::new("broken", list).duration(1.0);
        let (mut anim, mut rig) = started(&spec);

        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(0.5);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);

        assert!(anim.postactive());
        assert!(output.is_none());
    }

    #[test]
    fn test_paused_keyframes_freeze_elapsed() {
        let spec = AnimationSpec::new("fade", fade_list())
            .duration(1.0)
            .iterations(IterationCount::Infinite)
            .timing(TimingFunction::Linear);
        let (mut anim, mut rig) = started(&spec);

        {
            let mut engine = rig.engine(0.25);
            let mut fx = MachineFx::default();
            anim.dispatch(AnimationInput::PlayStatePaused, &mut engine, "n", &mut fx);
        }

        // Time moves on, the blend does not.
        let target = Arc::new(StyleSnapshot::default());
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(10.0);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);
        let blended = output.unwrap();
        assert!((blended.opacity - 0.25).abs() < 1e-6);
    }

    #[test]
    fn test_finished_animation_reports_target_style() {
        let spec = AnimationSpec::new("fade", fade_list()).duration(1.0);
        let (mut anim, mut rig) = started(&spec);
        {
            let mut engine = rig.engine(1.0);
            let mut fx = MachineFx::default();
            anim.dispatch(AnimationInput::EndAnimation, &mut engine, "n", &mut fx);
        }

        let target = Arc::new(StyleSnapshot::default().with_opacity(0.7));
        let mut output = None;
        let mut fx = MachineFx::default();
        let mut engine = rig.engine(1.5);
        anim.blend_keyframes(&target, &mut output, &mut engine, "n", &mut fx);
        assert_eq!(output.unwrap().opacity, 0.7);
    }
}
