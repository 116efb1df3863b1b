// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay scrollbar fade state machine.
//!
//! The controller is idle, fading in, or fading out. Scroll updates show the
//! bars at full opacity and arm a delayed fade-out; the host runs the
//! delayed task after [`ScrollbarAnimationConfig::fade_delay`] and then calls
//! [`animate`](ScrollbarAnimationController::animate) every frame until the
//! fade completes.
//!
//! With thinning enabled, mouse proximity also matters:
//!
//! - approaching hidden bars fades them in;
//! - being near visible bars keeps them shown;
//! - a captured thumb suppresses fading entirely.

use framesink_core::time::TimeTicks;

use crate::client::{
    DelayedAnimationTask, ElementId, ScrollbarAnimationControllerClient, ScrollbarOrientation,
};
use crate::config::ScrollbarAnimationConfig;
use crate::thinning::ThinningController;

/// Mouse distance below which hidden scrollbars start fading in.
pub const MOUSE_MOVE_DISTANCE_TO_TRIGGER_FADE_IN: f32 = 30.0;

/// Which fade is armed or running.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum AnimationChange {
    /// Idle.
    #[default]
    None,
    /// Opacity rising toward 1.
    FadeIn,
    /// Opacity falling toward 0.
    FadeOut,
}

#[derive(Clone, Debug)]
struct AxisControllers {
    vertical: ThinningController,
    horizontal: ThinningController,
}

impl AxisControllers {
    fn get(&self, orientation: ScrollbarOrientation) -> &ThinningController {
        match orientation {
            ScrollbarOrientation::Vertical => &self.vertical,
            ScrollbarOrientation::Horizontal => &self.horizontal,
        }
    }

    fn get_mut(&mut self, orientation: ScrollbarOrientation) -> &mut ThinningController {
        match orientation {
            ScrollbarOrientation::Vertical => &mut self.vertical,
            ScrollbarOrientation::Horizontal => &mut self.horizontal,
        }
    }

    fn captured(&self) -> bool {
        self.vertical.captured() || self.horizontal.captured()
    }

    fn mouse_is_near_any(&self) -> bool {
        self.vertical.mouse_is_near_scrollbar() || self.horizontal.mouse_is_near_scrollbar()
    }

    fn mouse_is_over_any(&self) -> bool {
        self.vertical.mouse_is_over_scrollbar() || self.horizontal.mouse_is_over_scrollbar()
    }
}

/// Drives overlay scrollbar opacity, and optionally thickness, for one
/// scrolling element.
///
/// The controller owns its host client. Use
/// [`client`](Self::client)/[`client_mut`](Self::client_mut) to reach it.
#[derive(Debug)]
pub struct ScrollbarAnimationController<C> {
    client: C,
    element: ElementId,
    config: ScrollbarAnimationConfig,
    thinning: Option<AxisControllers>,

    opacity: f32,
    is_animating: bool,
    animation_change: AnimationChange,
    last_awaken_time: Option<TimeTicks>,

    delayed_task: Option<DelayedAnimationTask>,
    next_task_generation: u64,

    currently_scrolling: bool,
    show_in_fast_scroll: bool,
    need_trigger_scrollbar_show: bool,
}

impl<C: ScrollbarAnimationControllerClient> ScrollbarAnimationController<C> {
    /// Creates a controller and hides the element's overlay scrollbars.
    pub fn new(element: ElementId, config: ScrollbarAnimationConfig, client: C) -> Self {
        let thinning = config.thinning_duration.map(|duration| AxisControllers {
            vertical: ThinningController::new(element, ScrollbarOrientation::Vertical, duration),
            horizontal: ThinningController::new(
                element,
                ScrollbarOrientation::Horizontal,
                duration,
            ),
        });
        let mut controller = Self {
            client,
            element,
            config,
            thinning,
            opacity: 0.0,
            is_animating: false,
            animation_change: AnimationChange::None,
            last_awaken_time: None,
            delayed_task: None,
            next_task_generation: 0,
            currently_scrolling: false,
            show_in_fast_scroll: false,
            need_trigger_scrollbar_show: false,
        };
        controller.apply_opacity_to_scrollbars(0.0);
        controller
    }

    // -- Queries --

    /// The host client.
    #[inline]
    #[must_use]
    pub const fn client(&self) -> &C {
        &self.client
    }

    /// The host client, mutably.
    #[inline]
    pub const fn client_mut(&mut self) -> &mut C {
        &mut self.client
    }

    /// The animated element.
    #[inline]
    #[must_use]
    pub const fn element(&self) -> ElementId {
        self.element
    }

    /// The controller's timings.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &ScrollbarAnimationConfig {
        &self.config
    }

    /// Current opacity in `[0, 1]`.
    #[inline]
    #[must_use]
    pub const fn opacity(&self) -> f32 {
        self.opacity
    }

    /// Whether a fade is running.
    #[inline]
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.is_animating
    }

    /// The armed or running fade, if any.
    #[inline]
    #[must_use]
    pub const fn animation_change(&self) -> AnimationChange {
        self.animation_change
    }

    /// The outstanding delayed task, if one is posted and not cancelled.
    #[inline]
    #[must_use]
    pub const fn pending_delayed_task(&self) -> Option<DelayedAnimationTask> {
        self.delayed_task
    }

    /// Whether the bars are fully transparent.
    ///
    /// Compares exactly against zero: a fade-out that has not reached its end
    /// still counts as visible.
    #[inline]
    #[must_use]
    pub fn scrollbars_hidden(&self) -> bool {
        self.opacity == 0.0
    }

    /// Whether either thumb is held by a mouse press. Always `false` without
    /// thinning.
    #[must_use]
    pub fn captured(&self) -> bool {
        self.thinning.as_ref().is_some_and(AxisControllers::captured)
    }

    /// Whether the mouse is over the `orientation` bar. Always `false`
    /// without thinning.
    #[must_use]
    pub fn mouse_is_over_scrollbar(&self, orientation: ScrollbarOrientation) -> bool {
        self.thinning
            .as_ref()
            .is_some_and(|axes| axes.get(orientation).mouse_is_over_scrollbar())
    }

    /// Whether the mouse is near the `orientation` bar. Always `false`
    /// without thinning.
    #[must_use]
    pub fn mouse_is_near_scrollbar(&self, orientation: ScrollbarOrientation) -> bool {
        self.thinning
            .as_ref()
            .is_some_and(|axes| axes.get(orientation).mouse_is_near_scrollbar())
    }

    /// Whether the mouse is near either bar. Always `false` without thinning.
    #[must_use]
    pub fn mouse_is_near_any_scrollbar(&self) -> bool {
        self.thinning
            .as_ref()
            .is_some_and(AxisControllers::mouse_is_near_any)
    }

    /// The thinning controller for one axis, if thinning is enabled.
    #[must_use]
    pub fn thinning_controller(
        &self,
        orientation: ScrollbarOrientation,
    ) -> Option<&ThinningController> {
        self.thinning.as_ref().map(|axes| axes.get(orientation))
    }

    // -- Driving --

    /// Advances running fades and thickness animations to `now`.
    ///
    /// Returns `true` if anything animated. The fade start time is latched on
    /// the first call after the fade starts.
    pub fn animate(&mut self, now: TimeTicks) -> bool {
        let mut animated = false;

        if self.is_animating {
            debug_assert!(
                self.animation_change != AnimationChange::None,
                "a running fade must have a direction"
            );
            let start = *self.last_awaken_time.get_or_insert(now);
            let progress = (now - start)
                .fraction_of(self.config.fade_duration)
                .clamp(0.0, 1.0);
            self.run_animation_frame(progress);
            if self.is_animating {
                self.client.set_needs_animate_for_scrollbar_animation();
            }
            animated = true;
        }

        if let Some(axes) = &mut self.thinning {
            animated |= axes.vertical.animate(now, &mut self.client);
            animated |= axes.horizontal.animate(now, &mut self.client);
        }

        animated
    }

    /// Runs a delayed task the host was asked to post. Stale and cancelled
    /// tasks are ignored.
    ///
    /// Returns `true` if the task started a fade.
    pub fn run_delayed_task(&mut self, task: DelayedAnimationTask) -> bool {
        if self.delayed_task != Some(task) {
            return false;
        }
        self.delayed_task = None;
        self.start_animation();
        true
    }

    // -- Scrolling --

    /// A scroll gesture began.
    pub fn did_scroll_begin(&mut self) {
        self.currently_scrolling = true;
    }

    /// A scroll gesture ended. Arms the fade-out if the gesture scrolled.
    pub fn did_scroll_end(&mut self) {
        let has_scrolled = self.show_in_fast_scroll;
        self.show_in_fast_scroll = false;
        self.currently_scrolling = false;

        if self.mouse_is_near_any_scrollbar() {
            return;
        }
        if has_scrolled {
            self.post_delayed_animation(AnimationChange::FadeOut);
        }
    }

    /// The scroll offset changed.
    ///
    /// Shows the bars and arms a fade-out. Inside a scroll gesture the
    /// fade-out is deferred to [`did_scroll_end`](Self::did_scroll_end).
    pub fn did_scroll_update(&mut self) {
        if self.captured() {
            return;
        }

        self.stop_animation();
        self.show();

        if self.currently_scrolling {
            self.show_in_fast_scroll = true;
        } else if !self.mouse_is_near_any_scrollbar() {
            self.post_delayed_animation(AnimationChange::FadeOut);
        }

        if let Some(axes) = &mut self.thinning {
            axes.vertical.update_thumb_thickness_scale(&mut self.client);
            axes.horizontal.update_thumb_thickness_scale(&mut self.client);
        }
    }

    /// A scroll gesture is about to update the offset. Only shows the bars
    /// when thinning is enabled.
    pub fn will_update_scroll(&mut self) {
        if self.thinning.is_some() {
            self.did_scroll_update();
        }
    }

    /// The main thread asked for the bars to be shown.
    pub fn did_request_show_from_main_thread(&mut self) {
        self.did_scroll_update();
    }

    // -- Mouse --

    /// A press landed. Captures a thumb under the mouse.
    pub fn did_mouse_down(&mut self) {
        if self.scrollbars_hidden() {
            return;
        }
        if let Some(axes) = &mut self.thinning {
            axes.vertical.did_mouse_down(&mut self.client);
            axes.horizontal.did_mouse_down(&mut self.client);
        }
    }

    /// A press was released.
    pub fn did_mouse_up(&mut self) {
        if !self.captured() {
            return;
        }
        if let Some(axes) = &mut self.thinning {
            axes.vertical.did_mouse_up(&mut self.client);
            axes.horizontal.did_mouse_up(&mut self.client);
        }
        if !self.mouse_is_near_any_scrollbar() {
            self.post_delayed_animation(AnimationChange::FadeOut);
        }
    }

    /// The mouse left the scrolling element.
    pub fn did_mouse_leave(&mut self) {
        let Some(axes) = &mut self.thinning else {
            return;
        };
        axes.vertical.did_mouse_leave(&mut self.client);
        axes.horizontal.did_mouse_leave(&mut self.client);

        self.delayed_task = None;
        self.need_trigger_scrollbar_show = false;

        if self.scrollbars_hidden() || self.captured() {
            return;
        }
        self.post_delayed_animation(AnimationChange::FadeOut);
    }

    /// The mouse moved to `distance` from the `orientation` bar.
    pub fn did_mouse_move_near(&mut self, orientation: ScrollbarOrientation, distance: f32) {
        let Some(axes) = &mut self.thinning else {
            return;
        };
        axes.get_mut(orientation)
            .did_mouse_move_near(distance, &mut self.client);

        let was_triggered = self.need_trigger_scrollbar_show;
        self.need_trigger_scrollbar_show =
            self.calc_need_trigger_scrollbar_show(orientation, distance);

        if self.captured() {
            return;
        }

        if self.scrollbars_hidden() {
            if was_triggered != self.need_trigger_scrollbar_show {
                if self.need_trigger_scrollbar_show {
                    self.post_delayed_animation(AnimationChange::FadeIn);
                } else {
                    self.delayed_task = None;
                }
            }
        } else if self.mouse_is_near_any_scrollbar() {
            self.show();
            self.stop_animation();
        } else if !self.is_animating {
            self.post_delayed_animation(AnimationChange::FadeOut);
        }
    }

    // -- Internals --

    fn calc_need_trigger_scrollbar_show(
        &mut self,
        orientation: ScrollbarOrientation,
        distance: f32,
    ) -> bool {
        if self
            .thinning
            .as_ref()
            .is_some_and(AxisControllers::mouse_is_over_any)
        {
            return true;
        }
        distance < MOUSE_MOVE_DISTANCE_TO_TRIGGER_FADE_IN
            && self
                .client
                .scrollbars_for(self.element)
                .iter()
                .any(|bar| bar.orientation == orientation)
    }

    fn start_animation(&mut self) {
        debug_assert!(
            self.animation_change != AnimationChange::None,
            "starting a fade without a direction"
        );
        self.delayed_task = None;
        self.is_animating = true;
        self.last_awaken_time = None;
        self.client.set_needs_animate_for_scrollbar_animation();
    }

    fn stop_animation(&mut self) {
        self.delayed_task = None;
        self.is_animating = false;
        self.animation_change = AnimationChange::None;
    }

    fn post_delayed_animation(&mut self, change: AnimationChange) {
        self.animation_change = change;
        self.next_task_generation += 1;
        let task = DelayedAnimationTask::new(self.next_task_generation);
        self.delayed_task = Some(task);
        self.client
            .post_delayed_scrollbar_animation_task(task, self.config.fade_delay);
    }

    fn run_animation_frame(&mut self, progress: f32) {
        let opacity = match self.animation_change {
            AnimationChange::FadeIn => progress.max(self.opacity),
            _ => (1.0 - progress).min(self.opacity),
        };
        self.apply_opacity_to_scrollbars(opacity);
        if progress == 1.0 {
            self.stop_animation();
        }
    }

    fn show(&mut self) {
        self.delayed_task = None;
        self.apply_opacity_to_scrollbars(1.0);
    }

    fn apply_opacity_to_scrollbars(&mut self, opacity: f32) {
        for bar in self.client.scrollbars_for(self.element) {
            if !bar.is_overlay {
                continue;
            }
            bar.opacity = if bar.can_scroll_orientation {
                opacity
            } else {
                0.0
            };
        }

        let was_visible = self.opacity > 0.0;
        let is_visible = opacity > 0.0;
        if self.opacity != opacity {
            self.client.set_needs_redraw_for_scrollbar_animation();
        }
        self.opacity = opacity;
        if was_visible != is_visible {
            self.client.did_change_scrollbar_visibility();
        }
    }
}

#[cfg(test)]
mod tests {
    use alloc::vec;
    use alloc::vec::Vec;

    use framesink_core::time::TimeDelta;

    use super::*;
    use crate::client::ScrollbarLayer;
    use crate::thinning::IDLE_THICKNESS_SCALE;

    const ELEMENT: ElementId = ElementId(1);

    #[derive(Default)]
    struct Host {
        bars: Vec<ScrollbarLayer>,
        posted: Vec<(DelayedAnimationTask, TimeDelta)>,
        redraws: u32,
        animates: u32,
        visibility_changes: u32,
    }

    impl Host {
        fn last_task(&self) -> DelayedAnimationTask {
            self.posted.last().unwrap().0
        }
    }

    impl ScrollbarAnimationControllerClient for Host {
        fn scrollbars_for(&mut self, element: ElementId) -> &mut [ScrollbarLayer] {
            assert_eq!(element, ELEMENT, "queried for the wrong element");
            &mut self.bars
        }

        fn post_delayed_scrollbar_animation_task(
            &mut self,
            task: DelayedAnimationTask,
            delay: TimeDelta,
        ) {
            self.posted.push((task, delay));
        }

        fn set_needs_redraw_for_scrollbar_animation(&mut self) {
            self.redraws += 1;
        }

        fn set_needs_animate_for_scrollbar_animation(&mut self) {
            self.animates += 1;
        }

        fn did_change_scrollbar_visibility(&mut self) {
            self.visibility_changes += 1;
        }
    }

    fn host() -> Host {
        Host {
            bars: vec![
                ScrollbarLayer::overlay(ScrollbarOrientation::Vertical),
                ScrollbarLayer::overlay(ScrollbarOrientation::Horizontal),
            ],
            ..Host::default()
        }
    }

    fn android() -> ScrollbarAnimationController<Host> {
        ScrollbarAnimationController::new(ELEMENT, ScrollbarAnimationConfig::android(), host())
    }

    fn aura() -> ScrollbarAnimationController<Host> {
        ScrollbarAnimationController::new(
            ELEMENT,
            ScrollbarAnimationConfig::aura_overlay(),
            host(),
        )
    }

    fn ms(n: u64) -> TimeTicks {
        TimeTicks(TimeDelta::from_millis(n).nanos())
    }

    /// Scrolls, runs the fade-out task, and latches the fade start at `start`.
    fn start_fade_out(c: &mut ScrollbarAnimationController<Host>, start: TimeTicks) {
        c.did_scroll_update();
        let task = c.client().last_task();
        assert!(c.run_delayed_task(task), "fresh task starts the fade");
        assert!(c.animate(start), "fade is running");
    }

    #[test]
    fn starts_hidden() {
        let c = android();
        assert!(c.scrollbars_hidden(), "new controller hides the bars");
        assert_eq!(c.client().bars[0].opacity, 0.0);
        assert_eq!(c.client().redraws, 0, "no change, no redraw");
        assert!(!c.captured(), "no thinning means no capture");
        assert!(c.thinning_controller(ScrollbarOrientation::Vertical).is_none());
    }

    #[test]
    fn scroll_update_shows_and_arms_fade_out() {
        let mut c = android();
        c.did_scroll_update();
        assert_eq!(c.opacity(), 1.0);
        assert_eq!(c.client().bars[1].opacity, 1.0);
        assert_eq!(c.client().visibility_changes, 1);
        assert_eq!(c.client().redraws, 1);
        assert_eq!(c.animation_change(), AnimationChange::FadeOut);
        assert_eq!(c.client().posted.len(), 1);
        assert_eq!(c.client().posted[0].1, TimeDelta::from_millis(300));
        assert!(!c.is_animating(), "fade waits for the delayed task");
    }

    #[test]
    fn fade_out_runs_to_hidden() {
        let mut c = android();
        start_fade_out(&mut c, ms(1000));
        assert_eq!(c.opacity(), 1.0);

        c.animate(ms(1150));
        assert!((c.opacity() - 0.5).abs() < 1e-6, "halfway through the fade");
        assert!(!c.scrollbars_hidden(), "partially faded bars are visible");

        c.animate(ms(1300));
        assert_eq!(c.opacity(), 0.0);
        assert!(c.scrollbars_hidden(), "fade ends exactly at zero");
        assert!(!c.is_animating(), "fade stops at full progress");
        assert_eq!(c.animation_change(), AnimationChange::None);
        assert_eq!(c.client().visibility_changes, 2);
        assert!(!c.animate(ms(1400)), "nothing left to animate");
    }

    #[test]
    fn fade_out_is_monotonic_under_reordered_frames() {
        let mut c = android();
        let start = ms(0);
        start_fade_out(&mut c, start);
        let d = c.config().fade_duration.nanos();

        c.animate(TimeTicks(start.nanos() + d / 2));
        let reached = c.opacity();
        c.animate(TimeTicks(start.nanos() + d / 4));
        assert!(
            c.opacity() <= reached,
            "opacity rose from {reached} to {}",
            c.opacity()
        );
    }

    #[test]
    fn scrolling_again_cancels_the_fade() {
        let mut c = android();
        start_fade_out(&mut c, ms(0));
        c.animate(ms(150));
        let stale = c.client().last_task();

        c.did_scroll_update();
        assert!(!c.is_animating(), "scroll stops the fade");
        assert_eq!(c.opacity(), 1.0);
        assert!(!c.run_delayed_task(stale), "stale task is ignored");
        assert!(c.run_delayed_task(c.client().last_task()), "newest task runs");
    }

    #[test]
    fn fast_scroll_defers_the_fade_to_scroll_end() {
        let mut c = android();
        c.did_scroll_begin();
        c.did_scroll_update();
        c.did_scroll_update();
        c.did_scroll_update();
        assert!(c.client().posted.is_empty(), "no timer churn mid-gesture");
        assert_eq!(c.opacity(), 1.0);

        c.did_scroll_end();
        assert_eq!(c.client().posted.len(), 1);
        assert_eq!(c.animation_change(), AnimationChange::FadeOut);
    }

    #[test]
    fn scroll_end_without_update_arms_nothing() {
        let mut c = android();
        c.did_scroll_begin();
        c.did_scroll_end();
        assert!(c.client().posted.is_empty(), "nothing scrolled");
    }

    #[test]
    fn will_update_scroll_requires_thinning() {
        let mut c = android();
        c.will_update_scroll();
        assert!(c.scrollbars_hidden(), "fade-only bars ignore gestures");

        let mut c = aura();
        c.will_update_scroll();
        assert_eq!(c.opacity(), 1.0);
    }

    #[test]
    fn main_thread_show_request() {
        let mut c = android();
        c.did_request_show_from_main_thread();
        assert_eq!(c.opacity(), 1.0);
        assert_eq!(c.client().posted.len(), 1);
    }

    #[test]
    fn unscrollable_axis_stays_transparent() {
        let mut h = host();
        h.bars[1].can_scroll_orientation = false;
        let mut c =
            ScrollbarAnimationController::new(ELEMENT, ScrollbarAnimationConfig::android(), h);
        c.did_scroll_update();
        assert_eq!(c.client().bars[0].opacity, 1.0);
        assert_eq!(c.client().bars[1].opacity, 0.0);
    }

    #[test]
    fn non_overlay_bars_are_untouched() {
        let mut h = host();
        h.bars[0].is_overlay = false;
        h.bars[0].opacity = 1.0;
        let mut c =
            ScrollbarAnimationController::new(ELEMENT, ScrollbarAnimationConfig::android(), h);
        start_fade_out(&mut c, ms(0));
        c.animate(ms(300));
        assert_eq!(c.client().bars[0].opacity, 1.0);
    }

    #[test]
    fn mouse_handlers_are_ignored_without_thinning() {
        let mut c = android();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 0.0);
        c.did_mouse_down();
        c.did_mouse_leave();
        assert!(!c.mouse_is_near_any_scrollbar(), "no thinning state");
        assert!(c.client().posted.is_empty(), "nothing armed");
    }

    #[test]
    fn approaching_hidden_bars_fades_them_in() {
        let mut c = aura();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 29.0);
        assert_eq!(c.animation_change(), AnimationChange::FadeIn);
        assert_eq!(c.client().posted.len(), 1);

        // Still within range: no re-arm.
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 28.0);
        assert_eq!(c.client().posted.len(), 1);

        assert!(c.run_delayed_task(c.client().last_task()), "fade in starts");
        c.animate(ms(0));
        c.animate(ms(100));
        assert!((c.opacity() - 0.5).abs() < 1e-6, "halfway through fade in");
        c.animate(ms(200));
        assert_eq!(c.opacity(), 1.0);
        assert!(!c.is_animating(), "fade in completes");
    }

    #[test]
    fn moving_away_before_the_delay_cancels_fade_in() {
        let mut c = aura();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 10.0);
        let task = c.client().last_task();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 100.0);
        assert!(c.pending_delayed_task().is_none(), "fade in cancelled");
        assert!(!c.run_delayed_task(task), "cancelled task is ignored");
        assert!(c.scrollbars_hidden(), "bars stay hidden");
    }

    #[test]
    fn near_visible_bars_stay_shown() {
        let mut c = aura();
        start_fade_out(&mut c, ms(0));
        c.animate(ms(100));
        assert!(c.opacity() < 1.0, "fade is underway");

        c.did_mouse_move_near(ScrollbarOrientation::Horizontal, 5.0);
        assert!(c.mouse_is_near_scrollbar(ScrollbarOrientation::Horizontal));
        assert_eq!(c.opacity(), 1.0);
        assert!(!c.is_animating(), "proximity stops the fade");

        c.did_mouse_move_near(ScrollbarOrientation::Horizontal, 80.0);
        assert_eq!(c.animation_change(), AnimationChange::FadeOut);
        assert!(c.pending_delayed_task().is_some(), "leaving rearms fade out");
    }

    #[test]
    fn scroll_near_bars_does_not_arm_fade_out() {
        let mut c = aura();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 5.0);
        let posted = c.client().posted.len();
        c.did_scroll_update();
        assert_eq!(c.client().posted.len(), posted, "near bars stay shown");
        // Scroll updates snap the thumb to full thickness near the mouse.
        assert_eq!(c.client().bars[0].thumb_thickness_scale, 1.0);
        assert_eq!(c.client().bars[1].thumb_thickness_scale, IDLE_THICKNESS_SCALE);
    }

    #[test]
    fn captured_thumb_suppresses_fading() {
        let mut c = aura();
        c.did_scroll_update();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 0.0);
        c.did_mouse_down();
        assert!(c.captured(), "press over the thumb captures it");
        assert!(c.mouse_is_over_scrollbar(ScrollbarOrientation::Vertical));

        let posted = c.client().posted.len();
        c.did_scroll_update();
        c.did_mouse_leave();
        assert_eq!(c.client().posted.len(), posted, "captured bars do not fade");

        c.did_mouse_up();
        assert!(!c.captured(), "release ends capture");
        assert_eq!(c.animation_change(), AnimationChange::FadeOut);
        assert_eq!(c.client().posted.len(), posted + 1);
    }

    #[test]
    fn mouse_down_on_hidden_bars_is_ignored() {
        let mut c = aura();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 0.0);
        c.did_mouse_down();
        assert!(!c.captured(), "hidden bars cannot be grabbed");
    }

    #[test]
    fn mouse_leave_arms_fade_out_for_visible_bars() {
        let mut c = aura();
        c.did_mouse_move_near(ScrollbarOrientation::Vertical, 5.0);
        c.did_scroll_update();
        c.did_mouse_leave();
        assert!(!c.mouse_is_near_any_scrollbar(), "leave clears proximity");
        assert_eq!(c.animation_change(), AnimationChange::FadeOut);
        assert!(c.pending_delayed_task().is_some(), "fade out armed");
    }
}
