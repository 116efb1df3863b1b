// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Thumb thickness animation for one scrollbar axis.
//!
//! An idle overlay thumb is drawn at [`IDLE_THICKNESS_SCALE`] of its full
//! thickness. Moving the mouse within
//! [`MOUSE_MOVE_DISTANCE_TO_TRIGGER_ANIMATION`] of the bar thickens it and
//! moving away thins it again. Pressing on the thumb captures it at full
//! thickness until release.

use framesink_core::time::{TimeDelta, TimeTicks};

use crate::client::{ElementId, ScrollbarAnimationControllerClient, ScrollbarOrientation};

/// Thumb thickness scale of a bar the mouse is not near.
pub const IDLE_THICKNESS_SCALE: f32 = 0.4;

/// Mouse distance below which the bar counts as "near".
pub const MOUSE_MOVE_DISTANCE_TO_TRIGGER_ANIMATION: f32 = 25.0;

/// Direction of a running thickness animation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default)]
pub enum ThicknessChange {
    /// No animation; the thickness follows mouse proximity.
    #[default]
    None,
    /// Thickening toward full size.
    Increase,
    /// Thinning toward the idle scale.
    Decrease,
}

/// Thinning state machine for one axis of one scrolling element.
#[derive(Clone, Debug)]
pub struct ThinningController {
    element: ElementId,
    orientation: ScrollbarOrientation,
    duration: TimeDelta,
    last_awaken_time: Option<TimeTicks>,
    is_animating: bool,
    captured: bool,
    mouse_is_over_scrollbar: bool,
    mouse_is_near_scrollbar: bool,
    thickness_change: ThicknessChange,
}

impl ThinningController {
    /// Creates an idle controller for `orientation` bars of `element`.
    #[must_use]
    pub const fn new(
        element: ElementId,
        orientation: ScrollbarOrientation,
        duration: TimeDelta,
    ) -> Self {
        Self {
            element,
            orientation,
            duration,
            last_awaken_time: None,
            is_animating: false,
            captured: false,
            mouse_is_over_scrollbar: false,
            mouse_is_near_scrollbar: false,
            thickness_change: ThicknessChange::None,
        }
    }

    // -- Queries --

    /// The axis this controller animates.
    #[inline]
    #[must_use]
    pub const fn orientation(&self) -> ScrollbarOrientation {
        self.orientation
    }

    /// Whether the thumb is held by a mouse press.
    #[inline]
    #[must_use]
    pub const fn captured(&self) -> bool {
        self.captured
    }

    /// Whether the mouse is directly over the bar.
    #[inline]
    #[must_use]
    pub const fn mouse_is_over_scrollbar(&self) -> bool {
        self.mouse_is_over_scrollbar
    }

    /// Whether the mouse is within the trigger distance of the bar.
    #[inline]
    #[must_use]
    pub const fn mouse_is_near_scrollbar(&self) -> bool {
        self.mouse_is_near_scrollbar
    }

    /// Whether a thickness animation is running.
    #[inline]
    #[must_use]
    pub const fn is_animating(&self) -> bool {
        self.is_animating
    }

    /// Direction of the current or most recent thickness change.
    #[inline]
    #[must_use]
    pub const fn thickness_change(&self) -> ThicknessChange {
        self.thickness_change
    }

    // -- Animation --

    /// Advances a running animation. Returns `true` if it was running.
    pub fn animate<C>(&mut self, now: TimeTicks, client: &mut C) -> bool
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        if !self.is_animating {
            return false;
        }
        let start = *self.last_awaken_time.get_or_insert(now);
        let progress = (now - start).fraction_of(self.duration).clamp(0.0, 1.0);
        self.apply_thumb_thickness_scale(self.thumb_thickness_scale_at(progress), client);
        client.set_needs_redraw_for_scrollbar_animation();
        if progress == 1.0 {
            self.stop_animation();
        }
        true
    }

    /// Snaps the thumb to the thickness matching mouse proximity.
    pub fn update_thumb_thickness_scale<C>(&mut self, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        self.stop_animation();
        let scale = if self.mouse_is_near_scrollbar {
            1.0
        } else {
            IDLE_THICKNESS_SCALE
        };
        self.apply_thumb_thickness_scale(scale, client);
    }

    // -- Mouse --

    /// A press lands. Captures the thumb if the mouse is over it.
    pub fn did_mouse_down<C>(&mut self, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        if !self.mouse_is_over_scrollbar {
            return;
        }
        self.captured = true;
        self.apply_thumb_thickness_scale(1.0, client);
    }

    /// A press is released. Thins the bar unless the mouse stayed near it.
    pub fn did_mouse_up<C>(&mut self, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        if !self.captured {
            return;
        }
        self.captured = false;
        self.stop_animation();
        if self.mouse_is_near_scrollbar {
            self.thickness_change = ThicknessChange::None;
        } else {
            self.thickness_change = ThicknessChange::Decrease;
            self.start_animation(client);
        }
    }

    /// The mouse left the scrolling element.
    pub fn did_mouse_leave<C>(&mut self, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        if !self.mouse_is_over_scrollbar && !self.mouse_is_near_scrollbar {
            return;
        }
        self.mouse_is_over_scrollbar = false;
        self.mouse_is_near_scrollbar = false;
        if self.captured {
            return;
        }
        self.thickness_change = ThicknessChange::Decrease;
        self.start_animation(client);
    }

    /// The mouse moved, now `distance` away from the bar. Zero means over it.
    pub fn did_mouse_move_near<C>(&mut self, distance: f32, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        let over = distance == 0.0;
        let near = distance < MOUSE_MOVE_DISTANCE_TO_TRIGGER_ANIMATION;
        if !self.captured && near != self.mouse_is_near_scrollbar {
            self.thickness_change = if near {
                ThicknessChange::Increase
            } else {
                ThicknessChange::Decrease
            };
            self.start_animation(client);
        }
        self.mouse_is_near_scrollbar = near;
        self.mouse_is_over_scrollbar = over;
    }

    // -- Internals --

    fn start_animation<C>(&mut self, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        self.is_animating = true;
        self.last_awaken_time = None;
        client.set_needs_animate_for_scrollbar_animation();
    }

    fn stop_animation(&mut self) {
        self.is_animating = false;
    }

    fn thumb_thickness_scale_at(&self, progress: f32) -> f32 {
        let factor = match self.thickness_change {
            ThicknessChange::None => {
                return if self.mouse_is_near_scrollbar {
                    1.0
                } else {
                    IDLE_THICKNESS_SCALE
                };
            }
            ThicknessChange::Increase => progress,
            ThicknessChange::Decrease => 1.0 - progress,
        };
        (1.0 - IDLE_THICKNESS_SCALE) * factor + IDLE_THICKNESS_SCALE
    }

    fn apply_thumb_thickness_scale<C>(&self, scale: f32, client: &mut C)
    where
        C: ScrollbarAnimationControllerClient + ?Sized,
    {
        let change = self.thickness_change;
        for bar in client.scrollbars_for(self.element) {
            if bar.orientation != self.orientation || !bar.is_overlay {
                continue;
            }
            bar.thumb_thickness_scale = adjust_scale(scale, bar.thumb_thickness_scale, change);
        }
    }
}

/// Never moves against the direction of `change`, and clamps to the
/// idle..full range.
fn adjust_scale(new_value: f32, current: f32, change: ThicknessChange) -> f32 {
    let value = match change {
        ThicknessChange::Increase if current > new_value => current,
        ThicknessChange::Decrease if current < new_value => current,
        _ => new_value,
    };
    value.clamp(IDLE_THICKNESS_SCALE, 1.0)
}
