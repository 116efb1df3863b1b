// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Host interface for scrollbar animation.

use core::fmt;

use framesink_core::time::TimeDelta;

/// Identifies the scrolling element whose scrollbars are animated.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct ElementId(pub u64);

impl fmt::Debug for ElementId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ElementId({})", self.0)
    }
}

/// Scrollbar axis.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScrollbarOrientation {
    /// Scrolls along x.
    Horizontal,
    /// Scrolls along y.
    Vertical,
}

/// The animated state of one scrollbar layer, owned by the host.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ScrollbarLayer {
    /// Axis the scrollbar scrolls.
    pub orientation: ScrollbarOrientation,
    /// Overlay scrollbars float over content and are the only ones animated.
    pub is_overlay: bool,
    /// Whether the element can currently scroll along this axis. Bars that
    /// cannot are kept fully transparent.
    pub can_scroll_orientation: bool,
    /// Current opacity in `[0, 1]`.
    pub opacity: f32,
    /// Current thumb thickness as a fraction of full thickness.
    pub thumb_thickness_scale: f32,
}

impl ScrollbarLayer {
    /// A scrollable overlay scrollbar, hidden and at full thickness.
    #[must_use]
    pub const fn overlay(orientation: ScrollbarOrientation) -> Self {
        Self {
            orientation,
            is_overlay: true,
            can_scroll_orientation: true,
            opacity: 0.0,
            thumb_thickness_scale: 1.0,
        }
    }
}

/// Handle for a delayed fade start.
///
/// The controller posts one through
/// [`ScrollbarAnimationControllerClient::post_delayed_scrollbar_animation_task`].
/// The host hands it back via `run_delayed_task` once the delay elapses.
/// Posting a newer task or cancelling makes an outstanding one stale, and
/// stale tasks are ignored when run.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct DelayedAnimationTask {
    generation: u64,
}

impl DelayedAnimationTask {
    #[inline]
    pub(crate) const fn new(generation: u64) -> Self {
        Self { generation }
    }

    /// Returns the task's generation. Later tasks have larger generations.
    #[inline]
    #[must_use]
    pub const fn generation(self) -> u64 {
        self.generation
    }
}

/// Callbacks from the animation controller into its host.
pub trait ScrollbarAnimationControllerClient {
    /// Returns the scrollbar layers attached to `element`.
    fn scrollbars_for(&mut self, element: ElementId) -> &mut [ScrollbarLayer];

    /// Schedules `task` to be run after `delay`.
    fn post_delayed_scrollbar_animation_task(
        &mut self,
        task: DelayedAnimationTask,
        delay: TimeDelta,
    );

    /// A scrollbar property changed and the frame must be redrawn.
    fn set_needs_redraw_for_scrollbar_animation(&mut self);

    /// An animation is running; call `animate` on the next frame.
    fn set_needs_animate_for_scrollbar_animation(&mut self);

    /// The scrollbars went from hidden to visible or back.
    fn did_change_scrollbar_visibility(&mut self);
}
