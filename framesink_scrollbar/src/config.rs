// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Scrollbar animation timings.

use framesink_core::time::TimeDelta;

/// Configuration for a
/// [`ScrollbarAnimationController`](crate::controller::ScrollbarAnimationController).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScrollbarAnimationConfig {
    /// Time between the last trigger and the start of a fade.
    pub fade_delay: TimeDelta,
    /// Length of a fade in or out.
    pub fade_duration: TimeDelta,
    /// Length of a thumb thickness change.
    ///
    /// `Some` enables per-axis thinning, mouse-proximity handling, and
    /// showing the scrollbars on scroll gestures.
    pub thinning_duration: Option<TimeDelta>,
}

impl ScrollbarAnimationConfig {
    /// Fade-only overlay scrollbars, as on touch platforms.
    #[must_use]
    pub const fn android() -> Self {
        Self {
            fade_delay: TimeDelta::from_millis(300),
            fade_duration: TimeDelta::from_millis(300),
            thinning_duration: None,
        }
    }

    /// Overlay scrollbars that fade and thicken under the mouse.
    #[must_use]
    pub const fn aura_overlay() -> Self {
        Self {
            fade_delay: TimeDelta::from_millis(500),
            fade_duration: TimeDelta::from_millis(200),
            thinning_duration: Some(TimeDelta::from_millis(200)),
        }
    }

    /// Returns `true` when per-axis thinning is enabled.
    #[inline]
    #[must_use]
    pub const fn needs_thinning(&self) -> bool {
        self.thinning_duration.is_some()
    }
}
