// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dependency bookkeeping and the activation deadline.
//!
//! [`SurfaceDependencyTracker`] records which pending surfaces wait on which
//! dependencies and arms a single deadline, counted in BeginFrames of one
//! source, when the first surface starts waiting. When the deadline fires,
//! every waiting surface is forced active and the dependencies still missing
//! are remembered as *late*: a late surface that later shows up with its own
//! pending frame is activated at once, since its embedder already gave up
//! waiting for it.
//!
//! The tracker holds no surfaces. It answers the
//! [`SurfaceManager`](crate::manager::SurfaceManager) with the surfaces to
//! notify or force-activate, and the manager performs the mutations.

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use crate::begin_frame::{BeginFrameArgs, BeginFrameSourceId};
use crate::id::SurfaceId;

/// Default deadline, in BeginFrames.
pub const DEFAULT_FRAMES_TO_DEADLINE: u32 = 4;

/// Configuration for [`SurfaceDependencyTracker`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DependencyTrackerConfig {
    /// The source whose BeginFrames count toward the deadline.
    pub begin_frame_source: BeginFrameSourceId,
    /// BeginFrames from arming to firing the deadline.
    pub frames_to_deadline: u32,
}

impl DependencyTrackerConfig {
    /// A tracker counting [`DEFAULT_FRAMES_TO_DEADLINE`] frames of `source`.
    #[must_use]
    pub const fn new(begin_frame_source: BeginFrameSourceId) -> Self {
        Self {
            begin_frame_source,
            frames_to_deadline: DEFAULT_FRAMES_TO_DEADLINE,
        }
    }

    /// Overrides the deadline length. Zero is treated as one.
    #[must_use]
    pub const fn with_frames_to_deadline(mut self, frames: u32) -> Self {
        self.frames_to_deadline = if frames == 0 { 1 } else { frames };
        self
    }
}

/// What the manager should do with a surface asking for resolution.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Resolution {
    /// The surface is late; activate it now.
    ActivateNow,
    /// The surface's blockers are recorded.
    Waiting,
}

/// Map of dependencies to the pending surfaces blocked on them, plus the
/// deadline state.
#[derive(Clone, Debug)]
pub struct SurfaceDependencyTracker {
    config: DependencyTrackerConfig,
    frames_since_deadline_set: Option<u32>,
    blocked_surfaces_from_dependency: BTreeMap<SurfaceId, BTreeSet<SurfaceId>>,
    observed_surfaces: BTreeSet<SurfaceId>,
    late_surfaces: BTreeSet<SurfaceId>,
    last_begin_frame_args: Option<BeginFrameArgs>,
}

impl SurfaceDependencyTracker {
    /// Creates a tracker with no deadline armed.
    #[must_use]
    pub fn new(config: DependencyTrackerConfig) -> Self {
        Self {
            config,
            frames_since_deadline_set: None,
            blocked_surfaces_from_dependency: BTreeMap::new(),
            observed_surfaces: BTreeSet::new(),
            late_surfaces: BTreeSet::new(),
            last_begin_frame_args: None,
        }
    }

    /// The tracker's configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &DependencyTrackerConfig {
        &self.config
    }

    /// Whether a deadline is armed.
    #[inline]
    #[must_use]
    pub const fn has_deadline(&self) -> bool {
        self.frames_since_deadline_set.is_some()
    }

    /// BeginFrames counted since the deadline was armed.
    #[inline]
    #[must_use]
    pub const fn frames_since_deadline_set(&self) -> Option<u32> {
        self.frames_since_deadline_set
    }

    /// Pending surfaces blocked on `dependency`, in id order.
    #[must_use]
    pub fn blocked_surfaces(&self, dependency: &SurfaceId) -> Vec<SurfaceId> {
        self.blocked_surfaces_from_dependency
            .get(dependency)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Returns `true` if `id` was still awaited when the last deadline fired.
    #[must_use]
    pub fn is_late(&self, id: &SurfaceId) -> bool {
        self.late_surfaces.contains(id)
    }

    /// Returns `true` if `id` has a pending frame the tracker waits on.
    #[must_use]
    pub fn is_observing(&self, id: &SurfaceId) -> bool {
        self.observed_surfaces.contains(id)
    }

    /// The last BeginFrame counted.
    #[must_use]
    pub fn last_begin_frame_args(&self) -> Option<&BeginFrameArgs> {
        self.last_begin_frame_args.as_ref()
    }

    /// Registers a surface whose pending frame waits on `blocking`.
    ///
    /// Late surfaces that may activate early get [`Resolution::ActivateNow`].
    /// Otherwise the blockers are recorded and, when the frame allows early
    /// activation, a deadline is armed unless one already is.
    pub fn request_surface_resolution(
        &mut self,
        surface_id: SurfaceId,
        blocking: &[SurfaceId],
        can_activate_before_dependencies: bool,
    ) -> Resolution {
        if can_activate_before_dependencies && self.late_surfaces.remove(&surface_id) {
            return Resolution::ActivateNow;
        }

        for dependency in blocking {
            self.blocked_surfaces_from_dependency
                .entry(*dependency)
                .or_default()
                .insert(surface_id);
        }
        self.observed_surfaces.insert(surface_id);

        if can_activate_before_dependencies && self.frames_since_deadline_set.is_none() {
            self.frames_since_deadline_set = Some(0);
        }
        Resolution::Waiting
    }

    /// Applies a blocking-set delta of an observed surface.
    pub fn on_surface_dependencies_changed(
        &mut self,
        surface_id: SurfaceId,
        added: &[SurfaceId],
        removed: &[SurfaceId],
    ) {
        for dependency in added {
            self.blocked_surfaces_from_dependency
                .entry(*dependency)
                .or_default()
                .insert(surface_id);
        }
        for dependency in removed {
            self.unblock(dependency, &surface_id);
        }
        self.cancel_deadline_if_idle();
    }

    /// `surface_id` activated a frame. Returns the surfaces that were waiting
    /// on it.
    pub fn on_surface_activated(&mut self, surface_id: SurfaceId) -> Vec<SurfaceId> {
        self.observed_surfaces.remove(&surface_id);
        self.late_surfaces.remove(&surface_id);
        // A forced activation leaves the surface listed under its missing
        // dependencies.
        self.blocked_surfaces_from_dependency.retain(|_, blocked| {
            blocked.remove(&surface_id);
            !blocked.is_empty()
        });
        self.take_dependents(&surface_id)
    }

    /// `surface_id` is being destroyed. A surface that had a pending frame
    /// counts as available, so the surfaces waiting on it are returned.
    pub fn on_surface_discarded(
        &mut self,
        surface_id: SurfaceId,
        pending_embedded_surfaces: Option<&[SurfaceId]>,
    ) -> Vec<SurfaceId> {
        let Some(embedded) = pending_embedded_surfaces else {
            return Vec::new();
        };
        for dependency in embedded {
            self.unblock(dependency, &surface_id);
        }
        self.cancel_deadline_if_idle();
        self.observed_surfaces.remove(&surface_id);
        self.take_dependents(&surface_id)
    }

    /// Counts a BeginFrame. On the deadline frame, disarms, records the
    /// awaited dependencies as late, and returns every observed surface for
    /// forced activation.
    pub fn on_begin_frame(&mut self, args: &BeginFrameArgs) -> Option<Vec<SurfaceId>> {
        if args.source_id != self.config.begin_frame_source {
            return None;
        }
        self.last_begin_frame_args = Some(*args);

        let frames = self.frames_since_deadline_set.as_mut()?;
        *frames += 1;
        if *frames < self.config.frames_to_deadline {
            return None;
        }

        self.frames_since_deadline_set = None;
        self.late_surfaces = self.blocked_surfaces_from_dependency.keys().copied().collect();
        Some(self.observed_surfaces.iter().copied().collect())
    }

    /// Re-arms the deadline after a forced activation pass if surfaces are
    /// still blocked (for example because they opted out of early activation).
    pub fn rearm_if_blocked(&mut self) {
        if !self.blocked_surfaces_from_dependency.is_empty()
            && self.frames_since_deadline_set.is_none()
        {
            self.frames_since_deadline_set = Some(0);
        }
    }

    /// Number of distinct dependencies still awaited.
    #[must_use]
    pub fn pending_dependency_count(&self) -> usize {
        self.blocked_surfaces_from_dependency.len()
    }

    fn take_dependents(&mut self, available: &SurfaceId) -> Vec<SurfaceId> {
        let dependents = self
            .blocked_surfaces_from_dependency
            .remove(available)
            .map(|set| set.into_iter().collect())
            .unwrap_or_default();
        self.cancel_deadline_if_idle();
        dependents
    }

    fn unblock(&mut self, dependency: &SurfaceId, surface_id: &SurfaceId) {
        if let Some(set) = self.blocked_surfaces_from_dependency.get_mut(dependency) {
            set.remove(surface_id);
            if set.is_empty() {
                self.blocked_surfaces_from_dependency.remove(dependency);
            }
        }
    }

    fn cancel_deadline_if_idle(&mut self) {
        if self.blocked_surfaces_from_dependency.is_empty() {
            self.frames_since_deadline_set = None;
        }
    }
}
