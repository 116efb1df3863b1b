// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! A surface: one producer-local id and its pending and active frames.
//!
//! A [`Surface`] holds at most one pending frame and at most one active
//! frame. Queuing a frame replaces the pending one; the frame activates as
//! soon as none of its embedded surfaces is missing, or when a deadline forces
//! it.
//!
//! Surfaces never call out. Every side effect (resources to return, a draw
//! callback to deliver, observers to notify, a dependency resolution to
//! request) is appended as a [`SurfaceEvent`] to a caller-provided buffer,
//! which the [`SurfaceManager`](crate::manager::SurfaceManager) processes
//! after the mutation completes.
//!
//! # States
//!
//! ```text
//!   Empty ──queue (blocked)──► PendingOnly ──activate──► ActiveOnly
//!     │                                                   │    ▲
//!     └──────────queue (unblocked)────────────────────────┘    │
//!                                                        activate
//!   ActiveOnly ──queue (blocked)──► PendingAndActive ─────────┘
//! ```

use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;
use core::mem;

use kurbo::Rect;

use crate::frame::{CompositorFrame, CopyOutputRequest, RenderPassId};
use crate::id::{FrameSinkId, SurfaceId, SurfaceSequence};
use crate::observer::ObserverId;
use crate::resource::ReturnedResource;
use crate::trace::ActivationCause;

/// Frame index of a surface that has not queued a frame yet.
pub const FRAME_INDEX_START: u64 = 0;

// ---------------------------------------------------------------------------
// Callbacks
// ---------------------------------------------------------------------------

/// How a frame's draw callback was resolved.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DrawResult {
    /// The frame became active.
    Activated,
    /// The frame was replaced or destroyed before it became active.
    Discarded,
}

/// Single-shot draw callback, addressed to the frame sink owning the surface.
///
/// Not `Clone`: a callback is consumed when it fires, so it fires at most
/// once, and a surface fires every callback it still holds before releasing a
/// frame, so it fires at least once.
#[derive(Debug, PartialEq, Eq)]
pub struct DrawCallback {
    surface_id: SurfaceId,
}

impl DrawCallback {
    /// Creates a callback for a frame queued on `surface_id`.
    #[inline]
    #[must_use]
    pub const fn new(surface_id: SurfaceId) -> Self {
        Self { surface_id }
    }

    /// The frame sink the callback is delivered to.
    #[inline]
    #[must_use]
    pub const fn frame_sink_id(&self) -> FrameSinkId {
        self.surface_id.frame_sink_id
    }

    fn fire(self, result: DrawResult, frame_index: u64) -> SurfaceEvent {
        SurfaceEvent::DrawCallback {
            surface_id: self.surface_id,
            frame_index,
            result,
        }
    }
}

/// Repeating will-draw callback, addressed to the owning frame sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct WillDrawCallback {
    surface_id: SurfaceId,
}

impl WillDrawCallback {
    /// Creates a will-draw callback for a frame queued on `surface_id`.
    #[inline]
    #[must_use]
    pub const fn new(surface_id: SurfaceId) -> Self {
        Self { surface_id }
    }
}

/// A frame together with its callbacks.
#[derive(Debug)]
pub struct FrameData {
    /// The frame.
    pub frame: CompositorFrame,
    draw_callback: Option<DrawCallback>,
    will_draw_callback: Option<WillDrawCallback>,
}

impl FrameData {
    fn new(
        frame: CompositorFrame,
        draw_callback: Option<DrawCallback>,
        will_draw_callback: Option<WillDrawCallback>,
    ) -> Self {
        Self {
            frame,
            draw_callback,
            will_draw_callback,
        }
    }

    /// Returns `true` if the draw callback has not fired yet.
    #[must_use]
    pub fn has_draw_callback(&self) -> bool {
        self.draw_callback.is_some()
    }
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// A side effect produced by a surface mutation.
#[derive(Debug, PartialEq)]
pub enum SurfaceEvent {
    /// A frame became active.
    Activated {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index after activation.
        frame_index: u64,
        /// What activated the frame.
        cause: ActivationCause,
        /// `true` if this is the surface's first active frame.
        first_activation: bool,
        /// `true` if the frame has render passes (and so damage).
        has_damage: bool,
        /// The new active frame's referenced surfaces.
        referenced_surfaces: Vec<SurfaceId>,
        /// Observers registered on the surface.
        observers: Vec<ObserverId>,
    },
    /// The surface blocks on dependencies and wants them resolved.
    ResolutionRequested {
        /// The surface.
        surface_id: SurfaceId,
        /// The blocking dependencies.
        blocking: Vec<SurfaceId>,
    },
    /// A replacement pending frame changed the blocking set.
    DependenciesChanged {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index when the change happened.
        frame_index: u64,
        /// Newly blocking surfaces.
        added: Vec<SurfaceId>,
        /// Surfaces that no longer block.
        removed: Vec<SurfaceId>,
        /// Observers registered on the surface.
        observers: Vec<ObserverId>,
    },
    /// The surface is being destroyed.
    Discarded {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index at destruction.
        frame_index: u64,
        /// Embedded surfaces of the pending frame, if one existed.
        pending_embedded_surfaces: Option<Vec<SurfaceId>>,
        /// Observers registered on the surface.
        observers: Vec<ObserverId>,
    },
    /// Resources of a released frame, to be unreffed by the owning frame sink.
    ReturnResources {
        /// The frame sink whose resources these are.
        frame_sink_id: FrameSinkId,
        /// One record per lend.
        resources: Vec<ReturnedResource>,
    },
    /// A draw callback fired.
    DrawCallback {
        /// The surface the frame was queued on.
        surface_id: SurfaceId,
        /// Frame index when the callback fired.
        frame_index: u64,
        /// How the frame was resolved.
        result: DrawResult,
    },
    /// The active frame is about to be drawn.
    WillDraw {
        /// The surface.
        surface_id: SurfaceId,
        /// Area about to be redrawn.
        damage_rect: Rect,
    },
}

/// Answers the questions a surface asks while computing its blockers.
pub trait SurfaceResolver {
    /// Whether `id` names a surface with an active frame.
    fn has_active_frame(&self, id: &SurfaceId) -> bool;

    /// Whether a dependency tracker is installed. Without one, frames never
    /// block.
    fn tracks_dependencies(&self) -> bool;
}

/// Which frames a surface currently holds.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SurfaceState {
    /// No frame yet.
    Empty,
    /// A frame waits for dependencies; nothing has activated yet.
    PendingOnly,
    /// An active frame and no pending frame.
    ActiveOnly,
    /// An active frame plus a newer pending one.
    PendingAndActive,
}

// ---------------------------------------------------------------------------
// Surface
// ---------------------------------------------------------------------------

/// One producer-local surface.
#[derive(Debug)]
pub struct Surface {
    surface_id: SurfaceId,
    previous_frame_surface_id: SurfaceId,
    pending_frame_data: Option<FrameData>,
    active_frame_data: Option<FrameData>,
    frame_index: u64,
    destroyed: bool,
    destruction_dependencies: Vec<SurfaceSequence>,
    blocking_surfaces: BTreeSet<SurfaceId>,
    observers: BTreeSet<ObserverId>,
}

impl Surface {
    /// Creates an empty surface.
    #[must_use]
    pub fn new(surface_id: SurfaceId) -> Self {
        Self {
            surface_id,
            previous_frame_surface_id: surface_id,
            pending_frame_data: None,
            active_frame_data: None,
            frame_index: FRAME_INDEX_START,
            destroyed: false,
            destruction_dependencies: Vec::new(),
            blocking_surfaces: BTreeSet::new(),
            observers: BTreeSet::new(),
        }
    }

    // -- Queries --

    /// The surface's identity.
    #[inline]
    #[must_use]
    pub const fn surface_id(&self) -> SurfaceId {
        self.surface_id
    }

    /// The surface whose content this one continues.
    #[inline]
    #[must_use]
    pub const fn previous_frame_surface_id(&self) -> SurfaceId {
        self.previous_frame_surface_id
    }

    /// Staleness counter; increases once per queued frame.
    #[inline]
    #[must_use]
    pub const fn frame_index(&self) -> u64 {
        self.frame_index
    }

    /// Whether the producer let go of the surface.
    #[inline]
    #[must_use]
    pub const fn destroyed(&self) -> bool {
        self.destroyed
    }

    pub(crate) fn set_destroyed(&mut self, destroyed: bool) {
        self.destroyed = destroyed;
    }

    /// Which frames the surface holds.
    #[must_use]
    pub fn state(&self) -> SurfaceState {
        match (self.pending_frame_data.is_some(), self.active_frame_data.is_some()) {
            (false, false) => SurfaceState::Empty,
            (true, false) => SurfaceState::PendingOnly,
            (false, true) => SurfaceState::ActiveOnly,
            (true, true) => SurfaceState::PendingAndActive,
        }
    }

    /// Returns `true` if a frame has activated.
    #[inline]
    #[must_use]
    pub fn has_active_frame(&self) -> bool {
        self.active_frame_data.is_some()
    }

    /// Returns `true` if a frame waits for dependencies.
    #[inline]
    #[must_use]
    pub fn has_pending_frame(&self) -> bool {
        self.pending_frame_data.is_some()
    }

    /// The active frame.
    ///
    /// # Panics
    ///
    /// Panics if there is no active frame.
    #[must_use]
    pub fn active_frame(&self) -> &CompositorFrame {
        match &self.active_frame_data {
            Some(data) => &data.frame,
            None => panic!("{:?} has no active frame", self.surface_id),
        }
    }

    /// The pending frame.
    ///
    /// # Panics
    ///
    /// Panics if there is no pending frame.
    #[must_use]
    pub fn pending_frame(&self) -> &CompositorFrame {
        match &self.pending_frame_data {
            Some(data) => &data.frame,
            None => panic!("{:?} has no pending frame", self.surface_id),
        }
    }

    /// Surfaces the pending frame still waits for.
    #[inline]
    #[must_use]
    pub fn blocking_surfaces(&self) -> &BTreeSet<SurfaceId> {
        &self.blocking_surfaces
    }

    /// Number of unsatisfied destruction dependencies.
    #[inline]
    #[must_use]
    pub fn destruction_dependency_count(&self) -> usize {
        self.destruction_dependencies.len()
    }

    /// Observers registered on this surface.
    pub fn observers(&self) -> impl Iterator<Item = ObserverId> + '_ {
        self.observers.iter().copied()
    }

    // -- Frame submission --

    /// Queues `frame`, replacing any pending frame.
    ///
    /// The frame blocks on every embedded surface the resolver reports as
    /// lacking an active frame. With no blockers it activates immediately;
    /// otherwise a [`SurfaceEvent::ResolutionRequested`] is emitted. The
    /// superseded pending frame, if any, is released last.
    ///
    /// Every call advances the frame index, whether or not the frame
    /// activates.
    pub fn queue_frame(
        &mut self,
        frame: CompositorFrame,
        draw_callback: Option<DrawCallback>,
        will_draw_callback: Option<WillDrawCallback>,
        resolver: &dyn SurfaceResolver,
        events: &mut Vec<SurfaceEvent>,
    ) {
        self.frame_index += 1;
        let previous_pending = self.pending_frame_data.take();

        self.update_blocking_surfaces(previous_pending.is_some(), &frame, resolver, events);

        let data = FrameData::new(frame, draw_callback, will_draw_callback);
        if self.blocking_surfaces.is_empty() {
            self.activate_frame(data, ActivationCause::Immediate, events);
        } else {
            self.pending_frame_data = Some(data);
            events.push(SurfaceEvent::ResolutionRequested {
                surface_id: self.surface_id,
                blocking: self.blocking_surfaces.iter().copied().collect(),
            });
        }

        self.unref_frame_resources_and_run_draw_callback(previous_pending, events);
    }

    /// Removes `id` from the blocking set, activating once the set is empty.
    ///
    /// Ids that do not block (for example after a deadline) are ignored.
    pub fn notify_surface_id_available(&mut self, id: SurfaceId, events: &mut Vec<SurfaceEvent>) {
        if !self.blocking_surfaces.remove(&id) {
            return;
        }
        if self.blocking_surfaces.is_empty() {
            self.activate_pending_frame(ActivationCause::DependenciesResolved, events);
        }
    }

    /// Forces the pending frame active, ignoring unresolved blockers.
    ///
    /// Does nothing without a pending frame, or if the frame's metadata
    /// forbids activation before its dependencies.
    pub fn activate_pending_frame_for_deadline(&mut self, events: &mut Vec<SurfaceEvent>) {
        let Some(pending) = &self.pending_frame_data else {
            return;
        };
        if !pending.frame.metadata.can_activate_before_dependencies {
            return;
        }
        self.blocking_surfaces.clear();
        self.activate_pending_frame(ActivationCause::Deadline, events);
    }

    /// Continues the frame sequence of `previous`, the surface this one
    /// replaces.
    ///
    /// # Panics
    ///
    /// Panics if no frame has been queued on this surface.
    pub fn set_previous_frame_surface(&mut self, previous: &Surface) {
        assert!(
            self.has_active_frame() || self.has_pending_frame(),
            "set_previous_frame_surface requires a queued frame"
        );
        self.frame_index = previous.frame_index + 1;
        self.previous_frame_surface_id = previous.surface_id;
    }

    // -- Copy output --

    /// Attaches a copy request to the active frame's root pass.
    ///
    /// A request with the same source replaces the earlier one. Without an
    /// active frame, or if it has no passes, the request is answered with an
    /// empty result.
    pub fn request_copy_of_output(&mut self, mut request: CopyOutputRequest) {
        let Some(pass) = self
            .active_frame_data
            .as_mut()
            .and_then(|data| data.frame.render_pass_list.last_mut())
        else {
            request.send_empty_result();
            return;
        };
        if let Some(source) = request.source() {
            pass.copy_requests.retain(|r| r.source() != Some(source));
        }
        pass.copy_requests.push(request);
    }

    /// Drains every copy request of the active frame, keyed by pass id.
    pub fn take_copy_output_requests(&mut self) -> BTreeMap<RenderPassId, Vec<CopyOutputRequest>> {
        let mut out: BTreeMap<RenderPassId, Vec<CopyOutputRequest>> = BTreeMap::new();
        let Some(data) = &mut self.active_frame_data else {
            return out;
        };
        for pass in &mut data.frame.render_pass_list {
            if pass.copy_requests.is_empty() {
                continue;
            }
            out.entry(pass.id)
                .or_default()
                .extend(mem::take(&mut pass.copy_requests));
        }
        out
    }

    // -- Drawing --

    /// Runs the active frame's will-draw callback.
    pub fn run_will_draw_callback(&self, damage_rect: Rect, events: &mut Vec<SurfaceEvent>) {
        let Some(callback) = self
            .active_frame_data
            .as_ref()
            .and_then(|data| data.will_draw_callback)
        else {
            return;
        };
        events.push(SurfaceEvent::WillDraw {
            surface_id: callback.surface_id,
            damage_rect,
        });
    }

    // -- Destruction dependencies --

    /// Adds a token that must be satisfied before the surface is reclaimed.
    pub fn add_destruction_dependency(&mut self, sequence: SurfaceSequence) {
        self.destruction_dependencies.push(sequence);
    }

    /// Drops every dependency that is in `sequences` (consuming it) or whose
    /// frame sink is no longer valid.
    pub fn satisfy_destruction_dependencies(
        &mut self,
        sequences: &mut BTreeSet<SurfaceSequence>,
        valid_frame_sink_ids: &BTreeSet<FrameSinkId>,
    ) {
        self.destruction_dependencies.retain(|seq| {
            let satisfied = sequences.remove(seq);
            !satisfied && valid_frame_sink_ids.contains(&seq.frame_sink_id)
        });
    }

    // -- Observers --

    /// Registers an observer.
    pub fn add_observer(&mut self, id: ObserverId) {
        self.observers.insert(id);
    }

    /// Unregisters an observer.
    pub fn remove_observer(&mut self, id: ObserverId) {
        self.observers.remove(&id);
    }

    // -- Destruction --

    /// Destroys the surface: answers copy requests, notifies observers, then
    /// releases the pending and the active frame.
    pub fn discard(mut self, events: &mut Vec<SurfaceEvent>) {
        self.clear_copy_requests();
        events.push(SurfaceEvent::Discarded {
            surface_id: self.surface_id,
            frame_index: self.frame_index,
            pending_embedded_surfaces: self
                .pending_frame_data
                .as_ref()
                .map(|data| data.frame.metadata.embedded_surfaces.clone()),
            observers: self.observers.iter().copied().collect(),
        });
        self.observers.clear();
        let pending = self.pending_frame_data.take();
        let active = self.active_frame_data.take();
        self.unref_frame_resources_and_run_draw_callback(pending, events);
        self.unref_frame_resources_and_run_draw_callback(active, events);
    }

    // -- Internals --

    fn update_blocking_surfaces(
        &mut self,
        has_previous_pending_frame: bool,
        frame: &CompositorFrame,
        resolver: &dyn SurfaceResolver,
        events: &mut Vec<SurfaceEvent>,
    ) {
        if !resolver.tracks_dependencies() {
            self.blocking_surfaces.clear();
            return;
        }

        let new_blocking: BTreeSet<SurfaceId> = frame
            .metadata
            .embedded_surfaces
            .iter()
            .filter(|id| !resolver.has_active_frame(id))
            .copied()
            .collect();

        if has_previous_pending_frame {
            let removed: Vec<SurfaceId> = self
                .blocking_surfaces
                .difference(&new_blocking)
                .copied()
                .collect();
            let added: Vec<SurfaceId> = new_blocking
                .difference(&self.blocking_surfaces)
                .copied()
                .collect();
            if !added.is_empty() || !removed.is_empty() {
                events.push(SurfaceEvent::DependenciesChanged {
                    surface_id: self.surface_id,
                    frame_index: self.frame_index,
                    added,
                    removed,
                    observers: self.observers.iter().copied().collect(),
                });
            }
        }

        self.blocking_surfaces = new_blocking;
    }

    fn activate_pending_frame(&mut self, cause: ActivationCause, events: &mut Vec<SurfaceEvent>) {
        if let Some(data) = self.pending_frame_data.take() {
            self.activate_frame(data, cause, events);
        }
    }

    fn activate_frame(
        &mut self,
        data: FrameData,
        cause: ActivationCause,
        events: &mut Vec<SurfaceEvent>,
    ) {
        // Copy requests on the old root pass carry over to the new frame.
        let old_copy_requests = self
            .active_frame_data
            .as_mut()
            .and_then(|d| d.frame.render_pass_list.last_mut())
            .map(|pass| mem::take(&mut pass.copy_requests))
            .unwrap_or_default();

        self.clear_copy_requests();

        let first_activation = self.active_frame_data.is_none();
        let previous = self.active_frame_data.replace(data);

        for request in old_copy_requests {
            self.request_copy_of_output(request);
        }

        let has_damage = self
            .active_frame_data
            .as_ref()
            .is_some_and(|d| !d.frame.render_pass_list.is_empty());

        self.previous_frame_surface_id = self.surface_id;

        self.unref_frame_resources_and_run_draw_callback(previous, events);

        let referenced_surfaces = self
            .active_frame_data
            .as_ref()
            .map(|d| d.frame.metadata.referenced_surfaces.clone())
            .unwrap_or_default();
        events.push(SurfaceEvent::Activated {
            surface_id: self.surface_id,
            frame_index: self.frame_index,
            cause,
            first_activation,
            has_damage,
            referenced_surfaces,
            observers: self.observers.iter().copied().collect(),
        });

        let frame_index = self.frame_index;
        if let Some(callback) = self
            .active_frame_data
            .as_mut()
            .and_then(|d| d.draw_callback.take())
        {
            events.push(callback.fire(DrawResult::Activated, frame_index));
        }
    }

    fn unref_frame_resources_and_run_draw_callback(
        &self,
        data: Option<FrameData>,
        events: &mut Vec<SurfaceEvent>,
    ) {
        let Some(mut data) = data else {
            return;
        };

        let resources: Vec<ReturnedResource> = data
            .frame
            .resource_list
            .iter()
            .map(|r| {
                let mut returned = r.to_returned();
                // The producer already knows its own sync token.
                returned.sync_token.clear();
                returned
            })
            .collect();
        if !resources.is_empty() {
            events.push(SurfaceEvent::ReturnResources {
                frame_sink_id: self.surface_id.frame_sink_id,
                resources,
            });
        }

        if let Some(callback) = data.draw_callback.take() {
            events.push(callback.fire(DrawResult::Discarded, self.frame_index));
        }
    }

    fn clear_copy_requests(&mut self) {
        if let Some(data) = &mut self.active_frame_data {
            for pass in &mut data.frame.render_pass_list {
                for request in &mut pass.copy_requests {
                    request.send_empty_result();
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
