// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The surface registry, reference graph, and garbage collector.
//!
//! [`SurfaceManager`] owns every [`Surface`] and the edges between them. It is
//! an explicit context object: independent managers never share state.
//!
//! Surfaces report side effects as [`SurfaceEvent`]s. The manager processes
//! them with a work queue: activations mark damage, add temporary references,
//! notify observers and the dependency tracker, and may activate further
//! surfaces in turn. Effects addressed to producers (resources to return,
//! draw callbacks, reference updates) are appended to an outbox of
//! [`FrameSinkNotification`]s, which the
//! [`FrameSinkManager`](crate::frame_sink_manager::FrameSinkManager) drains.
//!
//! # Lifetime
//!
//! Under [`LifetimeType::References`] a surface marked destroyed survives as
//! long as it is reachable from [`root_surface_id`](SurfaceManager::root_surface_id)
//! or from a temporarily referenced surface. Under
//! [`LifetimeType::Sequences`] it survives while it still holds destruction
//! dependencies or is reachable through active frames' referenced surfaces.

use alloc::collections::{BTreeMap, BTreeSet, VecDeque};
use alloc::vec::Vec;

use kurbo::Rect;
use understory_dirty::{CycleHandling, DirtyTracker, EagerPolicy};

use crate::begin_frame::{BeginFrameArgs, BeginFrameObserver};
use crate::dependency::{DependencyTrackerConfig, Resolution, SurfaceDependencyTracker};
use crate::dirty;
use crate::frame::{CompositorFrame, CopyOutputRequest, RenderPassId};
use crate::id::{FrameSinkId, LocalSurfaceId, SurfaceId, SurfaceReference, SurfaceSequence};
use crate::observer::{self, ObserverId, ObserverTable, PendingFrameEvent, PendingFrameObserver};
use crate::resource::ReturnedResource;
use crate::surface::{
    DrawCallback, DrawResult, Surface, SurfaceEvent, SurfaceResolver, WillDrawCallback,
};
use crate::trace::{
    DeadlineFiredEvent, FrameActivatedEvent, FrameDiscardedEvent, FrameQueuedEvent,
    SurfaceCreatedEvent, SurfaceDestroyedEvent, TraceJournal,
};

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// How destroyed surfaces are kept alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LifetimeType {
    /// Reachability from the root through surface references.
    References,
    /// Destruction-dependency sequences.
    Sequences,
}

/// Configuration for [`SurfaceManager`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SurfaceManagerConfig {
    /// Garbage-collection model.
    pub lifetime: LifetimeType,
    /// Installs a dependency tracker; without one, frames never block.
    pub dependency_tracker: Option<DependencyTrackerConfig>,
}

impl SurfaceManagerConfig {
    /// Reference lifetime without dependency tracking.
    #[must_use]
    pub const fn references() -> Self {
        Self {
            lifetime: LifetimeType::References,
            dependency_tracker: None,
        }
    }

    /// Sequence lifetime without dependency tracking.
    #[must_use]
    pub const fn sequences() -> Self {
        Self {
            lifetime: LifetimeType::Sequences,
            dependency_tracker: None,
        }
    }

    /// Installs a dependency tracker.
    #[must_use]
    pub const fn with_dependency_tracker(mut self, config: DependencyTrackerConfig) -> Self {
        self.dependency_tracker = Some(config);
        self
    }
}

impl Default for SurfaceManagerConfig {
    fn default() -> Self {
        Self::references()
    }
}

// ---------------------------------------------------------------------------
// Notifications
// ---------------------------------------------------------------------------

/// An effect addressed to the producer behind a frame sink.
#[derive(Clone, Debug, PartialEq)]
pub enum FrameSinkNotification {
    /// A surface of the sink activated a frame with these references.
    ReferencedSurfacesChanged {
        /// Addressee.
        frame_sink_id: FrameSinkId,
        /// The activated surface.
        local_surface_id: LocalSurfaceId,
        /// Referenced surfaces of its active frame.
        referenced_surfaces: Option<Vec<SurfaceId>>,
    },
    /// Resources of a released frame.
    ReturnResources {
        /// Addressee.
        frame_sink_id: FrameSinkId,
        /// One record per lend.
        resources: Vec<ReturnedResource>,
    },
    /// A draw callback fired.
    DrawCallback {
        /// Addressee.
        frame_sink_id: FrameSinkId,
        /// Surface the frame was queued on.
        local_surface_id: LocalSurfaceId,
        /// How the frame was resolved.
        result: DrawResult,
    },
    /// A surface of the sink is about to be drawn.
    WillDraw {
        /// Addressee.
        frame_sink_id: FrameSinkId,
        /// The surface.
        local_surface_id: LocalSurfaceId,
        /// Area about to be redrawn.
        damage_rect: Rect,
    },
}

impl FrameSinkNotification {
    /// The addressed frame sink.
    #[must_use]
    pub fn frame_sink_id(&self) -> FrameSinkId {
        match self {
            Self::ReferencedSurfacesChanged { frame_sink_id, .. }
            | Self::ReturnResources { frame_sink_id, .. }
            | Self::DrawCallback { frame_sink_id, .. }
            | Self::WillDraw { frame_sink_id, .. } => *frame_sink_id,
        }
    }
}

struct Resolver<'a> {
    surfaces: &'a BTreeMap<SurfaceId, Surface>,
    tracks_dependencies: bool,
}

impl SurfaceResolver for Resolver<'_> {
    fn has_active_frame(&self, id: &SurfaceId) -> bool {
        self.surfaces.get(id).is_some_and(Surface::has_active_frame)
    }

    fn tracks_dependencies(&self) -> bool {
        self.tracks_dependencies
    }
}

// ---------------------------------------------------------------------------
// SurfaceManager
// ---------------------------------------------------------------------------

/// Registry of surfaces, references, and frame sink ids.
#[derive(Debug)]
pub struct SurfaceManager {
    config: SurfaceManagerConfig,
    root_surface_id: SurfaceId,
    surfaces: BTreeMap<SurfaceId, Surface>,

    // -- Reference graph --
    parent_to_child_refs: BTreeMap<SurfaceId, BTreeSet<SurfaceId>>,
    child_to_parent_refs: BTreeMap<SurfaceId, BTreeSet<SurfaceId>>,
    temporary_references: BTreeMap<SurfaceId, Option<FrameSinkId>>,

    // -- Lifetime --
    surfaces_to_destroy: BTreeSet<SurfaceId>,
    satisfied_sequences: BTreeSet<SurfaceSequence>,
    valid_frame_sink_ids: BTreeSet<FrameSinkId>,
    frame_sink_manager_clients: BTreeSet<FrameSinkId>,

    // -- Damage --
    slots: BTreeMap<SurfaceId, u32>,
    slot_owners: Vec<Option<SurfaceId>>,
    free_slots: Vec<u32>,
    damage: DirtyTracker<u32>,

    // -- Collaborators --
    dependency_tracker: Option<SurfaceDependencyTracker>,
    observers: ObserverTable,
    outbox: VecDeque<FrameSinkNotification>,
    journal: TraceJournal,
    last_begin_frame_args: Option<BeginFrameArgs>,
}

impl Default for SurfaceManager {
    fn default() -> Self {
        Self::new(SurfaceManagerConfig::default())
    }
}

impl SurfaceManager {
    /// Creates an empty manager.
    #[must_use]
    pub fn new(config: SurfaceManagerConfig) -> Self {
        Self {
            config,
            root_surface_id: SurfaceId::new(FrameSinkId::default(), LocalSurfaceId::new(1, 1)),
            surfaces: BTreeMap::new(),
            parent_to_child_refs: BTreeMap::new(),
            child_to_parent_refs: BTreeMap::new(),
            temporary_references: BTreeMap::new(),
            surfaces_to_destroy: BTreeSet::new(),
            satisfied_sequences: BTreeSet::new(),
            valid_frame_sink_ids: BTreeSet::new(),
            frame_sink_manager_clients: BTreeSet::new(),
            slots: BTreeMap::new(),
            slot_owners: Vec::new(),
            free_slots: Vec::new(),
            damage: DirtyTracker::with_cycle_handling(CycleHandling::Error),
            dependency_tracker: config.dependency_tracker.map(SurfaceDependencyTracker::new),
            observers: ObserverTable::default(),
            outbox: VecDeque::new(),
            journal: TraceJournal::new(),
            last_begin_frame_args: None,
        }
    }

    // -- Queries --

    /// The manager's configuration.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SurfaceManagerConfig {
        &self.config
    }

    /// Returns `true` under [`LifetimeType::References`].
    #[inline]
    #[must_use]
    pub fn using_surface_references(&self) -> bool {
        self.config.lifetime == LifetimeType::References
    }

    /// The synthetic root of the reference graph.
    #[inline]
    #[must_use]
    pub const fn root_surface_id(&self) -> SurfaceId {
        self.root_surface_id
    }

    /// Looks up a surface.
    #[must_use]
    pub fn surface(&self, id: &SurfaceId) -> Option<&Surface> {
        self.surfaces.get(id)
    }

    pub(crate) fn surface_mut(&mut self, id: &SurfaceId) -> Option<&mut Surface> {
        self.surfaces.get_mut(id)
    }

    /// Number of surfaces, including ones marked destroyed but still alive.
    #[must_use]
    pub fn surface_count(&self) -> usize {
        self.surfaces.len()
    }

    /// Returns `true` if `id` is marked destroyed and awaits collection.
    #[must_use]
    pub fn is_marked_for_destruction(&self, id: &SurfaceId) -> bool {
        self.surfaces_to_destroy.contains(id)
    }

    /// Surfaces referenced by `id`, in id order.
    #[must_use]
    pub fn child_references(&self, id: &SurfaceId) -> Vec<SurfaceId> {
        self.parent_to_child_refs
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Surfaces referencing `id`, in id order.
    #[must_use]
    pub fn parent_references(&self, id: &SurfaceId) -> Vec<SurfaceId> {
        self.child_to_parent_refs
            .get(id)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// The dependency tracker, if installed.
    #[must_use]
    pub fn dependency_tracker(&self) -> Option<&SurfaceDependencyTracker> {
        self.dependency_tracker.as_ref()
    }

    /// The deferred trace events.
    #[inline]
    #[must_use]
    pub const fn journal(&self) -> &TraceJournal {
        &self.journal
    }

    /// Mutable access to the deferred trace events.
    pub fn journal_mut(&mut self) -> &mut TraceJournal {
        &mut self.journal
    }

    // -- Frame sink registry --

    /// Marks `id` as a valid frame sink id.
    pub fn register_frame_sink_id(&mut self, id: FrameSinkId) {
        self.valid_frame_sink_ids.insert(id);
    }

    /// Invalidates `id`: drops the temporary references it owns and runs
    /// garbage collection.
    pub fn invalidate_frame_sink_id(&mut self, id: FrameSinkId) {
        self.valid_frame_sink_ids.remove(&id);

        if self.using_surface_references() {
            self.temporary_references.retain(|_, owner| *owner != Some(id));
        }

        self.garbage_collect_surfaces();
    }

    /// Returns `true` if `id` is registered and not invalidated.
    #[must_use]
    pub fn is_frame_sink_id_valid(&self, id: FrameSinkId) -> bool {
        self.valid_frame_sink_ids.contains(&id)
    }

    /// Records that a producer façade exists for `id`.
    pub fn register_frame_sink_manager_client(&mut self, id: FrameSinkId) {
        self.frame_sink_manager_clients.insert(id);
    }

    /// Forgets the producer façade for `id`.
    pub fn unregister_frame_sink_manager_client(&mut self, id: FrameSinkId) {
        self.frame_sink_manager_clients.remove(&id);
    }

    /// Returns `true` if a producer façade exists for `id`.
    #[must_use]
    pub fn has_frame_sink_manager_client(&self, id: FrameSinkId) -> bool {
        self.frame_sink_manager_clients.contains(&id)
    }

    // -- Surface lifecycle --

    /// Creates a surface, or revives one that is marked destroyed.
    pub fn create_surface(&mut self, surface_id: SurfaceId) {
        if let Some(surface) = self.surfaces.get_mut(&surface_id) {
            if surface.destroyed() {
                surface.set_destroyed(false);
                self.surfaces_to_destroy.remove(&surface_id);
                self.journal.surface_created(SurfaceCreatedEvent {
                    surface: surface_id,
                    resurrected: true,
                    at: self.journal.now(),
                });
            }
            return;
        }

        self.surfaces.insert(surface_id, Surface::new(surface_id));
        self.allocate_slot(surface_id);
        self.journal.surface_created(SurfaceCreatedEvent {
            surface: surface_id,
            resurrected: false,
            at: self.journal.now(),
        });
    }

    /// Marks a surface destroyed and collects garbage.
    pub fn destroy_surface(&mut self, surface_id: SurfaceId) {
        let Some(surface) = self.surfaces.get_mut(&surface_id) else {
            return;
        };
        surface.set_destroyed(true);
        self.surfaces_to_destroy.insert(surface_id);
        self.garbage_collect_surfaces();
    }

    /// Queues a frame on an existing surface and processes the fallout.
    ///
    /// # Panics
    ///
    /// Panics if no surface `surface_id` exists.
    pub fn queue_frame(
        &mut self,
        surface_id: SurfaceId,
        frame: CompositorFrame,
        draw_callback: Option<DrawCallback>,
        will_draw_callback: Option<WillDrawCallback>,
    ) {
        let sequence_number = frame.metadata.begin_frame_ack.sequence_number;
        // The surface is taken out of the map while it resolves its blockers.
        let Some(mut surface) = self.surfaces.remove(&surface_id) else {
            panic!("queue_frame on unknown {surface_id:?}");
        };
        let mut events = Vec::new();
        {
            let resolver = Resolver {
                surfaces: &self.surfaces,
                tracks_dependencies: self.dependency_tracker.is_some(),
            };
            surface.queue_frame(frame, draw_callback, will_draw_callback, &resolver, &mut events);
        }
        self.journal.frame_queued(FrameQueuedEvent {
            surface: surface_id,
            frame_index: surface.frame_index(),
            blocking: u32::try_from(surface.blocking_surfaces().len()).unwrap_or(u32::MAX),
            sequence_number,
            at: self.journal.now(),
        });
        self.surfaces.insert(surface_id, surface);
        self.process_events(events);
    }

    /// Continues the frame sequence of `previous` on `surface_id`.
    ///
    /// Does nothing unless both surfaces exist.
    pub fn set_previous_frame_surface(&mut self, surface_id: SurfaceId, previous: SurfaceId) {
        if surface_id == previous {
            return;
        }
        let Some(mut surface) = self.surfaces.remove(&surface_id) else {
            return;
        };
        if let Some(prev) = self.surfaces.get(&previous) {
            surface.set_previous_frame_surface(prev);
        }
        self.surfaces.insert(surface_id, surface);
    }

    /// Forces the pending frame of `surface_id` active if its metadata allows.
    pub fn activate_pending_frame_for_deadline(&mut self, surface_id: SurfaceId) {
        let mut events = Vec::new();
        if let Some(surface) = self.surfaces.get_mut(&surface_id) {
            surface.activate_pending_frame_for_deadline(&mut events);
        }
        self.process_events(events);
    }

    /// Attaches a copy request to a surface's active frame. Requests against
    /// unknown surfaces are answered empty.
    pub fn request_copy_of_surface(
        &mut self,
        surface_id: SurfaceId,
        mut request: CopyOutputRequest,
    ) {
        match self.surfaces.get_mut(&surface_id) {
            Some(surface) => surface.request_copy_of_output(request),
            None => request.send_empty_result(),
        }
    }

    /// Drains the copy requests of a surface's active frame.
    pub fn take_copy_output_requests(
        &mut self,
        surface_id: SurfaceId,
    ) -> BTreeMap<RenderPassId, Vec<CopyOutputRequest>> {
        self.surfaces
            .get_mut(&surface_id)
            .map(Surface::take_copy_output_requests)
            .unwrap_or_default()
    }

    /// Tells the producer of `surface_id` that its active frame is about to be
    /// drawn.
    pub fn run_will_draw_callback(&mut self, surface_id: SurfaceId, damage_rect: Rect) {
        let mut events = Vec::new();
        if let Some(surface) = self.surfaces.get(&surface_id) {
            surface.run_will_draw_callback(damage_rect, &mut events);
        }
        self.process_events(events);
    }

    // -- References --

    /// Adds reference edges. Self references (same frame sink) and references
    /// to unknown children are rejected. An accepted edge removes the child's
    /// temporary reference.
    pub fn add_surface_references(&mut self, references: &[SurfaceReference]) {
        if !self.using_surface_references() {
            return;
        }
        #[cfg(feature = "trace-rich")]
        let mut changes = Vec::new();
        for reference in references {
            if self.add_surface_reference(*reference) {
                #[cfg(feature = "trace-rich")]
                changes.push(crate::trace::ReferenceChange {
                    parent: reference.parent,
                    child: reference.child,
                    kind: crate::trace::ReferenceChangeKind::Added,
                });
            }
        }
        #[cfg(feature = "trace-rich")]
        self.journal.reference_changes(changes);
    }

    /// Removes reference edges, then collects garbage. Missing edges are
    /// skipped.
    pub fn remove_surface_references(&mut self, references: &[SurfaceReference]) {
        if !self.using_surface_references() {
            return;
        }
        #[cfg(feature = "trace-rich")]
        let mut changes = Vec::new();
        for reference in references {
            if self.remove_surface_reference(*reference) {
                #[cfg(feature = "trace-rich")]
                changes.push(crate::trace::ReferenceChange {
                    parent: reference.parent,
                    child: reference.child,
                    kind: crate::trace::ReferenceChangeKind::Removed,
                });
            }
        }
        #[cfg(feature = "trace-rich")]
        self.journal.reference_changes(changes);
        self.garbage_collect_surfaces();
    }

    /// Returns `true` if `id` holds a temporary reference.
    #[must_use]
    pub fn has_temporary_reference(&self, id: &SurfaceId) -> bool {
        self.temporary_references.contains_key(id)
    }

    /// The frame sink that claimed `id`'s temporary reference.
    #[must_use]
    pub fn temporary_reference_owner(&self, id: &SurfaceId) -> Option<FrameSinkId> {
        self.temporary_references.get(id).copied().flatten()
    }

    /// Gives the temporary reference of `surface_id` to `owner`, so that it is
    /// dropped when `owner` is invalidated.
    pub fn assign_temporary_reference(&mut self, surface_id: SurfaceId, owner: FrameSinkId) {
        if let Some(slot) = self.temporary_references.get_mut(&surface_id) {
            *slot = Some(owner);
        }
    }

    /// Drops the temporary reference of `surface_id` and collects garbage.
    pub fn drop_temporary_reference(&mut self, surface_id: SurfaceId) {
        if self.temporary_references.remove(&surface_id).is_some() {
            self.garbage_collect_surfaces();
        }
    }

    // -- Sequences --

    /// Attaches a destruction dependency to `surface_id`.
    pub fn require_sequence(&mut self, surface_id: SurfaceId, sequence: SurfaceSequence) {
        if let Some(surface) = self.surfaces.get_mut(&surface_id) {
            surface.add_destruction_dependency(sequence);
        }
    }

    /// Satisfies a destruction dependency and collects garbage.
    pub fn satisfy_sequence(&mut self, sequence: SurfaceSequence) {
        self.satisfied_sequences.insert(sequence);
        self.garbage_collect_surfaces();
    }

    // -- Observers --

    /// Registers an observer of `surface_id`. Returns `None` for unknown
    /// surfaces.
    pub fn add_pending_frame_observer(&mut self, surface_id: SurfaceId) -> Option<ObserverId> {
        let surface = self.surfaces.get_mut(&surface_id)?;
        let id = self.observers.add(surface_id);
        surface.add_observer(id);
        Some(id)
    }

    /// Unregisters an observer and discards its queued events.
    pub fn remove_pending_frame_observer(&mut self, id: ObserverId) {
        if let Some(surface_id) = self.observers.remove(id) {
            if let Some(surface) = self.surfaces.get_mut(&surface_id) {
                surface.remove_observer(id);
            }
        }
    }

    /// Drains the events queued for an observer.
    pub fn take_pending_frame_events(&mut self, id: ObserverId) -> Vec<PendingFrameEvent> {
        self.observers.take(id)
    }

    /// Drains the events queued for `id` into `target`. Returns how many were
    /// delivered.
    pub fn dispatch_pending_frame_events(
        &mut self,
        id: ObserverId,
        target: &mut dyn PendingFrameObserver,
    ) -> usize {
        let events = self.observers.take(id);
        for event in &events {
            observer::dispatch(target, event);
        }
        events.len()
    }

    // -- Damage --

    /// Drains the damaged surfaces, embedders included, in deterministic order.
    pub fn take_damaged_surfaces(&mut self) -> Vec<SurfaceId> {
        let slots: Vec<u32> = self
            .damage
            .drain(dirty::DAMAGE)
            .affected()
            .deterministic()
            .run()
            .collect();
        slots
            .into_iter()
            .filter_map(|slot| self.slot_owners.get(slot as usize).copied().flatten())
            .collect()
    }

    // -- Outbox --

    /// Pops the oldest notification for a frame sink.
    pub fn pop_notification(&mut self) -> Option<FrameSinkNotification> {
        self.outbox.pop_front()
    }

    /// Number of undelivered notifications.
    #[must_use]
    pub fn pending_notification_count(&self) -> usize {
        self.outbox.len()
    }

    // -- Internals --

    fn add_surface_reference(&mut self, reference: SurfaceReference) -> bool {
        let SurfaceReference { parent, child } = reference;
        if parent.frame_sink_id == child.frame_sink_id {
            return false;
        }
        if !self.surfaces.contains_key(&child) {
            return false;
        }
        if !self.parent_to_child_refs.entry(parent).or_default().insert(child) {
            return false;
        }
        self.child_to_parent_refs.entry(child).or_default().insert(parent);

        if let (Some(&p), Some(&c)) = (self.slots.get(&parent), self.slots.get(&child)) {
            // Cycles are legal in the reference graph; damage just stops there.
            let _ = self.damage.add_dependency(p, c, dirty::DAMAGE);
        }

        self.temporary_references.remove(&child);
        true
    }

    fn remove_surface_reference(&mut self, reference: SurfaceReference) -> bool {
        let SurfaceReference { parent, child } = reference;
        let removed = self
            .parent_to_child_refs
            .get_mut(&parent)
            .is_some_and(|children| children.remove(&child));
        if !removed {
            return false;
        }
        if self.parent_to_child_refs.get(&parent).is_some_and(BTreeSet::is_empty) {
            self.parent_to_child_refs.remove(&parent);
        }
        if let Some(parents) = self.child_to_parent_refs.get_mut(&child) {
            parents.remove(&parent);
            if parents.is_empty() {
                self.child_to_parent_refs.remove(&child);
            }
        }
        if let (Some(&p), Some(&c)) = (self.slots.get(&parent), self.slots.get(&child)) {
            self.damage.remove_dependency(p, c, dirty::DAMAGE);
        }
        true
    }

    fn allocate_slot(&mut self, surface_id: SurfaceId) {
        let slot = match self.free_slots.pop() {
            Some(slot) => {
                self.slot_owners[slot as usize] = Some(surface_id);
                slot
            }
            None => {
                let slot = u32::try_from(self.slot_owners.len()).unwrap_or(u32::MAX);
                self.slot_owners.push(Some(surface_id));
                slot
            }
        };
        self.slots.insert(surface_id, slot);
    }

    fn release_slot(&mut self, surface_id: &SurfaceId) {
        if let Some(slot) = self.slots.remove(surface_id) {
            self.damage.remove_key(slot);
            self.slot_owners[slot as usize] = None;
            self.free_slots.push(slot);
        }
    }

    fn garbage_collect_surfaces(&mut self) {
        if self.surfaces_to_destroy.is_empty() {
            return;
        }

        let live = match self.config.lifetime {
            LifetimeType::References => self.live_surfaces_for_references(),
            LifetimeType::Sequences => self.live_surfaces_for_sequences(),
        };

        let dead: Vec<SurfaceId> = self
            .surfaces_to_destroy
            .iter()
            .filter(|id| !live.contains(id))
            .copied()
            .collect();
        for id in dead {
            self.surfaces_to_destroy.remove(&id);
            self.destroy_surface_internal(id);
        }
    }

    fn live_surfaces_for_references(&self) -> BTreeSet<SurfaceId> {
        let mut reachable = BTreeSet::new();
        let mut queue = VecDeque::new();

        reachable.insert(self.root_surface_id);
        queue.push_back(self.root_surface_id);
        for id in self.temporary_references.keys() {
            if reachable.insert(*id) {
                queue.push_back(*id);
            }
        }

        while let Some(id) = queue.pop_front() {
            let Some(children) = self.parent_to_child_refs.get(&id) else {
                continue;
            };
            for child in children {
                if reachable.insert(*child) {
                    queue.push_back(*child);
                }
            }
        }
        reachable
    }

    fn live_surfaces_for_sequences(&mut self) -> BTreeSet<SurfaceId> {
        let mut live = BTreeSet::new();
        let mut queue = Vec::new();

        for (id, surface) in &mut self.surfaces {
            surface.satisfy_destruction_dependencies(
                &mut self.satisfied_sequences,
                &self.valid_frame_sink_ids,
            );
            if !surface.destroyed() || surface.destruction_dependency_count() > 0 {
                live.insert(*id);
                queue.push(*id);
            }
        }

        while let Some(id) = queue.pop() {
            let Some(surface) = self.surfaces.get(&id) else {
                continue;
            };
            if !surface.has_active_frame() {
                continue;
            }
            for child in &surface.active_frame().metadata.referenced_surfaces {
                if self.surfaces.contains_key(child) && live.insert(*child) {
                    queue.push(*child);
                }
            }
        }
        live
    }

    fn destroy_surface_internal(&mut self, surface_id: SurfaceId) {
        let Some(surface) = self.surfaces.remove(&surface_id) else {
            return;
        };

        self.temporary_references.remove(&surface_id);
        if let Some(children) = self.parent_to_child_refs.get(&surface_id).cloned() {
            for child in children {
                self.remove_surface_reference(SurfaceReference::new(surface_id, child));
            }
        }
        if let Some(parents) = self.child_to_parent_refs.get(&surface_id).cloned() {
            for parent in parents {
                self.remove_surface_reference(SurfaceReference::new(parent, surface_id));
            }
        }
        self.release_slot(&surface_id);

        self.journal.surface_destroyed(SurfaceDestroyedEvent {
            surface: surface_id,
            at: self.journal.now(),
        });

        let mut events = Vec::new();
        surface.discard(&mut events);
        self.process_events(events);
    }

    fn process_events(&mut self, events: Vec<SurfaceEvent>) {
        let mut queue: VecDeque<SurfaceEvent> = events.into();
        let mut more = Vec::new();
        while let Some(event) = queue.pop_front() {
            self.process_event(event, &mut more);
            queue.extend(more.drain(..));
        }
    }

    fn process_event(&mut self, event: SurfaceEvent, more: &mut Vec<SurfaceEvent>) {
        match event {
            SurfaceEvent::Activated {
                surface_id,
                frame_index,
                cause,
                first_activation,
                has_damage,
                referenced_surfaces,
                observers,
            } => {
                self.journal.frame_activated(FrameActivatedEvent {
                    surface: surface_id,
                    frame_index,
                    cause,
                    at: self.journal.now(),
                });
                if has_damage {
                    if let Some(&slot) = self.slots.get(&surface_id) {
                        self.damage.mark_with(slot, dirty::DAMAGE, &EagerPolicy);
                    }
                }
                if first_activation
                    && self.using_surface_references()
                    && !self.child_to_parent_refs.contains_key(&surface_id)
                {
                    self.temporary_references.entry(surface_id).or_insert(None);
                }
                self.outbox.push_back(FrameSinkNotification::ReferencedSurfacesChanged {
                    frame_sink_id: surface_id.frame_sink_id,
                    local_surface_id: surface_id.local_surface_id,
                    referenced_surfaces: Some(referenced_surfaces),
                });
                for id in observers {
                    self.observers.push(
                        id,
                        PendingFrameEvent::Activated {
                            surface_id,
                            frame_index,
                        },
                    );
                }
                if let Some(tracker) = &mut self.dependency_tracker {
                    let dependents = tracker.on_surface_activated(surface_id);
                    self.notify_surface_id_available(&dependents, surface_id, more);
                }
            }
            SurfaceEvent::ResolutionRequested { surface_id, blocking } => {
                let Some(tracker) = &mut self.dependency_tracker else {
                    return;
                };
                let Some(surface) = self.surfaces.get_mut(&surface_id) else {
                    return;
                };
                if !surface.has_pending_frame() {
                    return;
                }
                let can_activate = surface
                    .pending_frame()
                    .metadata
                    .can_activate_before_dependencies;
                if tracker.request_surface_resolution(surface_id, &blocking, can_activate)
                    == Resolution::ActivateNow
                {
                    surface.activate_pending_frame_for_deadline(more);
                }
            }
            SurfaceEvent::DependenciesChanged {
                surface_id,
                frame_index,
                added,
                removed,
                observers,
            } => {
                if let Some(tracker) = &mut self.dependency_tracker {
                    if tracker.is_observing(&surface_id) {
                        tracker.on_surface_dependencies_changed(surface_id, &added, &removed);
                    }
                }
                for id in observers {
                    self.observers.push(
                        id,
                        PendingFrameEvent::DependenciesChanged {
                            surface_id,
                            frame_index,
                            added: added.clone(),
                            removed: removed.clone(),
                        },
                    );
                }
            }
            SurfaceEvent::Discarded {
                surface_id,
                frame_index,
                pending_embedded_surfaces,
                observers,
            } => {
                for id in observers {
                    self.observers.push(
                        id,
                        PendingFrameEvent::Discarded {
                            surface_id,
                            frame_index,
                        },
                    );
                }
                if let Some(tracker) = &mut self.dependency_tracker {
                    let dependents = tracker
                        .on_surface_discarded(surface_id, pending_embedded_surfaces.as_deref());
                    self.notify_surface_id_available(&dependents, surface_id, more);
                }
            }
            SurfaceEvent::ReturnResources {
                frame_sink_id,
                resources,
            } => {
                self.outbox.push_back(FrameSinkNotification::ReturnResources {
                    frame_sink_id,
                    resources,
                });
            }
            SurfaceEvent::DrawCallback {
                surface_id,
                frame_index,
                result,
            } => {
                if result == DrawResult::Discarded {
                    self.journal.frame_discarded(FrameDiscardedEvent {
                        surface: surface_id,
                        frame_index,
                        at: self.journal.now(),
                    });
                }
                self.outbox.push_back(FrameSinkNotification::DrawCallback {
                    frame_sink_id: surface_id.frame_sink_id,
                    local_surface_id: surface_id.local_surface_id,
                    result,
                });
            }
            SurfaceEvent::WillDraw {
                surface_id,
                damage_rect,
            } => {
                self.outbox.push_back(FrameSinkNotification::WillDraw {
                    frame_sink_id: surface_id.frame_sink_id,
                    local_surface_id: surface_id.local_surface_id,
                    damage_rect,
                });
            }
        }
    }

    fn notify_surface_id_available(
        &mut self,
        dependents: &[SurfaceId],
        available: SurfaceId,
        more: &mut Vec<SurfaceEvent>,
    ) {
        for dependent in dependents {
            // Dependents may already be gone.
            if let Some(surface) = self.surfaces.get_mut(dependent) {
                surface.notify_surface_id_available(available, more);
            }
        }
    }
}

impl BeginFrameObserver for SurfaceManager {
    /// Counts toward the dependency deadline and, when it fires, forces every
    /// waiting surface active.
    fn on_begin_frame(&mut self, args: &BeginFrameArgs) {
        self.last_begin_frame_args = Some(*args);
        self.journal.set_now(args.frame_time);

        let Some(tracker) = &mut self.dependency_tracker else {
            return;
        };
        let Some(waiting) = tracker.on_begin_frame(args) else {
            return;
        };

        let pending_surfaces = u32::try_from(waiting.len()).unwrap_or(u32::MAX);
        let mut activated = 0_u32;
        for surface_id in waiting {
            // Surfaces may have been collected since they started waiting.
            let Some(surface) = self.surfaces.get_mut(&surface_id) else {
                continue;
            };
            if !surface.has_pending_frame() {
                continue;
            }
            let mut events = Vec::new();
            surface.activate_pending_frame_for_deadline(&mut events);
            if !surface.has_pending_frame() {
                activated += 1;
            }
            self.process_events(events);
        }

        if let Some(tracker) = &mut self.dependency_tracker {
            tracker.rearm_if_blocked();
        }

        self.journal.deadline_fired(DeadlineFiredEvent {
            frame_time: args.frame_time,
            pending_surfaces,
            activated,
        });
    }

    fn last_used_begin_frame_args(&self) -> Option<&BeginFrameArgs> {
        self.last_begin_frame_args.as_ref()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
