// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Pending-frame observers.
//!
//! Consumers such as a display compositor watch surfaces without owning them.
//! The [`SurfaceManager`](crate::manager::SurfaceManager) keeps a registration
//! table keyed by [`ObserverId`]; each registration names one surface and
//! queues [`PendingFrameEvent`]s for it. Consumers poll with
//! [`take_pending_frame_events`](crate::manager::SurfaceManager::take_pending_frame_events)
//! or hand a [`PendingFrameObserver`] to
//! [`dispatch_pending_frame_events`](crate::manager::SurfaceManager::dispatch_pending_frame_events).
//!
//! Removing a registration is explicit; a dropped consumer that forgets to
//! unregister only leaves an undrained queue behind.

use alloc::collections::{BTreeMap, VecDeque};
use alloc::vec::Vec;
use core::fmt;

use crate::id::SurfaceId;

/// Handle for one observer registration.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObserverId(pub u32);

impl fmt::Debug for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObserverId({})", self.0)
    }
}

/// A lifecycle change of an observed surface.
///
/// Every variant carries the surface's `frame_index` at the time of the
/// change so consumers can detect stale state.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PendingFrameEvent {
    /// A frame became active.
    Activated {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index after activation.
        frame_index: u64,
    },
    /// A replacement pending frame blocks on a different set of surfaces.
    DependenciesChanged {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index when the frame was queued.
        frame_index: u64,
        /// Newly blocking surfaces.
        added: Vec<SurfaceId>,
        /// Surfaces that no longer block.
        removed: Vec<SurfaceId>,
    },
    /// The surface is about to be destroyed.
    Discarded {
        /// The surface.
        surface_id: SurfaceId,
        /// Frame index at destruction.
        frame_index: u64,
    },
}

impl PendingFrameEvent {
    /// The surface the event is about.
    #[must_use]
    pub fn surface_id(&self) -> SurfaceId {
        match self {
            Self::Activated { surface_id, .. }
            | Self::DependenciesChanged { surface_id, .. }
            | Self::Discarded { surface_id, .. } => *surface_id,
        }
    }
}

/// Callback-style consumer of [`PendingFrameEvent`]s.
pub trait PendingFrameObserver {
    /// A frame of `surface_id` became active.
    fn on_surface_activated(&mut self, surface_id: SurfaceId, frame_index: u64);

    /// The blocking set of a pending frame changed.
    fn on_surface_dependencies_changed(
        &mut self,
        surface_id: SurfaceId,
        added: &[SurfaceId],
        removed: &[SurfaceId],
    ) {
        _ = (surface_id, added, removed);
    }

    /// `surface_id` is about to be destroyed.
    fn on_surface_discarded(&mut self, surface_id: SurfaceId, frame_index: u64);
}

/// Delivers one event to an observer.
pub fn dispatch(observer: &mut dyn PendingFrameObserver, event: &PendingFrameEvent) {
    match event {
        PendingFrameEvent::Activated {
            surface_id,
            frame_index,
        } => observer.on_surface_activated(*surface_id, *frame_index),
        PendingFrameEvent::DependenciesChanged {
            surface_id,
            added,
            removed,
            ..
        } => observer.on_surface_dependencies_changed(*surface_id, added, removed),
        PendingFrameEvent::Discarded {
            surface_id,
            frame_index,
        } => observer.on_surface_discarded(*surface_id, *frame_index),
    }
}

#[derive(Debug)]
struct Registration {
    surface_id: SurfaceId,
    queue: VecDeque<PendingFrameEvent>,
}

/// Registration table of observers and their queued events.
#[derive(Debug, Default)]
pub(crate) struct ObserverTable {
    next_id: u32,
    registrations: BTreeMap<ObserverId, Registration>,
}

impl ObserverTable {
    pub(crate) fn add(&mut self, surface_id: SurfaceId) -> ObserverId {
        let id = ObserverId(self.next_id);
        self.next_id = self.next_id.wrapping_add(1);
        self.registrations.insert(
            id,
            Registration {
                surface_id,
                queue: VecDeque::new(),
            },
        );
        id
    }

    /// Removes a registration, returning the surface it watched.
    pub(crate) fn remove(&mut self, id: ObserverId) -> Option<SurfaceId> {
        self.registrations.remove(&id).map(|r| r.surface_id)
    }

    pub(crate) fn push(&mut self, id: ObserverId, event: PendingFrameEvent) {
        if let Some(reg) = self.registrations.get_mut(&id) {
            reg.queue.push_back(event);
        }
    }

    pub(crate) fn take(&mut self, id: ObserverId) -> Vec<PendingFrameEvent> {
        match self.registrations.get_mut(&id) {
            Some(reg) => reg.queue.drain(..).collect(),
            None => Vec::new(),
        }
    }

    pub(crate) fn contains(&self, id: ObserverId) -> bool {
        self.registrations.contains_key(&id)
    }
}
