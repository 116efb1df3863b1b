// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Per-producer diff of referenced surfaces between frames.

use alloc::collections::BTreeSet;
use alloc::vec::Vec;

use crate::id::{FrameSinkId, LocalSurfaceId, SurfaceId, SurfaceReference};

/// Tracks the surfaces referenced by a producer's active frame and computes
/// the reference edges to add and remove when that set changes.
///
/// When the producer moves to a new local surface id, all references of the
/// new surface are added and none removed: edges from the old surface vanish
/// with it.
#[derive(Clone, Debug)]
pub struct ReferencedSurfaceTracker {
    frame_sink_id: FrameSinkId,
    current_surface_id: SurfaceId,
    referenced_surfaces: BTreeSet<SurfaceId>,
    references_to_add: Vec<SurfaceReference>,
    references_to_remove: Vec<SurfaceReference>,
}

impl ReferencedSurfaceTracker {
    /// Creates a tracker for `frame_sink_id` with no current surface.
    #[must_use]
    pub fn new(frame_sink_id: FrameSinkId) -> Self {
        Self {
            frame_sink_id,
            current_surface_id: SurfaceId::new(frame_sink_id, LocalSurfaceId::default()),
            referenced_surfaces: BTreeSet::new(),
            references_to_add: Vec::new(),
            references_to_remove: Vec::new(),
        }
    }

    /// The surface the current reference set belongs to.
    #[inline]
    #[must_use]
    pub const fn current_surface_id(&self) -> SurfaceId {
        self.current_surface_id
    }

    /// Edges computed by the last update that should be added.
    #[must_use]
    pub fn references_to_add(&self) -> &[SurfaceReference] {
        &self.references_to_add
    }

    /// Edges computed by the last update that should be removed.
    #[must_use]
    pub fn references_to_remove(&self) -> &[SurfaceReference] {
        &self.references_to_remove
    }

    /// Recomputes both edge lists for `new_local_surface_id` whose active
    /// frame references `active_referenced_surfaces` (`None` meaning none).
    pub fn update_references(
        &mut self,
        new_local_surface_id: LocalSurfaceId,
        active_referenced_surfaces: Option<&[SurfaceId]>,
    ) {
        let new_referenced: BTreeSet<SurfaceId> = active_referenced_surfaces
            .unwrap_or_default()
            .iter()
            .copied()
            .collect();

        self.references_to_add.clear();
        self.references_to_remove.clear();

        let surface_id_changed = self.current_surface_id.local_surface_id != new_local_surface_id
            || !self.current_surface_id.is_valid();
        self.current_surface_id = SurfaceId::new(self.frame_sink_id, new_local_surface_id);
        let parent = self.current_surface_id;

        if surface_id_changed {
            self.references_to_add = new_referenced
                .iter()
                .map(|&child| SurfaceReference::new(parent, child))
                .collect();
        } else {
            self.references_to_remove = self
                .referenced_surfaces
                .difference(&new_referenced)
                .map(|&child| SurfaceReference::new(parent, child))
                .collect();
            self.references_to_add = new_referenced
                .difference(&self.referenced_surfaces)
                .map(|&child| SurfaceReference::new(parent, child))
                .collect();
        }

        self.referenced_surfaces = new_referenced;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SINK: FrameSinkId = FrameSinkId::new(1, 1);

    fn local(n: u32) -> LocalSurfaceId {
        LocalSurfaceId::new(n, 5)
    }

    fn child(n: u32) -> SurfaceId {
        SurfaceId::new(FrameSinkId::new(2, n), local(1))
    }

    fn children(refs: &[SurfaceReference]) -> Vec<SurfaceId> {
        refs.iter().map(|r| r.child).collect()
    }

    #[test]
    fn first_update_adds_everything() {
        let mut t = ReferencedSurfaceTracker::new(SINK);
        t.update_references(local(1), Some(&[child(1), child(2)]));
        assert_eq!(children(t.references_to_add()), [child(1), child(2)]);
        assert!(t.references_to_remove().is_empty());
        assert_eq!(t.current_surface_id(), SurfaceId::new(SINK, local(1)));
    }

    #[test]
    fn same_id_produces_delta() {
        let a = child(1);
        let b = child(2);
        let c = child(3);
        let mut t = ReferencedSurfaceTracker::new(SINK);
        t.update_references(local(1), Some(&[a, b]));
        t.update_references(local(1), Some(&[b, c]));
        assert_eq!(children(t.references_to_add()), [c]);
        assert_eq!(children(t.references_to_remove()), [a]);
    }

    #[test]
    fn new_id_adds_all_and_removes_none() {
        let mut t = ReferencedSurfaceTracker::new(SINK);
        t.update_references(local(1), Some(&[child(1)]));
        t.update_references(local(2), Some(&[child(1), child(2)]));
        assert_eq!(children(t.references_to_add()), [child(1), child(2)]);
        assert!(t.references_to_remove().is_empty());
        assert!(
            t.references_to_add()
                .iter()
                .all(|r| r.parent == SurfaceId::new(SINK, local(2))),
            "edges start at the new surface"
        );
    }

    #[test]
    fn none_means_no_references() {
        let mut t = ReferencedSurfaceTracker::new(SINK);
        t.update_references(local(1), Some(&[child(1)]));
        t.update_references(local(1), None);
        assert!(t.references_to_add().is_empty());
        assert_eq!(children(t.references_to_remove()), [child(1)]);
    }

    #[test]
    fn unchanged_set_clears_lists() {
        let mut t = ReferencedSurfaceTracker::new(SINK);
        t.update_references(local(1), Some(&[child(1)]));
        t.update_references(local(1), Some(&[child(1)]));
        assert!(t.references_to_add().is_empty());
        assert!(t.references_to_remove().is_empty());
    }
}
