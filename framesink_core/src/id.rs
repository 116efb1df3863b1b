// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Frame sink and surface identities.
//!
//! A [`FrameSinkId`] names a producer. Each producer mints its own
//! [`LocalSurfaceId`]s; the pair forms a [`SurfaceId`], the vertex identity
//! of the reference graph. All identities are plain `Copy` values with a total
//! order so that maps and sets over them iterate deterministically.

use core::fmt;

/// Opaque identity of a frame producer.
///
/// The `client_id` half normally identifies the producing process or
/// component and `sink_id` a sink within it. Core code only compares them.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct FrameSinkId {
    /// Client half of the identity.
    pub client_id: u32,
    /// Per-client sink index.
    pub sink_id: u32,
}

impl FrameSinkId {
    /// Creates a frame sink id.
    #[inline]
    #[must_use]
    pub const fn new(client_id: u32, sink_id: u32) -> Self {
        Self { client_id, sink_id }
    }

    /// Returns `true` unless both halves are zero.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.client_id != 0 || self.sink_id != 0
    }
}

impl fmt::Debug for FrameSinkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FrameSinkId({}, {})", self.client_id, self.sink_id)
    }
}

/// Producer-local surface identity.
///
/// `local_id` increases whenever the producer needs a new surface (for
/// example on resize). `nonce` is the submission generation: two ids with the
/// same `local_id` but different nonces are different surfaces.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct LocalSurfaceId {
    /// Monotonic per-producer counter.
    pub local_id: u32,
    /// Generation token.
    pub nonce: u64,
}

impl LocalSurfaceId {
    /// Creates a local surface id.
    #[inline]
    #[must_use]
    pub const fn new(local_id: u32, nonce: u64) -> Self {
        Self { local_id, nonce }
    }

    /// Returns `true` if both the counter and the nonce are non-zero.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.local_id != 0 && self.nonce != 0
    }
}

impl fmt::Debug for LocalSurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LocalSurfaceId({}, {:#x})", self.local_id, self.nonce)
    }
}

/// Globally unique surface identity.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct SurfaceId {
    /// The producer that owns the surface.
    pub frame_sink_id: FrameSinkId,
    /// The producer-local part.
    pub local_surface_id: LocalSurfaceId,
}

impl SurfaceId {
    /// Creates a surface id.
    #[inline]
    #[must_use]
    pub const fn new(frame_sink_id: FrameSinkId, local_surface_id: LocalSurfaceId) -> Self {
        Self {
            frame_sink_id,
            local_surface_id,
        }
    }

    /// Returns `true` if both halves are valid.
    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.frame_sink_id.is_valid() && self.local_surface_id.is_valid()
    }
}

impl fmt::Debug for SurfaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SurfaceId({}:{}, {})",
            self.frame_sink_id.client_id, self.frame_sink_id.sink_id, self.local_surface_id.local_id
        )
    }
}

/// A directed embedding edge: `parent` keeps `child` alive.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceReference {
    /// The embedding surface (or the manager's root).
    pub parent: SurfaceId,
    /// The embedded surface.
    pub child: SurfaceId,
}

impl SurfaceReference {
    /// Creates a reference from `parent` to `child`.
    #[inline]
    #[must_use]
    pub const fn new(parent: SurfaceId, child: SurfaceId) -> Self {
        Self { parent, child }
    }
}

/// A destruction-dependency token.
///
/// A consumer that still needs a surface's resources attaches a sequence to
/// it; the surface is not reclaimed until the sequence is satisfied or the
/// consumer's frame sink is invalidated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SurfaceSequence {
    /// The consumer that issued the token.
    pub frame_sink_id: FrameSinkId,
    /// Consumer-local sequence number.
    pub sequence: u32,
}

impl SurfaceSequence {
    /// Creates a sequence token.
    #[inline]
    #[must_use]
    pub const fn new(frame_sink_id: FrameSinkId, sequence: u32) -> Self {
        Self {
            frame_sink_id,
            sequence,
        }
    }
}

/// Mints increasing [`LocalSurfaceId`]s for one producer.
///
/// Every id shares the allocator's nonce, so ids from two allocators seeded
/// differently never collide.
#[derive(Clone, Debug)]
pub struct LocalSurfaceIdAllocator {
    next_id: u32,
    nonce: u64,
}

impl LocalSurfaceIdAllocator {
    /// Creates an allocator whose ids carry `nonce`.
    ///
    /// # Panics
    ///
    /// Panics if `nonce` is zero, since that would produce invalid ids.
    #[must_use]
    pub fn new(nonce: u64) -> Self {
        assert!(nonce != 0, "LocalSurfaceId nonce must be non-zero");
        Self { next_id: 1, nonce }
    }

    /// Returns the next id.
    pub fn generate(&mut self) -> LocalSurfaceId {
        let id = LocalSurfaceId::new(self.next_id, self.nonce);
        self.next_id = self.next_id.wrapping_add(1).max(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity() {
        assert!(!FrameSinkId::default().is_valid());
        assert!(FrameSinkId::new(0, 1).is_valid());
        assert!(!LocalSurfaceId::new(1, 0).is_valid());
        assert!(!LocalSurfaceId::new(0, 7).is_valid());
        let id = SurfaceId::new(FrameSinkId::new(1, 1), LocalSurfaceId::new(1, 7));
        assert!(id.is_valid());
    }

    #[test]
    fn allocator_is_monotonic() {
        let mut alloc = LocalSurfaceIdAllocator::new(9);
        let a = alloc.generate();
        let b = alloc.generate();
        assert!(b > a, "later ids must sort after earlier ones");
        assert_eq!(a.nonce, 9);
        assert_eq!(b.local_id, 2);
    }

    #[test]
    #[should_panic(expected = "nonce must be non-zero")]
    fn allocator_rejects_zero_nonce() {
        let _ = LocalSurfaceIdAllocator::new(0);
    }

    #[test]
    fn ordering_groups_by_frame_sink() {
        let a = SurfaceId::new(FrameSinkId::new(1, 1), LocalSurfaceId::new(5, 1));
        let b = SurfaceId::new(FrameSinkId::new(1, 2), LocalSurfaceId::new(1, 1));
        assert!(a < b, "frame sink id is the primary sort key");
    }
}
