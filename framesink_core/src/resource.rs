// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Resources transferred from producers and their reference counting.
//!
//! A producer lends [`TransferableResource`]s with each frame. The display
//! side keeps them until no frame references them any more, then hands them
//! back as [`ReturnedResource`]s. [`SurfaceResourceHolder`] does the counting
//! for one frame sink so that a resource lent several times, or kept alive by
//! a pending and then an active frame, is returned exactly once.

use alloc::collections::BTreeMap;
use alloc::vec::Vec;

use kurbo::Size;

/// Producer-chosen resource identity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub u32);

/// GPU synchronization point. Zero means "no token".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SyncToken(pub u64);

impl SyncToken {
    /// Returns `true` if the token refers to a real fence.
    #[inline]
    #[must_use]
    pub const fn has_data(self) -> bool {
        self.0 != 0
    }

    /// Resets to the empty token.
    #[inline]
    pub fn clear(&mut self) {
        self.0 = 0;
    }
}

/// A resource lent with a frame.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TransferableResource {
    /// Resource identity.
    pub id: ResourceId,
    /// Pixel size.
    pub size: Size,
    /// Fence to wait on before reading.
    pub sync_token: SyncToken,
}

impl TransferableResource {
    /// Creates a resource without a sync token.
    #[must_use]
    pub const fn new(id: ResourceId, size: Size) -> Self {
        Self {
            id,
            size,
            sync_token: SyncToken(0),
        }
    }

    /// The return record for one lend of this resource.
    #[must_use]
    pub const fn to_returned(&self) -> ReturnedResource {
        ReturnedResource {
            id: self.id,
            sync_token: self.sync_token,
            count: 1,
            lost: false,
        }
    }
}

/// A resource handed back to its producer.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReturnedResource {
    /// Resource identity.
    pub id: ResourceId,
    /// Fence the producer must wait on before reusing the resource.
    pub sync_token: SyncToken,
    /// Number of lends this record releases.
    pub count: u32,
    /// Whether the contents were lost.
    pub lost: bool,
}

#[derive(Clone, Copy, Debug, Default)]
struct ResourceRefs {
    refs_received_from_child: u32,
    refs_holding_resource_reference: u32,
    sync_token: SyncToken,
    lost: bool,
}

/// Reference counts for the resources lent by one frame sink.
#[derive(Clone, Debug, Default)]
pub struct SurfaceResourceHolder {
    refs: BTreeMap<ResourceId, ResourceRefs>,
}

impl SurfaceResourceHolder {
    /// Creates an empty holder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records one lend (and one hold) per resource in `resources`.
    pub fn receive_from_child(&mut self, resources: &[TransferableResource]) {
        for resource in resources {
            let entry = self.refs.entry(resource.id).or_default();
            entry.refs_received_from_child += 1;
            entry.refs_holding_resource_reference += 1;
        }
    }

    /// Adds an extra hold on already received resources. Unknown ids are
    /// ignored.
    pub fn ref_resources(&mut self, resources: &[TransferableResource]) {
        for resource in resources {
            if let Some(entry) = self.refs.get_mut(&resource.id) {
                entry.refs_holding_resource_reference += 1;
            }
        }
    }

    /// Releases holds. Returns resources whose last hold was released, each
    /// counting every lend received and carrying the newest sync token.
    pub fn unref_resources(&mut self, resources: &[ReturnedResource]) -> Vec<ReturnedResource> {
        let mut available = Vec::new();
        for resource in resources {
            let Some(entry) = self.refs.get_mut(&resource.id) else {
                continue;
            };
            entry.refs_holding_resource_reference = entry
                .refs_holding_resource_reference
                .saturating_sub(resource.count);
            if resource.sync_token.has_data() {
                entry.sync_token = resource.sync_token;
            }
            entry.lost |= resource.lost;
            if entry.refs_holding_resource_reference == 0 {
                available.push(ReturnedResource {
                    id: resource.id,
                    sync_token: entry.sync_token,
                    count: entry.refs_received_from_child,
                    lost: entry.lost,
                });
                self.refs.remove(&resource.id);
            }
        }
        available
    }

    /// Number of distinct resources still held.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.refs.len()
    }
}
