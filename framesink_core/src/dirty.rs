// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Damage-tracking channel.
//!
//! Surface damage uses [`understory_dirty`] over per-surface slots. Every
//! reference edge `parent → child` is a dependency edge from `parent` to
//! `child` on [`DAMAGE`], so marking a child with
//! [`EagerPolicy`](understory_dirty::EagerPolicy) also marks every surface that
//! embeds it, transitively.
//!
//! Only activations mark damage. A frame that stays pending changes nothing a
//! display could draw.

use understory_dirty::Channel;

/// A surface's drawable content changed; propagates to embedders.
pub const DAMAGE: Channel = Channel::new(0);
