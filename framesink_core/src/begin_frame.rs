// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! BeginFrame pacing signals.
//!
//! A [`BeginFrameSource`] emits [`BeginFrameArgs`] with increasing sequence
//! numbers to the frame sinks observing it. Each producer answers with a
//! [`BeginFrameAck`] (carried in its next frame's metadata, or sent through
//! `begin_frame_did_not_swap`) so the source knows whether the signal produced
//! damage.
//!
//! Sources do not hold observer objects. They keep a registration table of
//! [`FrameSinkId`]s, and the owning
//! [`FrameSinkManager`](crate::frame_sink_manager::FrameSinkManager) routes
//! each emitted signal to the matching [`BeginFrameObserver`].

use alloc::collections::{BTreeMap, BTreeSet};
use core::fmt;

use crate::id::FrameSinkId;
use crate::time::{TimeDelta, TimeTicks};

/// Identity of a begin-frame source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BeginFrameSourceId(pub u32);

impl fmt::Debug for BeginFrameSourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BeginFrameSourceId({})", self.0)
    }
}

/// One pacing signal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeginFrameArgs {
    /// The emitting source.
    pub source_id: BeginFrameSourceId,
    /// Strictly increasing per source, starting at
    /// [`STARTING_FRAME_NUMBER`](Self::STARTING_FRAME_NUMBER).
    pub sequence_number: u64,
    /// Time the frame nominally begins.
    pub frame_time: TimeTicks,
    /// Latest time a producer should submit for this frame.
    pub deadline: TimeTicks,
    /// Nominal spacing between signals.
    pub interval: TimeDelta,
}

impl BeginFrameArgs {
    /// The first valid sequence number. Anything lower is invalid input.
    pub const STARTING_FRAME_NUMBER: u64 = 1;
}

/// A producer's response to a [`BeginFrameArgs`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BeginFrameAck {
    /// Source of the signal being acknowledged.
    pub source_id: BeginFrameSourceId,
    /// Sequence number being acknowledged.
    pub sequence_number: u64,
    /// Newest sequence whose effects are included in the frame.
    pub latest_confirmed_sequence_number: u64,
    /// Whether the producer produced a frame for this signal.
    pub has_damage: bool,
}

impl BeginFrameAck {
    /// Creates an ack that confirms up to its own sequence number.
    #[inline]
    #[must_use]
    pub const fn new(
        source_id: BeginFrameSourceId,
        sequence_number: u64,
        has_damage: bool,
    ) -> Self {
        Self {
            source_id,
            sequence_number,
            latest_confirmed_sequence_number: sequence_number,
            has_damage,
        }
    }

    /// Creates the ack a producer sends for a received signal.
    #[inline]
    #[must_use]
    pub const fn for_args(args: &BeginFrameArgs, has_damage: bool) -> Self {
        Self::new(args.source_id, args.sequence_number, has_damage)
    }
}

/// Receives pacing signals.
pub trait BeginFrameObserver {
    /// Called with each signal of the observed source.
    fn on_begin_frame(&mut self, args: &BeginFrameArgs);

    /// Called when the observed source pauses or resumes.
    fn on_begin_frame_source_paused_changed(&mut self, paused: bool) {
        _ = paused;
    }

    /// The most recent signal this observer handled.
    fn last_used_begin_frame_args(&self) -> Option<&BeginFrameArgs>;
}

/// A pacing source with a registration table of observing frame sinks.
#[derive(Clone, Debug)]
pub struct BeginFrameSource {
    id: BeginFrameSourceId,
    interval: TimeDelta,
    next_sequence: u64,
    paused: bool,
    observers: BTreeSet<FrameSinkId>,
    last_acks: BTreeMap<FrameSinkId, BeginFrameAck>,
}

impl BeginFrameSource {
    /// Creates a source emitting every `interval`.
    #[must_use]
    pub fn new(id: BeginFrameSourceId, interval: TimeDelta) -> Self {
        Self {
            id,
            interval,
            next_sequence: BeginFrameArgs::STARTING_FRAME_NUMBER,
            paused: false,
            observers: BTreeSet::new(),
            last_acks: BTreeMap::new(),
        }
    }

    /// The source's identity.
    #[inline]
    #[must_use]
    pub const fn id(&self) -> BeginFrameSourceId {
        self.id
    }

    /// Nominal spacing between signals.
    #[inline]
    #[must_use]
    pub const fn interval(&self) -> TimeDelta {
        self.interval
    }

    /// Whether the source is paused.
    #[inline]
    #[must_use]
    pub const fn paused(&self) -> bool {
        self.paused
    }

    /// Registers an observer. Returns `false` if it was already registered.
    pub fn add_observer(&mut self, sink: FrameSinkId) -> bool {
        self.observers.insert(sink)
    }

    /// Unregisters an observer and forgets its last ack.
    pub fn remove_observer(&mut self, sink: FrameSinkId) -> bool {
        self.last_acks.remove(&sink);
        self.observers.remove(&sink)
    }

    /// Returns `true` if `sink` is registered.
    #[must_use]
    pub fn has_observer(&self, sink: FrameSinkId) -> bool {
        self.observers.contains(&sink)
    }

    /// Registered observers in id order.
    pub fn observers(&self) -> impl Iterator<Item = FrameSinkId> + '_ {
        self.observers.iter().copied()
    }

    /// Number of registered observers.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Records a producer's ack.
    pub fn did_finish_frame(&mut self, sink: FrameSinkId, ack: BeginFrameAck) {
        self.last_acks.insert(sink, ack);
    }

    /// The newest ack received from `sink`.
    #[must_use]
    pub fn last_ack_for_observer(&self, sink: FrameSinkId) -> Option<&BeginFrameAck> {
        self.last_acks.get(&sink)
    }

    /// Pauses or resumes the source. Returns `true` if the state changed.
    pub fn set_paused(&mut self, paused: bool) -> bool {
        let changed = self.paused != paused;
        self.paused = paused;
        changed
    }

    /// Produces the next signal for `frame_time`.
    pub fn next_args(&mut self, frame_time: TimeTicks) -> BeginFrameArgs {
        let sequence_number = self.next_sequence;
        self.next_sequence = self.next_sequence.saturating_add(1);
        BeginFrameArgs {
            source_id: self.id,
            sequence_number,
            frame_time,
            deadline: frame_time + self.interval,
            interval: self.interval,
        }
    }
}
