// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Tracing and diagnostics for surface lifecycle and frame pacing.
//!
//! This module provides a [`TraceSink`] trait with per-event methods covering
//! surface creation and destruction, frame queueing and activation, BeginFrame
//! dispatch, and resource return. All method bodies default to no-ops, so
//! implementing only the events you care about is fine.
//!
//! The core does not hold a sink while it mutates state. Instead the
//! [`SurfaceManager`](crate::manager::SurfaceManager) appends events to a
//! [`TraceJournal`], and
//! [`FrameSinkManager::flush_trace`](crate::frame_sink_manager::FrameSinkManager::flush_trace)
//! replays them through a [`Tracer`].
//!
//! [`Tracer`] wraps an optional `&mut dyn TraceSink`. When the `trace` feature
//! is **off**, every `Tracer` method compiles to nothing and the journal
//! records nothing. When **on**, each method performs a single `Option` branch
//! before dispatching.
//!
//! # Crate features
//!
//! - `trace`: enables the journal and the `Tracer` method bodies.
//! - `trace-rich` (implies `trace`): gates [`ReferenceChange`] events plus
//!   the corresponding `TraceSink` method.

#[cfg(feature = "trace")]
use alloc::vec::Vec;

use crate::begin_frame::BeginFrameSourceId;
use crate::id::{FrameSinkId, SurfaceId};
use crate::time::TimeTicks;

// ---------------------------------------------------------------------------
// Enums
// ---------------------------------------------------------------------------

/// Why a pending frame became active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ActivationCause {
    /// Nothing blocked the frame when it was queued.
    Immediate,
    /// The last blocking surface became available.
    DependenciesResolved,
    /// The dependency deadline forced activation.
    Deadline,
}

/// Whether a reference edge was added or removed.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ReferenceChangeKind {
    /// The edge was inserted.
    Added,
    /// The edge was removed.
    Removed,
}

// ---------------------------------------------------------------------------
// Event structs
// ---------------------------------------------------------------------------

/// Emitted when a surface is created or resurrected.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceCreatedEvent {
    /// The surface.
    pub surface: SurfaceId,
    /// `true` if a surface marked for destruction was revived.
    pub resurrected: bool,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when a frame is queued on a surface.
#[derive(Clone, Copy, Debug)]
pub struct FrameQueuedEvent {
    /// The surface.
    pub surface: SurfaceId,
    /// Frame index before activation.
    pub frame_index: u64,
    /// Number of embedded surfaces blocking the frame.
    pub blocking: u32,
    /// BeginFrame sequence number the frame answers.
    pub sequence_number: u64,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when a frame becomes active.
#[derive(Clone, Copy, Debug)]
pub struct FrameActivatedEvent {
    /// The surface.
    pub surface: SurfaceId,
    /// Frame index after activation.
    pub frame_index: u64,
    /// What activated it.
    pub cause: ActivationCause,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when a frame is released without ever being drawn.
#[derive(Clone, Copy, Debug)]
pub struct FrameDiscardedEvent {
    /// The surface.
    pub surface: SurfaceId,
    /// Frame index at release.
    pub frame_index: u64,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when a surface is garbage collected.
#[derive(Clone, Copy, Debug)]
pub struct SurfaceDestroyedEvent {
    /// The surface.
    pub surface: SurfaceId,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when a source issues a BeginFrame.
#[derive(Clone, Copy, Debug)]
pub struct BeginFrameEvent {
    /// The source.
    pub source: BeginFrameSourceId,
    /// Sequence number of the signal.
    pub sequence_number: u64,
    /// Frame time of the signal.
    pub frame_time: TimeTicks,
    /// Number of frame sinks the signal reached.
    pub observers: u32,
}

/// Emitted when a producer acknowledges a BeginFrame.
#[derive(Clone, Copy, Debug)]
pub struct DidFinishFrameEvent {
    /// The acknowledging frame sink.
    pub sink: FrameSinkId,
    /// Source of the acknowledged signal.
    pub source: BeginFrameSourceId,
    /// Sequence number acknowledged.
    pub sequence_number: u64,
    /// Whether a frame was produced.
    pub has_damage: bool,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// Emitted when the dependency deadline fires.
#[derive(Clone, Copy, Debug)]
pub struct DeadlineFiredEvent {
    /// Frame time of the BeginFrame that hit the deadline.
    pub frame_time: TimeTicks,
    /// Surfaces that were waiting.
    pub pending_surfaces: u32,
    /// Surfaces actually activated.
    pub activated: u32,
}

/// Emitted when resources are handed back to a producer.
#[derive(Clone, Copy, Debug)]
pub struct ResourcesReturnedEvent {
    /// The receiving frame sink.
    pub sink: FrameSinkId,
    /// Number of resource records.
    pub count: u32,
    /// `true` if delivered with a frame ack, `false` for a reclaim.
    pub with_ack: bool,
    /// Latest frame time known to the manager.
    pub at: TimeTicks,
}

/// A reference-graph edge change.
#[cfg(feature = "trace-rich")]
#[derive(Clone, Copy, Debug)]
pub struct ReferenceChange {
    /// The embedding surface.
    pub parent: SurfaceId,
    /// The embedded surface.
    pub child: SurfaceId,
    /// Added or removed.
    pub kind: ReferenceChangeKind,
}

// ---------------------------------------------------------------------------
// TraceSink trait
// ---------------------------------------------------------------------------

/// Receives trace events from the surface manager.
///
/// All methods have default no-op implementations, so you only need to
/// override the events you care about.
pub trait TraceSink {
    /// Called when a surface is created or resurrected.
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        _ = e;
    }

    /// Called when a frame is queued.
    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        _ = e;
    }

    /// Called when a frame activates.
    fn on_frame_activated(&mut self, e: &FrameActivatedEvent) {
        _ = e;
    }

    /// Called when a frame is released undrawn.
    fn on_frame_discarded(&mut self, e: &FrameDiscardedEvent) {
        _ = e;
    }

    /// Called when a surface is garbage collected.
    fn on_surface_destroyed(&mut self, e: &SurfaceDestroyedEvent) {
        _ = e;
    }

    /// Called when a BeginFrame is issued.
    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        _ = e;
    }

    /// Called when a producer acknowledges a BeginFrame.
    fn on_did_finish_frame(&mut self, e: &DidFinishFrameEvent) {
        _ = e;
    }

    /// Called when the dependency deadline fires.
    fn on_deadline_fired(&mut self, e: &DeadlineFiredEvent) {
        _ = e;
    }

    /// Called when resources are returned to a producer.
    fn on_resources_returned(&mut self, e: &ResourcesReturnedEvent) {
        _ = e;
    }

    /// Called with a batch of reference-graph changes (requires `trace-rich`
    /// feature).
    #[cfg(feature = "trace-rich")]
    fn on_reference_changes(&mut self, at: TimeTicks, changes: &[ReferenceChange]) {
        _ = (at, changes);
    }
}

// ---------------------------------------------------------------------------
// NoopSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that discards all events.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoopSink;

impl TraceSink for NoopSink {}

// ---------------------------------------------------------------------------
// Tracer wrapper
// ---------------------------------------------------------------------------

/// Thin wrapper around an optional [`TraceSink`].
///
/// When the `trace` feature is **off**, every method compiles to nothing. When
/// **on**, each method checks the inner `Option` (one branch) before
/// dispatching to the sink.
pub struct Tracer<'a> {
    #[cfg(feature = "trace")]
    sink: Option<&'a mut dyn TraceSink>,
    #[cfg(not(feature = "trace"))]
    _marker: core::marker::PhantomData<&'a mut dyn TraceSink>,
}

impl core::fmt::Debug for Tracer<'_> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Tracer").finish_non_exhaustive()
    }
}

macro_rules! tracer_method {
    ($(#[$doc:meta])* $name:ident, $sink_method:ident, $event:ty) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: &$event) {
            #[cfg(feature = "trace")]
            if let Some(s) = &mut self.sink {
                s.$sink_method(e);
            }
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl<'a> Tracer<'a> {
    /// Creates a tracer that dispatches to the given sink.
    #[inline]
    #[must_use]
    pub fn new(sink: &'a mut dyn TraceSink) -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: Some(sink) }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = sink;
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    /// Creates a tracer that discards all events.
    #[inline]
    #[must_use]
    pub fn none() -> Self {
        #[cfg(feature = "trace")]
        {
            Self { sink: None }
        }
        #[cfg(not(feature = "trace"))]
        {
            Self {
                _marker: core::marker::PhantomData,
            }
        }
    }

    tracer_method!(
        /// Emits a [`SurfaceCreatedEvent`].
        surface_created, on_surface_created, SurfaceCreatedEvent
    );
    tracer_method!(
        /// Emits a [`FrameQueuedEvent`].
        frame_queued, on_frame_queued, FrameQueuedEvent
    );
    tracer_method!(
        /// Emits a [`FrameActivatedEvent`].
        frame_activated, on_frame_activated, FrameActivatedEvent
    );
    tracer_method!(
        /// Emits a [`FrameDiscardedEvent`].
        frame_discarded, on_frame_discarded, FrameDiscardedEvent
    );
    tracer_method!(
        /// Emits a [`SurfaceDestroyedEvent`].
        surface_destroyed, on_surface_destroyed, SurfaceDestroyedEvent
    );
    tracer_method!(
        /// Emits a [`BeginFrameEvent`].
        begin_frame, on_begin_frame, BeginFrameEvent
    );
    tracer_method!(
        /// Emits a [`DidFinishFrameEvent`].
        did_finish_frame, on_did_finish_frame, DidFinishFrameEvent
    );
    tracer_method!(
        /// Emits a [`DeadlineFiredEvent`].
        deadline_fired, on_deadline_fired, DeadlineFiredEvent
    );
    tracer_method!(
        /// Emits a [`ResourcesReturnedEvent`].
        resources_returned, on_resources_returned, ResourcesReturnedEvent
    );

    /// Emits reference-graph changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    #[inline]
    pub fn reference_changes(&mut self, at: TimeTicks, changes: &[ReferenceChange]) {
        if let Some(s) = &mut self.sink {
            s.on_reference_changes(at, changes);
        }
    }
}

// ---------------------------------------------------------------------------
// TraceJournal
// ---------------------------------------------------------------------------

#[cfg(feature = "trace")]
#[derive(Clone, Debug)]
enum Entry {
    SurfaceCreated(SurfaceCreatedEvent),
    FrameQueued(FrameQueuedEvent),
    FrameActivated(FrameActivatedEvent),
    FrameDiscarded(FrameDiscardedEvent),
    SurfaceDestroyed(SurfaceDestroyedEvent),
    BeginFrame(BeginFrameEvent),
    DidFinishFrame(DidFinishFrameEvent),
    DeadlineFired(DeadlineFiredEvent),
    ResourcesReturned(ResourcesReturnedEvent),
    #[cfg(feature = "trace-rich")]
    References(TimeTicks, Vec<ReferenceChange>),
}

/// Deferred trace events, replayed into a [`Tracer`] on demand.
///
/// Without the `trace` feature the journal is zero-sized and every record
/// call is a no-op.
#[derive(Clone, Debug, Default)]
pub struct TraceJournal {
    #[cfg(feature = "trace")]
    entries: Vec<Entry>,
    now: TimeTicks,
}

macro_rules! journal_method {
    ($(#[$doc:meta])* $name:ident, $variant:ident, $event:ty) => {
        $(#[$doc])*
        #[inline]
        pub fn $name(&mut self, e: $event) {
            #[cfg(feature = "trace")]
            self.entries.push(Entry::$variant(e));
            #[cfg(not(feature = "trace"))]
            {
                _ = e;
            }
        }
    };
}

impl TraceJournal {
    /// Creates an empty journal.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Latest frame time, used to stamp events that have no time of their own.
    #[inline]
    #[must_use]
    pub const fn now(&self) -> TimeTicks {
        self.now
    }

    /// Advances the stamping time. Earlier times are ignored.
    #[inline]
    pub fn set_now(&mut self, now: TimeTicks) {
        self.now = self.now.max(now);
    }

    /// Number of recorded, not yet replayed events.
    #[must_use]
    pub fn len(&self) -> usize {
        #[cfg(feature = "trace")]
        {
            self.entries.len()
        }
        #[cfg(not(feature = "trace"))]
        {
            0
        }
    }

    /// Returns `true` if nothing is waiting to be replayed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    journal_method!(
        /// Records a [`SurfaceCreatedEvent`].
        surface_created, SurfaceCreated, SurfaceCreatedEvent
    );
    journal_method!(
        /// Records a [`FrameQueuedEvent`].
        frame_queued, FrameQueued, FrameQueuedEvent
    );
    journal_method!(
        /// Records a [`FrameActivatedEvent`].
        frame_activated, FrameActivated, FrameActivatedEvent
    );
    journal_method!(
        /// Records a [`FrameDiscardedEvent`].
        frame_discarded, FrameDiscarded, FrameDiscardedEvent
    );
    journal_method!(
        /// Records a [`SurfaceDestroyedEvent`].
        surface_destroyed, SurfaceDestroyed, SurfaceDestroyedEvent
    );
    journal_method!(
        /// Records a [`BeginFrameEvent`].
        begin_frame, BeginFrame, BeginFrameEvent
    );
    journal_method!(
        /// Records a [`DidFinishFrameEvent`].
        did_finish_frame, DidFinishFrame, DidFinishFrameEvent
    );
    journal_method!(
        /// Records a [`DeadlineFiredEvent`].
        deadline_fired, DeadlineFired, DeadlineFiredEvent
    );
    journal_method!(
        /// Records a [`ResourcesReturnedEvent`].
        resources_returned, ResourcesReturned, ResourcesReturnedEvent
    );

    /// Records reference-graph changes (requires `trace-rich` feature).
    #[cfg(feature = "trace-rich")]
    pub fn reference_changes(&mut self, changes: Vec<ReferenceChange>) {
        if !changes.is_empty() {
            self.entries.push(Entry::References(self.now, changes));
        }
    }

    /// Replays and clears every recorded event, oldest first.
    pub fn replay(&mut self, tracer: &mut Tracer<'_>) {
        #[cfg(feature = "trace")]
        for entry in self.entries.drain(..) {
            match entry {
                Entry::SurfaceCreated(e) => tracer.surface_created(&e),
                Entry::FrameQueued(e) => tracer.frame_queued(&e),
                Entry::FrameActivated(e) => tracer.frame_activated(&e),
                Entry::FrameDiscarded(e) => tracer.frame_discarded(&e),
                Entry::SurfaceDestroyed(e) => tracer.surface_destroyed(&e),
                Entry::BeginFrame(e) => tracer.begin_frame(&e),
                Entry::DidFinishFrame(e) => tracer.did_finish_frame(&e),
                Entry::DeadlineFired(e) => tracer.deadline_fired(&e),
                Entry::ResourcesReturned(e) => tracer.resources_returned(&e),
                #[cfg(feature = "trace-rich")]
                Entry::References(at, changes) => tracer.reference_changes(at, &changes),
            }
        }
        #[cfg(not(feature = "trace"))]
        {
            _ = tracer;
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::id::LocalSurfaceId;

    fn surface() -> SurfaceId {
        SurfaceId::new(FrameSinkId::new(1, 1), LocalSurfaceId::new(1, 1))
    }

    fn activated() -> FrameActivatedEvent {
        FrameActivatedEvent {
            surface: surface(),
            frame_index: 3,
            cause: ActivationCause::Immediate,
            at: TimeTicks(10),
        }
    }

    #[test]
    fn noop_sink_compiles() {
        let mut sink = NoopSink;
        sink.on_frame_activated(&activated());
        sink.on_deadline_fired(&DeadlineFiredEvent {
            frame_time: TimeTicks(0),
            pending_surfaces: 1,
            activated: 1,
        });
    }

    #[test]
    fn tracer_none_does_nothing() {
        let mut tracer = Tracer::none();
        tracer.frame_activated(&activated());
        let mut journal = TraceJournal::new();
        journal.frame_activated(activated());
        journal.replay(&mut tracer);
        assert!(journal.is_empty(), "replay drains the journal");
    }

    #[test]
    fn journal_time_never_goes_backwards() {
        let mut journal = TraceJournal::new();
        journal.set_now(TimeTicks(50));
        journal.set_now(TimeTicks(20));
        assert_eq!(journal.now(), TimeTicks(50));
    }

    #[cfg(feature = "trace")]
    #[test]
    fn journal_replays_in_order() {
        use alloc::vec::Vec;

        struct RecordingSink {
            seen: Vec<&'static str>,
        }
        impl TraceSink for RecordingSink {
            fn on_surface_created(&mut self, _: &SurfaceCreatedEvent) {
                self.seen.push("created");
            }
            fn on_frame_activated(&mut self, _: &FrameActivatedEvent) {
                self.seen.push("activated");
            }
        }

        let mut journal = TraceJournal::new();
        journal.surface_created(SurfaceCreatedEvent {
            surface: surface(),
            resurrected: false,
            at: TimeTicks(0),
        });
        journal.frame_activated(activated());
        assert_eq!(journal.len(), 2);

        let mut sink = RecordingSink { seen: Vec::new() };
        let mut tracer = Tracer::new(&mut sink);
        journal.replay(&mut tracer);
        drop(tracer);
        assert_eq!(sink.seen, ["created", "activated"]);
        assert!(journal.is_empty());
    }
}
