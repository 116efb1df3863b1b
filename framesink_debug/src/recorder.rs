// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compact binary event recording and decoding.
//!
//! [`RecorderSink`] implements [`TraceSink`] and encodes events into a
//! `Vec<u8>` as fixed-size little-endian records. [`decode`] reads them back
//! as an iterator of [`RecordedEvent`].
//!
//! Reference-change batches ([`on_reference_changes`](TraceSink::on_reference_changes))
//! store only the added and removed counts.

use framesink_core::begin_frame::BeginFrameSourceId;
use framesink_core::id::{FrameSinkId, LocalSurfaceId, SurfaceId};
use framesink_core::time::TimeTicks;
use framesink_core::trace::{
    ActivationCause, BeginFrameEvent, DeadlineFiredEvent, DidFinishFrameEvent,
    FrameActivatedEvent, FrameDiscardedEvent, FrameQueuedEvent, ReferenceChange,
    ReferenceChangeKind, ResourcesReturnedEvent, SurfaceCreatedEvent, SurfaceDestroyedEvent,
    TraceSink,
};

// ---------------------------------------------------------------------------
// Event type discriminants
// ---------------------------------------------------------------------------

const TAG_SURFACE_CREATED: u8 = 1;
const TAG_FRAME_QUEUED: u8 = 2;
const TAG_FRAME_ACTIVATED: u8 = 3;
const TAG_FRAME_DISCARDED: u8 = 4;
const TAG_SURFACE_DESTROYED: u8 = 5;
const TAG_BEGIN_FRAME: u8 = 6;
const TAG_DID_FINISH_FRAME: u8 = 7;
const TAG_DEADLINE_FIRED: u8 = 8;
const TAG_RESOURCES_RETURNED: u8 = 9;
const TAG_REFERENCE_COUNTS: u8 = 10;

// ---------------------------------------------------------------------------
// RecorderSink
// ---------------------------------------------------------------------------

/// A [`TraceSink`] that encodes events into a compact binary buffer.
#[derive(Debug, Default)]
pub struct RecorderSink {
    buf: Vec<u8>,
}

impl RecorderSink {
    /// Creates an empty recorder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a view of the recorded bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.buf
    }

    /// Consumes the recorder and returns the recorded bytes.
    #[must_use]
    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }

    // -- encoding helpers --------------------------------------------------

    fn write_u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn write_u32(&mut self, v: u32) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_u64(&mut self, v: u64) {
        self.buf.extend_from_slice(&v.to_le_bytes());
    }

    fn write_bool(&mut self, v: bool) {
        self.write_u8(u8::from(v));
    }

    fn write_time(&mut self, t: TimeTicks) {
        self.write_u64(t.nanos());
    }

    fn write_sink(&mut self, id: FrameSinkId) {
        self.write_u32(id.client_id);
        self.write_u32(id.sink_id);
    }

    fn write_surface(&mut self, id: SurfaceId) {
        self.write_sink(id.frame_sink_id);
        self.write_u32(id.local_surface_id.local_id);
        self.write_u64(id.local_surface_id.nonce);
    }

    fn write_cause(&mut self, c: ActivationCause) {
        self.write_u8(match c {
            ActivationCause::Immediate => 0,
            ActivationCause::DependenciesResolved => 1,
            ActivationCause::Deadline => 2,
        });
    }
}

fn saturating_count(n: usize) -> u32 {
    u32::try_from(n).unwrap_or(u32::MAX)
}

impl TraceSink for RecorderSink {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        self.write_u8(TAG_SURFACE_CREATED);
        self.write_surface(e.surface);
        self.write_bool(e.resurrected);
        self.write_time(e.at);
    }

    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        self.write_u8(TAG_FRAME_QUEUED);
        self.write_surface(e.surface);
        self.write_u64(e.frame_index);
        self.write_u32(e.blocking);
        self.write_u64(e.sequence_number);
        self.write_time(e.at);
    }

    fn on_frame_activated(&mut self, e: &FrameActivatedEvent) {
        self.write_u8(TAG_FRAME_ACTIVATED);
        self.write_surface(e.surface);
        self.write_u64(e.frame_index);
        self.write_cause(e.cause);
        self.write_time(e.at);
    }

    fn on_frame_discarded(&mut self, e: &FrameDiscardedEvent) {
        self.write_u8(TAG_FRAME_DISCARDED);
        self.write_surface(e.surface);
        self.write_u64(e.frame_index);
        self.write_time(e.at);
    }

    fn on_surface_destroyed(&mut self, e: &SurfaceDestroyedEvent) {
        self.write_u8(TAG_SURFACE_DESTROYED);
        self.write_surface(e.surface);
        self.write_time(e.at);
    }

    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        self.write_u8(TAG_BEGIN_FRAME);
        self.write_u32(e.source.0);
        self.write_u64(e.sequence_number);
        self.write_time(e.frame_time);
        self.write_u32(e.observers);
    }

    fn on_did_finish_frame(&mut self, e: &DidFinishFrameEvent) {
        self.write_u8(TAG_DID_FINISH_FRAME);
        self.write_sink(e.sink);
        self.write_u32(e.source.0);
        self.write_u64(e.sequence_number);
        self.write_bool(e.has_damage);
        self.write_time(e.at);
    }

    fn on_deadline_fired(&mut self, e: &DeadlineFiredEvent) {
        self.write_u8(TAG_DEADLINE_FIRED);
        self.write_time(e.frame_time);
        self.write_u32(e.pending_surfaces);
        self.write_u32(e.activated);
    }

    fn on_resources_returned(&mut self, e: &ResourcesReturnedEvent) {
        self.write_u8(TAG_RESOURCES_RETURNED);
        self.write_sink(e.sink);
        self.write_u32(e.count);
        self.write_bool(e.with_ack);
        self.write_time(e.at);
    }

    fn on_reference_changes(&mut self, at: TimeTicks, changes: &[ReferenceChange]) {
        let added = changes
            .iter()
            .filter(|c| c.kind == ReferenceChangeKind::Added)
            .count();
        self.write_u8(TAG_REFERENCE_COUNTS);
        self.write_time(at);
        self.write_u32(saturating_count(added));
        self.write_u32(saturating_count(changes.len() - added));
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

/// A decoded event from a binary recording.
#[derive(Clone, Debug)]
pub enum RecordedEvent {
    /// A [`SurfaceCreatedEvent`].
    SurfaceCreated(SurfaceCreatedEvent),
    /// A [`FrameQueuedEvent`].
    FrameQueued(FrameQueuedEvent),
    /// A [`FrameActivatedEvent`].
    FrameActivated(FrameActivatedEvent),
    /// A [`FrameDiscardedEvent`].
    FrameDiscarded(FrameDiscardedEvent),
    /// A [`SurfaceDestroyedEvent`].
    SurfaceDestroyed(SurfaceDestroyedEvent),
    /// A [`BeginFrameEvent`].
    BeginFrame(BeginFrameEvent),
    /// A [`DidFinishFrameEvent`].
    DidFinishFrame(DidFinishFrameEvent),
    /// A [`DeadlineFiredEvent`].
    DeadlineFired(DeadlineFiredEvent),
    /// A [`ResourcesReturnedEvent`].
    ResourcesReturned(ResourcesReturnedEvent),
    /// Sizes of one reference-change batch.
    ReferenceCounts {
        /// Latest frame time when the batch was recorded.
        at: TimeTicks,
        /// Edges added.
        added: u32,
        /// Edges removed.
        removed: u32,
    },
}

/// Decodes a byte slice produced by [`RecorderSink`] into an iterator of
/// [`RecordedEvent`].
pub fn decode(bytes: &[u8]) -> DecodeIter<'_> {
    DecodeIter {
        data: bytes,
        pos: 0,
    }
}

/// Iterator over decoded events.
#[derive(Debug)]
pub struct DecodeIter<'a> {
    data: &'a [u8],
    pos: usize,
}

impl DecodeIter<'_> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn read_u8(&mut self) -> Option<u8> {
        if self.remaining() < 1 {
            return None;
        }
        let v = self.data[self.pos];
        self.pos += 1;
        Some(v)
    }

    fn read_u32(&mut self) -> Option<u32> {
        if self.remaining() < 4 {
            return None;
        }
        let v = u32::from_le_bytes(self.data[self.pos..self.pos + 4].try_into().ok()?);
        self.pos += 4;
        Some(v)
    }

    fn read_u64(&mut self) -> Option<u64> {
        if self.remaining() < 8 {
            return None;
        }
        let v = u64::from_le_bytes(self.data[self.pos..self.pos + 8].try_into().ok()?);
        self.pos += 8;
        Some(v)
    }

    fn read_bool(&mut self) -> Option<bool> {
        Some(self.read_u8()? != 0)
    }

    fn read_time(&mut self) -> Option<TimeTicks> {
        self.read_u64().map(TimeTicks)
    }

    fn read_sink(&mut self) -> Option<FrameSinkId> {
        Some(FrameSinkId::new(self.read_u32()?, self.read_u32()?))
    }

    fn read_surface(&mut self) -> Option<SurfaceId> {
        let sink = self.read_sink()?;
        let local = LocalSurfaceId::new(self.read_u32()?, self.read_u64()?);
        Some(SurfaceId::new(sink, local))
    }

    fn read_cause(&mut self) -> Option<ActivationCause> {
        Some(match self.read_u8()? {
            0 => ActivationCause::Immediate,
            1 => ActivationCause::DependenciesResolved,
            _ => ActivationCause::Deadline,
        })
    }

    fn decode_surface_created(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SurfaceCreated(SurfaceCreatedEvent {
            surface: self.read_surface()?,
            resurrected: self.read_bool()?,
            at: self.read_time()?,
        }))
    }

    fn decode_frame_queued(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameQueued(FrameQueuedEvent {
            surface: self.read_surface()?,
            frame_index: self.read_u64()?,
            blocking: self.read_u32()?,
            sequence_number: self.read_u64()?,
            at: self.read_time()?,
        }))
    }

    fn decode_frame_activated(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameActivated(FrameActivatedEvent {
            surface: self.read_surface()?,
            frame_index: self.read_u64()?,
            cause: self.read_cause()?,
            at: self.read_time()?,
        }))
    }

    fn decode_frame_discarded(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::FrameDiscarded(FrameDiscardedEvent {
            surface: self.read_surface()?,
            frame_index: self.read_u64()?,
            at: self.read_time()?,
        }))
    }

    fn decode_surface_destroyed(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::SurfaceDestroyed(SurfaceDestroyedEvent {
            surface: self.read_surface()?,
            at: self.read_time()?,
        }))
    }

    fn decode_begin_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::BeginFrame(BeginFrameEvent {
            source: BeginFrameSourceId(self.read_u32()?),
            sequence_number: self.read_u64()?,
            frame_time: self.read_time()?,
            observers: self.read_u32()?,
        }))
    }

    fn decode_did_finish_frame(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DidFinishFrame(DidFinishFrameEvent {
            sink: self.read_sink()?,
            source: BeginFrameSourceId(self.read_u32()?),
            sequence_number: self.read_u64()?,
            has_damage: self.read_bool()?,
            at: self.read_time()?,
        }))
    }

    fn decode_deadline_fired(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::DeadlineFired(DeadlineFiredEvent {
            frame_time: self.read_time()?,
            pending_surfaces: self.read_u32()?,
            activated: self.read_u32()?,
        }))
    }

    fn decode_resources_returned(&mut self) -> Option<RecordedEvent> {
        Some(RecordedEvent::ResourcesReturned(ResourcesReturnedEvent {
            sink: self.read_sink()?,
            count: self.read_u32()?,
            with_ack: self.read_bool()?,
            at: self.read_time()?,
        }))
    }

    fn decode_reference_counts(&mut self) -> Option<RecordedEvent> {
        let at = self.read_time()?;
        let added = self.read_u32()?;
        let removed = self.read_u32()?;
        Some(RecordedEvent::ReferenceCounts { at, added, removed })
    }
}

impl Iterator for DecodeIter<'_> {
    type Item = RecordedEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let tag = self.read_u8()?;
        match tag {
            TAG_SURFACE_CREATED => self.decode_surface_created(),
            TAG_FRAME_QUEUED => self.decode_frame_queued(),
            TAG_FRAME_ACTIVATED => self.decode_frame_activated(),
            TAG_FRAME_DISCARDED => self.decode_frame_discarded(),
            TAG_SURFACE_DESTROYED => self.decode_surface_destroyed(),
            TAG_BEGIN_FRAME => self.decode_begin_frame(),
            TAG_DID_FINISH_FRAME => self.decode_did_finish_frame(),
            TAG_DEADLINE_FIRED => self.decode_deadline_fired(),
            TAG_RESOURCES_RETURNED => self.decode_resources_returned(),
            TAG_REFERENCE_COUNTS => self.decode_reference_counts(),
            _ => None, // unknown tag → stop iteration
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
