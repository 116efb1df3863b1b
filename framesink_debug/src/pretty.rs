// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Human-readable trace output.
//!
//! [`PrettyPrintSink`] implements [`TraceSink`] and writes one line per event
//! to a [`Write`](std::io::Write) destination (default: stderr). Timestamps are
//! printed in milliseconds.

use std::io::Write;

use framesink_core::id::SurfaceId;
use framesink_core::time::TimeTicks;
use framesink_core::trace::{
    ActivationCause, BeginFrameEvent, DeadlineFiredEvent, DidFinishFrameEvent,
    FrameActivatedEvent, FrameDiscardedEvent, FrameQueuedEvent, ReferenceChange,
    ReferenceChangeKind, ResourcesReturnedEvent, SurfaceCreatedEvent, SurfaceDestroyedEvent,
    TraceSink,
};

/// Writes human-readable trace lines to a [`Write`](std::io::Write) destination.
pub struct PrettyPrintSink<W: Write = Box<dyn Write>> {
    writer: W,
}

impl<W: Write> std::fmt::Debug for PrettyPrintSink<W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PrettyPrintSink").finish_non_exhaustive()
    }
}

impl PrettyPrintSink {
    /// Creates a sink that writes to stderr.
    #[must_use]
    pub fn stderr() -> Self {
        Self {
            writer: Box::new(std::io::stderr()),
        }
    }

    /// Creates a sink that writes to a boxed writer.
    #[must_use]
    pub fn new(writer: Box<dyn Write>) -> Self {
        Self { writer }
    }
}

impl<W: Write> PrettyPrintSink<W> {
    /// Creates a sink that writes to the given destination.
    #[must_use]
    pub fn with_writer(writer: W) -> Self {
        Self { writer }
    }

    /// Consumes the sink and returns its writer.
    #[must_use]
    pub fn into_inner(self) -> W {
        self.writer
    }
}

fn ms(t: TimeTicks) -> f64 {
    t.nanos() as f64 / 1_000_000.0
}

fn surface(id: SurfaceId) -> String {
    format!(
        "{}:{}/{}",
        id.frame_sink_id.client_id, id.frame_sink_id.sink_id, id.local_surface_id.local_id
    )
}

fn cause_name(cause: ActivationCause) -> &'static str {
    match cause {
        ActivationCause::Immediate => "immediate",
        ActivationCause::DependenciesResolved => "resolved",
        ActivationCause::Deadline => "deadline",
    }
}

impl<W: Write> TraceSink for PrettyPrintSink<W> {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        let verb = if e.resurrected { "resurrected" } else { "created" };
        let _ = writeln!(
            self.writer,
            "[surface:{verb}] {} at {:.3}ms",
            surface(e.surface),
            ms(e.at),
        );
    }

    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        let _ = writeln!(
            self.writer,
            "[queue] {} seq={} blocking={} at {:.3}ms",
            surface(e.surface),
            e.sequence_number,
            e.blocking,
            ms(e.at),
        );
    }

    fn on_frame_activated(&mut self, e: &FrameActivatedEvent) {
        let _ = writeln!(
            self.writer,
            "[activate] {} frame={} {} at {:.3}ms",
            surface(e.surface),
            e.frame_index,
            cause_name(e.cause),
            ms(e.at),
        );
    }

    fn on_frame_discarded(&mut self, e: &FrameDiscardedEvent) {
        let _ = writeln!(
            self.writer,
            "[discard] {} frame={} at {:.3}ms",
            surface(e.surface),
            e.frame_index,
            ms(e.at),
        );
    }

    fn on_surface_destroyed(&mut self, e: &SurfaceDestroyedEvent) {
        let _ = writeln!(
            self.writer,
            "[surface:destroyed] {} at {:.3}ms",
            surface(e.surface),
            ms(e.at),
        );
    }

    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        let _ = writeln!(
            self.writer,
            "[begin-frame] source={} seq={} observers={} at {:.3}ms",
            e.source.0,
            e.sequence_number,
            e.observers,
            ms(e.frame_time),
        );
    }

    fn on_did_finish_frame(&mut self, e: &DidFinishFrameEvent) {
        let damage = if e.has_damage { "damage" } else { "no-damage" };
        let _ = writeln!(
            self.writer,
            "[finish] sink={}:{} source={} seq={} {damage}",
            e.sink.client_id, e.sink.sink_id, e.source.0, e.sequence_number,
        );
    }

    fn on_deadline_fired(&mut self, e: &DeadlineFiredEvent) {
        let _ = writeln!(
            self.writer,
            "[deadline] pending={} activated={} at {:.3}ms",
            e.pending_surfaces,
            e.activated,
            ms(e.frame_time),
        );
    }

    fn on_resources_returned(&mut self, e: &ResourcesReturnedEvent) {
        let path = if e.with_ack { "ack" } else { "reclaim" };
        let _ = writeln!(
            self.writer,
            "[resources] sink={}:{} count={} via {path}",
            e.sink.client_id, e.sink.sink_id, e.count,
        );
    }

    fn on_reference_changes(&mut self, at: TimeTicks, changes: &[ReferenceChange]) {
        let added = changes
            .iter()
            .filter(|c| c.kind == ReferenceChangeKind::Added)
            .count();
        let _ = writeln!(
            self.writer,
            "[references] +{added} -{} at {:.3}ms",
            changes.len() - added,
            ms(at),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use framesink_core::id::{FrameSinkId, LocalSurfaceId};

    fn id() -> SurfaceId {
        SurfaceId::new(FrameSinkId::new(2, 1), LocalSurfaceId::new(4, 9))
    }

    #[test]
    fn pretty_print_activation() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        sink.on_frame_activated(&FrameActivatedEvent {
            surface: id(),
            frame_index: 3,
            cause: ActivationCause::Deadline,
            at: TimeTicks(16_000_000),
        });
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.starts_with("[activate] 2:1/4"), "got: {output}");
        assert!(output.contains("frame=3 deadline"), "got: {output}");
        assert!(output.contains("16.000ms"), "got: {output}");
    }

    #[test]
    fn pretty_print_reference_batch() {
        let mut sink = PrettyPrintSink::with_writer(Vec::<u8>::new());
        let other = SurfaceId::new(FrameSinkId::new(3, 1), LocalSurfaceId::new(1, 1));
        sink.on_reference_changes(
            TimeTicks(0),
            &[
                ReferenceChange {
                    parent: id(),
                    child: other,
                    kind: ReferenceChangeKind::Added,
                },
                ReferenceChange {
                    parent: id(),
                    child: other,
                    kind: ReferenceChangeKind::Removed,
                },
                ReferenceChange {
                    parent: other,
                    child: id(),
                    kind: ReferenceChangeKind::Added,
                },
            ],
        );
        let output = String::from_utf8(sink.into_inner()).unwrap();
        assert!(output.contains("+2 -1"), "got: {output}");
    }
}
