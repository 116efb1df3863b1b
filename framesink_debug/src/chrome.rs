// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Chrome Trace Event Format exporter.
//!
//! [`export`] reads recorded bytes from a [`RecorderSink`](super::recorder::RecorderSink)
//! and writes [Chrome Trace Event Format][spec] JSON to the given writer.
//!
//! Surface events land on a process per frame sink client and a thread per
//! sink, so each producer gets its own track. Pacing events are global.
//!
//! [spec]: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU

use std::io::{self, Write};

use serde_json::{Value, json};

use framesink_core::id::{FrameSinkId, SurfaceId};
use framesink_core::time::TimeTicks;

use crate::recorder::{RecordedEvent, decode};

/// Exports recorded events as Chrome Trace Event Format JSON.
///
/// The output is a complete JSON array of trace event objects, suitable for
/// loading into `chrome://tracing` or [Perfetto](https://ui.perfetto.dev/).
/// Timestamps are in microseconds.
pub fn export(bytes: &[u8], writer: &mut dyn Write) -> io::Result<()> {
    let mut events: Vec<Value> = Vec::new();

    for recorded in decode(bytes) {
        match recorded {
            RecordedEvent::SurfaceCreated(e) => {
                events.push(surface_instant(
                    if e.resurrected {
                        "SurfaceResurrected"
                    } else {
                        "SurfaceCreated"
                    },
                    e.surface,
                    e.at,
                    json!({ "surface": surface_label(e.surface) }),
                ));
            }
            RecordedEvent::FrameQueued(e) => {
                events.push(surface_instant(
                    "FrameQueued",
                    e.surface,
                    e.at,
                    json!({
                        "surface": surface_label(e.surface),
                        "sequence_number": e.sequence_number,
                        "blocking": e.blocking,
                    }),
                ));
            }
            RecordedEvent::FrameActivated(e) => {
                events.push(surface_instant(
                    "FrameActivated",
                    e.surface,
                    e.at,
                    json!({
                        "surface": surface_label(e.surface),
                        "frame_index": e.frame_index,
                        "cause": format!("{:?}", e.cause),
                    }),
                ));
            }
            RecordedEvent::FrameDiscarded(e) => {
                events.push(surface_instant(
                    "FrameDiscarded",
                    e.surface,
                    e.at,
                    json!({
                        "surface": surface_label(e.surface),
                        "frame_index": e.frame_index,
                    }),
                ));
            }
            RecordedEvent::SurfaceDestroyed(e) => {
                events.push(surface_instant(
                    "SurfaceDestroyed",
                    e.surface,
                    e.at,
                    json!({ "surface": surface_label(e.surface) }),
                ));
            }
            RecordedEvent::BeginFrame(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "BeginFrame",
                    "cat": "Pacing",
                    "ts": us(e.frame_time),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "source": e.source.0,
                        "sequence_number": e.sequence_number,
                        "observers": e.observers,
                    }
                }));
            }
            RecordedEvent::DidFinishFrame(e) => {
                events.push(sink_instant(
                    "DidFinishFrame",
                    "Pacing",
                    e.sink,
                    e.at,
                    json!({
                        "source": e.source.0,
                        "sequence_number": e.sequence_number,
                        "has_damage": e.has_damage,
                    }),
                ));
            }
            RecordedEvent::DeadlineFired(e) => {
                events.push(json!({
                    "ph": "i",
                    "name": "DeadlineFired",
                    "cat": "Pacing",
                    "ts": us(e.frame_time),
                    "pid": 0,
                    "tid": 0,
                    "s": "g",
                    "args": {
                        "pending_surfaces": e.pending_surfaces,
                        "activated": e.activated,
                    }
                }));
            }
            RecordedEvent::ResourcesReturned(e) => {
                events.push(sink_instant(
                    "ResourcesReturned",
                    "Resources",
                    e.sink,
                    e.at,
                    json!({
                        "count": e.count,
                        "with_ack": e.with_ack,
                    }),
                ));
            }
            RecordedEvent::ReferenceCounts { at, added, removed } => {
                events.push(json!({
                    "ph": "i",
                    "name": "ReferenceChanges",
                    "cat": "Rich",
                    "ts": us(at),
                    "pid": 0,
                    "tid": 0,
                    "s": "p",
                    "args": {
                        "added": added,
                        "removed": removed,
                    }
                }));
            }
        }
    }

    serde_json::to_writer_pretty(writer, &events)?;
    Ok(())
}

fn us(t: TimeTicks) -> f64 {
    t.nanos() as f64 / 1000.0
}

fn surface_label(id: SurfaceId) -> String {
    format!("{id:?}")
}

fn sink_instant(name: &str, cat: &str, sink: FrameSinkId, at: TimeTicks, args: Value) -> Value {
    json!({
        "ph": "i",
        "name": name,
        "cat": cat,
        "ts": us(at),
        "pid": sink.client_id,
        "tid": sink.sink_id,
        "s": "t",
        "args": args,
    })
}

fn surface_instant(name: &str, surface: SurfaceId, at: TimeTicks, args: Value) -> Value {
    sink_instant(name, "Surface", surface.frame_sink_id, at, args)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recorder::RecorderSink;
    use framesink_core::begin_frame::{BeginFrameAck, BeginFrameSource, BeginFrameSourceId};
    use framesink_core::frame::{CompositorFrame, RenderPass, RenderPassId};
    use framesink_core::frame_sink_manager::FrameSinkManager;
    use framesink_core::id::LocalSurfaceId;
    use framesink_core::manager::SurfaceManagerConfig;
    use framesink_core::support::SupportConfig;
    use framesink_core::time::TimeDelta;
    use framesink_core::trace::{
        ActivationCause, FrameActivatedEvent, SurfaceCreatedEvent, TraceSink, Tracer,
    };
    use kurbo::Rect;

    fn export_to_values(bytes: &[u8]) -> Vec<Value> {
        let mut out = Vec::new();
        export(bytes, &mut out).unwrap();
        let json_str = String::from_utf8(out).unwrap();
        serde_json::from_str(&json_str).unwrap()
    }

    #[test]
    fn export_produces_valid_json() {
        let surface = SurfaceId::new(FrameSinkId::new(2, 5), LocalSurfaceId::new(1, 1));
        let mut rec = RecorderSink::new();
        rec.on_surface_created(&SurfaceCreatedEvent {
            surface,
            resurrected: false,
            at: TimeTicks(1_000_000),
        });
        rec.on_frame_activated(&FrameActivatedEvent {
            surface,
            frame_index: 3,
            cause: ActivationCause::Deadline,
            at: TimeTicks(2_000_000),
        });

        let parsed = export_to_values(rec.as_bytes());
        assert_eq!(parsed.len(), 2);

        assert_eq!(parsed[0]["ph"], "i");
        assert_eq!(parsed[0]["name"], "SurfaceCreated");
        assert_eq!(parsed[0]["ts"], 1000.0);
        // One track per producer.
        assert_eq!(parsed[0]["pid"], 2);
        assert_eq!(parsed[0]["tid"], 5);

        assert_eq!(parsed[1]["name"], "FrameActivated");
        assert_eq!(parsed[1]["args"]["cause"], "Deadline");
        assert_eq!(parsed[1]["args"]["frame_index"], 3);
    }

    #[test]
    fn export_empty_recording() {
        let parsed = export_to_values(&[]);
        assert!(parsed.is_empty());
    }

    #[test]
    fn export_from_a_live_manager() {
        const SOURCE: BeginFrameSourceId = BeginFrameSourceId(1);
        let sink = FrameSinkId::new(1, 1);

        let mut fsm = FrameSinkManager::new(SurfaceManagerConfig::references());
        fsm.add_begin_frame_source(BeginFrameSource::new(SOURCE, TimeDelta::from_millis(16)));
        fsm.create_compositor_frame_sink(sink, SupportConfig::root(), None)
            .unwrap();
        fsm.register_begin_frame_source(SOURCE, sink).unwrap();
        fsm.set_needs_begin_frame(sink, true).unwrap();
        let args = fsm
            .issue_begin_frame(SOURCE, TimeTicks(16_000_000))
            .unwrap()
            .unwrap();
        let frame = CompositorFrame::new(BeginFrameAck::for_args(&args, true)).with_render_pass(
            RenderPass::new(RenderPassId(1), Rect::new(0.0, 0.0, 64.0, 64.0)),
        );
        fsm.submit_compositor_frame(sink, LocalSurfaceId::new(1, 1), frame)
            .unwrap();

        let mut rec = RecorderSink::new();
        fsm.flush_trace(&mut Tracer::new(&mut rec));
        let parsed = export_to_values(rec.as_bytes());

        let names: Vec<&str> = parsed.iter().filter_map(|e| e["name"].as_str()).collect();
        let position = |name: &str| {
            names
                .iter()
                .position(|n| *n == name)
                .unwrap_or_else(|| panic!("missing {name} in {names:?}"))
        };
        assert!(position("BeginFrame") < position("SurfaceCreated"));
        assert!(position("SurfaceCreated") < position("FrameActivated"));
        assert!(names.contains(&"DidFinishFrame"), "ack recorded: {names:?}");
    }
}
