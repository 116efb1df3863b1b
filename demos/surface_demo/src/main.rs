// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Simulated display/parent/child embedding driven by BeginFrames.
//!
//! Three producers share one BeginFrame source. The display embeds the
//! parent, the parent embeds the child, and the child only starts producing
//! frames after a while, so the parent's frames wait on it until the
//! dependency deadline forces them through. Midway the parent resizes and
//! moves to a new surface, which lets the old one be garbage collected.
//! An overlay scrollbar on the parent's content fades in and out on the same
//! clock.
//!
//! Events go to a [`PrettyPrintSink`] on stdout and a [`RecorderSink`]; the
//! recording is exported as `surface_trace.json` in Chrome trace format.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::BufWriter;
use std::ops::Range;
use std::rc::Rc;

use framesink_core::begin_frame::{
    BeginFrameAck, BeginFrameArgs, BeginFrameSource, BeginFrameSourceId,
};
use framesink_core::dependency::DependencyTrackerConfig;
use framesink_core::frame::{CompositorFrame, RenderPass, RenderPassId};
use framesink_core::frame_sink_manager::FrameSinkManager;
use framesink_core::id::{FrameSinkId, LocalSurfaceId, LocalSurfaceIdAllocator, SurfaceId};
use framesink_core::manager::{SurfaceManager, SurfaceManagerConfig};
use framesink_core::resource::{ResourceId, ReturnedResource, TransferableResource};
use framesink_core::support::{CompositorFrameSinkSupportClient, SupportConfig};
use framesink_core::time::{TimeDelta, TimeTicks};
use framesink_core::trace::{
    BeginFrameEvent, DeadlineFiredEvent, DidFinishFrameEvent, FrameActivatedEvent,
    FrameDiscardedEvent, FrameQueuedEvent, ReferenceChange, ResourcesReturnedEvent,
    SurfaceCreatedEvent, SurfaceDestroyedEvent, TraceSink, Tracer,
};
use framesink_debug::pretty::PrettyPrintSink;
use framesink_debug::recorder::RecorderSink;
use framesink_scrollbar::client::{
    DelayedAnimationTask, ElementId, ScrollbarAnimationControllerClient, ScrollbarLayer,
    ScrollbarOrientation,
};
use framesink_scrollbar::config::ScrollbarAnimationConfig;
use framesink_scrollbar::controller::ScrollbarAnimationController;
use kurbo::{Rect, Size};

const SOURCE: BeginFrameSourceId = BeginFrameSourceId(1);
const DISPLAY: FrameSinkId = FrameSinkId::new(1, 1);
const PARENT: FrameSinkId = FrameSinkId::new(2, 1);
const CHILD: FrameSinkId = FrameSinkId::new(3, 1);

const FRAME_COUNT: u64 = 90;
const INTERVAL: TimeDelta = TimeDelta::from_millis(16);
const START: TimeTicks = TimeTicks(1_000_000_000);
/// First frame the child produces.
const CHILD_STARTS_AT: u64 = 8;
/// Frame on which the parent moves to a new, larger surface.
const RESIZE_AT: u64 = 40;
/// Frames during which the parent's content is scrolled.
const SCROLL_FRAMES: Range<u64> = 12..20;

// ---------------------------------------------------------------------------
// Producers
// ---------------------------------------------------------------------------

#[derive(Debug, Default)]
struct ProducerStats {
    begin_frames: u32,
    acks: u32,
    returned_with_ack: usize,
    reclaimed: usize,
    draws: u32,
}

struct Producer {
    stats: Rc<RefCell<ProducerStats>>,
}

impl CompositorFrameSinkSupportClient for Producer {
    fn did_receive_compositor_frame_ack(&mut self, resources: &[ReturnedResource]) {
        let mut stats = self.stats.borrow_mut();
        stats.acks += 1;
        stats.returned_with_ack += resources.len();
    }

    fn on_begin_frame(&mut self, _args: &BeginFrameArgs) {
        self.stats.borrow_mut().begin_frames += 1;
    }

    fn reclaim_resources(&mut self, resources: &[ReturnedResource]) {
        self.stats.borrow_mut().reclaimed += resources.len();
    }

    fn will_draw_surface(&mut self, _local_surface_id: LocalSurfaceId, _damage_rect: Rect) {
        self.stats.borrow_mut().draws += 1;
    }
}

fn frame(args: &BeginFrameArgs, size: f64, embeds: &[SurfaceId], resource: u32) -> CompositorFrame {
    CompositorFrame::new(BeginFrameAck::for_args(args, true))
        .with_render_pass(RenderPass::new(
            RenderPassId(1),
            Rect::new(0.0, 0.0, size, size),
        ))
        .with_embedded_surfaces(embeds)
        .with_resources(vec![TransferableResource::new(
            ResourceId(resource),
            Size::new(size, size),
        )])
}

// ---------------------------------------------------------------------------
// Scrollbar host
// ---------------------------------------------------------------------------

#[derive(Debug)]
struct ScrollbarHost {
    bars: Vec<ScrollbarLayer>,
    now: TimeTicks,
    due: Option<(DelayedAnimationTask, TimeTicks)>,
    needs_animate: bool,
    needs_redraw: bool,
}

impl ScrollbarAnimationControllerClient for ScrollbarHost {
    fn scrollbars_for(&mut self, _element: ElementId) -> &mut [ScrollbarLayer] {
        &mut self.bars
    }

    fn post_delayed_scrollbar_animation_task(
        &mut self,
        task: DelayedAnimationTask,
        delay: TimeDelta,
    ) {
        self.due = Some((task, self.now + delay));
    }

    fn set_needs_redraw_for_scrollbar_animation(&mut self) {
        self.needs_redraw = true;
    }

    fn set_needs_animate_for_scrollbar_animation(&mut self) {
        self.needs_animate = true;
    }

    fn did_change_scrollbar_visibility(&mut self) {
        println!("[scrollbar] visibility changed at {:.3}ms", ms(self.now));
    }
}

fn ms(t: TimeTicks) -> f64 {
    t.nanos() as f64 / 1_000_000.0
}

// ---------------------------------------------------------------------------
// Fan-out sink
// ---------------------------------------------------------------------------

struct Tee<'a> {
    pretty: &'a mut PrettyPrintSink,
    recorder: &'a mut RecorderSink,
}

impl TraceSink for Tee<'_> {
    fn on_surface_created(&mut self, e: &SurfaceCreatedEvent) {
        self.pretty.on_surface_created(e);
        self.recorder.on_surface_created(e);
    }

    fn on_frame_queued(&mut self, e: &FrameQueuedEvent) {
        self.pretty.on_frame_queued(e);
        self.recorder.on_frame_queued(e);
    }

    fn on_frame_activated(&mut self, e: &FrameActivatedEvent) {
        self.pretty.on_frame_activated(e);
        self.recorder.on_frame_activated(e);
    }

    fn on_frame_discarded(&mut self, e: &FrameDiscardedEvent) {
        self.pretty.on_frame_discarded(e);
        self.recorder.on_frame_discarded(e);
    }

    fn on_surface_destroyed(&mut self, e: &SurfaceDestroyedEvent) {
        self.pretty.on_surface_destroyed(e);
        self.recorder.on_surface_destroyed(e);
    }

    fn on_begin_frame(&mut self, e: &BeginFrameEvent) {
        self.pretty.on_begin_frame(e);
        self.recorder.on_begin_frame(e);
    }

    fn on_did_finish_frame(&mut self, e: &DidFinishFrameEvent) {
        self.pretty.on_did_finish_frame(e);
        self.recorder.on_did_finish_frame(e);
    }

    fn on_deadline_fired(&mut self, e: &DeadlineFiredEvent) {
        self.pretty.on_deadline_fired(e);
        self.recorder.on_deadline_fired(e);
    }

    fn on_resources_returned(&mut self, e: &ResourcesReturnedEvent) {
        self.pretty.on_resources_returned(e);
        self.recorder.on_resources_returned(e);
    }

    fn on_reference_changes(&mut self, at: TimeTicks, changes: &[ReferenceChange]) {
        self.pretty.on_reference_changes(at, changes);
        self.recorder.on_reference_changes(at, changes);
    }
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn main() {
    // -- sinks -------------------------------------------------------------
    let mut pretty = PrettyPrintSink::new(Box::new(std::io::stdout()));
    let mut recorder = RecorderSink::new();

    // -- frame sinks -------------------------------------------------------
    let config = SurfaceManagerConfig::references()
        .with_dependency_tracker(DependencyTrackerConfig::new(SOURCE));
    let mut fsm = FrameSinkManager::new(config);
    fsm.add_begin_frame_source(BeginFrameSource::new(SOURCE, INTERVAL));

    let mut stats: BTreeMap<FrameSinkId, Rc<RefCell<ProducerStats>>> = BTreeMap::new();
    for (sink, role) in [
        (DISPLAY, SupportConfig::root()),
        (PARENT, SupportConfig::child()),
        (CHILD, SupportConfig::child()),
    ] {
        let sink_stats = Rc::new(RefCell::new(ProducerStats::default()));
        let client = Producer {
            stats: Rc::clone(&sink_stats),
        };
        fsm.create_compositor_frame_sink(sink, role, Some(Box::new(client)))
            .expect("frame sink ids are distinct");
        stats.insert(sink, sink_stats);
    }
    assert!(fsm.register_frame_sink_hierarchy(DISPLAY, PARENT), "display embeds parent");
    assert!(fsm.register_frame_sink_hierarchy(PARENT, CHILD), "parent embeds child");
    fsm.register_begin_frame_source(SOURCE, DISPLAY)
        .expect("source was added");
    for sink in [DISPLAY, PARENT, CHILD] {
        fsm.set_needs_begin_frame(sink, true)
            .expect("frame sink exists");
    }

    let mut display_ids = LocalSurfaceIdAllocator::new(0x1);
    let mut parent_ids = LocalSurfaceIdAllocator::new(0x2);
    let mut child_ids = LocalSurfaceIdAllocator::new(0x3);
    let display_surface = SurfaceId::new(DISPLAY, display_ids.generate());
    let mut parent_surface = SurfaceId::new(PARENT, parent_ids.generate());
    let child_surface = SurfaceId::new(CHILD, child_ids.generate());
    let mut parent_size = 256.0;

    // -- scrollbar ---------------------------------------------------------
    let host = ScrollbarHost {
        bars: vec![
            ScrollbarLayer::overlay(ScrollbarOrientation::Vertical),
            ScrollbarLayer::overlay(ScrollbarOrientation::Horizontal),
        ],
        now: START,
        due: None,
        needs_animate: false,
        needs_redraw: false,
    };
    let mut scrollbar = ScrollbarAnimationController::new(
        ElementId(1),
        ScrollbarAnimationConfig::aura_overlay(),
        host,
    );

    // -- simulated loop ----------------------------------------------------
    let mut resource = 0_u32;
    let mut damaged_total = 0_usize;
    let mut now = START;

    for frame_index in 0..FRAME_COUNT {
        // 1. Pacing
        let args = fsm
            .issue_begin_frame(SOURCE, now)
            .expect("source was added")
            .expect("source is never paused");

        // 2. Producers answer, outermost first.
        if frame_index == RESIZE_AT {
            parent_surface = SurfaceId::new(PARENT, parent_ids.generate());
            parent_size = 512.0;
        }
        resource += 1;
        fsm.submit_compositor_frame(
            DISPLAY,
            display_surface.local_surface_id,
            frame(&args, 1024.0, &[parent_surface], resource),
        )
        .expect("display frame is valid");
        resource += 1;
        fsm.submit_compositor_frame(
            PARENT,
            parent_surface.local_surface_id,
            frame(&args, parent_size, &[child_surface], resource),
        )
        .expect("parent frame is valid");
        if frame_index >= CHILD_STARTS_AT {
            resource += 1;
            fsm.submit_compositor_frame(
                CHILD,
                child_surface.local_surface_id,
                frame(&args, 64.0, &[], resource),
            )
            .expect("child frame is valid");
        }

        // 3. Scrollbar input and animation on the same clock.
        scrollbar.client_mut().now = now;
        if frame_index == SCROLL_FRAMES.start {
            scrollbar.did_scroll_begin();
        }
        if SCROLL_FRAMES.contains(&frame_index) {
            scrollbar.did_scroll_update();
        }
        if frame_index + 1 == SCROLL_FRAMES.end {
            scrollbar.did_scroll_end();
        }
        if let Some((task, due)) = scrollbar.client().due
            && due <= now
        {
            scrollbar.client_mut().due = None;
            scrollbar.run_delayed_task(task);
        }
        if std::mem::take(&mut scrollbar.client_mut().needs_animate) {
            scrollbar.animate(now);
        }
        if std::mem::take(&mut scrollbar.client_mut().needs_redraw) {
            println!("[scrollbar] opacity={:.2}", scrollbar.opacity());
        }

        // 4. Display draws whatever changed.
        let damaged = fsm.update_surface_manager(SurfaceManager::take_damaged_surfaces);
        if !damaged.is_empty() {
            damaged_total += damaged.len();
            fsm.will_draw_surface(display_surface, Rect::new(0.0, 0.0, 1024.0, 1024.0));
        }

        // 5. Trace
        let mut tee = Tee {
            pretty: &mut pretty,
            recorder: &mut recorder,
        };
        fsm.flush_trace(&mut Tracer::new(&mut tee));

        now = now + INTERVAL;
    }

    // -- teardown ----------------------------------------------------------
    fsm.destroy_compositor_frame_sink(CHILD)
        .expect("child frame sink exists");
    let mut tee = Tee {
        pretty: &mut pretty,
        recorder: &mut recorder,
    };
    fsm.flush_trace(&mut Tracer::new(&mut tee));

    for (sink, sink_stats) in &stats {
        println!("{sink:?}: {:?}", sink_stats.borrow());
    }
    println!(
        "surfaces alive: {}, damaged surface-frames: {damaged_total}",
        fsm.surface_manager().surface_count()
    );

    // -- export Chrome trace -----------------------------------------------
    let path = "surface_trace.json";
    let file = File::create(path).expect("failed to create surface_trace.json");
    let mut writer = BufWriter::new(file);
    framesink_debug::chrome::export(recorder.as_bytes(), &mut writer)
        .expect("failed to write Chrome trace");

    println!("Wrote {path} ({FRAME_COUNT} frames)");
}
