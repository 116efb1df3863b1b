// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The routing context for frame sinks.
//!
//! [`FrameSinkManager`] owns the [`SurfaceManager`], every
//! [`CompositorFrameSinkSupport`], and every [`BeginFrameSource`]. Producers
//! call its entry points; after each one it drains the surface manager's
//! outbox, handing every
//! [`FrameSinkNotification`](crate::manager::FrameSinkNotification) to the addressed support
//! until nothing is left. Callbacks are thus delivered synchronously, in
//! order, before the entry point returns, and no support is ever borrowed
//! twice.
//!
//! # Begin-frame source hierarchy
//!
//! A source registered for a frame sink also drives that sink's registered
//! descendants, unless a descendant already has a source of its own. When a
//! source or a hierarchy edge goes away, affected sinks fall back to any
//! other registered source above them.

use alloc::boxed::Box;
use alloc::collections::{BTreeMap, BTreeSet};
use alloc::vec::Vec;

use kurbo::Rect;

use crate::begin_frame::{
    BeginFrameAck, BeginFrameArgs, BeginFrameObserver, BeginFrameSource, BeginFrameSourceId,
};
use crate::error::FrameSinkError;
use crate::frame::{CompositorFrame, CopyOutputRequest};
use crate::id::{FrameSinkId, LocalSurfaceId, SurfaceId};
use crate::manager::{SurfaceManager, SurfaceManagerConfig};
use crate::support::{
    BeginFrameSources, CompositorFrameSinkSupport, CompositorFrameSinkSupportClient, SupportConfig,
};
use crate::time::TimeTicks;
use crate::trace::{BeginFrameEvent, Tracer};

#[derive(Clone, Debug, Default)]
struct FrameSinkSourceMapping {
    source: Option<BeginFrameSourceId>,
    children: Vec<FrameSinkId>,
}

impl FrameSinkSourceMapping {
    fn is_empty(&self) -> bool {
        self.source.is_none() && self.children.is_empty()
    }
}

/// Owner of surfaces, frame sinks, and begin-frame sources.
#[derive(Debug)]
pub struct FrameSinkManager {
    surface_manager: SurfaceManager,
    supports: BTreeMap<FrameSinkId, CompositorFrameSinkSupport>,
    sources: BeginFrameSources,
    registered_sources: BTreeMap<BeginFrameSourceId, FrameSinkId>,
    frame_sink_source_map: BTreeMap<FrameSinkId, FrameSinkSourceMapping>,
}

impl Default for FrameSinkManager {
    fn default() -> Self {
        Self::new(SurfaceManagerConfig::default())
    }
}

impl FrameSinkManager {
    /// Creates a manager with no frame sinks or sources.
    #[must_use]
    pub fn new(config: SurfaceManagerConfig) -> Self {
        Self {
            surface_manager: SurfaceManager::new(config),
            supports: BTreeMap::new(),
            sources: BeginFrameSources::new(),
            registered_sources: BTreeMap::new(),
            frame_sink_source_map: BTreeMap::new(),
        }
    }

    // -- Queries --

    /// The surface registry.
    #[inline]
    #[must_use]
    pub const fn surface_manager(&self) -> &SurfaceManager {
        &self.surface_manager
    }

    /// Runs `f` against the surface registry, then delivers the notifications
    /// it produced.
    pub fn update_surface_manager<R>(&mut self, f: impl FnOnce(&mut SurfaceManager) -> R) -> R {
        let result = f(&mut self.surface_manager);
        self.dispatch_notifications();
        result
    }

    /// The support for `id`.
    #[must_use]
    pub fn support(&self, id: FrameSinkId) -> Option<&CompositorFrameSinkSupport> {
        self.supports.get(&id)
    }

    /// A begin-frame source.
    #[must_use]
    pub fn begin_frame_source(&self, id: BeginFrameSourceId) -> Option<&BeginFrameSource> {
        self.sources.get(&id)
    }

    /// The source currently driving `frame_sink`, registered or inherited.
    #[must_use]
    pub fn begin_frame_source_for(&self, frame_sink: FrameSinkId) -> Option<BeginFrameSourceId> {
        self.frame_sink_source_map.get(&frame_sink).and_then(|m| m.source)
    }

    // -- Frame sink lifecycle --

    /// Creates the support for `id`.
    pub fn create_compositor_frame_sink(
        &mut self,
        id: FrameSinkId,
        config: SupportConfig,
        client: Option<Box<dyn CompositorFrameSinkSupportClient>>,
    ) -> Result<(), FrameSinkError> {
        if self.supports.contains_key(&id) {
            return Err(FrameSinkError::FrameSinkAlreadyExists(id));
        }
        let mut support =
            CompositorFrameSinkSupport::new(id, config, client, &mut self.surface_manager);
        if let Some(source) = self.begin_frame_source_for(id) {
            support.set_begin_frame_source(Some(source), &mut self.sources);
        }
        self.supports.insert(id, support);
        Ok(())
    }

    /// Tears down the support for `id`.
    ///
    /// The support stops receiving BeginFrames, loses its root reference, and
    /// evicts its surface; notifications from the eviction still reach its
    /// client. Only then is it unregistered and its frame sink id
    /// invalidated.
    pub fn destroy_compositor_frame_sink(&mut self, id: FrameSinkId) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get_mut(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.begin_teardown(&mut self.surface_manager, &mut self.sources);
        self.dispatch_notifications();

        let Some(support) = self.supports.remove(&id) else {
            return Ok(());
        };
        self.surface_manager.unregister_frame_sink_manager_client(id);
        if support.config().handles_frame_sink_id_invalidation {
            self.surface_manager.invalidate_frame_sink_id(id);
        }
        self.dispatch_notifications();
        Ok(())
    }

    // -- Producer entry points --

    /// Submits a frame for `id`. See
    /// [`CompositorFrameSinkSupport::submit_compositor_frame`].
    pub fn submit_compositor_frame(
        &mut self,
        id: FrameSinkId,
        local_surface_id: LocalSurfaceId,
        frame: CompositorFrame,
    ) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get_mut(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        let result = support.submit_compositor_frame(
            local_surface_id,
            frame,
            &mut self.surface_manager,
            &mut self.sources,
        );
        self.dispatch_notifications();
        result
    }

    /// Subscribes `id` to BeginFrames, or unsubscribes it.
    pub fn set_needs_begin_frame(
        &mut self,
        id: FrameSinkId,
        needs_begin_frame: bool,
    ) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get_mut(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.set_needs_begin_frame(needs_begin_frame, &mut self.sources);
        Ok(())
    }

    /// Reports that `id` produced no frame for a BeginFrame.
    pub fn begin_frame_did_not_swap(
        &mut self,
        id: FrameSinkId,
        ack: BeginFrameAck,
    ) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get_mut(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.begin_frame_did_not_swap(ack, &mut self.surface_manager, &mut self.sources)
    }

    /// Evicts the current surface of `id`.
    pub fn evict_frame(&mut self, id: FrameSinkId) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get_mut(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.evict_frame(&mut self.surface_manager);
        self.dispatch_notifications();
        Ok(())
    }

    /// Requests a copy of the current surface of `id`.
    ///
    /// On error the request is dropped, which answers it with an empty result.
    pub fn request_copy_of_surface(
        &mut self,
        id: FrameSinkId,
        request: CopyOutputRequest,
    ) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.request_copy_of_surface(request, &mut self.surface_manager);
        Ok(())
    }

    /// Lets `id` claim the temporary reference of `surface_id`.
    pub fn claim_temporary_reference(
        &mut self,
        id: FrameSinkId,
        surface_id: SurfaceId,
    ) -> Result<(), FrameSinkError> {
        let support = self
            .supports
            .get(&id)
            .ok_or(FrameSinkError::UnknownFrameSink(id))?;
        support.claim_temporary_reference(surface_id, &mut self.surface_manager);
        Ok(())
    }

    // -- Display entry points --

    /// Announces that `surface_id` is about to be drawn.
    pub fn will_draw_surface(&mut self, surface_id: SurfaceId, damage_rect: Rect) {
        self.surface_manager.run_will_draw_callback(surface_id, damage_rect);
        self.dispatch_notifications();
    }

    /// Forces the pending frame of `surface_id` active.
    pub fn activate_pending_frame_for_deadline(&mut self, surface_id: SurfaceId) {
        self.surface_manager.activate_pending_frame_for_deadline(surface_id);
        self.dispatch_notifications();
    }

    // -- Begin-frame sources --

    /// Adds a source. Returns `false` if one with the same id exists.
    pub fn add_begin_frame_source(&mut self, source: BeginFrameSource) -> bool {
        if self.sources.contains_key(&source.id()) {
            return false;
        }
        self.sources.insert(source.id(), source);
        true
    }

    /// Removes a source, detaching it from every frame sink first.
    pub fn remove_begin_frame_source(
        &mut self,
        id: BeginFrameSourceId,
    ) -> Option<BeginFrameSource> {
        self.unregister_begin_frame_source(id);
        let orphaned: Vec<FrameSinkId> = self
            .supports
            .iter()
            .filter(|(_, s)| s.begin_frame_source() == Some(id))
            .map(|(sink, _)| *sink)
            .collect();
        for sink in orphaned {
            if let Some(support) = self.supports.get_mut(&sink) {
                support.set_begin_frame_source(None, &mut self.sources);
            }
        }
        self.sources.remove(&id)
    }

    /// Makes `source` drive `frame_sink` and its descendants.
    pub fn register_begin_frame_source(
        &mut self,
        source: BeginFrameSourceId,
        frame_sink: FrameSinkId,
    ) -> Result<(), FrameSinkError> {
        if !self.sources.contains_key(&source) {
            return Err(FrameSinkError::UnknownBeginFrameSource(source));
        }
        self.registered_sources.insert(source, frame_sink);
        self.attach_begin_frame_source(frame_sink, source);
        Ok(())
    }

    /// Undoes [`register_begin_frame_source`](Self::register_begin_frame_source).
    pub fn unregister_begin_frame_source(&mut self, source: BeginFrameSourceId) {
        let Some(frame_sink) = self.registered_sources.remove(&source) else {
            return;
        };
        if !self.frame_sink_source_map.contains_key(&frame_sink) {
            return;
        }
        self.detach_begin_frame_source(frame_sink, source);
        self.reattach_registered_sources();
    }

    /// Records that `child` is embedded by `parent`. Returns `false` for edges
    /// that would form a cycle.
    pub fn register_frame_sink_hierarchy(
        &mut self,
        parent: FrameSinkId,
        child: FrameSinkId,
    ) -> bool {
        if parent == child || self.is_descendant(child, parent) {
            return false;
        }
        let mapping = self.frame_sink_source_map.entry(parent).or_default();
        if !mapping.children.contains(&child) {
            mapping.children.push(child);
        }
        if let Some(source) = mapping.source {
            self.attach_begin_frame_source(child, source);
        }
        true
    }

    /// Removes an edge recorded by
    /// [`register_frame_sink_hierarchy`](Self::register_frame_sink_hierarchy).
    pub fn unregister_frame_sink_hierarchy(&mut self, parent: FrameSinkId, child: FrameSinkId) {
        let Some(mapping) = self.frame_sink_source_map.get_mut(&parent) else {
            return;
        };
        mapping.children.retain(|c| *c != child);
        let old_source = mapping.source;
        if mapping.is_empty() {
            self.frame_sink_source_map.remove(&parent);
            return;
        }
        let Some(old_source) = old_source else {
            return;
        };
        self.detach_begin_frame_source(child, old_source);
        self.reattach_registered_sources();
    }

    /// Emits the next BeginFrame of `source` to its observers, then to the
    /// dependency tracker. A paused source emits nothing.
    pub fn issue_begin_frame(
        &mut self,
        source: BeginFrameSourceId,
        frame_time: TimeTicks,
    ) -> Result<Option<BeginFrameArgs>, FrameSinkError> {
        let begin_frame_source = self
            .sources
            .get_mut(&source)
            .ok_or(FrameSinkError::UnknownBeginFrameSource(source))?;
        if begin_frame_source.paused() {
            return Ok(None);
        }
        let args = begin_frame_source.next_args(frame_time);
        let observers: Vec<FrameSinkId> = begin_frame_source.observers().collect();

        let journal = self.surface_manager.journal_mut();
        journal.set_now(frame_time);
        journal.begin_frame(BeginFrameEvent {
            source,
            sequence_number: args.sequence_number,
            frame_time,
            observers: u32::try_from(observers.len()).unwrap_or(u32::MAX),
        });

        for sink in observers {
            if let Some(support) = self.supports.get_mut(&sink) {
                support.on_begin_frame(&args);
            }
        }
        self.surface_manager.on_begin_frame(&args);
        self.dispatch_notifications();
        Ok(Some(args))
    }

    /// Pauses or resumes `source`, telling its observers on a change.
    pub fn set_begin_frame_source_paused(
        &mut self,
        source: BeginFrameSourceId,
        paused: bool,
    ) -> Result<(), FrameSinkError> {
        let begin_frame_source = self
            .sources
            .get_mut(&source)
            .ok_or(FrameSinkError::UnknownBeginFrameSource(source))?;
        if !begin_frame_source.set_paused(paused) {
            return Ok(());
        }
        let observers: Vec<FrameSinkId> = begin_frame_source.observers().collect();
        for sink in observers {
            if let Some(support) = self.supports.get_mut(&sink) {
                support.on_begin_frame_source_paused_changed(paused);
            }
        }
        Ok(())
    }

    // -- Tracing --

    /// Replays the recorded trace events into `tracer`.
    pub fn flush_trace(&mut self, tracer: &mut Tracer<'_>) {
        self.surface_manager.journal_mut().replay(tracer);
    }

    // -- Internals --

    /// Delivers outbox notifications until the outbox is empty. Notifications
    /// for frame sinks without a support are dropped.
    fn dispatch_notifications(&mut self) {
        while let Some(notification) = self.surface_manager.pop_notification() {
            let Some(support) = self.supports.get_mut(&notification.frame_sink_id()) else {
                continue;
            };
            support.deliver(notification, &mut self.surface_manager);
        }
    }

    fn attach_begin_frame_source(&mut self, frame_sink: FrameSinkId, source: BeginFrameSourceId) {
        let mapping = self.frame_sink_source_map.entry(frame_sink).or_default();
        if mapping.source.is_none() {
            mapping.source = Some(source);
            if let Some(support) = self.supports.get_mut(&frame_sink) {
                support.set_begin_frame_source(Some(source), &mut self.sources);
            }
        }
        let children = mapping.children.clone();
        for child in children {
            self.attach_begin_frame_source(child, source);
        }
    }

    fn detach_begin_frame_source(&mut self, frame_sink: FrameSinkId, source: BeginFrameSourceId) {
        let Some(mapping) = self.frame_sink_source_map.get_mut(&frame_sink) else {
            return;
        };
        if mapping.source == Some(source) {
            mapping.source = None;
            if let Some(support) = self.supports.get_mut(&frame_sink) {
                support.set_begin_frame_source(None, &mut self.sources);
            }
        }
        if mapping.is_empty() {
            self.frame_sink_source_map.remove(&frame_sink);
            return;
        }
        let children = mapping.children.clone();
        for child in children {
            self.detach_begin_frame_source(child, source);
        }
    }

    fn reattach_registered_sources(&mut self) {
        let registered: Vec<(BeginFrameSourceId, FrameSinkId)> =
            self.registered_sources.iter().map(|(s, f)| (*s, *f)).collect();
        for (source, frame_sink) in registered {
            self.attach_begin_frame_source(frame_sink, source);
        }
    }

    fn is_descendant(&self, ancestor: FrameSinkId, candidate: FrameSinkId) -> bool {
        let mut seen = BTreeSet::new();
        let mut stack = alloc::vec![ancestor];
        while let Some(sink) = stack.pop() {
            if sink == candidate {
                return true;
            }
            if !seen.insert(sink) {
                continue;
            }
            if let Some(mapping) = self.frame_sink_source_map.get(&sink) {
                stack.extend(mapping.children.iter().copied());
            }
        }
        false
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use alloc::rc::Rc;
    use alloc::vec;
    use core::cell::RefCell;

    use kurbo::Size;

    use super::*;
    use crate::dependency::DependencyTrackerConfig;
    use crate::frame::{RenderPass, RenderPassId};
    use crate::resource::{ResourceId, ReturnedResource, TransferableResource};
    use crate::time::TimeDelta;

    const SOURCE: BeginFrameSourceId = BeginFrameSourceId(1);
    const DISPLAY: FrameSinkId = FrameSinkId::new(1, 1);
    const PARENT: FrameSinkId = FrameSinkId::new(2, 1);
    const CHILD: FrameSinkId = FrameSinkId::new(3, 1);

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Ack(Vec<ResourceId>),
        BeginFrame(u64),
        Reclaim(Vec<ResourceId>),
        Paused(bool),
    }

    type Log = Rc<RefCell<Vec<(FrameSinkId, Call)>>>;

    struct Client {
        sink: FrameSinkId,
        log: Log,
    }

    impl CompositorFrameSinkSupportClient for Client {
        fn did_receive_compositor_frame_ack(&mut self, resources: &[ReturnedResource]) {
            let ids = resources.iter().map(|r| r.id).collect();
            self.log.borrow_mut().push((self.sink, Call::Ack(ids)));
        }
        fn on_begin_frame(&mut self, args: &BeginFrameArgs) {
            self.log
                .borrow_mut()
                .push((self.sink, Call::BeginFrame(args.sequence_number)));
        }
        fn reclaim_resources(&mut self, resources: &[ReturnedResource]) {
            let ids = resources.iter().map(|r| r.id).collect();
            self.log.borrow_mut().push((self.sink, Call::Reclaim(ids)));
        }
        fn will_draw_surface(&mut self, _local_surface_id: LocalSurfaceId, _damage_rect: Rect) {}
        fn on_begin_frame_paused_changed(&mut self, paused: bool) {
            self.log.borrow_mut().push((self.sink, Call::Paused(paused)));
        }
    }

    fn client(sink: FrameSinkId, log: &Log) -> Option<Box<dyn CompositorFrameSinkSupportClient>> {
        Some(Box::new(Client {
            sink,
            log: Rc::clone(log),
        }))
    }

    fn local(n: u32) -> LocalSurfaceId {
        LocalSurfaceId::new(n, 3)
    }

    fn frame(seq: u64) -> CompositorFrame {
        CompositorFrame::new(BeginFrameAck::new(SOURCE, seq, true))
            .with_render_pass(RenderPass::new(RenderPassId(1), Rect::new(0.0, 0.0, 10.0, 10.0)))
    }

    fn tracking() -> SurfaceManagerConfig {
        SurfaceManagerConfig::references()
            .with_dependency_tracker(DependencyTrackerConfig::new(SOURCE))
    }

    /// Display, parent, and child sinks on one source, all subscribed.
    fn three_sinks(log: &Log) -> FrameSinkManager {
        let mut fsm = FrameSinkManager::new(tracking());
        fsm.add_begin_frame_source(BeginFrameSource::new(SOURCE, TimeDelta::from_millis(16)));
        fsm.create_compositor_frame_sink(DISPLAY, SupportConfig::root(), client(DISPLAY, log))
            .unwrap();
        fsm.create_compositor_frame_sink(PARENT, SupportConfig::child(), client(PARENT, log))
            .unwrap();
        fsm.create_compositor_frame_sink(CHILD, SupportConfig::child(), client(CHILD, log))
            .unwrap();
        fsm.register_frame_sink_hierarchy(DISPLAY, PARENT);
        fsm.register_frame_sink_hierarchy(PARENT, CHILD);
        fsm.register_begin_frame_source(SOURCE, DISPLAY).unwrap();
        for sink in [DISPLAY, PARENT, CHILD] {
            fsm.set_needs_begin_frame(sink, true).unwrap();
        }
        fsm
    }

    fn tick(fsm: &mut FrameSinkManager, n: u64) {
        fsm.issue_begin_frame(SOURCE, TimeTicks(n * 16_000_000)).unwrap();
    }

    #[test]
    fn duplicate_and_unknown_sinks_are_errors() {
        let mut fsm = FrameSinkManager::default();
        fsm.create_compositor_frame_sink(DISPLAY, SupportConfig::root(), None)
            .unwrap();
        assert_eq!(
            fsm.create_compositor_frame_sink(DISPLAY, SupportConfig::root(), None),
            Err(FrameSinkError::FrameSinkAlreadyExists(DISPLAY))
        );
        assert_eq!(
            fsm.submit_compositor_frame(PARENT, local(1), frame(1)),
            Err(FrameSinkError::UnknownFrameSink(PARENT))
        );
        assert_eq!(
            fsm.issue_begin_frame(SOURCE, TimeTicks(0)),
            Err(FrameSinkError::UnknownBeginFrameSource(SOURCE))
        );
    }

    #[test]
    fn hierarchy_inherits_source() {
        let log = Log::default();
        let fsm = three_sinks(&log);
        for sink in [DISPLAY, PARENT, CHILD] {
            assert_eq!(fsm.begin_frame_source_for(sink), Some(SOURCE));
            assert_eq!(fsm.support(sink).and_then(|s| s.begin_frame_source()), Some(SOURCE));
        }
        assert_eq!(fsm.begin_frame_source(SOURCE).map(|s| s.observer_count()), Some(3));
    }

    #[test]
    fn inheriting_sink_created_later_gets_source() {
        let mut fsm = FrameSinkManager::default();
        fsm.add_begin_frame_source(BeginFrameSource::new(SOURCE, TimeDelta::from_millis(16)));
        fsm.register_frame_sink_hierarchy(DISPLAY, CHILD);
        fsm.register_begin_frame_source(SOURCE, DISPLAY).unwrap();
        fsm.create_compositor_frame_sink(CHILD, SupportConfig::child(), None)
            .unwrap();
        assert_eq!(fsm.support(CHILD).and_then(|s| s.begin_frame_source()), Some(SOURCE));
    }

    #[test]
    fn unregistering_hierarchy_detaches_child() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        fsm.unregister_frame_sink_hierarchy(PARENT, CHILD);
        assert_eq!(fsm.begin_frame_source_for(CHILD), None);
        assert_eq!(fsm.begin_frame_source_for(PARENT), Some(SOURCE));
        assert!(
            !fsm.begin_frame_source(SOURCE)
                .is_some_and(|s| s.has_observer(CHILD)),
            "child no longer subscribed"
        );
    }

    #[test]
    fn second_source_takes_over_after_unregister() {
        let mut fsm = FrameSinkManager::default();
        let other = BeginFrameSourceId(2);
        fsm.add_begin_frame_source(BeginFrameSource::new(SOURCE, TimeDelta::from_millis(16)));
        fsm.add_begin_frame_source(BeginFrameSource::new(other, TimeDelta::from_millis(8)));
        fsm.register_frame_sink_hierarchy(DISPLAY, CHILD);
        fsm.register_begin_frame_source(SOURCE, DISPLAY).unwrap();
        fsm.register_begin_frame_source(other, CHILD).unwrap();
        assert_eq!(fsm.begin_frame_source_for(CHILD), Some(SOURCE), "first attach wins");
        fsm.unregister_begin_frame_source(SOURCE);
        assert_eq!(fsm.begin_frame_source_for(CHILD), Some(other));
    }

    #[test]
    fn hierarchy_rejects_cycles() {
        let mut fsm = FrameSinkManager::default();
        assert!(fsm.register_frame_sink_hierarchy(DISPLAY, PARENT));
        assert!(fsm.register_frame_sink_hierarchy(PARENT, CHILD));
        assert!(!fsm.register_frame_sink_hierarchy(CHILD, DISPLAY));
        assert!(!fsm.register_frame_sink_hierarchy(CHILD, CHILD));
    }

    #[test]
    fn begin_frames_reach_subscribers() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        tick(&mut fsm, 1);
        let seen: Vec<_> = log.borrow().iter().map(|(s, _)| *s).collect();
        assert_eq!(seen, [DISPLAY, PARENT, CHILD]);
        fsm.set_needs_begin_frame(CHILD, false).unwrap();
        log.borrow_mut().clear();
        tick(&mut fsm, 2);
        assert!(log.borrow().iter().all(|(s, _)| *s != CHILD));
    }

    #[test]
    fn paused_source_is_silent() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        fsm.set_begin_frame_source_paused(SOURCE, true).unwrap();
        fsm.set_begin_frame_source_paused(SOURCE, true).unwrap();
        assert_eq!(fsm.issue_begin_frame(SOURCE, TimeTicks(0)), Ok(None));
        let paused = log
            .borrow()
            .iter()
            .filter(|(_, c)| *c == Call::Paused(true))
            .count();
        assert_eq!(paused, 3, "one notice per observer, on change only");
    }

    #[test]
    fn embedding_chain_activates_bottom_up() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let display = SurfaceId::new(DISPLAY, local(1));
        let parent = SurfaceId::new(PARENT, local(1));
        let child = SurfaceId::new(CHILD, local(1));

        fsm.submit_compositor_frame(DISPLAY, local(1), frame(1).with_embedded_surfaces(&[parent]))
            .unwrap();
        fsm.submit_compositor_frame(PARENT, local(1), frame(1).with_embedded_surfaces(&[child]))
            .unwrap();
        let sm = fsm.surface_manager();
        assert!(sm.surface(&display).is_some_and(|s| s.has_pending_frame()));
        assert!(sm.surface(&parent).is_some_and(|s| s.has_pending_frame()));

        fsm.submit_compositor_frame(CHILD, local(1), frame(1)).unwrap();
        let sm = fsm.surface_manager();
        for id in [display, parent, child] {
            assert!(sm.surface(&id).is_some_and(|s| s.has_active_frame()), "{id:?}");
        }
        assert_eq!(sm.child_references(&sm.root_surface_id()), [display]);
        assert_eq!(sm.child_references(&display), [parent]);
        assert_eq!(sm.child_references(&parent), [child]);
        assert!(!sm.has_temporary_reference(&parent), "embedded for real now");

        let damaged = fsm.update_surface_manager(SurfaceManager::take_damaged_surfaces);
        assert_eq!(damaged.len(), 3);
    }

    #[test]
    fn display_side_reference_removal_is_dispatched() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let child = SurfaceId::new(CHILD, local(1));
        let res = TransferableResource::new(ResourceId(2), Size::new(1.0, 1.0));
        fsm.submit_compositor_frame(CHILD, local(1), frame(1).with_resources(vec![res]))
            .unwrap();
        fsm.evict_frame(CHILD).unwrap();
        log.borrow_mut().clear();
        fsm.update_surface_manager(|sm| sm.drop_temporary_reference(child));
        assert_eq!(*log.borrow(), [(CHILD, Call::Reclaim(vec![ResourceId(2)]))]);
    }

    #[test]
    fn deadline_activates_through_begin_frames() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let display = SurfaceId::new(DISPLAY, local(1));
        let missing = SurfaceId::new(PARENT, local(1));
        fsm.submit_compositor_frame(DISPLAY, local(1), frame(1).with_embedded_surfaces(&[missing]))
            .unwrap();
        for n in 1..=3 {
            tick(&mut fsm, n);
        }
        assert!(
            fsm.surface_manager()
                .surface(&display)
                .is_some_and(|s| s.has_pending_frame())
        );
        tick(&mut fsm, 4);
        assert!(
            fsm.surface_manager()
                .surface(&display)
                .is_some_and(|s| s.has_active_frame())
        );
        assert!(
            log.borrow().contains(&(DISPLAY, Call::Ack(vec![]))),
            "forced activation acks"
        );
    }

    #[test]
    fn teardown_delivers_eviction_fallout_first() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let res = TransferableResource::new(ResourceId(8), Size::new(4.0, 4.0));
        fsm.submit_compositor_frame(DISPLAY, local(1), frame(1).with_resources(vec![res]))
            .unwrap();
        log.borrow_mut().clear();

        fsm.destroy_compositor_frame_sink(DISPLAY).unwrap();
        assert_eq!(*log.borrow(), [(DISPLAY, Call::Reclaim(vec![ResourceId(8)]))]);
        assert!(fsm.support(DISPLAY).is_none());
        assert!(!fsm.surface_manager().is_frame_sink_id_valid(DISPLAY));
        assert!(
            !fsm.begin_frame_source(SOURCE)
                .is_some_and(|s| s.has_observer(DISPLAY))
        );
        assert_eq!(fsm.surface_manager().surface_count(), 0);
        assert_eq!(
            fsm.destroy_compositor_frame_sink(DISPLAY),
            Err(FrameSinkError::UnknownFrameSink(DISPLAY))
        );
    }

    #[test]
    fn destroying_embedder_collects_orphans() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let display = SurfaceId::new(DISPLAY, local(1));
        let child = SurfaceId::new(CHILD, local(1));
        fsm.submit_compositor_frame(CHILD, local(1), frame(1)).unwrap();
        fsm.submit_compositor_frame(DISPLAY, local(1), frame(1).with_embedded_surfaces(&[child]))
            .unwrap();
        fsm.destroy_compositor_frame_sink(CHILD).unwrap();
        assert!(
            fsm.surface_manager().surface(&child).is_some(),
            "still embedded by the display"
        );
        fsm.destroy_compositor_frame_sink(DISPLAY).unwrap();
        assert!(fsm.surface_manager().surface(&display).is_none());
        assert!(fsm.surface_manager().surface(&child).is_none());
    }

    #[test]
    fn resurrected_local_id_is_reused() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        let child = SurfaceId::new(CHILD, local(1));
        fsm.submit_compositor_frame(CHILD, local(1), frame(1)).unwrap();
        fsm.evict_frame(CHILD).unwrap();
        assert!(
            fsm.surface_manager().is_marked_for_destruction(&child),
            "kept alive by its temporary reference"
        );
        fsm.submit_compositor_frame(CHILD, local(1), frame(2)).unwrap();
        assert!(!fsm.surface_manager().is_marked_for_destruction(&child));
        assert_eq!(fsm.support(CHILD).and_then(|s| s.current_surface_id()), Some(child));
    }

    #[test]
    fn removing_source_unbinds_supports() {
        let log = Log::default();
        let mut fsm = three_sinks(&log);
        assert!(fsm.remove_begin_frame_source(SOURCE).is_some());
        for sink in [DISPLAY, PARENT, CHILD] {
            assert_eq!(fsm.support(sink).and_then(|s| s.begin_frame_source()), None);
        }
        assert_eq!(fsm.begin_frame_source_for(PARENT), None);
    }

    #[cfg(feature = "trace")]
    #[test]
    fn flush_trace_replays_journal() {
        use crate::trace::{BeginFrameEvent, FrameActivatedEvent, TraceSink};

        #[derive(Default)]
        struct Counts {
            begin_frames: u32,
            activations: u32,
        }
        impl TraceSink for Counts {
            fn on_begin_frame(&mut self, _e: &BeginFrameEvent) {
                self.begin_frames += 1;
            }
            fn on_frame_activated(&mut self, _e: &FrameActivatedEvent) {
                self.activations += 1;
            }
        }

        let log = Log::default();
        let mut fsm = three_sinks(&log);
        fsm.submit_compositor_frame(DISPLAY, local(1), frame(1)).unwrap();
        tick(&mut fsm, 1);
        let mut counts = Counts::default();
        fsm.flush_trace(&mut Tracer::new(&mut counts));
        assert_eq!(counts.begin_frames, 1);
        assert_eq!(counts.activations, 1);
        assert!(fsm.surface_manager().journal().is_empty(), "journal drained");
    }
}
