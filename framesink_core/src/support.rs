// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! The per-producer façade over surfaces and pacing.
//!
//! A [`CompositorFrameSinkSupport`] turns a producer's submissions into
//! surfaces on the [`SurfaceManager`], keeps the reference graph in step with
//! the producer's active frames, returns resources without racing the frame
//! ack, and relays BeginFrames from its source to the producer's client.
//!
//! The support does not own the manager or the sources. Every operation that
//! touches them borrows them explicitly; the
//! [`FrameSinkManager`](crate::frame_sink_manager::FrameSinkManager) is the
//! usual caller.

use alloc::boxed::Box;
use alloc::collections::BTreeMap;
use alloc::vec::Vec;
use core::fmt;
use core::mem;

use kurbo::Rect;

use crate::begin_frame::{
    BeginFrameAck, BeginFrameArgs, BeginFrameObserver, BeginFrameSource, BeginFrameSourceId,
};
use crate::error::{FrameSinkError, InvalidArgument};
use crate::frame::{CompositorFrame, CopyOutputRequest};
use crate::id::{FrameSinkId, LocalSurfaceId, SurfaceId, SurfaceReference};
use crate::manager::{FrameSinkNotification, SurfaceManager};
use crate::reference_tracker::ReferencedSurfaceTracker;
use crate::resource::{ReturnedResource, SurfaceResourceHolder};
use crate::surface::{DrawCallback, WillDrawCallback};
use crate::trace::{DidFinishFrameEvent, ResourcesReturnedEvent};

/// Begin-frame sources by id, as borrowed by the support.
pub type BeginFrameSources = BTreeMap<BeginFrameSourceId, BeginFrameSource>;

/// The producer side of a frame sink.
pub trait CompositorFrameSinkSupportClient {
    /// A submitted frame was acknowledged; `resources` were returned while
    /// the ack was outstanding.
    fn did_receive_compositor_frame_ack(&mut self, resources: &[ReturnedResource]);

    /// A pacing signal.
    fn on_begin_frame(&mut self, args: &BeginFrameArgs);

    /// Resources returned with no ack outstanding.
    fn reclaim_resources(&mut self, resources: &[ReturnedResource]);

    /// A surface of this sink is about to be drawn.
    fn will_draw_surface(&mut self, local_surface_id: LocalSurfaceId, damage_rect: Rect);

    /// The BeginFrame source paused or resumed.
    fn on_begin_frame_paused_changed(&mut self, paused: bool) {
        _ = paused;
    }
}

/// Role of a frame sink.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SupportConfig {
    /// A top-level sink: its current surface is referenced from the root.
    pub is_root: bool,
    /// The support registers its frame sink id and invalidates it on teardown.
    pub handles_frame_sink_id_invalidation: bool,
}

impl SupportConfig {
    /// A display root.
    #[must_use]
    pub const fn root() -> Self {
        Self {
            is_root: true,
            handles_frame_sink_id_invalidation: true,
        }
    }

    /// An embedded producer.
    #[must_use]
    pub const fn child() -> Self {
        Self {
            is_root: false,
            handles_frame_sink_id_invalidation: true,
        }
    }
}

/// Per-producer state bridging submissions, references, resources, and
/// BeginFrames.
pub struct CompositorFrameSinkSupport {
    frame_sink_id: FrameSinkId,
    config: SupportConfig,
    client: Option<Box<dyn CompositorFrameSinkSupportClient>>,

    reference_tracker: ReferencedSurfaceTracker,
    resource_holder: SurfaceResourceHolder,
    ack_pending_count: u32,
    surface_returned_resources: Vec<ReturnedResource>,
    current_local_surface_id: LocalSurfaceId,

    begin_frame_source: Option<BeginFrameSourceId>,
    needs_begin_frame: bool,
    added_frame_observer: bool,
    last_begin_frame_args: Option<BeginFrameArgs>,
    last_ack: Option<BeginFrameAck>,
}

impl fmt::Debug for CompositorFrameSinkSupport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompositorFrameSinkSupport")
            .field("frame_sink_id", &self.frame_sink_id)
            .field("config", &self.config)
            .field("has_client", &self.client.is_some())
            .field("ack_pending_count", &self.ack_pending_count)
            .field("current_local_surface_id", &self.current_local_surface_id)
            .field("begin_frame_source", &self.begin_frame_source)
            .field("needs_begin_frame", &self.needs_begin_frame)
            .finish_non_exhaustive()
    }
}

impl CompositorFrameSinkSupport {
    /// Creates a support and registers it with `manager`.
    pub fn new(
        frame_sink_id: FrameSinkId,
        config: SupportConfig,
        client: Option<Box<dyn CompositorFrameSinkSupportClient>>,
        manager: &mut SurfaceManager,
    ) -> Self {
        manager.register_frame_sink_manager_client(frame_sink_id);
        if config.handles_frame_sink_id_invalidation {
            manager.register_frame_sink_id(frame_sink_id);
        }
        Self {
            frame_sink_id,
            config,
            client,
            reference_tracker: ReferencedSurfaceTracker::new(frame_sink_id),
            resource_holder: SurfaceResourceHolder::new(),
            ack_pending_count: 0,
            surface_returned_resources: Vec::new(),
            current_local_surface_id: LocalSurfaceId::default(),
            begin_frame_source: None,
            needs_begin_frame: false,
            added_frame_observer: false,
            last_begin_frame_args: None,
            last_ack: None,
        }
    }

    // -- Queries --

    /// The sink's id.
    #[inline]
    #[must_use]
    pub const fn frame_sink_id(&self) -> FrameSinkId {
        self.frame_sink_id
    }

    /// The sink's role.
    #[inline]
    #[must_use]
    pub const fn config(&self) -> &SupportConfig {
        &self.config
    }

    /// Submitted frames not yet acknowledged.
    #[inline]
    #[must_use]
    pub const fn ack_pending_count(&self) -> u32 {
        self.ack_pending_count
    }

    /// Resources buffered until the next ack.
    #[must_use]
    pub fn buffered_resources(&self) -> &[ReturnedResource] {
        &self.surface_returned_resources
    }

    /// The surface frames are currently submitted to.
    #[must_use]
    pub fn current_surface_id(&self) -> Option<SurfaceId> {
        self.current_local_surface_id
            .is_valid()
            .then(|| SurfaceId::new(self.frame_sink_id, self.current_local_surface_id))
    }

    /// The bound BeginFrame source.
    #[inline]
    #[must_use]
    pub const fn begin_frame_source(&self) -> Option<BeginFrameSourceId> {
        self.begin_frame_source
    }

    /// Whether the producer asked for BeginFrames.
    #[inline]
    #[must_use]
    pub const fn needs_begin_frame(&self) -> bool {
        self.needs_begin_frame
    }

    /// Whether the support is registered with its source.
    #[inline]
    #[must_use]
    pub const fn added_frame_observer(&self) -> bool {
        self.added_frame_observer
    }

    /// Whether a client is attached.
    #[must_use]
    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    /// Replaces the client.
    pub fn set_client(&mut self, client: Option<Box<dyn CompositorFrameSinkSupportClient>>) {
        self.client = client;
    }

    // -- Submission --

    /// Submits a frame to the surface `local_surface_id`.
    ///
    /// A new local id creates (or revives) that surface, continues the frame
    /// sequence of the previous one, and destroys the previous one. The
    /// frame's ack is passed to the BeginFrame source before returning,
    /// whether or not the frame activated.
    ///
    /// Invalid input is rejected before any state changes.
    pub fn submit_compositor_frame(
        &mut self,
        local_surface_id: LocalSurfaceId,
        mut frame: CompositorFrame,
        manager: &mut SurfaceManager,
        sources: &mut BeginFrameSources,
    ) -> Result<(), FrameSinkError> {
        let sequence_number = frame.metadata.begin_frame_ack.sequence_number;
        if sequence_number < BeginFrameArgs::STARTING_FRAME_NUMBER {
            return Err(InvalidArgument::SequenceBelowStart { sequence_number }.into());
        }
        if !local_surface_id.is_valid() {
            return Err(InvalidArgument::InvalidLocalSurfaceId(local_surface_id).into());
        }

        self.ack_pending_count += 1;
        frame.metadata.begin_frame_ack.has_damage = true;
        let ack = frame.metadata.begin_frame_ack;

        self.resource_holder.receive_from_child(&frame.resource_list);

        let surface_id = SurfaceId::new(self.frame_sink_id, local_surface_id);
        let previous = self.current_surface_id();
        let create_new_surface = previous != Some(surface_id);
        if create_new_surface {
            manager.create_surface(surface_id);
        }

        manager.queue_frame(
            surface_id,
            frame,
            Some(DrawCallback::new(surface_id)),
            Some(WillDrawCallback::new(surface_id)),
        );

        if create_new_surface {
            if let Some(previous) = previous {
                manager.set_previous_frame_surface(surface_id, previous);
                manager.destroy_surface(previous);
            }
            self.current_local_surface_id = local_surface_id;
        }

        self.did_finish_frame(ack, manager, sources);
        Ok(())
    }

    /// Reports a BeginFrame that produced no frame.
    pub fn begin_frame_did_not_swap(
        &mut self,
        ack: BeginFrameAck,
        manager: &mut SurfaceManager,
        sources: &mut BeginFrameSources,
    ) -> Result<(), FrameSinkError> {
        if ack.sequence_number < BeginFrameArgs::STARTING_FRAME_NUMBER {
            return Err(InvalidArgument::SequenceBelowStart {
                sequence_number: ack.sequence_number,
            }
            .into());
        }
        if ack.has_damage {
            return Err(InvalidArgument::DidNotSwapWithDamage {
                sequence_number: ack.sequence_number,
            }
            .into());
        }
        self.did_finish_frame(ack, manager, sources);
        Ok(())
    }

    /// Destroys the current surface and forgets it.
    pub fn evict_frame(&mut self, manager: &mut SurfaceManager) {
        let Some(surface_id) = self.current_surface_id() else {
            return;
        };
        self.current_local_surface_id = LocalSurfaceId::default();
        manager.destroy_surface(surface_id);
    }

    // -- References --

    /// Brings the reference graph in line with the active frame of
    /// `local_surface_id`.
    ///
    /// Edges into the new surface are added before edges into the old one are
    /// removed, so a surface that stays embedded is never unreachable in
    /// between. Updates for surfaces other than the current one are ignored.
    pub fn referenced_surfaces_changed(
        &mut self,
        local_surface_id: LocalSurfaceId,
        active_referenced_surfaces: Option<&[SurfaceId]>,
        manager: &mut SurfaceManager,
    ) {
        if !manager.using_surface_references() {
            return;
        }
        if local_surface_id != self.current_local_surface_id {
            return;
        }

        let last_surface_id = self.reference_tracker.current_surface_id();
        self.reference_tracker
            .update_references(local_surface_id, active_referenced_surfaces);
        let surface_id_changed = last_surface_id.local_surface_id != local_surface_id;
        let root = manager.root_surface_id();

        if surface_id_changed && self.config.is_root {
            let current = self.reference_tracker.current_surface_id();
            manager.add_surface_references(&[SurfaceReference::new(root, current)]);
        }
        if !self.reference_tracker.references_to_add().is_empty() {
            manager.add_surface_references(self.reference_tracker.references_to_add());
        }
        if surface_id_changed && self.config.is_root && last_surface_id.is_valid() {
            manager.remove_surface_references(&[SurfaceReference::new(root, last_surface_id)]);
        }
        if !self.reference_tracker.references_to_remove().is_empty() {
            manager.remove_surface_references(self.reference_tracker.references_to_remove());
        }
    }

    /// Claims the temporary reference of `surface_id` for this sink.
    pub fn claim_temporary_reference(&self, surface_id: SurfaceId, manager: &mut SurfaceManager) {
        manager.assign_temporary_reference(surface_id, self.frame_sink_id);
    }

    // -- Resources and acks --

    /// Hands resources back to the producer.
    ///
    /// With no ack outstanding they are reclaimed at once; otherwise they are
    /// held back and delivered with the next ack.
    pub fn return_resources(&mut self, resources: Vec<ReturnedResource>) {
        if resources.is_empty() {
            return;
        }
        if self.ack_pending_count == 0 {
            if let Some(client) = &mut self.client {
                client.reclaim_resources(&resources);
                return;
            }
        }
        self.surface_returned_resources.extend(resources);
    }

    /// Completes one outstanding ack, delivering buffered resources with it.
    pub fn did_receive_compositor_frame_ack(&mut self) {
        debug_assert!(self.ack_pending_count > 0, "ack without a submitted frame");
        self.ack_pending_count = self.ack_pending_count.saturating_sub(1);
        let Some(client) = &mut self.client else {
            return;
        };
        let resources = mem::take(&mut self.surface_returned_resources);
        client.did_receive_compositor_frame_ack(&resources);
    }

    /// Forwards a will-draw notification to the client.
    pub fn will_draw_surface(&mut self, local_surface_id: LocalSurfaceId, damage_rect: Rect) {
        if let Some(client) = &mut self.client {
            client.will_draw_surface(local_surface_id, damage_rect);
        }
    }

    /// Attaches a copy request to the current surface. Without one, the
    /// request is answered empty.
    pub fn request_copy_of_surface(
        &self,
        mut request: CopyOutputRequest,
        manager: &mut SurfaceManager,
    ) {
        match self.current_surface_id() {
            Some(surface_id) => manager.request_copy_of_surface(surface_id, request),
            None => request.send_empty_result(),
        }
    }

    // -- BeginFrames --

    /// Binds the support to a source, moving its registration over.
    pub fn set_begin_frame_source(
        &mut self,
        source: Option<BeginFrameSourceId>,
        sources: &mut BeginFrameSources,
    ) {
        if self.begin_frame_source == source {
            return;
        }
        if self.added_frame_observer {
            if let Some(old) = self.begin_frame_source.and_then(|id| sources.get_mut(&id)) {
                old.remove_observer(self.frame_sink_id);
            }
            self.added_frame_observer = false;
        }
        self.begin_frame_source = source;
        self.update_needs_begin_frames(sources);
    }

    /// Subscribes to or unsubscribes from the bound source. Idempotent.
    pub fn set_needs_begin_frame(
        &mut self,
        needs_begin_frame: bool,
        sources: &mut BeginFrameSources,
    ) {
        self.needs_begin_frame = needs_begin_frame;
        self.update_needs_begin_frames(sources);
    }

    // -- Routing --

    /// Handles one notification addressed to this sink.
    pub fn deliver(&mut self, notification: FrameSinkNotification, manager: &mut SurfaceManager) {
        match notification {
            FrameSinkNotification::ReferencedSurfacesChanged {
                local_surface_id,
                referenced_surfaces,
                ..
            } => self.referenced_surfaces_changed(
                local_surface_id,
                referenced_surfaces.as_deref(),
                manager,
            ),
            FrameSinkNotification::ReturnResources { resources, .. } => {
                let available = self.resource_holder.unref_resources(&resources);
                if !available.is_empty() {
                    let journal = manager.journal_mut();
                    journal.resources_returned(ResourcesReturnedEvent {
                        sink: self.frame_sink_id,
                        count: u32::try_from(available.len()).unwrap_or(u32::MAX),
                        with_ack: self.ack_pending_count > 0,
                        at: journal.now(),
                    });
                }
                self.return_resources(available);
            }
            FrameSinkNotification::DrawCallback { .. } => self.did_receive_compositor_frame_ack(),
            FrameSinkNotification::WillDraw {
                local_surface_id,
                damage_rect,
                ..
            } => self.will_draw_surface(local_surface_id, damage_rect),
        }
    }

    /// Teardown up to eviction: unsubscribes from BeginFrames, removes the
    /// root reference, and evicts the current surface.
    pub(crate) fn begin_teardown(
        &mut self,
        manager: &mut SurfaceManager,
        sources: &mut BeginFrameSources,
    ) {
        self.set_needs_begin_frame(false, sources);

        if manager.using_surface_references() && self.config.is_root {
            let surface_id = self.reference_tracker.current_surface_id();
            if surface_id.is_valid() {
                let root = manager.root_surface_id();
                manager.remove_surface_references(&[SurfaceReference::new(root, surface_id)]);
            }
        }

        self.evict_frame(manager);
    }

    // -- Internals --

    fn update_needs_begin_frames(&mut self, sources: &mut BeginFrameSources) {
        let Some(source) = self.begin_frame_source.and_then(|id| sources.get_mut(&id)) else {
            return;
        };
        if self.needs_begin_frame == self.added_frame_observer {
            return;
        }
        self.added_frame_observer = self.needs_begin_frame;
        if self.needs_begin_frame {
            source.add_observer(self.frame_sink_id);
        } else {
            source.remove_observer(self.frame_sink_id);
        }
    }

    fn did_finish_frame(
        &mut self,
        ack: BeginFrameAck,
        manager: &mut SurfaceManager,
        sources: &mut BeginFrameSources,
    ) {
        if let Some(last) = self.last_ack {
            let regressed =
                last.source_id == ack.source_id && ack.sequence_number < last.sequence_number;
            debug_assert!(
                !regressed,
                "BeginFrameAck sequence regressed from {} to {}",
                last.sequence_number, ack.sequence_number
            );
            if regressed {
                return;
            }
        }
        self.last_ack = Some(ack);

        let Some(source) = self.begin_frame_source.and_then(|id| sources.get_mut(&id)) else {
            return;
        };
        source.did_finish_frame(self.frame_sink_id, ack);
        let journal = manager.journal_mut();
        journal.did_finish_frame(DidFinishFrameEvent {
            sink: self.frame_sink_id,
            source: source.id(),
            sequence_number: ack.sequence_number,
            has_damage: ack.has_damage,
            at: journal.now(),
        });
    }
}

impl BeginFrameObserver for CompositorFrameSinkSupport {
    fn on_begin_frame(&mut self, args: &BeginFrameArgs) {
        self.last_begin_frame_args = Some(*args);
        if let Some(client) = &mut self.client {
            client.on_begin_frame(args);
        }
    }

    fn on_begin_frame_source_paused_changed(&mut self, paused: bool) {
        if let Some(client) = &mut self.client {
            client.on_begin_frame_paused_changed(paused);
        }
    }

    fn last_used_begin_frame_args(&self) -> Option<&BeginFrameArgs> {
        self.last_begin_frame_args.as_ref()
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
    use crate::frame::{RenderPass, RenderPassId};
    use crate::manager::SurfaceManagerConfig;
    use crate::resource::{ResourceId, TransferableResource};
    use crate::time::{TimeDelta, TimeTicks};

    const SOURCE: BeginFrameSourceId = BeginFrameSourceId(1);
    const ROOT_SINK: FrameSinkId = FrameSinkId::new(1, 1);
    const CHILD_SINK: FrameSinkId = FrameSinkId::new(2, 1);

    #[derive(Clone, Debug, PartialEq)]
    enum Call {
        Ack(Vec<ResourceId>),
        BeginFrame(u64),
        Reclaim(Vec<ResourceId>),
        WillDraw(LocalSurfaceId),
        Paused(bool),
    }

    #[derive(Clone, Default)]
    struct Recorder(Rc<RefCell<Vec<Call>>>);

    fn ids(resources: &[ReturnedResource]) -> Vec<ResourceId> {
        resources.iter().map(|r| r.id).collect()
    }

    impl CompositorFrameSinkSupportClient for Recorder {
        fn did_receive_compositor_frame_ack(&mut self, resources: &[ReturnedResource]) {
            self.0.borrow_mut().push(Call::Ack(ids(resources)));
        }
        fn on_begin_frame(&mut self, args: &BeginFrameArgs) {
            self.0.borrow_mut().push(Call::BeginFrame(args.sequence_number));
        }
        fn reclaim_resources(&mut self, resources: &[ReturnedResource]) {
            self.0.borrow_mut().push(Call::Reclaim(ids(resources)));
        }
        fn will_draw_surface(&mut self, local_surface_id: LocalSurfaceId, _damage_rect: Rect) {
            self.0.borrow_mut().push(Call::WillDraw(local_surface_id));
        }
        fn on_begin_frame_paused_changed(&mut self, paused: bool) {
            self.0.borrow_mut().push(Call::Paused(paused));
        }
    }

    struct Fixture {
        manager: SurfaceManager,
        sources: BeginFrameSources,
        support: CompositorFrameSinkSupport,
        calls: Rc<RefCell<Vec<Call>>>,
    }

    impl Fixture {
        fn new(sink: FrameSinkId, config: SupportConfig) -> Self {
            let mut manager = SurfaceManager::new(SurfaceManagerConfig::references());
            let recorder = Recorder::default();
            let calls = Rc::clone(&recorder.0);
            let support = CompositorFrameSinkSupport::new(
                sink,
                config,
                Some(Box::new(recorder)),
                &mut manager,
            );
            let mut sources = BeginFrameSources::new();
            sources.insert(SOURCE, BeginFrameSource::new(SOURCE, TimeDelta::from_millis(16)));
            Self {
                manager,
                sources,
                support,
                calls,
            }
        }

        fn submit(
            &mut self,
            local: LocalSurfaceId,
            frame: CompositorFrame,
        ) -> Result<(), FrameSinkError> {
            let result = self
                .support
                .submit_compositor_frame(local, frame, &mut self.manager, &mut self.sources);
            self.pump();
            result
        }

        fn pump(&mut self) {
            while let Some(n) = self.manager.pop_notification() {
                if n.frame_sink_id() == self.support.frame_sink_id() {
                    self.support.deliver(n, &mut self.manager);
                }
            }
        }

        fn calls(&self) -> Vec<Call> {
            self.calls.borrow().clone()
        }

        fn root_refs(&self) -> Vec<SurfaceId> {
            self.manager.child_references(&self.manager.root_surface_id())
        }
    }

    fn local(n: u32) -> LocalSurfaceId {
        LocalSurfaceId::new(n, 7)
    }

    fn frame() -> CompositorFrame {
        CompositorFrame::new(BeginFrameAck::new(SOURCE, 1, false))
            .with_render_pass(RenderPass::new(RenderPassId(1), Rect::new(0.0, 0.0, 4.0, 4.0)))
    }

    fn resource(id: u32) -> TransferableResource {
        TransferableResource::new(ResourceId(id), Size::new(1.0, 1.0))
    }

    fn returned(id: u32) -> ReturnedResource {
        resource(id).to_returned()
    }

    #[test]
    fn submission_is_validated_first() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let bad_seq = CompositorFrame::new(BeginFrameAck::new(SOURCE, 0, true));
        assert_eq!(
            fx.submit(local(1), bad_seq),
            Err(FrameSinkError::InvalidArgument(InvalidArgument::SequenceBelowStart {
                sequence_number: 0
            }))
        );
        assert!(matches!(
            fx.submit(LocalSurfaceId::default(), frame()),
            Err(FrameSinkError::InvalidArgument(InvalidArgument::InvalidLocalSurfaceId(_)))
        ));
        assert_eq!(fx.support.ack_pending_count(), 0, "nothing changed");
        assert_eq!(fx.manager.surface_count(), 0);
    }

    #[test]
    fn activation_acks_submission() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        assert_eq!(fx.submit(local(1), frame()), Ok(()));
        assert_eq!(fx.support.ack_pending_count(), 0);
        assert_eq!(fx.calls(), [Call::Ack(vec![])]);
        let id = SurfaceId::new(ROOT_SINK, local(1));
        assert!(
            fx.manager
                .surface(&id)
                .is_some_and(|s| s.active_frame().metadata.begin_frame_ack.has_damage),
            "damage forced on"
        );
    }

    #[test]
    fn returned_resources_wait_for_ack() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.ack_pending_count = 1;
        fx.support.return_resources(vec![returned(1)]);
        assert!(fx.calls().is_empty(), "held back while ack pending");
        fx.support.did_receive_compositor_frame_ack();
        assert_eq!(fx.calls(), [Call::Ack(vec![ResourceId(1)])]);
        assert_eq!(fx.support.ack_pending_count(), 0);
        fx.support.ack_pending_count = 1;
        fx.support.did_receive_compositor_frame_ack();
        assert_eq!(fx.calls().len(), 2, "delivered exactly once");
        assert_eq!(fx.calls()[1], Call::Ack(vec![]));
    }

    #[test]
    fn resources_accumulate_until_ack() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.ack_pending_count = 1;
        fx.support.return_resources(vec![returned(1)]);
        fx.support.return_resources(vec![returned(2)]);
        fx.support.did_receive_compositor_frame_ack();
        assert_eq!(fx.calls(), [Call::Ack(vec![ResourceId(1), ResourceId(2)])]);
    }

    #[test]
    fn idle_resources_are_reclaimed_directly() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.return_resources(Vec::new());
        assert!(fx.calls().is_empty(), "empty input ignored");
        fx.support.return_resources(vec![returned(3)]);
        assert_eq!(fx.calls(), [Call::Reclaim(vec![ResourceId(3)])]);
    }

    #[test]
    fn superseded_frame_resources_ride_the_next_ack() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.submit(local(1), frame().with_resources(vec![resource(1)])).unwrap();
        fx.submit(local(1), frame()).unwrap();
        assert_eq!(fx.calls(), [Call::Ack(vec![]), Call::Ack(vec![ResourceId(1)])]);
    }

    #[test]
    fn root_id_change_adds_before_removing() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.submit(local(1), frame()).unwrap();
        assert_eq!(fx.root_refs(), [SurfaceId::new(ROOT_SINK, local(1))]);
        fx.submit(local(2), frame()).unwrap();
        assert_eq!(fx.root_refs(), [SurfaceId::new(ROOT_SINK, local(2))]);
        assert!(
            fx.manager.surface(&SurfaceId::new(ROOT_SINK, local(1))).is_none(),
            "old surface collected once the root moved on"
        );
    }

    #[test]
    fn root_id_change_adds_embeds_before_releasing_old_root() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let shared = SurfaceId::new(FrameSinkId::new(3, 1), local(1));
        fx.manager.create_surface(shared);
        fx.manager.queue_frame(shared, frame(), None, None);
        fx.submit(local(1), frame().with_referenced_surfaces(&[shared])).unwrap();
        assert!(!fx.manager.has_temporary_reference(&shared), "claimed by the root surface");

        // Only the old root surface keeps it alive now.
        fx.manager.destroy_surface(shared);
        assert!(fx.manager.surface(&shared).is_some());

        fx.submit(local(2), frame().with_referenced_surfaces(&[shared])).unwrap();
        assert!(
            fx.manager.surface(&shared).is_some(),
            "new root surface referenced it before the old root was dropped"
        );
        assert_eq!(
            fx.manager.parent_references(&shared),
            [SurfaceId::new(ROOT_SINK, local(2))]
        );
        assert!(fx.manager.surface(&SurfaceId::new(ROOT_SINK, local(1))).is_none());
    }

    #[test]
    fn teardown_releases_root_before_eviction_fallout() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.set_begin_frame_source(Some(SOURCE), &mut fx.sources);
        fx.support.set_needs_begin_frame(true, &mut fx.sources);
        fx.submit(local(1), frame().with_resources(vec![resource(4)])).unwrap();
        fx.calls.borrow_mut().clear();

        fx.support.begin_teardown(&mut fx.manager, &mut fx.sources);
        assert!(!fx.sources[&SOURCE].has_observer(ROOT_SINK), "unsubscribed first");
        assert!(fx.root_refs().is_empty());
        assert_eq!(fx.manager.surface_count(), 0, "evicted surface collected");
        assert!(fx.calls().is_empty(), "fallout waits in the outbox");

        fx.pump();
        assert_eq!(fx.calls(), [Call::Reclaim(vec![ResourceId(4)])]);
        assert!(
            fx.manager.is_frame_sink_id_valid(ROOT_SINK),
            "invalidation comes after the client saw its resources"
        );
    }

    #[cfg(feature = "trace-rich")]
    #[test]
    fn root_id_change_orders_reference_updates() {
        use crate::trace::{ReferenceChange, ReferenceChangeKind, TraceSink, Tracer};

        #[derive(Default)]
        struct Changes(Vec<ReferenceChange>);
        impl TraceSink for Changes {
            fn on_reference_changes(&mut self, _at: TimeTicks, changes: &[ReferenceChange]) {
                self.0.extend_from_slice(changes);
            }
        }

        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.submit(local(1), frame()).unwrap();
        fx.submit(local(2), frame()).unwrap();
        let mut sink = Changes::default();
        fx.manager.journal_mut().replay(&mut Tracer::new(&mut sink));
        let root = fx.manager.root_surface_id();
        let kinds: Vec<_> = sink
            .0
            .iter()
            .filter(|c| c.parent == root)
            .map(|c| (c.child.local_surface_id, c.kind))
            .collect();
        assert_eq!(
            kinds,
            [
                (local(1), ReferenceChangeKind::Added),
                (local(2), ReferenceChangeKind::Added),
                (local(1), ReferenceChangeKind::Removed),
            ]
        );
    }

    #[test]
    fn child_frames_reference_their_embeds() {
        let mut fx = Fixture::new(CHILD_SINK, SupportConfig::child());
        let embedded = SurfaceId::new(FrameSinkId::new(3, 1), local(1));
        fx.manager.create_surface(embedded);
        fx.submit(local(1), frame().with_referenced_surfaces(&[embedded])).unwrap();
        let me = SurfaceId::new(CHILD_SINK, local(1));
        assert_eq!(fx.manager.child_references(&me), [embedded]);
        assert!(fx.root_refs().is_empty(), "child sinks are not rooted");

        fx.submit(local(1), frame()).unwrap();
        assert!(fx.manager.child_references(&me).is_empty(), "stale reference dropped");
    }

    #[test]
    fn pending_frame_does_not_change_references() {
        use crate::dependency::DependencyTrackerConfig;

        let mut fx = Fixture::new(CHILD_SINK, SupportConfig::child());
        fx.manager = SurfaceManager::new(
            SurfaceManagerConfig::references()
                .with_dependency_tracker(DependencyTrackerConfig::new(SOURCE)),
        );
        let missing = SurfaceId::new(FrameSinkId::new(3, 1), local(1));
        fx.submit(local(1), frame().with_embedded_surfaces(&[missing])).unwrap();
        let me = SurfaceId::new(CHILD_SINK, local(1));
        assert!(fx.manager.child_references(&me).is_empty());
        assert_eq!(fx.support.ack_pending_count(), 1, "ack waits for activation");
    }

    #[test]
    fn acks_go_to_the_source_before_activation() {
        use crate::dependency::DependencyTrackerConfig;

        let mut fx = Fixture::new(CHILD_SINK, SupportConfig::child());
        fx.manager = SurfaceManager::new(
            SurfaceManagerConfig::references()
                .with_dependency_tracker(DependencyTrackerConfig::new(SOURCE)),
        );
        fx.support.set_begin_frame_source(Some(SOURCE), &mut fx.sources);
        let missing = SurfaceId::new(FrameSinkId::new(3, 1), local(1));
        let f = CompositorFrame::new(BeginFrameAck::new(SOURCE, 5, false))
            .with_embedded_surfaces(&[missing]);
        fx.submit(local(1), f).unwrap();
        let ack = fx.sources[&SOURCE].last_ack_for_observer(CHILD_SINK).copied();
        assert_eq!(ack.map(|a| (a.sequence_number, a.has_damage)), Some((5, true)));
    }

    #[test]
    fn did_not_swap_is_validated_and_forwarded() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.set_begin_frame_source(Some(SOURCE), &mut fx.sources);
        let damaged = BeginFrameAck::new(SOURCE, 2, true);
        assert_eq!(
            fx.support
                .begin_frame_did_not_swap(damaged, &mut fx.manager, &mut fx.sources),
            Err(FrameSinkError::InvalidArgument(InvalidArgument::DidNotSwapWithDamage {
                sequence_number: 2
            }))
        );
        let ok = BeginFrameAck::new(SOURCE, 2, false);
        assert_eq!(
            fx.support
                .begin_frame_did_not_swap(ok, &mut fx.manager, &mut fx.sources),
            Ok(())
        );
        assert_eq!(fx.sources[&SOURCE].last_ack_for_observer(ROOT_SINK), Some(&ok));
    }

    #[cfg(debug_assertions)]
    #[test]
    #[should_panic(expected = "BeginFrameAck sequence regressed")]
    fn sequence_regression_asserts() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let _ = fx.support.begin_frame_did_not_swap(
            BeginFrameAck::new(SOURCE, 4, false),
            &mut fx.manager,
            &mut fx.sources,
        );
        let _ = fx.support.begin_frame_did_not_swap(
            BeginFrameAck::new(SOURCE, 3, false),
            &mut fx.manager,
            &mut fx.sources,
        );
    }

    #[test]
    fn subscription_is_idempotent() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.support.set_needs_begin_frame(true, &mut fx.sources);
        assert!(!fx.support.added_frame_observer(), "no source bound yet");
        fx.support.set_begin_frame_source(Some(SOURCE), &mut fx.sources);
        assert!(fx.support.added_frame_observer());
        fx.support.set_needs_begin_frame(true, &mut fx.sources);
        assert_eq!(fx.sources[&SOURCE].observer_count(), 1);
        fx.support.set_needs_begin_frame(false, &mut fx.sources);
        fx.support.set_needs_begin_frame(false, &mut fx.sources);
        assert!(!fx.sources[&SOURCE].has_observer(ROOT_SINK));
    }

    #[test]
    fn switching_sources_moves_registration() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let other = BeginFrameSourceId(2);
        fx.sources
            .insert(other, BeginFrameSource::new(other, TimeDelta::from_millis(8)));
        fx.support.set_begin_frame_source(Some(SOURCE), &mut fx.sources);
        fx.support.set_needs_begin_frame(true, &mut fx.sources);
        fx.support.set_begin_frame_source(Some(other), &mut fx.sources);
        assert!(!fx.sources[&SOURCE].has_observer(ROOT_SINK));
        assert!(fx.sources[&other].has_observer(ROOT_SINK));
    }

    #[test]
    fn begin_frames_reach_the_client() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let args = BeginFrameArgs {
            source_id: SOURCE,
            sequence_number: 9,
            frame_time: TimeTicks(100),
            deadline: TimeTicks(116),
            interval: TimeDelta(16),
        };
        fx.support.on_begin_frame(&args);
        fx.support.on_begin_frame_source_paused_changed(true);
        assert_eq!(fx.support.last_used_begin_frame_args(), Some(&args));
        assert_eq!(fx.calls(), [Call::BeginFrame(9), Call::Paused(true)]);
    }

    #[test]
    fn eviction_returns_resources() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.submit(local(1), frame().with_resources(vec![resource(4)])).unwrap();
        fx.support.begin_teardown(&mut fx.manager, &mut fx.sources);
        fx.pump();
        assert_eq!(fx.support.current_surface_id(), None);
        assert_eq!(fx.manager.surface_count(), 0);
        assert_eq!(fx.calls().last(), Some(&Call::Reclaim(vec![ResourceId(4)])));
    }

    #[test]
    fn will_draw_is_forwarded() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        fx.submit(local(1), frame()).unwrap();
        let id = SurfaceId::new(ROOT_SINK, local(1));
        fx.manager
            .run_will_draw_callback(id, Rect::new(0.0, 0.0, 1.0, 1.0));
        fx.pump();
        assert_eq!(fx.calls().last(), Some(&Call::WillDraw(local(1))));
    }

    #[test]
    fn copy_without_surface_is_answered_empty() {
        use core::cell::Cell;

        let fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let mut manager = SurfaceManager::default();
        let got = Rc::new(Cell::new(false));
        let flag = Rc::clone(&got);
        fx.support.request_copy_of_surface(
            CopyOutputRequest::new(move |r| flag.set(r.is_empty())),
            &mut manager,
        );
        assert!(got.get());
    }

    #[test]
    fn claimed_temporary_reference_is_owned() {
        let mut fx = Fixture::new(ROOT_SINK, SupportConfig::root());
        let orphan = SurfaceId::new(CHILD_SINK, local(1));
        fx.manager.create_surface(orphan);
        fx.manager.queue_frame(orphan, frame(), None, None);
        fx.support.claim_temporary_reference(orphan, &mut fx.manager);
        assert_eq!(fx.manager.temporary_reference_owner(&orphan), Some(ROOT_SINK));
    }
}
