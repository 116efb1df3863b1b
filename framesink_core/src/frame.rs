// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Compositor frames and copy-output requests.
//!
//! A [`CompositorFrame`] is the unit a producer submits: a list of render
//! passes, the resources they draw from, and metadata describing which other
//! surfaces the frame embeds. [`embedded_surfaces`] gate activation and
//! [`referenced_surfaces`] drive the reference graph once the frame is active.
//!
//! [`embedded_surfaces`]: CompositorFrameMetadata::embedded_surfaces
//! [`referenced_surfaces`]: CompositorFrameMetadata::referenced_surfaces

use alloc::boxed::Box;
use alloc::vec::Vec;
use core::fmt;

use kurbo::Rect;

use crate::begin_frame::{BeginFrameAck, BeginFrameArgs, BeginFrameSourceId};
use crate::id::SurfaceId;
use crate::resource::TransferableResource;

// ---------------------------------------------------------------------------
// Copy output
// ---------------------------------------------------------------------------

/// Identifies who issued a copy request.
///
/// A surface keeps at most one outstanding request per source.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RequestSource(pub u64);

impl fmt::Debug for RequestSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RequestSource({:#x})", self.0)
    }
}

/// The answer to a [`CopyOutputRequest`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CopyOutputResult {
    /// Area that was captured, in the pass's coordinate space.
    pub rect: Rect,
    /// Captured pixels. `None` for an empty result.
    pub bitmap: Option<Vec<u8>>,
}

impl CopyOutputResult {
    /// A result carrying no pixels.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Returns `true` if the request could not be satisfied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.bitmap.is_none()
    }
}

type ResultCallback = Box<dyn FnOnce(CopyOutputResult)>;

/// A one-shot request for the pixels of a render pass.
///
/// The result callback runs exactly once. Dropping an unanswered request
/// answers it with an empty result.
pub struct CopyOutputRequest {
    source: Option<RequestSource>,
    callback: Option<ResultCallback>,
}

impl CopyOutputRequest {
    /// Creates a request that delivers its result to `callback`.
    pub fn new(callback: impl FnOnce(CopyOutputResult) + 'static) -> Self {
        Self {
            source: None,
            callback: Some(Box::new(callback)),
        }
    }

    /// Tags the request with a source; an older request from the same source
    /// is replaced when this one is attached to a surface.
    #[must_use]
    pub fn with_source(mut self, source: RequestSource) -> Self {
        self.source = Some(source);
        self
    }

    /// The request's source, if any.
    #[inline]
    #[must_use]
    pub const fn source(&self) -> Option<RequestSource> {
        self.source
    }

    /// Returns `true` if no result has been sent yet.
    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.callback.is_some()
    }

    /// Answers the request. Later calls are ignored.
    pub fn send_result(&mut self, result: CopyOutputResult) {
        if let Some(callback) = self.callback.take() {
            callback(result);
        }
    }

    /// Answers the request with an empty result.
    pub fn send_empty_result(&mut self) {
        self.send_result(CopyOutputResult::empty());
    }
}

impl Drop for CopyOutputRequest {
    fn drop(&mut self) {
        self.send_empty_result();
    }
}

impl fmt::Debug for CopyOutputRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CopyOutputRequest")
            .field("source", &self.source)
            .field("pending", &self.is_pending())
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Render passes
// ---------------------------------------------------------------------------

/// Identity of a render pass within a frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RenderPassId(pub u32);

/// One pass of a frame. The last pass in a frame's list is its root pass.
#[derive(Debug)]
pub struct RenderPass {
    /// Pass identity.
    pub id: RenderPassId,
    /// Output area of the pass.
    pub output_rect: Rect,
    /// Area that changed since the producer's previous frame.
    pub damage_rect: Rect,
    /// Outstanding copy requests against this pass.
    pub copy_requests: Vec<CopyOutputRequest>,
}

impl RenderPass {
    /// Creates a pass fully damaged over `output_rect`.
    #[must_use]
    pub fn new(id: RenderPassId, output_rect: Rect) -> Self {
        Self {
            id,
            output_rect,
            damage_rect: output_rect,
            copy_requests: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Frames
// ---------------------------------------------------------------------------

/// Per-frame metadata.
#[derive(Clone, Debug, PartialEq)]
pub struct CompositorFrameMetadata {
    /// Ack for the BeginFrame this frame answers.
    pub begin_frame_ack: BeginFrameAck,
    /// Surfaces that must have an active frame before this frame activates.
    pub embedded_surfaces: Vec<SurfaceId>,
    /// Surfaces this frame keeps alive once active.
    pub referenced_surfaces: Vec<SurfaceId>,
    /// Whether a deadline may activate the frame with dependencies missing.
    pub can_activate_before_dependencies: bool,
    /// Device pixels per layout pixel.
    pub device_scale_factor: f32,
}

impl Default for CompositorFrameMetadata {
    fn default() -> Self {
        Self {
            begin_frame_ack: BeginFrameAck::new(
                BeginFrameSourceId(0),
                BeginFrameArgs::STARTING_FRAME_NUMBER,
                true,
            ),
            embedded_surfaces: Vec::new(),
            referenced_surfaces: Vec::new(),
            can_activate_before_dependencies: true,
            device_scale_factor: 1.0,
        }
    }
}

/// A submitted frame.
#[derive(Debug, Default)]
pub struct CompositorFrame {
    /// Frame metadata.
    pub metadata: CompositorFrameMetadata,
    /// Render passes, root pass last.
    pub render_pass_list: Vec<RenderPass>,
    /// Resources the passes draw from.
    pub resource_list: Vec<TransferableResource>,
}

impl CompositorFrame {
    /// Creates an empty frame answering `ack`.
    #[must_use]
    pub fn new(ack: BeginFrameAck) -> Self {
        Self {
            metadata: CompositorFrameMetadata {
                begin_frame_ack: ack,
                ..CompositorFrameMetadata::default()
            },
            ..Self::default()
        }
    }

    /// Appends a render pass.
    #[must_use]
    pub fn with_render_pass(mut self, pass: RenderPass) -> Self {
        self.render_pass_list.push(pass);
        self
    }

    /// Sets the surfaces this frame both embeds and references.
    #[must_use]
    pub fn with_embedded_surfaces(mut self, surfaces: &[SurfaceId]) -> Self {
        self.metadata.embedded_surfaces = surfaces.to_vec();
        self.metadata.referenced_surfaces = surfaces.to_vec();
        self
    }

    /// Sets the referenced surfaces only.
    #[must_use]
    pub fn with_referenced_surfaces(mut self, surfaces: &[SurfaceId]) -> Self {
        self.metadata.referenced_surfaces = surfaces.to_vec();
        self
    }

    /// Sets the resource list.
    #[must_use]
    pub fn with_resources(mut self, resources: Vec<TransferableResource>) -> Self {
        self.resource_list = resources;
        self
    }

    /// The root (last) render pass.
    #[must_use]
    pub fn root_pass(&self) -> Option<&RenderPass> {
        self.render_pass_list.last()
    }

    /// Union of every pass's damage, or `None` for an empty frame.
    #[must_use]
    pub fn damage_rect(&self) -> Option<Rect> {
        self.render_pass_list
            .iter()
            .map(|pass| pass.damage_rect)
            .reduce(|acc, r| acc.union(r))
    }
}
