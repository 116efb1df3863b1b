// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Surfaces, frame submission, and BeginFrame pacing for compositors.
//!
//! `framesink_core` models the producer/consumer core of a display
//! compositor: producers submit frames to surfaces, surfaces embed one
//! another, embedding forms a reference graph that decides which surfaces are
//! kept alive, and a shared pacing source tells producers when to draw. It is
//! `no_std` compatible (with `alloc`) and single-threaded: every operation
//! runs to completion on the caller's sequence.
//!
//! # Architecture
//!
//! ```text
//!   Producer ──submit──► FrameSinkManager ──► CompositorFrameSinkSupport
//!                               │                      │
//!                               │                      ▼
//!                               │              SurfaceManager::queue_frame
//!                               │                      │
//!                               │        Surface ──► SurfaceEvent
//!                               │                      │
//!                               │   dependency tracker, observers, damage
//!                               │                      │
//!                               ◄──── outbox ◄─────────┘
//!                               │
//!                               ▼
//!          ack / reclaim / references / will-draw ──► support ──► client
//!
//!   BeginFrameSource ──issue──► supports ──► clients
//!                          └──► SurfaceManager (dependency deadline)
//! ```
//!
//! **[`id`]**: Frame sink, local surface, and surface identities.
//!
//! **[`frame`]** / **[`resource`]**: Compositor frames, render passes, copy
//! requests, and ref-counted transferable resources.
//!
//! **[`surface`]**: A surface's pending and active frames and the events
//! its mutations produce.
//!
//! **[`manager`]**: [`SurfaceManager`](manager::SurfaceManager): surface
//! registry, reference graph, temporary references, garbage collection under
//! reference or sequence lifetime, and damage.
//!
//! **[`dependency`]**: Which pending surfaces wait on which surfaces, and
//! the BeginFrame-counted activation deadline.
//!
//! **[`reference_tracker`]**: Per-producer diff of referenced surfaces.
//!
//! **[`support`]**: [`CompositorFrameSinkSupport`](support::CompositorFrameSinkSupport),
//! the per-producer façade.
//!
//! **[`frame_sink_manager`]**: [`FrameSinkManager`](frame_sink_manager::FrameSinkManager),
//! the routing context that owns the rest and delivers callbacks.
//!
//! **[`begin_frame`]**: BeginFrame args, acks, sources, and observers.
//!
//! **[`observer`]**: Pending-frame observers for display-side consumers.
//!
//! **[`dirty`]**: The damage channel, tracked with `understory_dirty`.
//! Damage on a surface propagates to the surfaces that reference it.
//!
//! **[`trace`]**: [`TraceSink`](trace::TraceSink) trait and event types for
//! surface-lifecycle instrumentation, recorded into a journal and replayed
//! through the zero-overhead [`Tracer`](trace::Tracer) wrapper.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in dependencies.
//! - `trace` (disabled by default): Records trace events into the journal
//!   and enables `Tracer` method bodies.
//! - `trace-rich` (disabled by default, implies `trace`): Gates
//!   reference-graph change events.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

extern crate alloc;

pub mod begin_frame;
pub mod dependency;
pub mod dirty;
pub mod error;
pub mod frame;
pub mod frame_sink_manager;
pub mod id;
pub mod manager;
pub mod observer;
pub mod reference_tracker;
pub mod resource;
pub mod support;
pub mod surface;
pub mod time;
pub mod trace;
