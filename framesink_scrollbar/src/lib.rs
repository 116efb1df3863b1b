// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Overlay scrollbar fade and thinning animation.
//!
//! A [`ScrollbarAnimationController`](controller::ScrollbarAnimationController)
//! is a downstream consumer of compositor pacing. It never reads a clock or
//! schedules work itself. It asks its host for redraws and animation frames
//! through [`ScrollbarAnimationControllerClient`](client::ScrollbarAnimationControllerClient),
//! and the host drives it by calling `animate(now)` once per frame and handing
//! back delayed tasks when they come due.
//!
//! ```text
//!   scroll / mouse events ──► ScrollbarAnimationController ──► opacity
//!                                 │            │
//!                 delayed fade task            per-axis ThinningController ──► thumb scale
//!                                 │
//!   host frame loop ──animate(now)┘
//! ```
//!
//! **[`client`]**: the host interface and the scrollbar layers it owns.
//!
//! **[`config`]**: fade and thinning timings, with platform presets.
//!
//! **[`controller`]**: the fade state machine.
//!
//! **[`thinning`]**: thumb thickness for one scrollbar axis.
//!
//! # Crate features
//!
//! - `std` (disabled by default): Enables `std` support in `framesink_core`.

#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]

#[cfg(test)]
extern crate alloc;

pub mod client;
pub mod config;
pub mod controller;
pub mod thinning;
