// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Error types for frame sink entry points.
//!
//! Only producer-facing input can fail. Programmer errors (reading a frame
//! that does not exist, using a stale handle) panic, and an unresolved
//! dependency is a surface state rather than an error.

use core::fmt;

use crate::begin_frame::BeginFrameSourceId;
use crate::id::{FrameSinkId, LocalSurfaceId};

/// A rejected producer argument.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum InvalidArgument {
    /// The ack carried a sequence number below
    /// [`BeginFrameArgs::STARTING_FRAME_NUMBER`](crate::begin_frame::BeginFrameArgs::STARTING_FRAME_NUMBER).
    SequenceBelowStart {
        /// The offending sequence number.
        sequence_number: u64,
    },
    /// The submission named an invalid local surface id.
    InvalidLocalSurfaceId(LocalSurfaceId),
    /// `begin_frame_did_not_swap` was called with an ack claiming damage.
    DidNotSwapWithDamage {
        /// Sequence number of the ack.
        sequence_number: u64,
    },
}

impl fmt::Display for InvalidArgument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SequenceBelowStart { sequence_number } => {
                write!(f, "begin frame sequence number {sequence_number} is below the start")
            }
            Self::InvalidLocalSurfaceId(id) => write!(f, "invalid local surface id {id:?}"),
            Self::DidNotSwapWithDamage { sequence_number } => write!(
                f,
                "did-not-swap ack {sequence_number} must not report damage"
            ),
        }
    }
}

impl core::error::Error for InvalidArgument {}

/// Errors from [`FrameSinkManager`](crate::frame_sink_manager::FrameSinkManager)
/// and [`CompositorFrameSinkSupport`](crate::support::CompositorFrameSinkSupport)
/// entry points.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSinkError {
    /// The producer supplied a malformed argument.
    InvalidArgument(InvalidArgument),
    /// No frame sink is registered under this id.
    UnknownFrameSink(FrameSinkId),
    /// A frame sink with this id already exists.
    FrameSinkAlreadyExists(FrameSinkId),
    /// No begin-frame source is registered under this id.
    UnknownBeginFrameSource(BeginFrameSourceId),
}

impl fmt::Display for FrameSinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidArgument(arg) => write!(f, "invalid argument: {arg}"),
            Self::UnknownFrameSink(id) => write!(f, "unknown frame sink {id:?}"),
            Self::FrameSinkAlreadyExists(id) => write!(f, "frame sink {id:?} already exists"),
            Self::UnknownBeginFrameSource(id) => write!(f, "unknown begin frame source {id:?}"),
        }
    }
}

impl core::error::Error for FrameSinkError {
    fn source(&self) -> Option<&(dyn core::error::Error + 'static)> {
        match self {
            Self::InvalidArgument(arg) => Some(arg),
            _ => None,
        }
    }
}

impl From<InvalidArgument> for FrameSinkError {
    fn from(arg: InvalidArgument) -> Self {
        Self::InvalidArgument(arg)
    }
}

#[cfg(test)]
mod tests {
    use alloc::string::ToString;

    use super::*;

    #[test]
    fn display_mentions_offending_value() {
        let err = FrameSinkError::from(InvalidArgument::SequenceBelowStart { sequence_number: 0 });
        let msg = err.to_string();
        assert!(msg.contains("sequence number 0"), "got {msg}");
    }

    #[test]
    fn invalid_argument_is_the_source() {
        use core::error::Error;
        let err = FrameSinkError::InvalidArgument(InvalidArgument::DidNotSwapWithDamage {
            sequence_number: 3,
        });
        assert!(err.source().is_some(), "invalid argument should chain");
        assert!(
            FrameSinkError::UnknownFrameSink(FrameSinkId::new(1, 1))
                .source()
                .is_none(),
            "lookup failures have no source"
        );
    }
}
