// Copyright 2026 the Subduction Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Monotonic timestamps and durations in nanoseconds.
//!
//! [`TimeTicks`] is a point on the compositor's monotonic clock, [`TimeDelta`]
//! a non-negative span between two such points. The core never reads a clock
//! itself: hosts pass `now` into every time-dependent call, which keeps
//! BeginFrame pacing and scrollbar animation deterministic under test.

use core::fmt;
use core::ops::{Add, Sub};

/// A point in time on the compositor's monotonic clock, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeTicks(pub u64);

impl TimeTicks {
    /// The clock origin.
    pub const ZERO: Self = Self(0);

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns the span since an earlier time, or zero if `earlier` is later.
    #[inline]
    #[must_use]
    pub const fn saturating_since(self, earlier: Self) -> TimeDelta {
        TimeDelta(self.0.saturating_sub(earlier.0))
    }

    /// Checked addition of a span.
    #[inline]
    #[must_use]
    pub const fn checked_add(self, delta: TimeDelta) -> Option<Self> {
        match self.0.checked_add(delta.0) {
            Some(t) => Some(Self(t)),
            None => None,
        }
    }
}

impl Add<TimeDelta> for TimeTicks {
    type Output = Self;

    #[inline]
    fn add(self, rhs: TimeDelta) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl Sub for TimeTicks {
    type Output = TimeDelta;

    #[inline]
    fn sub(self, rhs: Self) -> TimeDelta {
        self.saturating_since(rhs)
    }
}

impl fmt::Debug for TimeTicks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeTicks({})", self.0)
    }
}

/// A non-negative span of time, in nanoseconds.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct TimeDelta(pub u64);

impl TimeDelta {
    /// The empty span.
    pub const ZERO: Self = Self(0);

    /// Creates a span from milliseconds.
    #[inline]
    #[must_use]
    pub const fn from_millis(ms: u64) -> Self {
        Self(ms.saturating_mul(1_000_000))
    }

    /// Creates a span from microseconds.
    #[inline]
    #[must_use]
    pub const fn from_micros(us: u64) -> Self {
        Self(us.saturating_mul(1_000))
    }

    /// Returns the raw nanosecond value.
    #[inline]
    #[must_use]
    pub const fn nanos(self) -> u64 {
        self.0
    }

    /// Returns `true` for the empty span.
    #[inline]
    #[must_use]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Returns `self / other` as a float, or `1.0` when `other` is zero.
    ///
    /// Used for animation progress, where a zero-length animation completes
    /// on its first frame.
    #[inline]
    #[must_use]
    #[expect(
        clippy::cast_possible_truncation,
        reason = "progress values are consumed as f32 opacities and scales"
    )]
    pub fn fraction_of(self, other: Self) -> f32 {
        if other.0 == 0 {
            return 1.0;
        }
        (self.0 as f64 / other.0 as f64) as f32
    }
}

impl Add for TimeDelta {
    type Output = Self;

    #[inline]
    fn add(self, rhs: Self) -> Self {
        Self(self.0.saturating_add(rhs.0))
    }
}

impl fmt::Debug for TimeDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TimeDelta({}ns)", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn since_saturates() {
        let a = TimeTicks(100);
        let b = TimeTicks(250);
        assert_eq!(b - a, TimeDelta(150));
        assert_eq!(a - b, TimeDelta::ZERO);
    }

    #[test]
    fn millis_and_micros() {
        assert_eq!(TimeDelta::from_millis(16).nanos(), 16_000_000);
        assert_eq!(TimeDelta::from_micros(5).nanos(), 5_000);
    }

    #[test]
    fn fraction_of_zero_duration_is_complete() {
        assert_eq!(TimeDelta(10).fraction_of(TimeDelta::ZERO), 1.0);
        assert_eq!(TimeDelta(5).fraction_of(TimeDelta(10)), 0.5);
    }

    #[test]
    fn checked_add_overflow() {
        assert_eq!(TimeTicks(u64::MAX).checked_add(TimeDelta(1)), None);
        assert_eq!(TimeTicks(1).checked_add(TimeDelta(1)), Some(TimeTicks(2)));
    }
}
