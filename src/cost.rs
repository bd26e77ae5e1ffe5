//! Saturating cost values.
//!
//! The evaluator needs an "unusable" cost for non-unique witnesses and for leaf
//! rows at foreign ids. Instead of a large magic integer that may overflow when
//! summed across segments, `Cost::INFINITE` absorbs every addition.

use std::fmt;
use std::ops::Add;

/// A non-negative transformation cost in compressed bytes, or infinity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Cost(u64);

impl Cost {
    pub const ZERO: Cost = Cost(0);
    pub const INFINITE: Cost = Cost(u64::MAX);

    #[inline]
    pub const fn new(value: u64) -> Self {
        // u64::MAX is reserved for infinity
        if value == u64::MAX { Cost(u64::MAX - 1) } else { Cost(value) }
    }

    #[inline]
    pub const fn is_finite(self) -> bool {
        self.0 != u64::MAX
    }

    /// The finite value, or `None` for infinity.
    #[inline]
    pub const fn value(self) -> Option<u64> {
        if self.is_finite() { Some(self.0) } else { None }
    }

    /// Multiply by a bootstrap weight. Zero weight gives zero even for infinity.
    #[inline]
    pub fn weighted(self, weight: u32) -> Cost {
        if weight == 0 {
            return Cost::ZERO;
        }
        if !self.is_finite() {
            return Cost::INFINITE;
        }
        match self.0.checked_mul(u64::from(weight)) {
            Some(v) if v != u64::MAX => Cost(v),
            _ => Cost::INFINITE,
        }
    }

    /// Signed difference `self - other` as a float, for the Metropolis rule.
    /// Infinite operands yield infinities of the appropriate sign.
    pub fn delta(self, other: Cost) -> f64 {
        match (self.value(), other.value()) {
            (Some(a), Some(b)) => a as f64 - b as f64,
            (None, Some(_)) => f64::INFINITY,
            (Some(_), None) => f64::NEG_INFINITY,
            (None, None) => 0.0,
        }
    }
}

impl Add for Cost {
    type Output = Cost;

    #[inline]
    fn add(self, rhs: Cost) -> Cost {
        if !self.is_finite() || !rhs.is_finite() {
            return Cost::INFINITE;
        }
        match self.0.checked_add(rhs.0) {
            Some(v) if v != u64::MAX => Cost(v),
            _ => Cost::INFINITE,
        }
    }
}

impl std::iter::Sum for Cost {
    fn sum<I: Iterator<Item = Cost>>(iter: I) -> Cost {
        iter.fold(Cost::ZERO, |acc, c| acc + c)
    }
}

impl From<u32> for Cost {
    fn from(value: u32) -> Self {
        Cost(u64::from(value))
    }
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.value() {
            Some(v) => write!(f, "{v}"),
            None => write!(f, "inf"),
        }
    }
}
