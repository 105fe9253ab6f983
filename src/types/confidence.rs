//! Witness type for scores bounded to [0.0, 1.0].
//!
//! # What a score means depends on who produced it
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────────┐
//! │ Pattern detector   "did the regex match?"        0.6 - 0.95          │
//! │                    plus a context-word boost when a label like TEL   │
//! │                    or 〒 sits on the same line                       │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Context detector   "how many cues agreed?"       0.55 - 0.85         │
//! │                    honorifics, name labels, prefectures              │
//! ├──────────────────────────────────────────────────────────────────────┤
//! │ Sequence labeler   mean softmax over the tokens  0.0 - 1.0           │
//! │                    of the span                                       │
//! └──────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! These scales are not comparable, which is why overlaps are settled by
//! entity priority first and by score only as a tie-break. The one thing
//! every stage may rely on is the bound: once a value is a [`Confidence`] it
//! is in [0, 1], and section adjustments saturate instead of escaping.

use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

/// A score guaranteed to be in the range [0.0, 1.0].
///
/// # Construction
///
/// - [`Confidence::new`]: `None` if out of range
/// - [`Confidence::saturating`]: clamps, NaN becomes 0.0
/// - [`Confidence::try_from`]: `Err` if out of range
///
/// ```rust
/// use masque::types::Confidence;
///
/// assert!(Confidence::new(1.5).is_none());
/// let c = Confidence::saturating(0.8).adjust(-0.3);
/// assert!((c.get() - 0.5).abs() < 1e-9);
/// ```
#[derive(Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
#[repr(transparent)]
#[serde(transparent)]
pub struct Confidence(f64);

impl Confidence {
    /// Lowest possible score.
    pub const MIN: Self = Self(0.0);

    /// Highest possible score.
    pub const MAX: Self = Self(1.0);

    /// Strict constructor.
    #[must_use]
    #[inline]
    pub fn new(value: f64) -> Option<Self> {
        if (0.0..=1.0).contains(&value) {
            Some(Self(value))
        } else {
            None
        }
    }

    /// Clamp into range. NaN maps to 0.0.
    #[must_use]
    #[inline]
    pub fn saturating(value: f64) -> Self {
        if value.is_nan() {
            Self(0.0)
        } else {
            Self(value.clamp(0.0, 1.0))
        }
    }

    /// Raw value.
    #[must_use]
    #[inline]
    pub const fn get(self) -> f64 {
        self.0
    }

    /// Add a signed adjustment, saturating at the bounds.
    #[must_use]
    #[inline]
    pub fn adjust(self, delta: f64) -> Self {
        Self::saturating(self.0 + delta)
    }

    /// Total order, for sort keys. Values are never NaN.
    #[must_use]
    #[inline]
    pub fn total_cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

impl Default for Confidence {
    fn default() -> Self {
        Self::MIN
    }
}

impl fmt::Debug for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Confidence({:.4})", self.0)
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}

/// Error for out-of-range conversions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceError {
    /// The rejected value.
    pub value: f64,
}

impl fmt::Display for ConfidenceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "score {} is outside valid range [0.0, 1.0]", self.value)
    }
}

impl std::error::Error for ConfidenceError {}

impl TryFrom<f64> for Confidence {
    type Error = ConfidenceError;

    fn try_from(value: f64) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ConfidenceError { value })
    }
}

impl From<Confidence> for f64 {
    #[inline]
    fn from(conf: Confidence) -> Self {
        conf.0
    }
}

impl PartialEq<f64> for Confidence {
    fn eq(&self, other: &f64) -> bool {
        self.0 == *other
    }
}

impl PartialOrd<f64> for Confidence {
    fn partial_cmp(&self, other: &f64) -> Option<Ordering> {
        self.0.partial_cmp(other)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_rejects_out_of_range() {
        assert!(Confidence::new(0.0).is_some());
        assert!(Confidence::new(1.0).is_some());
        assert!(Confidence::new(-0.01).is_none());
        assert!(Confidence::new(f64::NAN).is_none());
    }

    #[test]
    fn saturating_clamps() {
        assert_eq!(Confidence::saturating(1.7).get(), 1.0);
        assert_eq!(Confidence::saturating(-3.0).get(), 0.0);
        assert_eq!(Confidence::saturating(f64::NAN).get(), 0.0);
    }

    #[test]
    fn adjust_saturates() {
        assert_eq!(Confidence::saturating(0.9).adjust(0.2).get(), 1.0);
        assert_eq!(Confidence::saturating(0.1).adjust(-0.3).get(), 0.0);
        assert!((Confidence::saturating(0.8).adjust(-0.3).get() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn try_from_reports_value() {
        let err = Confidence::try_from(2.0).unwrap_err();
        assert_eq!(err.value, 2.0);
        assert!(err.to_string().contains("outside"));
    }

    #[test]
    fn float_comparisons_agree() {
        let threshold = 0.7;
        let just_under = Confidence::saturating(threshold - f64::EPSILON / 2.0);
        assert!(just_under != threshold);
        assert!(just_under < threshold);
        assert!(Confidence::saturating(0.5).adjust(0.2) == threshold);
        assert!(Confidence::saturating(0.5).adjust(0.2) >= threshold);
    }

    #[test]
    fn display_two_decimals() {
        assert_eq!(Confidence::saturating(0.954).to_string(), "0.95");
    }
}
