//! Extension traits for span collections.

use crate::span::Spanned;
use std::collections::BTreeMap;

/// Extension methods for slices of anything with a character range.
///
/// ```rust
/// use masque::{Span, types::SpanSliceExt};
///
/// let spans = vec![
///     Span::new("EMAIL_ADDRESS", 0, 16, 0.95),
///     Span::new("PHONE_NUMBER_JP", 20, 33, 0.9),
/// ];
/// assert!(!spans.has_overlaps());
/// assert!(spans.is_position_ordered());
/// ```
pub trait SpanSliceExt<T: Spanned> {
    /// Check if any two members overlap.
    fn has_overlaps(&self) -> bool;

    /// All overlapping pairs, in slice order.
    fn overlapping_pairs(&self) -> Vec<(&T, &T)>;

    /// `start` is monotonic non-decreasing.
    fn is_position_ordered(&self) -> bool;

    /// Members with the given entity type.
    fn of_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a T>
    where
        T: 'a;

    /// Count members per entity type.
    fn count_by_type(&self) -> BTreeMap<String, usize>;
}

impl<T: Spanned> SpanSliceExt<T> for [T] {
    fn has_overlaps(&self) -> bool {
        !self.overlapping_pairs().is_empty()
    }

    fn overlapping_pairs(&self) -> Vec<(&T, &T)> {
        let mut pairs = Vec::new();
        for (i, a) in self.iter().enumerate() {
            for b in &self[i + 1..] {
                if a.overlaps(b) {
                    pairs.push((a, b));
                }
            }
        }
        pairs
    }

    fn is_position_ordered(&self) -> bool {
        self.windows(2).all(|w| w[0].start() <= w[1].start())
    }

    fn of_type<'a>(&'a self, entity_type: &'a str) -> impl Iterator<Item = &'a T>
    where
        T: 'a,
    {
        self.iter().filter(move |s| s.entity_type() == entity_type)
    }

    fn count_by_type(&self) -> BTreeMap<String, usize> {
        let mut counts = BTreeMap::new();
        for s in self {
            *counts.entry(s.entity_type().to_string()).or_insert(0) += 1;
        }
        counts
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Span;

    #[test]
    fn detects_overlap_pairs() {
        let spans = vec![
            Span::new("A", 0, 5, 0.9),
            Span::new("B", 4, 8, 0.9),
            Span::new("C", 8, 10, 0.9),
        ];
        let pairs = spans.overlapping_pairs();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].0.entity_type, "A");
        assert!(spans.has_overlaps());
    }

    #[test]
    fn ordering_and_counts() {
        let spans = vec![
            Span::new("A", 0, 2, 0.9),
            Span::new("A", 2, 4, 0.9),
            Span::new("B", 1, 3, 0.9),
        ];
        assert!(!spans.is_position_ordered());
        assert_eq!(spans.of_type("A").count(), 2);
        assert_eq!(spans.count_by_type().get("B"), Some(&1));
    }
}
