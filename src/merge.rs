//! Final span merging.
//!
//! Two greedy passes with different tolerances:
//!
//! - [`strict_dedupe`]: best score first, a span is dropped as soon as any
//!   of its characters is already covered. Collapses duplicate detections
//!   within one analysis.
//! - [`cross_run_merge`]: best score (then longest) first, a span is
//!   dropped only when more than [`CROSS_RUN_MAX_OVERLAP`] of it is already
//!   covered. Combines two full passes over the same text (English and
//!   Japanese), where near-duplicates with shifted boundaries are expected.
//!
//! Both return spans ordered by `start`.
//!
//! ```rust
//! use masque::merge::strict_dedupe;
//! use masque::Span;
//!
//! let merged = strict_dedupe(vec![
//!     Span::new("PHONE_NUMBER_JP", 4, 17, 0.9),
//!     Span::new("PHONE_NUMBER_JP", 4, 17, 1.0),
//!     Span::new("EMAIL_ADDRESS", 23, 39, 0.95),
//! ]);
//! assert_eq!(merged.len(), 2);
//! assert_eq!(merged[0].score, 1.0);
//! ```

use crate::span::Spanned;
use std::cmp::Ordering;
use std::collections::BTreeSet;

/// Largest share of a new span that may already be covered for
/// [`cross_run_merge`] to keep it (exclusive).
pub const CROSS_RUN_MAX_OVERLAP: f64 = 0.5;

fn by_score_desc<S: Spanned>(a: &S, b: &S) -> Ordering {
    b.score().total_cmp(&a.score())
}

/// Keep the best-scoring span of every overlapping group.
#[must_use]
pub fn strict_dedupe<S: Spanned>(mut spans: Vec<S>) -> Vec<S> {
    spans.sort_by(|a, b| by_score_desc(a, b).then_with(|| a.start().cmp(&b.start())));

    let mut accepted: Vec<S> = Vec::with_capacity(spans.len());
    for span in spans {
        if accepted.iter().all(|a| !a.overlaps(&span)) {
            accepted.push(span);
        }
    }
    accepted.sort_by_key(Spanned::start);
    accepted
}

/// Keep spans that are mostly new relative to better ones.
///
/// The result may contain overlaps (up to half of a span); callers needing
/// a disjoint list follow it with [`strict_dedupe`].
#[must_use]
pub fn cross_run_merge<S: Spanned>(mut spans: Vec<S>) -> Vec<S> {
    spans.sort_by(|a, b| {
        by_score_desc(a, b)
            .then_with(|| b.char_len().cmp(&a.char_len()))
            .then_with(|| a.start().cmp(&b.start()))
    });

    let mut covered: BTreeSet<usize> = BTreeSet::new();
    let mut accepted: Vec<S> = Vec::with_capacity(spans.len());
    for span in spans {
        let len = span.char_len();
        let shared = covered.range(span.start()..span.end()).count();
        if shared as f64 > CROSS_RUN_MAX_OVERLAP * len as f64 {
            log::debug!(
                "cross-run merge: dropping {} at {}..{} ({shared}/{len} covered)",
                span.entity_type(),
                span.start(),
                span.end()
            );
            continue;
        }
        covered.extend(span.start()..span.end());
        accepted.push(span);
    }
    accepted.sort_by_key(Spanned::start);
    accepted
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;
    use crate::types::SpanSliceExt;

    #[test]
    fn test_strict_dedupe_prefers_score() {
        let out = strict_dedupe(vec![
            Span::new("PERSON", 0, 10, 0.6),
            Span::new("JP_PERSON", 2, 6, 0.9),
            Span::new("DATE", 12, 20, 0.5),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].entity_type, "JP_PERSON");
        assert_eq!(out[1].entity_type, "DATE");
    }

    #[test]
    fn test_strict_dedupe_idempotent() {
        let once = strict_dedupe(vec![
            Span::new("A", 0, 5, 0.7),
            Span::new("B", 3, 8, 0.7),
            Span::new("C", 8, 9, 0.1),
        ]);
        assert_eq!(strict_dedupe(once.clone()), once);
        assert!(!once.has_overlaps());
        assert_eq!(once[0].entity_type, "A");
    }

    #[test]
    fn test_cross_run_tolerates_small_overlap() {
        let out = cross_run_merge(vec![
            Span::new("LOCATION", 0, 10, 0.9),
            Span::new("JP_ADDRESS", 8, 18, 0.8),
        ]);
        assert_eq!(out.len(), 2);
        assert!(out.is_position_ordered());
    }

    #[test]
    fn test_cross_run_rejects_near_duplicates() {
        let out = cross_run_merge(vec![
            Span::new("PERSON", 0, 4, 0.9),
            Span::new("JP_PERSON", 1, 4, 0.9),
        ]);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].entity_type, "PERSON");
    }

    #[test]
    fn test_cross_run_exactly_half_is_kept() {
        let out = cross_run_merge(vec![
            Span::new("A", 0, 4, 0.9),
            Span::new("B", 2, 6, 0.5),
        ]);
        assert_eq!(out.len(), 2);
        assert_eq!(strict_dedupe(out).len(), 1);
    }
}
