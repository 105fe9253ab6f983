//! Span types flowing through the pipeline.
//!
//! ```text
//!  detector ──► DetectedSpan ──► CandidateSpan ──► VerificationResult ──► Span
//!               (local offsets,   (global offsets,  (status + reason       (handed to
//!                label + score)    text, source,     trail)                 the anonymizer)
//!                                  section)
//! ```
//!
//! All offsets are character offsets, `[start, end)`.

use crate::offset::SpanConverter;
use crate::types::Confidence;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything addressing a character range with a label and a score.
pub trait Spanned {
    /// Start (char offset, inclusive).
    fn start(&self) -> usize;
    /// End (char offset, exclusive).
    fn end(&self) -> usize;
    /// Entity type label.
    fn entity_type(&self) -> &str;
    /// Score in [0, 1].
    fn score(&self) -> f64;

    /// Length in characters.
    fn char_len(&self) -> usize {
        self.end().saturating_sub(self.start())
    }

    /// Half-open overlap test.
    fn overlaps<S: Spanned + ?Sized>(&self, other: &S) -> bool {
        spans_overlap(self.start(), self.end(), other.start(), other.end())
    }

    /// Number of shared character positions.
    fn overlap_len<S: Spanned + ?Sized>(&self, other: &S) -> usize {
        overlap_len(self.start(), self.end(), other.start(), other.end())
    }
}

/// Check if two half-open ranges overlap.
#[inline]
#[must_use]
pub fn spans_overlap(start1: usize, end1: usize, start2: usize, end2: usize) -> bool {
    start1 < end2 && start2 < end1
}

/// Size of the intersection of two half-open ranges.
#[inline]
#[must_use]
pub fn overlap_len(start1: usize, end1: usize, start2: usize, end2: usize) -> usize {
    let lo = start1.max(start2);
    let hi = end1.min(end2);
    hi.saturating_sub(lo)
}

// =============================================================================
// DetectedSpan
// =============================================================================

/// Raw detector output: what one detector believes, in the coordinates of
/// the text it was given.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedSpan {
    /// Detector-specific label, e.g. `JP_PERSON` or `PHONE_NUMBER_JP`.
    pub entity_type: String,
    /// Start (char offset, inclusive).
    pub start: usize,
    /// End (char offset, exclusive).
    pub end: usize,
    /// Raw detector score, clamped on construction.
    pub score: f64,
}

impl DetectedSpan {
    /// Create a detected span. The score is clamped to [0, 1].
    #[must_use]
    pub fn new(entity_type: impl Into<String>, start: usize, end: usize, score: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
            score: Confidence::saturating(score).get(),
        }
    }

    /// Zero or negative length spans carry no text and are discarded.
    #[must_use]
    pub fn is_well_formed(&self) -> bool {
        self.start < self.end
    }
}

impl Spanned for DetectedSpan {
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
    fn entity_type(&self) -> &str {
        &self.entity_type
    }
    fn score(&self) -> f64 {
        self.score
    }
}

// =============================================================================
// CandidateSpan
// =============================================================================

/// An unverified detection, placed in the document and its section.
///
/// `text` is always the slice of the analyzed text at `[start, end)`; it is
/// taken at construction and never recomputed. Re-scoring goes through
/// [`CandidateSpan::rescored`], which returns a new value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateSpan {
    /// Detector-specific label.
    pub entity_type: String,
    /// Surface text, `document[start..end]` in chars.
    pub text: String,
    /// Start (char offset in the document).
    pub start: usize,
    /// End (char offset, exclusive).
    pub end: usize,
    /// Score in [0, 1].
    pub score: Confidence,
    /// Which detector produced it, e.g. `rule:email_regex`, `ner:context`.
    pub source: String,
    /// Section identifier, e.g. `section_2`, or `unknown`.
    pub section_id: String,
    /// Section type, e.g. `contact`, `education`, `header`, or `unknown`.
    pub section_type: String,
}

impl CandidateSpan {
    /// Create a candidate outside any known section.
    #[must_use]
    pub fn new(
        entity_type: impl Into<String>,
        text: impl Into<String>,
        start: usize,
        end: usize,
        score: f64,
        source: impl Into<String>,
    ) -> Self {
        Self {
            entity_type: entity_type.into(),
            text: text.into(),
            start,
            end,
            score: Confidence::saturating(score),
            source: source.into(),
            section_id: crate::structure::UNKNOWN_SECTION.to_string(),
            section_type: crate::structure::UNKNOWN_SECTION.to_string(),
        }
    }

    /// Place a detector span inside `document`, slicing its text.
    ///
    /// `offset` is the char offset of the text the detector saw. Returns
    /// `None` for malformed spans (empty, inverted or out of range).
    #[must_use]
    pub fn place(
        detected: &DetectedSpan,
        document: &str,
        converter: &SpanConverter,
        offset: usize,
        source: &str,
    ) -> Option<Self> {
        if !detected.is_well_formed() {
            return None;
        }
        let start = offset + detected.start;
        let end = offset + detected.end;
        if end > converter.char_count() {
            return None;
        }
        let text = converter.slice(document, start..end);
        Some(Self::new(
            detected.entity_type.clone(),
            text,
            start,
            end,
            detected.score,
            source,
        ))
    }

    /// Attach section context.
    #[must_use]
    pub fn in_section(mut self, section_id: impl Into<String>, section_type: impl Into<String>) -> Self {
        self.section_id = section_id.into();
        self.section_type = section_type.into();
        self
    }

    /// Move from line-local to document offsets. `text` is unchanged, since
    /// a line is itself a slice of the document.
    #[must_use]
    pub fn shifted(mut self, offset: usize) -> Self {
        self.start += offset;
        self.end += offset;
        self
    }

    /// A copy carrying a different score.
    #[must_use]
    pub fn rescored(&self, score: Confidence) -> Self {
        Self {
            score,
            ..self.clone()
        }
    }

    /// Outbound form.
    #[must_use]
    pub fn to_span(&self) -> Span {
        Span {
            entity_type: self.entity_type.clone(),
            start: self.start,
            end: self.end,
            score: self.score.get(),
        }
    }
}

impl Spanned for CandidateSpan {
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
    fn entity_type(&self) -> &str {
        &self.entity_type
    }
    fn score(&self) -> f64 {
        self.score.get()
    }
}

// =============================================================================
// VerificationResult
// =============================================================================

/// Verdict of the verifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Confident enough to redact.
    Mask,
    /// Plausible, needs a human.
    Review,
    /// Not PII, or lost a collision.
    Exclude,
}

impl Status {
    /// `mask` or `review`.
    #[must_use]
    pub fn is_active(self) -> bool {
        matches!(self, Status::Mask | Status::Review)
    }

    /// Lowercase label.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Status::Mask => "mask",
            Status::Review => "review",
            Status::Exclude => "exclude",
        }
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One verified candidate with its audit trail.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    /// The candidate as extracted.
    pub candidate: CandidateSpan,
    /// Score after section adjustment.
    pub verified_score: Confidence,
    /// Verdict.
    pub status: Status,
    /// `; `-joined reasons, e.g. `section_penalty:education; format_valid:email`.
    pub reason: String,
}

impl VerificationResult {
    /// An exclusion with a single reason and a zeroed score.
    #[must_use]
    pub fn excluded(candidate: CandidateSpan, reason: impl Into<String>) -> Self {
        Self {
            candidate,
            verified_score: Confidence::MIN,
            status: Status::Exclude,
            reason: reason.into(),
        }
    }

    /// Outbound form, carrying the verified score.
    #[must_use]
    pub fn to_span(&self) -> Span {
        Span {
            entity_type: self.candidate.entity_type.clone(),
            start: self.candidate.start,
            end: self.candidate.end,
            score: self.verified_score.get(),
        }
    }
}

impl Spanned for VerificationResult {
    fn start(&self) -> usize {
        self.candidate.start
    }
    fn end(&self) -> usize {
        self.candidate.end
    }
    fn entity_type(&self) -> &str {
        &self.candidate.entity_type
    }
    fn score(&self) -> f64 {
        self.verified_score.get()
    }
}

// =============================================================================
// Span
// =============================================================================

/// A final, resolved span handed to the anonymizer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Span {
    /// Entity type label.
    pub entity_type: String,
    /// Start (char offset).
    pub start: usize,
    /// End (char offset, exclusive).
    pub end: usize,
    /// Score in [0, 1].
    pub score: f64,
}

impl Span {
    /// Create a span. The score is clamped to [0, 1].
    #[must_use]
    pub fn new(entity_type: impl Into<String>, start: usize, end: usize, score: f64) -> Self {
        Self {
            entity_type: entity_type.into(),
            start,
            end,
            score: Confidence::saturating(score).get(),
        }
    }
}

impl Spanned for Span {
    fn start(&self) -> usize {
        self.start
    }
    fn end(&self) -> usize {
        self.end
    }
    fn entity_type(&self) -> &str {
        &self.entity_type
    }
    fn score(&self) -> f64 {
        self.score
    }
}

impl From<&DetectedSpan> for Span {
    fn from(d: &DetectedSpan) -> Self {
        Span::new(d.entity_type.clone(), d.start, d.end, d.score)
    }
}
