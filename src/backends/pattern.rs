//! Pattern-based detector: format regexes with context-word boosting.
//!
//! Covers the PII whose shape gives it away: Japanese phone numbers and
//! postal codes, birth dates (western, kanji and era forms), email
//! addresses and North American phone numbers. A match scores its
//! pattern's base score, plus [`CONTEXT_BOOST`] when a context word such as
//! `TEL` or `〒` appears earlier on the same line.
//!
//! No names, no addresses: those need context, see
//! [`super::ContextDetector`].

use super::pattern_config::{supported_types, PatternDef, CONTEXT_BOOST, PATTERNS};
use crate::offset::SpanConverter;
use crate::span::DetectedSpan;
use crate::{Detector, Result};

/// Regex recognizers for format-bound PII.
#[derive(Debug, Clone, Copy, Default)]
pub struct PatternDetector;

impl PatternDetector {
    /// Create a pattern detector.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Detector for PatternDetector {
    fn analyze(&self, text: &str, entities: &[String]) -> Result<Vec<DetectedSpan>> {
        let conv = SpanConverter::new(text);
        let mut spans: Vec<DetectedSpan> = Vec::new();

        for def in PATTERNS.iter().filter(|d| entities.iter().any(|e| e == d.entity_type)) {
            for m in def.regex.find_iter(text) {
                let score = boosted_score(def, &text[..m.start()]);
                let range = conv.to_chars(m.range());
                push_best(&mut spans, DetectedSpan::new(def.entity_type, range.start, range.end, score));
            }
        }

        spans.sort_by_key(|s| (s.start, s.end));
        Ok(spans)
    }

    fn supported_entities(&self) -> Vec<String> {
        supported_types()
    }

    fn name(&self) -> &str {
        "pattern"
    }

    fn description(&self) -> &'static str {
        "Regex recognizers (phones, postal codes, birth dates, email) with context boosting"
    }
}

/// Base score, boosted when a context word appears on the line before the match.
fn boosted_score(def: &PatternDef, before: &str) -> f64 {
    let line = before.rsplit('\n').next().unwrap_or(before);
    if def.context.iter().any(|w| line.contains(w)) {
        (def.score + CONTEXT_BOOST).min(1.0)
    } else {
        def.score
    }
}

/// Keep one span per (type, range), with the best score.
fn push_best(spans: &mut Vec<DetectedSpan>, span: DetectedSpan) {
    match spans
        .iter_mut()
        .find(|s| s.entity_type == span.entity_type && s.start == span.start && s.end == span.end)
    {
        Some(existing) => existing.score = existing.score.max(span.score),
        None => spans.push(span),
    }
}
