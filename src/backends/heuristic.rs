//! Context-cue detector for names and places.
//!
//! Names and addresses have no fixed shape, but resumes announce them:
//! an honorific after a Japanese name, a `氏名:` label before it, a title
//! before an English name, a prefecture at the head of an address, a
//! locative preposition before a place. This detector looks for those cues
//! and nothing else, so its precision is moderate and its scores stay
//! below what the format detectors emit.
//!
//! Core principles:
//! 1. Cue words are small fixed lists, not lexicons of names.
//! 2. Cues yield spaCy-style labels (`PERSON`, `GPE`); [`map_label`] turns
//!    them into entity types by script, so kanji names are `JP_PERSON` and
//!    capitalized Latin names are `PERSON`.
//! 3. Overlapping hits of one label keep the first (longest-cue) match.

use crate::extractor::JP_PREFECTURES;
use crate::offset::SpanConverter;
use crate::span::{spans_overlap, DetectedSpan};
use crate::{Detector, Result};
use once_cell::sync::Lazy;
use regex::Regex;

/// Labels this detector can emit.
const CONTEXT_TYPES: &[&str] = &["JP_PERSON", "PERSON", "JP_ADDRESS", "LOCATION"];

/// Context-cue detector.
#[derive(Debug, Clone)]
pub struct ContextDetector {
    /// Spans scoring below this are dropped.
    threshold: f64,
}

impl Default for ContextDetector {
    fn default() -> Self {
        Self { threshold: 0.35 }
    }
}

impl ContextDetector {
    /// Detector with the default threshold.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Detector with a custom score threshold.
    #[must_use]
    pub fn with_threshold(threshold: f64) -> Self {
        Self { threshold }
    }
}

// Cue lists
const HONORIFICS: &[&str] = &["様", "さん", "氏", "君", "殿", "先生"];
const JP_NAME_LABELS: &[&str] = &["お名前", "氏名", "名前"];
const PERSON_PREFIX: &[&str] = &["Mr", "Mrs", "Ms", "Miss", "Dr", "Prof"];
const LOC_PREPOSITION: &[&str] = &["in", "from", "near", "at"];

// Capitalized words that follow a preposition without being places.
const NOT_A_PLACE: &[&str] = &[
    "January", "February", "March", "April", "May", "June", "July", "August", "September",
    "October", "November", "December", "Monday", "Tuesday", "Wednesday", "Thursday", "Friday",
    "Saturday", "Sunday", "The", "This", "That", "Our", "My", "Your", "Least", "First", "Last",
];

const HONORIFIC_SCORE: f64 = 0.7;
const LABELED_SCORE: f64 = 0.85;
const TITLED_SCORE: f64 = 0.75;
const PREFECTURE_SCORE: f64 = 0.6;
const PREFECTURE_DETAILED_SCORE: f64 = 0.75;
const LOCATIVE_SCORE: f64 = 0.55;

static JP_HONORIFIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(\p{{Han}}{{1,4}}[ ]?\p{{Han}}{{1,4}})(?:{})",
        HONORIFICS.join("|")
    ))
    .expect("JP_HONORIFIC regex is invalid")
});

static JP_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:{})\s*[:：]?\s*([\p{{Han}}\p{{Hiragana}}\p{{Katakana}}ー]{{1,8}}(?:[ ][\p{{Han}}\p{{Hiragana}}\p{{Katakana}}ー]{{1,8}})?)",
        JP_NAME_LABELS.join("|")
    ))
    .expect("JP_LABELED regex is invalid")
});

static EN_LABELED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i:full name|name)\s*[:：]\s*([A-Z][a-zA-Z'-]+(?:[ ][A-Z][a-zA-Z'-]+){0,3})")
        .expect("EN_LABELED regex is invalid")
});

static EN_TITLED: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:{})\.?[ ]+([A-Z][a-zA-Z'-]+(?:[ ][A-Z][a-zA-Z'-]+){{0,2}})",
        PERSON_PREFIX.join("|")
    ))
    .expect("EN_TITLED regex is invalid")
});

static JP_PLACE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"(?:{})[\p{{Han}}\p{{Hiragana}}\p{{Katakana}}ー0-9０-９\-－‐]*",
        JP_PREFECTURES.join("|")
    ))
    .expect("JP_PLACE regex is invalid")
});

static EN_LOCATIVE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(&format!(
        r"\b(?:{})[ ]+([A-Z][a-z]+(?:,?[ ][A-Z][a-z]+){{0,2}})",
        LOC_PREPOSITION.join("|")
    ))
    .expect("EN_LOCATIVE regex is invalid")
});

/// Map a spaCy-style label to an entity type, by the script of the span.
///
/// `PERSON` becomes `JP_PERSON` or `PERSON`; `GPE`/`LOC` become `JP_ADDRESS`
/// or `LOCATION`. Anything else has no counterpart.
#[must_use]
pub fn map_label(label: &str, text: &str) -> Option<&'static str> {
    let japanese = text.chars().any(is_japanese);
    match (label, japanese) {
        ("PERSON", true) => Some("JP_PERSON"),
        ("PERSON", false) => Some("PERSON"),
        ("GPE" | "LOC", true) => Some("JP_ADDRESS"),
        ("GPE" | "LOC", false) => Some("LOCATION"),
        _ => None,
    }
}

fn is_japanese(c: char) -> bool {
    ('\u{4e00}'..='\u{9fff}').contains(&c) // CJK Unified Ideographs
        || ('\u{3040}'..='\u{309f}').contains(&c) // Hiragana
        || ('\u{30a0}'..='\u{30ff}').contains(&c) // Katakana
}

/// A raw cue hit: spaCy-style label, char range, score.
type Hit = (&'static str, std::ops::Range<usize>, f64);

impl Detector for ContextDetector {
    fn analyze(&self, text: &str, entities: &[String]) -> Result<Vec<DetectedSpan>> {
        if text.is_empty() {
            return Ok(vec![]);
        }
        let conv = SpanConverter::new(text);
        let mut hits: Vec<Hit> = Vec::new();

        // Labels first: they are the stronger cue.
        group_hits(&mut hits, &conv, text, &JP_LABELED, "PERSON", LABELED_SCORE);
        group_hits(&mut hits, &conv, text, &EN_LABELED, "PERSON", LABELED_SCORE);
        group_hits(&mut hits, &conv, text, &JP_HONORIFIC, "PERSON", HONORIFIC_SCORE);
        group_hits(&mut hits, &conv, text, &EN_TITLED, "PERSON", TITLED_SCORE);

        for m in JP_PLACE.find_iter(text) {
            let range = conv.to_chars(m.range());
            let prefecture_len = JP_PREFECTURES
                .iter()
                .find(|p| m.as_str().starts_with(**p))
                .map_or(0, |p| p.chars().count());
            let score = if range.len() >= prefecture_len + 2 {
                PREFECTURE_DETAILED_SCORE
            } else {
                PREFECTURE_SCORE
            };
            hits.push(("GPE", range, score));
        }

        for caps in EN_LOCATIVE.captures_iter(text) {
            let Some(place) = caps.get(1) else { continue };
            let first = place.as_str().split([' ', ',']).next().unwrap_or("");
            if NOT_A_PLACE.contains(&first) {
                continue;
            }
            hits.push(("GPE", conv.to_chars(place.range()), LOCATIVE_SCORE));
        }

        let mut spans: Vec<DetectedSpan> = Vec::new();
        for (label, range, score) in hits {
            if score < self.threshold {
                continue;
            }
            let Some(entity_type) = map_label(label, conv.slice(text, range.clone())) else {
                continue;
            };
            if entities.iter().any(|e| e == entity_type) {
                push_unique(&mut spans, DetectedSpan::new(entity_type, range.start, range.end, score));
            }
        }

        spans.sort_by_key(|s| (s.start, s.end));
        Ok(spans)
    }

    fn supported_entities(&self) -> Vec<String> {
        CONTEXT_TYPES.iter().map(|t| (*t).to_string()).collect()
    }

    fn name(&self) -> &str {
        "context"
    }

    fn description(&self) -> &'static str {
        "Context cues: honorifics, name labels, titles, prefectures, locative prepositions"
    }
}

/// Collect capture group 1 of every match.
fn group_hits(
    hits: &mut Vec<Hit>,
    conv: &SpanConverter,
    text: &str,
    re: &Regex,
    label: &'static str,
    score: f64,
) {
    for caps in re.captures_iter(text) {
        if let Some(g) = caps.get(1) {
            hits.push((label, conv.to_chars(g.range()), score));
        }
    }
}

/// Skip a span overlapping one of the same label already found.
fn push_unique(spans: &mut Vec<DetectedSpan>, span: DetectedSpan) {
    let clash = spans.iter().any(|s| {
        s.entity_type == span.entity_type && spans_overlap(s.start, s.end, span.start, span.end)
    });
    if !clash && span.is_well_formed() {
        spans.push(span);
    }
}
