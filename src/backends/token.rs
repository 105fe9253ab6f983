//! Token-classification detector: spans from per-token labels.
//!
//! The model itself sits behind [`SequenceLabeler`]: given a text it returns
//! one [`TokenPrediction`] per token (label, score, optional char offsets).
//! [`TokenClassificationDetector`] turns those into spans.
//!
//! # Span building
//!
//! ```text
//! token   [CLS]  山田   太郎   は   東京   [SEP]
//! label     -    人名   人名   O    地名     -
//!                └─JP_PERSON─┘      └JP_ADDRESS┘
//! ```
//!
//! - `B-X` closes the open span and opens one of `X` if `X` is mapped.
//! - `I-X` extends the open span when it has the same mapped type; otherwise
//!   it is ignored.
//! - A flat label (no prefix) extends an open span of the same type, or
//!   closes it and opens a new one. Unmapped flat labels close.
//! - `O` closes.
//!
//! A span's score is the running mean of its token scores, updated
//! incrementally from `(score, count)`.
//!
//! When the labeler reports no offsets, the span's tokens are detokenized
//! and searched for in the text: first verbatim, then with spaces removed
//! (CJK tokenizers insert them). Spans that cannot be placed are dropped.

use crate::config::SequenceConfig;
use crate::offset::SpanConverter;
use crate::span::DetectedSpan;
use crate::{Detector, Result};
use std::collections::BTreeMap;

/// One token as labeled by a model.
#[derive(Debug, Clone, PartialEq)]
pub struct TokenPrediction {
    /// Surface token, e.g. `Ta`, `##ro`, `山田`.
    pub token: String,
    /// Predicted label, e.g. `B-PER`, `人名`, `O`.
    pub label: String,
    /// Probability of the predicted label.
    pub score: f64,
    /// Char offsets into the labeled text, when the tokenizer provides them.
    pub offsets: Option<(usize, usize)>,
    /// `[CLS]`, `[SEP]`, padding.
    pub special: bool,
}

impl TokenPrediction {
    /// A token without offsets.
    #[must_use]
    pub fn new(token: impl Into<String>, label: impl Into<String>, score: f64) -> Self {
        Self {
            token: token.into(),
            label: label.into(),
            score,
            offsets: None,
            special: false,
        }
    }

    /// A special token, skipped by span building.
    #[must_use]
    pub fn special(token: impl Into<String>) -> Self {
        Self {
            special: true,
            ..Self::new(token, "O", 0.0)
        }
    }

    /// Attach char offsets.
    #[must_use]
    pub fn at(mut self, start: usize, end: usize) -> Self {
        self.offsets = Some((start, end));
        self
    }

    fn is_special(&self) -> bool {
        self.special || self.offsets == Some((0, 0))
    }
}

/// A model producing per-token labels.
pub trait SequenceLabeler: Send + Sync {
    /// Label every token of `text`.
    fn predict(&self, text: &str) -> Result<Vec<TokenPrediction>>;

    /// Rebuild surface text from tokens. WordPiece continuations (`##`)
    /// attach to the previous token; other tokens are space-separated.
    fn detokenize(&self, tokens: &[String]) -> String {
        tokens.join(" ").replace(" ##", "").replace('▁', " ").trim().to_string()
    }

    /// Model name, for logging.
    fn name(&self) -> &str {
        "sequence"
    }
}

/// A span under construction.
#[derive(Debug, Clone)]
struct OpenSpan {
    entity_type: String,
    offsets: Option<(usize, usize)>,
    tokens: Vec<String>,
    score: f64,
    token_count: usize,
}

impl OpenSpan {
    fn open(entity_type: &str, p: &TokenPrediction) -> Self {
        Self {
            entity_type: entity_type.to_string(),
            offsets: p.offsets,
            tokens: vec![p.token.clone()],
            score: p.score,
            token_count: 1,
        }
    }

    fn extend(&mut self, p: &TokenPrediction) {
        self.offsets = match (self.offsets, p.offsets) {
            (Some((start, _)), Some((_, end))) => Some((start, end)),
            _ => None,
        };
        self.tokens.push(p.token.clone());
        let n = self.token_count as f64;
        self.score = (self.score * n + p.score) / (n + 1.0);
        self.token_count += 1;
    }
}

/// Spans from a [`SequenceLabeler`].
pub struct TokenClassificationDetector<L> {
    labeler: L,
    label_mapping: BTreeMap<String, String>,
    min_confidence: f64,
}

impl<L: SequenceLabeler> TokenClassificationDetector<L> {
    /// Detector with the default mapping and threshold.
    pub fn new(labeler: L) -> Self {
        Self::from_config(labeler, &SequenceConfig::default())
    }

    /// Detector using the mapping and threshold of `config`.
    pub fn from_config(labeler: L, config: &SequenceConfig) -> Self {
        Self {
            labeler,
            label_mapping: config.label_mapping.clone(),
            min_confidence: config.min_confidence,
        }
    }

    /// Replace the label mapping.
    #[must_use]
    pub fn with_mapping(mut self, mapping: BTreeMap<String, String>) -> Self {
        self.label_mapping = mapping;
        self
    }

    /// Replace the score threshold.
    #[must_use]
    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }

    /// Entity type for a model label: the full label first, then the label
    /// without its `B-`/`I-` prefix.
    fn map_label(&self, label: &str) -> Option<&str> {
        self.label_mapping
            .get(label)
            .or_else(|| {
                label
                    .strip_prefix("B-")
                    .or_else(|| label.strip_prefix("I-"))
                    .and_then(|bare| self.label_mapping.get(bare))
            })
            .map(String::as_str)
    }

    fn build_spans(&self, predictions: &[TokenPrediction]) -> Vec<OpenSpan> {
        let mut spans = Vec::new();
        let mut current: Option<OpenSpan> = None;

        for p in predictions.iter().filter(|p| !p.is_special()) {
            let label = p.label.as_str();
            if label == "O" {
                spans.extend(current.take());
            } else if label.starts_with("B-") {
                spans.extend(current.take());
                current = self.map_label(label).map(|ty| OpenSpan::open(ty, p));
            } else if label.starts_with("I-") {
                if let Some(open) = current.as_mut() {
                    if self.map_label(label) == Some(open.entity_type.as_str()) {
                        open.extend(p);
                    }
                }
            } else {
                match self.map_label(label) {
                    Some(ty) => match current.as_mut() {
                        Some(open) if open.entity_type == ty => open.extend(p),
                        _ => {
                            spans.extend(current.take());
                            current = Some(OpenSpan::open(ty, p));
                        }
                    },
                    None => spans.extend(current.take()),
                }
            }
        }
        spans.extend(current);
        spans
    }

    /// Char range of a span, from offsets or by searching for its text.
    fn place(&self, span: &OpenSpan, text: &str, conv: &SpanConverter) -> Option<(usize, usize)> {
        if let Some(offsets) = span.offsets {
            return Some(offsets);
        }
        let surface = self.labeler.detokenize(&span.tokens);
        let compact: String = surface.chars().filter(|c| *c != ' ').collect();
        [surface, compact]
            .into_iter()
            .filter(|needle| !needle.is_empty())
            .find_map(|needle| {
                conv.find_from(text, &needle, 0)
                    .map(|start| (start, start + needle.chars().count()))
            })
    }
}

impl<L: SequenceLabeler> Detector for TokenClassificationDetector<L> {
    fn analyze(&self, text: &str, entities: &[String]) -> Result<Vec<DetectedSpan>> {
        let predictions = self.labeler.predict(text)?;
        let conv = SpanConverter::new(text);

        let mut out = Vec::new();
        for span in self.build_spans(&predictions) {
            if !entities.contains(&span.entity_type) || span.score < self.min_confidence {
                continue;
            }
            match self.place(&span, text, &conv) {
                Some((start, end)) => {
                    out.push(DetectedSpan::new(span.entity_type, start, end, span.score));
                }
                None => log::warn!(
                    "{}: could not place {} span {:?}, dropping",
                    self.labeler.name(),
                    span.entity_type,
                    span.tokens
                ),
            }
        }
        log::debug!("{}: {} spans from {} tokens", self.labeler.name(), out.len(), predictions.len());
        Ok(out)
    }

    fn supported_entities(&self) -> Vec<String> {
        let mut types: Vec<String> = self.label_mapping.values().cloned().collect();
        types.sort();
        types.dedup();
        types
    }

    fn name(&self) -> &str {
        self.labeler.name()
    }

    fn description(&self) -> &'static str {
        "Token classification (BIO or flat labels) over a sequence labeler"
    }
}
