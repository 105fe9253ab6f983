//! Uniform, failure-isolating wrapper around a [`Detector`].
//!
//! Every detector, whatever its family, is reached through a
//! [`DetectorAdapter`]. The adapter:
//!
//! 1. intersects the detector's entity types with the requested ones and
//!    skips the call entirely when nothing is left;
//! 2. swallows detector errors *and panics*, logging a warning and
//!    reporting "found nothing";
//! 3. drops malformed spans (empty, inverted, out of range) with an audit
//!    entry, and spans of types nobody asked for;
//! 4. declares where the detector belongs (rule or precision group), how
//!    it wants its text (per line or whole document) and which languages
//!    it serves, so the router selects detectors declaratively.
//!
//! Adapters hold no mutable state of their own and can be invoked from
//! several threads at once.

use crate::audit::{AuditEvent, AuditSink, NullSink};
use crate::config::Language;
use crate::offset::SpanConverter;
use crate::span::CandidateSpan;
use crate::Detector;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;

/// Which side of a hybrid/dual split a detector sits on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorGroup {
    /// Hand-written rules and statistical/context detectors.
    Rule,
    /// A dedicated high-precision detector (usually neural).
    Precision,
}

/// What text a detector is handed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DetectorScope {
    /// Each segment's line, offsets shifted afterwards.
    Segment,
    /// The reconstructed full text; spans are bucketed into segments.
    Document,
}

/// Languages a detector serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LanguageSupport {
    /// Runs in every language pass.
    Any,
    /// Runs only in one pass.
    Only(Language),
}

impl LanguageSupport {
    /// Whether the detector takes part in a pass for `language`.
    #[must_use]
    pub fn serves(self, language: Language) -> bool {
        match self {
            LanguageSupport::Any => true,
            LanguageSupport::Only(l) => l == language,
        }
    }
}

/// A detector plus its declared capabilities.
#[derive(Clone)]
pub struct DetectorAdapter {
    detector: Arc<dyn Detector>,
    source: String,
    group: DetectorGroup,
    scope: DetectorScope,
    languages: LanguageSupport,
}

impl fmt::Debug for DetectorAdapter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorAdapter")
            .field("source", &self.source)
            .field("group", &self.group)
            .field("scope", &self.scope)
            .field("languages", &self.languages)
            .finish()
    }
}

impl DetectorAdapter {
    /// Wrap a detector: rule group, document scope, any language.
    pub fn new<D: Detector + 'static>(detector: D) -> Self {
        Self::from_arc(Arc::new(detector))
    }

    /// Wrap a shared detector.
    #[must_use]
    pub fn from_arc(detector: Arc<dyn Detector>) -> Self {
        let source = format!("ner:{}", detector.name());
        Self {
            detector,
            source,
            group: DetectorGroup::Rule,
            scope: DetectorScope::Document,
            languages: LanguageSupport::Any,
        }
    }

    /// Set the group.
    #[must_use]
    pub fn group(mut self, group: DetectorGroup) -> Self {
        self.group = group;
        self
    }

    /// Set the scope.
    #[must_use]
    pub fn scope(mut self, scope: DetectorScope) -> Self {
        self.scope = scope;
        self
    }

    /// Restrict to one language.
    #[must_use]
    pub fn language(mut self, language: Language) -> Self {
        self.languages = LanguageSupport::Only(language);
        self
    }

    /// Override the `source` tag stamped on candidates.
    #[must_use]
    pub fn source(mut self, source: impl Into<String>) -> Self {
        self.source = source.into();
        self
    }

    /// Source tag, e.g. `rule:pattern` or `ner:sequence`.
    #[must_use]
    pub fn source_tag(&self) -> &str {
        &self.source
    }

    /// Declared group.
    #[must_use]
    pub fn detector_group(&self) -> DetectorGroup {
        self.group
    }

    /// Declared scope.
    #[must_use]
    pub fn detector_scope(&self) -> DetectorScope {
        self.scope
    }

    /// Declared languages.
    #[must_use]
    pub fn languages(&self) -> LanguageSupport {
        self.languages
    }

    /// Wrapped detector's name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.detector.name()
    }

    /// Requested types this detector can produce, in request order.
    #[must_use]
    pub fn handled(&self, requested: &[String]) -> Vec<String> {
        let native = self.detector.supported_entities();
        requested
            .iter()
            .filter(|t| native.iter().any(|n| n == *t))
            .cloned()
            .collect()
    }

    /// Run the detector, never failing.
    #[must_use]
    pub fn analyze(&self, text: &str, requested: &[String]) -> Vec<CandidateSpan> {
        self.analyze_audited(text, requested, &NullSink)
    }

    /// Run the detector, reporting discarded spans to `audit`.
    ///
    /// Offsets of the returned candidates are relative to `text`; their
    /// section is `unknown` until the extractor places them.
    pub fn analyze_audited(
        &self,
        text: &str,
        requested: &[String],
        audit: &dyn AuditSink,
    ) -> Vec<CandidateSpan> {
        let wanted = self.handled(requested);
        if wanted.is_empty() {
            return Vec::new();
        }

        let outcome = catch_unwind(AssertUnwindSafe(|| self.detector.analyze(text, &wanted)));
        let detected = match outcome {
            Ok(Ok(spans)) => spans,
            Ok(Err(e)) => {
                log::warn!("detector {} failed, treating as empty: {}", self.name(), e);
                return Vec::new();
            }
            Err(_) => {
                log::warn!("detector {} panicked, treating as empty", self.name());
                return Vec::new();
            }
        };

        let conv = SpanConverter::new(text);
        let mut out = Vec::with_capacity(detected.len());
        for d in detected {
            if !wanted.contains(&d.entity_type) {
                continue;
            }
            match CandidateSpan::place(&d, text, &conv, 0, &self.source) {
                Some(c) => out.push(c),
                None => {
                    log::warn!(
                        "detector {} produced malformed span {} {}..{}",
                        self.name(),
                        d.entity_type,
                        d.start,
                        d.end
                    );
                    audit.record(&AuditEvent::Discarded {
                        source: &self.source,
                        entity_type: &d.entity_type,
                        start: d.start,
                        end: d.end,
                        reason: "malformed_span",
                    });
                }
            }
        }
        out
    }
}
