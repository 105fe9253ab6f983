//! # masque
//!
//! PII redaction for text extracted from documents, built around a
//! multi-detector consensus engine.
//!
//! Several detectors look at the same text and disagree: about what counts
//! as PII, about labels (`PERSON` vs `JP_PERSON`), about boundaries. masque
//! reconciles them:
//!
//! - **Structure**: lines are tagged with the resume section they sit in
//!   (contact, education, ...) so section context can move scores.
//! - **Strategies**: standalone, hybrid routing (each type goes to one
//!   detector group) or dual consensus (names and addresses need both groups
//!   to agree).
//! - **Verification**: allow-list, section policy, format validation,
//!   thresholds, priority-based collision resolution.
//! - **Output**: one ordered, non-overlapping span list, plus an audit trail.
//!
//! ## Quick Start
//!
//! ```rust
//! use masque::{Config, Redactor};
//!
//! let redactor = Redactor::new(Config::default()).unwrap();
//! let result = redactor.mask("電話: 090-1234-5678 メール: test@example.com").unwrap();
//! assert_eq!(result.stats.total, 2);
//! assert!(!result.masked_text.contains("090-1234-5678"));
//! ```
//!
//! ## Pipeline
//!
//! ```text
//!  raw text ─► structure ─► extractor ─► strategy ─► verifier ─► merge ─► spans
//!              (segments)   (per group)  (route or   (policy +   (dedupe)   │
//!                                         consensus)  collisions)           ▼
//!                                                                       anonymize
//! ```
//!
//! ## Detectors
//!
//! Anything implementing [`Detector`] can be plugged in through a
//! [`backends::DetectorAdapter`]. Built in: [`backends::PatternDetector`],
//! [`backends::ContextDetector`] and [`backends::TokenClassificationDetector`]
//! over any [`backends::SequenceLabeler`].
//!
//! ## Design Philosophy
//!
//! - **Character offsets everywhere**: see [`offset`].
//! - **Detectors never abort a document**: failures are logged and read as
//!   "found nothing".
//! - **Deterministic**: merges depend on sorted order only, never on which
//!   detector finished first.

#![warn(missing_docs)]

pub mod allow_list;
pub mod anonymize;
pub mod audit;
pub mod backends;
pub mod category;
pub mod config;
pub mod engine;
mod error;
pub mod extractor;
pub mod merge;
pub mod offset;
pub mod span;
pub mod strategy;
pub mod structure;
pub mod types;
pub mod verifier;

/// A PII detector: given text and the entity types wanted, return spans.
///
/// Offsets in the returned spans are character offsets into `text`.
/// Implementations must not keep per-call mutable state; the engine may
/// call several detectors, or one detector on several documents, at once.
///
/// # Example
///
/// ```rust
/// use masque::{DetectedSpan, Detector, Result};
///
/// struct Shouting;
///
/// impl Detector for Shouting {
///     fn analyze(&self, text: &str, _entities: &[String]) -> Result<Vec<DetectedSpan>> {
///         Ok(text
///             .find("TARO")
///             .map(|i| DetectedSpan::new("PERSON", i, i + 4, 0.9))
///             .into_iter()
///             .collect())
///     }
///     fn supported_entities(&self) -> Vec<String> {
///         vec!["PERSON".to_string()]
///     }
///     fn name(&self) -> &str {
///         "shouting"
///     }
/// }
/// ```
pub trait Detector: Send + Sync {
    /// Detect spans of the requested `entities` in `text`.
    fn analyze(&self, text: &str, entities: &[String]) -> Result<Vec<DetectedSpan>>;

    /// Entity types this detector can produce.
    fn supported_entities(&self) -> Vec<String>;

    /// Short name, used in logs and default source tags.
    fn name(&self) -> &str;

    /// Human-readable description.
    fn description(&self) -> &'static str {
        "PII detector"
    }

    /// Whether the detector can currently run.
    fn is_available(&self) -> bool {
        true
    }
}

/// A detector returning canned spans, or a canned failure.
///
/// # Example
///
/// ```rust
/// use masque::{DetectedSpan, Detector, MockDetector};
///
/// let mock = MockDetector::new("test-mock")
///     .with_entities(&["PERSON"])
///     .with_spans(vec![DetectedSpan::new("PERSON", 0, 4, 0.9)]);
/// assert_eq!(mock.analyze("Taro", &[]).unwrap().len(), 1);
/// ```
#[derive(Debug, Clone)]
pub struct MockDetector {
    name: &'static str,
    spans: Vec<DetectedSpan>,
    types: Vec<String>,
    failure: Option<String>,
}

impl MockDetector {
    /// Create a mock detector.
    #[must_use]
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            spans: Vec::new(),
            types: Vec::new(),
            failure: None,
        }
    }

    /// Set supported entity types.
    #[must_use]
    pub fn with_entities(mut self, types: &[&str]) -> Self {
        self.types = types.iter().map(|t| (*t).to_string()).collect();
        self
    }

    /// Set spans to return on every call.
    #[must_use]
    pub fn with_spans(mut self, spans: Vec<DetectedSpan>) -> Self {
        self.spans = spans;
        self
    }

    /// Fail every call with a detector error.
    #[must_use]
    pub fn failing(mut self, message: impl Into<String>) -> Self {
        self.failure = Some(message.into());
        self
    }
}

impl Detector for MockDetector {
    fn analyze(&self, _text: &str, _entities: &[String]) -> Result<Vec<DetectedSpan>> {
        match &self.failure {
            Some(msg) => Err(Error::detector(msg.clone())),
            None => Ok(self.spans.clone()),
        }
    }

    fn supported_entities(&self) -> Vec<String> {
        self.types.clone()
    }

    fn name(&self) -> &str {
        self.name
    }

    fn description(&self) -> &'static str {
        "Mock detector for testing"
    }
}

pub mod prelude {
    //! Commonly used items, re-exported for convenience.
    //!
    //! ```rust
    //! use masque::prelude::*;
    //!
    //! let redactor = Redactor::new(Config::default()).unwrap();
    //! let analysis = redactor.analyze("TEL: 03-1234-5678");
    //! for span in &analysis.spans {
    //!     println!("{} {}-{}", span.entity_type, span.start, span.end);
    //! }
    //! ```
    pub use crate::audit::{AuditSink, LogSink, MemorySink, NullSink};
    pub use crate::backends::{
        ContextDetector, DetectorAdapter, DetectorGroup, DetectorScope, PatternDetector,
    };
    pub use crate::config::{Config, Language, LanguageMode, Strategy};
    pub use crate::engine::{Analysis, MaskingResult, Redactor};
    pub use crate::error::{Error, Result};
    pub use crate::span::{CandidateSpan, DetectedSpan, Span, Spanned, Status, VerificationResult};
    pub use crate::types::{Confidence, SpanSliceExt};
    pub use crate::{Detector, MockDetector};
}

// Re-exports
pub use allow_list::AllowList;
pub use anonymize::{Anonymizer, Operators, ReplaceAnonymizer};
pub use audit::{AuditEvent, AuditSink};
pub use category::CategoryTable;
pub use config::Config;
pub use engine::{Analysis, MaskedEntity, MaskingResult, MaskingStats, Redactor, RedactorBuilder};
pub use error::{Error, Result};
pub use offset::SpanConverter;
pub use span::{CandidateSpan, DetectedSpan, Span, Spanned, Status, VerificationResult};
