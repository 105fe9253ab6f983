//! End-to-end orchestration: text in, verified spans and masked text out.
//!
//! ```text
//! Redactor::analyze(text)
//!   │
//!   ├─ StructureRestorer        normalize + segment
//!   ├─ for each language pass
//!   │    ├─ StrategyRouter      extract per group, route or require consensus
//!   │    └─ Verifier            policy, thresholds, collisions
//!   └─ merge                    strict dedupe (single pass) or
//!                               cross-run merge + strict dedupe (auto)
//! ```
//!
//! [`Redactor::mask`] then hands the final spans to the [`Anonymizer`] and
//! writes one audit line per masked span.
//!
//! ```rust
//! use masque::audit::MemorySink;
//! use masque::{Config, Redactor};
//! use std::sync::Arc;
//!
//! let audit = Arc::new(MemorySink::new());
//! let redactor = Redactor::builder(Config::default())
//!     .audit(audit.clone())
//!     .build()
//!     .unwrap();
//! let result = redactor.mask("TEL: 03-1234-5678").unwrap();
//! assert_eq!(result.masked_text, "TEL: ****");
//! assert_eq!(audit.lines().last().unwrap(), "Total: 1 entities masked");
//! ```

use crate::allow_list::AllowList;
use crate::anonymize::{Anonymizer, Operators, ReplaceAnonymizer, TextSource};
use crate::audit::{AuditEvent, AuditSink, NullSink};
use crate::backends::{
    ContextDetector, DetectorAdapter, DetectorGroup, DetectorScope, LazyDetector, PatternDetector,
    SequenceLabeler, TokenClassificationDetector,
};
use crate::config::{Config, SequenceConfig};
use crate::error::Result;
use crate::merge::{cross_run_merge, strict_dedupe};
use crate::offset::SpanConverter;
use crate::span::{Span, Status, VerificationResult};
use crate::strategy::{ConsensusRecord, StrategyRouter};
use crate::structure::{Document, StructureRestorer};
use crate::verifier::{self, Verifier};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Everything one analysis produced.
#[derive(Debug, Clone)]
pub struct Analysis {
    /// Normalized text and its segments; all offsets refer to `document.text`.
    pub document: Document,
    /// Every verification result of every language pass, excluded ones
    /// included.
    pub results: Vec<VerificationResult>,
    /// Final masked spans: ordered by `start`, non-overlapping.
    pub spans: Vec<Span>,
    /// Consensus metadata from dual detection.
    pub consensus: Vec<ConsensusRecord>,
}

impl Analysis {
    /// Results with status `mask`.
    #[must_use]
    pub fn maskable(&self) -> Vec<&VerificationResult> {
        verifier::maskable(&self.results)
    }

    /// Results with status `review`.
    #[must_use]
    pub fn review(&self) -> Vec<&VerificationResult> {
        verifier::review(&self.results)
    }

    fn consensus_for(&self, span: &Span) -> Option<&ConsensusRecord> {
        self.consensus
            .iter()
            .find(|c| c.start == span.start && c.end == span.end && c.entity_type == span.entity_type)
    }
}

/// One masked entity as reported to the caller.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskedEntity {
    /// Entity type.
    pub entity_type: String,
    /// Original text.
    pub text: String,
    /// Start (char offset in the normalized text).
    pub start: usize,
    /// End (char offset, exclusive).
    pub end: usize,
    /// Final score.
    pub score: f64,
}

/// Counts of masked entities.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MaskingStats {
    /// Number of masked spans.
    pub total: usize,
    /// Masked spans per entity type.
    pub by_type: BTreeMap<String, usize>,
}

/// Output of [`Redactor::mask`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaskingResult {
    /// The normalized text with every final span replaced.
    pub masked_text: String,
    /// What was replaced, in text order.
    pub entities: Vec<MaskedEntity>,
    /// Counts.
    pub stats: MaskingStats,
}

/// The redaction pipeline.
///
/// Holds no per-document state; one instance can serve many documents
/// concurrently.
pub struct Redactor {
    config: Config,
    restorer: StructureRestorer,
    router: StrategyRouter,
    verifier: Verifier,
    adapters: Vec<DetectorAdapter>,
    operators: Operators,
    anonymizer: Arc<dyn Anonymizer>,
    audit: Arc<dyn AuditSink>,
}

impl fmt::Debug for Redactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Redactor")
            .field("strategy", &self.config.detection.strategy)
            .field("language", &self.config.detection.language)
            .field("adapters", &self.adapters)
            .finish()
    }
}

/// Builder for [`Redactor`].
pub struct RedactorBuilder {
    config: Config,
    adapters: Vec<DetectorAdapter>,
    sequence: Option<DetectorAdapter>,
    audit: Option<Arc<dyn AuditSink>>,
    allow_list: Option<AllowList>,
    anonymizer: Option<Arc<dyn Anonymizer>>,
}

impl RedactorBuilder {
    /// Register an extra detector, after the built-in ones.
    #[must_use]
    pub fn detector(mut self, adapter: DetectorAdapter) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Send audit events to `sink` instead of discarding them.
    #[must_use]
    pub fn audit(mut self, sink: Arc<dyn AuditSink>) -> Self {
        self.audit = Some(sink);
        self
    }

    /// Use `allow_list` instead of the one described by the config.
    #[must_use]
    pub fn allow_list(mut self, allow_list: AllowList) -> Self {
        self.allow_list = Some(allow_list);
        self
    }

    /// Replace the anonymizer.
    #[must_use]
    pub fn anonymizer(mut self, anonymizer: Arc<dyn Anonymizer>) -> Self {
        self.anonymizer = Some(anonymizer);
        self
    }

    /// Register a sequence-labeling detector in the precision group.
    ///
    /// Ignored unless `detectors.sequence.enabled` is set. `factory` runs on
    /// the first document that needs the detector, never here.
    #[must_use]
    pub fn sequence_labeler<L, F>(mut self, factory: F) -> Self
    where
        L: SequenceLabeler + 'static,
        F: Fn(&SequenceConfig) -> Result<L> + Send + Sync + 'static,
    {
        let settings = self.config.detectors.sequence.clone();
        if !settings.enabled {
            log::debug!("sequence labeler supplied but detectors.sequence is disabled");
            return self;
        }
        let mut entities: Vec<String> = settings.label_mapping.values().cloned().collect();
        entities.sort();
        entities.dedup();

        let lazy = LazyDetector::new("sequence", entities, move || {
            let labeler = factory(&settings)?;
            Ok(TokenClassificationDetector::from_config(labeler, &settings))
        });
        self.sequence = Some(
            DetectorAdapter::new(lazy)
                .group(DetectorGroup::Precision)
                .scope(DetectorScope::Document)
                .source("ner:sequence"),
        );
        self
    }

    /// Validate the config and assemble the pipeline.
    pub fn build(self) -> Result<Redactor> {
        self.config.validate()?;

        let mut adapters = Vec::new();
        if self.config.detectors.pattern.enabled {
            adapters.push(
                DetectorAdapter::new(PatternDetector::new())
                    .scope(DetectorScope::Segment)
                    .source("rule:pattern"),
            );
        }
        if self.config.detectors.context.enabled {
            adapters.push(DetectorAdapter::new(ContextDetector::new()).source("ner:context"));
        }
        adapters.extend(self.sequence);
        adapters.extend(self.adapters);

        let allow_list = self
            .allow_list
            .unwrap_or_else(|| AllowList::from_config(&self.config.allow_list));

        log::debug!(
            "redactor: {:?} strategy, {} adapters, {} allow-list terms",
            self.config.detection.strategy,
            adapters.len(),
            allow_list.len()
        );

        Ok(Redactor {
            restorer: StructureRestorer::new(&self.config.structure),
            router: StrategyRouter::new(&self.config),
            verifier: Verifier::new(&self.config, allow_list),
            operators: Operators::from_config(&self.config.masking),
            anonymizer: self.anonymizer.unwrap_or_else(|| Arc::new(ReplaceAnonymizer)),
            audit: self.audit.unwrap_or_else(|| Arc::new(NullSink)),
            adapters,
            config: self.config,
        })
    }
}

impl Redactor {
    /// Pipeline with the built-in detectors and no audit sink.
    pub fn new(config: Config) -> Result<Self> {
        Self::builder(config).build()
    }

    /// Start configuring a pipeline.
    #[must_use]
    pub fn builder(config: Config) -> RedactorBuilder {
        RedactorBuilder {
            config,
            adapters: Vec::new(),
            sequence: None,
            audit: None,
            allow_list: None,
            anonymizer: None,
        }
    }

    /// The configuration in use.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Registered detectors, in registration order.
    #[must_use]
    pub fn adapters(&self) -> &[DetectorAdapter] {
        &self.adapters
    }

    /// Detect, verify and merge.
    #[must_use]
    pub fn analyze(&self, text: &str) -> Analysis {
        let document = self.restorer.restore_document(text);
        let requested = &self.config.entities_to_mask;
        let passes = self.config.detection.language.passes();

        let mut results = Vec::new();
        let mut consensus = Vec::new();
        let mut masked = Vec::new();
        for &language in passes {
            let routed = self
                .router
                .route(&document, requested, &self.adapters, language, self.audit.as_ref());
            let verified = self.verifier.verify(routed.candidates);
            masked.extend(
                verified
                    .iter()
                    .filter(|r| r.status == Status::Mask)
                    .map(VerificationResult::to_span),
            );
            results.extend(verified);
            for record in routed.consensus {
                if !consensus.contains(&record) {
                    consensus.push(record);
                }
            }
        }

        let spans = if passes.len() > 1 {
            strict_dedupe(cross_run_merge(masked))
        } else {
            strict_dedupe(masked)
        };
        log::debug!("analysis: {} results, {} final spans", results.len(), spans.len());

        Analysis {
            document,
            results,
            spans,
            consensus,
        }
    }

    /// Analyze, then replace every final span.
    ///
    /// The masked text is the normalized text (see
    /// [`crate::structure::normalize_text`]) with spans replaced.
    pub fn mask(&self, text: &str) -> Result<MaskingResult> {
        let analysis = self.analyze(text);
        let doc_text = &analysis.document.text;
        let conv = SpanConverter::new(doc_text);
        self.audit.record(&AuditEvent::DocumentStart {
            chars: conv.char_count(),
        });

        let masked_text = self.anonymizer.anonymize(doc_text, &analysis.spans, &self.operators)?;

        let mut entities = Vec::with_capacity(analysis.spans.len());
        let mut stats = MaskingStats::default();
        for span in &analysis.spans {
            let excerpt = conv.slice(doc_text, span.start..span.end);
            match analysis.consensus_for(span) {
                Some(c) => self.audit.record(&AuditEvent::Consensus {
                    entity_type: &span.entity_type,
                    excerpt,
                    pattern_type: &c.pattern_type,
                    pattern_score: c.pattern_score,
                    precision_type: &c.precision_type,
                    precision_score: c.precision_score,
                    start: span.start,
                    end: span.end,
                }),
                None => self.audit.record(&AuditEvent::Masked {
                    entity_type: &span.entity_type,
                    excerpt,
                    score: span.score,
                    start: span.start,
                    end: span.end,
                }),
            }
            stats.total += 1;
            *stats.by_type.entry(span.entity_type.clone()).or_insert(0) += 1;
            entities.push(MaskedEntity {
                entity_type: span.entity_type.clone(),
                text: excerpt.to_string(),
                start: span.start,
                end: span.end,
                score: span.score,
            });
        }
        self.audit.record(&AuditEvent::DocumentEnd { total: stats.total });

        Ok(MaskingResult {
            masked_text,
            entities,
            stats,
        })
    }

    /// Read `path` through `source`, then mask it.
    pub fn mask_source(&self, source: &dyn TextSource, path: &Path) -> Result<MaskingResult> {
        let text = source.read(path)?;
        self.mask(&text)
    }

    /// Analyze independent documents, in parallel with the `parallel`
    /// feature. Output order matches input order.
    #[must_use]
    pub fn analyze_batch(&self, texts: &[&str]) -> Vec<Analysis> {
        #[cfg(feature = "parallel")]
        {
            texts.par_iter().map(|t| self.analyze(t)).collect()
        }
        #[cfg(not(feature = "parallel"))]
        {
            texts.iter().map(|t| self.analyze(t)).collect()
        }
    }
}
