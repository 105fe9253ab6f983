//! Detection strategies: how the rule and precision groups are combined.
//!
//! | Strategy | Rule group asked for | Precision group asked for | Combination |
//! |----------|---------------------|---------------------------|-------------|
//! | standalone | everything (with precision adapters alongside) | - | one extraction |
//! | hybrid | `rule_entities` | `precision_entities` | concatenation |
//! | dual | everything | everything | consensus on categorized labels |
//!
//! Under dual consensus a rule-side candidate whose label sits in the
//! category table survives only when some precision-side candidate agrees
//! with it: same normalized category, and an overlap of at least
//! [`CONSENSUS_MIN_OVERLAP`] of the smaller span. Labels outside the table
//! pass straight through from the rule side.
//!
//! ```rust
//! use masque::strategy::dual_consensus;
//! use masque::{CandidateSpan, CategoryTable};
//!
//! let rule = vec![CandidateSpan::new("JP_PERSON", "山田太郎", 0, 4, 0.7, "ner:context")];
//! let precision = vec![CandidateSpan::new("PERSON", "山田太郎様", 0, 5, 0.97, "ner:sequence")];
//! let routed = dual_consensus(rule, &precision, &CategoryTable::default());
//! assert_eq!(routed.candidates.len(), 1);
//! assert_eq!(routed.consensus[0].precision_type, "PERSON");
//! ```

use crate::audit::AuditSink;
use crate::backends::{DetectorAdapter, DetectorGroup};
use crate::category::CategoryTable;
use crate::config::{Config, Language, Strategy};
use crate::extractor::{CandidateExtractor, DetectorSet};
use crate::span::{CandidateSpan, Spanned};
use crate::structure::Document;
use serde::{Deserialize, Serialize};

/// Minimum share of the smaller span two candidates must overlap by to
/// agree under dual consensus (inclusive).
pub const CONSENSUS_MIN_OVERLAP: f64 = 0.5;

/// Both sides of an agreement reached under dual consensus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusRecord {
    /// Label of the retained candidate.
    pub entity_type: String,
    /// Rule-side label.
    pub pattern_type: String,
    /// Rule-side raw score.
    pub pattern_score: f64,
    /// Precision-side label.
    pub precision_type: String,
    /// Precision-side raw score.
    pub precision_score: f64,
    /// Start of the retained candidate.
    pub start: usize,
    /// End of the retained candidate.
    pub end: usize,
}

/// Candidates ready for verification, plus consensus metadata.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Routed {
    /// Candidates to verify.
    pub candidates: Vec<CandidateSpan>,
    /// One record per candidate retained by consensus.
    pub consensus: Vec<ConsensusRecord>,
}

/// Whether two spans overlap by at least [`CONSENSUS_MIN_OVERLAP`] of the
/// smaller one.
#[must_use]
pub fn consensus_overlap<A: Spanned, B: Spanned>(a: &A, b: &B) -> bool {
    let shared = a.overlap_len(b);
    let smaller = a.char_len().min(b.char_len());
    shared > 0 && shared as f64 >= CONSENSUS_MIN_OVERLAP * smaller as f64
}

/// Filter rule-side candidates by agreement with the precision side.
///
/// Each rule-side candidate needing consensus is matched against the
/// precision candidates in order; the first agreeing one confirms it.
#[must_use]
pub fn dual_consensus(
    rule: Vec<CandidateSpan>,
    precision: &[CandidateSpan],
    categories: &CategoryTable,
) -> Routed {
    let mut routed = Routed::default();
    for candidate in rule {
        if !categories.requires_consensus(&candidate.entity_type) {
            routed.candidates.push(candidate);
            continue;
        }
        let agreeing = precision.iter().find(|p| {
            categories.same_category(&candidate.entity_type, &p.entity_type) && consensus_overlap(&candidate, *p)
        });
        match agreeing {
            Some(p) => {
                routed.consensus.push(ConsensusRecord {
                    entity_type: candidate.entity_type.clone(),
                    pattern_type: candidate.entity_type.clone(),
                    pattern_score: candidate.score.get(),
                    precision_type: p.entity_type.clone(),
                    precision_score: p.score.get(),
                    start: candidate.start,
                    end: candidate.end,
                });
                routed.candidates.push(candidate);
            }
            None => log::debug!(
                "no precision agreement for {} {:?} at {}..{}",
                candidate.entity_type,
                candidate.text,
                candidate.start,
                candidate.end
            ),
        }
    }
    routed
}

/// Runs the configured strategy over one document.
#[derive(Debug, Clone)]
pub struct StrategyRouter {
    strategy: Strategy,
    precision_entities: Vec<String>,
    rule_entities: Vec<String>,
    categories: CategoryTable,
    extractor: CandidateExtractor,
}

impl StrategyRouter {
    /// Router for `config`.
    #[must_use]
    pub fn new(config: &Config) -> Self {
        Self {
            strategy: config.detection.strategy,
            precision_entities: config.detection.precision_entities.clone(),
            rule_entities: config.detection.rule_entities.clone(),
            categories: config.category_table(),
            extractor: CandidateExtractor::new(&config.extraction),
        }
    }

    /// The active strategy.
    #[must_use]
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Extract and combine candidates for one language pass.
    ///
    /// Only adapters serving `language` take part.
    pub fn route(
        &self,
        document: &Document,
        requested: &[String],
        adapters: &[DetectorAdapter],
        language: Language,
        audit: &dyn AuditSink,
    ) -> Routed {
        let serving: Vec<&DetectorAdapter> = adapters.iter().filter(|a| a.languages().serves(language)).collect();
        let of_group = |group: DetectorGroup| {
            serving
                .iter()
                .copied()
                .filter(|a| a.detector_group() == group)
                .collect::<Vec<_>>()
        };

        let routed = match self.strategy {
            Strategy::Standalone => Routed {
                candidates: self.extractor.extract(
                    document,
                    requested,
                    &DetectorSet::new(true, serving.iter().copied()),
                    audit,
                ),
                consensus: Vec::new(),
            },
            Strategy::Hybrid => {
                let rule_types = intersect(requested, &self.rule_entities);
                let precision_types = intersect(requested, &self.precision_entities);
                let mut candidates = self.extractor.extract(
                    document,
                    &rule_types,
                    &DetectorSet::new(true, of_group(DetectorGroup::Rule)),
                    audit,
                );
                candidates.extend(self.extractor.extract(
                    document,
                    &precision_types,
                    &DetectorSet::new(false, of_group(DetectorGroup::Precision)),
                    audit,
                ));
                Routed {
                    candidates,
                    consensus: Vec::new(),
                }
            }
            Strategy::Dual => {
                let rule = self.extractor.extract(
                    document,
                    requested,
                    &DetectorSet::new(true, of_group(DetectorGroup::Rule)),
                    audit,
                );
                let precision = self.extractor.extract(
                    document,
                    requested,
                    &DetectorSet::new(false, of_group(DetectorGroup::Precision)),
                    audit,
                );
                dual_consensus(rule, &precision, &self.categories)
            }
        };

        log::debug!(
            "{:?} routing ({:?}): {} candidates, {} consensus matches",
            self.strategy,
            language,
            routed.candidates.len(),
            routed.consensus.len()
        );
        routed
    }
}

/// Members of `requested` that are also in `group`, in request order.
fn intersect(requested: &[String], group: &[String]) -> Vec<String> {
    requested.iter().filter(|t| group.contains(t)).cloned().collect()
}
