//! Configuration for the redaction pipeline.
//!
//! Every section derives `Deserialize` with `#[serde(default)]`, so a
//! partial document (or none at all) yields the documented defaults. Missing
//! keys are never an error; only syntax errors and inconsistent thresholds
//! are.
//!
//! ```rust
//! use masque::config::{Config, Strategy};
//!
//! let config = Config::from_yaml_str(
//!     "detection:\n  strategy: dual\nverification:\n  mask_threshold: 0.8\n",
//! ).unwrap();
//! assert_eq!(config.detection.strategy, Strategy::Dual);
//! assert_eq!(config.verification.mask_threshold, 0.8);
//! assert_eq!(config.verification.review_threshold, 0.5);
//! ```

use crate::category::CategoryTable;
use crate::error::{Error, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Default ordered priority list; lower index wins collisions.
pub const DEFAULT_ENTITY_PRIORITY: &[&str] = &[
    "EMAIL_ADDRESS",
    "PHONE_NUMBER_JP",
    "PHONE_NUMBER",
    "JP_ZIP_CODE",
    "US_ZIP_CODE",
    "JP_ADDRESS",
    "LOCATION",
    "JP_PERSON",
    "PERSON",
    "DATE_OF_BIRTH_JP",
    "DATE",
    "JP_AGE",
    "JP_GENDER",
];

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| (*s).to_string()).collect()
}

// =============================================================================
// Top level
// =============================================================================

/// Full pipeline configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Entity types the caller wants found.
    pub entities_to_mask: Vec<String>,
    /// Category name → detector labels. Drives normalization and consensus.
    pub entity_categories: BTreeMap<String, Vec<String>>,
    /// Strategy selection and entity partitions.
    pub detection: DetectionConfig,
    /// Candidate extraction.
    pub extraction: ExtractionConfig,
    /// Thresholds and section policies.
    pub verification: VerificationConfig,
    /// Section heading keywords.
    pub structure: StructureConfig,
    /// Terms that are never PII.
    pub allow_list: AllowListConfig,
    /// Built-in detector toggles.
    pub detectors: DetectorsConfig,
    /// Replacement strings.
    pub masking: MaskingConfig,
}

impl Default for Config {
    fn default() -> Self {
        let mut entity_categories = BTreeMap::new();
        entity_categories.insert("person".to_string(), strings(&["PERSON", "JP_PERSON"]));
        entity_categories.insert("address".to_string(), strings(&["LOCATION", "JP_ADDRESS"]));
        Self {
            entities_to_mask: strings(DEFAULT_ENTITY_PRIORITY),
            entity_categories,
            detection: DetectionConfig::default(),
            extraction: ExtractionConfig::default(),
            verification: VerificationConfig::default(),
            structure: StructureConfig::default(),
            allow_list: AllowListConfig::default(),
            detectors: DetectorsConfig::default(),
            masking: MaskingConfig::default(),
        }
    }
}

impl Config {
    /// Parse a JSON document.
    pub fn from_json_str(s: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Parse a YAML document. An empty document yields the defaults.
    pub fn from_yaml_str(s: &str) -> Result<Self> {
        if s.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a `.json`, `.yaml` or `.yml` file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Self::from_json_str(&content),
            Some("yaml") | Some("yml") => Self::from_yaml_str(&content),
            other => Err(Error::config(format!(
                "unsupported config extension {:?} for {}",
                other.unwrap_or(""),
                path.display()
            ))),
        }
    }

    /// Reject inconsistent settings.
    pub fn validate(&self) -> Result<()> {
        let v = &self.verification;
        for (name, value) in [("mask_threshold", v.mask_threshold), ("review_threshold", v.review_threshold)] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::config(format!("{name} must be in [0, 1], got {value}")));
            }
        }
        if v.review_threshold > v.mask_threshold {
            return Err(Error::config(format!(
                "review_threshold ({}) exceeds mask_threshold ({})",
                v.review_threshold, v.mask_threshold
            )));
        }
        let min_conf = self.detectors.sequence.min_confidence;
        if !(0.0..=1.0).contains(&min_conf) {
            return Err(Error::config(format!(
                "detectors.sequence.min_confidence must be in [0, 1], got {min_conf}"
            )));
        }
        Ok(())
    }

    /// The category table built from `entity_categories`.
    #[must_use]
    pub fn category_table(&self) -> CategoryTable {
        CategoryTable::from_map(&self.entity_categories)
    }

    /// Priority index of an entity type; unknown types sort last.
    #[must_use]
    pub fn priority_index(&self, entity_type: &str) -> usize {
        self.extraction.priority_index(entity_type)
    }
}

// =============================================================================
// Detection
// =============================================================================

/// How detector groups are combined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strategy {
    /// Every detector is asked for every requested type.
    #[default]
    Standalone,
    /// Types are routed to exactly one group; outputs are concatenated.
    Hybrid,
    /// Categorized types need agreement from both groups.
    Dual,
}

/// Which language passes to run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LanguageMode {
    /// English only.
    En,
    /// Japanese only.
    Ja,
    /// One pass per language, merged.
    #[default]
    Auto,
}

impl LanguageMode {
    /// Languages to run, in order.
    #[must_use]
    pub fn passes(self) -> &'static [Language] {
        match self {
            LanguageMode::En => &[Language::En],
            LanguageMode::Ja => &[Language::Ja],
            LanguageMode::Auto => &[Language::En, Language::Ja],
        }
    }
}

/// A single analysis language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// English.
    En,
    /// Japanese.
    Ja,
}

/// Strategy selection and entity partitions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionConfig {
    /// Combination strategy.
    pub strategy: Strategy,
    /// Types routed to the precision group under hybrid routing.
    pub precision_entities: Vec<String>,
    /// Types routed to the rule group under hybrid routing.
    pub rule_entities: Vec<String>,
    /// Language passes.
    pub language: LanguageMode,
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            strategy: Strategy::Standalone,
            precision_entities: strings(&["PERSON", "JP_PERSON", "LOCATION", "JP_ADDRESS"]),
            rule_entities: strings(&[
                "EMAIL_ADDRESS",
                "PHONE_NUMBER_JP",
                "PHONE_NUMBER",
                "JP_ZIP_CODE",
                "US_ZIP_CODE",
                "DATE_OF_BIRTH_JP",
                "DATE",
                "JP_AGE",
                "JP_GENDER",
            ]),
            language: LanguageMode::Auto,
        }
    }
}

// =============================================================================
// Extraction
// =============================================================================

/// Candidate extraction settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionConfig {
    /// Ordered priority list; lower index wins overlaps.
    pub entity_priority: Vec<String>,
    /// Run detector adapters in addition to the built-in rules.
    pub use_ner: bool,
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            entity_priority: strings(DEFAULT_ENTITY_PRIORITY),
            use_ner: true,
        }
    }
}

impl ExtractionConfig {
    /// Position in `entity_priority`, or its length for unlisted types.
    #[must_use]
    pub fn priority_index(&self, entity_type: &str) -> usize {
        self.entity_priority
            .iter()
            .position(|t| t == entity_type)
            .unwrap_or(self.entity_priority.len())
    }
}

// =============================================================================
// Verification
// =============================================================================

/// Per-section score adjustments. Penalties are negative, boosts positive;
/// both are summed.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SectionPolicy {
    /// Added to person-like scores.
    pub person_penalty: f64,
    /// Added to person-like scores.
    pub person_boost: f64,
    /// Added to address-like scores.
    pub address_penalty: f64,
    /// Added to address-like scores.
    pub address_boost: f64,
}

impl SectionPolicy {
    /// Net adjustment for person-like labels.
    #[must_use]
    pub fn person_adjustment(&self) -> f64 {
        self.person_penalty + self.person_boost
    }

    /// Net adjustment for address-like labels.
    #[must_use]
    pub fn address_adjustment(&self) -> f64 {
        self.address_penalty + self.address_boost
    }
}

/// Verifier thresholds and section policies.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// `score >= mask_threshold` → mask.
    pub mask_threshold: f64,
    /// `review_threshold <= score < mask_threshold` → review.
    pub review_threshold: f64,
    /// Section type → adjustments.
    pub section_policies: BTreeMap<String, SectionPolicy>,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        let history = SectionPolicy {
            person_penalty: -0.3,
            address_penalty: -0.2,
            ..SectionPolicy::default()
        };
        let contact = SectionPolicy {
            person_boost: 0.2,
            address_boost: 0.2,
            ..SectionPolicy::default()
        };
        let mut section_policies = BTreeMap::new();
        section_policies.insert("education".to_string(), history);
        section_policies.insert("experience".to_string(), history);
        section_policies.insert("contact".to_string(), contact);
        Self {
            mask_threshold: 0.7,
            review_threshold: 0.5,
            section_policies,
        }
    }
}

// =============================================================================
// Structure
// =============================================================================

/// Heading keywords for one section type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HeadingKeywords {
    /// Matched as substrings, case-sensitive.
    pub ja: Vec<String>,
    /// Matched case-insensitively as substrings, or exactly.
    pub en: Vec<String>,
}

impl HeadingKeywords {
    fn of(ja: &[&str], en: &[&str]) -> Self {
        Self {
            ja: strings(ja),
            en: strings(en),
        }
    }
}

/// Structure restoration settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StructureConfig {
    /// Section type → heading keywords. Checked in the order written, the
    /// first matching section wins.
    pub section_headings: IndexMap<String, HeadingKeywords>,
}

impl Default for StructureConfig {
    fn default() -> Self {
        let mut h = IndexMap::new();
        h.insert(
            "contact".to_string(),
            HeadingKeywords::of(
                &["連絡先", "住所", "基本情報", "個人情報"],
                &["Contact", "Personal", "Personal Information"],
            ),
        );
        h.insert(
            "education".to_string(),
            HeadingKeywords::of(&["学歴"], &["Education", "Academic", "EDUCATION"]),
        );
        h.insert(
            "experience".to_string(),
            HeadingKeywords::of(
                &["職歴", "職務経歴", "経歴", "職務経歴書サマリー"],
                &[
                    "Experience",
                    "Work Experience",
                    "Employment",
                    "WORK EXPERIENCE",
                    "PROFESSIONAL SUMMARY",
                ],
            ),
        );
        h.insert(
            "skills".to_string(),
            HeadingKeywords::of(
                &["スキル", "技術", "技術スキル"],
                &["Skills", "Technical Skills", "TECHNICAL SKILLS"],
            ),
        );
        h.insert(
            "certifications".to_string(),
            HeadingKeywords::of(&["資格", "認定"], &["Certifications", "Licenses", "CERTIFICATIONS"]),
        );
        Self { section_headings: h }
    }
}

// =============================================================================
// Allow list
// =============================================================================

/// Allow-list sources.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AllowListConfig {
    /// Off by default.
    pub enabled: bool,
    /// Newline-delimited dictionary file.
    pub dictionary_path: Option<PathBuf>,
    /// Extra terms.
    pub additional_terms: Vec<String>,
}

// =============================================================================
// Detectors
// =============================================================================

/// On/off switch for a built-in detector.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Toggle {
    /// Whether the detector is registered.
    pub enabled: bool,
}

impl Default for Toggle {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Sequence-labeling detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SequenceConfig {
    /// Registered only when a labeler is supplied and this is set.
    pub enabled: bool,
    /// Passed through to the labeler factory, e.g. `cpu` or `cuda`.
    pub device: String,
    /// Spans scoring below this are dropped.
    pub min_confidence: f64,
    /// Model label → entity type. Keys may carry a `B-`/`I-` prefix.
    pub label_mapping: BTreeMap<String, String>,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        let mut label_mapping = BTreeMap::new();
        for (label, ty) in [
            ("PER", "PERSON"),
            ("LOC", "LOCATION"),
            ("人名", "JP_PERSON"),
            ("地名", "JP_ADDRESS"),
        ] {
            label_mapping.insert(label.to_string(), ty.to_string());
        }
        Self {
            enabled: false,
            device: "cpu".to_string(),
            min_confidence: 0.8,
            label_mapping,
        }
    }
}

/// Built-in detector settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct DetectorsConfig {
    /// Regex recognizers with context boosting.
    pub pattern: Toggle,
    /// Context-cue named entity detector.
    pub context: Toggle,
    /// Neural sequence labeler.
    pub sequence: SequenceConfig,
}

// =============================================================================
// Masking
// =============================================================================

/// Replacement strings for the anonymizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MaskingConfig {
    /// Used for types without an entry in `entity_masks`.
    pub default_mask: String,
    /// Entity type → replacement.
    pub entity_masks: BTreeMap<String, String>,
}

impl Default for MaskingConfig {
    fn default() -> Self {
        Self {
            default_mask: "****".to_string(),
            entity_masks: BTreeMap::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = Config::default();
        assert_eq!(c.verification.mask_threshold, 0.7);
        assert_eq!(c.verification.review_threshold, 0.5);
        assert_eq!(c.detection.strategy, Strategy::Standalone);
        assert_eq!(c.priority_index("EMAIL_ADDRESS"), 0);
        assert_eq!(c.priority_index("JP_GENDER"), 12);
        assert_eq!(c.priority_index("SOMETHING_ELSE"), 13);
        assert_eq!(c.masking.default_mask, "****");
        assert!(c.category_table().requires_consensus("JP_PERSON"));
        assert_eq!(
            c.verification.section_policies["education"].person_adjustment(),
            -0.3
        );
    }

    #[test]
    fn test_empty_documents_yield_defaults() {
        assert_eq!(Config::from_yaml_str("").unwrap(), Config::default());
        assert_eq!(Config::from_json_str("{}").unwrap(), Config::default());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let c = Config::from_json_str(
            r#"{"verification": {"section_policies": {"skills": {"person_penalty": -0.1}}}}"#,
        )
        .unwrap();
        assert_eq!(c.verification.mask_threshold, 0.7);
        assert!(c.verification.section_policies.contains_key("skills"));
        assert!(!c.verification.section_policies.contains_key("education"));
        assert_eq!(c.verification.section_policies["skills"].person_boost, 0.0);
    }

    #[test]
    fn test_inverted_thresholds_rejected() {
        let err = Config::from_yaml_str("verification:\n  mask_threshold: 0.4\n").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_heading_order_preserved_from_yaml() {
        let c = Config::from_yaml_str(
            "structure:\n  section_headings:\n    skills:\n      ja: [スキル]\n    contact:\n      ja: [連絡先]\n",
        )
        .unwrap();
        let order: Vec<&str> = c.structure.section_headings.keys().map(String::as_str).collect();
        assert_eq!(order, vec!["skills", "contact"]);

        let defaults: Vec<String> = StructureConfig::default().section_headings.keys().cloned().collect();
        assert_eq!(defaults, vec!["contact", "education", "experience", "skills", "certifications"]);
    }

    #[test]
    fn test_syntax_error_is_parse_error() {
        let err = Config::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[test]
    fn test_from_path_by_extension() {
        let dir = tempfile::tempdir().unwrap();
        let yaml = dir.path().join("masque.yaml");
        std::fs::write(&yaml, "detection:\n  language: ja\n").unwrap();
        assert_eq!(Config::from_path(&yaml).unwrap().detection.language, LanguageMode::Ja);

        let toml = dir.path().join("masque.toml");
        std::fs::write(&toml, "").unwrap();
        assert!(matches!(Config::from_path(&toml), Err(Error::Config(_))));

        let missing = dir.path().join("absent.json");
        assert!(matches!(Config::from_path(&missing), Err(Error::Io(_))));
    }
}
