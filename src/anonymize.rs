//! The boundary collaborators: where text comes from and how spans are
//! replaced.
//!
//! [`TextSource`] turns a path into text (plain UTF-8 files out of the box;
//! PDF or Office extraction plugs in behind the same trait). [`Anonymizer`]
//! turns text plus final spans into masked text, using [`Operators`] to pick
//! each entity type's replacement.
//!
//! ```rust
//! use masque::anonymize::{Anonymizer, Operators, ReplaceAnonymizer};
//! use masque::Span;
//!
//! let ops = Operators::new("****").with("EMAIL_ADDRESS", "<EMAIL>");
//! let masked = ReplaceAnonymizer
//!     .anonymize("電話 090-1234-5678 / a@b.jp", &[
//!         Span::new("PHONE_NUMBER_JP", 3, 16, 1.0),
//!         Span::new("EMAIL_ADDRESS", 19, 25, 1.0),
//!     ], &ops)
//!     .unwrap();
//! assert_eq!(masked, "電話 **** / <EMAIL>");
//! ```

use crate::config::MaskingConfig;
use crate::error::{Error, Result};
use crate::offset::SpanConverter;
use crate::span::Span;
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;

/// Replacement policy per entity type, with a default.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Operators {
    default: String,
    per_entity: BTreeMap<String, String>,
}

impl Default for Operators {
    fn default() -> Self {
        Self::from_config(&MaskingConfig::default())
    }
}

impl Operators {
    /// Replace everything with `default`.
    pub fn new(default: impl Into<String>) -> Self {
        Self {
            default: default.into(),
            per_entity: BTreeMap::new(),
        }
    }

    /// Use `replacement` for `entity_type`.
    #[must_use]
    pub fn with(mut self, entity_type: impl Into<String>, replacement: impl Into<String>) -> Self {
        self.per_entity.insert(entity_type.into(), replacement.into());
        self
    }

    /// Operators from the `masking` config section.
    #[must_use]
    pub fn from_config(config: &MaskingConfig) -> Self {
        Self {
            default: config.default_mask.clone(),
            per_entity: config.entity_masks.clone(),
        }
    }

    /// Replacement for `entity_type`.
    #[must_use]
    pub fn replacement_for(&self, entity_type: &str) -> &str {
        self.per_entity.get(entity_type).unwrap_or(&self.default)
    }
}

/// Produces masked text from text and final spans.
pub trait Anonymizer: Send + Sync {
    /// Replace every span of `text`.
    ///
    /// `spans` must be ordered by `start`, non-overlapping and within the
    /// text (character offsets).
    fn anonymize(&self, text: &str, spans: &[Span], operators: &Operators) -> Result<String>;
}

/// Replaces each span wholesale with its operator's string.
#[derive(Debug, Clone, Copy, Default)]
pub struct ReplaceAnonymizer;

impl Anonymizer for ReplaceAnonymizer {
    fn anonymize(&self, text: &str, spans: &[Span], operators: &Operators) -> Result<String> {
        let conv = SpanConverter::new(text);
        let mut prev_end = 0usize;
        for span in spans {
            if span.start >= span.end || span.end > conv.char_count() || span.start < prev_end {
                return Err(Error::invalid_input(format!(
                    "span {} {}..{} is empty, out of range or out of order",
                    span.entity_type, span.start, span.end
                )));
            }
            prev_end = span.end;
        }

        let mut out = text.to_string();
        for span in spans.iter().rev() {
            out.replace_range(conv.to_bytes(span.start..span.end), operators.replacement_for(&span.entity_type));
        }
        Ok(out)
    }
}

/// Where document text comes from.
pub trait TextSource: fmt::Debug + Send + Sync {
    /// Whether this source handles `path`.
    fn can_read(&self, path: &Path) -> bool;

    /// Extract text from `path`.
    fn read(&self, path: &Path) -> Result<String>;
}

/// UTF-8 text files.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlainTextSource;

impl PlainTextSource {
    const EXTENSIONS: &'static [&'static str] = &["txt", "text", "md", "csv", "log"];
}

impl TextSource for PlainTextSource {
    fn can_read(&self, path: &Path) -> bool {
        match path.extension().and_then(|e| e.to_str()) {
            Some(ext) => Self::EXTENSIONS.iter().any(|e| e.eq_ignore_ascii_case(ext)),
            None => true,
        }
    }

    fn read(&self, path: &Path) -> Result<String> {
        if !self.can_read(path) {
            return Err(Error::invalid_input(format!("no text source for {}", path.display())));
        }
        Ok(std::fs::read_to_string(path)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_operators_lookup() {
        let mut config = MaskingConfig::default();
        config.entity_masks.insert("JP_PERSON".to_string(), "[氏名]".to_string());
        let ops = Operators::from_config(&config);
        assert_eq!(ops.replacement_for("JP_PERSON"), "[氏名]");
        assert_eq!(ops.replacement_for("EMAIL_ADDRESS"), "****");
    }

    #[test]
    fn test_replaces_on_char_offsets() {
        let ops = Operators::default().with("JP_PERSON", "[氏名]");
        let out = ReplaceAnonymizer
            .anonymize("氏名: 山田太郎 様", &[Span::new("JP_PERSON", 4, 8, 0.9)], &ops)
            .unwrap();
        assert_eq!(out, "氏名: [氏名] 様");
    }

    #[test]
    fn test_rejects_bad_spans() {
        let ops = Operators::default();
        let overlapping = [Span::new("A", 0, 3, 1.0), Span::new("B", 2, 4, 1.0)];
        assert!(ReplaceAnonymizer.anonymize("abcdef", &overlapping, &ops).is_err());
        assert!(ReplaceAnonymizer
            .anonymize("abc", &[Span::new("A", 1, 9, 1.0)], &ops)
            .is_err());
        assert_eq!(ReplaceAnonymizer.anonymize("abc", &[], &ops).unwrap(), "abc");
    }

    #[test]
    fn test_plain_source_extensions() {
        let source = PlainTextSource;
        assert!(source.can_read(Path::new("resume.txt")));
        assert!(source.can_read(Path::new("README")));
        assert!(!source.can_read(Path::new("resume.pdf")));
        assert!(matches!(
            source.read(Path::new("resume.pdf")),
            Err(Error::InvalidInput(_))
        ));
    }
}
