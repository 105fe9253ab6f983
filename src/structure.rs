//! Structure restoration: lines and sections from flat extracted text.
//!
//! Text pulled out of PDFs and word processors arrives as one string with
//! ragged whitespace. Restoration normalizes it, splits it into non-empty
//! lines and tags each line with the section it sits in:
//!
//! ```text
//!   山田太郎                  header      section_0
//!   連絡先                    contact     section_1   ← heading
//!   TEL 090-1234-5678         contact     section_1
//!   学歴                      education   section_2   ← heading
//!   2010年 東京大学 卒業      education   section_2
//! ```
//!
//! Offsets are character offsets into the normalized text, recovered by
//! scanning forward from the previous line's end so repeated lines land on
//! their own occurrence.

use crate::config::{HeadingKeywords, StructureConfig};
use crate::offset::SpanConverter;
use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Section type of lines before the first heading.
pub const HEADER_SECTION: &str = "header";

/// Section id/type for positions no segment contains.
pub const UNKNOWN_SECTION: &str = "unknown";

static HORIZONTAL_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[ \t]{2,}").expect("HORIZONTAL_RUN regex is invalid"));
static BLANK_RUN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n{3,}").expect("BLANK_RUN regex is invalid"));

/// One non-empty line with its section context.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Segment {
    /// `section_0` for the header, then `section_1`, `section_2`, ...
    pub section_id: String,
    /// `header`, or the type of the most recent heading.
    pub section_type: String,
    /// Trimmed line content.
    pub line_text: String,
    /// Start (char offset in the normalized text).
    pub char_start: usize,
    /// End (char offset, exclusive).
    pub char_end: usize,
    /// Index among non-empty lines.
    pub line_number: usize,
}

impl Segment {
    /// Whether `pos` falls inside this line.
    #[must_use]
    pub fn contains(&self, pos: usize) -> bool {
        self.char_start <= pos && pos < self.char_end
    }
}

/// Normalized text plus its segments.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Text all segment and span offsets refer to.
    pub text: String,
    /// Segments in line order.
    pub segments: Vec<Segment>,
}

/// Whitespace normalization applied before segmentation.
///
/// Ideographic spaces become ASCII spaces, runs of spaces/tabs collapse to
/// one, three or more newlines collapse to two, and the ends are trimmed.
#[must_use]
pub fn normalize_text(raw: &str) -> String {
    let text = raw.replace('\u{3000}', " ");
    let text = HORIZONTAL_RUN.replace_all(&text, " ");
    let text = BLANK_RUN.replace_all(&text, "\n\n");
    text.trim().to_string()
}

/// Splits text into sectioned lines.
#[derive(Debug, Clone)]
pub struct StructureRestorer {
    headings: IndexMap<String, HeadingKeywords>,
}

impl Default for StructureRestorer {
    fn default() -> Self {
        Self::new(&StructureConfig::default())
    }
}

impl StructureRestorer {
    /// Restorer using the configured heading table.
    #[must_use]
    pub fn new(config: &StructureConfig) -> Self {
        Self {
            headings: config.section_headings.clone(),
        }
    }

    /// Segments of `raw`. Offsets refer to [`normalize_text`]`(raw)`.
    #[must_use]
    pub fn restore(&self, raw: &str) -> Vec<Segment> {
        self.restore_document(raw).segments
    }

    /// Normalized text together with its segments.
    #[must_use]
    pub fn restore_document(&self, raw: &str) -> Document {
        let text = normalize_text(raw);
        let conv = SpanConverter::new(&text);

        let mut segments = Vec::new();
        let mut section_type = HEADER_SECTION.to_string();
        let mut section_count = 0usize;
        let mut pos = 0usize;

        let lines = text.split('\n').map(str::trim).filter(|l| !l.is_empty());
        for (line_number, line) in lines.enumerate() {
            let Some(start) = conv.find_from(&text, line, pos) else {
                continue;
            };
            let end = start + line.chars().count();

            if let Some(kind) = self.classify_heading(line) {
                section_count += 1;
                section_type = kind.to_string();
            }

            segments.push(Segment {
                section_id: format!("section_{section_count}"),
                section_type: section_type.clone(),
                line_text: line.to_string(),
                char_start: start,
                char_end: end,
                line_number,
            });
            pos = end;
        }

        log::debug!(
            "restored {} segments across {} sections",
            segments.len(),
            section_count + 1
        );
        Document { text, segments }
    }

    /// Section type if `line` reads as a heading.
    ///
    /// Japanese keywords match as case-sensitive substrings; English ones as
    /// case-insensitive substrings or exact matches.
    #[must_use]
    pub fn classify_heading(&self, line: &str) -> Option<&str> {
        let trimmed = line.trim();
        let lower = trimmed.to_lowercase();
        self.headings
            .iter()
            .find(|(_, kw)| {
                kw.ja.iter().any(|h| trimmed.contains(h.as_str()))
                    || kw
                        .en
                        .iter()
                        .any(|h| lower.contains(&h.to_lowercase()) || h == trimmed)
            })
            .map(|(kind, _)| kind.as_str())
    }
}

/// Lines of one section type joined with newlines.
#[must_use]
pub fn section_text(segments: &[Segment], section_type: &str) -> String {
    segments
        .iter()
        .filter(|s| s.section_type == section_type)
        .map(|s| s.line_text.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Line count per section type.
#[must_use]
pub fn sections_summary(segments: &[Segment]) -> BTreeMap<String, usize> {
    let mut summary = BTreeMap::new();
    for s in segments {
        *summary.entry(s.section_type.clone()).or_insert(0) += 1;
    }
    summary
}

/// Rebuild a flat text from segments, padding gaps (line breaks) with
/// spaces so offsets line up with the normalized text.
#[must_use]
pub fn reconstruct(segments: &[Segment]) -> String {
    let mut ordered: Vec<&Segment> = segments.iter().collect();
    ordered.sort_by_key(|s| s.char_start);

    let mut out = String::new();
    let mut last_end = 0usize;
    for s in ordered {
        if s.char_start > last_end {
            out.extend(std::iter::repeat(' ').take(s.char_start - last_end));
        }
        out.push_str(&s.line_text);
        last_end = s.char_end;
    }
    out
}

/// The segment containing char offset `pos`.
#[must_use]
pub fn segment_at(segments: &[Segment], pos: usize) -> Option<&Segment> {
    segments.iter().find(|s| s.contains(pos))
}
