//! Candidate extraction: a fixed rule battery per line, plus detectors.
//!
//! The battery runs over every segment's line and knows a little about
//! where it is: US postal codes are only trusted in contact or header
//! sections, dates become birth dates when the line talks about birth,
//! Japanese postal codes are not read out of year ranges such as
//! `2016-2024`.
//!
//! Detector adapters run next, when enabled. Segment-scope adapters see one
//! line at a time; document-scope adapters see the reconstructed text (in
//! parallel with the `parallel` feature) and their spans are bucketed into
//! the segment containing their start.
//!
//! Everything one call produced then goes through the local merge: sort by
//! `(start, priority, -score)` and keep, of each overlapping pair, the
//! higher-priority (then higher-score) candidate.

use crate::audit::AuditSink;
use crate::backends::{DetectorAdapter, DetectorScope};
use crate::config::ExtractionConfig;
use crate::offset::SpanConverter;
use crate::span::{CandidateSpan, Spanned};
use crate::structure::{reconstruct, segment_at, Document, Segment, UNKNOWN_SECTION};
use once_cell::sync::Lazy;
use regex::Regex;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// The 47 prefectures, in their official order.
pub const JP_PREFECTURES: &[&str] = &[
    "北海道", "青森県", "岩手県", "宮城県", "秋田県", "山形県", "福島県",
    "茨城県", "栃木県", "群馬県", "埼玉県", "千葉県", "東京都", "神奈川県",
    "新潟県", "富山県", "石川県", "福井県", "山梨県", "長野県", "岐阜県",
    "静岡県", "愛知県", "三重県", "滋賀県", "京都府", "大阪府", "兵庫県",
    "奈良県", "和歌山県", "鳥取県", "島根県", "岡山県", "広島県", "山口県",
    "徳島県", "香川県", "愛媛県", "高知県", "福岡県", "佐賀県", "長崎県",
    "熊本県", "大分県", "宮崎県", "鹿児島県", "沖縄県",
];

/// Words that make a date on the same line a birth date.
const BIRTH_KEYWORDS: &[&str] = &["birth", "生年月日", "誕生", "生まれ", "date of birth"];

/// An address runs until the first of these.
const ADDRESS_DELIMITERS: &[&str] = &["\n", "\u{3000}", "  ", "Email", "email", "Phone", "phone", "TEL", "tel"];

/// Sections where a bare five-digit number may be a US postal code.
const US_ZIP_SECTIONS: &[&str] = &["contact", "header"];

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}|[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}\w._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}",
    )
    .expect("EMAIL regex is invalid")
});
static PHONE_JP: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"0\d{1,4}-\d{1,4}-\d{4}").expect("PHONE_JP hyphenated regex is invalid"),
        Regex::new(r"0\d{9,10}").expect("PHONE_JP plain regex is invalid"),
        Regex::new(r"\+81-?\d{1,4}-?\d{1,4}-?\d{4}").expect("PHONE_JP international regex is invalid"),
    ]
});
static PHONE_EN: Lazy<[Regex; 2]> = Lazy::new(|| {
    [
        Regex::new(r"\+1-?\d{3}-?\d{3}-?\d{4}").expect("PHONE_EN international regex is invalid"),
        Regex::new(r"\(\d{3}\)\s?\d{3}-\d{4}").expect("PHONE_EN parenthesized regex is invalid"),
    ]
});
static JP_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"〒?\s*\d{3}-\d{4}").expect("JP_ZIP regex is invalid"));
static US_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\d{5}(?:-\d{4})?\b").expect("US_ZIP regex is invalid"));
static DATES: Lazy<[Regex; 3]> = Lazy::new(|| {
    [
        Regex::new(r"\b\d{4}-\d{2}-\d{2}\b").expect("DATE iso regex is invalid"),
        Regex::new(r"\d{4}年\d{1,2}月\d{1,2}日").expect("DATE kanji regex is invalid"),
        Regex::new(r"\b\d{4}/\d{1,2}/\d{1,2}\b").expect("DATE slash regex is invalid"),
    ]
});
static AGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{1,3})\s*歳").expect("AGE regex is invalid"));
static GENDER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[（(]?\s*(男性?|女性?|男|女)\s*[）)]?").expect("GENDER regex is invalid")
});

/// Which detectors one extraction call runs.
#[derive(Debug, Clone, Default)]
pub struct DetectorSet<'a> {
    /// Run the built-in rule battery.
    pub rules: bool,
    /// Adapters to run (when detector extraction is enabled).
    pub adapters: Vec<&'a DetectorAdapter>,
}

impl<'a> DetectorSet<'a> {
    /// The rule battery alone.
    #[must_use]
    pub fn rules_only() -> Self {
        Self {
            rules: true,
            adapters: Vec::new(),
        }
    }

    /// The given adapters, with or without the rule battery.
    pub fn new(rules: bool, adapters: impl IntoIterator<Item = &'a DetectorAdapter>) -> Self {
        Self {
            rules,
            adapters: adapters.into_iter().collect(),
        }
    }
}

/// Produces merged candidates from segments.
#[derive(Debug, Clone)]
pub struct CandidateExtractor {
    config: ExtractionConfig,
}

impl Default for CandidateExtractor {
    fn default() -> Self {
        Self::new(&ExtractionConfig::default())
    }
}

impl CandidateExtractor {
    /// Extractor with the given priority list and detector switch.
    #[must_use]
    pub fn new(config: &ExtractionConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Position in the priority list; unlisted types sort last.
    #[must_use]
    pub fn priority_index(&self, entity_type: &str) -> usize {
        self.config.priority_index(entity_type)
    }

    /// Run `detectors` for the `requested` types and merge the result.
    ///
    /// The returned candidates are sorted by `start` and carry document
    /// offsets.
    pub fn extract(
        &self,
        document: &Document,
        requested: &[String],
        detectors: &DetectorSet<'_>,
        audit: &dyn AuditSink,
    ) -> Vec<CandidateSpan> {
        let mut candidates = Vec::new();
        if detectors.rules {
            candidates.extend(self.extract_rules(&document.segments, requested));
        }
        if self.config.use_ner && !detectors.adapters.is_empty() {
            candidates.extend(self.extract_detectors(document, requested, &detectors.adapters, audit));
        }
        let raw = candidates.len();
        let merged = self.local_merge(candidates);
        log::debug!("extracted {} candidates, {} after local merge", raw, merged.len());
        merged
    }

    /// The rule battery over every segment, unmerged.
    #[must_use]
    pub fn extract_rules(&self, segments: &[Segment], requested: &[String]) -> Vec<CandidateSpan> {
        segments
            .iter()
            .flat_map(|segment| Line::new(segment, requested).battery())
            .collect()
    }

    /// Detector adapters, unmerged.
    pub fn extract_detectors(
        &self,
        document: &Document,
        requested: &[String],
        adapters: &[&DetectorAdapter],
        audit: &dyn AuditSink,
    ) -> Vec<CandidateSpan> {
        let mut out = Vec::new();

        for adapter in adapters.iter().filter(|a| a.detector_scope() == DetectorScope::Segment) {
            for segment in &document.segments {
                out.extend(
                    adapter
                        .analyze_audited(&segment.line_text, requested, audit)
                        .into_iter()
                        .map(|c| c.shifted(segment.char_start).in_section(&segment.section_id, &segment.section_type)),
                );
            }
        }

        let whole: Vec<&DetectorAdapter> = adapters
            .iter()
            .copied()
            .filter(|a| a.detector_scope() == DetectorScope::Document)
            .collect();
        if whole.is_empty() {
            return out;
        }

        let full_text = reconstruct(&document.segments);
        #[cfg(feature = "parallel")]
        let outputs: Vec<Vec<CandidateSpan>> = whole
            .par_iter()
            .map(|a| a.analyze_audited(&full_text, requested, audit))
            .collect();
        #[cfg(not(feature = "parallel"))]
        let outputs: Vec<Vec<CandidateSpan>> = whole
            .iter()
            .map(|a| a.analyze_audited(&full_text, requested, audit))
            .collect();

        let conv = SpanConverter::new(&document.text);
        for candidate in outputs.into_iter().flatten() {
            let text = conv.slice(&document.text, candidate.start..candidate.end).to_string();
            let placed = CandidateSpan { text, ..candidate };
            out.push(match segment_at(&document.segments, placed.start) {
                Some(segment) => placed.in_section(&segment.section_id, &segment.section_type),
                None => placed.in_section(UNKNOWN_SECTION, UNKNOWN_SECTION),
            });
        }
        out
    }

    /// Greedy same-call merge.
    ///
    /// Candidates are visited in `(start, priority, -score)` order. One that
    /// overlaps an accepted candidate replaces the first such candidate when
    /// it has higher priority, or equal priority and a higher score;
    /// otherwise it is dropped.
    #[must_use]
    pub fn local_merge(&self, mut candidates: Vec<CandidateSpan>) -> Vec<CandidateSpan> {
        candidates.sort_by(|a, b| {
            a.start
                .cmp(&b.start)
                .then_with(|| self.priority_index(&a.entity_type).cmp(&self.priority_index(&b.entity_type)))
                .then_with(|| b.score.total_cmp(&a.score))
        });

        let mut merged: Vec<CandidateSpan> = Vec::with_capacity(candidates.len());
        for candidate in candidates {
            match merged.iter().position(|m| m.overlaps(&candidate)) {
                None => merged.push(candidate),
                Some(i) => {
                    let held = &merged[i];
                    let (p_new, p_held) = (
                        self.priority_index(&candidate.entity_type),
                        self.priority_index(&held.entity_type),
                    );
                    if p_new < p_held || (p_new == p_held && candidate.score > held.score) {
                        merged.remove(i);
                        merged.push(candidate);
                    }
                }
            }
        }
        merged.sort_by_key(|c| c.start);
        merged
    }
}

/// One segment under the rule battery.
struct Line<'a> {
    segment: &'a Segment,
    text: &'a str,
    conv: SpanConverter,
    requested: &'a [String],
}

impl<'a> Line<'a> {
    fn new(segment: &'a Segment, requested: &'a [String]) -> Self {
        Self {
            segment,
            text: &segment.line_text,
            conv: SpanConverter::new(&segment.line_text),
            requested,
        }
    }

    fn wants(&self, entity_type: &str) -> bool {
        self.requested.iter().any(|t| t == entity_type)
    }

    /// Candidate for a byte range of the line.
    fn candidate(&self, entity_type: &str, bytes: std::ops::Range<usize>, score: f64, source: &str) -> CandidateSpan {
        let chars = self.conv.to_chars(bytes.clone());
        CandidateSpan::new(
            entity_type,
            &self.text[bytes],
            self.segment.char_start + chars.start,
            self.segment.char_start + chars.end,
            score,
            source,
        )
        .in_section(&self.segment.section_id, &self.segment.section_type)
    }

    fn battery(&self) -> Vec<CandidateSpan> {
        let mut out = Vec::new();
        self.emails(&mut out);
        self.phones(&mut out);
        self.postal_codes(&mut out);
        self.dates(&mut out);
        self.ages(&mut out);
        self.genders(&mut out);
        self.addresses(&mut out);
        out
    }

    fn emails(&self, out: &mut Vec<CandidateSpan>) {
        if !self.wants("EMAIL_ADDRESS") {
            return;
        }
        for m in EMAIL.find_iter(self.text) {
            out.push(self.candidate("EMAIL_ADDRESS", m.range(), 0.95, "rule:email_regex"));
        }
    }

    fn phones(&self, out: &mut Vec<CandidateSpan>) {
        if self.wants("PHONE_NUMBER_JP") {
            for m in PHONE_JP.iter().flat_map(|re| re.find_iter(self.text)) {
                out.push(self.candidate("PHONE_NUMBER_JP", m.range(), 0.9, "rule:phone_jp_regex"));
            }
        }
        if self.wants("PHONE_NUMBER") {
            for m in PHONE_EN.iter().flat_map(|re| re.find_iter(self.text)) {
                out.push(self.candidate("PHONE_NUMBER", m.range(), 0.9, "rule:phone_en_regex"));
            }
        }
    }

    fn postal_codes(&self, out: &mut Vec<CandidateSpan>) {
        if self.wants("JP_ZIP_CODE") {
            for m in JP_ZIP.find_iter(self.text) {
                if follows_number(&self.text[..m.start()]) {
                    continue;
                }
                out.push(self.candidate("JP_ZIP_CODE", m.range(), 0.95, "rule:jp_zip_regex"));
            }
        }
        if self.wants("US_ZIP_CODE") && US_ZIP_SECTIONS.contains(&self.segment.section_type.as_str()) {
            for m in US_ZIP.find_iter(self.text) {
                if reads_as_year(m.as_str()) {
                    continue;
                }
                out.push(self.candidate("US_ZIP_CODE", m.range(), 0.7, "rule:us_zip_regex"));
            }
        }
    }

    fn dates(&self, out: &mut Vec<CandidateSpan>) {
        let lower = self.text.to_lowercase();
        let (entity_type, score) = if BIRTH_KEYWORDS.iter().any(|k| lower.contains(k)) {
            ("DATE_OF_BIRTH_JP", 0.9)
        } else {
            ("DATE", 0.5)
        };
        if !self.wants(entity_type) {
            return;
        }
        for m in DATES.iter().flat_map(|re| re.find_iter(self.text)) {
            out.push(self.candidate(entity_type, m.range(), score, "rule:date_regex"));
        }
    }

    fn ages(&self, out: &mut Vec<CandidateSpan>) {
        if !self.wants("JP_AGE") {
            return;
        }
        for caps in AGE.captures_iter(self.text) {
            let (Some(whole), Some(years)) = (caps.get(0), caps.get(1)) else {
                continue;
            };
            if matches!(years.as_str().parse::<u32>(), Ok(0..=120)) {
                out.push(self.candidate("JP_AGE", whole.range(), 0.85, "rule:age_regex"));
            }
        }
    }

    fn genders(&self, out: &mut Vec<CandidateSpan>) {
        if !self.wants("JP_GENDER") {
            return;
        }
        for m in GENDER.find_iter(self.text) {
            out.push(self.candidate("JP_GENDER", m.range(), 0.8, "rule:gender_regex"));
        }
    }

    fn addresses(&self, out: &mut Vec<CandidateSpan>) {
        if !self.wants("JP_ADDRESS") {
            return;
        }
        for prefecture in JP_PREFECTURES {
            let Some(start) = self.text.find(prefecture) else {
                continue;
            };
            let rest = &self.text[start..];
            let cut = ADDRESS_DELIMITERS
                .iter()
                .filter_map(|d| rest.find(d))
                .min()
                .unwrap_or(rest.len());
            let address = rest[..cut].trim_end();
            if address.chars().count() > prefecture.chars().count() + 2 {
                out.push(self.candidate("JP_ADDRESS", start..start + address.len(), 0.75, "rule:jp_address_prefix"));
            }
        }
    }
}

/// Whether text ending here makes a following `ddd-dddd` part of a number
/// range: a digit right before it, or a digit then a hyphen.
fn follows_number(before: &str) -> bool {
    let mut rev = before.chars().rev();
    match (rev.next(), rev.next()) {
        (Some(c), _) if c.is_ascii_digit() => true,
        (Some('-'), Some(d)) => d.is_ascii_digit(),
        _ => false,
    }
}

/// Five digits whose first four read as a year in 1900..=2100.
fn reads_as_year(zip: &str) -> bool {
    zip.get(..4)
        .and_then(|y| y.parse::<u32>().ok())
        .is_some_and(|y| (1900..=2100).contains(&y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audit::NullSink;
    use crate::backends::DetectorScope;
    use crate::span::DetectedSpan;
    use crate::structure::StructureRestorer;
    use crate::MockDetector;

    fn all() -> Vec<String> {
        crate::config::DEFAULT_ENTITY_PRIORITY.iter().map(|s| s.to_string()).collect()
    }

    fn doc(text: &str) -> Document {
        StructureRestorer::default().restore_document(text)
    }

    fn extract(text: &str) -> Vec<CandidateSpan> {
        CandidateExtractor::default().extract(&doc(text), &all(), &DetectorSet::rules_only(), &NullSink)
    }

    fn found(text: &str) -> Vec<(String, String)> {
        extract(text).into_iter().map(|c| (c.entity_type, c.text)).collect()
    }

    #[test]
    fn test_contact_line() {
        let candidates = extract("電話: 090-1234-5678 メール: test@example.com");
        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].entity_type, "PHONE_NUMBER_JP");
        assert_eq!((candidates[0].start, candidates[0].end), (4, 17));
        assert_eq!(candidates[1].entity_type, "EMAIL_ADDRESS");
        assert_eq!(candidates[1].text, "test@example.com");
        assert_eq!(candidates[1].section_type, "header");
    }

    #[test]
    fn test_offsets_are_global() {
        let d = doc("山田太郎\n連絡先\nTEL 03-1234-5678");
        let phone = CandidateExtractor::default()
            .extract(&d, &all(), &DetectorSet::rules_only(), &NullSink)
            .into_iter()
            .find(|c| c.entity_type == "PHONE_NUMBER_JP")
            .unwrap();
        let conv = SpanConverter::new(&d.text);
        assert_eq!(conv.slice(&d.text, phone.start..phone.end), "03-1234-5678");
        assert_eq!(phone.section_type, "contact");
        assert_eq!(phone.section_id, "section_1");
    }

    #[test]
    fn test_jp_zip_guard() {
        assert!(found("2016-2024 株式会社").iter().all(|(t, _)| t != "JP_ZIP_CODE"));
        assert_eq!(found("〒100-0001"), vec![("JP_ZIP_CODE".to_string(), "〒100-0001".to_string())]);
    }

    #[test]
    fn test_us_zip_sections_and_years() {
        assert!(found("Tokyo 94105").iter().any(|(t, _)| t == "US_ZIP_CODE"));
        assert!(found("Since 19991").iter().all(|(t, _)| t != "US_ZIP_CODE"));
        let in_education = found("Education\nRoom 94105");
        assert!(in_education.iter().all(|(t, _)| t != "US_ZIP_CODE"));
    }

    #[test]
    fn test_birth_context() {
        assert_eq!(
            found("生年月日: 1990年4月1日"),
            vec![("DATE_OF_BIRTH_JP".to_string(), "1990年4月1日".to_string())]
        );
        let plain = extract("入社 2015/04/01");
        assert_eq!(plain.len(), 1);
        assert_eq!(plain[0].entity_type, "DATE");
        assert!((plain[0].score.get() - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_age_range() {
        assert_eq!(found("30歳"), vec![("JP_AGE".to_string(), "30歳".to_string())]);
        assert!(found("150歳").is_empty());
    }

    #[test]
    fn test_address_cut_at_delimiter() {
        let spans = found("東京都千代田区丸の内1-1 TEL 03-1234-5678");
        assert!(spans.contains(&("JP_ADDRESS".to_string(), "東京都千代田区丸の内1-1".to_string())));
        assert!(found("東京都").iter().all(|(t, _)| t != "JP_ADDRESS"));
    }

    #[test]
    fn test_local_merge_priority_then_score() {
        let e = CandidateExtractor::default();
        let merged = e.local_merge(vec![
            CandidateSpan::new("JP_ADDRESS", "test@example", 0, 12, 0.99, "a"),
            CandidateSpan::new("EMAIL_ADDRESS", "test@example.com", 0, 16, 0.5, "b"),
            CandidateSpan::new("PHONE_NUMBER", "x", 20, 25, 0.6, "c"),
            CandidateSpan::new("PHONE_NUMBER", "x", 21, 25, 0.9, "d"),
        ]);
        let kept: Vec<_> = merged.iter().map(|c| c.source.as_str()).collect();
        assert_eq!(kept, vec!["b", "d"]);
    }

    #[test]
    fn test_detector_scopes() {
        let d = doc("a\nTaro");
        let line_mock = DetectorAdapter::new(
            MockDetector::new("line")
                .with_entities(&["PERSON"])
                .with_spans(vec![DetectedSpan::new("PERSON", 0, 4, 0.9)]),
        )
        .scope(DetectorScope::Segment);
        let doc_mock = DetectorAdapter::new(
            MockDetector::new("doc")
                .with_entities(&["LOCATION"])
                .with_spans(vec![DetectedSpan::new("LOCATION", 1, 3, 0.9)]),
        );
        let e = CandidateExtractor::default();
        let out = e.extract_detectors(&d, &all(), &[&line_mock, &doc_mock], &NullSink);

        let person = out.iter().find(|c| c.entity_type == "PERSON").unwrap();
        assert_eq!((person.start, person.end), (2, 6));
        assert_eq!(person.text, "Taro");

        let place = out.iter().find(|c| c.entity_type == "LOCATION").unwrap();
        assert_eq!(place.section_id, UNKNOWN_SECTION);
        assert_eq!(place.text, "\nT");
    }

    #[test]
    fn test_detectors_disabled() {
        let config = ExtractionConfig {
            use_ner: false,
            ..ExtractionConfig::default()
        };
        let mock = DetectorAdapter::new(
            MockDetector::new("m")
                .with_entities(&["PERSON"])
                .with_spans(vec![DetectedSpan::new("PERSON", 0, 4, 0.9)]),
        );
        let out = CandidateExtractor::new(&config).extract(
            &doc("Taro"),
            &all(),
            &DetectorSet::new(true, [&mock]),
            &NullSink,
        );
        assert!(out.is_empty());
    }
}
