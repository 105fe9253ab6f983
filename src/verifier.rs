//! Candidate verification: per-candidate policy, then collision resolution.
//!
//! Each candidate goes through four steps, the first failure ending it as
//! `exclude`:
//!
//! 1. allow-list (`allow_list_match`)
//! 2. section policy, for person- and address-like labels
//! 3. format validation (`format_invalid:<kind>` / `format_valid:<kind>`)
//! 4. thresholds: `mask`, `review` or `exclude`
//!
//! The batch then goes through collision resolution: active results are
//! scanned in `start` order and, of any overlapping group, only the result
//! with the lowest priority index stays active. Losers are kept, demoted to
//! `exclude` with reason `collision_lower_priority`.

use crate::allow_list::AllowList;
use crate::category::{CategoryTable, ADDRESS_CATEGORY, PERSON_CATEGORY};
use crate::config::{Config, ExtractionConfig, VerificationConfig};
use crate::span::{CandidateSpan, Spanned, Status, VerificationResult};
use once_cell::sync::Lazy;
use regex::Regex;
use std::fmt;

static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$|^[\x{3040}-\x{309F}\x{30A0}-\x{30FF}\x{4E00}-\x{9FFF}\w._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$",
    )
    .expect("EMAIL regex is invalid")
});
static PHONE_JP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^0\d{1,4}-?\d{1,4}-?\d{4}$|^\+81-?\d{1,4}-?\d{1,4}-?\d{4}$")
        .expect("PHONE_JP regex is invalid")
});
static PHONE_EN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\+1-?\d{3}-?\d{3}-?\d{4}$|^\(\d{3}\)\s?\d{3}-\d{4}$").expect("PHONE_EN regex is invalid")
});
static JP_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^〒?\s*\d{3}-\d{4}$").expect("JP_ZIP regex is invalid"));
static US_ZIP: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{5}(-\d{4})?$").expect("US_ZIP regex is invalid"));
static DATE_NUMERIC: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})[-/](\d{1,2})[-/](\d{1,2})$").expect("DATE_NUMERIC regex is invalid")
});
static DATE_KANJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(\d{4})年(\d{1,2})月(\d{1,2})日$").expect("DATE_KANJI regex is invalid")
});
static DATE_ERA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^(令和|平成|昭和)(\d{1,2}|元)年(\d{1,2})月(\d{1,2})日$").expect("DATE_ERA regex is invalid")
});

/// Format families with a dedicated validator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FormatKind {
    /// Strict address grammar.
    Email,
    /// Japanese numbers, domestic or `+81`.
    PhoneJp,
    /// North American numbers, `+1` or `(NNN) NNN-NNNN`.
    PhoneEn,
    /// `NNN-NNNN`, optionally after `〒`.
    JpZip,
    /// `NNNNN` or `NNNNN-NNNN`.
    UsZip,
    /// Gregorian or era date with plausible fields.
    Date,
}

impl FormatKind {
    /// Validator for an entity type, if it has one.
    #[must_use]
    pub fn for_entity(entity_type: &str) -> Option<Self> {
        Some(match entity_type {
            "EMAIL_ADDRESS" => Self::Email,
            "PHONE_NUMBER_JP" => Self::PhoneJp,
            "PHONE_NUMBER" => Self::PhoneEn,
            "JP_ZIP_CODE" => Self::JpZip,
            "US_ZIP_CODE" => Self::UsZip,
            "DATE_OF_BIRTH_JP" | "DATE" => Self::Date,
            _ => return None,
        })
    }

    /// Name used in reason strings.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::PhoneJp => "phone_jp",
            Self::PhoneEn => "phone_en",
            Self::JpZip => "jp_zip",
            Self::UsZip => "us_zip",
            Self::Date => "date",
        }
    }

    /// Whether `text` (surrounding whitespace ignored) has this format.
    #[must_use]
    pub fn validate(self, text: &str) -> bool {
        let text = text.trim();
        match self {
            Self::Email => EMAIL.is_match(text),
            Self::PhoneJp => {
                let compact: String = text.chars().filter(|c| *c != ' ' && *c != '\u{3000}').collect();
                PHONE_JP.is_match(&compact)
            }
            Self::PhoneEn => PHONE_EN.is_match(&text.replace(' ', "")),
            Self::JpZip => JP_ZIP.is_match(text),
            Self::UsZip => US_ZIP.is_match(text),
            Self::Date => valid_date(text),
        }
    }
}

impl fmt::Display for FormatKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Whether `text` is a date with year in 1900..=2100, month in 1..=12 and
/// day in 1..=31.
///
/// Accepts `YYYY-MM-DD`, `YYYY/M/D`, `YYYY年M月D日` and era dates
/// (`令和`, `平成`, `昭和`, with `元` for the first year), the latter
/// converted to the Gregorian year.
#[must_use]
pub fn valid_date(text: &str) -> bool {
    let fields = if let Some(c) = DATE_NUMERIC.captures(text).or_else(|| DATE_KANJI.captures(text)) {
        (c[1].parse::<u32>().ok(), c[2].parse::<u32>().ok(), c[3].parse::<u32>().ok())
    } else if let Some(c) = DATE_ERA.captures(text) {
        let base = match &c[1] {
            "令和" => 2018,
            "平成" => 1988,
            _ => 1925,
        };
        let year = if &c[2] == "元" { Some(1) } else { c[2].parse::<u32>().ok() };
        (year.map(|y| base + y), c[3].parse::<u32>().ok(), c[4].parse::<u32>().ok())
    } else {
        return false;
    };
    matches!(fields, (Some(1900..=2100), Some(1..=12), Some(1..=31)))
}

/// Applies allow-list, section policy, format and thresholds.
#[derive(Debug, Clone)]
pub struct Verifier {
    config: VerificationConfig,
    priority: ExtractionConfig,
    categories: CategoryTable,
    allow_list: AllowList,
}

impl Verifier {
    /// Verifier for `config`, suppressing `allow_list` terms.
    #[must_use]
    pub fn new(config: &Config, allow_list: AllowList) -> Self {
        Self {
            config: config.verification.clone(),
            priority: config.extraction.clone(),
            categories: config.category_table(),
            allow_list,
        }
    }

    /// Verify every candidate and resolve collisions.
    ///
    /// Returns the resolved active results sorted by `start`, followed by
    /// every excluded result.
    #[must_use]
    pub fn verify(&self, candidates: Vec<CandidateSpan>) -> Vec<VerificationResult> {
        let results: Vec<VerificationResult> = candidates.into_iter().map(|c| self.verify_one(c)).collect();
        let (mut resolved, excluded) = self.resolve_collisions(results);
        log::debug!("verified: {} active, {} excluded", resolved.len(), excluded.len());
        resolved.extend(excluded);
        resolved
    }

    /// Run steps 1 to 4 on one candidate.
    #[must_use]
    pub fn verify_one(&self, candidate: CandidateSpan) -> VerificationResult {
        if self.allow_list.contains(&candidate.text) {
            return VerificationResult::excluded(candidate, "allow_list_match");
        }

        let mut reasons = Vec::new();
        let mut score = candidate.score;

        let adjustment = self.section_adjustment(&candidate);
        if adjustment != 0.0 {
            score = score.adjust(adjustment);
            let kind = if adjustment < 0.0 { "penalty" } else { "boost" };
            reasons.push(format!("section_{kind}:{}", candidate.section_type));
        }

        if let Some(kind) = FormatKind::for_entity(&candidate.entity_type) {
            if !kind.validate(&candidate.text) {
                return VerificationResult::excluded(candidate, format!("format_invalid:{kind}"));
            }
            reasons.push(format!("format_valid:{kind}"));
        }

        let status = if score >= self.config.mask_threshold {
            Status::Mask
        } else if score >= self.config.review_threshold {
            Status::Review
        } else {
            Status::Exclude
        };
        let reason = if reasons.is_empty() {
            "passed_verification".to_string()
        } else {
            reasons.join("; ")
        };

        VerificationResult {
            candidate,
            verified_score: score,
            status,
            reason,
        }
    }

    /// Net section-policy adjustment for a candidate's label and section.
    fn section_adjustment(&self, candidate: &CandidateSpan) -> f64 {
        let Some(policy) = self.config.section_policies.get(&candidate.section_type) else {
            return 0.0;
        };
        if self.categories.is_in(&candidate.entity_type, PERSON_CATEGORY) {
            policy.person_adjustment()
        } else if self.categories.is_in(&candidate.entity_type, ADDRESS_CATEGORY) {
            policy.address_adjustment()
        } else {
            0.0
        }
    }

    /// Split into non-overlapping active results and excluded ones.
    ///
    /// Active results are visited in `start` order. A result overlapping
    /// held ones replaces them only if its priority index is strictly lower
    /// than each of theirs; otherwise it is the one demoted. Ties keep the
    /// held result.
    #[must_use]
    pub fn resolve_collisions(
        &self,
        results: Vec<VerificationResult>,
    ) -> (Vec<VerificationResult>, Vec<VerificationResult>) {
        let (mut active, mut excluded): (Vec<_>, Vec<_>) =
            results.into_iter().partition(|r| r.status.is_active());
        active.sort_by_key(|r| r.candidate.start);

        let priority = |r: &VerificationResult| self.priority.priority_index(&r.candidate.entity_type);
        let mut held: Vec<VerificationResult> = Vec::with_capacity(active.len());
        for result in active {
            let clashing: Vec<usize> = held
                .iter()
                .enumerate()
                .filter(|(_, h)| h.overlaps(&result))
                .map(|(i, _)| i)
                .collect();

            let wins = clashing.iter().all(|&i| priority(&result) < priority(&held[i]));
            if !wins {
                excluded.push(demote(result));
                continue;
            }
            for i in clashing.into_iter().rev() {
                excluded.push(demote(held.remove(i)));
            }
            held.push(result);
        }

        held.sort_by_key(|r| r.candidate.start);
        (held, excluded)
    }
}

fn demote(result: VerificationResult) -> VerificationResult {
    log::debug!(
        "collision: dropping {} at {}..{}",
        result.candidate.entity_type,
        result.candidate.start,
        result.candidate.end
    );
    VerificationResult::excluded(result.candidate, "collision_lower_priority")
}

/// Results with status `mask`.
#[must_use]
pub fn maskable(results: &[VerificationResult]) -> Vec<&VerificationResult> {
    results.iter().filter(|r| r.status == Status::Mask).collect()
}

/// Results with status `review`.
#[must_use]
pub fn review(results: &[VerificationResult]) -> Vec<&VerificationResult> {
    results.iter().filter(|r| r.status == Status::Review).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionPolicy;

    fn verifier() -> Verifier {
        Verifier::new(&Config::default(), AllowList::new())
    }

    fn candidate(ty: &str, text: &str, start: usize, score: f64, section: &str) -> CandidateSpan {
        CandidateSpan::new(ty, text, start, start + text.chars().count(), score, "test")
            .in_section("section_1", section)
    }

    #[test]
    fn test_allow_list_beats_score() {
        let v = Verifier::new(&Config::default(), AllowList::from_terms(["Python"]));
        let r = v.verify_one(candidate("PERSON", "python", 0, 1.0, "contact"));
        assert_eq!(r.status, Status::Exclude);
        assert_eq!(r.reason, "allow_list_match");
        assert_eq!(r.verified_score.get(), 0.0);
    }

    #[test]
    fn test_education_penalty_demotes_to_review() {
        let mut config = Config::default();
        config.verification.section_policies.clear();
        config.verification.section_policies.insert(
            "education".to_string(),
            SectionPolicy {
                person_penalty: -0.3,
                ..SectionPolicy::default()
            },
        );
        let v = Verifier::new(&config, AllowList::new());
        let r = v.verify_one(candidate("JP_PERSON", "山田太郎", 0, 0.8, "education"));
        assert!((r.verified_score.get() - 0.5).abs() < 1e-9);
        assert_eq!(r.status, Status::Review);
        assert_eq!(r.reason, "section_penalty:education");
    }

    #[test]
    fn test_contact_boost() {
        let r = verifier().verify_one(candidate("JP_ADDRESS", "東京都港区1-2-3", 0, 0.6, "contact"));
        assert_eq!(r.status, Status::Mask);
        assert_eq!(r.reason, "section_boost:contact");
    }

    #[test]
    fn test_policy_ignores_other_labels() {
        let r = verifier().verify_one(candidate("EMAIL_ADDRESS", "a@example.com", 0, 0.6, "education"));
        assert_eq!(r.status, Status::Review);
        assert_eq!(r.reason, "format_valid:email");
    }

    #[test]
    fn test_format_invalid() {
        let r = verifier().verify_one(candidate("EMAIL_ADDRESS", "test@example", 0, 0.99, "header"));
        assert_eq!(r.status, Status::Exclude);
        assert_eq!(r.reason, "format_invalid:email");

        let r = verifier().verify_one(candidate("JP_ZIP_CODE", "1234-567", 0, 0.99, "header"));
        assert_eq!(r.reason, "format_invalid:jp_zip");
    }

    #[test]
    fn test_passed_verification() {
        let r = verifier().verify_one(candidate("JP_GENDER", "男性", 0, 0.8, "header"));
        assert_eq!(r.status, Status::Mask);
        assert_eq!(r.reason, "passed_verification");

        let r = verifier().verify_one(candidate("JP_GENDER", "男性", 0, 0.3, "header"));
        assert_eq!(r.status, Status::Exclude);
    }

    #[test]
    fn test_phone_formats() {
        assert!(FormatKind::PhoneJp.validate("090 1234 5678"));
        assert!(FormatKind::PhoneJp.validate("+81-90-1234-5678"));
        assert!(!FormatKind::PhoneJp.validate("1234-5678"));
        assert!(FormatKind::PhoneEn.validate("(555) 123-4567"));
        assert!(FormatKind::PhoneEn.validate("+1 555 123 4567"));
        assert!(FormatKind::UsZip.validate("94105-1234"));
        assert!(FormatKind::JpZip.validate("〒 100-0001"));
    }

    #[test]
    fn test_date_ranges() {
        assert!(valid_date("1990-04-01"));
        assert!(valid_date("1990/4/1"));
        assert!(valid_date("1990年4月1日"));
        assert!(!valid_date("1899-12-31"));
        assert!(!valid_date("2101/1/1"));
        assert!(!valid_date("2020-13-01"));
        assert!(!valid_date("2020年1月32日"));
        assert!(!valid_date("2020-00-10"));
        assert!(!valid_date("April 1"));
    }

    #[test]
    fn test_era_dates() {
        assert!(valid_date("令和5年12月31日"));
        assert!(valid_date("昭和元年12月25日"));
        assert!(valid_date("平成31年4月30日"));
        assert!(!valid_date("平成3年13月1日"));
    }

    #[test]
    fn test_collision_keeps_higher_priority() {
        let v = verifier();
        let results = v.verify(vec![
            candidate("JP_ADDRESS", "test@example", 0, 0.9, "header"),
            candidate("EMAIL_ADDRESS", "test@example.com", 0, 0.95, "header"),
        ]);
        let kept = maskable(&results);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].candidate.entity_type, "EMAIL_ADDRESS");

        let loser = results.iter().find(|r| r.candidate.entity_type == "JP_ADDRESS").unwrap();
        assert_eq!(loser.status, Status::Exclude);
        assert_eq!(loser.reason, "collision_lower_priority");
    }

    #[test]
    fn test_collision_order_independent() {
        let v = verifier();
        let a = candidate("PHONE_NUMBER_JP", "090-1234-5678", 4, 0.9, "header");
        let b = candidate("JP_ZIP_CODE", "090-1234", 4, 0.95, "header");
        for input in [vec![a.clone(), b.clone()], vec![b, a]] {
            let out = v.verify(input);
            let kept = maskable(&out);
            assert_eq!(kept.len(), 1);
            assert_eq!(kept[0].candidate.entity_type, "PHONE_NUMBER_JP");
        }
    }

    #[test]
    fn test_equal_priority_keeps_held() {
        let v = verifier();
        let out = v.verify(vec![
            candidate("JP_AGE", "30歳", 0, 0.9, "header"),
            candidate("JP_AGE", "歳", 2, 0.95, "header"),
        ]);
        let kept = maskable(&out);
        assert_eq!(kept.len(), 1);
        assert_eq!(kept[0].candidate.text, "30歳");
    }

    #[test]
    fn test_later_lower_priority_is_demoted() {
        let v = verifier();
        let out = v.verify(vec![
            candidate("EMAIL_ADDRESS", "taro@example.com", 0, 0.9, "header"),
            candidate("JP_GENDER", "男", 5, 0.9, "header"),
        ]);
        let kept: Vec<_> = maskable(&out).iter().map(|r| r.candidate.entity_type.as_str()).collect();
        assert_eq!(kept, vec!["EMAIL_ADDRESS"]);
        assert_eq!(out.last().unwrap().reason, "collision_lower_priority");
    }

    #[test]
    fn test_review_helper() {
        let v = verifier();
        let out = v.verify(vec![
            candidate("DATE", "2020-01-01", 0, 0.5, "header"),
            candidate("EMAIL_ADDRESS", "a@example.com", 20, 0.95, "header"),
        ]);
        assert_eq!(review(&out).len(), 1);
        assert_eq!(maskable(&out).len(), 1);
        assert!(out.iter().take(2).all(|r| r.status.is_active()));
    }
}
