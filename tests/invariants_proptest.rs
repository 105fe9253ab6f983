//! Property-based tests for the pipeline invariants.
//!
//! Final spans never overlap, stay in [0, 1], are ordered and only carry
//! requested types; the merge passes are idempotent where they should be;
//! collision resolution and dual consensus do not depend on input order.

use masque::category::CategoryTable;
use masque::config::{Config, LanguageMode, Strategy as Detection, DEFAULT_ENTITY_PRIORITY};
use masque::merge::{cross_run_merge, strict_dedupe};
use masque::strategy::{consensus_overlap, dual_consensus};
use masque::types::{Confidence, SpanSliceExt};
use masque::verifier::{valid_date, Verifier};
use masque::{AllowList, CandidateSpan, Redactor, Span, Status, VerificationResult};
use proptest::prelude::*;

const FRAGMENTS: &[&str] = &[
    "090-1234-5678",
    "TEL: 03-1234-5678",
    "test@example.com",
    "Email: 山田@example.jp",
    "〒100-0001",
    "東京都千代田区丸の内1-1",
    "30歳",
    "男性",
    "生年月日: 1990年4月1日",
    "平成2年4月1日",
    "2016-2024",
    "Dr. Jane Smith",
    "氏名: 佐藤 花子",
    "山田太郎様",
    "学歴",
    "連絡先",
    "Lives in Tokyo",
    "94105",
    "(555) 123-4567",
    "hello",
];

const CATEGORIZED: &[&str] = &["PERSON", "JP_PERSON", "LOCATION", "JP_ADDRESS"];

fn document_text() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(prop::sample::select(FRAGMENTS.to_vec()), 0..10),
        prop::sample::select(vec![" ", "\n", "\u{3000}", "\n\n\n"]),
    )
        .prop_map(|(parts, sep)| parts.join(sep))
}

fn spans() -> impl Strategy<Value = Vec<Span>> {
    prop::collection::vec((0usize..60, 1usize..12, 0.0f64..=1.0, 0usize..3), 0..20).prop_map(|raw| {
        raw.into_iter()
            .map(|(start, len, score, t)| Span::new(["A", "B", "C"][t], start, start + len, score))
            .collect()
    })
}

fn detection() -> impl Strategy<Value = (Detection, LanguageMode)> {
    (
        prop::sample::select(vec![Detection::Standalone, Detection::Hybrid, Detection::Dual]),
        prop::sample::select(vec![LanguageMode::En, LanguageMode::Ja, LanguageMode::Auto]),
    )
}

fn active(entity_type: &str, start: usize, len: usize) -> VerificationResult {
    VerificationResult {
        candidate: CandidateSpan::new(entity_type, "x".repeat(len), start, start + len, 0.9, "test"),
        verified_score: Confidence::saturating(0.9),
        status: Status::Mask,
        reason: String::new(),
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn final_spans_are_disjoint_bounded_and_requested(
        text in document_text(),
        (strategy, language) in detection(),
    ) {
        let mut config = Config::default();
        config.detection.strategy = strategy;
        config.detection.language = language;
        let analysis = Redactor::new(config.clone()).unwrap().analyze(&text);
        let chars = analysis.document.text.chars().count();

        prop_assert!(!analysis.spans.has_overlaps());
        prop_assert!(analysis.spans.is_position_ordered());
        for span in &analysis.spans {
            prop_assert!((0.0..=1.0).contains(&span.score));
            prop_assert!(span.start < span.end && span.end <= chars);
            prop_assert!(config.entities_to_mask.contains(&span.entity_type));
        }
    }

    #[test]
    fn masking_replaces_every_final_span(text in document_text()) {
        let redactor = Redactor::new(Config::default()).unwrap();
        let result = redactor.mask(&text).unwrap();
        prop_assert_eq!(result.stats.total, result.entities.len());
        for entity in &result.entities {
            prop_assert!(!entity.text.is_empty());
        }
    }

    #[test]
    fn strict_dedupe_is_idempotent(input in spans()) {
        let once = strict_dedupe(input);
        prop_assert!(!once.has_overlaps());
        prop_assert!(once.is_position_ordered());
        prop_assert_eq!(strict_dedupe(once.clone()), once);
    }

    #[test]
    fn cross_run_then_dedupe_is_disjoint(input in spans()) {
        let merged = strict_dedupe(cross_run_merge(input.clone()));
        prop_assert!(!merged.has_overlaps());
        prop_assert!(merged.len() <= input.len());
    }

    #[test]
    fn allow_listed_text_is_always_excluded(
        term in "[a-zA-Z]{1,12}",
        score in 0.0f64..=1.0,
        entity_type in prop::sample::select(DEFAULT_ENTITY_PRIORITY.to_vec()),
        section in prop::sample::select(vec!["header", "contact", "education"]),
        shout in any::<bool>(),
    ) {
        let verifier = Verifier::new(&Config::default(), AllowList::from_terms([term.clone()]));
        let text = if shout { term.to_uppercase() } else { term.clone() };
        let candidate = CandidateSpan::new(entity_type, text.clone(), 0, text.chars().count(), score, "test")
            .in_section("section_1", section);
        let result = verifier.verify_one(candidate);
        prop_assert_eq!(result.status, Status::Exclude);
        prop_assert_eq!(result.reason.as_str(), "allow_list_match");
    }

    #[test]
    fn collision_keeps_lower_priority_in_any_order(
        i in 0usize..DEFAULT_ENTITY_PRIORITY.len(),
        j in 0usize..DEFAULT_ENTITY_PRIORITY.len(),
        start in 0usize..20,
        len_a in 1usize..10,
        len_b in 1usize..10,
        shift in 0usize..10,
    ) {
        prop_assume!(i != j);
        let verifier = Verifier::new(&Config::default(), AllowList::new());
        let a = active(DEFAULT_ENTITY_PRIORITY[i], start, len_a);
        let b = active(DEFAULT_ENTITY_PRIORITY[j], start + shift.min(len_a - 1), len_b);
        let winner = DEFAULT_ENTITY_PRIORITY[i.min(j)];

        for input in [vec![a.clone(), b.clone()], vec![b, a]] {
            let (kept, excluded) = verifier.resolve_collisions(input);
            prop_assert_eq!(kept.len(), 1);
            prop_assert_eq!(kept[0].candidate.entity_type.as_str(), winner);
            prop_assert_eq!(excluded[0].reason.as_str(), "collision_lower_priority");
            prop_assert_eq!(excluded[0].verified_score.get(), 0.0);
        }
    }

    #[test]
    fn consensus_iff_agreeing_precision_span(
        rule_type in prop::sample::select(CATEGORIZED.to_vec()),
        precision_type in prop::sample::select(vec!["PERSON", "JP_PERSON", "LOCATION", "JP_ADDRESS", "EMAIL_ADDRESS"]),
        (rule_start, rule_len) in (0usize..30, 1usize..10),
        (precision_start, precision_len) in (0usize..30, 1usize..10),
    ) {
        let table = CategoryTable::default();
        let rule = CandidateSpan::new(rule_type, "r", rule_start, rule_start + rule_len, 0.8, "rule");
        let precision = CandidateSpan::new(
            precision_type, "p", precision_start, precision_start + precision_len, 0.9, "precision",
        );
        let agrees = table.same_category(rule_type, precision_type) && consensus_overlap(&rule, &precision);

        let with = dual_consensus(vec![rule.clone()], &[precision], &table);
        prop_assert_eq!(with.candidates.len() == 1, agrees);
        prop_assert_eq!(with.consensus.len() == 1, agrees);

        let without = dual_consensus(vec![rule], &[], &table);
        prop_assert!(without.candidates.is_empty());
    }

    #[test]
    fn out_of_range_dates_are_rejected(
        year in prop_oneof![0u32..1900, 2101u32..10000],
        month in 1u32..=12,
        day in 1u32..=28,
    ) {
        let iso = format!("{year:04}-{month:02}-{day:02}");
        prop_assert!(!valid_date(&iso));
        let cjk = format!("{year:04}年{month}月{day}日");
        prop_assert!(!valid_date(&cjk));
    }

    #[test]
    fn bad_months_are_rejected(year in 1900u32..=2100, month in 13u32..100, day in 1u32..=28) {
        let bad = format!("{year}/{month}/{day}");
        prop_assert!(!valid_date(&bad));
        let good = format!("{year}/{}/{day}", month % 12 + 1);
        prop_assert!(valid_date(&good));
    }
}
