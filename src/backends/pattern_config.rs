//! Declarative pattern table for [`super::PatternDetector`].
//!
//! Each entry is a regex, the label it emits, a base score and the context
//! words that boost it. Regexes compile once, lazily.

use once_cell::sync::Lazy;
use regex::Regex;

/// Added to a match's score when a context word precedes it on its line.
pub const CONTEXT_BOOST: f64 = 0.35;

/// A pattern definition: regex + entity type + score + name + context.
pub struct PatternDef {
    /// The compiled regex pattern.
    pub regex: &'static Lazy<Regex>,
    /// The label assigned to matches.
    pub entity_type: &'static str,
    /// Base score before context boosting.
    pub score: f64,
    /// Pattern name, for logging.
    pub name: &'static str,
    /// Words that raise confidence when they appear before the match.
    pub context: &'static [&'static str],
}

const PHONE_JP_CONTEXT: &[&str] = &["TEL", "電話", "携帯", "自宅", "tel", "Tel"];
const ZIP_JP_CONTEXT: &[&str] = &["〒", "郵便番号", "郵便", "zip", "ZIP"];
const BIRTH_CONTEXT: &[&str] = &["生年月日", "年齢", "生まれ", "誕生日", "生年", "年月日"];
const EMAIL_CONTEXT: &[&str] = &["email", "Email", "E-mail", "mail", "メール"];
const PHONE_CONTEXT: &[&str] = &["phone", "Phone", "TEL", "tel", "mobile", "cell"];

/// All pattern definitions. Order only matters for logging.
pub static PATTERNS: Lazy<Vec<PatternDef>> = Lazy::new(|| {
    vec![
        // Japanese phones
        PatternDef { regex: &PHONE_JP_GENERAL, entity_type: "PHONE_NUMBER_JP", score: 0.7, name: "japanese_phone_general", context: PHONE_JP_CONTEXT },
        PatternDef { regex: &PHONE_JP_MOBILE, entity_type: "PHONE_NUMBER_JP", score: 0.8, name: "japanese_mobile", context: PHONE_JP_CONTEXT },

        // Japanese postal codes
        PatternDef { regex: &ZIP_JP, entity_type: "JP_ZIP_CODE", score: 0.6, name: "japanese_zipcode", context: ZIP_JP_CONTEXT },

        // Birth dates, western and era
        PatternDef { regex: &DATE_SLASH, entity_type: "DATE_OF_BIRTH_JP", score: 0.6, name: "western_date_slash", context: BIRTH_CONTEXT },
        PatternDef { regex: &DATE_HYPHEN, entity_type: "DATE_OF_BIRTH_JP", score: 0.6, name: "western_date_hyphen", context: BIRTH_CONTEXT },
        PatternDef { regex: &DATE_KANJI, entity_type: "DATE_OF_BIRTH_JP", score: 0.7, name: "japanese_date_kanji", context: BIRTH_CONTEXT },
        PatternDef { regex: &DATE_ERA, entity_type: "DATE_OF_BIRTH_JP", score: 0.8, name: "japanese_era_date", context: BIRTH_CONTEXT },

        // Generic contact formats
        PatternDef { regex: &EMAIL, entity_type: "EMAIL_ADDRESS", score: 0.85, name: "email", context: EMAIL_CONTEXT },
        PatternDef { regex: &PHONE_US, entity_type: "PHONE_NUMBER", score: 0.4, name: "phone_us", context: PHONE_CONTEXT },
    ]
});

// =============================================================================
// Regex Definitions (compiled once, lazily)
// =============================================================================

static PHONE_JP_GENERAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"0\d{1,4}-\d{1,4}-\d{4}").expect("PHONE_JP_GENERAL regex is invalid")
});
static PHONE_JP_MOBILE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"0[789]0-\d{4}-\d{4}").expect("PHONE_JP_MOBILE regex is invalid")
});
static ZIP_JP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{3}-\d{4}").expect("ZIP_JP regex is invalid")
});
static DATE_SLASH: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}/\d{1,2}/\d{1,2}").expect("DATE_SLASH regex is invalid")
});
static DATE_HYPHEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}-\d{1,2}-\d{1,2}").expect("DATE_HYPHEN regex is invalid")
});
static DATE_KANJI: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\d{4}年\d{1,2}月\d{1,2}日").expect("DATE_KANJI regex is invalid")
});
static DATE_ERA: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:令和|平成|昭和)\d{1,2}年\d{1,2}月\d{1,2}日").expect("DATE_ERA regex is invalid")
});
static EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b")
        .expect("EMAIL regex is invalid")
});
static PHONE_US: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?:\+?1[-.\s]?)?\(?\d{3}\)?[-.\s]?\d{3}[-.\s]?\d{4}\b")
        .expect("PHONE_US regex is invalid")
});

/// Every label the table can emit.
#[must_use]
pub fn supported_types() -> Vec<String> {
    let mut types: Vec<String> = Vec::new();
    for def in PATTERNS.iter() {
        if !types.iter().any(|t| t == def.entity_type) {
            types.push(def.entity_type.to_string());
        }
    }
    types
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_patterns_compile() {
        assert!(!PATTERNS.is_empty());
        for def in PATTERNS.iter() {
            assert!(def.score > 0.0 && def.score <= 1.0, "{}", def.name);
        }
    }

    #[test]
    fn test_phone_patterns() {
        assert!(PHONE_JP_GENERAL.is_match("03-1234-5678"));
        assert!(PHONE_JP_MOBILE.is_match("090-1234-5678"));
        assert!(!PHONE_JP_MOBILE.is_match("03-1234-5678"));
    }

    #[test]
    fn test_era_pattern() {
        assert!(DATE_ERA.is_match("平成2年4月1日"));
        assert!(DATE_ERA.is_match("令和5年12月31日"));
        assert!(!DATE_ERA.is_match("大正2年4月1日"));
    }

    #[test]
    fn test_supported_types_unique() {
        let types = supported_types();
        assert_eq!(types.len(), 5);
        assert!(types.contains(&"JP_ZIP_CODE".to_string()));
    }
}
