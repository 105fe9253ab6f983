//! Terms that are never PII.
//!
//! # Dictionary format
//!
//! One term per line. Blank lines and lines starting with `#` are skipped.
//! A term may carry suffixes that expand into further terms:
//!
//! ```text
//! Python
//! AI/alias[AI|Artificial Intelligence]
//! node.js/js[node|nodejs]
//! ```
//!
//! yields `Python`, `AI`, `Artificial Intelligence`, `node.js`, `node`,
//! `nodejs` (first occurrence kept, order preserved).
//!
//! # Matching
//!
//! A candidate's text matches when it equals a term exactly, or when both
//! agree after [`normalize_term`] (lowercase, trimmed, ASCII and ideographic
//! spaces removed).

use crate::config::AllowListConfig;
use crate::error::Result;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;
use std::path::Path;

static SUFFIX_START: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/(?:alias|js)\[").expect("SUFFIX_START regex is invalid"));
static ALIAS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"/alias\[([^\]]+)\]").expect("ALIAS regex is invalid"));
static JS: Lazy<Regex> = Lazy::new(|| Regex::new(r"/js\[([^\]]+)\]").expect("JS regex is invalid"));

/// Comparison key: lowercase, trimmed, spaces (incl. U+3000) removed.
#[must_use]
pub fn normalize_term(text: &str) -> String {
    text.trim()
        .to_lowercase()
        .chars()
        .filter(|c| *c != ' ' && *c != '\u{3000}')
        .collect()
}

/// Parse dictionary text into terms.
#[must_use]
pub fn parse_dictionary_str(content: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }

        let main = SUFFIX_START.split(line).next().unwrap_or("").trim();
        if !main.is_empty() {
            terms.push(main.to_string());
        }

        for re in [&*ALIAS, &*JS] {
            if let Some(caps) = re.captures(line) {
                terms.extend(
                    caps[1]
                        .split('|')
                        .map(str::trim)
                        .filter(|t| !t.is_empty())
                        .map(str::to_string),
                );
            }
        }
    }

    let mut seen = HashSet::new();
    terms.retain(|t| seen.insert(t.clone()));
    terms
}

/// Read and parse a dictionary file.
pub fn parse_dictionary(path: impl AsRef<Path>) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)?;
    Ok(parse_dictionary_str(&content))
}

/// A set of allowed terms with exact and normalized lookup.
#[derive(Debug, Clone, Default)]
pub struct AllowList {
    exact: HashSet<String>,
    normalized: HashSet<String>,
}

impl AllowList {
    /// An empty list that matches nothing.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from terms.
    #[must_use]
    pub fn from_terms<I, S>(terms: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::new();
        for t in terms {
            list.insert(t);
        }
        list
    }

    /// Build from configuration.
    ///
    /// Disabled configuration yields an empty list. An unreadable dictionary
    /// is logged and skipped; `additional_terms` still apply.
    #[must_use]
    pub fn from_config(config: &AllowListConfig) -> Self {
        if !config.enabled {
            return Self::new();
        }
        let mut list = Self::new();
        if let Some(path) = &config.dictionary_path {
            match parse_dictionary(path) {
                Ok(terms) => {
                    log::debug!("allow list: {} terms from {}", terms.len(), path.display());
                    for t in terms {
                        list.insert(t);
                    }
                }
                Err(e) => log::warn!("allow list dictionary {} skipped: {}", path.display(), e),
            }
        }
        for t in &config.additional_terms {
            list.insert(t.clone());
        }
        list
    }

    /// Add one term.
    pub fn insert(&mut self, term: impl Into<String>) {
        let term = term.into();
        self.normalized.insert(normalize_term(&term));
        self.exact.insert(term);
    }

    /// Exact or normalized match.
    #[must_use]
    pub fn contains(&self, text: &str) -> bool {
        self.exact.contains(text) || self.normalized.contains(&normalize_term(text))
    }

    /// Number of distinct exact terms.
    #[must_use]
    pub fn len(&self) -> usize {
        self.exact.len()
    }

    /// No terms.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.exact.is_empty()
    }
}
