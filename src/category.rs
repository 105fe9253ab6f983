//! Entity category normalization across detector vocabularies.
//!
//! # The label misalignment problem
//!
//! Detectors disagree about what to call the same thing:
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │ Detector           │ "田中太郎"    │ "東京都港区1-2-3"     │
//! ├──────────────────────────────────────────────────────────┤
//! │ Pattern/context    │ JP_PERSON     │ JP_ADDRESS            │
//! │ English context    │ PERSON        │ LOCATION              │
//! │ Sequence labeler   │ PERSON        │ LOCATION              │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! A [`CategoryTable`] maps each canonical category (`person`, `address`) to
//! the detector-specific labels it covers. Comparing two labels from
//! different detectors means comparing their [`CategoryTable::normalize`]d
//! forms. Labels outside the table (phones, postal codes) are
//! category-agnostic: they normalize to themselves and never need a second
//! detector's agreement.
//!
//! ```rust
//! use masque::CategoryTable;
//!
//! let table = CategoryTable::default();
//! assert_eq!(table.normalize("JP_PERSON"), "PERSON");
//! assert_eq!(table.normalize("PERSON"), "PERSON");
//! assert_eq!(table.normalize("PHONE_NUMBER_JP"), "PHONE_NUMBER_JP");
//! assert!(table.requires_consensus("LOCATION"));
//! assert!(!table.requires_consensus("EMAIL_ADDRESS"));
//! ```

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Canonical category for person-like labels.
pub const PERSON_CATEGORY: &str = "person";

/// Canonical category for address-like labels.
pub const ADDRESS_CATEGORY: &str = "address";

/// Mapping from canonical category name to the labels it covers.
///
/// Iteration is in category-name order. The table does not check that a
/// label belongs to at most one category; when it belongs to several, the
/// alphabetically first category wins.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CategoryTable {
    categories: BTreeMap<String, BTreeSet<String>>,
}

impl Default for CategoryTable {
    fn default() -> Self {
        Self::new()
            .with_category(PERSON_CATEGORY, ["PERSON", "JP_PERSON"])
            .with_category(ADDRESS_CATEGORY, ["LOCATION", "JP_ADDRESS"])
    }
}

impl CategoryTable {
    /// An empty table: every label is category-agnostic.
    #[must_use]
    pub fn new() -> Self {
        Self {
            categories: BTreeMap::new(),
        }
    }

    /// Add (or extend) a category.
    #[must_use]
    pub fn with_category<I, S>(mut self, category: &str, labels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories
            .entry(category.to_string())
            .or_default()
            .extend(labels.into_iter().map(Into::into));
        self
    }

    /// Build from a plain map, e.g. the `entity_categories` config section.
    #[must_use]
    pub fn from_map(map: &BTreeMap<String, Vec<String>>) -> Self {
        map.iter()
            .fold(Self::new(), |t, (cat, labels)| t.with_category(cat, labels.iter().cloned()))
    }

    /// Map a label onto its category (uppercased), or return it unchanged.
    ///
    /// Pure; no match is not an error.
    #[must_use]
    pub fn normalize(&self, entity_type: &str) -> String {
        self.category_of(entity_type)
            .map(str::to_uppercase)
            .unwrap_or_else(|| entity_type.to_string())
    }

    /// The category containing `entity_type`, as written in the table.
    #[must_use]
    pub fn category_of(&self, entity_type: &str) -> Option<&str> {
        self.categories
            .iter()
            .find(|(_, labels)| labels.contains(entity_type))
            .map(|(cat, _)| cat.as_str())
    }

    /// Whether `entity_type` belongs to `category` (case-insensitive name).
    #[must_use]
    pub fn is_in(&self, entity_type: &str, category: &str) -> bool {
        self.category_of(entity_type)
            .is_some_and(|c| c.eq_ignore_ascii_case(category))
    }

    /// Labels in the table need two detectors to agree under dual detection.
    #[must_use]
    pub fn requires_consensus(&self, entity_type: &str) -> bool {
        self.category_of(entity_type).is_some()
    }

    /// Whether two labels describe the same kind of thing.
    #[must_use]
    pub fn same_category(&self, a: &str, b: &str) -> bool {
        self.normalize(a) == self.normalize(b)
    }

    /// Every label mentioned anywhere in the table.
    #[must_use]
    pub fn all_labels(&self) -> BTreeSet<&str> {
        self.categories
            .values()
            .flat_map(|labels| labels.iter().map(String::as_str))
            .collect()
    }

    /// Number of categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.categories.len()
    }

    /// No categories configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.categories.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_label_passes_through() {
        let table = CategoryTable::default();
        assert_eq!(table.normalize("JP_ZIP_CODE"), "JP_ZIP_CODE");
        assert!(!table.requires_consensus("JP_ZIP_CODE"));
    }

    #[test]
    fn test_category_name_is_uppercased() {
        let table = CategoryTable::new().with_category("Organization", ["ORG", "JP_ORGANIZATION"]);
        assert_eq!(table.normalize("JP_ORGANIZATION"), "ORGANIZATION");
        assert!(table.same_category("ORG", "JP_ORGANIZATION"));
        assert!(table.is_in("ORG", "organization"));
    }

    #[test]
    fn test_cross_category_labels_differ() {
        let table = CategoryTable::default();
        assert!(!table.same_category("JP_PERSON", "JP_ADDRESS"));
        assert!(table.same_category("LOCATION", "JP_ADDRESS"));
    }

    #[test]
    fn test_insertion_order_does_not_matter() {
        let mut a = BTreeMap::new();
        a.insert("address".to_string(), vec!["LOCATION".to_string()]);
        a.insert("person".to_string(), vec!["PERSON".to_string()]);
        let t1 = CategoryTable::from_map(&a);
        let t2 = CategoryTable::new()
            .with_category("person", ["PERSON"])
            .with_category("address", ["LOCATION"]);
        assert_eq!(t1, t2);
        assert_eq!(t1.normalize("LOCATION"), t2.normalize("LOCATION"));
    }

    #[test]
    fn test_empty_table_requires_nothing() {
        let table = CategoryTable::new();
        assert!(table.is_empty());
        assert!(!table.requires_consensus("PERSON"));
        assert!(table.all_labels().is_empty());
    }
}
