//! Detector implementations and the adapter that wraps them.
//!
//! Each detector implements the [`crate::Detector`] trait. The pipeline never
//! calls a detector directly: it goes through a [`DetectorAdapter`], which
//! filters types, swallows failures and declares the detector's group,
//! scope and language.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │ Precision group                                     │
//! │   TokenClassificationDetector<L: SequenceLabeler>   │
//! │   BIO or flat token labels, usually a neural model  │
//! │   wrapped in LazyDetector: built on first use       │
//! ├─────────────────────────────────────────────────────┤
//! │ Rule group                                          │
//! │   ContextDetector: honorifics, labels, titles,      │
//! │     prefectures, locative prepositions              │
//! │   PatternDetector: phones, postal codes, birth      │
//! │     dates, email, with context boosting             │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! | Detector | Group | Scope | Emits |
//! |----------|-------|-------|-------|
//! | `PatternDetector` | rule | segment | phones, zip, dob, email |
//! | `ContextDetector` | rule | document | names, addresses, places |
//! | `TokenClassificationDetector` | precision | document | mapped model labels |
//!
//! # Quick Start
//!
//! ```rust
//! use masque::backends::{DetectorAdapter, DetectorScope, PatternDetector};
//!
//! let adapter = DetectorAdapter::new(PatternDetector::new())
//!     .scope(DetectorScope::Segment)
//!     .source("rule:pattern");
//! let spans = adapter.analyze("TEL 090-1234-5678", &["PHONE_NUMBER_JP".to_string()]);
//! assert_eq!(spans[0].text, "090-1234-5678");
//! ```

pub mod adapter;
pub mod heuristic;
pub mod lazy;
pub mod pattern;
pub mod pattern_config;
pub mod token;

pub use adapter::{DetectorAdapter, DetectorGroup, DetectorScope, LanguageSupport};
pub use heuristic::ContextDetector;
pub use lazy::LazyDetector;
pub use pattern::PatternDetector;
pub use token::{SequenceLabeler, TokenClassificationDetector, TokenPrediction};
