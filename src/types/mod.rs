//! Witness types and extension traits.
//!
//! | Type | Domain | Used for |
//! |------|--------|----------|
//! | [`Confidence`] | [0, 1] | candidate and verified scores |
//! | [`SpanSliceExt`] | `[T: Spanned]` | overlap/order checks on span lists |
//!
//! Parse at the boundary, rely on the invariant afterwards: a detector's raw
//! `f64` becomes a [`Confidence`] once, when the candidate is created.

mod confidence;
mod ext;

pub use confidence::{Confidence, ConfidenceError};
pub use ext::SpanSliceExt;
