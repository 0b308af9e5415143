//! Parser for the Formulink mapping-reference DSL.
//!
//! Three stages, each usable on its own:
//! - [`normalize`]: fold full-width CJK punctuation to ASCII.
//! - [`reference`]: find every DSL reference in a formula, across all four
//!   grammar generations, with byte spans for later substitution.
//! - [`eval`]: a restricted arithmetic evaluator for computing preview
//!   values from substituted formulas.

pub mod eval;
pub mod normalize;
pub mod reference;

pub use eval::{EvalError, evaluate, evaluate_with_values, is_arithmetic};
pub use normalize::normalize_dsl;
pub use reference::{Occurrence, ReferenceForm, build_reference, parse};
