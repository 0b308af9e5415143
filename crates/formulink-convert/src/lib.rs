//! Conversion core: turns mapping-DSL formulas into native spreadsheet
//! formulas against a frozen data-model snapshot.
//!
//! - [`model`]: the read-only snapshot types the converter is built from.
//! - [`resolver`]: symbolic (sheet, item, column) → concrete coordinate,
//!   with accounting-prefix fallback and memoization.
//! - [`security`]: injection screening, bounds checks, output-path
//!   validation.
//! - [`graph`]: the per-session dependency graph and cycle search.
//! - [`convert`]: the per-formula state machine and batch driver.

pub mod convert;
pub mod graph;
pub mod model;
pub mod resolver;
pub mod security;

pub use convert::{BatchEntry, ConcreteReference, Conversion, Converter};
pub use graph::DependencyGraph;
pub use model::{MappingFormula, SheetColumn, SourceItem, TargetItem, WorkbookSnapshot};
pub use resolver::{ITEM_PREFIXES, ResolvedCell, Resolver};
pub use security::{
    PathError, SecurityError, sanitize_literal, validate_bounds, validate_output_path,
};
