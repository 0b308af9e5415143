//! Batch export: drives mapping-formula conversion across a whole project
//! and writes the output workbook, metadata sheet, failure report, and
//! optional results JSON.

pub mod export;
pub mod metadata;
pub mod options;
pub mod report;
pub mod results;
pub mod validate;
pub mod workbook;

pub use export::{ExportError, ExportSummary, Exporter};
pub use metadata::METADATA_SHEET;
pub use options::{ErrorHandling, ExportOptions};
pub use report::report_path_for;
pub use results::write_results_json;
pub use validate::ValidationReport;
