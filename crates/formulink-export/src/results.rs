//! Machine-readable results document.
//!
//! One JSON file per export run: the summary plus a per-formula record, so
//! downstream tooling does not have to parse the plain-text report.

use std::fs::File;
use std::io::BufWriter;
use std::path::Path;

use chrono::Local;
use formulink_convert::BatchEntry;
use serde::Serialize;

use crate::export::{ExportError, ExportSummary};

#[derive(Debug, Serialize)]
struct ResultsDocument<'a> {
    generated_at: String,
    output_path: String,
    summary: &'a ExportSummary,
    results: Vec<FormulaResult<'a>>,
}

#[derive(Debug, Serialize)]
struct FormulaResult<'a> {
    target_id: u64,
    column: Option<&'a str>,
    succeeded: bool,
    formula: &'a str,
    error_kinds: Vec<&'static str>,
}

/// Write the results JSON for one export run.
pub fn write_results_json(
    path: &Path,
    summary: &ExportSummary,
    entries: &[BatchEntry],
) -> Result<(), ExportError> {
    let document = ResultsDocument {
        generated_at: Local::now().to_rfc3339(),
        output_path: summary.output_path.display().to_string(),
        summary,
        results: entries
            .iter()
            .map(|entry| FormulaResult {
                target_id: entry.target_id,
                column: entry.column.as_deref(),
                succeeded: entry.conversion.succeeded(),
                formula: &entry.conversion.formula,
                error_kinds: entry
                    .conversion
                    .errors
                    .iter()
                    .map(|e| e.kind.as_str())
                    .collect(),
            })
            .collect(),
    };
    let file = BufWriter::new(File::create(path)?);
    serde_json::to_writer_pretty(file, &document)?;
    Ok(())
}
