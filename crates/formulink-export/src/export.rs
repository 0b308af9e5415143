//! The batch export orchestrator.
//!
//! Drives every configured mapping formula through the converter, applies
//! the error-handling policy to the output cells, writes the workbook once,
//! and always hands back an [`ExportSummary`]. The only exceptions are an
//! invalid output path, a backend failure, or `Fail` mode tripping, all of
//! which surface as [`ExportError`] with no output file on disk.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use formulink_common::{
    CellCoord, ConversionError, ErrorKind, FallbackAction, Subject,
};
use formulink_convert::{BatchEntry, Converter, validate_output_path};
use serde::{Deserialize, Serialize};

use crate::metadata::write_metadata_sheet;
use crate::options::{ErrorHandling, ExportOptions};
use crate::report::write_failure_report;
use crate::validate::{ValidationReport, validate_saved};
use crate::workbook::OutputBook;

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("invalid output path: {0}")]
    Path(#[from] formulink_convert::PathError),
    #[error("spreadsheet backend error: {0:?}")]
    Backend(umya_spreadsheet::XlsxError),
    #[error("sheet could not be created: {0}")]
    SheetUnavailable(String),
    #[error("export aborted after {failed} of {total} formulas failed")]
    Aborted {
        failed: usize,
        total: usize,
        errors: Vec<ConversionError>,
    },
    #[error("coordinate out of range: {0}")]
    Coord(#[from] formulink_common::CoordError),
    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("results serialization failed: {0}")]
    Json(#[from] serde_json::Error),
}

impl ExportError {
    pub(crate) fn backend(err: umya_spreadsheet::XlsxError) -> Self {
        Self::Backend(err)
    }
}

/// Aggregate outcome of one export run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportSummary {
    /// True when every formula converted and wrote cleanly.
    pub success: bool,
    /// Formulas attempted (non-empty configured formulas).
    pub total: usize,
    /// Formulas written as native formulas.
    pub converted: usize,
    pub error_counts: BTreeMap<ErrorKind, usize>,
    pub elapsed: Duration,
    pub errors: Vec<ConversionError>,
    pub output_path: PathBuf,
    pub report_path: Option<PathBuf>,
    pub validation: Option<ValidationReport>,
}

impl ExportSummary {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn success_rate(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.converted as f64 / self.total as f64 * 100.0
    }
}

/// A fallback note destined for the metadata sheet.
#[derive(Debug, Clone)]
pub(crate) struct FallbackNote {
    pub sheet: String,
    pub cell: String,
    pub note: String,
}

pub struct Exporter {
    options: ExportOptions,
    allowed_root: PathBuf,
}

impl Exporter {
    /// Output paths are confined to `allowed_root`.
    pub fn new(options: ExportOptions, allowed_root: impl Into<PathBuf>) -> Self {
        Self {
            options,
            allowed_root: allowed_root.into(),
        }
    }

    pub fn options(&self) -> &ExportOptions {
        &self.options
    }

    /// Run the whole batch and write `output_path`.
    pub fn export(
        &self,
        converter: &mut Converter,
        output_path: &Path,
    ) -> Result<ExportSummary, ExportError> {
        self.export_inner(converter, output_path).map(|(summary, _)| summary)
    }

    /// Like [`Exporter::export`], additionally writing the per-formula
    /// results document to `results_path`.
    pub fn export_with_results(
        &self,
        converter: &mut Converter,
        output_path: &Path,
        results_path: &Path,
    ) -> Result<ExportSummary, ExportError> {
        let (summary, entries) = self.export_inner(converter, output_path)?;
        crate::results::write_results_json(results_path, &summary, &entries)?;
        Ok(summary)
    }

    fn export_inner(
        &self,
        converter: &mut Converter,
        output_path: &Path,
    ) -> Result<(ExportSummary, Vec<BatchEntry>), ExportError> {
        let started = Instant::now();
        let resolved = validate_output_path(output_path, &self.allowed_root)?;
        let span = tracing::info_span!("export", path = %resolved.display());
        let _guard = span.enter();

        converter.reset_graph();
        let entries = converter.convert_batch(self.options.use_absolute_external_paths);
        let total = entries.len();

        let mut book = OutputBook::open_or_new(
            converter.snapshot().source_path.as_deref(),
        )?;
        let mut converted = 0usize;
        let mut errors: Vec<ConversionError> = Vec::new();
        let mut notes: Vec<FallbackNote> = Vec::new();

        for entry in &entries {
            match self.write_entry(converter, &mut book, entry, &mut notes) {
                EntryOutcome::Written => converted += 1,
                EntryOutcome::Errors(mut entry_errors) => {
                    if self.options.error_handling == ErrorHandling::Fail {
                        errors.append(&mut entry_errors);
                        let failed = errors.len();
                        tracing::warn!(failed, total, "aborting export, fail mode");
                        return Err(ExportError::Aborted {
                            failed,
                            total,
                            errors,
                        });
                    }
                    errors.append(&mut entry_errors);
                }
            }
        }

        // Cycle detection runs over the whole session's graph, after every
        // formula has been converted.
        if self.options.auto_validate {
            for cycle in converter.graph().validate_all() {
                errors.push(ConversionError::new(
                    ErrorKind::CircularReference,
                    format!("circular reference: {}", cycle.join(" -> ")),
                    cycle.join(" -> "),
                ));
            }
        }

        let mut error_counts: BTreeMap<ErrorKind, usize> = BTreeMap::new();
        for error in &errors {
            *error_counts.entry(error.kind).or_default() += 1;
        }

        if self.options.include_metadata_sheet {
            write_metadata_sheet(
                &mut book,
                &self.options,
                total,
                converted,
                &errors,
                &notes,
            )?;
        }
        book.save(&resolved)?;

        let validation = if self.options.auto_validate {
            Some(validate_saved(&resolved, converter.graph())?)
        } else {
            None
        };

        let mut summary = ExportSummary {
            success: errors.is_empty(),
            total,
            converted,
            error_counts,
            elapsed: started.elapsed(),
            errors,
            output_path: resolved.clone(),
            report_path: None,
            validation,
        };
        if summary.has_errors() {
            summary.report_path = Some(write_failure_report(&resolved, &summary)?);
        }
        tracing::info!(
            total = summary.total,
            converted = summary.converted,
            errors = summary.errors.len(),
            "export finished"
        );
        Ok((summary, entries))
    }

    fn write_entry(
        &self,
        converter: &Converter,
        book: &mut OutputBook,
        entry: &BatchEntry,
        notes: &mut Vec<FallbackNote>,
    ) -> EntryOutcome {
        let snapshot = converter.snapshot();
        let Some(target) = snapshot.target(entry.target_id) else {
            return EntryOutcome::Errors(vec![ConversionError::new(
                ErrorKind::ReferenceError,
                format!("unknown target item id {}", entry.target_id),
                "",
            )]);
        };
        let subject = {
            let mut s = Subject::new(&target.name, &target.sheet);
            if let Some(ref column) = entry.column {
                s = s.with_column(column);
            }
            s
        };
        let Some(cell) = target.cell_for(entry.column.as_deref()) else {
            return EntryOutcome::Errors(vec![
                ConversionError::new(
                    ErrorKind::ReferenceError,
                    "target item has no destination cell",
                    "",
                )
                .with_subject(subject),
            ]);
        };
        let coord = match CellCoord::parse_a1(cell) {
            Ok(coord) => coord,
            Err(err) => {
                return EntryOutcome::Errors(vec![
                    ConversionError::new(ErrorKind::CellBoundsError, err.to_string(), "")
                        .with_subject(subject.with_cell(cell)),
                ]);
            }
        };
        let subject = subject.with_cell(cell);

        if entry.conversion.succeeded() {
            if let Err(err) = book.write_formula(&target.sheet, coord, &entry.conversion.formula) {
                return EntryOutcome::Errors(vec![
                    ConversionError::new(ErrorKind::ReferenceError, err.to_string(), "")
                        .with_subject(subject),
                ]);
            }
            return EntryOutcome::Written;
        }

        // Failed conversion: the policy decides what lands in the cell.
        let fallback = match self.options.error_handling {
            ErrorHandling::Preserve if self.options.preserve_values_on_error => {
                let cached = snapshot
                    .formulas
                    .iter()
                    .find(|f| f.target_id == entry.target_id && f.column == entry.column)
                    .and_then(|f| f.cached_value);
                match cached {
                    Some(value) => {
                        if let Err(err) = book.write_number(&target.sheet, coord, value) {
                            return EntryOutcome::Errors(vec![
                                ConversionError::new(ErrorKind::ReferenceError, err.to_string(), "")
                                    .with_subject(subject),
                            ]);
                        }
                        if self.options.add_inline_comments {
                            notes.push(FallbackNote {
                                sheet: target.sheet.clone(),
                                cell: cell.to_string(),
                                note: format!(
                                    "formula conversion failed; wrote cached value {value}"
                                ),
                            });
                        }
                        FallbackAction::UsedValue
                    }
                    None => FallbackAction::Skipped,
                }
            }
            ErrorHandling::Preserve | ErrorHandling::Skip => FallbackAction::Skipped,
            ErrorHandling::Fail => FallbackAction::Failed,
        };
        let entry_errors = entry
            .conversion
            .errors
            .iter()
            .cloned()
            .map(|e| e.with_subject(subject.clone()).with_fallback(fallback))
            .collect();
        EntryOutcome::Errors(entry_errors)
    }
}

enum EntryOutcome {
    Written,
    Errors(Vec<ConversionError>),
}
