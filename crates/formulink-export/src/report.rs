//! Plain-text failure report.
//!
//! Written next to the output workbook whenever a batch finished with any
//! recorded error: run metadata, aggregate counts, per-kind and per-sheet
//! breakdowns, then one detail block per failure.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use chrono::Local;

use crate::export::{ExportError, ExportSummary};

const RULE: &str = "==================================================";

/// Report path for an output workbook: `<stem>_failure_report.txt` in the
/// same directory.
pub fn report_path_for(output: &Path) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "export".to_string());
    output.with_file_name(format!("{stem}_failure_report.txt"))
}

pub(crate) fn write_failure_report(
    output: &Path,
    summary: &ExportSummary,
) -> Result<PathBuf, ExportError> {
    let path = report_path_for(output);
    let text = render_report(output, summary);
    std::fs::write(&path, text)?;
    tracing::info!(path = %path.display(), errors = summary.errors.len(), "failure report written");
    Ok(path)
}

fn render_report(output: &Path, summary: &ExportSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Export Failure Report");
    let _ = writeln!(out, "{RULE}");
    let _ = writeln!(out, "Generated:    {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    let _ = writeln!(out, "Output file:  {}", output.display());
    let _ = writeln!(
        out,
        "Formulas:     {} total, {} converted, {} errors",
        summary.total,
        summary.converted,
        summary.errors.len()
    );
    let _ = writeln!(out, "Success rate: {:.1}%", summary.success_rate());
    let _ = writeln!(out);

    let _ = writeln!(out, "Errors by kind");
    let _ = writeln!(out, "--------------");
    for (kind, count) in &summary.error_counts {
        let _ = writeln!(out, "{kind}: {count}");
    }
    let _ = writeln!(out);

    let mut by_sheet: BTreeMap<String, usize> = BTreeMap::new();
    for error in &summary.errors {
        let sheet = error
            .subject
            .as_ref()
            .map(|s| s.sheet.clone())
            .unwrap_or_else(|| "(no sheet)".to_string());
        *by_sheet.entry(sheet).or_default() += 1;
    }
    let _ = writeln!(out, "Errors by sheet");
    let _ = writeln!(out, "---------------");
    for (sheet, count) in &by_sheet {
        let _ = writeln!(out, "{sheet}: {count}");
    }
    let _ = writeln!(out);

    let _ = writeln!(out, "Details");
    let _ = writeln!(out, "-------");
    for (index, error) in summary.errors.iter().enumerate() {
        let _ = write!(out, "[{}] {}", index + 1, error.kind);
        if let Some(ref subject) = error.subject {
            let _ = write!(out, " - {} ({}", subject.name, subject.sheet);
            if let Some(ref cell) = subject.cell {
                let _ = write!(out, "!{cell}");
            }
            if let Some(ref column) = subject.column {
                let _ = write!(out, ", column {column}");
            }
            let _ = write!(out, ")");
        }
        let _ = writeln!(out);
        if !error.formula.is_empty() {
            let _ = writeln!(out, "    formula:  {}", error.formula);
        }
        let _ = writeln!(out, "    message:  {}", error.message);
        let _ = writeln!(out, "    fallback: {}", error.fallback);
        let _ = writeln!(out, "    at:       {}", error.at.format("%Y-%m-%d %H:%M:%S"));
        let _ = writeln!(out);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use formulink_common::{ConversionError, ErrorKind, FallbackAction, Subject};
    use std::time::Duration;

    fn summary_with_errors() -> ExportSummary {
        let errors = vec![
            ConversionError::new(
                ErrorKind::CellNotFound,
                "no cell found for [利润表]![甲]![本期金额]",
                "[利润表]![甲]![本期金额]",
            )
            .with_subject(Subject::new("甲", "汇总表").with_cell("C3"))
            .with_fallback(FallbackAction::UsedValue),
            ConversionError::new(ErrorKind::SyntaxError, "no recognizable reference", "待定"),
        ];
        let mut counts = std::collections::BTreeMap::new();
        counts.insert(ErrorKind::CellNotFound, 1);
        counts.insert(ErrorKind::SyntaxError, 1);
        ExportSummary {
            success: false,
            total: 5,
            converted: 3,
            error_counts: counts,
            elapsed: Duration::from_millis(12),
            errors,
            output_path: PathBuf::from("out.xlsx"),
            report_path: None,
            validation: None,
        }
    }

    #[test]
    fn report_names_kinds_sheets_and_fallbacks() {
        let text = render_report(Path::new("/tmp/out.xlsx"), &summary_with_errors());
        assert!(text.contains("cell_not_found: 1"));
        assert!(text.contains("syntax_error: 1"));
        assert!(text.contains("汇总表: 1"));
        assert!(text.contains("(no sheet): 1"));
        assert!(text.contains("fallback: used_value"));
        assert!(text.contains("Success rate: 60.0%"));
        assert!(text.contains("[利润表]![甲]![本期金额]"));
    }

    #[test]
    fn report_path_is_stem_suffixed() {
        assert_eq!(
            report_path_for(Path::new("/a/b/年报2024.xlsx")),
            PathBuf::from("/a/b/年报2024_failure_report.txt")
        );
    }
}
