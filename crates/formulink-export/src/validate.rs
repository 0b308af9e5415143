//! Post-save validation.
//!
//! Re-opens the file that was just written and sanity-checks every formula
//! cell: non-empty, balanced parentheses, within the length limit. Cycle
//! findings come from the session's dependency graph, which the converter
//! filled while the formulas were being assembled.

use std::path::Path;

use formulink_common::FORMULA_LEN_LIMIT;
use formulink_convert::DependencyGraph;
use serde::{Deserialize, Serialize};
use umya_spreadsheet::reader::xlsx;

use crate::export::ExportError;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ValidationReport {
    /// Formula cells inspected in the saved file.
    pub checked_formulas: usize,
    /// Human-readable findings, one per defective formula cell.
    pub findings: Vec<String>,
    /// Distinct reference cycles, each closed (first node repeated last).
    pub cycles: Vec<Vec<String>>,
}

impl ValidationReport {
    pub fn is_clean(&self) -> bool {
        self.findings.is_empty() && self.cycles.is_empty()
    }
}

pub(crate) fn validate_saved(
    path: &Path,
    graph: &DependencyGraph,
) -> Result<ValidationReport, ExportError> {
    let book = xlsx::read(path).map_err(ExportError::backend)?;
    let mut report = ValidationReport {
        cycles: graph.validate_all(),
        ..Default::default()
    };
    for index in 0..book.get_sheet_count() {
        let Some(sheet) = book.get_sheet(&index) else {
            continue;
        };
        let sheet_name = sheet.get_name().to_string();
        for cell in sheet.get_cell_collection() {
            let cv = cell.get_cell_value();
            if !cv.is_formula() {
                continue;
            }
            report.checked_formulas += 1;
            let coord = cell.get_coordinate();
            let at = format!(
                "{}!R{}C{}",
                sheet_name,
                coord.get_row_num(),
                coord.get_col_num()
            );
            let formula = cv.get_formula();
            if formula.is_empty() {
                report.findings.push(format!("{at}: empty formula"));
                continue;
            }
            if formula.chars().count() > FORMULA_LEN_LIMIT {
                report
                    .findings
                    .push(format!("{at}: formula exceeds {FORMULA_LEN_LIMIT} characters"));
            }
            if !parens_balanced(formula) {
                report
                    .findings
                    .push(format!("{at}: unbalanced parentheses"));
            }
        }
    }
    if !report.is_clean() {
        tracing::warn!(
            findings = report.findings.len(),
            cycles = report.cycles.len(),
            "post-save validation found problems"
        );
    }
    Ok(report)
}

fn parens_balanced(text: &str) -> bool {
    let mut depth = 0i32;
    for c in text.chars() {
        match c {
            '(' => depth += 1,
            ')' => {
                depth -= 1;
                if depth < 0 {
                    return false;
                }
            }
            _ => {}
        }
    }
    depth == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paren_balance() {
        assert!(parens_balanced("A1+(B2*(C3-1))"));
        assert!(!parens_balanced("A1+(B2"));
        assert!(!parens_balanced("A1)("));
        assert!(parens_balanced(""));
    }
}
