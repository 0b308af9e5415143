//! Read-only snapshot of the project data model.
//!
//! The converter never talks to the live project store. It is handed one
//! [`WorkbookSnapshot`] at construction, builds its lookup indices from it,
//! and treats it as frozen from then on. When the underlying data changes the
//! converter is discarded and rebuilt.

use std::collections::BTreeMap;
use std::path::PathBuf;

/// A target line item: a destination cell (or per-column cells) that a
/// mapping formula writes into.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TargetItem {
    pub id: u64,
    pub sheet: String,
    /// Display name as it appears in the report sheet.
    pub name: String,
    /// Default destination cell, A1.
    pub cell: Option<String>,
    /// Per-column destination cells, keyed by column display name.
    pub column_cells: BTreeMap<String, String>,
}

impl TargetItem {
    pub fn new(id: u64, sheet: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id,
            sheet: sheet.into(),
            name: name.into(),
            cell: None,
            column_cells: BTreeMap::new(),
        }
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    pub fn with_column_cell(mut self, column: impl Into<String>, cell: impl Into<String>) -> Self {
        self.column_cells.insert(column.into(), cell.into());
        self
    }

    /// Destination cell for `column`, falling back to the default cell.
    pub fn cell_for(&self, column: Option<&str>) -> Option<&str> {
        match column {
            Some(key) => self
                .column_cells
                .get(key)
                .map(String::as_str)
                .or(self.cell.as_deref()),
            None => self.cell.as_deref(),
        }
    }
}

/// A source line item extracted from an input workbook: one row of data
/// with per-column values.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SourceItem {
    pub sheet: String,
    pub name: String,
    /// 1-based row the item was extracted from.
    pub row: u32,
    /// Default cell, A1, when the extractor recorded one.
    pub cell: Option<String>,
    /// Extracted numeric values keyed by column display name.
    pub values: BTreeMap<String, f64>,
}

impl SourceItem {
    pub fn new(sheet: impl Into<String>, name: impl Into<String>, row: u32) -> Self {
        Self {
            sheet: sheet.into(),
            name: name.into(),
            row,
            cell: None,
            values: BTreeMap::new(),
        }
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    pub fn with_value(mut self, column: impl Into<String>, value: f64) -> Self {
        self.values.insert(column.into(), value);
        self
    }
}

/// One data column of a source sheet: display name plus its letter.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SheetColumn {
    pub sheet: String,
    pub name: String,
    pub letter: String,
}

impl SheetColumn {
    pub fn new(
        sheet: impl Into<String>,
        name: impl Into<String>,
        letter: impl Into<String>,
    ) -> Self {
        Self {
            sheet: sheet.into(),
            name: name.into(),
            letter: letter.into(),
        }
    }
}

/// A configured mapping formula: DSL text bound to one target cell.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MappingFormula {
    pub target_id: u64,
    /// Column key for multi-column targets; `None` writes the default cell.
    pub column: Option<String>,
    /// The DSL formula text, verbatim as authored.
    pub text: String,
    /// Last value computed for this formula, used as the preserve-mode
    /// fallback when conversion fails.
    pub cached_value: Option<f64>,
}

impl MappingFormula {
    pub fn new(target_id: u64, text: impl Into<String>) -> Self {
        Self {
            target_id,
            column: None,
            text: text.into(),
            cached_value: None,
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_cached_value(mut self, value: f64) -> Self {
        self.cached_value = Some(value);
        self
    }
}

/// Everything the converter reads: extracted source data, configured
/// targets, column metadata, and the formulas to convert.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct WorkbookSnapshot {
    /// Absolute path of the source workbook, for external references.
    pub source_path: Option<PathBuf>,
    pub targets: Vec<TargetItem>,
    pub sources: Vec<SourceItem>,
    pub columns: Vec<SheetColumn>,
    pub formulas: Vec<MappingFormula>,
}

impl WorkbookSnapshot {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.source_path = Some(path.into());
        self
    }

    pub fn target(&self, id: u64) -> Option<&TargetItem> {
        self.targets.iter().find(|t| t.id == id)
    }

    /// Sheets that carry at least one target, in first-seen order.
    pub fn target_sheets(&self) -> Vec<&str> {
        let mut sheets: Vec<&str> = Vec::new();
        for target in &self.targets {
            if !sheets.contains(&target.sheet.as_str()) {
                sheets.push(&target.sheet);
            }
        }
        sheets
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_for_prefers_column_cell() {
        let target = TargetItem::new(1, "利润表", "净利润")
            .with_cell("D20")
            .with_column_cell("本年累计", "E20");
        assert_eq!(target.cell_for(Some("本年累计")), Some("E20"));
        assert_eq!(target.cell_for(Some("本期金额")), Some("D20"));
        assert_eq!(target.cell_for(None), Some("D20"));
    }

    #[test]
    fn target_sheets_dedupes_in_order() {
        let snapshot = WorkbookSnapshot {
            targets: vec![
                TargetItem::new(1, "利润表", "a"),
                TargetItem::new(2, "资产负债表", "b"),
                TargetItem::new(3, "利润表", "c"),
            ],
            ..Default::default()
        };
        assert_eq!(snapshot.target_sheets(), vec!["利润表", "资产负债表"]);
    }
}
