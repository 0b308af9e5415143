//! Thin wrapper over the xlsx backend.
//!
//! One workbook is read (or created) per export and written once at the
//! end; all cell writes in between are in-memory.

use std::path::Path;

use formulink_common::CellCoord;
use umya_spreadsheet::{Spreadsheet, reader::xlsx, writer::xlsx as xlsx_writer};

use crate::export::ExportError;

pub struct OutputBook {
    book: Spreadsheet,
}

impl OutputBook {
    /// Start from the source workbook when it exists on disk, otherwise
    /// from an empty workbook.
    pub fn open_or_new(source: Option<&Path>) -> Result<Self, ExportError> {
        let book = match source {
            Some(path) if path.exists() => xlsx::read(path).map_err(ExportError::backend)?,
            _ => umya_spreadsheet::new_file(),
        };
        Ok(Self { book })
    }

    pub fn ensure_sheet(&mut self, name: &str) {
        if self.book.get_sheet_by_name(name).is_none() {
            let _ = self.book.new_sheet(name);
        }
    }

    /// Native formula text, with or without the leading `=`; the backend
    /// stores it without.
    pub fn write_formula(
        &mut self,
        sheet: &str,
        coord: CellCoord,
        formula: &str,
    ) -> Result<(), ExportError> {
        let stored = formula.strip_prefix('=').unwrap_or(formula);
        let ws = self.sheet_mut(sheet)?;
        ws.get_cell_mut((coord.col(), coord.row())).set_formula(stored);
        Ok(())
    }

    pub fn write_number(
        &mut self,
        sheet: &str,
        coord: CellCoord,
        value: f64,
    ) -> Result<(), ExportError> {
        let ws = self.sheet_mut(sheet)?;
        ws.get_cell_mut((coord.col(), coord.row())).set_value_number(value);
        Ok(())
    }

    pub fn write_text(
        &mut self,
        sheet: &str,
        coord: CellCoord,
        text: &str,
    ) -> Result<(), ExportError> {
        let ws = self.sheet_mut(sheet)?;
        ws.get_cell_mut((coord.col(), coord.row())).set_value(text);
        Ok(())
    }

    fn sheet_mut(
        &mut self,
        sheet: &str,
    ) -> Result<&mut umya_spreadsheet::Worksheet, ExportError> {
        self.ensure_sheet(sheet);
        self.book
            .get_sheet_by_name_mut(sheet)
            .ok_or_else(|| ExportError::SheetUnavailable(sheet.to_string()))
    }

    pub fn save(&self, path: &Path) -> Result<(), ExportError> {
        xlsx_writer::write(&self.book, path).map_err(ExportError::backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_survive_a_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("roundtrip.xlsx");

        let mut book = OutputBook::open_or_new(None).unwrap();
        let coord = CellCoord::parse_a1("B2").unwrap();
        book.write_formula("汇总表", coord, "=利润表!D5+100").unwrap();
        book.write_number("汇总表", CellCoord::parse_a1("B3").unwrap(), 42.5)
            .unwrap();
        book.save(&path).unwrap();

        let reopened = xlsx::read(&path).unwrap();
        let ws = reopened.get_sheet_by_name("汇总表").unwrap();
        let formula_cell = ws
            .get_cell_collection()
            .into_iter()
            .find(|c| {
                *c.get_coordinate().get_row_num() == 2 && *c.get_coordinate().get_col_num() == 2
            })
            .unwrap();
        let cv = formula_cell.get_cell_value();
        assert!(cv.is_formula());
        assert_eq!(cv.get_formula(), "利润表!D5+100");
    }
}
