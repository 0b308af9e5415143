//! The `_Export_Metadata` sheet.
//!
//! Run info, aggregate counts, one row per error, and one row per fallback
//! note when inline comments are enabled. The writer backend has
//! no portable cell-comment surface, so per-cell notes live here instead of
//! on the affected cells.

use chrono::Local;
use formulink_common::{CellCoord, ConversionError};

use crate::export::{ExportError, FallbackNote};
use crate::options::ExportOptions;
use crate::workbook::OutputBook;

pub const METADATA_SHEET: &str = "_Export_Metadata";

fn put(book: &mut OutputBook, row: u32, col: u32, text: &str) -> Result<(), ExportError> {
    book.write_text(METADATA_SHEET, CellCoord::new(row, col)?, text)
}

fn put_number(book: &mut OutputBook, row: u32, col: u32, value: f64) -> Result<(), ExportError> {
    book.write_number(METADATA_SHEET, CellCoord::new(row, col)?, value)
}

pub(crate) fn write_metadata_sheet(
    book: &mut OutputBook,
    options: &ExportOptions,
    total: usize,
    converted: usize,
    errors: &[ConversionError],
    notes: &[FallbackNote],
) -> Result<(), ExportError> {
    book.ensure_sheet(METADATA_SHEET);
    let mut row = 1u32;

    put(book, row, 1, "Formulink export")?;
    row += 1;
    put(book, row, 1, "generated")?;
    put(book, row, 2, &Local::now().format("%Y-%m-%d %H:%M:%S").to_string())?;
    row += 1;
    put(book, row, 1, "error handling")?;
    put(book, row, 2, &format!("{:?}", options.error_handling).to_lowercase())?;
    row += 1;
    put(book, row, 1, "formulas")?;
    put_number(book, row, 2, total as f64)?;
    row += 1;
    put(book, row, 1, "converted")?;
    put_number(book, row, 2, converted as f64)?;
    row += 1;
    put(book, row, 1, "errors")?;
    put_number(book, row, 2, errors.len() as f64)?;
    row += 2;

    if !errors.is_empty() {
        for (col, header) in ["kind", "sheet", "item", "cell", "message"].into_iter().enumerate() {
            put(book, row, col as u32 + 1, header)?;
        }
        row += 1;
        for error in errors {
            put(book, row, 1, error.kind.as_str())?;
            if let Some(ref subject) = error.subject {
                put(book, row, 2, &subject.sheet)?;
                put(book, row, 3, &subject.name)?;
                if let Some(ref cell_ref) = subject.cell {
                    put(book, row, 4, cell_ref)?;
                }
            }
            put(book, row, 5, &error.message)?;
            row += 1;
        }
        row += 1;
    }

    if !notes.is_empty() {
        put(book, row, 1, "fallback notes")?;
        row += 1;
        for note in notes {
            put(book, row, 1, &note.sheet)?;
            put(book, row, 2, &note.cell)?;
            put(book, row, 3, &note.note)?;
            row += 1;
        }
    }
    Ok(())
}
