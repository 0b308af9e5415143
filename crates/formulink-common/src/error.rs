//! The conversion-error taxonomy shared by the converter and the exporter.
//!
//! Every failed (or partially failed) conversion produces a structured
//! [`ConversionError`] record; nothing is reported by log line alone. Soft
//! errors let a batch continue with a fallback, hard errors reject the
//! formula in progress, and `CircularReference` is detected batch-wide after
//! the fact.

use core::fmt;

use chrono::{DateTime, Local};

/// Canonical error kinds, rendered in snake_case in reports.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ErrorKind {
    CellNotFound,
    SyntaxError,
    ReferenceError,
    SecurityError,
    CellBoundsError,
    FormulaTooLong,
    CircularReference,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        match self {
            Self::CellNotFound => Severity::Soft,
            Self::SyntaxError
            | Self::ReferenceError
            | Self::SecurityError
            | Self::CellBoundsError
            | Self::FormulaTooLong => Severity::Hard,
            Self::CircularReference => Severity::Batch,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CellNotFound => "cell_not_found",
            Self::SyntaxError => "syntax_error",
            Self::ReferenceError => "reference_error",
            Self::SecurityError => "security_error",
            Self::CellBoundsError => "cell_bounds_error",
            Self::FormulaTooLong => "formula_too_long",
            Self::CircularReference => "circular_reference",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far an error propagates.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Severity {
    /// Recorded; the formula and the batch keep going.
    Soft,
    /// Rejects the whole formula in progress.
    Hard,
    /// Reported once per batch, after all conversions.
    Batch,
}

/// What the exporter did (or will do) with the affected cell.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum FallbackAction {
    /// The last computed value was written in place of the formula.
    UsedValue,
    /// The cell was left untouched.
    #[default]
    Skipped,
    /// The conversion (or the whole batch, under fail mode) was aborted.
    Failed,
}

impl fmt::Display for FallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::UsedValue => "used_value",
            Self::Skipped => "skipped",
            Self::Failed => "failed",
        })
    }
}

/// The target cell a conversion was feeding, for error reports.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Subject {
    /// Display name of the line item.
    pub name: String,
    pub sheet: String,
    /// A1 address of the destination cell, when known.
    pub cell: Option<String>,
    /// Column key for multi-column targets.
    pub column: Option<String>,
}

impl Subject {
    pub fn new(name: impl Into<String>, sheet: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sheet: sheet.into(),
            cell: None,
            column: None,
        }
    }

    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }
}

/// One structured failure record, accumulated per call and per batch.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ConversionError {
    pub subject: Option<Subject>,
    /// The original DSL formula text, verbatim.
    pub formula: String,
    pub kind: ErrorKind,
    pub message: String,
    pub fallback: FallbackAction,
    pub at: DateTime<Local>,
}

impl ConversionError {
    pub fn new(kind: ErrorKind, message: impl Into<String>, formula: impl Into<String>) -> Self {
        Self {
            subject: None,
            formula: formula.into(),
            kind,
            message: message.into(),
            fallback: FallbackAction::default(),
            at: Local::now(),
        }
    }

    pub fn with_subject(mut self, subject: Subject) -> Self {
        self.subject = Some(subject);
        self
    }

    pub fn with_fallback(mut self, fallback: FallbackAction) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn is_hard(&self) -> bool {
        matches!(self.kind.severity(), Severity::Hard)
    }
}

impl fmt::Display for ConversionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind, self.message)?;
        if let Some(ref subject) = self.subject {
            write!(f, " (target {}!{}", subject.sheet, subject.name)?;
            if let Some(ref column) = subject.column {
                write!(f, " [{column}]")?;
            }
            write!(f, ")")?;
        }
        Ok(())
    }
}

impl std::error::Error for ConversionError {}
