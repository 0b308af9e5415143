//! Recognition of mapping references inside a formula.
//!
//! The DSL went through several generations. The current form is the
//! three-segment reference `[Sheet]![Item]![Column]`; earlier project files
//! still carry pipe-delimited, quoted, and bare-cell spellings. Each
//! generation is one [`ReferenceForm`] variant with its own matcher, tried in
//! a fixed priority order so grammar evolution stays auditable.
//!
//! Parsing never fails: unrecognized text simply yields no occurrences.
//! Matching expects text already folded by [`crate::normalize_dsl`]; spans
//! are byte ranges into that normalized text so substitution can run
//! right-to-left without offset drift.

use core::fmt;

use once_cell::sync::Lazy;
use regex::Regex;

/// One generation of the reference grammar, with its captured segments.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceForm {
    /// Current form: `[Sheet]![Item]![Column]`.
    ThreeSegment {
        sheet: String,
        item: String,
        column: String,
    },
    /// Legacy multi-column form: `[Sheet:"Item"|column-key](A1)`.
    PipeColumn {
        sheet: String,
        item: String,
        column_key: String,
        cell: String,
    },
    /// Legacy compound-column form: `[Sheet:"Item:Column"](A1)`.
    QuotedCompound {
        sheet: String,
        item: String,
        column: String,
        cell: String,
    },
    /// Legacy single-item form: `[Sheet:"Item"](A1)`.
    QuotedItem {
        sheet: String,
        item: String,
        cell: String,
    },
    /// Legacy bare-cell form: `[Sheet]A1`.
    BareCell { sheet: String, cell: String },
}

impl ReferenceForm {
    pub fn sheet(&self) -> &str {
        match self {
            Self::ThreeSegment { sheet, .. }
            | Self::PipeColumn { sheet, .. }
            | Self::QuotedCompound { sheet, .. }
            | Self::QuotedItem { sheet, .. }
            | Self::BareCell { sheet, .. } => sheet,
        }
    }

    pub fn item(&self) -> Option<&str> {
        match self {
            Self::ThreeSegment { item, .. }
            | Self::PipeColumn { item, .. }
            | Self::QuotedCompound { item, .. }
            | Self::QuotedItem { item, .. } => Some(item),
            Self::BareCell { .. } => None,
        }
    }

    /// The column segment, however this generation spelled it.
    pub fn column(&self) -> Option<&str> {
        match self {
            Self::ThreeSegment { column, .. } | Self::QuotedCompound { column, .. } => Some(column),
            Self::PipeColumn { column_key, .. } => Some(column_key),
            Self::QuotedItem { .. } | Self::BareCell { .. } => None,
        }
    }

    /// The A1 cell the legacy forms carried inline, if any.
    pub fn inline_cell(&self) -> Option<&str> {
        match self {
            Self::PipeColumn { cell, .. }
            | Self::QuotedCompound { cell, .. }
            | Self::QuotedItem { cell, .. }
            | Self::BareCell { cell, .. } => Some(cell),
            Self::ThreeSegment { .. } => None,
        }
    }
}

impl fmt::Display for ReferenceForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ThreeSegment {
                sheet,
                item,
                column,
            } => write!(f, "[{sheet}]![{item}]![{column}]"),
            Self::PipeColumn {
                sheet,
                item,
                column_key,
                cell,
            } => write!(f, "[{sheet}:\"{item}\"|{column_key}]({cell})"),
            Self::QuotedCompound {
                sheet,
                item,
                column,
                cell,
            } => write!(f, "[{sheet}:\"{item}:{column}\"]({cell})"),
            Self::QuotedItem { sheet, item, cell } => write!(f, "[{sheet}:\"{item}\"]({cell})"),
            Self::BareCell { sheet, cell } => write!(f, "[{sheet}]{cell}"),
        }
    }
}

/// A recognized reference plus its byte span in the normalized text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub form: ReferenceForm,
    pub start: usize,
    pub end: usize,
}

impl Occurrence {
    pub fn text<'a>(&self, source: &'a str) -> &'a str {
        &source[self.start..self.end]
    }
}

static THREE_SEGMENT_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[([^\[\]]+)\]!\[([^\[\]]+)\]!\[([^\[\]]+)\]").expect("static pattern")
});

static PIPE_COLUMN_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\[\]:"]+):"([^"]+)"\|([^\[\]|]+)\]\(([A-Za-z]{1,3}[0-9]{1,7})\)"#)
        .expect("static pattern")
});

static QUOTED_COMPOUND_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\[\]:"]+):"([^":]+):([^":]+)"\]\(([A-Za-z]{1,3}[0-9]{1,7})\)"#)
        .expect("static pattern")
});

static QUOTED_ITEM_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\[([^\[\]:"]+):"([^"]+)"\]\(([A-Za-z]{1,3}[0-9]{1,7})\)"#).expect("static pattern")
});

static BARE_CELL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[([^\[\]]+)\]([A-Za-z]{1,3}[0-9]{1,7})").expect("static pattern"));

/// Extract every reference occurrence from `text`, in source order.
///
/// The current three-segment form wins outright: when it matches anywhere,
/// legacy grammars are not consulted at all. Otherwise the legacy forms are
/// tried in priority order, each claiming spans the earlier ones left free.
pub fn parse(text: &str) -> Vec<Occurrence> {
    let mut occurrences: Vec<Occurrence> = THREE_SEGMENT_RE
        .captures_iter(text)
        .map(|caps| {
            let m = caps.get(0).expect("whole match");
            Occurrence {
                form: ReferenceForm::ThreeSegment {
                    sheet: caps[1].to_string(),
                    item: caps[2].to_string(),
                    column: caps[3].to_string(),
                },
                start: m.start(),
                end: m.end(),
            }
        })
        .collect();
    if !occurrences.is_empty() {
        return occurrences;
    }

    let mut claimed: Vec<(usize, usize)> = Vec::new();
    let mut push_free = |occurrences: &mut Vec<Occurrence>, occ: Occurrence| {
        let overlaps = claimed
            .iter()
            .any(|&(s, e)| occ.start < e && s < occ.end);
        if !overlaps {
            claimed.push((occ.start, occ.end));
            occurrences.push(occ);
        }
    };

    for caps in PIPE_COLUMN_RE.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        push_free(
            &mut occurrences,
            Occurrence {
                form: ReferenceForm::PipeColumn {
                    sheet: caps[1].to_string(),
                    item: caps[2].to_string(),
                    column_key: caps[3].to_string(),
                    cell: caps[4].to_ascii_uppercase(),
                },
                start: m.start(),
                end: m.end(),
            },
        );
    }
    for caps in QUOTED_COMPOUND_RE.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        push_free(
            &mut occurrences,
            Occurrence {
                form: ReferenceForm::QuotedCompound {
                    sheet: caps[1].to_string(),
                    item: caps[2].to_string(),
                    column: caps[3].to_string(),
                    cell: caps[4].to_ascii_uppercase(),
                },
                start: m.start(),
                end: m.end(),
            },
        );
    }
    for caps in QUOTED_ITEM_RE.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        push_free(
            &mut occurrences,
            Occurrence {
                form: ReferenceForm::QuotedItem {
                    sheet: caps[1].to_string(),
                    item: caps[2].to_string(),
                    cell: caps[3].to_ascii_uppercase(),
                },
                start: m.start(),
                end: m.end(),
            },
        );
    }
    for caps in BARE_CELL_RE.captures_iter(text) {
        let m = caps.get(0).expect("whole match");
        push_free(
            &mut occurrences,
            Occurrence {
                form: ReferenceForm::BareCell {
                    sheet: caps[1].to_string(),
                    cell: caps[2].to_ascii_uppercase(),
                },
                start: m.start(),
                end: m.end(),
            },
        );
    }

    occurrences.sort_by_key(|occ| occ.start);
    occurrences
}

/// Emit the current-generation spelling of a three-segment reference.
pub fn build_reference(sheet: &str, item: &str, column: &str) -> String {
    format!("[{sheet}]![{item}]![{column}]")
}
