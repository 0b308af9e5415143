//! Full-width punctuation normalization.
//!
//! Formulas authored on CJK input methods routinely arrive with full-width
//! brackets and separators (`［利润表］！［营业收入］`). The grammar only deals
//! in ASCII punctuation, so a fixed table is folded before any matching.
//! Letters, digits, and everything else (including the item names
//! themselves) pass through untouched.

use std::borrow::Cow;

/// The punctuation pairs that are folded, full-width → ASCII.
const FOLD_TABLE: &[(char, char)] = &[
    ('［', '['),
    ('］', ']'),
    ('！', '!'),
    ('（', '('),
    ('）', ')'),
    ('｜', '|'),
    ('：', ':'),
    ('＂', '"'),
    ('“', '"'),
    ('”', '"'),
];

fn fold(c: char) -> Option<char> {
    FOLD_TABLE
        .iter()
        .find(|(wide, _)| *wide == c)
        .map(|(_, ascii)| *ascii)
}

/// Replace every full-width punctuation character from the fixed table with
/// its ASCII counterpart. Borrows when nothing needs folding.
pub fn normalize_dsl(text: &str) -> Cow<'_, str> {
    if !text.chars().any(|c| fold(c).is_some()) {
        return Cow::Borrowed(text);
    }
    Cow::Owned(text.chars().map(|c| fold(c).unwrap_or(c)).collect())
}
