//! Symbolic-to-concrete cell resolution.
//!
//! Accounting sheets decorate item names with prefixes (`加：`, `其中：`,
//! `☆` …) that formula authors routinely leave off. The resolver first tries
//! the exact name, then retries with each prefix from a fixed ordered list;
//! the first hit wins. Column names get the same retry plus, on a miss only,
//! an underscore fold (`本期_金额` → `本期 / 金额`) that undoes a display
//! normalization applied during extraction.
//!
//! All lookups are pure functions of the snapshot, so results are memoized
//! per resolver instance until [`Resolver::invalidate`] is called.

use std::collections::BTreeMap;

use formulink_common::{CellCoord, CoordError};
use rustc_hash::FxHashMap;

use crate::model::WorkbookSnapshot;

/// Item-name prefixes tried in order after an exact miss.
pub const ITEM_PREFIXES: &[&str] = &[
    "加：", "减：", "其中：", "其中:", "*", "☆", "△", "▲", "√",
];

/// A resolved destination: sheet plus concrete coordinate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ResolvedCell {
    pub sheet: String,
    pub coord: CellCoord,
}

#[derive(Debug, Clone, PartialEq)]
struct SourceEntry {
    row: u32,
    /// A1 of the item's default cell, when extraction recorded one.
    cell: Option<String>,
    values: BTreeMap<String, f64>,
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
enum MemoKey {
    ThreeSegment(String, String, String),
    Item(String, String),
}

/// Lookup indices over one [`WorkbookSnapshot`], plus the memo map.
#[derive(Debug)]
pub struct Resolver {
    /// (sheet, item name) → source entry.
    source_index: FxHashMap<(String, String), SourceEntry>,
    /// (sheet, item name) → target cell, A1.
    target_index: FxHashMap<(String, String), String>,
    /// (sheet, column display name) → column letter.
    column_index: FxHashMap<(String, String), String>,
    memo: FxHashMap<MemoKey, Result<Option<ResolvedCell>, CoordError>>,
}

impl Resolver {
    /// Build the indices once from a snapshot. Later rows/targets win on
    /// duplicate names, matching extraction order.
    pub fn build(snapshot: &WorkbookSnapshot) -> Self {
        let mut source_index = FxHashMap::default();
        for item in &snapshot.sources {
            source_index.insert(
                (item.sheet.clone(), item.name.clone()),
                SourceEntry {
                    row: item.row,
                    cell: item.cell.clone(),
                    values: item.values.clone(),
                },
            );
        }
        let mut target_index = FxHashMap::default();
        for target in &snapshot.targets {
            if let Some(ref cell) = target.cell {
                target_index.insert((target.sheet.clone(), target.name.clone()), cell.clone());
            }
        }
        let mut column_index = FxHashMap::default();
        for column in &snapshot.columns {
            column_index.insert(
                (column.sheet.clone(), column.name.clone()),
                column.letter.clone(),
            );
        }
        Self {
            source_index,
            target_index,
            column_index,
            memo: FxHashMap::default(),
        }
    }

    /// Drop all memoized results. Call after anything that would have
    /// changed the snapshot; the indices themselves never change, so a
    /// mutated data model requires a rebuilt resolver.
    pub fn invalidate(&mut self) {
        self.memo.clear();
    }

    /// Resolve a three-segment reference to a concrete coordinate: the item
    /// gives the row, the column display name gives the letter.
    ///
    /// `Ok(None)` is an ordinary miss. `Err` means the lookup succeeded but
    /// the snapshot carried an out-of-range coordinate; callers treat that
    /// as a hard bounds failure, not a miss.
    pub fn resolve_three_segment(
        &mut self,
        sheet: &str,
        item: &str,
        column: &str,
    ) -> Result<Option<ResolvedCell>, CoordError> {
        let key = MemoKey::ThreeSegment(sheet.to_string(), item.to_string(), column.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let resolved = self.resolve_three_segment_uncached(sheet, item, column);
        self.memo.insert(key, resolved.clone());
        resolved
    }

    fn resolve_three_segment_uncached(
        &self,
        sheet: &str,
        item: &str,
        column: &str,
    ) -> Result<Option<ResolvedCell>, CoordError> {
        let Some(entry) = self.lookup_source(sheet, item) else {
            return Ok(None);
        };
        let Some(letter) = self.lookup_column(sheet, column) else {
            return Ok(None);
        };
        let coord = CellCoord::from_parts(&letter, entry.row)?;
        Ok(Some(ResolvedCell {
            sheet: sheet.to_string(),
            coord,
        }))
    }

    /// Resolve a two-segment (sheet, item) reference, as the legacy forms
    /// use it: source items first, then target items. `Err` carries a bad
    /// recorded coordinate, same contract as
    /// [`Resolver::resolve_three_segment`].
    pub fn resolve_item(
        &mut self,
        sheet: &str,
        item: &str,
    ) -> Result<Option<ResolvedCell>, CoordError> {
        let key = MemoKey::Item(sheet.to_string(), item.to_string());
        if let Some(hit) = self.memo.get(&key) {
            return hit.clone();
        }
        let resolved = self.resolve_item_uncached(sheet, item);
        self.memo.insert(key, resolved.clone());
        resolved
    }

    fn resolve_item_uncached(&self, sheet: &str, item: &str) -> Result<Option<ResolvedCell>, CoordError> {
        // Row alone is not addressable without a column; legacy items
        // recorded their cell at extraction time when they had one.
        if let Some(entry) = self.lookup_source(sheet, item)
            && let Some(ref cell) = entry.cell
        {
            let coord = CellCoord::parse_a1(cell)?;
            return Ok(Some(ResolvedCell {
                sheet: sheet.to_string(),
                coord,
            }));
        }
        if let Some(cell) = self.lookup_keyed(&self.target_index, sheet, item) {
            let coord = CellCoord::parse_a1(&cell)?;
            return Ok(Some(ResolvedCell {
                sheet: sheet.to_string(),
                coord,
            }));
        }
        Ok(None)
    }

    fn lookup_source(&self, sheet: &str, item: &str) -> Option<SourceEntry> {
        self.lookup_keyed(&self.source_index, sheet, item)
    }

    /// Exact match first, then each prefix in order. When several prefixed
    /// variants would match, the first in list order wins and the
    /// alternatives are logged.
    fn lookup_keyed<V: Clone>(
        &self,
        index: &FxHashMap<(String, String), V>,
        sheet: &str,
        name: &str,
    ) -> Option<V> {
        if let Some(hit) = index.get(&(sheet.to_string(), name.to_string())) {
            return Some(hit.clone());
        }
        let mut hits: Vec<&str> = Vec::new();
        let mut first: Option<V> = None;
        for prefix in ITEM_PREFIXES {
            let candidate = format!("{prefix}{name}");
            if let Some(hit) = index.get(&(sheet.to_string(), candidate)) {
                if first.is_none() {
                    first = Some(hit.clone());
                }
                hits.push(prefix);
            }
        }
        if hits.len() > 1 {
            tracing::warn!(
                sheet,
                name,
                matched = ?hits,
                "ambiguous prefixed item name, taking first in prefix order"
            );
        }
        first
    }

    /// Column display name → letter, with the prefix retry and, on a miss
    /// only, the underscore fold.
    fn lookup_column(&self, sheet: &str, column: &str) -> Option<String> {
        if let Some(letter) = self.lookup_keyed(&self.column_index, sheet, column) {
            return Some(letter);
        }
        if column.contains('_') {
            let folded = column.replace('_', " / ");
            return self.lookup_keyed(&self.column_index, sheet, &folded);
        }
        None
    }

    /// Letter for a column display name, without touching the memo.
    pub fn column_letter(&self, sheet: &str, column: &str) -> Option<String> {
        self.lookup_column(sheet, column)
    }

    /// Extracted numeric value of (sheet, item, column), with the same
    /// item-prefix retry and underscore fold as coordinate resolution.
    pub fn source_value(&self, sheet: &str, item: &str, column: &str) -> Option<f64> {
        let entry = self.lookup_source(sheet, item)?;
        if let Some(value) = entry.values.get(column) {
            return Some(*value);
        }
        if column.contains('_') {
            let folded = column.replace('_', " / ");
            return entry.values.get(&folded).copied();
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{SheetColumn, SourceItem, TargetItem};

    fn snapshot() -> WorkbookSnapshot {
        WorkbookSnapshot {
            sources: vec![
                SourceItem::new("利润表", "一、营业总收入", 5).with_value("本期金额", 50_000.0),
                SourceItem::new("利润表", "加：营业外收入", 12),
                SourceItem::new("利润表", "其中：利息费用", 9),
            ],
            targets: vec![TargetItem::new(1, "报表", "净利润").with_cell("D20")],
            columns: vec![
                SheetColumn::new("利润表", "本期金额", "D"),
                SheetColumn::new("利润表", "本年累计", "E"),
                SheetColumn::new("利润表", "期初 / 余额", "F"),
            ],
            ..Default::default()
        }
    }

    #[test]
    fn exact_item_and_column() {
        let mut resolver = Resolver::build(&snapshot());
        let hit = resolver
            .resolve_three_segment("利润表", "一、营业总收入", "本期金额")
            .unwrap()
            .unwrap();
        assert_eq!(hit.coord.to_a1(), "D5");
    }

    #[test]
    fn prefix_fallback_on_item() {
        let mut resolver = Resolver::build(&snapshot());
        // Author wrote the bare name; the sheet carries "加：营业外收入".
        let hit = resolver
            .resolve_three_segment("利润表", "营业外收入", "本年累计")
            .unwrap()
            .unwrap();
        assert_eq!(hit.coord.to_a1(), "E12");
        let hit = resolver
            .resolve_three_segment("利润表", "利息费用", "本期金额")
            .unwrap()
            .unwrap();
        assert_eq!(hit.coord.to_a1(), "D9");
    }

    #[test]
    fn underscore_fold_on_column_miss() {
        let mut resolver = Resolver::build(&snapshot());
        let hit = resolver
            .resolve_three_segment("利润表", "一、营业总收入", "期初_余额")
            .unwrap()
            .unwrap();
        assert_eq!(hit.coord.to_a1(), "F5");
    }

    #[test]
    fn miss_is_none_not_error() {
        let mut resolver = Resolver::build(&snapshot());
        assert_eq!(
            resolver.resolve_three_segment("利润表", "不存在的项目", "本期金额"),
            Ok(None)
        );
        assert_eq!(
            resolver.resolve_three_segment("不存在的表", "一、营业总收入", "本期金额"),
            Ok(None)
        );
        assert_eq!(
            resolver.resolve_three_segment("利润表", "一、营业总收入", "不存在的列"),
            Ok(None)
        );
    }

    #[test]
    fn out_of_range_row_is_an_error_not_a_miss() {
        use formulink_common::ROW_LIMIT;
        let mut snap = snapshot();
        snap.sources
            .push(SourceItem::new("利润表", "坏行项目", ROW_LIMIT + 1));
        let mut resolver = Resolver::build(&snap);
        let err = resolver
            .resolve_three_segment("利润表", "坏行项目", "本期金额")
            .unwrap_err();
        assert_eq!(err, CoordError::RowOutOfRange((ROW_LIMIT + 1) as u64));
    }

    #[test]
    fn target_items_resolve_as_two_segment() {
        let mut resolver = Resolver::build(&snapshot());
        let hit = resolver.resolve_item("报表", "净利润").unwrap().unwrap();
        assert_eq!(hit.coord.to_a1(), "D20");
    }

    #[test]
    fn source_values_share_prefix_retry() {
        let resolver = Resolver::build(&snapshot());
        assert_eq!(
            resolver.source_value("利润表", "一、营业总收入", "本期金额"),
            Some(50_000.0)
        );
        assert_eq!(resolver.source_value("利润表", "一、营业总收入", "本年累计"), None);
    }

    #[test]
    fn memo_survives_until_invalidate() {
        let mut resolver = Resolver::build(&snapshot());
        let first = resolver.resolve_three_segment("利润表", "营业外收入", "本期金额");
        let second = resolver.resolve_three_segment("利润表", "营业外收入", "本期金额");
        assert_eq!(first, second);
        resolver.invalidate();
        let third = resolver.resolve_three_segment("利润表", "营业外收入", "本期金额");
        assert_eq!(first, third);
    }
}
