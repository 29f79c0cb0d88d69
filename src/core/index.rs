//! Row indices over secondary and exclusion tables
//!
//! Secondary rows are addressed two ways: by composite key (`key → first row`)
//! and by row position (`row → data`). The two maps are kept separate so that
//! first-wins on duplicate keys is an explicit policy while row data stays
//! reachable for every row.

use super::key::build_key;
use crate::types::{Row, Table};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// Lookup structure for one set of key columns over one table.
#[derive(Debug, Clone)]
pub struct RowIndex<'a> {
    key_to_row: HashMap<String, usize>,
    rows: HashMap<usize, Row<'a>>,
    duplicates: usize,
}

impl<'a> RowIndex<'a> {
    /// Index every non-empty data row of `table` under `columns`.
    ///
    /// Later rows repeating an earlier key are unreachable by key.
    pub fn build(table: &'a Table, columns: &[String]) -> Self {
        let mut key_to_row = HashMap::new();
        let mut rows = HashMap::new();
        let mut duplicates = 0;

        for row in table.rows() {
            if row.is_empty() {
                continue;
            }
            let key = build_key(&row, columns);
            if key_to_row.contains_key(&key) {
                duplicates += 1;
            } else {
                key_to_row.insert(key, row.position());
            }
            rows.insert(row.position(), row);
        }

        debug!(
            table = %table.name,
            columns = ?columns,
            keys = key_to_row.len(),
            rows = rows.len(),
            duplicates,
            "built row index"
        );

        Self {
            key_to_row,
            rows,
            duplicates,
        }
    }

    /// First row observed with this key
    pub fn first_row(&self, key: &str) -> Option<usize> {
        self.key_to_row.get(key).copied()
    }

    /// Row data by position, regardless of key collisions
    pub fn row(&self, position: usize) -> Option<Row<'a>> {
        self.rows.get(&position).copied()
    }

    /// Key lookup followed by row retrieval
    pub fn lookup(&self, key: &str) -> Option<Row<'a>> {
        self.first_row(key).and_then(|position| self.row(position))
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.key_to_row.contains_key(key)
    }

    /// Number of distinct keys
    pub fn len(&self) -> usize {
        self.key_to_row.len()
    }

    pub fn is_empty(&self) -> bool {
        self.key_to_row.is_empty()
    }

    /// Rows whose key had already been seen
    pub fn duplicates(&self) -> usize {
        self.duplicates
    }
}

/// Index for one exclusion condition.
///
/// A presence set is enough to exclude rows; subtraction needs the matched
/// row's data, so then the full row index is kept.
#[derive(Debug, Clone)]
pub enum ExclusionIndex<'a> {
    Presence(HashSet<String>),
    Rows(RowIndex<'a>),
}

impl<'a> ExclusionIndex<'a> {
    pub fn build(table: &'a Table, columns: &[String], with_rows: bool) -> Self {
        if with_rows {
            return ExclusionIndex::Rows(RowIndex::build(table, columns));
        }
        let keys: HashSet<String> = table
            .rows()
            .filter(|row| !row.is_empty())
            .map(|row| build_key(&row, columns))
            .collect();
        debug!(table = %table.name, columns = ?columns, keys = keys.len(), "built exclusion set");
        ExclusionIndex::Presence(keys)
    }

    pub fn contains(&self, key: &str) -> bool {
        match self {
            ExclusionIndex::Presence(keys) => keys.contains(key),
            ExclusionIndex::Rows(index) => index.contains_key(key),
        }
    }

    /// Data of the first exclusion row with this key, when row data is kept
    pub fn matched_row(&self, key: &str) -> Option<Row<'a>> {
        match self {
            ExclusionIndex::Presence(_) => None,
            ExclusionIndex::Rows(index) => index.lookup(key),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ExclusionIndex::Presence(keys) => keys.len(),
            ExclusionIndex::Rows(index) => index.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::CellValue;

    fn cols(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    fn secondary() -> Table {
        Table::from_rows(
            "secondary",
            &["id", "price"],
            vec![
                vec![CellValue::from(1.0), CellValue::from(9.5)],
                vec![CellValue::Blank, CellValue::Blank],
                vec![CellValue::from(1.0), CellValue::from(7.0)],
                vec![CellValue::from(2.0), CellValue::from(4.0)],
            ],
        )
    }

    #[test]
    fn test_first_row_wins_on_duplicate_key() {
        let table = secondary();
        let index = RowIndex::build(&table, &cols(&["id"]));
        assert_eq!(index.first_row("1|||"), Some(0));
        assert_eq!(index.first_row("2|||"), Some(3));
        assert_eq!(index.len(), 2);
        assert_eq!(index.duplicates(), 1);
    }

    #[test]
    fn test_row_data_kept_for_shadowed_rows() {
        let table = secondary();
        let index = RowIndex::build(&table, &cols(&["id"]));
        let shadowed = index.row(2).unwrap();
        assert_eq!(shadowed.value("price"), &CellValue::Number(7.0));
        assert_eq!(
            index.lookup("1|||").unwrap().value("price"),
            &CellValue::Number(9.5)
        );
    }

    #[test]
    fn test_empty_rows_are_skipped() {
        let table = secondary();
        let index = RowIndex::build(&table, &cols(&["id"]));
        assert!(index.row(1).is_none());
        assert!(!index.contains_key("|||"));
    }

    #[test]
    fn test_exclusion_presence_has_no_row_data() {
        let table = secondary();
        let index = ExclusionIndex::build(&table, &cols(&["id"]), false);
        assert!(index.contains("2|||"));
        assert!(!index.contains("3|||"));
        assert!(index.matched_row("2|||").is_none());
        assert_eq!(index.len(), 2);
    }

    #[test]
    fn test_exclusion_rows_return_first_match() {
        let table = secondary();
        let index = ExclusionIndex::build(&table, &cols(&["id"]), true);
        assert!(index.contains("1|||"));
        let row = index.matched_row("1|||").unwrap();
        assert_eq!(row.value("price"), &CellValue::Number(9.5));
    }
}
