//! Exclusion / subtraction resolver
//!
//! Decides, per primary row, whether the row is dropped by the empty-filter,
//! dropped by an exclusion match, adjusted by subtraction, or kept as-is.
//! A match either removes the row or adjusts it, never both.

use super::index::ExclusionIndex;
use super::key::build_key;
use crate::config::{ExclusionCondition, ExclusionOptions};
use crate::types::{Row, Table};
use std::collections::BTreeMap;

/// Outcome for one primary row.
#[derive(Debug, Clone)]
pub enum Resolution<'a> {
    /// A filter column is blank; no output row
    Filtered,
    /// Matched exclusion condition `condition` (0-based) with no subtraction configured
    Excluded { condition: usize },
    /// Matched with subtraction configured; the row is kept and adjusted
    Adjusted {
        condition: usize,
        matched: Row<'a>,
    },
    /// No exclusion match
    Kept,
}

impl Resolution<'_> {
    /// Whether the row produces an output row
    pub fn is_emitted(&self) -> bool {
        matches!(self, Resolution::Adjusted { .. } | Resolution::Kept)
    }
}

/// One condition with its primary-side key columns and its built index
struct ConditionIndex<'a> {
    primary_columns: Vec<String>,
    index: ExclusionIndex<'a>,
}

pub struct ExclusionResolver<'a> {
    filter_columns: &'a [String],
    conditions: Vec<ConditionIndex<'a>>,
    subtract: Option<&'a BTreeMap<String, String>>,
}

impl<'a> ExclusionResolver<'a> {
    /// Build the resolver. Without an exclusion table only the empty-filter applies.
    pub fn new(
        filter_columns: &'a [String],
        exclusion: Option<(&'a Table, &'a ExclusionOptions)>,
    ) -> Self {
        let (conditions, subtract) = match exclusion {
            Some((table, options)) => {
                let with_rows = options.subtracts();
                let conditions = options
                    .conditions
                    .iter()
                    .map(|condition| Self::index_condition(table, condition, with_rows))
                    .collect();
                let subtract = with_rows.then_some(&options.subtract);
                (conditions, subtract)
            }
            None => (Vec::new(), None),
        };

        Self {
            filter_columns,
            conditions,
            subtract,
        }
    }

    fn index_condition(
        table: &'a Table,
        condition: &ExclusionCondition,
        with_rows: bool,
    ) -> ConditionIndex<'a> {
        ConditionIndex {
            primary_columns: condition.primary_columns(),
            index: ExclusionIndex::build(table, &condition.exclusion_columns(), with_rows),
        }
    }

    /// True when any filter column is blank on this row
    pub fn is_filtered(&self, row: &Row<'_>) -> bool {
        self.filter_columns
            .iter()
            .any(|column| row.value(column).is_empty_text())
    }

    /// Walk the row through filter, condition checks and the subtraction decision.
    ///
    /// Conditions are checked in order and the first hit is final; later
    /// conditions are never consulted after an earlier one matched.
    pub fn resolve(&self, row: &Row<'_>) -> Resolution<'a> {
        if self.is_filtered(row) {
            return Resolution::Filtered;
        }

        for (condition, entry) in self.conditions.iter().enumerate() {
            let key = build_key(row, &entry.primary_columns);
            if !entry.index.contains(&key) {
                continue;
            }
            if self.subtract.is_none() {
                return Resolution::Excluded { condition };
            }
            return match entry.index.matched_row(&key) {
                Some(matched) => Resolution::Adjusted { condition, matched },
                None => Resolution::Kept,
            };
        }

        Resolution::Kept
    }

    /// `(primary column, difference)` for every subtraction rule with numeric operands.
    ///
    /// Rules whose operands are missing or not numeric, or whose difference
    /// overflows, are left out, so the copied value stays untouched.
    pub fn subtractions(&self, row: &Row<'_>, matched: &Row<'_>) -> Vec<(String, f64)> {
        let Some(rules) = self.subtract else {
            return Vec::new();
        };
        rules
            .iter()
            .filter_map(|(primary_col, exclusion_col)| {
                let left = row.get(primary_col)?.as_number()?;
                let right = matched.get(exclusion_col)?.as_number()?;
                let difference = left - right;
                difference
                    .is_finite()
                    .then(|| (primary_col.clone(), difference))
            })
            .collect()
    }

    pub fn has_conditions(&self) -> bool {
        !self.conditions.is_empty()
    }
}
