//! Join-group matcher
//!
//! Assigns at most one secondary row to each primary row. Groups are tried in
//! priority order; each group only sees primary rows still unmatched, and one
//! consumed set is shared by all groups so no secondary row is used twice.

use super::index::RowIndex;
use super::key::build_key;
use crate::config::JoinKeyGroup;
use crate::types::{Row, Table};
use std::collections::{HashMap, HashSet};
use tracing::debug;

/// A primary row's match
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct JoinMatch {
    /// Position of the secondary row
    pub secondary_row: usize,
    /// 0-based group that produced the match
    pub group: usize,
}

/// Result of matching every eligible primary row.
#[derive(Debug, Clone, Default)]
pub struct JoinMatches {
    by_primary: HashMap<usize, JoinMatch>,
    consumed: HashSet<usize>,
    per_group: Vec<usize>,
}

impl JoinMatches {
    pub fn get(&self, primary_row: usize) -> Option<JoinMatch> {
        self.by_primary.get(&primary_row).copied()
    }

    pub fn is_consumed(&self, secondary_row: usize) -> bool {
        self.consumed.contains(&secondary_row)
    }

    pub fn len(&self) -> usize {
        self.by_primary.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_primary.is_empty()
    }

    /// Matches produced by each group, in group order
    pub fn per_group(&self) -> &[usize] {
        &self.per_group
    }

    /// `(primary, match)` pairs in primary row order
    pub fn iter_sorted(&self) -> Vec<(usize, JoinMatch)> {
        let mut pairs: Vec<(usize, JoinMatch)> =
            self.by_primary.iter().map(|(&p, &m)| (p, m)).collect();
        pairs.sort_by_key(|(p, _)| *p);
        pairs
    }
}

/// Secondary indices for every join group, built once before matching.
pub struct JoinMatcher<'a> {
    groups: &'a [JoinKeyGroup],
    indices: Vec<RowIndex<'a>>,
}

impl<'a> JoinMatcher<'a> {
    pub fn new(secondary: &'a Table, groups: &'a [JoinKeyGroup]) -> Self {
        let indices = groups
            .iter()
            .map(|group| RowIndex::build(secondary, group.secondary()))
            .collect();
        Self { groups, indices }
    }

    /// Match primary rows whose `eligible` flag is set.
    ///
    /// Primary rows are scanned once per group in their original order, which
    /// makes the result deterministic.
    pub fn resolve(&self, primary: &Table, eligible: &[bool]) -> JoinMatches {
        let mut matches = JoinMatches {
            per_group: vec![0; self.groups.len()],
            ..JoinMatches::default()
        };

        for (group_idx, (group, index)) in self.groups.iter().zip(&self.indices).enumerate() {
            for row in primary.rows() {
                let position = row.position();
                if !eligible.get(position).copied().unwrap_or(false) {
                    continue;
                }
                if matches.by_primary.contains_key(&position) {
                    continue;
                }

                let key = build_key(&row, group.primary());
                let Some(secondary_row) = index.first_row(&key) else {
                    continue;
                };
                if matches.consumed.contains(&secondary_row) {
                    continue;
                }

                matches.consumed.insert(secondary_row);
                matches.by_primary.insert(
                    position,
                    JoinMatch {
                        secondary_row,
                        group: group_idx,
                    },
                );
                matches.per_group[group_idx] += 1;
            }

            debug!(
                group = group_idx + 1,
                columns = %group,
                matched = matches.per_group[group_idx],
                "join group resolved"
            );
        }

        matches
    }

    /// Data of the matched secondary row, read through the producing group's index
    pub fn secondary_row(&self, join: JoinMatch) -> Option<Row<'a>> {
        self.indices
            .get(join.group)
            .and_then(|index| index.row(join.secondary_row))
    }
}
