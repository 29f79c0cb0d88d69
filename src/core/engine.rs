//! Merge pipeline
//!
//! validate → index → filter/exclude → match → assemble → calculate.
//! Every invocation builds and drops its own indices; nothing is shared
//! between runs.

use super::assembler::OutputAssembler;
use super::calculator::{apply_calculations, CalculationStats};
use super::exclusion::{ExclusionResolver, Resolution};
use super::matcher::JoinMatcher;
use crate::config::MergeOptions;
use crate::error::{MergeError, MergeResult};
use crate::types::{OutputTable, Table};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Source tables of one merge.
#[derive(Debug, Clone, Copy)]
pub struct MergeInputs<'a> {
    pub primary: &'a Table,
    pub secondary: &'a Table,
    pub exclusion: Option<&'a Table>,
}

/// Row counts collected while merging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MergeStats {
    pub primary_rows: usize,
    pub secondary_rows: usize,
    pub exclusion_rows: usize,
    pub filtered: usize,
    pub excluded: usize,
    pub adjusted: usize,
    /// Written rows that found a match, per join group, highest priority first
    pub matched_by_group: Vec<usize>,
    pub rows_written: usize,
    pub calculations: CalculationStats,
}

impl MergeStats {
    pub fn matched(&self) -> usize {
        self.matched_by_group.iter().sum()
    }
}

#[derive(Debug, Clone)]
pub struct MergeReport {
    pub table: OutputTable,
    pub stats: MergeStats,
}

/// Single structured outcome of an invocation: success flag plus diagnostic.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MergeOutcome {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stats: Option<MergeStats>,
}

impl MergeOutcome {
    pub fn succeeded(message: impl Into<String>, stats: MergeStats) -> Self {
        Self {
            success: true,
            message: message.into(),
            stats: Some(stats),
        }
    }

    pub fn failed(error: &MergeError) -> Self {
        Self {
            success: false,
            message: error.to_string(),
            stats: None,
        }
    }
}

fn require_columns<'c>(
    table: &Table,
    columns: impl IntoIterator<Item = &'c String>,
    what: &str,
) -> MergeResult<()> {
    for column in columns {
        if !table.has_column(column) {
            return Err(MergeError::Validation(format!(
                "{} column '{}' does not exist in {}",
                what, column, table.name
            )));
        }
    }
    Ok(())
}

/// Check every referenced column before any row is processed.
pub fn validate(options: &MergeOptions, inputs: &MergeInputs<'_>) -> MergeResult<()> {
    let MergeInputs {
        primary,
        secondary,
        exclusion,
    } = *inputs;

    if options.join.is_empty() {
        return Err(MergeError::Config(
            "At least one join group is required".to_string(),
        ));
    }
    for (idx, group) in options.join.iter().enumerate() {
        let what = format!("Join group {}", idx + 1);
        require_columns(primary, group.primary(), &what)?;
        require_columns(secondary, group.secondary(), &what)?;
    }

    require_columns(secondary, &options.merge, "Merge")?;
    require_columns(primary, &options.filter_empty, "Empty-filter")?;

    match (&options.exclusion, exclusion) {
        (Some(rules), Some(table)) => {
            if rules.conditions.is_empty() {
                return Err(MergeError::Config(
                    "Exclusion table given without any exclusion condition".to_string(),
                ));
            }
            for (idx, condition) in rules.conditions.iter().enumerate() {
                let what = format!("Exclusion condition {}", idx + 1);
                for pair in condition.pairs() {
                    require_columns(primary, [&pair.primary], &what)?;
                    require_columns(table, [&pair.exclusion], &what)?;
                }
            }
            require_columns(primary, rules.subtract.keys(), "Subtraction")?;
            require_columns(table, rules.subtract.values(), "Subtraction")?;
        }
        (Some(_), None) => {
            return Err(MergeError::Config(
                "Exclusion rules need an exclusion table".to_string(),
            ));
        }
        (None, Some(table)) => {
            warn!(table = %table.name, "exclusion table given without rules; ignoring it");
        }
        (None, None) => {}
    }

    // Operands must be output columns or targets of earlier calculations
    let mut known: HashSet<&str> = primary
        .columns()
        .iter()
        .chain(options.merge.iter())
        .filter(|c| !c.is_empty())
        .map(String::as_str)
        .collect();
    for calc in &options.calculations {
        for operand in [&calc.left, &calc.right] {
            if !known.contains(operand.as_str()) {
                return Err(MergeError::Validation(format!(
                    "Calculation '{}' uses unknown column '{}'",
                    calc, operand
                )));
            }
        }
        known.insert(calc.target.as_str());
    }

    Ok(())
}

/// Run the whole pipeline and return the output table with statistics.
pub fn run_merge(options: &MergeOptions, inputs: MergeInputs<'_>) -> MergeResult<MergeReport> {
    validate(options, &inputs)?;

    let MergeInputs {
        primary,
        secondary,
        exclusion,
    } = inputs;

    let mut stats = MergeStats {
        primary_rows: primary.len(),
        secondary_rows: secondary.len(),
        exclusion_rows: exclusion.map(Table::len).unwrap_or(0),
        ..MergeStats::default()
    };

    let exclusion_rules = match (exclusion, options.exclusion.as_ref()) {
        (Some(table), Some(rules)) => Some((table, rules)),
        _ => None,
    };
    let resolver = ExclusionResolver::new(&options.filter_empty, exclusion_rules);
    let matcher = JoinMatcher::new(secondary, &options.join);

    let resolutions: Vec<Option<Resolution<'_>>> = primary
        .rows()
        .map(|row| (!row.is_empty()).then(|| resolver.resolve(&row)))
        .collect();

    // Only the empty-filter (and blank rows) withhold a row from matching
    let eligible: Vec<bool> = resolutions
        .iter()
        .map(|r| !matches!(r, None | Some(Resolution::Filtered)))
        .collect();
    let matches = matcher.resolve(primary, &eligible);
    stats.matched_by_group = vec![0; options.join.len()];

    let mut assembler = OutputAssembler::new(primary, &options.merge, options.highlight);

    for (row, resolution) in primary.rows().zip(&resolutions) {
        let Some(resolution) = resolution else {
            continue;
        };
        let adjustments = match resolution {
            Resolution::Filtered => {
                stats.filtered += 1;
                continue;
            }
            Resolution::Excluded { condition } => {
                debug!(row = row.record().source_row + 1, condition = condition + 1, "row excluded");
                stats.excluded += 1;
                continue;
            }
            Resolution::Adjusted { matched, .. } => {
                stats.adjusted += 1;
                resolver.subtractions(&row, matched)
            }
            Resolution::Kept => Vec::new(),
        };

        // Excluded rows may hold a match too, but only written rows are counted
        let matched = matches.get(row.position()).and_then(|join| {
            stats.matched_by_group[join.group] += 1;
            matcher.secondary_row(join)
        });
        assembler.push(&row, &adjustments, matched.as_ref());
    }

    let mut table = assembler.finish();
    stats.calculations = apply_calculations(&mut table, &options.calculations);
    stats.rows_written = table.len();

    info!(
        primary = stats.primary_rows,
        matched = stats.matched(),
        filtered = stats.filtered,
        excluded = stats.excluded,
        adjusted = stats.adjusted,
        written = stats.rows_written,
        "merge complete"
    );

    Ok(MergeReport { table, stats })
}
