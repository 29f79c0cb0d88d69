//! Column calculation pipeline
//!
//! Runs once over the assembled output. Calculations apply strictly in
//! declaration order; a later rule sees the targets written by earlier ones.

use crate::config::ColumnCalculation;
use crate::types::{CellValue, OutputTable};
use serde::Serialize;
use tracing::debug;

/// Cells written and cells left unset, over all calculations
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CalculationStats {
    pub computed: usize,
    pub skipped: usize,
}

/// Apply every calculation to every row of `table`.
///
/// Missing target columns are appended first. A row whose operands are blank
/// or non-numeric, or that divides by zero, keeps its target cell unchanged.
pub fn apply_calculations(
    table: &mut OutputTable,
    calculations: &[ColumnCalculation],
) -> CalculationStats {
    let mut stats = CalculationStats::default();
    if calculations.is_empty() {
        return stats;
    }

    for calc in calculations {
        if table.column_index(&calc.target).is_none() {
            table.append_column(&calc.target);
        }
    }

    let positions: Vec<Option<(usize, usize, usize)>> = calculations
        .iter()
        .map(|calc| {
            Some((
                table.column_index(&calc.left)?,
                table.column_index(&calc.right)?,
                table.column_index(&calc.target)?,
            ))
        })
        .collect();

    for row in table.rows_mut() {
        for (calc, position) in calculations.iter().zip(&positions) {
            let Some((left_idx, right_idx, target_idx)) = *position else {
                stats.skipped += 1;
                continue;
            };
            let result = row
                .cell(left_idx)
                .as_number()
                .zip(row.cell(right_idx).as_number())
                .and_then(|(left, right)| calc.operator.apply(left, right));

            match result {
                Some(value) => {
                    row.set(target_idx, CellValue::Number(value));
                    stats.computed += 1;
                }
                None => stats.skipped += 1,
            }
        }
    }

    debug!(
        calculations = calculations.len(),
        computed = stats.computed,
        skipped = stats.skipped,
        "applied column calculations"
    );
    stats
}
