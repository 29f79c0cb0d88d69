//! Output assembler
//!
//! Output header = primary header in original order, then each requested merge
//! column that is not already present. Output rows are new rows; source
//! records are never modified.

use crate::error::{MergeError, MergeResult};
use crate::types::{CellValue, OutputRow, OutputTable, Row, Table};

pub struct OutputAssembler {
    table: OutputTable,
    /// (merge column, output position)
    merge_targets: Vec<(String, usize)>,
    highlight: bool,
}

impl OutputAssembler {
    pub fn new(primary: &Table, merge_columns: &[String], highlight: bool) -> Self {
        let mut columns: Vec<String> = primary.columns().to_vec();
        for name in merge_columns {
            if !columns.iter().any(|existing| existing == name) {
                columns.push(name.clone());
            }
        }

        let table = OutputTable::new(columns);
        let merge_targets = merge_columns
            .iter()
            .filter_map(|name| table.column_index(name).map(|idx| (name.clone(), idx)))
            .collect();

        Self {
            table,
            merge_targets,
            highlight,
        }
    }

    pub fn columns(&self) -> &[String] {
        self.table.columns()
    }

    /// Emit one output row for a kept primary row.
    ///
    /// Primary cells are copied positionally, then subtraction results
    /// overwrite their columns, then merge columns are filled from the matched
    /// secondary row. Only matched rows are highlighted.
    pub fn push(&mut self, row: &Row<'_>, adjustments: &[(String, f64)], matched: Option<&Row<'_>>) {
        let width = self.table.columns().len();
        let mut cells: Vec<CellValue> = row.record().cells().to_vec();
        if cells.len() < width {
            cells.resize(width, CellValue::Blank);
        }
        let mut out = OutputRow {
            cells,
            highlight: false,
        };

        for (column, value) in adjustments {
            if let Some(idx) = self.table.column_index(column) {
                out.set(idx, CellValue::Number(*value));
            }
        }

        if let Some(secondary) = matched {
            for (column, idx) in &self.merge_targets {
                out.set(*idx, secondary.value(column).clone());
            }
            out.highlight = self.highlight;
        }

        self.table.push_row(out);
    }

    pub fn finish(self) -> OutputTable {
        self.table
    }
}

/// Copy only `columns`, in the given order, from every non-empty row of `table`.
pub fn select_columns(table: &Table, columns: &[String]) -> MergeResult<OutputTable> {
    if columns.is_empty() {
        return Err(MergeError::Config(
            "At least one column must be selected".to_string(),
        ));
    }
    let positions = columns
        .iter()
        .map(|name| {
            table.column_index(name).ok_or_else(|| {
                MergeError::Validation(format!(
                    "Selected column '{}' does not exist in {}",
                    name, table.name
                ))
            })
        })
        .collect::<MergeResult<Vec<usize>>>()?;

    let mut header: Vec<String> = Vec::with_capacity(columns.len());
    let mut picked: Vec<usize> = Vec::with_capacity(columns.len());
    for (name, idx) in columns.iter().zip(positions) {
        if !header.contains(name) {
            header.push(name.clone());
            picked.push(idx);
        }
    }

    let mut out = OutputTable::new(header);
    for record in table.records().iter().filter(|r| !r.is_empty()) {
        out.push_row(OutputRow {
            cells: picked.iter().map(|&idx| record.cell(idx).clone()).collect(),
            highlight: false,
        });
    }
    Ok(out)
}
