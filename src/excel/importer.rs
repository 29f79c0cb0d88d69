//! Excel importer implementation - workbook sheet → Table
//!
//! Reads `.xlsx`/`.xlsm`/`.xlsb`/`.xls`/`.ods` through calamine's format
//! auto-detection. The load is all-or-nothing: any read error aborts it.

use crate::config::{SheetSelector, TableSource};
use crate::error::{MergeError, MergeResult};
use crate::types::{from_excel_serial, CellValue, Record, Table};
use calamine::{open_workbook_auto, Data, Range, Reader, Sheets};
use chrono::{NaiveDate, NaiveDateTime};
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use tracing::debug;

type Workbook = Sheets<BufReader<File>>;

/// Excel importer for loading one sheet of a workbook as a [`Table`]
pub struct ExcelImporter {
    path: PathBuf,
}

impl ExcelImporter {
    /// Create a new Excel importer
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    fn open(&self) -> MergeResult<Workbook> {
        open_workbook_auto(&self.path).map_err(|e| {
            MergeError::Import(format!(
                "Failed to open '{}': {}",
                self.path.display(),
                e
            ))
        })
    }

    /// Names of all sheets, in workbook order
    pub fn sheet_names(&self) -> MergeResult<Vec<String>> {
        let workbook = self.open()?;
        Ok(workbook.sheet_names().to_vec())
    }

    /// Load the selected sheet, treating `header_row` (0-based) as the header.
    pub fn open_table(&self, sheet: &SheetSelector, header_row: usize) -> MergeResult<Table> {
        let mut workbook = self.open()?;
        let sheet_name = self.resolve_sheet(&workbook, sheet)?;

        let range = workbook.worksheet_range(&sheet_name).map_err(|e| {
            MergeError::Import(format!(
                "Failed to read sheet '{}' of '{}': {}",
                sheet_name,
                self.path.display(),
                e
            ))
        })?;

        // Formula text is optional; formats without formula support yield nothing
        let formulas = workbook.worksheet_formula(&sheet_name).ok();

        let table_name = format!("{} [{}]", self.file_name(), sheet_name);
        let table = self.build_table(&table_name, &range, formulas.as_ref(), header_row)?;

        debug!(
            table = %table.name,
            columns = table.columns().len(),
            rows = table.len(),
            "loaded table"
        );
        Ok(table)
    }

    /// Non-empty header names of the selected sheet
    pub fn headers(&self, sheet: &SheetSelector, header_row: usize) -> MergeResult<Vec<String>> {
        let table = self.open_table(sheet, header_row)?;
        Ok(table
            .columns()
            .iter()
            .filter(|name| !name.is_empty())
            .cloned()
            .collect())
    }

    fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.path.display().to_string())
    }

    fn resolve_sheet(&self, workbook: &Workbook, sheet: &SheetSelector) -> MergeResult<String> {
        let names = workbook.sheet_names().to_vec();
        let found = match sheet {
            SheetSelector::First => names.first().cloned(),
            SheetSelector::Index(idx) => names.get(*idx).cloned(),
            SheetSelector::Name(name) => names.iter().find(|n| *n == name).cloned(),
        };
        found.ok_or_else(|| {
            MergeError::Import(format!(
                "'{}' has no {} (sheets: {})",
                self.path.display(),
                sheet,
                names.join(", ")
            ))
        })
    }

    fn build_table(
        &self,
        table_name: &str,
        range: &Range<Data>,
        formulas: Option<&Range<String>>,
        header_row: usize,
    ) -> MergeResult<Table> {
        let missing_header = || MergeError::MissingHeader {
            table: table_name.to_string(),
            row: header_row,
        };

        let (last_row, last_col) = range.end().ok_or_else(missing_header)?;
        let header = u32::try_from(header_row).map_err(|_| missing_header())?;
        if header > last_row {
            return Err(missing_header());
        }

        let read_cell = |row: u32, col: u32| -> CellValue {
            if let Some(formula) = formulas.and_then(|f| f.get_value((row, col))) {
                if !formula.is_empty() {
                    return CellValue::Formula(formula.clone());
                }
            }
            range
                .get_value((row, col))
                .map(convert_cell)
                .unwrap_or(CellValue::Blank)
        };

        let columns: Vec<String> = (0..=last_col)
            .map(|col| read_cell(header, col).to_canonical())
            .collect();
        if columns.iter().all(|name| name.is_empty()) {
            return Err(missing_header());
        }

        let mut table = Table::new(table_name, columns);
        for row in (header + 1)..=last_row {
            let cells: Vec<CellValue> = (0..=last_col).map(|col| read_cell(row, col)).collect();
            table.push_record(Record::new(row, cells));
        }

        Ok(table)
    }
}

/// Load the table described by `source`
pub fn open_table(source: &TableSource) -> MergeResult<Table> {
    ExcelImporter::new(&source.path).open_table(&source.sheet, source.header_row)
}

/// Map a calamine cell onto the cell value model.
///
/// Date-formatted numbers arrive as `DateTime` and become dates in either the
/// 1900 or the 1904 date system; durations stay numeric. Error cells carry no
/// value.
fn convert_cell(cell: &Data) -> CellValue {
    match cell {
        Data::Empty => CellValue::Blank,
        Data::String(s) => CellValue::Text(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            if dt.is_duration() {
                CellValue::Number(serial)
            } else {
                // as_datetime honours the workbook's 1904 date system
                dt.as_datetime()
                    .or_else(|| from_excel_serial(serial))
                    .map(CellValue::Date)
                    .unwrap_or(CellValue::Number(serial))
            }
        }
        Data::DateTimeIso(s) => parse_iso_datetime(s)
            .map(CellValue::Date)
            .unwrap_or_else(|| CellValue::Text(s.clone())),
        Data::DurationIso(s) => CellValue::Text(s.clone()),
        Data::Error(_) => CellValue::Blank,
    }
}

fn parse_iso_datetime(s: &str) -> Option<NaiveDateTime> {
    NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}
