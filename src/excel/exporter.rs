//! Excel exporter implementation - OutputTable → .xlsx

use crate::error::{MergeError, MergeResult};
use crate::types::{to_excel_serial, CellValue, OutputTable};
use chrono::Timelike;
use rust_xlsxwriter::{Color, Format, FormatPattern, Formula, Workbook, Worksheet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Sheet name used for merge output
pub const MERGED_SHEET: &str = "MergedData";
/// Sheet name used for column selection output
pub const CLEANED_SHEET: &str = "CleanedData";

/// Fill used on highlighted rows
const HIGHLIGHT_COLOR: u32 = 0xFF9900;

const MAX_ROWS: usize = 1_048_576;
const MAX_COLUMNS: usize = 16_384;

/// Cell formats for one export: plain and highlighted variants of each kind
struct Formats {
    plain: Format,
    date: Format,
    datetime: Format,
    header: Format,
}

impl Formats {
    fn new(highlight: bool) -> Self {
        let base = if highlight {
            Format::new()
                .set_background_color(Color::RGB(HIGHLIGHT_COLOR))
                .set_pattern(FormatPattern::Solid)
        } else {
            Format::new()
        };
        Self {
            date: base.clone().set_num_format("yyyy-mm-dd"),
            datetime: base.clone().set_num_format("yyyy-mm-dd hh:mm:ss"),
            header: Format::new().set_bold(),
            plain: base,
        }
    }
}

/// Excel exporter writing one output table as a single worksheet
pub struct ExcelExporter {
    sheet_name: String,
}

impl ExcelExporter {
    /// Create a new Excel exporter writing to `sheet_name`
    pub fn new(sheet_name: impl Into<String>) -> Self {
        Self {
            sheet_name: sheet_name.into(),
        }
    }

    /// Write `table` to `output_path`.
    ///
    /// The workbook is rendered in memory, written to a sibling temporary
    /// file and renamed into place, so a failed export leaves no partial file.
    pub fn export(&self, table: &OutputTable, output_path: &Path) -> MergeResult<()> {
        let buffer = self.to_buffer(table)?;

        let temp_path = temp_path_for(output_path);
        if let Err(e) = fs::write(&temp_path, &buffer) {
            let _ = fs::remove_file(&temp_path);
            return Err(MergeError::Export(format!(
                "Failed to write '{}': {}",
                output_path.display(),
                e
            )));
        }
        if let Err(e) = fs::rename(&temp_path, output_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(MergeError::Export(format!(
                "Failed to move output into place at '{}': {}",
                output_path.display(),
                e
            )));
        }

        debug!(
            path = %output_path.display(),
            rows = table.len(),
            bytes = buffer.len(),
            "wrote workbook"
        );
        Ok(())
    }

    /// Render `table` as an in-memory .xlsx file
    pub fn to_buffer(&self, table: &OutputTable) -> MergeResult<Vec<u8>> {
        if table.columns().len() > MAX_COLUMNS {
            return Err(MergeError::Export(format!(
                "{} columns exceed the worksheet limit of {}",
                table.columns().len(),
                MAX_COLUMNS
            )));
        }
        if table.len() + 1 > MAX_ROWS {
            return Err(MergeError::Export(format!(
                "{} rows exceed the worksheet limit of {}",
                table.len(),
                MAX_ROWS - 1
            )));
        }

        let mut workbook = Workbook::new();
        let worksheet = workbook.add_worksheet();
        worksheet
            .set_name(&self.sheet_name)
            .map_err(|e| MergeError::Export(format!("Failed to set worksheet name: {}", e)))?;

        self.write_table(worksheet, table)?;
        worksheet.autofit();

        workbook
            .save_to_buffer()
            .map_err(|e| MergeError::Export(format!("Failed to save Excel file: {}", e)))
    }

    fn write_table(&self, worksheet: &mut Worksheet, table: &OutputTable) -> MergeResult<()> {
        let plain = Formats::new(false);
        let highlighted = Formats::new(true);
        let width = table.columns().len();

        for (col_idx, name) in table.columns().iter().enumerate() {
            worksheet
                .write_string_with_format(0, col_idx as u16, name, &plain.header)
                .map_err(|e| MergeError::Export(format!("Failed to write header: {}", e)))?;
        }

        for (row_idx, row) in table.rows().iter().enumerate() {
            let excel_row = row_idx as u32 + 1;
            let formats = if row.highlight { &highlighted } else { &plain };
            // Highlighted rows are filled across the whole header width
            for col_idx in 0..width {
                Self::write_cell(worksheet, excel_row, col_idx as u16, row.cell(col_idx), formats)?;
            }
        }
        Ok(())
    }

    fn write_cell(
        worksheet: &mut Worksheet,
        row: u32,
        col: u16,
        value: &CellValue,
        formats: &Formats,
    ) -> MergeResult<()> {
        let result = match value {
            CellValue::Text(text) => worksheet
                .write_string_with_format(row, col, text, &formats.plain)
                .map(|_| ()),
            CellValue::Number(n) => worksheet
                .write_number_with_format(row, col, *n, &formats.plain)
                .map(|_| ()),
            CellValue::Boolean(b) => worksheet
                .write_boolean_with_format(row, col, *b, &formats.plain)
                .map(|_| ()),
            CellValue::Date(dt) => {
                let format = if dt.time().num_seconds_from_midnight() == 0 {
                    &formats.date
                } else {
                    &formats.datetime
                };
                worksheet
                    .write_number_with_format(row, col, to_excel_serial(dt), format)
                    .map(|_| ())
            }
            CellValue::Formula(formula) => worksheet
                .write_formula_with_format(row, col, Formula::new(formula), &formats.plain)
                .map(|_| ()),
            CellValue::Blank => worksheet
                .write_blank(row, col, &formats.plain)
                .map(|_| ()),
        };

        result.map_err(|e| {
            MergeError::Export(format!(
                "Failed to write {} at row {}, column {}: {}",
                value.type_name(),
                row + 1,
                col + 1,
                e
            ))
        })
    }
}

fn temp_path_for(output_path: &Path) -> PathBuf {
    let file_name = output_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output.xlsx".to_string());
    output_path.with_file_name(format!(".{}.tmp", file_name))
}
