//! Excel import/export for merge tables
//!
//! - Import: any calamine-readable workbook sheet → [`Table`](crate::types::Table)
//! - Export: [`OutputTable`](crate::types::OutputTable) → single-sheet `.xlsx`

mod exporter;
mod importer;

pub use exporter::{ExcelExporter, CLEANED_SHEET, MERGED_SHEET};
pub use importer::{open_table, ExcelImporter};
