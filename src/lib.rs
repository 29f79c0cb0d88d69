//! Sheetmerge - spreadsheet join/merge/exclusion engine
//!
//! Combines a primary table with a secondary table by composite keys,
//! optionally removing or adjusting rows found in an exclusion table, then
//! derives new columns by arithmetic.
//!
//! # Features
//!
//! - Prioritised join-key groups; each secondary row is consumed at most once
//! - Empty-column filtering and multi-condition exclusion with subtraction
//! - Ordered column calculations (add, subtract, multiply, divide)
//! - Excel import (calamine) and export (rust_xlsxwriter)
//!
//! # Example
//!
//! ```no_run
//! use sheetmerge::config::{MergeOptions, TableSource};
//! use sheetmerge::core::{run_merge, MergeInputs};
//! use sheetmerge::excel::{open_table, ExcelExporter, MERGED_SHEET};
//! use std::path::Path;
//!
//! let primary = open_table(&TableSource::new("orders.xlsx"))?;
//! let secondary = open_table(&TableSource::new("prices.xlsx"))?;
//!
//! let options = MergeOptions {
//!     join: vec!["id".parse()?],
//!     merge: vec!["price".to_string()],
//!     ..MergeOptions::default()
//! };
//! let report = run_merge(
//!     &options,
//!     MergeInputs { primary: &primary, secondary: &secondary, exclusion: None },
//! )?;
//!
//! println!("Matched: {}", report.stats.matched());
//! ExcelExporter::new(MERGED_SHEET).export(&report.table, Path::new("merged.xlsx"))?;
//! # Ok::<(), sheetmerge::error::MergeError>(())
//! ```

pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod excel;
pub mod types;

// Re-export commonly used types
pub use error::{MergeError, MergeResult};
pub use types::{CellValue, OutputTable, Table};
