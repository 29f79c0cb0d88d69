use chrono::{NaiveDate, NaiveDateTime, NaiveTime, TimeDelta};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

//==============================================================================
// Cell Value Model
//==============================================================================

static BLANK: CellValue = CellValue::Blank;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// One spreadsheet cell.
///
/// Numbers are always `f64`; integer cells coming from the reader are widened.
/// Dates are numeric cells that carried a date display format in the source.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CellValue {
    Text(String),
    Number(f64),
    Boolean(bool),
    Date(NaiveDateTime),
    /// Formula expression, kept verbatim and never evaluated
    Formula(String),
    #[default]
    Blank,
}

impl CellValue {
    pub fn text(value: impl Into<String>) -> Self {
        CellValue::Text(value.into())
    }

    pub fn is_blank(&self) -> bool {
        matches!(self, CellValue::Blank)
    }

    /// True when the canonical text form is empty or whitespace.
    ///
    /// This is the test applied by the empty-filter columns.
    pub fn is_empty_text(&self) -> bool {
        match self {
            CellValue::Blank => true,
            CellValue::Text(s) | CellValue::Formula(s) => s.trim().is_empty(),
            _ => false,
        }
    }

    /// Numeric view used by subtraction and column calculations.
    ///
    /// Numbers pass through, text is parsed after trimming. Everything else
    /// (blank, boolean, date, formula, unparseable text) has no numeric value,
    /// and neither do infinities or NaN, including text spelled "inf" or "NaN".
    pub fn as_number(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n).filter(|n| n.is_finite()),
            CellValue::Text(s) => {
                let trimmed = s.trim();
                if trimmed.is_empty() {
                    None
                } else {
                    trimmed.parse::<f64>().ok().filter(|n| n.is_finite())
                }
            }
            CellValue::Boolean(_)
            | CellValue::Date(_)
            | CellValue::Formula(_)
            | CellValue::Blank => None,
        }
    }

    /// Canonical string form, used for composite keys and header names.
    pub fn to_canonical(&self) -> String {
        match self {
            CellValue::Text(s) => s.trim().to_string(),
            CellValue::Number(n) => format_number(*n),
            CellValue::Boolean(b) => b.to_string(),
            CellValue::Date(dt) => format_date(dt),
            CellValue::Formula(f) => f.trim().to_string(),
            CellValue::Blank => String::new(),
        }
    }

    /// Get the type name as a string
    pub fn type_name(&self) -> &'static str {
        match self {
            CellValue::Text(_) => "Text",
            CellValue::Number(_) => "Number",
            CellValue::Boolean(_) => "Boolean",
            CellValue::Date(_) => "Date",
            CellValue::Formula(_) => "Formula",
            CellValue::Blank => "Blank",
        }
    }
}

impl fmt::Display for CellValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_canonical())
    }
}

impl From<f64> for CellValue {
    fn from(value: f64) -> Self {
        CellValue::Number(value)
    }
}

impl From<i64> for CellValue {
    fn from(value: i64) -> Self {
        CellValue::Number(value as f64)
    }
}

impl From<bool> for CellValue {
    fn from(value: bool) -> Self {
        CellValue::Boolean(value)
    }
}

impl From<&str> for CellValue {
    fn from(value: &str) -> Self {
        CellValue::Text(value.to_string())
    }
}

impl From<String> for CellValue {
    fn from(value: String) -> Self {
        CellValue::Text(value)
    }
}

impl From<NaiveDateTime> for CellValue {
    fn from(value: NaiveDateTime) -> Self {
        CellValue::Date(value)
    }
}

/// Render a number without a trailing `.0` and without scientific notation.
pub fn format_number(n: f64) -> String {
    if n == 0.0 {
        // Also folds -0.0
        return "0".to_string();
    }
    if n.is_finite() && n.fract() == 0.0 {
        format!("{:.0}", n)
    } else {
        format!("{}", n)
    }
}

fn format_date(dt: &NaiveDateTime) -> String {
    if dt.time() == NaiveTime::MIN {
        dt.format("%Y-%m-%d").to_string()
    } else {
        dt.format("%Y-%m-%d %H:%M:%S").to_string()
    }
}

fn excel_epoch() -> Option<NaiveDateTime> {
    NaiveDate::from_ymd_opt(1899, 12, 30)?.and_hms_opt(0, 0, 0)
}

/// Convert an Excel 1900-system serial (days since 1899-12-30) to a timestamp.
pub fn from_excel_serial(serial: f64) -> Option<NaiveDateTime> {
    if !serial.is_finite() {
        return None;
    }
    let millis = (serial * MILLIS_PER_DAY).round() as i64;
    excel_epoch()?.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}

/// Convert a timestamp to an Excel 1900-system serial.
pub fn to_excel_serial(dt: &NaiveDateTime) -> f64 {
    match excel_epoch() {
        Some(epoch) => dt.signed_duration_since(epoch).num_milliseconds() as f64 / MILLIS_PER_DAY,
        None => 0.0,
    }
}

//==============================================================================
// Tables
//==============================================================================

/// Name → cell resolution, the only thing the key builder needs from a row.
pub trait CellLookup {
    fn lookup(&self, column: &str) -> Option<&CellValue>;
}

impl CellLookup for HashMap<String, CellValue> {
    fn lookup(&self, column: &str) -> Option<&CellValue> {
        self.get(column)
    }
}

impl CellLookup for BTreeMap<String, CellValue> {
    fn lookup(&self, column: &str) -> Option<&CellValue> {
        self.get(column)
    }
}

/// Header names → first column position. Empty names are not addressable.
fn build_column_lookup(columns: &[String]) -> HashMap<String, usize> {
    let mut lookup = HashMap::new();
    for (idx, name) in columns.iter().enumerate() {
        if name.is_empty() {
            continue;
        }
        lookup.entry(name.clone()).or_insert(idx);
    }
    lookup
}

/// One data row of a source table, positionally aligned with the header.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    /// 0-based row number in the source sheet
    pub source_row: u32,
    cells: Vec<CellValue>,
}

impl Record {
    pub fn new(source_row: u32, cells: Vec<CellValue>) -> Self {
        Self { source_row, cells }
    }

    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&BLANK)
    }

    pub fn cells(&self) -> &[CellValue] {
        &self.cells
    }

    /// A record where every cell is blank carries no data
    pub fn is_empty(&self) -> bool {
        self.cells.iter().all(CellValue::is_blank)
    }
}

/// A sheet loaded as a header plus ordered records.
#[derive(Debug, Clone)]
pub struct Table {
    pub name: String,
    columns: Vec<String>,
    lookup: HashMap<String, usize>,
    records: Vec<Record>,
}

impl Table {
    pub fn new(name: impl Into<String>, columns: Vec<String>) -> Self {
        let lookup = build_column_lookup(&columns);
        Self {
            name: name.into(),
            columns,
            lookup,
            records: Vec::new(),
        }
    }

    /// Build a table from literal rows; source row numbers start below the header.
    pub fn from_rows<C, R>(name: &str, columns: &[C], rows: Vec<R>) -> Self
    where
        C: AsRef<str>,
        R: IntoIterator<Item = CellValue>,
    {
        let mut table = Self::new(name, columns.iter().map(|c| c.as_ref().to_string()).collect());
        for (idx, row) in rows.into_iter().enumerate() {
            table.push_record(Record::new(idx as u32 + 1, row.into_iter().collect()));
        }
        table
    }

    pub fn push_record(&mut self, record: Record) {
        self.records.push(record);
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Position of the first column with this exact (case-sensitive) name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.lookup.contains_key(name)
    }

    pub fn records(&self) -> &[Record] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn row(&self, position: usize) -> Option<Row<'_>> {
        self.records.get(position).map(|record| Row {
            table: self,
            record,
            position,
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.records
            .iter()
            .enumerate()
            .map(move |(position, record)| Row {
                table: self,
                record,
                position,
            })
    }
}

/// Borrowed view of one record together with its table's header.
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    table: &'a Table,
    record: &'a Record,
    position: usize,
}

impl<'a> Row<'a> {
    /// Position of the record within its table (0 = first data row)
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn record(&self) -> &'a Record {
        self.record
    }

    pub fn table(&self) -> &'a Table {
        self.table
    }

    pub fn get(&self, column: &str) -> Option<&'a CellValue> {
        self.table
            .column_index(column)
            .map(|idx| self.record.cell(idx))
    }

    /// Cell value or `Blank` when the column is unknown
    pub fn value(&self, column: &str) -> &'a CellValue {
        self.get(column).unwrap_or(&BLANK)
    }

    pub fn is_empty(&self) -> bool {
        self.record.is_empty()
    }
}

impl CellLookup for Row<'_> {
    fn lookup(&self, column: &str) -> Option<&CellValue> {
        self.get(column)
    }
}

//==============================================================================
// Output
//==============================================================================

/// A row being produced for the output table.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct OutputRow {
    pub cells: Vec<CellValue>,
    /// Render hint only; never read back as data
    pub highlight: bool,
}

impl OutputRow {
    pub fn cell(&self, index: usize) -> &CellValue {
        self.cells.get(index).unwrap_or(&BLANK)
    }

    /// Set a cell, growing the row with blanks when needed
    pub fn set(&mut self, index: usize, value: CellValue) {
        if self.cells.len() <= index {
            self.cells.resize(index + 1, CellValue::Blank);
        }
        self.cells[index] = value;
    }
}

/// The table written by the sink: a header plus freshly built rows.
#[derive(Debug, Clone, Default)]
pub struct OutputTable {
    columns: Vec<String>,
    lookup: HashMap<String, usize>,
    rows: Vec<OutputRow>,
}

impl OutputTable {
    pub fn new(columns: Vec<String>) -> Self {
        let lookup = build_column_lookup(&columns);
        Self {
            columns,
            lookup,
            rows: Vec::new(),
        }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.lookup.get(name).copied()
    }

    /// Append a new column and extend every existing row with a blank cell.
    pub fn append_column(&mut self, name: &str) -> usize {
        let idx = self.columns.len();
        self.columns.push(name.to_string());
        if !name.is_empty() {
            self.lookup.entry(name.to_string()).or_insert(idx);
        }
        for row in &mut self.rows {
            if row.cells.len() <= idx {
                row.cells.resize(idx + 1, CellValue::Blank);
            }
        }
        idx
    }

    pub fn push_row(&mut self, row: OutputRow) {
        self.rows.push(row);
    }

    pub fn rows(&self) -> &[OutputRow] {
        &self.rows
    }

    pub fn rows_mut(&mut self) -> &mut [OutputRow] {
        &mut self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Cell lookup by row position and column name
    pub fn get(&self, row: usize, column: &str) -> Option<&CellValue> {
        let idx = self.column_index(column)?;
        self.rows.get(row).map(|r| r.cell(idx))
    }

    /// Rows as `column → value` maps, skipping unnamed columns.
    pub fn to_maps(&self) -> Vec<BTreeMap<String, CellValue>> {
        self.rows
            .iter()
            .map(|row| {
                let mut map = BTreeMap::new();
                for (name, &idx) in &self.lookup {
                    map.insert(name.clone(), row.cell(idx).clone());
                }
                map
            })
            .collect()
    }
}
