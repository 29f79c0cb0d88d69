//! Merge configuration
//!
//! Everything the engine needs arrives as plain values in [`MergeOptions`].
//! Where the sources live is described separately by [`MergeJob`], which can
//! be built from CLI flags or loaded from a YAML job file:
//!
//! ```yaml
//! primary: orders.xlsx
//! secondary:
//!   path: prices.xlsx
//!   sheet: Prices
//!   header_row: 2
//! join:
//!   - "sku=product_sku"
//!   - "name=product_name"
//! merge: [price, vendor]
//! filter_empty: [qty]
//! exclusion:
//!   path: returns.xlsx
//!   conditions:
//!     - "order_id=order"
//!   subtract:
//!     qty: returned_qty
//! calculations:
//!   - "total = qty * price"
//! highlight: true
//! output: merged.xlsx
//! ```

mod syntax;

pub use syntax::split_list;

use crate::error::{MergeError, MergeResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

//==============================================================================
// Matching rules
//==============================================================================

/// One fallback alternative for matching primary rows to secondary rows.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct JoinKeyGroup {
    primary: Vec<String>,
    secondary: Vec<String>,
}

impl JoinKeyGroup {
    /// Both sides must be non-empty and of equal length.
    pub fn new(primary: Vec<String>, secondary: Vec<String>) -> MergeResult<Self> {
        if primary.is_empty() || secondary.is_empty() {
            return Err(MergeError::Config(
                "Join group needs at least one column on each side".to_string(),
            ));
        }
        if primary.len() != secondary.len() {
            return Err(MergeError::Config(format!(
                "Join group {:?}={:?} has {} primary and {} secondary columns",
                primary,
                secondary,
                primary.len(),
                secondary.len()
            )));
        }
        Ok(Self { primary, secondary })
    }

    pub fn primary(&self) -> &[String] {
        &self.primary
    }

    pub fn secondary(&self) -> &[String] {
        &self.secondary
    }
}

impl fmt::Display for JoinKeyGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={}", self.primary.join(","), self.secondary.join(","))
    }
}

impl TryFrom<String> for JoinKeyGroup {
    type Error = MergeError;

    fn try_from(value: String) -> MergeResult<Self> {
        value.parse()
    }
}

impl From<JoinKeyGroup> for String {
    fn from(group: JoinKeyGroup) -> Self {
        group.to_string()
    }
}

/// `primaryColumn=exclusionColumn`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionPair {
    pub primary: String,
    pub exclusion: String,
}

/// One exclusion condition: all pairs must match for a hit.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub struct ExclusionCondition {
    pairs: Vec<ExclusionPair>,
}

impl ExclusionCondition {
    pub fn new(pairs: Vec<ExclusionPair>) -> MergeResult<Self> {
        if pairs.is_empty() {
            return Err(MergeError::Config(
                "Exclusion condition needs at least one 'primary=exclusion' pair".to_string(),
            ));
        }
        Ok(Self { pairs })
    }

    pub fn pairs(&self) -> &[ExclusionPair] {
        &self.pairs
    }

    pub fn primary_columns(&self) -> Vec<String> {
        self.pairs.iter().map(|p| p.primary.clone()).collect()
    }

    pub fn exclusion_columns(&self) -> Vec<String> {
        self.pairs.iter().map(|p| p.exclusion.clone()).collect()
    }
}

impl fmt::Display for ExclusionCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self
            .pairs
            .iter()
            .map(|p| format!("{}={}", p.primary, p.exclusion))
            .collect();
        f.write_str(&parts.join(","))
    }
}

impl TryFrom<String> for ExclusionCondition {
    type Error = MergeError;

    fn try_from(value: String) -> MergeResult<Self> {
        value.parse()
    }
}

impl From<ExclusionCondition> for String {
    fn from(condition: ExclusionCondition) -> Self {
        condition.to_string()
    }
}

/// Exclusion table rules: ordered conditions plus an optional subtraction mapping
/// (`primary column → exclusion column`). With a mapping, a match adjusts the row
/// instead of dropping it.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct ExclusionOptions {
    pub conditions: Vec<ExclusionCondition>,
    #[serde(default)]
    pub subtract: BTreeMap<String, String>,
}

impl ExclusionOptions {
    pub fn subtracts(&self) -> bool {
        !self.subtract.is_empty()
    }
}

//==============================================================================
// Column calculations
//==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "String", into = "String")]
pub enum Operator {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl Operator {
    /// `None` when the result is undefined: division by zero or a
    /// non-finite result such as an overflowing product
    pub fn apply(self, left: f64, right: f64) -> Option<f64> {
        let result = match self {
            Operator::Add => left + right,
            Operator::Subtract => left - right,
            Operator::Multiply => left * right,
            Operator::Divide => {
                if right == 0.0 {
                    return None;
                }
                left / right
            }
        };
        Some(result).filter(|r| r.is_finite())
    }

    pub fn name(self) -> &'static str {
        match self {
            Operator::Add => "add",
            Operator::Subtract => "subtract",
            Operator::Multiply => "multiply",
            Operator::Divide => "divide",
        }
    }

    pub fn symbol(self) -> char {
        match self {
            Operator::Add => '+',
            Operator::Subtract => '-',
            Operator::Multiply => '*',
            Operator::Divide => '/',
        }
    }
}

impl TryFrom<String> for Operator {
    type Error = MergeError;

    fn try_from(value: String) -> MergeResult<Self> {
        value.parse()
    }
}

impl From<Operator> for String {
    fn from(op: Operator) -> Self {
        op.name().to_string()
    }
}

/// `target = left OP right`, applied to every output row after merging.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(try_from = "CalculationEntry")]
pub struct ColumnCalculation {
    pub target: String,
    pub left: String,
    pub operator: Operator,
    pub right: String,
}

impl ColumnCalculation {
    pub fn new(target: &str, left: &str, operator: Operator, right: &str) -> MergeResult<Self> {
        for (role, name) in [("target", target), ("left", left), ("right", right)] {
            if name.is_empty() {
                return Err(MergeError::Config(format!(
                    "Calculation {} column name is empty",
                    role
                )));
            }
        }
        Ok(Self {
            target: target.to_string(),
            left: left.to_string(),
            operator,
            right: right.to_string(),
        })
    }
}

impl fmt::Display for ColumnCalculation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} = {} {} {}",
            self.target,
            self.left,
            self.operator.symbol(),
            self.right
        )
    }
}

/// YAML accepts either `"total = qty * price"` or an explicit map.
#[derive(Deserialize)]
#[serde(untagged)]
enum CalculationEntry {
    Inline(String),
    Fields {
        target: String,
        left: String,
        operator: Operator,
        right: String,
    },
}

impl TryFrom<CalculationEntry> for ColumnCalculation {
    type Error = MergeError;

    fn try_from(entry: CalculationEntry) -> MergeResult<Self> {
        match entry {
            CalculationEntry::Inline(s) => s.parse(),
            CalculationEntry::Fields {
                target,
                left,
                operator,
                right,
            } => ColumnCalculation::new(&target, &left, operator, &right),
        }
    }
}

//==============================================================================
// Engine options
//==============================================================================

/// Plain-value configuration consumed by the engine.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct MergeOptions {
    /// Ordered fallback groups, highest priority first
    pub join: Vec<JoinKeyGroup>,
    /// Secondary columns copied into matched output rows
    #[serde(default)]
    pub merge: Vec<String>,
    /// Primary rows with a blank in any of these columns are dropped
    #[serde(default)]
    pub filter_empty: Vec<String>,
    #[serde(default)]
    pub exclusion: Option<ExclusionOptions>,
    #[serde(default)]
    pub calculations: Vec<ColumnCalculation>,
    /// Mark output rows that received a join match
    #[serde(default)]
    pub highlight: bool,
}

//==============================================================================
// Table sources and job files
//==============================================================================

/// Which sheet of a workbook to read.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
#[serde(untagged)]
pub enum SheetSelector {
    #[default]
    First,
    /// 0-based position
    Index(usize),
    Name(String),
}

impl FromStr for SheetSelector {
    type Err = MergeError;

    /// Numbers are 1-based sheet positions, anything else is a sheet name.
    fn from_str(s: &str) -> MergeResult<Self> {
        let trimmed = s.trim();
        if trimmed.is_empty() {
            return Ok(SheetSelector::First);
        }
        match trimmed.parse::<usize>() {
            Ok(0) => Err(MergeError::Config(
                "Sheet positions start at 1".to_string(),
            )),
            Ok(n) => Ok(SheetSelector::Index(n - 1)),
            Err(_) => Ok(SheetSelector::Name(trimmed.to_string())),
        }
    }
}

impl fmt::Display for SheetSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SheetSelector::First => f.write_str("first sheet"),
            SheetSelector::Index(i) => write!(f, "sheet #{}", i + 1),
            SheetSelector::Name(name) => write!(f, "sheet '{}'", name),
        }
    }
}

/// Where a table comes from: file, sheet and 0-based header row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableSource {
    pub path: PathBuf,
    pub sheet: SheetSelector,
    pub header_row: usize,
}

impl TableSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sheet: SheetSelector::First,
            header_row: 0,
        }
    }

    pub fn with_sheet(mut self, sheet: SheetSelector) -> Self {
        self.sheet = sheet;
        self
    }

    /// Set the header row from a 1-based row number
    pub fn with_header_row(mut self, row_number: usize) -> MergeResult<Self> {
        if row_number == 0 {
            return Err(MergeError::Config("Header rows start at 1".to_string()));
        }
        self.header_row = row_number - 1;
        Ok(self)
    }
}

/// YAML shape of a table source: a bare path or a map.
#[derive(Deserialize)]
#[serde(untagged)]
enum SourceEntry {
    Path(PathBuf),
    Detailed {
        path: PathBuf,
        #[serde(default)]
        sheet: Option<SheetEntry>,
        #[serde(default)]
        header_row: Option<usize>,
    },
}

/// Sheets in YAML: a 1-based position or a name
#[derive(Deserialize)]
#[serde(untagged)]
enum SheetEntry {
    Position(usize),
    Name(String),
}

impl SourceEntry {
    fn into_source(self) -> MergeResult<TableSource> {
        match self {
            SourceEntry::Path(path) => Ok(TableSource::new(path)),
            SourceEntry::Detailed {
                path,
                sheet,
                header_row,
            } => {
                let sheet = match sheet {
                    None => SheetSelector::First,
                    Some(SheetEntry::Position(n)) => n.to_string().parse()?,
                    Some(SheetEntry::Name(name)) => SheetSelector::Name(name),
                };
                TableSource::new(path)
                    .with_sheet(sheet)
                    .with_header_row(header_row.unwrap_or(1))
            }
        }
    }
}

/// The exclusion block: source fields plus matching rules, misspelled keys rejected
#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct ExclusionEntry {
    path: PathBuf,
    #[serde(default)]
    sheet: Option<SheetEntry>,
    #[serde(default)]
    header_row: Option<usize>,
    #[serde(default)]
    conditions: Vec<ExclusionCondition>,
    #[serde(default)]
    subtract: BTreeMap<String, String>,
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct JobFile {
    primary: SourceEntry,
    secondary: SourceEntry,
    #[serde(default)]
    exclusion: Option<ExclusionEntry>,
    join: Vec<JoinKeyGroup>,
    #[serde(default)]
    merge: Vec<String>,
    #[serde(default)]
    filter_empty: Vec<String>,
    #[serde(default)]
    calculations: Vec<ColumnCalculation>,
    #[serde(default)]
    highlight: bool,
    #[serde(default)]
    output: Option<PathBuf>,
}

/// A complete merge invocation: sources, options and destination.
#[derive(Debug, Clone, PartialEq)]
pub struct MergeJob {
    pub primary: TableSource,
    pub secondary: TableSource,
    pub exclusion: Option<TableSource>,
    pub options: MergeOptions,
    pub output: PathBuf,
}

impl MergeJob {
    /// Parse a YAML job. Relative paths resolve against `base_dir`.
    pub fn from_yaml(content: &str, base_dir: &Path) -> MergeResult<Self> {
        let file: JobFile = serde_yaml::from_str(content)?;

        let resolve = |mut source: TableSource| {
            if source.path.is_relative() {
                source.path = base_dir.join(&source.path);
            }
            source
        };

        let primary = resolve(file.primary.into_source()?);
        let secondary = resolve(file.secondary.into_source()?);

        let (exclusion_source, exclusion_options) = match file.exclusion {
            Some(entry) => {
                let source = SourceEntry::Detailed {
                    path: entry.path,
                    sheet: entry.sheet,
                    header_row: entry.header_row,
                }
                .into_source()?;
                let options = ExclusionOptions {
                    conditions: entry.conditions,
                    subtract: entry.subtract,
                };
                (Some(resolve(source)), Some(options))
            }
            None => (None, None),
        };

        let output = match file.output {
            Some(path) if path.is_relative() => base_dir.join(path),
            Some(path) => path,
            None => default_output_path(&primary.path, "merged_"),
        };

        let (merge, filter_empty) = (
            flatten_lists(file.merge),
            flatten_lists(file.filter_empty),
        );

        Ok(Self {
            primary,
            secondary,
            exclusion: exclusion_source,
            options: MergeOptions {
                join: file.join,
                merge,
                filter_empty,
                exclusion: exclusion_options,
                calculations: file.calculations,
                highlight: file.highlight,
            },
            output,
        })
    }
}

/// Load a YAML job file
pub fn load_job(path: &Path) -> MergeResult<MergeJob> {
    let content = std::fs::read_to_string(path)?;
    let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
    MergeJob::from_yaml(&content, base_dir)
}

/// Entries may themselves be comma lists (`merge: ["price, vendor"]`)
fn flatten_lists(entries: Vec<String>) -> Vec<String> {
    entries.iter().flat_map(|e| split_list(e)).collect()
}

/// `<dir>/<prefix><stem>.xlsx` next to the input file
pub fn default_output_path(input: &Path, prefix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());
    let file_name = format!("{}{}.xlsx", prefix, stem);
    match input.parent() {
        Some(dir) => dir.join(file_name),
        None => PathBuf::from(file_name),
    }
}
