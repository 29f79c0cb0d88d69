use clap::{Parser, Subcommand};
use sheetmerge::cli;
use sheetmerge::config::{
    default_output_path, split_list, ColumnCalculation, ExclusionCondition, ExclusionOptions,
    ExclusionPair, JoinKeyGroup, MergeJob, MergeOptions, SheetSelector, TableSource,
};
use sheetmerge::error::MergeResult;
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "sheetmerge")]
#[command(about = "Join, merge and filter spreadsheet tables by composite keys")]
#[command(long_about = "Sheetmerge - spreadsheet join/merge/exclusion engine

Matches rows of a primary sheet against a secondary sheet by composite keys,
copies chosen columns across, drops or adjusts rows found in an exclusion
sheet, and derives new columns by arithmetic.

COMMANDS:
  merge    - Merge two sheets (optionally with an exclusion sheet)
  run      - Run a merge described by a YAML job file
  headers  - List the header names of a sheet
  sheets   - List the sheets of a workbook
  select   - Keep only chosen columns of a sheet

EXAMPLES:
  sheetmerge merge orders.xlsx prices.xlsx --join id --merge price
  sheetmerge merge a.xlsx b.xlsx --join \"code,date=sku,day\" --join id --highlight
  sheetmerge merge a.xlsx b.xlsx --join id --exclude returns.xlsx \\
      --exclude-on id=rid --subtract qty=qty_returned
  sheetmerge merge a.xlsx b.xlsx --join id --calc \"total = qty * price\"
  sheetmerge run job.yaml --json")]
#[command(version)]
struct Cli {
    /// Show debug logging and option details
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    #[command(long_about = "Merge a secondary sheet into a primary sheet.

JOIN GROUPS (--join, repeatable, highest priority first):
  \"id\"                 same column name on both sides
  \"code,date=sku,day\"  primary columns = secondary columns
  Each secondary row is matched at most once across all groups.

EXCLUSION (--exclude FILE with --exclude-on, optionally --exclude-on2):
  \"id=rid,code=rcode\"  primary=exclusion pairs forming one key
  Without --subtract a matching primary row is dropped. With --subtract
  it is kept and the mapped columns are reduced by the exclusion values.

CALCULATIONS (--calc, repeatable, applied in order):
  \"total = qty * price\" or \"total = qty multiply price\"
  Names containing + - * / need the word form: \"total = unit-price multiply qty\"

Lists accept ',' or '，' as separators.")]
    /// Merge two sheets by composite keys
    Merge {
        /// Primary workbook (drives output row order)
        primary: PathBuf,

        /// Secondary workbook (source of merged columns)
        secondary: PathBuf,

        /// Output .xlsx file [default: merged_<primary>.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Join key group, e.g. "id" or "p1,p2=s1,s2" (repeatable)
        #[arg(short, long = "join")]
        join: Vec<JoinKeyGroup>,

        /// Columns to copy from the secondary sheet
        #[arg(short, long)]
        merge: Vec<String>,

        /// Drop primary rows where any of these columns is blank
        #[arg(long)]
        filter_empty: Vec<String>,

        /// Exclusion workbook
        #[arg(long)]
        exclude: Option<PathBuf>,

        /// Exclusion condition "p=e,p2=e2" (repeatable, checked in order)
        #[arg(long)]
        exclude_on: Vec<ExclusionCondition>,

        /// Fallback exclusion condition, checked after --exclude-on
        #[arg(long)]
        exclude_on2: Option<ExclusionCondition>,

        /// Subtraction "primary=exclusion" applied to excluded matches (repeatable)
        #[arg(long)]
        subtract: Vec<ExclusionPair>,

        /// Column calculation "target = left OP right" (repeatable; use add,
        /// subtract, multiply or divide when names contain + - * /)
        #[arg(short, long = "calc")]
        calc: Vec<ColumnCalculation>,

        /// Fill matched rows with a highlight color
        #[arg(long)]
        highlight: bool,

        /// Primary sheet: 1-based position or name
        #[arg(long, default_value = "1")]
        primary_sheet: SheetSelector,

        /// Secondary sheet: 1-based position or name
        #[arg(long, default_value = "1")]
        secondary_sheet: SheetSelector,

        /// Exclusion sheet: 1-based position or name
        #[arg(long, default_value = "1")]
        exclusion_sheet: SheetSelector,

        /// 1-based header row used for every sheet
        #[arg(long, default_value_t = 1)]
        header_row: usize,

        /// Print a JSON outcome instead of progress output
        #[arg(long)]
        json: bool,
    },

    /// Run a merge described by a YAML job file
    Run {
        /// Path to YAML job file
        file: PathBuf,

        /// Print a JSON outcome instead of progress output
        #[arg(long)]
        json: bool,
    },

    /// List the header names of a sheet
    Headers {
        /// Workbook to inspect
        file: PathBuf,

        /// Sheet: 1-based position or name
        #[arg(short, long, default_value = "1")]
        sheet: SheetSelector,

        /// 1-based header row
        #[arg(long, default_value_t = 1)]
        header_row: usize,
    },

    /// List the sheets of a workbook
    Sheets {
        /// Workbook to inspect
        file: PathBuf,
    },

    /// Write a copy of a sheet holding only the chosen columns
    Select {
        /// Workbook to read
        file: PathBuf,

        /// Columns to keep, in output order
        #[arg(short, long, required = true)]
        columns: Vec<String>,

        /// Output .xlsx file [default: cleaned_<file>.xlsx]
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Sheet: 1-based position or name
        #[arg(short, long, default_value = "1")]
        sheet: SheetSelector,

        /// 1-based header row
        #[arg(long, default_value_t = 1)]
        header_row: usize,
    },
}

/// Flags of the merge subcommand, gathered before building a job
struct MergeArgs {
    primary: PathBuf,
    secondary: PathBuf,
    output: Option<PathBuf>,
    join: Vec<JoinKeyGroup>,
    merge: Vec<String>,
    filter_empty: Vec<String>,
    exclude: Option<PathBuf>,
    exclude_on: Vec<ExclusionCondition>,
    exclude_on2: Option<ExclusionCondition>,
    subtract: Vec<ExclusionPair>,
    calc: Vec<ColumnCalculation>,
    highlight: bool,
    primary_sheet: SheetSelector,
    secondary_sheet: SheetSelector,
    exclusion_sheet: SheetSelector,
    header_row: usize,
}

impl MergeArgs {
    fn into_job(self) -> MergeResult<MergeJob> {
        let header_row = self.header_row;
        let source = |path: PathBuf, sheet: SheetSelector| {
            TableSource::new(path)
                .with_sheet(sheet)
                .with_header_row(header_row)
        };

        let output = self
            .output
            .unwrap_or_else(|| default_output_path(&self.primary, "merged_"));

        let mut conditions = self.exclude_on;
        conditions.extend(self.exclude_on2);
        let exclusion = if conditions.is_empty() && self.subtract.is_empty() {
            None
        } else {
            Some(ExclusionOptions {
                conditions,
                subtract: self
                    .subtract
                    .into_iter()
                    .map(|pair| (pair.primary, pair.exclusion))
                    .collect(),
            })
        };

        Ok(MergeJob {
            primary: source(self.primary, self.primary_sheet)?,
            secondary: source(self.secondary, self.secondary_sheet)?,
            exclusion: self
                .exclude
                .map(|path| source(path, self.exclusion_sheet))
                .transpose()?,
            options: MergeOptions {
                join: self.join,
                merge: flatten(self.merge),
                filter_empty: flatten(self.filter_empty),
                exclusion,
                calculations: self.calc,
                highlight: self.highlight,
            },
            output,
        })
    }
}

fn flatten(entries: Vec<String>) -> Vec<String> {
    entries.iter().flat_map(|e| split_list(e)).collect()
}

fn init_tracing(verbose: bool) {
    let default_filter = if verbose {
        "sheetmerge=debug"
    } else {
        "sheetmerge=warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()),
        )
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> MergeResult<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Merge {
            primary,
            secondary,
            output,
            join,
            merge,
            filter_empty,
            exclude,
            exclude_on,
            exclude_on2,
            subtract,
            calc,
            highlight,
            primary_sheet,
            secondary_sheet,
            exclusion_sheet,
            header_row,
            json,
        } => {
            let job = MergeArgs {
                primary,
                secondary,
                output,
                join,
                merge,
                filter_empty,
                exclude,
                exclude_on,
                exclude_on2,
                subtract,
                calc,
                highlight,
                primary_sheet,
                secondary_sheet,
                exclusion_sheet,
                header_row,
            }
            .into_job()?;
            cli::merge(job, json, cli.verbose)
        }

        Commands::Run { file, json } => cli::run(file, json, cli.verbose),

        Commands::Headers {
            file,
            sheet,
            header_row,
        } => cli::headers(file, sheet, header_row),

        Commands::Sheets { file } => cli::sheets(file),

        Commands::Select {
            file,
            columns,
            output,
            sheet,
            header_row,
        } => cli::select(
            file,
            flatten(columns),
            output,
            sheet,
            header_row,
            cli.verbose,
        ),
    }
}
