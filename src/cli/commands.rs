use crate::config::{default_output_path, load_job, MergeJob, SheetSelector, TableSource};
use crate::core::{run_merge, select_columns, MergeInputs, MergeOutcome, MergeStats};
use crate::error::{MergeError, MergeResult};
use crate::excel::{open_table, ExcelExporter, ExcelImporter, CLEANED_SHEET, MERGED_SHEET};
use colored::Colorize;
use std::path::PathBuf;

/// Load every source of `job`, merge, and write the output workbook.
pub fn execute_job(job: &MergeJob) -> MergeResult<MergeStats> {
    let primary = open_table(&job.primary)?;
    let secondary = open_table(&job.secondary)?;
    let exclusion = job.exclusion.as_ref().map(open_table).transpose()?;

    let report = run_merge(
        &job.options,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: exclusion.as_ref(),
        },
    )?;

    ExcelExporter::new(MERGED_SHEET).export(&report.table, &job.output)?;
    Ok(report.stats)
}

/// Execute merge command
pub fn merge(job: MergeJob, json: bool, verbose: bool) -> MergeResult<()> {
    if json {
        return merge_json(&job);
    }

    println!("{}", "🔗 Sheetmerge - Merging tables".bold().green());
    println!("   Primary:   {}", job.primary.path.display());
    println!("   Secondary: {}", job.secondary.path.display());
    if let Some(exclusion) = &job.exclusion {
        println!("   Exclusion: {}", exclusion.path.display());
    }
    println!("   Output:    {}\n", job.output.display());

    if verbose {
        print_options(&job);
    }

    let stats = execute_job(&job)?;

    println!("{}", "✅ Merge Complete!".bold().green());
    print_stats(&stats);
    println!("   Excel file: {}\n", job.output.display().to_string().bright_blue());
    Ok(())
}

fn merge_json(job: &MergeJob) -> MergeResult<()> {
    let result = execute_job(job);
    let outcome = match &result {
        Ok(stats) => MergeOutcome::succeeded(
            format!(
                "Wrote {} rows to {}",
                stats.rows_written,
                job.output.display()
            ),
            stats.clone(),
        ),
        Err(e) => MergeOutcome::failed(e),
    };
    let rendered = serde_json::to_string_pretty(&outcome)
        .map_err(|e| MergeError::Export(format!("Failed to render outcome: {}", e)))?;
    println!("{}", rendered);
    result.map(|_| ())
}

/// Execute run command: a merge described by a YAML job file
pub fn run(file: PathBuf, json: bool, verbose: bool) -> MergeResult<()> {
    if !json {
        println!("{}", "📖 Loading job file...".cyan());
        println!("   File: {}\n", file.display());
    }
    let job = load_job(&file)?;
    merge(job, json, verbose)
}

/// Execute headers command
pub fn headers(file: PathBuf, sheet: SheetSelector, header_row: usize) -> MergeResult<()> {
    let source = TableSource::new(&file)
        .with_sheet(sheet)
        .with_header_row(header_row)?;
    let names = ExcelImporter::new(&source.path).headers(&source.sheet, source.header_row)?;

    println!("{}", "📋 Sheetmerge - Headers".bold().green());
    println!("   File:  {}", file.display());
    println!("   Sheet: {}\n", source.sheet);
    for (idx, name) in names.iter().enumerate() {
        println!("   {:>3}. {}", idx + 1, name.cyan());
    }
    println!();
    Ok(())
}

/// Execute sheets command
pub fn sheets(file: PathBuf) -> MergeResult<()> {
    let names = ExcelImporter::new(&file).sheet_names()?;

    println!("{}", "📋 Sheetmerge - Sheets".bold().green());
    println!("   File: {}\n", file.display());
    for (idx, name) in names.iter().enumerate() {
        println!("   {:>3}. {}", idx + 1, name.bright_blue());
    }
    println!();
    Ok(())
}

/// Execute select command: keep only the chosen columns
pub fn select(
    file: PathBuf,
    columns: Vec<String>,
    output: Option<PathBuf>,
    sheet: SheetSelector,
    header_row: usize,
    verbose: bool,
) -> MergeResult<()> {
    let output = output.unwrap_or_else(|| default_output_path(&file, "cleaned_"));

    println!("{}", "🧹 Sheetmerge - Selecting columns".bold().green());
    println!("   Input:  {}", file.display());
    println!("   Output: {}\n", output.display());

    let source = TableSource::new(&file)
        .with_sheet(sheet)
        .with_header_row(header_row)?;
    let table = open_table(&source)?;

    if verbose {
        println!("{}", "📖 Columns:".cyan());
        for name in &columns {
            println!("   {}", name.cyan());
        }
        println!();
    }

    let selected = select_columns(&table, &columns)?;
    ExcelExporter::new(CLEANED_SHEET).export(&selected, &output)?;

    println!("{}", "✅ Selection Complete!".bold().green());
    println!("   Columns: {}", selected.columns().len());
    println!("   Rows:    {}", selected.len());
    println!("   Excel file: {}\n", output.display().to_string().bright_blue());
    Ok(())
}

fn print_options(job: &MergeJob) {
    let options = &job.options;
    println!("{}", "⚙️  Options:".cyan());
    for (idx, group) in options.join.iter().enumerate() {
        println!("   Join group {}: {}", idx + 1, group.to_string().bright_yellow());
    }
    if !options.merge.is_empty() {
        println!("   Merge:        {}", options.merge.join(", "));
    }
    if !options.filter_empty.is_empty() {
        println!("   Filter empty: {}", options.filter_empty.join(", "));
    }
    if let Some(exclusion) = &options.exclusion {
        for (idx, condition) in exclusion.conditions.iter().enumerate() {
            println!("   Exclude on {}: {}", idx + 1, condition);
        }
        for (primary, other) in &exclusion.subtract {
            println!("   Subtract:     {} - {}", primary, other);
        }
    }
    for calc in &options.calculations {
        println!("   Calculate:    {}", calc);
    }
    if options.highlight {
        println!("   Highlight:    on");
    }
    println!();
}

fn print_stats(stats: &MergeStats) {
    println!("   Primary rows:   {}", stats.primary_rows);
    println!("   Secondary rows: {}", stats.secondary_rows);
    if stats.exclusion_rows > 0 {
        println!("   Exclusion rows: {}", stats.exclusion_rows);
    }
    println!("   Filtered:       {}", stats.filtered);
    println!("   Excluded:       {}", stats.excluded);
    println!("   Adjusted:       {}", stats.adjusted);

    let per_group: Vec<String> = stats
        .matched_by_group
        .iter()
        .enumerate()
        .map(|(idx, n)| format!("group {}: {}", idx + 1, n))
        .collect();
    println!(
        "   Matched:        {} ({})",
        stats.matched().to_string().bold(),
        per_group.join(", ")
    );
    if stats.calculations.computed + stats.calculations.skipped > 0 {
        println!(
            "   Calculations:   {} computed, {} skipped",
            stats.calculations.computed, stats.calculations.skipped
        );
    }
    println!("   Rows written:   {}", stats.rows_written.to_string().bold().green());
}
