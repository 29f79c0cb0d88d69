//! YAML job file tests

use pretty_assertions::assert_eq;
use sheetmerge::config::{
    load_job, ColumnCalculation, MergeJob, Operator, SheetSelector,
};
use sheetmerge::error::MergeError;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

const FULL_JOB: &str = r#"
primary: orders.xlsx
secondary:
  path: prices.xlsx
  sheet: Prices
  header_row: 2
exclusion:
  path: /data/returns.xlsx
  sheet: 2
  conditions:
    - "order_id=order"
    - "sku=item，day=weekday"
  subtract:
    qty: returned_qty
join:
  - "sku,day=product_sku,product_day"
  - name
merge: ["price, vendor", stock]
filter_empty: [qty]
calculations:
  - "total = qty * price"
  - target: margin
    left: price
    operator: subtract
    right: cost
highlight: true
output: out/merged.xlsx
"#;

#[test]
fn test_full_job() {
    let base = Path::new("/jobs");
    let job = MergeJob::from_yaml(FULL_JOB, base).unwrap();

    assert_eq!(job.primary.path, PathBuf::from("/jobs/orders.xlsx"));
    assert_eq!(job.primary.sheet, SheetSelector::First);
    assert_eq!(job.primary.header_row, 0);

    assert_eq!(job.secondary.path, PathBuf::from("/jobs/prices.xlsx"));
    assert_eq!(job.secondary.sheet, SheetSelector::Name("Prices".to_string()));
    assert_eq!(job.secondary.header_row, 1);

    let exclusion = job.exclusion.as_ref().unwrap();
    assert_eq!(exclusion.path, PathBuf::from("/data/returns.xlsx"));
    assert_eq!(exclusion.sheet, SheetSelector::Index(1));

    let options = &job.options;
    assert_eq!(options.join.len(), 2);
    assert_eq!(options.join[0].primary(), ["sku", "day"]);
    assert_eq!(options.join[0].secondary(), ["product_sku", "product_day"]);
    assert_eq!(options.join[1].primary(), ["name"]);
    assert_eq!(options.join[1].secondary(), ["name"]);
    assert_eq!(options.merge, vec!["price", "vendor", "stock"]);
    assert_eq!(options.filter_empty, vec!["qty"]);
    assert!(options.highlight);

    let rules = options.exclusion.as_ref().unwrap();
    assert_eq!(rules.conditions.len(), 2);
    assert_eq!(rules.conditions[1].primary_columns(), vec!["sku", "day"]);
    assert_eq!(rules.conditions[1].exclusion_columns(), vec!["item", "weekday"]);
    assert_eq!(rules.subtract.get("qty").map(String::as_str), Some("returned_qty"));

    assert_eq!(
        options.calculations,
        vec![
            ColumnCalculation::new("total", "qty", Operator::Multiply, "price").unwrap(),
            ColumnCalculation::new("margin", "price", Operator::Subtract, "cost").unwrap(),
        ]
    );

    assert_eq!(job.output, PathBuf::from("/jobs/out/merged.xlsx"));
}

#[test]
fn test_minimal_job_defaults() {
    let yaml = "primary: data/a.xlsx\nsecondary: b.xlsx\njoin: [id]\n";
    let job = MergeJob::from_yaml(yaml, Path::new("/w")).unwrap();
    assert!(job.exclusion.is_none());
    assert!(job.options.exclusion.is_none());
    assert!(job.options.merge.is_empty());
    assert!(!job.options.highlight);
    assert_eq!(job.output, PathBuf::from("/w/data/merged_a.xlsx"));
}

#[test]
fn test_unknown_key_rejected() {
    let yaml = "primary: a.xlsx\nsecondary: b.xlsx\njoin: [id]\nhighlite: true\n";
    assert!(matches!(
        MergeJob::from_yaml(yaml, Path::new(".")),
        Err(MergeError::Yaml(_))
    ));
}

#[test]
fn test_misspelled_exclusion_key_rejected() {
    let yaml = r#"
primary: a.xlsx
secondary: b.xlsx
join: [id]
exclusion:
  path: x.xlsx
  conditions: ["id=id3"]
  subtrat:
    qty: qty3
"#;
    assert!(matches!(
        MergeJob::from_yaml(yaml, Path::new(".")),
        Err(MergeError::Yaml(_))
    ));
}

#[test]
fn test_bad_join_group_rejected() {
    let yaml = "primary: a.xlsx\nsecondary: b.xlsx\njoin: [\"a,b=c\"]\n";
    assert!(MergeJob::from_yaml(yaml, Path::new(".")).is_err());
}

#[test]
fn test_bad_operator_rejected() {
    let yaml = r#"
primary: a.xlsx
secondary: b.xlsx
join: [id]
calculations:
  - "total = qty % price"
"#;
    assert!(MergeJob::from_yaml(yaml, Path::new(".")).is_err());
}

#[test]
fn test_zero_header_row_rejected() {
    let yaml = r#"
primary:
  path: a.xlsx
  header_row: 0
secondary: b.xlsx
join: [id]
"#;
    assert!(matches!(
        MergeJob::from_yaml(yaml, Path::new(".")),
        Err(MergeError::Config(_))
    ));
}

#[test]
fn test_load_job_resolves_against_file_directory() {
    let dir = TempDir::new().unwrap();
    let job_path = dir.path().join("job.yaml");
    std::fs::write(&job_path, "primary: a.xlsx\nsecondary: b.xlsx\njoin: [id]\n").unwrap();

    let job = load_job(&job_path).unwrap();
    assert_eq!(job.primary.path, dir.path().join("a.xlsx"));
    assert_eq!(job.output, dir.path().join("merged_a.xlsx"));
}

#[test]
fn test_load_job_missing_file() {
    assert!(matches!(
        load_job(Path::new("no/such/job.yaml")),
        Err(MergeError::Io(_))
    ));
}
