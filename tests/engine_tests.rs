//! Merge pipeline tests over in-memory tables

use pretty_assertions::assert_eq;
use sheetmerge::config::{ExclusionOptions, MergeOptions};
use sheetmerge::core::{run_merge, MergeInputs};
use sheetmerge::error::MergeError;
use sheetmerge::types::{CellValue, OutputTable, Table};

fn n(value: f64) -> CellValue {
    CellValue::Number(value)
}

fn t(value: &str) -> CellValue {
    CellValue::text(value)
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

fn options(join: &[&str], merge: &[&str]) -> MergeOptions {
    MergeOptions {
        join: join.iter().map(|g| g.parse().unwrap()).collect(),
        merge: strings(merge),
        ..MergeOptions::default()
    }
}

fn exclusion(conditions: &[&str], subtract: &[(&str, &str)]) -> ExclusionOptions {
    ExclusionOptions {
        conditions: conditions.iter().map(|c| c.parse().unwrap()).collect(),
        subtract: subtract
            .iter()
            .map(|(a, b)| (a.to_string(), b.to_string()))
            .collect(),
    }
}

fn rows(table: &OutputTable) -> Vec<Vec<CellValue>> {
    table.rows().iter().map(|r| r.cells.clone()).collect()
}

fn orders() -> Table {
    Table::from_rows(
        "orders",
        &["id", "qty"],
        vec![vec![n(1.0), n(5.0)], vec![n(2.0), n(3.0)]],
    )
}

fn prices() -> Table {
    Table::from_rows(
        "prices",
        &["id", "price"],
        vec![vec![n(1.0), n(9.5)], vec![n(2.0), n(4.0)]],
    )
}

// ═══════════════════════════════════════════════════════════════════════════
// MERGE
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_merge_price_by_id() {
    let (primary, secondary) = (orders(), prices());
    let report = run_merge(
        &options(&["id"], &["price"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();

    assert_eq!(report.table.columns(), ["id", "qty", "price"]);
    assert_eq!(
        rows(&report.table),
        vec![
            vec![n(1.0), n(5.0), n(9.5)],
            vec![n(2.0), n(3.0), n(4.0)],
        ]
    );
    assert_eq!(report.stats.matched(), 2);
    assert_eq!(report.stats.rows_written, 2);
}

#[test]
fn test_text_and_number_keys_match() {
    let primary = Table::from_rows("p", &["code"], vec![vec![t(" 7 ")], vec![n(8.0)]]);
    let secondary = Table::from_rows(
        "s",
        &["code", "name"],
        vec![vec![n(7.0), t("seven")], vec![t("8"), t("eight")]],
    );
    let report = run_merge(
        &options(&["code"], &["name"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.get(0, "name"), Some(&t("seven")));
    assert_eq!(report.table.get(1, "name"), Some(&t("eight")));
}

#[test]
fn test_unmatched_rows_kept_with_blank_merge_cells() {
    let primary = Table::from_rows("p", &["id"], vec![vec![n(1.0)], vec![n(3.0)]]);
    let secondary = prices();
    let mut opts = options(&["id"], &["price"]);
    opts.highlight = true;
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();

    assert_eq!(report.table.len(), 2);
    assert_eq!(report.table.get(1, "price"), Some(&CellValue::Blank));
    assert!(report.table.rows()[0].highlight);
    assert!(!report.table.rows()[1].highlight);
}

#[test]
fn test_secondary_row_consumed_once() {
    let primary = Table::from_rows("p", &["id"], vec![vec![n(1.0)], vec![n(1.0)]]);
    let secondary = prices();
    let report = run_merge(
        &options(&["id"], &["price"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.get(0, "price"), Some(&n(9.5)));
    assert_eq!(report.table.get(1, "price"), Some(&CellValue::Blank));
}

#[test]
fn test_duplicate_secondary_keys_first_wins() {
    let primary = Table::from_rows("p", &["id"], vec![vec![n(1.0)]]);
    let secondary = Table::from_rows(
        "s",
        &["id", "price"],
        vec![vec![n(1.0), n(1.0)], vec![n(1.0), n(2.0)]],
    );
    let report = run_merge(
        &options(&["id"], &["price"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.get(0, "price"), Some(&n(1.0)));
}

#[test]
fn test_second_group_only_uses_unconsumed_rows() {
    let primary = Table::from_rows(
        "p",
        &["name", "code"],
        vec![vec![t("A"), t("X")], vec![t("B"), t("Y")], vec![t("C"), t("Z")]],
    );
    let secondary = Table::from_rows(
        "s",
        &["name", "code", "vendor"],
        vec![
            vec![t("B"), t("X"), t("first")],
            vec![t("Q"), t("Z"), t("second")],
        ],
    );
    let report = run_merge(
        &options(&["name", "code"], &["vendor"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();

    // A's code X points at a row group 1 already gave to B
    assert_eq!(report.table.get(0, "vendor"), Some(&CellValue::Blank));
    assert_eq!(report.table.get(1, "vendor"), Some(&t("first")));
    assert_eq!(report.table.get(2, "vendor"), Some(&t("second")));
    assert_eq!(report.stats.matched_by_group, vec![1, 1]);
}

#[test]
fn test_composite_key_group() {
    let primary = Table::from_rows(
        "p",
        &["sku", "day"],
        vec![vec![t("a"), t("mon")], vec![t("a"), t("tue")]],
    );
    let secondary = Table::from_rows(
        "s",
        &["item", "weekday", "stock"],
        vec![vec![t("a"), t("tue"), n(4.0)]],
    );
    let report = run_merge(
        &options(&["sku,day=item,weekday"], &["stock"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.get(0, "stock"), Some(&CellValue::Blank));
    assert_eq!(report.table.get(1, "stock"), Some(&n(4.0)));
}

#[test]
fn test_header_dedup_keeps_primary_position() {
    let primary = Table::from_rows("p", &["id", "price"], vec![vec![n(1.0), n(0.0)]]);
    let secondary = prices();
    let report = run_merge(
        &options(&["id"], &["price", "price"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.columns(), ["id", "price"]);
    assert_eq!(report.table.get(0, "price"), Some(&n(9.5)));
}

// ═══════════════════════════════════════════════════════════════════════════
// FILTER AND EXCLUSION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_empty_filter_drops_rows() {
    let primary = Table::from_rows(
        "p",
        &["id", "qty"],
        vec![vec![n(1.0), CellValue::Blank], vec![n(2.0), t("  ")], vec![n(2.0), n(1.0)]],
    );
    let secondary = prices();
    let mut opts = options(&["id"], &["price"]);
    opts.filter_empty = strings(&["qty"]);
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();

    assert_eq!(rows(&report.table), vec![vec![n(2.0), n(1.0), n(4.0)]]);
    assert_eq!(report.stats.filtered, 2);
}

#[test]
fn test_exclusion_without_subtraction_drops_row() {
    let (primary, secondary) = (orders(), prices());
    let excluded = Table::from_rows("x", &["id3"], vec![vec![n(2.0)]]);
    let mut opts = options(&["id"], &["price"]);
    opts.exclusion = Some(exclusion(&["id=id3"], &[]));
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: Some(&excluded),
        },
    )
    .unwrap();

    assert_eq!(rows(&report.table), vec![vec![n(1.0), n(5.0), n(9.5)]]);
    assert_eq!(report.stats.excluded, 1);
}

#[test]
fn test_subtraction_keeps_and_adjusts_row() {
    let (primary, secondary) = (orders(), prices());
    let excluded = Table::from_rows("x", &["id3", "qty3"], vec![vec![n(1.0), n(2.0)]]);
    let mut opts = options(&["id"], &["price"]);
    opts.exclusion = Some(exclusion(&["id=id3"], &[("qty", "qty3")]));
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: Some(&excluded),
        },
    )
    .unwrap();

    assert_eq!(
        rows(&report.table),
        vec![
            vec![n(1.0), n(3.0), n(9.5)],
            vec![n(2.0), n(3.0), n(4.0)],
        ]
    );
    assert_eq!(report.stats.adjusted, 1);
    assert_eq!(report.stats.excluded, 0);
}

#[test]
fn test_second_condition_after_first_misses() {
    let primary = Table::from_rows(
        "p",
        &["id", "code", "qty"],
        vec![
            vec![n(1.0), t("A"), n(10.0)],
            vec![n(2.0), t("B"), n(10.0)],
        ],
    );
    let secondary = prices();
    let excluded = Table::from_rows(
        "x",
        &["id3", "code3", "qty3"],
        vec![
            vec![n(1.0), t("Z"), n(1.0)],
            vec![n(9.0), t("B"), n(4.0)],
        ],
    );
    let mut opts = options(&["id"], &[]);
    opts.exclusion = Some(exclusion(&["id=id3", "code=code3"], &[("qty", "qty3")]));
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: Some(&excluded),
        },
    )
    .unwrap();

    assert_eq!(report.table.get(0, "qty"), Some(&n(9.0)));
    assert_eq!(report.table.get(1, "qty"), Some(&n(6.0)));
}

#[test]
fn test_first_condition_wins_when_both_match() {
    let primary = Table::from_rows(
        "p",
        &["id", "code", "qty"],
        vec![vec![n(1.0), t("A"), n(10.0)]],
    );
    let secondary = prices();
    // The code match sits first in the table; the id condition still takes priority
    let excluded = Table::from_rows(
        "x",
        &["id3", "code3", "qty3"],
        vec![
            vec![n(7.0), t("A"), n(4.0)],
            vec![n(1.0), t("Z"), n(1.0)],
        ],
    );
    let mut opts = options(&["id"], &["price"]);
    opts.exclusion = Some(exclusion(&["id=id3", "code=code3"], &[("qty", "qty3")]));
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: Some(&excluded),
        },
    )
    .unwrap();

    assert_eq!(
        rows(&report.table),
        vec![vec![n(1.0), t("A"), n(9.0), n(9.5)]]
    );
    assert_eq!(report.stats.adjusted, 1);
}

#[test]
fn test_excluded_row_still_consumes_secondary() {
    let primary = Table::from_rows(
        "p",
        &["id", "tag"],
        vec![vec![n(1.0), t("x")], vec![n(1.0), t("y")]],
    );
    let secondary = prices();
    let excluded = Table::from_rows("x", &["tag"], vec![vec![t("x")]]);
    let mut opts = options(&["id"], &["price"]);
    opts.exclusion = Some(exclusion(&["tag=tag"], &[]));
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: Some(&excluded),
        },
    )
    .unwrap();

    assert_eq!(report.table.len(), 1);
    assert_eq!(report.table.get(0, "price"), Some(&CellValue::Blank));
    // The excluded row's match is not reported
    assert_eq!(report.stats.excluded, 1);
    assert_eq!(report.stats.matched_by_group, vec![0]);
    assert_eq!(report.stats.matched(), 0);
}

// ═══════════════════════════════════════════════════════════════════════════
// CALCULATIONS
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_calculations_on_merged_columns() {
    let (primary, secondary) = (orders(), prices());
    let mut opts = options(&["id"], &["price"]);
    opts.calculations = vec![
        "total = qty * price".parse().unwrap(),
        "unit = total divide qty".parse().unwrap(),
    ];
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();

    assert_eq!(report.table.columns(), ["id", "qty", "price", "total", "unit"]);
    assert_eq!(report.table.get(0, "total"), Some(&n(47.5)));
    assert_eq!(report.table.get(1, "unit"), Some(&n(4.0)));
    assert_eq!(report.stats.calculations.computed, 4);
}

#[test]
fn test_divide_by_zero_is_silent() {
    let primary = Table::from_rows("p", &["id", "qty"], vec![vec![n(1.0), n(0.0)]]);
    let secondary = prices();
    let mut opts = options(&["id"], &["price"]);
    opts.calculations = vec!["ratio = price / qty".parse().unwrap()];
    let report = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    )
    .unwrap();
    assert_eq!(report.table.get(0, "ratio"), Some(&CellValue::Blank));
    assert_eq!(report.stats.calculations.skipped, 1);
}

// ═══════════════════════════════════════════════════════════════════════════
// VALIDATION
// ═══════════════════════════════════════════════════════════════════════════

#[test]
fn test_unknown_join_column_rejected() {
    let (primary, secondary) = (orders(), prices());
    let result = run_merge(
        &options(&["sku"], &["price"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    );
    assert!(matches!(result, Err(MergeError::Validation(_))));
}

#[test]
fn test_unknown_merge_column_rejected() {
    let (primary, secondary) = (orders(), prices());
    let result = run_merge(
        &options(&["id"], &["vendor"]),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    );
    assert!(matches!(result, Err(MergeError::Validation(_))));
}

#[test]
fn test_no_join_group_rejected() {
    let (primary, secondary) = (orders(), prices());
    let result = run_merge(
        &MergeOptions::default(),
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    );
    assert!(matches!(result, Err(MergeError::Config(_))));
}

#[test]
fn test_exclusion_rules_without_table_rejected() {
    let (primary, secondary) = (orders(), prices());
    let mut opts = options(&["id"], &[]);
    opts.exclusion = Some(exclusion(&["id=id3"], &[]));
    let result = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    );
    assert!(matches!(result, Err(MergeError::Config(_))));
}

#[test]
fn test_unknown_calculation_operand_rejected() {
    let (primary, secondary) = (orders(), prices());
    let mut opts = options(&["id"], &["price"]);
    opts.calculations = vec!["total = qty * discount".parse().unwrap()];
    let result = run_merge(
        &opts,
        MergeInputs {
            primary: &primary,
            secondary: &secondary,
            exclusion: None,
        },
    );
    assert!(matches!(result, Err(MergeError::Validation(_))));
}

#[test]
fn test_same_inputs_same_output() {
    let (primary, secondary) = (orders(), prices());
    let opts = options(&["id"], &["price"]);
    let inputs = MergeInputs {
        primary: &primary,
        secondary: &secondary,
        exclusion: None,
    };
    let first = run_merge(&opts, inputs).unwrap();
    let second = run_merge(&opts, inputs).unwrap();
    assert_eq!(first.table.to_maps(), second.table.to_maps());
    assert_eq!(first.stats, second.stats);
}
