//! Inline syntax shared by CLI flags and YAML job files
//!
//! - lists: `a, b，c` (ASCII or full-width commas)
//! - join groups: `p1,p2=s1,s2` or `id` (same name on both sides)
//! - exclusion conditions: `p1=e1,p2=e2`
//! - calculations: `total = qty * price` or `total = qty multiply price`

use super::{ColumnCalculation, ExclusionCondition, ExclusionPair, JoinKeyGroup, Operator};
use crate::error::{MergeError, MergeResult};
use regex::Regex;
use std::str::FromStr;
use std::sync::LazyLock;

/// `left WORD right`; word operators need surrounding whitespace
static WORD_OPERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s+(add|subtract|multiply|divide)\s+(.+)$")
        .expect("word operation pattern is valid")
});

/// `left SYMBOL right`, split at the first symbol
static SYMBOL_OPERATION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(.+?)\s*([-+*/])\s*(.+)$").expect("symbol operation pattern is valid")
});

/// Split a column list on ASCII or full-width commas, trimming and dropping empties.
pub fn split_list(input: &str) -> Vec<String> {
    input
        .split([',', '，'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Split a `left=right` pair on its single `=`
fn split_pair(input: &str) -> Option<(&str, &str)> {
    let mut parts = input.split('=');
    let left = parts.next()?;
    let right = parts.next()?;
    if parts.next().is_some() {
        return None;
    }
    Some((left, right))
}

impl FromStr for JoinKeyGroup {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        let (primary, secondary) = if s.contains('=') {
            let (left, right) = split_pair(s).ok_or_else(|| {
                MergeError::Config(format!(
                    "Join group '{}' must look like 'primary_cols=secondary_cols'",
                    s
                ))
            })?;
            (split_list(left), split_list(right))
        } else {
            let cols = split_list(s);
            (cols.clone(), cols)
        };
        JoinKeyGroup::new(primary, secondary)
    }
}

impl FromStr for ExclusionPair {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        let (primary, exclusion) = split_pair(s).ok_or_else(|| {
            MergeError::Config(format!(
                "Exclusion pair '{}' must look like 'primary_col=exclusion_col'",
                s
            ))
        })?;
        let primary = primary.trim();
        let exclusion = exclusion.trim();
        if primary.is_empty() || exclusion.is_empty() {
            return Err(MergeError::Config(format!(
                "Exclusion pair '{}' has an empty column name",
                s
            )));
        }
        Ok(ExclusionPair {
            primary: primary.to_string(),
            exclusion: exclusion.to_string(),
        })
    }
}

impl FromStr for ExclusionCondition {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        let pairs = split_list(s)
            .iter()
            .map(|pair| pair.parse::<ExclusionPair>())
            .collect::<MergeResult<Vec<_>>>()?;
        ExclusionCondition::new(pairs)
    }
}

impl FromStr for Operator {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        match s.trim().to_lowercase().as_str() {
            "add" | "+" => Ok(Operator::Add),
            "subtract" | "-" => Ok(Operator::Subtract),
            "multiply" | "*" => Ok(Operator::Multiply),
            "divide" | "/" => Ok(Operator::Divide),
            other => Err(MergeError::Config(format!(
                "Unknown operator '{}' (use add, subtract, multiply, divide or + - * /)",
                other
            ))),
        }
    }
}

impl FromStr for ColumnCalculation {
    type Err = MergeError;

    fn from_str(s: &str) -> MergeResult<Self> {
        let (target, expr) = s.split_once('=').ok_or_else(|| {
            MergeError::Config(format!(
                "Calculation '{}' must look like 'target = left OP right'",
                s
            ))
        })?;

        let expr = expr.trim();
        if let Some(caps) = WORD_OPERATION.captures(expr) {
            return ColumnCalculation::new(
                target.trim(),
                caps[1].trim(),
                caps[2].parse()?,
                caps[3].trim(),
            );
        }

        let caps = SYMBOL_OPERATION.captures(expr).ok_or_else(|| {
            MergeError::Config(format!(
                "Calculation '{}' has no operator (use + - * / or add, subtract, multiply, divide)",
                s
            ))
        })?;
        if caps[3].contains(['+', '-', '*', '/']) {
            return Err(MergeError::Config(format!(
                "Calculation '{}' has more than one operator symbol; column names containing \
                 + - * / need a word operator, e.g. 'total = unit-price multiply qty'",
                s
            )));
        }

        ColumnCalculation::new(target.trim(), caps[1].trim(), caps[2].parse()?, caps[3].trim())
    }
}
