//! Join/merge/exclusion engine

pub mod assembler;
pub mod calculator;
pub mod engine;
pub mod exclusion;
pub mod index;
pub mod key;
pub mod matcher;

pub use assembler::{select_columns, OutputAssembler};
pub use calculator::{apply_calculations, CalculationStats};
pub use engine::{run_merge, validate, MergeInputs, MergeOutcome, MergeReport, MergeStats};
pub use exclusion::{ExclusionResolver, Resolution};
pub use index::{ExclusionIndex, RowIndex};
pub use key::{build_key, KEY_SEPARATOR};
pub use matcher::{JoinMatch, JoinMatcher, JoinMatches};
