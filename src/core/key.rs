//! Composite key builder

use crate::types::CellLookup;

/// Appended after every key component, blank ones included.
pub const KEY_SEPARATOR: &str = "|||";

/// Build the composite key of a row over `columns`, in order.
///
/// Each component is the cell's canonical text followed by [`KEY_SEPARATOR`].
/// Missing and blank cells contribute an empty component, so keys stay
/// positionally stable whichever values are empty.
pub fn build_key<L: CellLookup + ?Sized>(row: &L, columns: &[String]) -> String {
    let mut key = String::new();
    for column in columns {
        if let Some(value) = row.lookup(column) {
            key.push_str(&value.to_canonical());
        }
        key.push_str(KEY_SEPARATOR);
    }
    key
}
