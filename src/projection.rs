//! Column projection for the table view.

use crate::record::{NOTES, Record};
use indexmap::IndexSet;

/// Columns to render for `view`, in first-appearance order.
///
/// `Notes` is excluded (it has its own fixed column), as is any field that
/// is blank for every record in the view. Recomputed on every render.
pub fn project<'a, I>(view: I) -> Vec<String>
where
    I: IntoIterator<Item = &'a Record>,
    I::IntoIter: Clone,
{
    let records = view.into_iter();

    let mut columns: IndexSet<&str> = IndexSet::new();
    for record in records.clone() {
        columns.extend(record.data.keys().map(String::as_str));
    }

    columns
        .into_iter()
        .filter(|field| *field != NOTES)
        .filter(|field| records.clone().any(|r| !is_blank(r.get(field))))
        .map(str::to_string)
        .collect()
}

/// Empty after trimming, or exactly `null` / `undefined` in any case.
pub fn is_blank(value: &str) -> bool {
    value.trim().is_empty()
        || value.eq_ignore_ascii_case("null")
        || value.eq_ignore_ascii_case("undefined")
}
